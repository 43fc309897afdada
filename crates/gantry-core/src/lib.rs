//! # Gantry Core
//!
//! Foundation types for the Gantry bot framework.
//!
//! This crate holds what every other layer agrees on:
//!
//! - **Identifiers**: [`Snowflake`], tolerant of string and integer encodings
//! - **Wire models**: the subset of remote entities the engine reads
//!   ([`model`])
//! - **Payload envelope**: [`Payload`], the unit the gateway proxy forwards
//! - **Collaborators**: [`EntityFetcher`] for remote lookups and
//!   [`PanicReporter`] for handler faults
//!
//! The dispatch engine itself lives in `gantry-framework`.

pub mod error;
pub mod integration;
pub mod model;
pub mod payload;
pub mod snowflake;

pub use error::{BoxError, FetchError, FetchResult};
pub use integration::{
    BoxedFetcher, BoxedReporter, EntityFetcher, HandlerFault, LogPanicReporter, NoopFetcher,
    PanicReporter,
};
pub use payload::{Payload, PayloadMetadata, TraceEntry};
pub use snowflake::Snowflake;
