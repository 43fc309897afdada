//! # Gantry
//!
//! A typed command and event dispatch framework for chat bots that sit
//! behind a gateway proxy.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────┐     ┌────────────────────────────┐
//! │ PayloadSource│────▶│  Runtime   │────▶│ Dispatcher (task/payload)  │
//! │  (raw JSON)  │     │            │     │  ├─ MESSAGE_CREATE ─▶ CommandTree
//! └──────────────┘     └────────────┘     │  ├─ INTERACTION_CREATE ─▶ InteractionTree
//!                                         │  └─ ... ─▶ typed callbacks ─▶ ERROR
//!                                         └────────────────────────────┘
//! ```
//!
//! - **Core** ([`core`]): wire models, the payload envelope, collaborator traits
//! - **Framework** ([`framework`]): tokenizer, converters, command trees,
//!   dispatcher
//! - **Runtime** ([`runtime`]): configuration, logging, ingestion loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gantry::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = GantryRuntime::new();
//!
//!     let mut commands = runtime.command_tree();
//!     commands.add(Command::new("ping").handler(|_ctx| async { Ok(()) }))?;
//!     runtime.attach_commands(commands)?;
//!
//!     let (tx, rx) = runtime.channel();
//!     tokio::spawn(forward_gateway(tx));
//!     runtime.run_until_ctrl_c(rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: `gantry.toml` configuration files
//! - `yaml-config`: `gantry.yaml` configuration files
//! - `json-log`: JSON log output

pub use gantry_core as core;
pub use gantry_framework as framework;
pub use gantry_runtime as runtime;

/// Commonly used types for building a bot.
///
/// ```rust,ignore
/// use gantry::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use gantry_runtime::{GantryConfig, GantryRuntime, PayloadSource};

    // Commands
    pub use gantry_framework::{
        Argument, ArgumentType, Arguments, Command, CommandContext, CommandTree,
        InteractionCommand, InteractionContext, InteractionTree, Parameter, PrefixMatcher,
    };

    // Events
    pub use gantry_framework::{Dispatcher, ErrorEvent, Event, EventContext, Updated, events};

    // Errors and handler plumbing
    pub use gantry_core::{BoxError, Payload, Snowflake};
    pub use gantry_framework::{CommandError, DispatchError, HandlerResult};
}
