//! Configuration for the Gantry runtime.
//!
//! Layered loading (defaults, files, environment, programmatic merges) and
//! validation of the `logging`, `dispatch` and `commands` sections.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    CommandsConfig, DispatchConfig, GantryConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
