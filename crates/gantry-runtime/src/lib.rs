//! # Gantry Runtime
//!
//! Orchestration layer for the Gantry bot framework:
//!
//! - Layered configuration ([`config`]) with figment
//! - Logging initialisation ([`logging`])
//! - [`GantryRuntime`], which reads raw payloads from a [`PayloadSource`],
//!   spawns one dispatch task per payload and wires command trees into the
//!   dispatcher
//!
//! ```rust,ignore
//! use gantry_runtime::GantryRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = GantryRuntime::new();
//!     runtime.attach_commands(build_commands(&runtime))?;
//!
//!     let (tx, rx) = runtime.channel();
//!     tokio::spawn(read_gateway(tx));
//!     runtime.run_until_ctrl_c(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, GantryConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{GantryRuntime, PayloadSource, RuntimeBuilder, RuntimeStats};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
