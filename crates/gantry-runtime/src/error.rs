//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use gantry_framework::DispatchError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Wiring a callback into the dispatcher failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Installing the shutdown signal handler failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
