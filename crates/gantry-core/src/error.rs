//! Error types shared across the Gantry crates.
//!
//! Command and dispatch errors live in `gantry-framework`; this module only
//! carries the errors of the collaborators the core talks to.

use thiserror::Error;

/// Boxed error returned by user handlers and checks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Fetch Errors
// =============================================================================

/// Errors raised by an [`EntityFetcher`](crate::integration::EntityFetcher).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The remote service could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The remote call was rejected.
    #[error("remote call failed ({status}): {message}")]
    Rejected {
        /// Status code reported by the remote.
        status: u16,
        /// Human-readable reason.
        message: String,
    },

    /// The response could not be decoded.
    #[error("failed to decode remote response: {0}")]
    Decode(String),

    /// The operation needs a guild but none was available.
    #[error("no guild available for lookup")]
    NoGuild,
}

impl FetchError {
    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for remote lookups.
pub type FetchResult<T> = Result<T, FetchError>;
