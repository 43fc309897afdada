//! Narrow interfaces to the collaborators the engine does not implement.
//!
//! - [`EntityFetcher`] stands in for the remote lookup service (by id and
//!   by name). Argument converters are its only callers.
//! - [`PanicReporter`] receives handler faults intercepted at the invocation
//!   boundary.

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::error::FetchResult;
use crate::model::{Channel, Guild, GuildMember, Role, User};
use crate::snowflake::Snowflake;

// =============================================================================
// Remote lookups
// =============================================================================

/// Fetches platform entities by id or searches them by name.
///
/// `fetch_*` methods return `Ok(None)` when the entity does not exist.
/// `search_*` methods return candidates in the remote's own relevance order;
/// callers rank them further but keep that order for ties.
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    async fn fetch_user(&self, user_id: Snowflake) -> FetchResult<Option<User>>;

    async fn fetch_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> FetchResult<Option<GuildMember>>;

    async fn fetch_role(&self, guild_id: Snowflake, role_id: Snowflake)
    -> FetchResult<Option<Role>>;

    async fn fetch_channel(&self, channel_id: Snowflake) -> FetchResult<Option<Channel>>;

    async fn fetch_guild(&self, guild_id: Snowflake) -> FetchResult<Option<Guild>>;

    async fn search_members(&self, guild_id: Snowflake, query: &str)
    -> FetchResult<Vec<GuildMember>>;

    async fn search_roles(&self, guild_id: Snowflake, query: &str) -> FetchResult<Vec<Role>>;

    async fn search_channels(&self, guild_id: Snowflake, query: &str)
    -> FetchResult<Vec<Channel>>;

    async fn search_guilds(&self, query: &str) -> FetchResult<Vec<Guild>>;
}

/// Shared handle to a fetcher.
pub type BoxedFetcher = Arc<dyn EntityFetcher>;

/// A fetcher that knows nothing. Every lookup comes back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFetcher;

#[async_trait]
impl EntityFetcher for NoopFetcher {
    async fn fetch_user(&self, _user_id: Snowflake) -> FetchResult<Option<User>> {
        Ok(None)
    }

    async fn fetch_member(
        &self,
        _guild_id: Snowflake,
        _user_id: Snowflake,
    ) -> FetchResult<Option<GuildMember>> {
        Ok(None)
    }

    async fn fetch_role(
        &self,
        _guild_id: Snowflake,
        _role_id: Snowflake,
    ) -> FetchResult<Option<Role>> {
        Ok(None)
    }

    async fn fetch_channel(&self, _channel_id: Snowflake) -> FetchResult<Option<Channel>> {
        Ok(None)
    }

    async fn fetch_guild(&self, _guild_id: Snowflake) -> FetchResult<Option<Guild>> {
        Ok(None)
    }

    async fn search_members(
        &self,
        _guild_id: Snowflake,
        _query: &str,
    ) -> FetchResult<Vec<GuildMember>> {
        Ok(Vec::new())
    }

    async fn search_roles(&self, _guild_id: Snowflake, _query: &str) -> FetchResult<Vec<Role>> {
        Ok(Vec::new())
    }

    async fn search_channels(
        &self,
        _guild_id: Snowflake,
        _query: &str,
    ) -> FetchResult<Vec<Channel>> {
        Ok(Vec::new())
    }

    async fn search_guilds(&self, _query: &str) -> FetchResult<Vec<Guild>> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Fault reporting
// =============================================================================

/// A panic raised inside a handler, captured at the invocation boundary.
#[derive(Clone)]
pub struct HandlerFault {
    message: String,
    backtrace: Arc<Backtrace>,
}

impl HandlerFault {
    /// Creates a fault from a panic message and the backtrace captured for it.
    pub fn new(message: impl Into<String>, backtrace: Backtrace) -> Self {
        Self {
            message: message.into(),
            backtrace: Arc::new(backtrace),
        }
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The backtrace captured when the panic was raised.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFault")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler panicked: {}", self.message)
    }
}

impl std::error::Error for HandlerFault {}

/// Receives handler faults.
pub trait PanicReporter: Send + Sync {
    /// Reports a fault raised while running `origin` (an event or command name).
    fn report(&self, origin: &str, fault: &HandlerFault);
}

/// Shared handle to a reporter.
pub type BoxedReporter = Arc<dyn PanicReporter>;

/// Reports faults through `tracing` at error level, backtrace included.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPanicReporter;

impl PanicReporter for LogPanicReporter {
    fn report(&self, origin: &str, fault: &HandlerFault) {
        error!(
            origin = %origin,
            message = %fault.message(),
            "Handler panicked\n{}",
            fault.backtrace()
        );
    }
}
