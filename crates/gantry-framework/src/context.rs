//! Invocation contexts.
//!
//! - [`EventContext`]: built once per dispatched payload and cloned into every
//!   callback. Carries the guild the event belongs to, the application the
//!   payload was routed for and the bot identity learned from `READY`.
//! - [`CommandContext`]: handed to text command checks and handlers.
//! - [`InteractionContext`]: handed to structured command handlers.
//!
//! The command trees also keep per-invocation traversal state
//! ([`TextInvocation`], [`StructuredInvocation`]); it lives only for the
//! duration of one resolution and is never shared between tasks.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::arena::NodeId;
use crate::argument::Arguments;
use crate::command::StringView;
use gantry_core::model::{Interaction, Message, ResolvedData, User};
use gantry_core::{BoxedFetcher, NoopFetcher, PayloadMetadata, Snowflake, TraceEntry};

// =============================================================================
// EventContext
// =============================================================================

/// Context shared by the callbacks of one dispatched event.
#[derive(Clone)]
pub struct EventContext {
    event_name: String,
    guild_id: Option<Snowflake>,
    metadata: PayloadMetadata,
    identity: Option<User>,
    trace: Arc<[TraceEntry]>,
    fetcher: BoxedFetcher,
}

impl EventContext {
    /// Creates a context for `event_name` with no guild, metadata or identity.
    pub fn new(event_name: impl Into<String>, fetcher: BoxedFetcher) -> Self {
        Self {
            event_name: event_name.into(),
            guild_id: None,
            metadata: PayloadMetadata::default(),
            identity: None,
            trace: Arc::from(Vec::new()),
            fetcher,
        }
    }

    /// A context backed by [`NoopFetcher`], for setup code and tests.
    pub fn detached(event_name: impl Into<String>) -> Self {
        Self::new(event_name, Arc::new(NoopFetcher))
    }

    pub fn with_guild(mut self, guild_id: Option<Snowflake>) -> Self {
        self.guild_id = guild_id;
        self
    }

    pub fn with_metadata(mut self, metadata: PayloadMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_identity(mut self, identity: Option<User>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_trace(mut self, trace: Vec<TraceEntry>) -> Self {
        self.trace = Arc::from(trace);
        self
    }

    /// The name the event was dispatched under.
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// The guild the event belongs to, if any.
    pub fn guild_id(&self) -> Option<Snowflake> {
        self.guild_id
    }

    /// The application the payload was routed for.
    pub fn application(&self) -> &str {
        &self.metadata.application
    }

    /// The identifier of the gateway shard or session that produced the payload.
    pub fn identifier(&self) -> &str {
        &self.metadata.identifier
    }

    /// The bot user for this payload's identifier, once `READY` was seen.
    pub fn identity(&self) -> Option<&User> {
        self.identity.as_ref()
    }

    /// Timestamps recorded by upstream stages.
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// The remote lookup collaborator.
    pub fn fetcher(&self) -> &BoxedFetcher {
        &self.fetcher
    }
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext")
            .field("event_name", &self.event_name)
            .field("guild_id", &self.guild_id)
            .field("metadata", &self.metadata)
            .field("identity", &self.identity.as_ref().map(|u| u.id))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CommandContext
// =============================================================================

/// Context handed to text command checks and handlers.
#[derive(Debug, Clone)]
pub struct CommandContext {
    event: EventContext,
    message: Option<Arc<Message>>,
    prefix: String,
    command: String,
    invoked_with: String,
    args: Arc<Arguments>,
}

impl CommandContext {
    /// Creates a context for a command issued outside any message.
    pub fn new(event: EventContext) -> Self {
        Self {
            event,
            message: None,
            prefix: String::new(),
            command: String::new(),
            invoked_with: String::new(),
            args: Arc::new(Arguments::new()),
        }
    }

    /// Creates a context for a command carried by `message`.
    pub fn from_message(event: EventContext, message: Arc<Message>) -> Self {
        let guild_id = event.guild_id().or(message.guild_id);
        let mut ctx = Self::new(event.with_guild(guild_id));
        ctx.message = Some(message);
        ctx
    }

    /// Records the prefix the command was invoked with.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub(crate) fn targeting(
        &self,
        command: String,
        invoked_with: &str,
        args: Arguments,
    ) -> Self {
        Self {
            command,
            invoked_with: invoked_with.to_string(),
            args: Arc::new(args),
            ..self.clone()
        }
    }

    pub fn event(&self) -> &EventContext {
        &self.event
    }

    /// The message carrying the command, if it came from one.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_deref()
    }

    /// The author of the carrying message.
    pub fn author(&self) -> Option<&User> {
        self.message.as_deref().map(|m| &m.author)
    }

    pub fn guild_id(&self) -> Option<Snowflake> {
        self.event.guild_id()
    }

    /// The prefix that matched, empty when none was involved.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Qualified name of the command being run.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The name or alias the final path segment was typed as.
    pub fn invoked_with(&self) -> &str {
        &self.invoked_with
    }

    /// Arguments resolved for this invocation. Empty for group handlers.
    pub fn args(&self) -> &Arguments {
        &self.args
    }

    pub fn fetcher(&self) -> &BoxedFetcher {
        self.event.fetcher()
    }
}

// =============================================================================
// InteractionContext
// =============================================================================

/// Context handed to structured command handlers.
#[derive(Debug, Clone)]
pub struct InteractionContext {
    event: EventContext,
    interaction: Arc<Interaction>,
    command: String,
    args: Arc<Arguments>,
}

impl InteractionContext {
    /// Creates a context for `interaction`.
    pub fn new(event: EventContext, interaction: Arc<Interaction>) -> Self {
        let guild_id = event.guild_id().or(interaction.guild_id);
        Self {
            event: event.with_guild(guild_id),
            interaction,
            command: String::new(),
            args: Arc::new(Arguments::new()),
        }
    }

    pub(crate) fn targeting(&self, command: String, args: Arguments) -> Self {
        Self {
            command,
            args: Arc::new(args),
            ..self.clone()
        }
    }

    pub fn event(&self) -> &EventContext {
        &self.event
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// The invoking user.
    pub fn invoker(&self) -> Option<&User> {
        self.interaction.invoker()
    }

    pub fn guild_id(&self) -> Option<Snowflake> {
        self.event.guild_id()
    }

    /// Qualified name of the command being run.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &Arguments {
        &self.args
    }

    pub fn fetcher(&self) -> &BoxedFetcher {
        self.event.fetcher()
    }
}

// =============================================================================
// Traversal state
// =============================================================================

/// In-flight state of one text command resolution.
pub struct TextInvocation {
    /// Cursor over the command text, advanced one name per tree level.
    pub view: StringView,
    /// Nodes entered so far, root first.
    pub path: Vec<NodeId>,
    /// The caller's context, specialised per node before handlers run.
    pub base: CommandContext,
}

impl TextInvocation {
    pub fn new(base: CommandContext, view: StringView) -> Self {
        Self {
            view,
            path: Vec::new(),
            base,
        }
    }
}

/// In-flight state of one structured command resolution.
pub struct StructuredInvocation {
    /// Option values flattened across nesting levels, deeper values winning.
    pub options: HashMap<String, Value>,
    /// Entities the platform resolved for the option values.
    pub resolved: Arc<ResolvedData>,
    /// Nodes entered so far, root first.
    pub path: Vec<NodeId>,
    pub base: InteractionContext,
}

impl StructuredInvocation {
    pub fn new(
        base: InteractionContext,
        options: HashMap<String, Value>,
        resolved: Arc<ResolvedData>,
    ) -> Self {
        Self {
            options,
            resolved,
            path: Vec::new(),
            base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::model::User;

    fn user(id: u64) -> User {
        serde_json::from_value(serde_json::json!({"id": id.to_string(), "username": "bot"}))
            .unwrap()
    }

    #[test]
    fn test_event_context_builders() {
        let ctx = EventContext::detached("MESSAGE_CREATE")
            .with_guild(Some(Snowflake(42)))
            .with_metadata(PayloadMetadata {
                application: "app".into(),
                identifier: "shard-0".into(),
            })
            .with_identity(Some(user(7)));
        assert_eq!(ctx.event_name(), "MESSAGE_CREATE");
        assert_eq!(ctx.guild_id(), Some(Snowflake(42)));
        assert_eq!(ctx.application(), "app");
        assert_eq!(ctx.identifier(), "shard-0");
        assert_eq!(ctx.identity().map(|u| u.id), Some(Snowflake(7)));
        assert!(ctx.trace().is_empty());
    }

    #[test]
    fn test_command_context_targeting_keeps_prefix() {
        let base = CommandContext::new(EventContext::detached("MESSAGE_CREATE")).with_prefix("!");
        let ctx = base.targeting("mod ban".into(), "b", Arguments::new());
        assert_eq!(ctx.prefix(), "!");
        assert_eq!(ctx.command(), "mod ban");
        assert_eq!(ctx.invoked_with(), "b");
        assert!(ctx.args().is_empty());
    }
}
