//! Canonical decoded events and their typed markers.

use std::sync::Arc;

use serde_json::Value;

use gantry_core::model::{
    Channel, Guild, GuildMember, GuildMemberRemove, GuildRoleDelete, GuildRoleEvent, Interaction,
    Message, MessageDelete, Ready, UnavailableGuild,
};
use gantry_core::{BoxError, HandlerFault, Snowflake};

/// Event names known to the built-in catalogue.
pub mod names {
    pub const READY: &str = "READY";
    pub const RESUMED: &str = "RESUMED";
    pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";
    pub const MESSAGE_UPDATE: &str = "MESSAGE_UPDATE";
    pub const MESSAGE_DELETE: &str = "MESSAGE_DELETE";
    pub const GUILD_CREATE: &str = "GUILD_CREATE";
    pub const GUILD_JOIN: &str = "GUILD_JOIN";
    pub const GUILD_AVAILABLE: &str = "GUILD_AVAILABLE";
    pub const GUILD_UPDATE: &str = "GUILD_UPDATE";
    pub const GUILD_DELETE: &str = "GUILD_DELETE";
    pub const GUILD_MEMBER_ADD: &str = "GUILD_MEMBER_ADD";
    pub const GUILD_MEMBER_UPDATE: &str = "GUILD_MEMBER_UPDATE";
    pub const GUILD_MEMBER_REMOVE: &str = "GUILD_MEMBER_REMOVE";
    pub const GUILD_ROLE_CREATE: &str = "GUILD_ROLE_CREATE";
    pub const GUILD_ROLE_UPDATE: &str = "GUILD_ROLE_UPDATE";
    pub const GUILD_ROLE_DELETE: &str = "GUILD_ROLE_DELETE";
    pub const CHANNEL_CREATE: &str = "CHANNEL_CREATE";
    pub const CHANNEL_UPDATE: &str = "CHANNEL_UPDATE";
    pub const CHANNEL_DELETE: &str = "CHANNEL_DELETE";
    pub const INTERACTION_CREATE: &str = "INTERACTION_CREATE";
    pub const ERROR: &str = "ERROR";
}

/// An update-shaped event: the new state plus, when the producer sent one,
/// the state before the change.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated<T> {
    pub before: Option<T>,
    pub after: T,
}

/// What went wrong in a callback that was diverted to `ERROR`.
#[derive(Debug, Clone)]
pub enum Failure {
    /// The callback returned an error.
    Error(Arc<dyn std::error::Error + Send + Sync>),
    /// The callback panicked.
    Fault(HandlerFault),
}

impl From<BoxError> for Failure {
    fn from(err: BoxError) -> Self {
        Self::Error(Arc::from(err))
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(err) => write!(f, "{err}"),
            Self::Fault(fault) => write!(f, "{fault}"),
        }
    }
}

/// Body of the synthetic `ERROR` event.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// The event whose callback failed.
    pub origin: String,
    pub failure: Failure,
}

/// A decoded payload.
#[derive(Debug, Clone)]
pub enum Event {
    Ready(Ready),
    Resumed,
    MessageCreate(Arc<Message>),
    MessageUpdate(Updated<Message>),
    MessageDelete(MessageDelete),
    GuildJoin(Guild),
    GuildAvailable(Guild),
    GuildUpdate(Updated<Guild>),
    GuildDelete(UnavailableGuild),
    GuildMemberAdd(GuildMember),
    GuildMemberUpdate(Updated<GuildMember>),
    GuildMemberRemove(GuildMemberRemove),
    GuildRoleCreate(GuildRoleEvent),
    GuildRoleUpdate(Updated<GuildRoleEvent>),
    GuildRoleDelete(GuildRoleDelete),
    ChannelCreate(Channel),
    ChannelUpdate(Updated<Channel>),
    ChannelDelete(Channel),
    InteractionCreate(Arc<Interaction>),
    Error(ErrorEvent),
    /// Body of an event registered at startup by the application.
    Custom(Value),
}

impl Event {
    /// The guild this event belongs to, if any.
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::Ready(_) | Self::Resumed | Self::Error(_) => None,
            Self::MessageCreate(message) => message.guild_id,
            Self::MessageUpdate(update) => update.after.guild_id,
            Self::MessageDelete(delete) => delete.guild_id,
            Self::GuildJoin(guild) | Self::GuildAvailable(guild) => Some(guild.id),
            Self::GuildUpdate(update) => Some(update.after.id),
            Self::GuildDelete(guild) => Some(guild.id),
            Self::GuildMemberAdd(member) => member.guild_id,
            Self::GuildMemberUpdate(update) => update.after.guild_id,
            Self::GuildMemberRemove(remove) => Some(remove.guild_id),
            Self::GuildRoleCreate(event) => Some(event.guild_id),
            Self::GuildRoleUpdate(update) => Some(update.after.guild_id),
            Self::GuildRoleDelete(delete) => Some(delete.guild_id),
            Self::ChannelCreate(channel) | Self::ChannelDelete(channel) => channel.guild_id,
            Self::ChannelUpdate(update) => update.after.guild_id,
            Self::InteractionCreate(interaction) => interaction.guild_id,
            Self::Custom(value) => value
                .get("guild_id")
                .and_then(|id| serde_json::from_value(id.clone()).ok()),
        }
    }
}

// ============================================================================
// Typed markers
// ============================================================================

/// Compile-time description of one event: its name and the body type its
/// callbacks receive.
///
/// ```rust,ignore
/// dispatcher.on::<events::MessageCreate, _, _>(|ctx, message| async move {
///     println!("{}", message.content);
///     Ok(())
/// });
/// ```
pub trait EventKind: Send + Sync + 'static {
    /// The event name this marker registers under.
    const NAME: &'static str;

    /// What callbacks receive.
    type Data: Send + 'static;

    /// Pulls this kind's body out of a decoded event.
    fn extract(event: &Event) -> Option<Self::Data>;
}

macro_rules! event_kinds {
    ($($(#[$meta:meta])* $marker:ident => $name:ident, $variant:ident($data:ty);)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $marker;

            impl EventKind for $marker {
                const NAME: &'static str = super::names::$name;
                type Data = $data;

                fn extract(event: &Event) -> Option<Self::Data> {
                    match event {
                        Event::$variant(data) => Some(data.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Markers for the built-in events.
pub mod events {
    use super::*;

    event_kinds! {
        Ready => READY, Ready(gantry_core::model::Ready);
        MessageCreate => MESSAGE_CREATE, MessageCreate(Arc<Message>);
        MessageUpdate => MESSAGE_UPDATE, MessageUpdate(Updated<Message>);
        MessageDelete => MESSAGE_DELETE, MessageDelete(gantry_core::model::MessageDelete);
        /// The bot was added to a guild.
        GuildJoin => GUILD_JOIN, GuildJoin(Guild);
        /// A guild came back after an outage, or finished loading.
        GuildAvailable => GUILD_AVAILABLE, GuildAvailable(Guild);
        GuildUpdate => GUILD_UPDATE, GuildUpdate(Updated<Guild>);
        GuildDelete => GUILD_DELETE, GuildDelete(UnavailableGuild);
        GuildMemberAdd => GUILD_MEMBER_ADD, GuildMemberAdd(GuildMember);
        GuildMemberUpdate => GUILD_MEMBER_UPDATE, GuildMemberUpdate(Updated<GuildMember>);
        GuildMemberRemove => GUILD_MEMBER_REMOVE, GuildMemberRemove(gantry_core::model::GuildMemberRemove);
        GuildRoleCreate => GUILD_ROLE_CREATE, GuildRoleCreate(GuildRoleEvent);
        GuildRoleUpdate => GUILD_ROLE_UPDATE, GuildRoleUpdate(Updated<GuildRoleEvent>);
        GuildRoleDelete => GUILD_ROLE_DELETE, GuildRoleDelete(gantry_core::model::GuildRoleDelete);
        ChannelCreate => CHANNEL_CREATE, ChannelCreate(Channel);
        ChannelUpdate => CHANNEL_UPDATE, ChannelUpdate(Updated<Channel>);
        ChannelDelete => CHANNEL_DELETE, ChannelDelete(Channel);
        InteractionCreate => INTERACTION_CREATE, InteractionCreate(Arc<Interaction>);
        /// A callback of another event failed.
        Error => ERROR, Error(ErrorEvent);
    }

    /// The session was resumed.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Resumed;

    impl EventKind for Resumed {
        const NAME: &'static str = super::names::RESUMED;
        type Data = ();

        fn extract(event: &Event) -> Option<()> {
            matches!(event, Event::Resumed).then_some(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_markers_extract_only_their_variant() {
        let event = Event::Custom(json!({ "guild_id": "5" }));
        assert!(events::MessageCreate::extract(&event).is_none());
        assert_eq!(event.guild_id(), Some(Snowflake(5)));
        assert_eq!(events::Resumed::extract(&Event::Resumed), Some(()));
        assert_eq!(events::Error::NAME, "ERROR");
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure::from(BoxError::from("bad input"));
        assert_eq!(failure.to_string(), "bad input");
    }
}
