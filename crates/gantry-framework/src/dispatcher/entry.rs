//! Per-event registry records: a fixed decoder plus an append-only callback
//! list.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::event::{Event, Updated, names};
use crate::context::EventContext;
use crate::error::{DispatchError, DispatchResult};
use crate::handler::{BoxFuture, HandlerResult};
use gantry_core::Payload;

/// What decoding a payload produced.
#[derive(Debug)]
pub enum Decoded {
    /// Run this entry's callbacks with the event.
    Event(Event),
    /// Dispatch the same payload again under another event name.
    Redispatch(&'static str),
    /// Nothing to deliver.
    Skip,
}

/// Decodes a payload for one event name.
pub type DecodeFn = Arc<dyn Fn(&Payload) -> DispatchResult<Decoded> + Send + Sync>;

/// A type-erased event callback.
pub type EventCallback =
    Arc<dyn Fn(EventContext, Event) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Decoder and callbacks for one event name.
pub struct EventHandlerEntry {
    name: String,
    decode: DecodeFn,
    callbacks: RwLock<Vec<EventCallback>>,
}

impl EventHandlerEntry {
    /// Creates an entry with a fixed decoder and no callbacks.
    pub fn new<F>(name: impl Into<String>, decode: F) -> Self
    where
        F: Fn(&Payload) -> DispatchResult<Decoded> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            decode: Arc::new(decode),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// An entry for an application-defined event whose body is handed to
    /// callbacks as raw JSON.
    pub fn custom(name: impl Into<String>) -> Self {
        let name = name.into();
        let event = name.clone();
        Self::new(name, move |payload: &Payload| {
            let value: Value = payload
                .decode_data()
                .map_err(|err| DispatchError::decode(&event, err))?;
            Ok(Decoded::Event(Event::Custom(value)))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decode(&self, payload: &Payload) -> DispatchResult<Decoded> {
        (self.decode)(payload)
    }

    /// Appends a callback.
    pub fn push(&self, callback: EventCallback) {
        self.callbacks.write().push(callback);
    }

    /// Snapshot of the callbacks, in registration order.
    pub fn callbacks(&self) -> Vec<EventCallback> {
        self.callbacks.read().clone()
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.read().len()
    }
}

impl std::fmt::Debug for EventHandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlerEntry")
            .field("name", &self.name)
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

// ============================================================================
// Built-in catalogue
// ============================================================================

fn body<T: DeserializeOwned>(payload: &Payload, event: &str) -> DispatchResult<T> {
    payload
        .decode_data()
        .map_err(|err| DispatchError::decode(event, err))
}

fn extra<T: DeserializeOwned>(payload: &Payload, event: &str, key: &str) -> DispatchResult<Option<T>> {
    payload
        .decode_extra(key)
        .map_err(|err| DispatchError::decode(event, format!("extra '{key}': {err}")))
}

/// Decodes the body as the new state and `extra["before"]` as the old one.
fn updated<T: DeserializeOwned>(payload: &Payload, event: &str) -> DispatchResult<Updated<T>> {
    Ok(Updated {
        after: body(payload, event)?,
        before: extra(payload, event, "before")?,
    })
}

macro_rules! entry {
    ($name:expr, |$payload:ident| $decode:expr) => {
        EventHandlerEntry::new($name, |$payload: &Payload| -> DispatchResult<Decoded> {
            Ok(Decoded::Event($decode))
        })
    };
}

fn guild_create(payload: &Payload) -> DispatchResult<Decoded> {
    let event = names::GUILD_CREATE;
    let unavailable = extra::<bool>(payload, event, "unavailable")?.unwrap_or(false);
    let lazy = extra::<bool>(payload, event, "lazy")?.unwrap_or(false);
    Ok(if unavailable {
        Decoded::Redispatch(names::GUILD_AVAILABLE)
    } else if lazy {
        Decoded::Skip
    } else {
        Decoded::Redispatch(names::GUILD_JOIN)
    })
}

/// One entry per built-in event name.
pub fn builtin_entries() -> Vec<EventHandlerEntry> {
    use names::*;

    vec![
        entry!(READY, |p| Event::Ready(body(p, READY)?)),
        EventHandlerEntry::new(RESUMED, |_: &Payload| Ok(Decoded::Event(Event::Resumed))),
        entry!(MESSAGE_CREATE, |p| Event::MessageCreate(Arc::new(body(p, MESSAGE_CREATE)?))),
        entry!(MESSAGE_UPDATE, |p| Event::MessageUpdate(updated(p, MESSAGE_UPDATE)?)),
        entry!(MESSAGE_DELETE, |p| Event::MessageDelete(body(p, MESSAGE_DELETE)?)),
        EventHandlerEntry::new(GUILD_CREATE, guild_create),
        entry!(GUILD_JOIN, |p| Event::GuildJoin(body(p, GUILD_JOIN)?)),
        entry!(GUILD_AVAILABLE, |p| Event::GuildAvailable(body(p, GUILD_AVAILABLE)?)),
        entry!(GUILD_UPDATE, |p| Event::GuildUpdate(updated(p, GUILD_UPDATE)?)),
        entry!(GUILD_DELETE, |p| Event::GuildDelete(body(p, GUILD_DELETE)?)),
        entry!(GUILD_MEMBER_ADD, |p| Event::GuildMemberAdd(body(p, GUILD_MEMBER_ADD)?)),
        entry!(GUILD_MEMBER_UPDATE, |p| {
            Event::GuildMemberUpdate(updated(p, GUILD_MEMBER_UPDATE)?)
        }),
        entry!(GUILD_MEMBER_REMOVE, |p| {
            Event::GuildMemberRemove(body(p, GUILD_MEMBER_REMOVE)?)
        }),
        entry!(GUILD_ROLE_CREATE, |p| Event::GuildRoleCreate(body(p, GUILD_ROLE_CREATE)?)),
        entry!(GUILD_ROLE_UPDATE, |p| Event::GuildRoleUpdate(updated(p, GUILD_ROLE_UPDATE)?)),
        entry!(GUILD_ROLE_DELETE, |p| Event::GuildRoleDelete(body(p, GUILD_ROLE_DELETE)?)),
        entry!(CHANNEL_CREATE, |p| Event::ChannelCreate(body(p, CHANNEL_CREATE)?)),
        entry!(CHANNEL_UPDATE, |p| Event::ChannelUpdate(updated(p, CHANNEL_UPDATE)?)),
        entry!(CHANNEL_DELETE, |p| Event::ChannelDelete(body(p, CHANNEL_DELETE)?)),
        entry!(INTERACTION_CREATE, |p| {
            Event::InteractionCreate(Arc::new(body(p, INTERACTION_CREATE)?))
        }),
        // Only ever raised internally; a payload claiming to be ERROR is
        // not delivered.
        EventHandlerEntry::new(ERROR, |_: &Payload| Ok(Decoded::Skip)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn find(name: &str) -> EventHandlerEntry {
        builtin_entries()
            .into_iter()
            .find(|e| e.name() == name)
            .unwrap()
    }

    fn guild_payload() -> Payload {
        Payload::new("GUILD_CREATE", &json!({ "id": "1", "name": "g" })).unwrap()
    }

    #[test]
    fn test_guild_create_routing() {
        let entry = find(names::GUILD_CREATE);

        let joined = entry.decode(&guild_payload()).unwrap();
        assert!(matches!(joined, Decoded::Redispatch(names::GUILD_JOIN)));

        let payload = guild_payload().with_extra("unavailable", &true).unwrap();
        assert!(matches!(
            entry.decode(&payload).unwrap(),
            Decoded::Redispatch(names::GUILD_AVAILABLE)
        ));

        let payload = guild_payload()
            .with_extra("lazy", &true)
            .unwrap()
            .with_extra("unavailable", &false)
            .unwrap();
        assert!(matches!(entry.decode(&payload).unwrap(), Decoded::Skip));

        let payload = guild_payload().with_extra("lazy", &"yes").unwrap();
        assert!(matches!(entry.decode(&payload), Err(DispatchError::Decode { .. })));
    }

    #[test]
    fn test_update_reads_before_snapshot() {
        let entry = find(names::CHANNEL_UPDATE);
        let channel = json!({ "id": "5", "type": 0, "name": "new" });
        let before = json!({ "id": "5", "type": 0, "name": "old" });

        let payload = Payload::new("CHANNEL_UPDATE", &channel).unwrap();
        match entry.decode(&payload).unwrap() {
            Decoded::Event(Event::ChannelUpdate(update)) => {
                assert!(update.before.is_none());
                assert_eq!(update.after.name.as_deref(), Some("new"));
            }
            other => panic!("unexpected decode: {other:?}"),
        }

        let payload = payload.with_extra("before", &before).unwrap();
        match entry.decode(&payload).unwrap() {
            Decoded::Event(Event::ChannelUpdate(update)) => {
                assert_eq!(update.before.unwrap().name.as_deref(), Some("old"));
            }
            other => panic!("unexpected decode: {other:?}"),
        }

        let payload = Payload::new("CHANNEL_UPDATE", &channel)
            .unwrap()
            .with_extra("before", &json!({ "name": 3 }))
            .unwrap();
        assert!(entry.decode(&payload).is_err());
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let entry = find(names::MESSAGE_CREATE);
        let payload = Payload::new("MESSAGE_CREATE", &json!({ "nope": true })).unwrap();
        match entry.decode(&payload) {
            Err(DispatchError::Decode { event, .. }) => assert_eq!(event, "MESSAGE_CREATE"),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn test_custom_entry_passes_raw_json() {
        let entry = EventHandlerEntry::custom("PRESENCE_UPDATE");
        let payload = Payload::new("PRESENCE_UPDATE", &json!({ "status": "idle" })).unwrap();
        match entry.decode(&payload).unwrap() {
            Decoded::Event(Event::Custom(value)) => assert_eq!(value["status"], "idle"),
            other => panic!("unexpected decode: {other:?}"),
        }
    }
}
