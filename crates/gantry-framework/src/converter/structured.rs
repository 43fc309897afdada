//! Converters for pre-decoded interaction option values.
//!
//! Values arrive already typed by the platform, so these converters never
//! tokenize. Users, members, roles and channels are read from the
//! interaction's resolved-entity table; only guilds go through the fetcher.

use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use super::{Converter, ConverterTable};
use crate::argument::{Argument, ArgumentType, Colour};
use crate::context::InteractionContext;
use crate::error::{CommandError, CommandResult};
use gantry_core::model::ResolvedData;
use gantry_core::{BoxedFetcher, Snowflake};

/// Everything a structured converter gets to work with.
#[derive(Clone)]
pub struct StructuredRequest {
    /// The option value as sent by the platform.
    pub value: Value,
    /// The declared tag of the parameter being resolved.
    pub kind: ArgumentType,
    pub guild_id: Option<Snowflake>,
    /// Entities the platform resolved for this interaction's options.
    pub resolved: Arc<ResolvedData>,
    pub fetcher: BoxedFetcher,
}

impl StructuredRequest {
    fn literal(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn not_found(&self) -> CommandError {
        CommandError::not_found(self.kind, self.literal())
    }

    fn bad_literal(&self) -> CommandError {
        CommandError::bad_literal(self.kind, self.literal())
    }

    /// Reads the value as an id, accepting both string and integer encodings.
    fn id(&self) -> CommandResult<Snowflake> {
        let id = match &self.value {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64().map(Snowflake),
            _ => None,
        };
        id.ok_or_else(|| self.bad_literal())
    }
}

/// A converter over [`StructuredRequest`]s.
pub type StructuredConverter = Converter<StructuredRequest>;

// ============================================================================
// Registry
// ============================================================================

/// Tag → converter map for the structured command path.
pub struct StructuredConverterRegistry {
    table: ConverterTable<StructuredRequest>,
}

impl StructuredConverterRegistry {
    /// Creates a registry with no converters.
    pub fn empty() -> Self {
        Self {
            table: ConverterTable::default(),
        }
    }

    /// Creates a registry with a converter for every [`ArgumentType`].
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        for (kind, converter) in builtins() {
            registry.register(kind, converter);
        }
        registry
    }

    /// Registers `converter` for `kind`, replacing any previous one.
    pub fn register(&self, kind: ArgumentType, converter: StructuredConverter) {
        if self.table.register(kind, converter).is_some() {
            trace!(kind = %kind, "Replaced structured converter");
        }
    }

    /// Looks up the converter for `kind`.
    pub fn get(&self, kind: ArgumentType) -> CommandResult<StructuredConverter> {
        self.table.get(kind)
    }

    pub fn contains(&self, kind: ArgumentType) -> bool {
        self.table.contains(kind)
    }

    /// Converts an option value as `kind`.
    pub async fn convert(
        &self,
        kind: ArgumentType,
        value: Value,
        resolved: Arc<ResolvedData>,
        ctx: &InteractionContext,
    ) -> CommandResult<Argument> {
        let converter = self.get(kind)?;
        converter
            .convert(StructuredRequest {
                value,
                kind,
                guild_id: ctx.guild_id(),
                resolved,
                fetcher: Arc::clone(ctx.fetcher()),
            })
            .await
    }
}

impl Default for StructuredConverterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for StructuredConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredConverterRegistry")
            .field("kinds", &self.table.kinds())
            .finish()
    }
}

// ============================================================================
// Built-in converters
// ============================================================================

fn builtins() -> Vec<(ArgumentType, StructuredConverter)> {
    use ArgumentType as T;

    let mut converters = vec![
        (T::Snowflake, Converter::new(snowflake)),
        (T::Member, Converter::new(member)),
        (T::User, Converter::new(user)),
        (T::Role, Converter::new(role)),
        (T::Guild, Converter::new(guild)),
        (T::Colour, Converter::new(colour)),
        (T::Bool, Converter::new(boolean)),
        (T::Int, Converter::new(int)),
        (T::Float, Converter::new(float)),
        (T::String, Converter::new(string)),
        (T::Fill, Converter::new(string)),
    ];
    for kind in [
        T::Channel,
        T::TextChannel,
        T::VoiceChannel,
        T::CategoryChannel,
        T::ThreadChannel,
        T::StageChannel,
        T::ForumChannel,
    ] {
        converters.push((kind, Converter::new(channel)));
    }
    converters
}

async fn snowflake(req: StructuredRequest) -> CommandResult<Argument> {
    req.id().map(Argument::Snowflake)
}

async fn user(req: StructuredRequest) -> CommandResult<Argument> {
    let id = req.id()?;
    req.resolved
        .users
        .get(&id)
        .cloned()
        .map(Argument::User)
        .ok_or_else(|| req.not_found())
}

async fn member(req: StructuredRequest) -> CommandResult<Argument> {
    let id = req.id()?;
    let mut member = req
        .resolved
        .members
        .get(&id)
        .cloned()
        .ok_or_else(|| req.not_found())?;
    // Resolved members omit the user object and guild id.
    if member.user.is_none() {
        member.user = req.resolved.users.get(&id).cloned();
    }
    if member.guild_id.is_none() {
        member.guild_id = req.guild_id;
    }
    Ok(Argument::Member(member))
}

async fn role(req: StructuredRequest) -> CommandResult<Argument> {
    let id = req.id()?;
    req.resolved
        .roles
        .get(&id)
        .cloned()
        .map(Argument::Role)
        .ok_or_else(|| req.not_found())
}

async fn channel(req: StructuredRequest) -> CommandResult<Argument> {
    let id = req.id()?;
    let tag = req.kind;
    req.resolved
        .channels
        .get(&id)
        .filter(|c| tag.accepts_channel(c.kind))
        .cloned()
        .map(|channel| Argument::Channel { tag, channel })
        .ok_or_else(|| req.not_found())
}

async fn guild(req: StructuredRequest) -> CommandResult<Argument> {
    let id = req.id()?;
    req.fetcher
        .fetch_guild(id)
        .await?
        .map(Argument::Guild)
        .ok_or_else(|| req.not_found())
}

async fn colour(req: StructuredRequest) -> CommandResult<Argument> {
    match &req.value {
        Value::String(s) => s.parse::<Colour>().map(Argument::Colour),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|&v| v <= 0xFF_FFFF)
            .map(|v| {
                let [_, r, g, b] = v.to_be_bytes();
                Argument::Colour(Colour::new(r, g, b, 0xFF))
            })
            .ok_or_else(|| req.bad_literal()),
        _ => Err(req.bad_literal()),
    }
}

async fn boolean(req: StructuredRequest) -> CommandResult<Argument> {
    req.value
        .as_bool()
        .map(Argument::Bool)
        .ok_or_else(|| req.bad_literal())
}

async fn int(req: StructuredRequest) -> CommandResult<Argument> {
    req.value
        .as_i64()
        .map(Argument::Int)
        .ok_or_else(|| req.bad_literal())
}

async fn float(req: StructuredRequest) -> CommandResult<Argument> {
    req.value
        .as_f64()
        .filter(|v| v.is_finite())
        .map(Argument::Float)
        .ok_or_else(|| req.bad_literal())
}

async fn string(req: StructuredRequest) -> CommandResult<Argument> {
    let kind = req.kind;
    match req.value {
        Value::String(s) if kind == ArgumentType::Fill => Ok(Argument::Fill(s)),
        Value::String(s) => Ok(Argument::String(s)),
        _ => Err(req.bad_literal()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EventContext;
    use gantry_core::model::Interaction;
    use serde_json::json;

    fn resolved() -> Arc<ResolvedData> {
        Arc::new(
            serde_json::from_value(json!({
                "users": { "111111111111111111": { "id": "111111111111111111", "username": "alice" } },
                "members": { "111111111111111111": { "nick": "Al", "roles": [] } },
                "roles": { "222222222222222222": { "id": "222222222222222222", "name": "mods" } },
                "channels": {
                    "333333333333333333": { "id": "333333333333333333", "type": 2, "name": "voice" }
                }
            }))
            .unwrap(),
        )
    }

    fn ctx() -> InteractionContext {
        let interaction: Interaction = serde_json::from_value(json!({
            "id": "1",
            "application_id": "2",
            "type": 2,
            "guild_id": "100",
            "token": "t"
        }))
        .unwrap();
        InteractionContext::new(EventContext::detached("INTERACTION_CREATE"), Arc::new(interaction))
    }

    async fn convert(kind: ArgumentType, value: Value) -> CommandResult<Argument> {
        StructuredConverterRegistry::with_builtins()
            .convert(kind, value, resolved(), &ctx())
            .await
    }

    #[tokio::test]
    async fn test_primitive_values() {
        assert_eq!(convert(ArgumentType::Int, json!(7)).await.unwrap(), Argument::Int(7));
        assert_eq!(
            convert(ArgumentType::Bool, json!(true)).await.unwrap(),
            Argument::Bool(true)
        );
        assert_eq!(
            convert(ArgumentType::Float, json!(1.5)).await.unwrap(),
            Argument::Float(1.5)
        );
        assert_eq!(
            convert(ArgumentType::Fill, json!("a b c")).await.unwrap(),
            Argument::Fill("a b c".into())
        );
        assert!(matches!(
            convert(ArgumentType::Int, json!("7")).await,
            Err(CommandError::BadLiteral { kind: ArgumentType::Int, .. })
        ));
    }

    #[tokio::test]
    async fn test_member_merges_resolved_user() {
        let arg = convert(ArgumentType::Member, json!("111111111111111111")).await.unwrap();
        let member = arg.unwrap_member();
        assert_eq!(member.nick.as_deref(), Some("Al"));
        assert_eq!(member.id(), Some(Snowflake(111111111111111111)));
        assert_eq!(member.guild_id, Some(Snowflake(100)));
    }

    #[tokio::test]
    async fn test_entities_come_from_resolved_table() {
        let role = convert(ArgumentType::Role, json!("222222222222222222")).await.unwrap();
        assert_eq!(role.unwrap_role().name, "mods");

        assert!(matches!(
            convert(ArgumentType::User, json!("999999999999999999")).await,
            Err(CommandError::NotFound { kind: ArgumentType::User, .. })
        ));
    }

    #[tokio::test]
    async fn test_channel_flavour() {
        assert!(convert(ArgumentType::VoiceChannel, json!("333333333333333333")).await.is_ok());
        assert!(matches!(
            convert(ArgumentType::TextChannel, json!("333333333333333333")).await,
            Err(CommandError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_colour_from_string_or_number() {
        let from_str = convert(ArgumentType::Colour, json!("#112233")).await.unwrap();
        let from_num = convert(ArgumentType::Colour, json!(0x112233)).await.unwrap();
        assert_eq!(from_str, from_num);
    }

    #[tokio::test]
    async fn test_guild_lookup_not_found_with_noop_fetcher() {
        assert!(matches!(
            convert(ArgumentType::Guild, json!("100")).await,
            Err(CommandError::NotFound { kind: ArgumentType::Guild, .. })
        ));
    }
}
