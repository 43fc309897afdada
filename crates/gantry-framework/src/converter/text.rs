//! Converters for tokens read out of command text.

use std::sync::Arc;

use tracing::trace;

use super::mention::{MentionKind, extract_id};
use super::ranker::{DefaultRanker, NameRanker};
use super::{Converter, ConverterTable, pick};
use crate::argument::{Argument, ArgumentType, Colour};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use gantry_core::model::{Channel, User};
use gantry_core::{BoxedFetcher, FetchError, Snowflake};

/// Everything a text converter gets to work with.
#[derive(Clone)]
pub struct TextRequest {
    /// The raw token (or the rest of the input, for fill parameters).
    pub token: String,
    /// The declared tag of the parameter being resolved.
    pub kind: ArgumentType,
    /// Guild the command was issued in, needed for member and role lookups.
    pub guild_id: Option<Snowflake>,
    pub fetcher: BoxedFetcher,
    pub ranker: Arc<dyn NameRanker>,
}

impl TextRequest {
    fn not_found(&self) -> CommandError {
        CommandError::not_found(self.kind, &self.token)
    }

    fn bad_literal(&self) -> CommandError {
        CommandError::bad_literal(self.kind, &self.token)
    }

    fn guild(&self) -> CommandResult<Snowflake> {
        self.guild_id.ok_or(CommandError::Fetch(FetchError::NoGuild))
    }
}

/// A converter over [`TextRequest`]s.
pub type TextConverter = Converter<TextRequest>;

// ============================================================================
// Registry
// ============================================================================

/// Tag → converter map for the text command path.
pub struct ConverterRegistry {
    table: ConverterTable<TextRequest>,
    ranker: Arc<dyn NameRanker>,
}

impl ConverterRegistry {
    /// Creates a registry with no converters.
    pub fn empty() -> Self {
        Self {
            table: ConverterTable::default(),
            ranker: Arc::new(DefaultRanker),
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

    /// Replaces the ranker used by by-name lookups.
    pub fn with_ranker(mut self, ranker: Arc<dyn NameRanker>) -> Self {
        self.ranker = ranker;
        self
    }

    /// Registers `converter` for `kind`, replacing any previous one.
    pub fn register(&self, kind: ArgumentType, converter: TextConverter) {
        if self.table.register(kind, converter).is_some() {
            trace!(kind = %kind, "Replaced text converter");
        }
    }

    /// Looks up the converter for `kind`.
    pub fn get(&self, kind: ArgumentType) -> CommandResult<TextConverter> {
        self.table.get(kind)
    }

    pub fn contains(&self, kind: ArgumentType) -> bool {
        self.table.contains(kind)
    }

    /// Builds the request a converter receives for `token` under `ctx`.
    pub fn request(&self, kind: ArgumentType, token: String, ctx: &CommandContext) -> TextRequest {
        TextRequest {
            token,
            kind,
            guild_id: ctx.guild_id(),
            fetcher: Arc::clone(ctx.fetcher()),
            ranker: Arc::clone(&self.ranker),
        }
    }

    /// Converts `token` as `kind`.
    pub async fn convert(
        &self,
        kind: ArgumentType,
        token: String,
        ctx: &CommandContext,
    ) -> CommandResult<Argument> {
        let converter = self.get(kind)?;
        converter.convert(self.request(kind, token, ctx)).await
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("kinds", &self.table.kinds())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Built-in converters
// ============================================================================

const TRUE_TOKENS: &[&str] = &["yes", "y", "true", "t", "1", "enable", "on"];
const FALSE_TOKENS: &[&str] = &["no", "n", "false", "f", "0", "disable", "off"];

fn builtins() -> Vec<(ArgumentType, TextConverter)> {
    use ArgumentType as T;

    let mut converters = vec![
        (T::Snowflake, Converter::new(snowflake)),
        (T::Member, Converter::new(member)),
        (T::User, Converter::new(user)),
        (T::Role, Converter::new(role)),
        (T::Guild, Converter::new(guild)),
        (T::Colour, Converter::new(colour)),
        (T::Bool, Converter::new(boolean).with_default(Argument::Bool(false))),
        (T::Int, Converter::new(int).with_default(Argument::Int(0))),
        (T::Float, Converter::new(float).with_default(Argument::Float(0.0))),
        (
            T::String,
            Converter::new(string).with_default(Argument::String(String::new())),
        ),
        (
            T::Fill,
            Converter::new(fill).with_default(Argument::Fill(String::new())),
        ),
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

async fn snowflake(req: TextRequest) -> CommandResult<Argument> {
    extract_id(&req.token, MentionKind::Any)
        .map(Argument::Snowflake)
        .ok_or_else(|| req.bad_literal())
}

async fn member(req: TextRequest) -> CommandResult<Argument> {
    let guild_id = req.guild()?;
    if let Some(id) = extract_id(&req.token, MentionKind::User) {
        return req
            .fetcher
            .fetch_member(guild_id, id)
            .await?
            .map(Argument::Member)
            .ok_or_else(|| req.not_found());
    }

    let members = req.fetcher.search_members(guild_id, &req.token).await?;
    pick(&*req.ranker, &req.token, members, |m| {
        m.display_name().unwrap_or_default()
    })
    .map(Argument::Member)
    .ok_or_else(|| req.not_found())
}

async fn user(req: TextRequest) -> CommandResult<Argument> {
    if let Some(id) = extract_id(&req.token, MentionKind::User) {
        return req
            .fetcher
            .fetch_user(id)
            .await?
            .map(Argument::User)
            .ok_or_else(|| req.not_found());
    }

    // Users have no global search; fall back to the guild's members.
    let Some(guild_id) = req.guild_id else {
        return Err(req.not_found());
    };
    let users: Vec<User> = req
        .fetcher
        .search_members(guild_id, &req.token)
        .await?
        .into_iter()
        .filter_map(|m| m.user)
        .collect();
    pick(&*req.ranker, &req.token, users, |u| u.display_name())
        .map(Argument::User)
        .ok_or_else(|| req.not_found())
}

async fn role(req: TextRequest) -> CommandResult<Argument> {
    let guild_id = req.guild()?;
    if let Some(id) = extract_id(&req.token, MentionKind::Role) {
        return req
            .fetcher
            .fetch_role(guild_id, id)
            .await?
            .map(Argument::Role)
            .ok_or_else(|| req.not_found());
    }

    let roles = req.fetcher.search_roles(guild_id, &req.token).await?;
    pick(&*req.ranker, &req.token, roles, |r| r.name.as_str())
        .map(Argument::Role)
        .ok_or_else(|| req.not_found())
}

async fn channel(req: TextRequest) -> CommandResult<Argument> {
    let tag = req.kind;
    if let Some(id) = extract_id(&req.token, MentionKind::Channel) {
        return req
            .fetcher
            .fetch_channel(id)
            .await?
            .filter(|c| tag.accepts_channel(c.kind))
            .map(|channel| Argument::Channel { tag, channel })
            .ok_or_else(|| req.not_found());
    }

    let guild_id = req.guild()?;
    let query = req.token.trim_start_matches('#');
    let channels: Vec<Channel> = req
        .fetcher
        .search_channels(guild_id, query)
        .await?
        .into_iter()
        .filter(|c| tag.accepts_channel(c.kind))
        .collect();
    pick(&*req.ranker, query, channels, |c| {
        c.name.as_deref().unwrap_or_default()
    })
    .map(|channel| Argument::Channel { tag, channel })
    .ok_or_else(|| req.not_found())
}

async fn guild(req: TextRequest) -> CommandResult<Argument> {
    if let Some(id) = extract_id(&req.token, MentionKind::Any) {
        return req
            .fetcher
            .fetch_guild(id)
            .await?
            .map(Argument::Guild)
            .ok_or_else(|| req.not_found());
    }

    let guilds = req.fetcher.search_guilds(&req.token).await?;
    pick(&*req.ranker, &req.token, guilds, |g| g.name.as_str())
        .map(Argument::Guild)
        .ok_or_else(|| req.not_found())
}

async fn colour(req: TextRequest) -> CommandResult<Argument> {
    req.token.parse::<Colour>().map(Argument::Colour)
}

async fn boolean(req: TextRequest) -> CommandResult<Argument> {
    let lowered = req.token.to_lowercase();
    if TRUE_TOKENS.contains(&lowered.as_str()) {
        Ok(Argument::Bool(true))
    } else if FALSE_TOKENS.contains(&lowered.as_str()) {
        Ok(Argument::Bool(false))
    } else {
        Err(req.bad_literal())
    }
}

async fn int(req: TextRequest) -> CommandResult<Argument> {
    req.token
        .parse::<i64>()
        .map(Argument::Int)
        .map_err(|_| req.bad_literal())
}

async fn float(req: TextRequest) -> CommandResult<Argument> {
    match req.token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Argument::Float(value)),
        _ => Err(req.bad_literal()),
    }
}

async fn string(req: TextRequest) -> CommandResult<Argument> {
    Ok(Argument::String(req.token))
}

async fn fill(req: TextRequest) -> CommandResult<Argument> {
    Ok(Argument::Fill(req.token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EventContext;
    use async_trait::async_trait;
    use gantry_core::model::{ChannelType, Guild, GuildMember, Role};
    use gantry_core::{EntityFetcher, FetchResult};
    use serde_json::json;

    const GUILD: Snowflake = Snowflake(100);

    fn user_fixture(id: u64, name: &str) -> User {
        serde_json::from_value(json!({"id": id.to_string(), "username": name})).unwrap()
    }

    fn channel_fixture(id: u64, name: &str, kind: u8) -> Channel {
        serde_json::from_value(json!({"id": id.to_string(), "type": kind, "name": name})).unwrap()
    }

    struct FakeFetcher;

    #[async_trait]
    impl EntityFetcher for FakeFetcher {
        async fn fetch_user(&self, id: Snowflake) -> FetchResult<Option<User>> {
            Ok((id == Snowflake(111111111111111111)).then(|| user_fixture(id.get(), "alice")))
        }

        async fn fetch_member(
            &self,
            _guild_id: Snowflake,
            user_id: Snowflake,
        ) -> FetchResult<Option<GuildMember>> {
            Ok(self.fetch_user(user_id).await?.map(|u| GuildMember {
                user: Some(u),
                guild_id: Some(GUILD),
                nick: None,
                roles: Vec::new(),
                joined_at: None,
                pending: false,
            }))
        }

        async fn fetch_role(&self, _g: Snowflake, _r: Snowflake) -> FetchResult<Option<Role>> {
            Ok(None)
        }

        async fn fetch_channel(&self, id: Snowflake) -> FetchResult<Option<Channel>> {
            Ok(Some(channel_fixture(id.get(), "voice", 2)))
        }

        async fn fetch_guild(&self, _guild_id: Snowflake) -> FetchResult<Option<Guild>> {
            Err(FetchError::unavailable("down"))
        }

        async fn search_members(
            &self,
            _guild_id: Snowflake,
            _query: &str,
        ) -> FetchResult<Vec<GuildMember>> {
            Ok(Vec::new())
        }

        async fn search_roles(&self, _guild_id: Snowflake, _query: &str) -> FetchResult<Vec<Role>> {
            Ok(vec![
                Role {
                    id: Snowflake(1),
                    name: "moderators".into(),
                    color: 0,
                    position: 0,
                    hoist: false,
                    mentionable: false,
                    permissions: None,
                },
                Role {
                    id: Snowflake(2),
                    name: "Mod".into(),
                    color: 0,
                    position: 1,
                    hoist: false,
                    mentionable: false,
                    permissions: None,
                },
            ])
        }

        async fn search_channels(
            &self,
            _guild_id: Snowflake,
            _query: &str,
        ) -> FetchResult<Vec<Channel>> {
            Ok(vec![
                channel_fixture(10, "general", 2),
                channel_fixture(11, "general", 0),
            ])
        }

        async fn search_guilds(&self, _query: &str) -> FetchResult<Vec<Guild>> {
            Ok(Vec::new())
        }
    }

    fn ctx(guild: Option<Snowflake>) -> CommandContext {
        let event = EventContext::new("MESSAGE_CREATE", Arc::new(FakeFetcher)).with_guild(guild);
        CommandContext::new(event)
    }

    async fn convert(kind: ArgumentType, token: &str) -> CommandResult<Argument> {
        ConverterRegistry::with_builtins()
            .convert(kind, token.to_string(), &ctx(Some(GUILD)))
            .await
    }

    #[tokio::test]
    async fn test_bool_tokens() {
        for token in ["yes", "Y", "TRUE", "t", "1", "enable", "On"] {
            assert_eq!(convert(ArgumentType::Bool, token).await.unwrap(), Argument::Bool(true));
        }
        for token in ["no", "N", "false", "F", "0", "disable", "OFF"] {
            assert_eq!(convert(ArgumentType::Bool, token).await.unwrap(), Argument::Bool(false));
        }
        assert!(matches!(
            convert(ArgumentType::Bool, "maybe").await,
            Err(CommandError::BadLiteral { kind: ArgumentType::Bool, .. })
        ));
    }

    #[tokio::test]
    async fn test_numbers() {
        assert_eq!(convert(ArgumentType::Int, "-42").await.unwrap(), Argument::Int(-42));
        assert!(convert(ArgumentType::Int, "4.2").await.is_err());
        assert_eq!(convert(ArgumentType::Float, "4.5").await.unwrap(), Argument::Float(4.5));
        assert!(convert(ArgumentType::Float, "inf").await.is_err());
        assert!(convert(ArgumentType::Float, "abc").await.is_err());
    }

    #[tokio::test]
    async fn test_colour_literal() {
        let arg = convert(ArgumentType::Colour, "#112233").await.unwrap();
        assert_eq!(arg, Argument::Colour(Colour::new(0x11, 0x22, 0x33, 0xFF)));
        assert!(convert(ArgumentType::Colour, "zz").await.is_err());
    }

    #[tokio::test]
    async fn test_snowflake_from_mention() {
        let arg = convert(ArgumentType::Snowflake, "<#123456789012345678>").await.unwrap();
        assert_eq!(arg, Argument::Snowflake(Snowflake(123456789012345678)));
        assert!(matches!(
            convert(ArgumentType::Snowflake, "general").await,
            Err(CommandError::BadLiteral { .. })
        ));
    }

    #[tokio::test]
    async fn test_member_by_mention_and_missing() {
        let arg = convert(ArgumentType::Member, "<@!111111111111111111>").await.unwrap();
        assert_eq!(arg.unwrap_member().id(), Some(Snowflake(111111111111111111)));

        assert!(matches!(
            convert(ArgumentType::Member, "<@222222222222222222>").await,
            Err(CommandError::NotFound { kind: ArgumentType::Member, .. })
        ));
    }

    #[tokio::test]
    async fn test_member_requires_guild() {
        let err = ConverterRegistry::with_builtins()
            .convert(ArgumentType::Member, "someone".into(), &ctx(None))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Fetch(FetchError::NoGuild)));
    }

    #[tokio::test]
    async fn test_role_by_name_prefers_exact() {
        let arg = convert(ArgumentType::Role, "mod").await.unwrap();
        assert_eq!(arg.unwrap_role().id, Snowflake(2));
    }

    #[tokio::test]
    async fn test_channel_flavour_filters_search_and_fetch() {
        let text = convert(ArgumentType::TextChannel, "#general").await.unwrap();
        assert_eq!(text.unwrap_channel().id, Snowflake(11));
        assert_eq!(text.tag(), ArgumentType::TextChannel);

        let any = convert(ArgumentType::Channel, "general").await.unwrap();
        assert_eq!(any.unwrap_channel().id, Snowflake(10));

        assert!(matches!(
            convert(ArgumentType::TextChannel, "<#123456789012345678>").await,
            Err(CommandError::NotFound { .. })
        ));
        let voice = convert(ArgumentType::VoiceChannel, "<#123456789012345678>").await.unwrap();
        assert_eq!(voice.unwrap_channel().kind, ChannelType::GuildVoice);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        assert!(matches!(
            convert(ArgumentType::Guild, "123456789012345678").await,
            Err(CommandError::Fetch(FetchError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_converter() {
        let registry = ConverterRegistry::empty();
        assert!(matches!(
            registry.convert(ArgumentType::Int, "1".into(), &ctx(None)).await,
            Err(CommandError::ConverterNotFound(ArgumentType::Int))
        ));
    }

    #[tokio::test]
    async fn test_custom_converter_replaces_builtin() {
        let registry = ConverterRegistry::with_builtins();
        registry.register(
            ArgumentType::String,
            Converter::new(|req: TextRequest| async move {
                Ok(Argument::String(req.token.to_uppercase()))
            }),
        );
        let arg = registry
            .convert(ArgumentType::String, "shout".into(), &ctx(None))
            .await
            .unwrap();
        assert_eq!(arg.unwrap_str(), "SHOUT");
    }
}
