//! Typed command arguments.
//!
//! Every declared [`Parameter`] carries an [`ArgumentType`] tag. Converters
//! turn a token (text commands) or an option value (interactions) into an
//! [`Argument`], a tagged union whose variant matches the tag. Handlers read
//! arguments through typed accessors that fail with
//! [`CommandError::InvalidArgumentType`] on a mismatch:
//!
//! ```rust,ignore
//! let member = args.get("target")?.as_member()?;
//! let reason = args.get("reason")?.as_str()?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, CommandResult};
use gantry_core::Snowflake;
use gantry_core::model::{Channel, ChannelType, Guild, GuildMember, Role, User};

// ============================================================================
// ArgumentType
// ============================================================================

/// Type tag of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentType {
    Snowflake,
    Member,
    User,
    Role,
    Channel,
    TextChannel,
    VoiceChannel,
    CategoryChannel,
    ThreadChannel,
    StageChannel,
    ForumChannel,
    Guild,
    Colour,
    Bool,
    Int,
    Float,
    String,
    /// Consumes the rest of the input verbatim. Only valid as the last parameter.
    Fill,
}

impl ArgumentType {
    /// Channel kinds accepted for a channel-flavoured tag.
    ///
    /// Returns an empty slice for the generic [`Channel`](Self::Channel) tag,
    /// meaning any kind, and for non-channel tags.
    pub fn channel_types(self) -> &'static [ChannelType] {
        match self {
            Self::TextChannel => &[ChannelType::GuildText, ChannelType::GuildAnnouncement],
            Self::VoiceChannel => &[ChannelType::GuildVoice],
            Self::CategoryChannel => &[ChannelType::GuildCategory],
            Self::ThreadChannel => &[
                ChannelType::AnnouncementThread,
                ChannelType::PublicThread,
                ChannelType::PrivateThread,
            ],
            Self::StageChannel => &[ChannelType::GuildStageVoice],
            Self::ForumChannel => &[ChannelType::GuildForum, ChannelType::GuildMedia],
            _ => &[],
        }
    }

    /// Whether this tag resolves to a [`Channel`].
    pub fn is_channel(self) -> bool {
        matches!(
            self,
            Self::Channel
                | Self::TextChannel
                | Self::VoiceChannel
                | Self::CategoryChannel
                | Self::ThreadChannel
                | Self::StageChannel
                | Self::ForumChannel
        )
    }

    /// Whether a channel of `kind` satisfies this tag.
    pub fn accepts_channel(self, kind: ChannelType) -> bool {
        let allowed = self.channel_types();
        allowed.is_empty() || allowed.contains(&kind)
    }

    /// Lowercase name used in messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Snowflake => "snowflake",
            Self::Member => "member",
            Self::User => "user",
            Self::Role => "role",
            Self::Channel => "channel",
            Self::TextChannel => "text channel",
            Self::VoiceChannel => "voice channel",
            Self::CategoryChannel => "category channel",
            Self::ThreadChannel => "thread channel",
            Self::StageChannel => "stage channel",
            Self::ForumChannel => "forum channel",
            Self::Guild => "guild",
            Self::Colour => "colour",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Fill => "fill",
        }
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Colour
// ============================================================================

/// An RGBA colour with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Colour {
    /// Creates a colour from its channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// The colour as `0xRRGGBB`, the form roles and embeds use.
    pub const fn rgb(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// The colour as `0xRRGGBBAA`.
    pub const fn rgba(self) -> u32 {
        (self.rgb() << 8) | self.a as u32
    }
}

impl FromStr for Colour {
    type Err = CommandError;

    /// Parses `#RRGGBB[AA]`, `0xRRGGBB[AA]` or bare `RRGGBB[AA]`.
    ///
    /// Six-digit forms are fully opaque.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CommandError::bad_literal(ArgumentType::Colour, s);
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(bad());
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| bad())?;
        let value = match hex.len() {
            6 => (value << 8) | 0xFF,
            8 => value,
            _ => return Err(bad()),
        };
        let [r, g, b, a] = value.to_be_bytes();
        Ok(Self { r, g, b, a })
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

// ============================================================================
// Argument
// ============================================================================

/// A resolved argument, tagged with the parameter type that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Snowflake(Snowflake),
    Member(GuildMember),
    User(User),
    Role(Role),
    /// A channel resolved for `tag`, which is one of the channel-flavoured types.
    Channel { tag: ArgumentType, channel: Channel },
    Guild(Guild),
    Colour(Colour),
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Fill(String),
}

macro_rules! accessors {
    ($( $as_fn:ident, $unwrap_fn:ident, $variant:ident, $tag:ident => $ty:ty; )*) => {
        $(
            #[doc = concat!("Reads the argument as ", stringify!($tag), ".")]
            pub fn $as_fn(&self) -> CommandResult<&$ty> {
                match self {
                    Self::$variant(value) => Ok(value),
                    other => Err(CommandError::InvalidArgumentType {
                        expected: ArgumentType::$tag,
                        got: other.tag(),
                    }),
                }
            }

            #[doc = concat!("Reads the argument as ", stringify!($tag), ".")]
            ///
            /// # Panics
            ///
            /// Panics if the argument holds a different type.
            pub fn $unwrap_fn(&self) -> &$ty {
                match self.$as_fn() {
                    Ok(value) => value,
                    Err(err) => panic!("{err}"),
                }
            }
        )*
    };
}

impl Argument {
    /// The tag of the parameter this argument was produced for.
    pub fn tag(&self) -> ArgumentType {
        match self {
            Self::Snowflake(_) => ArgumentType::Snowflake,
            Self::Member(_) => ArgumentType::Member,
            Self::User(_) => ArgumentType::User,
            Self::Role(_) => ArgumentType::Role,
            Self::Channel { tag, .. } => *tag,
            Self::Guild(_) => ArgumentType::Guild,
            Self::Colour(_) => ArgumentType::Colour,
            Self::Bool(_) => ArgumentType::Bool,
            Self::Int(_) => ArgumentType::Int,
            Self::Float(_) => ArgumentType::Float,
            Self::String(_) => ArgumentType::String,
            Self::Fill(_) => ArgumentType::Fill,
        }
    }

    accessors! {
        as_snowflake, unwrap_snowflake, Snowflake, Snowflake => Snowflake;
        as_member, unwrap_member, Member, Member => GuildMember;
        as_user, unwrap_user, User, User => User;
        as_role, unwrap_role, Role, Role => Role;
        as_guild, unwrap_guild, Guild, Guild => Guild;
        as_colour, unwrap_colour, Colour, Colour => Colour;
        as_bool, unwrap_bool, Bool, Bool => bool;
        as_int, unwrap_int, Int, Int => i64;
        as_float, unwrap_float, Float, Float => f64;
    }

    /// Reads a channel argument of any flavour.
    pub fn as_channel(&self) -> CommandResult<&Channel> {
        match self {
            Self::Channel { channel, .. } => Ok(channel),
            other => Err(CommandError::InvalidArgumentType {
                expected: ArgumentType::Channel,
                got: other.tag(),
            }),
        }
    }

    /// Reads a channel argument of any flavour.
    ///
    /// # Panics
    ///
    /// Panics if the argument is not a channel.
    pub fn unwrap_channel(&self) -> &Channel {
        match self.as_channel() {
            Ok(channel) => channel,
            Err(err) => panic!("{err}"),
        }
    }

    /// Reads a string or fill argument.
    pub fn as_str(&self) -> CommandResult<&str> {
        match self {
            Self::String(s) | Self::Fill(s) => Ok(s),
            other => Err(CommandError::InvalidArgumentType {
                expected: ArgumentType::String,
                got: other.tag(),
            }),
        }
    }

    /// Reads a string or fill argument.
    ///
    /// # Panics
    ///
    /// Panics if the argument is not textual.
    pub fn unwrap_str(&self) -> &str {
        match self.as_str() {
            Ok(s) => s,
            Err(err) => panic!("{err}"),
        }
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// The name-keyed arguments of one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    inner: HashMap<String, Argument>,
}

impl Arguments {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, argument: Argument) {
        self.inner.insert(name.into(), argument);
    }

    /// Looks up an argument, failing with a missing-argument error when absent.
    pub fn get(&self, name: &str) -> CommandResult<&Argument> {
        self.inner.get(name).ok_or_else(|| CommandError::missing(name))
    }

    /// Looks up an optional argument.
    pub fn get_opt(&self, name: &str) -> Option<&Argument> {
        self.inner.get(name)
    }

    /// Whether an argument was resolved for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Number of resolved arguments.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no argument was resolved.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates over `(name, argument)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ============================================================================
// Parameter
// ============================================================================

/// A declared command parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub kind: ArgumentType,
    pub required: bool,
    pub description: String,
}

impl Parameter {
    /// Creates a required parameter.
    pub fn required(name: impl Into<String>, kind: ArgumentType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: String::new(),
        }
    }

    /// Creates an optional parameter.
    pub fn optional(name: impl Into<String>, kind: ArgumentType) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// Sets the description shown in exported schemas.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Checks that a parameter list has at most one fill parameter, placed last,
/// and no duplicate names.
pub(crate) fn validate_parameters(parameters: &[Parameter]) -> CommandResult<()> {
    for (i, param) in parameters.iter().enumerate() {
        if param.kind == ArgumentType::Fill && i + 1 != parameters.len() {
            return Err(CommandError::invalid_definition(format!(
                "fill parameter '{}' must be the last parameter",
                param.name
            )));
        }
        if parameters[..i].iter().any(|p| p.name == param.name) {
            return Err(CommandError::invalid_definition(format!(
                "parameter '{}' is declared twice",
                param.name
            )));
        }
    }
    Ok(())
}
