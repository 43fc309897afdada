//! Wire models consumed by the dispatch engine.
//!
//! These mirror only the fields the engine reads; unknown fields are ignored
//! on input.

pub mod channel;
pub mod command;
pub mod gateway;
pub mod guild;
pub mod interaction;
pub mod message;
pub mod user;

pub use channel::{Channel, ChannelType};
pub use command::{
    ApplicationCommand, ApplicationCommandOption, ApplicationCommandOptionType,
    ApplicationCommandType,
};
pub use gateway::{GuildMemberRemove, GuildRoleDelete, GuildRoleEvent, Ready};
pub use guild::{Guild, GuildMember, Role, UnavailableGuild};
pub use interaction::{
    Interaction, InteractionData, InteractionDataOption, InteractionType, ResolvedData,
};
pub use message::{Message, MessageDelete};
pub use user::User;
