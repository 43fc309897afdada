//! Gateway payload bodies that are not plain entities.

use serde::{Deserialize, Serialize};

use super::guild::{Role, UnavailableGuild};
use super::user::User;
use crate::snowflake::Snowflake;

/// Body of the `READY` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    #[serde(rename = "v", default)]
    pub version: u8,
    pub user: User,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    #[serde(default)]
    pub session_id: String,
}

/// Body of `GUILD_MEMBER_REMOVE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberRemove {
    pub guild_id: Snowflake,
    pub user: User,
}

/// Body of `GUILD_ROLE_CREATE` and `GUILD_ROLE_UPDATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRoleEvent {
    pub guild_id: Snowflake,
    pub role: Role,
}

/// Body of `GUILD_ROLE_DELETE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRoleDelete {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}
