//! Discord REST API object subsets used by the bridge.

use serde::{Deserialize, Serialize};

/// A Discord user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Legacy discriminator, `"0"` for migrated usernames.
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub global_name: Option<String>,
    /// Profile accent colour.
    #[serde(default)]
    pub accent_color: Option<u32>,
    #[serde(default)]
    pub bot: bool,
}

/// A message in a channel.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: User,
}

/// A channel; only the fields needed to find its guild.
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// A user's membership in a guild.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub nick: Option<String>,
    /// Role ids.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A guild role.
#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    pub id: String,
    /// `0` means the role has no colour.
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub position: i64,
}

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Serialize)]
pub(crate) struct CreateMessage<'a> {
    pub content: &'a str,
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Parse a snowflake id for ordering; malformed ids sort first.
pub fn snowflake(id: &str) -> u64 {
    id.parse().unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn message_deserializes_with_optional_fields() {
        let json = r#"{
            "id": "1100",
            "channel_id": "42",
            "content": "hello",
            "author": { "id": "7", "username": "bob", "discriminator": "0", "global_name": null }
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.author.username, "bob");
        assert!(msg.author.global_name.is_none());
        assert!(msg.author.accent_color.is_none());
        assert!(!msg.author.bot);
    }

    #[test]
    fn snowflake_ordering() {
        assert!(snowflake("1000000000000000002") > snowflake("999999999999999999"));
        assert_eq!(snowflake("garbage"), 0);
    }
}
