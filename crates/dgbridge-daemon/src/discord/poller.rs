//! Discord inbound message polling.
//!
//! Periodically fetches messages newer than the last one seen in the relay
//! channel and resolves each author's context for template expansion.

use std::collections::HashMap;
use std::sync::Arc;

use dgbridge_core::AuthorContext;
use tracing::{debug, info, warn};

use super::client::{DiscordClient, DiscordError, MAX_PAGE_SIZE};
use super::types::{GuildMember, Message, Role, User, snowflake};
use crate::relay::InboundMessage;

/// Polls one channel for new messages.
pub struct DiscordPoller {
    client: Arc<DiscordClient>,
    channel_id: String,
    guild_id: Option<String>,
    bot_user_id: String,
    /// Id of the newest message seen; `None` until the first poll.
    last_id: Option<String>,
    primed: bool,
}

impl DiscordPoller {
    /// Resolve the bot user and the channel's guild, then create the poller.
    pub async fn connect(
        client: Arc<DiscordClient>,
        channel_id: impl Into<String>,
    ) -> Result<Self, DiscordError> {
        let channel_id = channel_id.into();
        let me = client.current_user().await?;
        let channel = client.channel(&channel_id).await?;
        info!(
            bot = %me.username,
            channel_id = %channel.id,
            guild_id = ?channel.guild_id,
            "Connected to Discord"
        );
        Ok(Self {
            client,
            channel_id,
            guild_id: channel.guild_id,
            bot_user_id: me.id,
            last_id: None,
            primed: false,
        })
    }

    /// Fetch new messages from other users, oldest first.
    ///
    /// The first call only records the newest existing message so chat
    /// history is not replayed into the subprocess.
    pub async fn poll(&mut self) -> Result<Vec<InboundMessage>, DiscordError> {
        if !self.primed {
            let latest = self
                .client
                .messages_after(&self.channel_id, None, 1)
                .await?;
            self.last_id = latest.into_iter().next().map(|m| m.id);
            self.primed = true;
            debug!(last_id = ?self.last_id, "Poller primed");
            return Ok(Vec::new());
        }

        let fetched = self
            .client
            .messages_after(&self.channel_id, self.last_id.as_deref(), MAX_PAGE_SIZE)
            .await?;
        let messages = newer_than(fetched, self.last_id.as_deref());
        if let Some(newest) = messages.last() {
            self.last_id = Some(newest.id.clone());
        }

        let incoming: Vec<Message> = messages
            .into_iter()
            .filter(|m| m.author.id != self.bot_user_id)
            .collect();
        if incoming.is_empty() {
            return Ok(Vec::new());
        }

        let roles = self.guild_roles().await;
        let mut inbound = Vec::with_capacity(incoming.len());
        for message in incoming {
            let member = self.member(&message.author).await;
            let author = author_context(&message.author, &member, &roles);
            inbound.push(InboundMessage {
                channel_id: message.channel_id,
                message_id: message.id,
                author_id: message.author.id,
                content: message.content,
                author,
            });
        }
        Ok(inbound)
    }

    async fn guild_roles(&self) -> HashMap<String, Role> {
        let Some(guild_id) = &self.guild_id else {
            return HashMap::new();
        };
        match self.client.guild_roles(guild_id).await {
            Ok(roles) => roles.into_iter().map(|r| (r.id.clone(), r)).collect(),
            Err(e) => {
                warn!(guild_id = %guild_id, error = %e, "Failed to fetch guild roles");
                HashMap::new()
            }
        }
    }

    async fn member(&self, user: &User) -> GuildMember {
        let Some(guild_id) = &self.guild_id else {
            return GuildMember::default();
        };
        self.client
            .guild_member(guild_id, &user.id)
            .await
            .unwrap_or_else(|e| {
                warn!(
                    guild_id = %guild_id,
                    user_id = %user.id,
                    error = %e,
                    "Failed to fetch guild member"
                );
                GuildMember::default()
            })
    }
}

/// Sort messages oldest first and drop any not newer than `after`.
fn newer_than(mut messages: Vec<Message>, after: Option<&str>) -> Vec<Message> {
    let floor = after.map_or(0, snowflake);
    messages.retain(|m| snowflake(&m.id) > floor);
    messages.sort_by_key(|m| snowflake(&m.id));
    messages
}

/// Build the template context for a message author.
pub fn author_context(
    user: &User,
    member: &GuildMember,
    roles: &HashMap<String, Role>,
) -> AuthorContext {
    AuthorContext {
        username: user.username.clone(),
        nickname: member.nick.clone(),
        global_name: user.global_name.clone(),
        discriminator: user.discriminator.clone(),
        accent_color: resolve_accent_color(&member.roles, roles, user.accent_color),
    }
}

/// Colour of the member's highest-positioned coloured role, else the
/// profile accent colour, else `0`.
pub fn resolve_accent_color(
    member_roles: &[String],
    roles: &HashMap<String, Role>,
    profile_accent: Option<u32>,
) -> u32 {
    member_roles
        .iter()
        .filter_map(|id| roles.get(id))
        .filter(|role| role.color != 0)
        .max_by_key(|role| role.position)
        .map(|role| role.color)
        .or(profile_accent.filter(|c| *c != 0))
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn role(id: &str, color: u32, position: i64) -> (String, Role) {
        (
            id.to_string(),
            Role {
                id: id.to_string(),
                color,
                position,
            },
        )
    }

    fn message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            channel_id: "1".into(),
            content: String::new(),
            author: user(),
        }
    }

    fn user() -> User {
        User {
            id: "7".into(),
            username: "bob".into(),
            discriminator: "0".into(),
            global_name: Some("Bobert".into()),
            accent_color: Some(0x0012_3456),
            bot: false,
        }
    }

    #[test]
    fn highest_colored_role_wins() {
        let roles = HashMap::from([
            role("a", 0x00FF_0000, 1),
            role("b", 0x0000_FF00, 5),
            role("c", 0, 9),
        ]);
        let member_roles = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(resolve_accent_color(&member_roles, &roles, Some(1)), 0x0000_FF00);
    }

    #[test]
    fn falls_back_to_profile_accent_then_zero() {
        let roles = HashMap::from([role("a", 0, 1)]);
        let member_roles = vec!["a".to_string(), "unknown".to_string()];
        assert_eq!(resolve_accent_color(&member_roles, &roles, Some(0xABCDEF)), 0xABCDEF);
        assert_eq!(resolve_accent_color(&member_roles, &roles, None), 0);
        assert_eq!(resolve_accent_color(&[], &HashMap::new(), Some(0)), 0);
    }

    #[test]
    fn newer_than_sorts_and_filters() {
        let fetched = vec![message("30"), message("10"), message("20"), message("5")];
        let ids: Vec<String> = newer_than(fetched, Some("5"))
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["10", "20", "30"]);
    }

    #[test]
    fn newer_than_without_floor_keeps_all() {
        assert_eq!(newer_than(vec![message("2"), message("1")], None).len(), 2);
    }

    #[test]
    fn author_context_from_member() {
        let member = GuildMember {
            nick: Some("bobby".into()),
            roles: vec!["r".into()],
        };
        let roles = HashMap::from([role("r", 0x00FF_FF00, 3)]);
        let ctx = author_context(&user(), &member, &roles);
        assert_eq!(ctx.username, "bob");
        assert_eq!(ctx.nickname.as_deref(), Some("bobby"));
        assert_eq!(ctx.global_name.as_deref(), Some("Bobert"));
        assert_eq!(ctx.accent_color, 0x00FF_FF00);
    }

    #[test]
    fn author_context_without_guild() {
        let ctx = author_context(&user(), &GuildMember::default(), &HashMap::new());
        assert!(ctx.nickname.is_none());
        assert_eq!(ctx.accent_color, 0x0012_3456);
    }
}
