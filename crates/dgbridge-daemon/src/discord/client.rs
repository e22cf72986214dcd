//! Discord REST API v10 client.
//!
//! Uses reqwest with bot-token authorization. Only the handful of endpoints
//! the bridge needs are covered.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::debug;

use super::types::{ApiErrorBody, Channel, CreateMessage, GuildMember, Message, Role, User};
use crate::relay::{ChatSink, DeliveryError};

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Maximum page size of `GET /channels/{id}/messages`.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Discord API client errors.
#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for connecting to Discord.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// API base URL, without trailing slash.
    pub api_base: String,
    /// Bot token (without the `Bot ` prefix).
    pub token: String,
}

impl DiscordConfig {
    /// Configuration for the public API with the given bot token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
        }
    }
}

/// Discord REST API client.
#[derive(Debug)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
}

impl DiscordClient {
    /// Create a new Discord API client.
    pub fn new(config: &DiscordConfig) -> Result<Self, DiscordError> {
        if config.api_base.is_empty() {
            return Err(DiscordError::Config("api_base is empty".into()));
        }
        if config.token.is_empty() {
            return Err(DiscordError::Config("token is empty".into()));
        }

        let mut headers = HeaderMap::new();
        let mut token_val = HeaderValue::from_str(&format!("Bot {}", config.token))
            .map_err(|_| DiscordError::Config("Invalid token format".into()))?;
        token_val.set_sensitive(true);
        headers.insert(AUTHORIZATION, token_val);

        // reqwest uses rustls-no-provider; `Err` means a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("dgbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let api_base = config.api_base.trim_end_matches('/').to_string();
        Ok(Self { http, api_base })
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Turn a non-success response into [`DiscordError::Api`].
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, DiscordError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let fallback = status.canonical_reason().unwrap_or("Unknown").to_string();
        let message = resp
            .json::<ApiErrorBody>()
            .await
            .ok()
            .map(|body| body.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback);
        Err(DiscordError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// The bot's own user.
    pub async fn current_user(&self) -> Result<User, DiscordError> {
        let resp = self.http.get(self.api_url("/users/@me")).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Look up a channel.
    pub async fn channel(&self, channel_id: &str) -> Result<Channel, DiscordError> {
        let resp = self
            .http
            .get(self.api_url(&format!("/channels/{channel_id}")))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Post a text message to a channel.
    pub async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<Message, DiscordError> {
        let resp = self
            .http
            .post(self.api_url(&format!("/channels/{channel_id}/messages")))
            .json(&CreateMessage { content })
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Fetch up to `limit` messages newer than `after`, or the latest
    /// messages when `after` is `None`. Order is as returned by the API.
    pub async fn messages_after(
        &self,
        channel_id: &str,
        after: Option<&str>,
        limit: u8,
    ) -> Result<Vec<Message>, DiscordError> {
        let mut url = format!(
            "{}?limit={}",
            self.api_url(&format!("/channels/{channel_id}/messages")),
            limit.clamp(1, MAX_PAGE_SIZE)
        );
        if let Some(after) = after {
            use std::fmt::Write;
            let _ = write!(url, "&after={after}");
        }
        let resp = self.http.get(&url).send().await?;
        let messages: Vec<Message> = Self::check(resp).await?.json().await?;
        debug!(channel_id, count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    /// A user's guild membership.
    pub async fn guild_member(
        &self,
        guild_id: &str,
        user_id: &str,
    ) -> Result<GuildMember, DiscordError> {
        let resp = self
            .http
            .get(self.api_url(&format!("/guilds/{guild_id}/members/{user_id}")))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// All roles of a guild.
    pub async fn guild_roles(&self, guild_id: &str) -> Result<Vec<Role>, DiscordError> {
        let resp = self
            .http
            .get(self.api_url(&format!("/guilds/{guild_id}/roles")))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}

#[async_trait]
impl ChatSink for DiscordClient {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError> {
        self.send_message(channel_id, text)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::new(channel_id, e.to_string()))
    }
}
