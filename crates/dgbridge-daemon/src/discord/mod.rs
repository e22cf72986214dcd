//! Discord integration.
//!
//! A reqwest-based REST client (used as the relay's chat sink) and a poller
//! that turns new channel messages into inbound relay messages.

mod client;
pub mod poller;
pub mod types;

pub use client::{DEFAULT_API_BASE, DiscordClient, DiscordConfig, DiscordError, MAX_PAGE_SIZE};
pub use poller::{DiscordPoller, author_context, resolve_accent_color};
