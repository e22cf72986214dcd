//! Relay between the subprocess buses and Discord.

pub mod pipeline;
pub mod types;

pub use pipeline::DiscordRelay;
pub use types::{ChatSink, DeliveryError, InboundMessage, RelayConfig};
