//! Relay pipeline: subprocess ↔ Discord line bridging.
//!
//! Data flow:
//! ```text
//! stdout/stderr bus → SubprocessToDiscord rules → strip ANSI → @mentions → ChatSink
//! InboundMessage → DiscordToSubprocess rules (with author) → stdin_write bus
//! ```
//!
//! Failures never stop the pipeline: a failed send or a closed stdin is
//! logged and the next line is processed.

use std::sync::Arc;

use dgbridge_core::{EventBus, Rules, UserDirectory, transform_inbound, transform_outbound};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::types::{ChatSink, InboundMessage, RelayConfig};
use crate::subprocess::StdinWriter;

/// Relays lines between one subprocess and one Discord channel.
pub struct DiscordRelay {
    config: RelayConfig,
    rules: Arc<Rules>,
    users: Arc<UserDirectory>,
    sink: Arc<dyn ChatSink>,
}

impl DiscordRelay {
    /// Create a relay.
    pub fn new(
        config: RelayConfig,
        rules: Arc<Rules>,
        users: Arc<UserDirectory>,
        sink: Arc<dyn ChatSink>,
    ) -> Self {
        Self {
            config,
            rules,
            users,
            sink,
        }
    }

    /// The bridged channel.
    pub fn channel_id(&self) -> &str {
        &self.config.channel_id
    }

    /// Start relaying lines from `bus` to Discord.
    ///
    /// The listener is registered before this returns, so no line broadcast
    /// afterwards is missed. The job ends when the bus closes or `shutdown`
    /// turns `true`, and unregisters its listener.
    pub fn spawn_outbound(
        self: &Arc<Self>,
        stream: &'static str,
        bus: &EventBus<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let mut listener = bus.register();
        let bus = bus.clone();
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            debug!(stream, "Relay job started");
            loop {
                tokio::select! {
                    line = listener.recv() => match line {
                        Some(line) => {
                            relay.relay_line(stream, &line).await;
                        }
                        None => break,
                    },
                    // The `watch::Ref` guard must not outlive this branch.
                    () = async {
                        let _ = shutdown.wait_for(|stop| *stop).await;
                    } => break,
                }
            }
            bus.unregister(listener.id());
            info!(stream, "Relay job finished");
        })
    }

    /// Transform one subprocess line and send it to Discord.
    ///
    /// Returns `true` if a message was delivered.
    pub async fn relay_line(&self, stream: &str, line: &str) -> bool {
        let Some(text) = transform_outbound(&self.rules, &self.users, line) else {
            trace!(stream, line, "No rule matched, line suppressed");
            return false;
        };
        match self.sink.send(&self.config.channel_id, &text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(stream, error = %e, "Failed to send message to Discord");
                false
            }
        }
    }

    /// Transform an inbound Discord message and write it to the subprocess.
    ///
    /// Returns `true` if a line was queued for stdin.
    pub fn handle_inbound(&self, message: &InboundMessage, stdin: &StdinWriter) -> bool {
        if message.channel_id != self.config.channel_id {
            trace!(channel_id = %message.channel_id, "Ignoring message from other channel");
            return false;
        }
        let Some(line) = transform_inbound(&self.rules, &message.author, &message.content) else {
            trace!(message_id = %message.message_id, "No rule matched, message suppressed");
            return false;
        };
        match stdin.write_line(line) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Failed to relay message to subprocess"
                );
                false
            }
        }
    }
}
