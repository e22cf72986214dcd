//! dgbridge Daemon Library
//!
//! Core functionality for the bridge binary:
//! - Subprocess management and line-oriented stream I/O
//! - Relay pipeline between subprocess output buses and Discord
//! - Discord REST client and inbound message poller

pub mod discord;
pub mod relay;
pub mod subprocess;
