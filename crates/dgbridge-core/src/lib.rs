//! `dgbridge` Core Library
//!
//! Shared functionality for the dgbridge components:
//! - Generic multi-listener event bus
//! - Rule matching and template expansion
//! - ANSI stripping and @mention resolution
//! - Rule and user map file loading
//! - Common error types

pub mod bus;
pub mod config;
pub mod error;
pub mod filters;
pub mod pipeline;
pub mod rules;
pub mod tracing_init;

pub use bus::{EventBus, Listener, ListenerId};
pub use config::{load_rules, load_user_directory};
pub use error::{Error, Result};
pub use filters::{UserDirectory, apply_user_tags, strip_ansi};
pub use pipeline::{transform_inbound, transform_outbound};
pub use rules::{AuthorContext, Direction, Rule, Rules, apply_rules, build_template};
