//! Error types for the `dgbridge` core library.

use thiserror::Error;

use crate::rules::Direction;

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for rule and user map loading.
#[derive(Debug, Error)]
pub enum Error {
    /// A rule direction has no rules at all
    #[error("{direction} must contain at least one rule")]
    EmptyRuleSet { direction: Direction },

    /// A rule's `Match` expression failed to compile
    #[error("{direction} rule #{index}: invalid pattern: {source}")]
    InvalidPattern {
        direction: Direction,
        index: usize,
        #[source]
        source: Box<regex::Error>,
    },

    /// A rule has an empty `Template`
    #[error("{direction} rule #{index}: template must not be empty")]
    EmptyTemplate { direction: Direction, index: usize },

    /// The user map contains an empty key or value
    #[error("User map is invalid: {0}")]
    InvalidUserMap(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
