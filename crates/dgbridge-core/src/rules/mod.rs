//! Rule matching engine.
//!
//! Lines are transformed by an ordered list of [`Rule`]s. The first rule
//! whose pattern matches decides the result; an empty result means the line
//! is suppressed.

mod template;

use std::fmt;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

pub use template::build_template;

/// Which way a line travels through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Subprocess stdout/stderr line relayed to the Discord channel.
    SubprocessToDiscord,
    /// Discord message relayed to the subprocess stdin.
    DiscordToSubprocess,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubprocessToDiscord => f.write_str("SubprocessToDiscord"),
            Self::DiscordToSubprocess => f.write_str("DiscordToSubprocess"),
        }
    }
}

/// A compiled pattern and the template that replaces its matches.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Pattern matched anywhere in the (newline-normalized) input.
    pub pattern: Regex,
    /// Replacement template. May contain `${n}` group references and, for
    /// messages with an author, `^` directives.
    pub template: String,
}

impl Rule {
    /// Compile a rule from a pattern string.
    pub fn new(pattern: &str, template: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            template: template.into(),
        })
    }

    /// Replace every match of the pattern in `input` with the expanded
    /// template.
    ///
    /// Without an author the template is handed to the regex engine as-is.
    fn replace(&self, author: Option<&AuthorContext>, input: &str) -> String {
        let Some(author) = author else {
            return self
                .pattern
                .replace_all(input, self.template.as_str())
                .into_owned();
        };
        self.pattern
            .replace_all(input, |caps: &Captures<'_>| {
                let mut out = String::with_capacity(self.template.len());
                template::expand_match(&self.template, author, caps, &mut out);
                out
            })
            .into_owned()
    }
}

/// The complete rule set, one ordered list per direction.
#[derive(Debug, Clone)]
pub struct Rules {
    pub subprocess_to_discord: Vec<Rule>,
    pub discord_to_subprocess: Vec<Rule>,
}

impl Rules {
    /// Rules for the given direction.
    pub fn for_direction(&self, direction: Direction) -> &[Rule] {
        match direction {
            Direction::SubprocessToDiscord => &self.subprocess_to_discord,
            Direction::DiscordToSubprocess => &self.discord_to_subprocess,
        }
    }
}

/// The Discord user who wrote an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuthorContext {
    pub username: String,
    /// Guild nickname, if set.
    pub nickname: Option<String>,
    /// Global display name, if set.
    pub global_name: Option<String>,
    pub discriminator: String,
    /// Role colour (or profile accent colour) as `0xRRGGBB`, `0` if none.
    pub accent_color: u32,
}

impl AuthorContext {
    /// Global display name, falling back to the username.
    pub fn display_name(&self) -> &str {
        non_empty(self.global_name.as_deref()).unwrap_or(&self.username)
    }

    /// Nickname, falling back to the display name, then the username.
    pub fn nickname_or_name(&self) -> &str {
        non_empty(self.nickname.as_deref()).unwrap_or_else(|| self.display_name())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Apply the first matching rule to `input`.
///
/// Newlines in `input` are replaced by spaces before matching. Returns the
/// replaced text of the first rule whose pattern matches, or an empty string
/// when no rule matches. An empty return always means "suppress this line".
pub fn apply_rules(rules: &[Rule], author: Option<&AuthorContext>, input: &str) -> String {
    let input = input.replace('\n', " ");
    rules
        .iter()
        .find(|rule| rule.pattern.is_match(&input))
        .map(|rule| rule.replace(author, &input))
        .unwrap_or_default()
}
