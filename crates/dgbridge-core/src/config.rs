//! Rule set and user map loading.
//!
//! Rules file:
//! ```json
//! {
//!   "SubprocessToDiscord": [{ "Match": "^<(\\w+)> (.*)$", "Template": "**${1}**: ${2}" }],
//!   "DiscordToSubprocess": [{ "Match": "^(.*)$", "Template": "say <^N> ${1}" }]
//! }
//! ```
//!
//! User map file: a JSON object mapping in-game nametags to Discord user IDs.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::filters::UserDirectory;
use crate::rules::{Direction, Rule, Rules};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct RulesFile {
    subprocess_to_discord: Vec<RuleEntry>,
    discord_to_subprocess: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct RuleEntry {
    #[serde(rename = "Match")]
    pattern: String,
    template: String,
}

/// Load and validate a rules file.
pub fn load_rules(path: &Path) -> Result<Rules> {
    let contents = std::fs::read_to_string(path)?;
    let rules = parse_rules(&contents)?;
    info!(
        path = %path.display(),
        subprocess_to_discord = rules.subprocess_to_discord.len(),
        discord_to_subprocess = rules.discord_to_subprocess.len(),
        "Loaded rules"
    );
    Ok(rules)
}

/// Parse and validate rules from JSON text.
///
/// Both directions must have at least one rule, every pattern must compile
/// and every template must be non-empty.
pub fn parse_rules(json: &str) -> Result<Rules> {
    let file: RulesFile = serde_json::from_str(json)?;
    Ok(Rules {
        subprocess_to_discord: compile(Direction::SubprocessToDiscord, file.subprocess_to_discord)?,
        discord_to_subprocess: compile(Direction::DiscordToSubprocess, file.discord_to_subprocess)?,
    })
}

fn compile(direction: Direction, entries: Vec<RuleEntry>) -> Result<Vec<Rule>> {
    if entries.is_empty() {
        return Err(Error::EmptyRuleSet { direction });
    }
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if entry.template.is_empty() {
                return Err(Error::EmptyTemplate { direction, index });
            }
            Rule::new(&entry.pattern, entry.template).map_err(|e| Error::InvalidPattern {
                direction,
                index,
                source: Box::new(e),
            })
        })
        .collect()
}

/// Load the user map.
///
/// `None` or a path that does not exist yields an empty directory, which
/// disables mention resolution.
pub fn load_user_directory(path: Option<&Path>) -> Result<UserDirectory> {
    let Some(path) = path else {
        return Ok(UserDirectory::new());
    };
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "User map not found, mentions disabled");
            return Ok(UserDirectory::new());
        }
        Err(e) => return Err(e.into()),
    };
    let users = parse_user_directory(&contents)?;
    info!(path = %path.display(), users = users.len(), "Loaded user map");
    Ok(users)
}

/// Parse and validate a user map from JSON text.
pub fn parse_user_directory(json: &str) -> Result<UserDirectory> {
    let users: HashMap<String, String> = serde_json::from_str(json)?;
    if let Some((key, _)) = users.iter().find(|(k, v)| k.is_empty() || v.is_empty()) {
        return Err(Error::InvalidUserMap(format!(
            "empty nametag or user id (key {key:?})"
        )));
    }
    Ok(users)
}
