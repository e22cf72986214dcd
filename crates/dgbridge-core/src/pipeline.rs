//! Per-direction line transforms shared by the bridge and the rule tester.
//!
//! ```text
//! subprocess line → SubprocessToDiscord rules → strip ANSI → @mentions → Discord
//! Discord message → DiscordToSubprocess rules (with author)        → stdin
//! ```

use crate::filters::{UserDirectory, apply_user_tags, strip_ansi};
use crate::rules::{AuthorContext, Rules, apply_rules};

/// Transform a subprocess output line for Discord.
///
/// Returns `None` when the line should not be relayed.
pub fn transform_outbound(rules: &Rules, users: &UserDirectory, line: &str) -> Option<String> {
    let matched = apply_rules(&rules.subprocess_to_discord, None, line);
    if matched.is_empty() {
        return None;
    }
    let stripped = strip_ansi(&matched);
    if stripped.trim().is_empty() {
        return None;
    }
    Some(apply_user_tags(&stripped, users).into_owned())
}

/// Transform a Discord message for the subprocess stdin.
///
/// Returns `None` when the message should not be relayed.
pub fn transform_inbound(rules: &Rules, author: &AuthorContext, content: &str) -> Option<String> {
    let line = apply_rules(&rules.discord_to_subprocess, Some(author), content);
    (!line.is_empty()).then_some(line)
}
