//! Post-processing for subprocess → Discord lines.
//!
//! Applied after rule matching, in this order: ANSI stripping, then
//! @mention resolution.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Maps in-game nametags to Discord user IDs, for mentioning.
pub type UserDirectory = HashMap<String, String>;

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("static regex is valid"));

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([a-zA-Z0-9_]+)").expect("static regex is valid"));

/// Remove ANSI SGR colour sequences (`ESC [ ... m`).
///
/// Repeats until no sequence is left, so a sequence split by another one
/// (`ESC [ ESC[0m m`) is removed too and stripping twice is a no-op.
pub fn strip_ansi(input: &str) -> Cow<'_, str> {
    let mut out = ANSI_RE.replace_all(input, "");
    while ANSI_RE.is_match(&out) {
        out = Cow::Owned(ANSI_RE.replace_all(&out, "").into_owned());
    }
    out
}

/// Replace `@nickname` tokens found in `users` with `<@id>` mentions.
///
/// Unknown nicknames are left as they are. An empty directory returns the
/// input without scanning it.
pub fn apply_user_tags<'a>(input: &'a str, users: &UserDirectory) -> Cow<'a, str> {
    if users.is_empty() {
        return Cow::Borrowed(input);
    }
    MENTION_RE.replace_all(input, |caps: &Captures<'_>| {
        users
            .get(&caps[1])
            .map_or_else(|| caps[0].to_string(), |id| format!("<@{id}>"))
    })
}
