//! `^` directive expansion for Discord → subprocess templates.
//!
//! | directive | value |
//! |-----------|-------|
//! | `^U` | global display name, else username |
//! | `^T` | discriminator |
//! | `^C` | accent colour, lowercase hex without `0x` |
//! | `^N` | nickname, else global display name, else username |
//! | `^^` | a literal `^` |
//!
//! Anything else, including an unknown `^X` or a trailing `^`, is copied
//! verbatim.

use std::borrow::Cow;

use regex::Captures;

use super::AuthorContext;

const DIRECTIVE_PREFIX: char = '^';

/// Expand every `^` directive in `template` using `author`.
pub fn build_template(template: &str, author: &AuthorContext) -> String {
    let mut out = String::with_capacity(template.len());
    scan(template, author, |piece| match piece {
        Piece::Literal(text) | Piece::Value(text) => out.push_str(text),
    });
    out
}

/// Expand `template` for one regex match.
///
/// Group references (`${1}`, `$name`) are resolved against `caps` in the
/// template's literal text only. Directive values are appended as plain
/// text, so author data never reaches the group expander and a `$` in front
/// of a directive cannot join with its value.
pub(super) fn expand_match(
    template: &str,
    author: &AuthorContext,
    caps: &Captures<'_>,
    out: &mut String,
) {
    scan(template, author, |piece| match piece {
        Piece::Literal(text) => caps.expand(text, out),
        Piece::Value(text) => out.push_str(text),
    });
}

enum Piece<'a> {
    /// A run of template text between directives, `^^` already unescaped.
    Literal(&'a str),
    /// The value of one directive.
    Value(&'a str),
}

fn scan(template: &str, author: &AuthorContext, mut emit: impl FnMut(Piece<'_>)) {
    let mut literal = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == DIRECTIVE_PREFIX
            && let Some(&next) = chars.peek()
        {
            if next == DIRECTIVE_PREFIX {
                literal.push(DIRECTIVE_PREFIX);
                chars.next();
                continue;
            }
            if let Some(value) = directive_value(next, author) {
                chars.next();
                if !literal.is_empty() {
                    emit(Piece::Literal(literal.as_str()));
                    literal.clear();
                }
                emit(Piece::Value(value.as_ref()));
                continue;
            }
        }
        literal.push(c);
    }
    if !literal.is_empty() {
        emit(Piece::Literal(literal.as_str()));
    }
}

fn directive_value(directive: char, author: &AuthorContext) -> Option<Cow<'_, str>> {
    match directive {
        'U' => Some(Cow::Borrowed(author.display_name())),
        'T' => Some(Cow::Borrowed(&author.discriminator)),
        'C' => Some(Cow::Owned(format!("{:x}", author.accent_color))),
        'N' => Some(Cow::Borrowed(author.nickname_or_name())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> AuthorContext {
        AuthorContext {
            username: "Bob^T".into(),
            nickname: Some("bobby".into()),
            global_name: None,
            discriminator: "1337".into(),
            accent_color: 0x00FF_FF00,
        }
    }

    #[test]
    fn all_directives() {
        assert_eq!(
            build_template("<^U#^T> ${1} ^^ ^A ^C ^N", &author()),
            "<Bob^T#1337> ${1} ^ ^A ffff00 bobby"
        );
    }

    #[test]
    fn literal_text_is_unchanged() {
        for template in ["", "plain text", "${1} and $2", "ünïcödé ✓"] {
            assert_eq!(build_template(template, &author()), template);
        }
    }

    #[test]
    fn escaped_caret() {
        assert_eq!(build_template("^^", &author()), "^");
        assert_eq!(build_template("^^U", &author()), "^U");
        assert_eq!(build_template("^^^", &author()), "^^");
    }

    #[test]
    fn trailing_and_unknown_carets_pass_through() {
        assert_eq!(build_template("end^", &author()), "end^");
        assert_eq!(build_template("^x^Z", &author()), "^x^Z");
        assert_eq!(build_template("^", &author()), "^");
    }

    #[test]
    fn expanded_values_are_not_rescanned() {
        assert_eq!(build_template("^U#^T", &author()), "Bob^T#1337");
    }

    #[test]
    fn color_is_lowercase_hex() {
        let mut a = author();
        a.accent_color = 0x00AB_CDEF;
        assert_eq!(build_template("^C", &a), "abcdef");
        a.accent_color = 0x0F;
        assert_eq!(build_template("^C", &a), "f");
        a.accent_color = 0;
        assert_eq!(build_template("^C", &a), "0");
    }

    #[test]
    fn nickname_fallback_chain() {
        let mut a = AuthorContext {
            username: "user".into(),
            ..AuthorContext::default()
        };
        assert_eq!(build_template("^N", &a), "user");
        a.global_name = Some("Global".into());
        assert_eq!(build_template("^N", &a), "Global");
        assert_eq!(build_template("^U", &a), "Global");
        a.nickname = Some("nick".into());
        assert_eq!(build_template("^N", &a), "nick");
    }

    #[test]
    fn multibyte_characters_next_to_directives() {
        assert_eq!(build_template("é^Tß^", &author()), "é1337ß^");
    }

    #[test]
    fn dollar_in_author_values_is_kept_verbatim() {
        let a = AuthorContext {
            username: "a$1".into(),
            discriminator: "$$".into(),
            ..AuthorContext::default()
        };
        assert_eq!(build_template("^U ^T", &a), "a$1 $$");
    }
}
