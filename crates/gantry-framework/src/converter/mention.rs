//! Extracting ids from raw ids and mention syntax.

use std::sync::LazyLock;

use regex::Regex;

use gantry_core::Snowflake;

static ID: LazyLock<Regex> = LazyLock::new(|| compile(r"^([0-9]{15,21})$"));
static GENERIC: LazyLock<Regex> = LazyLock::new(|| compile(r"^<(?:@[!&]?|#)([0-9]{15,21})>$"));
static USER: LazyLock<Regex> = LazyLock::new(|| compile(r"^<@!?([0-9]{15,21})>$"));
static CHANNEL: LazyLock<Regex> = LazyLock::new(|| compile(r"^<#([0-9]{15,21})>$"));
static ROLE: LazyLock<Regex> = LazyLock::new(|| compile(r"^<@&([0-9]{15,21})>$"));

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => panic!("invalid built-in mention pattern {pattern}: {err}"),
    }
}

/// Which mention syntax to accept besides a bare id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionKind {
    /// User, role or channel mention.
    Any,
    User,
    Channel,
    Role,
}

impl MentionKind {
    fn pattern(self) -> &'static Regex {
        match self {
            Self::Any => &*GENERIC,
            Self::User => &*USER,
            Self::Channel => &*CHANNEL,
            Self::Role => &*ROLE,
        }
    }
}

fn capture(re: &Regex, input: &str) -> Option<Snowflake> {
    re.captures(input)?.get(1)?.as_str().parse().ok()
}

/// Parses a bare id or a mention of the given kind.
pub fn extract_id(input: &str, kind: MentionKind) -> Option<Snowflake> {
    capture(&ID, input).or_else(|| capture(kind.pattern(), input))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_STR: &str = "123456789012345678";

    #[test]
    fn test_bare_id() {
        assert_eq!(
            extract_id(ID_STR, MentionKind::Role),
            Some(Snowflake(123456789012345678))
        );
        assert_eq!(extract_id("1234", MentionKind::Any), None);
    }

    #[test]
    fn test_user_mentions() {
        let expected = Some(Snowflake(123456789012345678));
        assert_eq!(extract_id(&format!("<@{ID_STR}>"), MentionKind::User), expected);
        assert_eq!(extract_id(&format!("<@!{ID_STR}>"), MentionKind::User), expected);
        assert_eq!(extract_id(&format!("<@&{ID_STR}>"), MentionKind::User), None);
    }

    #[test]
    fn test_kind_specific_patterns() {
        assert!(extract_id(&format!("<#{ID_STR}>"), MentionKind::Channel).is_some());
        assert!(extract_id(&format!("<#{ID_STR}>"), MentionKind::Role).is_none());
        assert!(extract_id(&format!("<@&{ID_STR}>"), MentionKind::Role).is_some());
    }

    #[test]
    fn test_generic_accepts_all() {
        for text in [
            format!("<@{ID_STR}>"),
            format!("<@!{ID_STR}>"),
            format!("<@&{ID_STR}>"),
            format!("<#{ID_STR}>"),
        ] {
            assert!(extract_id(&text, MentionKind::Any).is_some(), "{text}");
        }
    }
}
