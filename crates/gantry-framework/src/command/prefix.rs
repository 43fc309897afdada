//! Matching the command prefix at the start of a message.

use super::view::StringView;
use gantry_core::Snowflake;

/// Recognises configured prefixes and, optionally, a mention of the bot.
#[derive(Debug, Clone, Default)]
pub struct PrefixMatcher {
    /// Longest first, so `!!` is tried before `!`.
    prefixes: Vec<String>,
    mention: bool,
    case_insensitive: bool,
}

impl PrefixMatcher {
    /// Creates a matcher for the given prefixes. Empty prefixes are ignored.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        prefixes.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        Self {
            prefixes,
            mention: false,
            case_insensitive: false,
        }
    }

    /// Also accept `<@id>` / `<@!id>` of the bot as a prefix.
    pub fn with_mention(mut self, enabled: bool) -> Self {
        self.mention = enabled;
        self
    }

    /// Compare prefixes ignoring case.
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Strips a prefix from `content`.
    ///
    /// Returns the matched prefix and a view positioned right after it, or
    /// `None` if the message does not address the bot. A mention prefix may
    /// be followed by whitespace, which is skipped.
    pub fn strip(&self, content: &str, bot_id: Option<Snowflake>) -> Option<(String, StringView)> {
        let mut view = StringView::new(content);

        if let (true, Some(id)) = (self.mention, bot_id) {
            for mention in [format!("<@{id}>"), format!("<@!{id}>")] {
                if view.skip_string(&mention) {
                    view.skip_ws();
                    return Some((mention, view));
                }
            }
        }

        for prefix in &self.prefixes {
            let matched = if self.case_insensitive {
                view.skip_string_ignore_case(prefix)
            } else {
                view.skip_string(prefix)
            };
            if matched {
                return Some((prefix.clone(), view));
            }
        }
        None
    }
}
