//! Cursor-based, quote-aware reader over command text.
//!
//! [`StringView`] walks a command string one character at a time. Words are
//! either runs of non-whitespace or quoted spans delimited by one of the
//! pairs in [`QUOTES`]. Inside a quoted span a backslash escapes only the
//! active open/close characters; any other escaped character is kept as-is,
//! backslash included.
//!
//! ```rust,ignore
//! let mut view = StringView::new(r#"ban "some user" spamming links"#);
//! assert_eq!(view.get_word(), "ban");
//! view.skip_ws();
//! assert_eq!(view.get_quoted_word()?, Some("some user".to_string()));
//! assert_eq!(view.read_rest(), "spamming links");
//! ```

use crate::error::TokenizeError;

/// Opening quote characters and the character that closes each.
pub const QUOTES: &[(char, char)] = &[
    ('"', '"'),
    ('\u{2018}', '\u{2019}'), // ‘ ’
    ('\u{201A}', '\u{201B}'), // ‚ ‛
    ('\u{201C}', '\u{201D}'), // “ ”
    ('\u{201E}', '\u{201F}'), // „ ‟
    ('\u{2E42}', '\u{2E42}'), // ⹂
    ('\u{300C}', '\u{300D}'), // 「 」
    ('\u{300E}', '\u{300F}'), // 『 』
    ('\u{301D}', '\u{301E}'), // 〝 〞
    ('\u{FE41}', '\u{FE42}'), // ﹁ ﹂
    ('\u{FE43}', '\u{FE44}'), // ﹃ ﹄
    ('\u{FF02}', '\u{FF02}'), // ＂
    ('\u{FF62}', '\u{FF63}'), // ｢ ｣
    ('\u{00AB}', '\u{00BB}'), // « »
    ('\u{2039}', '\u{203A}'), // ‹ ›
    ('\u{300A}', '\u{300B}'), // 《 》
    ('\u{3008}', '\u{3009}'), // 〈 〉
];

const ESCAPE: char = '\\';

/// Returns the closing character if `c` opens a quoted word.
pub fn closing_quote(c: char) -> Option<char> {
    QUOTES
        .iter()
        .find_map(|&(open, close)| (open == c).then_some(close))
}

/// Whether `c` is any opening or closing quote character.
pub fn is_quote(c: char) -> bool {
    QUOTES.iter().any(|&(open, close)| open == c || close == c)
}

/// A read cursor over a command string.
///
/// Invariant: `0 <= index <= end`. `previous` remembers the position before
/// the last single-character read so that exactly one [`get`](Self::get) can
/// be undone.
#[derive(Debug, Clone)]
pub struct StringView {
    buffer: Vec<char>,
    index: usize,
    previous: usize,
    end: usize,
}

impl StringView {
    /// Creates a view positioned at the start of `text`.
    pub fn new(text: &str) -> Self {
        let buffer: Vec<char> = text.chars().collect();
        let end = buffer.len();
        Self {
            buffer,
            index: 0,
            previous: 0,
            end,
        }
    }

    /// Current position, in characters.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Moves the cursor to a position previously returned by [`index`](Self::index).
    pub fn restore(&mut self, index: usize) {
        self.index = index.min(self.end);
        self.previous = self.index;
    }

    /// Whether the cursor reached the end of input.
    pub fn eof(&self) -> bool {
        self.index >= self.end
    }

    /// Character under the cursor, without consuming it.
    pub fn current(&self) -> Option<char> {
        self.buffer.get(self.index).copied()
    }

    /// Skips a run of whitespace. Returns whether the cursor moved.
    pub fn skip_ws(&mut self) -> bool {
        let start = self.index;
        while let Some(c) = self.current() {
            if !c.is_whitespace() {
                break;
            }
            self.index += 1;
        }
        if self.index != start {
            self.previous = start;
            true
        } else {
            false
        }
    }

    /// Consumes `literal` if the input continues with it exactly.
    pub fn skip_string(&mut self, literal: &str) -> bool {
        self.skip_with(literal, |a, b| a == b)
    }

    /// Like [`skip_string`](Self::skip_string), ignoring case.
    pub fn skip_string_ignore_case(&mut self, literal: &str) -> bool {
        self.skip_with(literal, |a, b| {
            a == b || a.to_lowercase().eq(b.to_lowercase())
        })
    }

    fn skip_with(&mut self, literal: &str, eq: impl Fn(char, char) -> bool) -> bool {
        let mut len = 0;
        for (offset, expected) in literal.chars().enumerate() {
            match self.buffer.get(self.index + offset) {
                Some(&actual) if eq(actual, expected) => len += 1,
                _ => return false,
            }
        }
        self.previous = self.index;
        self.index += len;
        true
    }

    /// Consumes and returns everything up to the end of input.
    pub fn read_rest(&mut self) -> String {
        let rest: String = self.buffer[self.index..self.end].iter().collect();
        self.previous = self.index;
        self.index = self.end;
        rest
    }

    /// Consumes and returns up to `n` characters.
    pub fn read(&mut self, n: usize) -> String {
        let stop = (self.index + n).min(self.end);
        let out: String = self.buffer[self.index..stop].iter().collect();
        self.previous = self.index;
        self.index = stop;
        out
    }

    /// Consumes and returns one character, remembering the position for [`undo`](Self::undo).
    pub fn get(&mut self) -> Option<char> {
        let c = self.current()?;
        self.previous = self.index;
        self.index += 1;
        Some(c)
    }

    /// Steps back to the position before the last single read.
    pub fn undo(&mut self) {
        self.index = self.previous;
    }

    /// Consumes a run of non-whitespace characters.
    ///
    /// Trailing whitespace is left in place.
    pub fn get_word(&mut self) -> String {
        let start = self.index;
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                break;
            }
            self.index += 1;
        }
        self.previous = start;
        self.buffer[start..self.index].iter().collect()
    }

    /// Reads one quoted or plain word.
    ///
    /// Returns `Ok(None)` at end of input. A quoted word must be followed by
    /// whitespace or the end of input; the cursor is left past the closing
    /// quote and the single whitespace character after it. A plain word ends
    /// at whitespace (consumed) or end of input, and may not contain quote
    /// characters unless they are escaped.
    pub fn get_quoted_word(&mut self) -> Result<Option<String>, TokenizeError> {
        let Some(first) = self.get() else {
            return Ok(None);
        };

        let close = closing_quote(first);
        let mut result = String::new();
        if close.is_none() {
            result.push(first);
        }

        loop {
            let Some(c) = self.get() else {
                return match close {
                    Some(close) => Err(TokenizeError::UnterminatedQuote { close }),
                    None => Ok(Some(result)),
                };
            };

            if c == ESCAPE {
                let Some(next) = self.get() else {
                    return match close {
                        Some(close) => Err(TokenizeError::UnterminatedQuote { close }),
                        // A dangling escape at end of input is dropped.
                        None => Ok(Some(result)),
                    };
                };
                let escapable = match close {
                    Some(close) => next == first || next == close,
                    None => is_quote(next),
                };
                if escapable {
                    result.push(next);
                } else {
                    self.undo();
                    result.push(c);
                }
                continue;
            }

            match close {
                None if is_quote(c) => return Err(TokenizeError::UnexpectedQuote { quote: c }),
                None if c.is_whitespace() => return Ok(Some(result)),
                Some(close) if c == close => {
                    return match self.get() {
                        None => Ok(Some(result)),
                        Some(next) if next.is_whitespace() => Ok(Some(result)),
                        Some(found) => Err(TokenizeError::InvalidQuoteTrailing { found }),
                    };
                }
                _ => result.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_words() {
        let mut view = StringView::new("hello  world");
        assert_eq!(view.get_quoted_word().unwrap().as_deref(), Some("hello"));
        view.skip_ws();
        assert_eq!(view.get_quoted_word().unwrap().as_deref(), Some("world"));
        assert!(view.eof());
        assert_eq!(view.get_quoted_word().unwrap(), None);
    }

    #[test]
    fn test_quoted_with_escaped_inner_quote() {
        let mut view = StringView::new(r#""hello \"world\"""#);
        assert_eq!(
            view.get_quoted_word().unwrap().as_deref(),
            Some(r#"hello "world""#)
        );
        assert!(view.eof());
    }

    #[test]
    fn test_every_quote_pair() {
        for &(open, close) in QUOTES {
            let text = format!("{open}a b{close} rest");
            let mut view = StringView::new(&text);
            assert_eq!(view.get_quoted_word().unwrap().as_deref(), Some("a b"));
            assert_eq!(view.read_rest(), "rest");
        }
    }

    #[test]
    fn test_unterminated_quote() {
        let mut view = StringView::new("\"unterminated");
        assert_eq!(
            view.get_quoted_word(),
            Err(TokenizeError::UnterminatedQuote { close: '"' })
        );
    }

    #[test]
    fn test_unexpected_quote_in_plain_word() {
        let mut view = StringView::new("ab\"c");
        assert_eq!(
            view.get_quoted_word(),
            Err(TokenizeError::UnexpectedQuote { quote: '"' })
        );
    }

    #[test]
    fn test_invalid_trailing_after_quote() {
        let mut view = StringView::new("\"abc\"def");
        assert_eq!(
            view.get_quoted_word(),
            Err(TokenizeError::InvalidQuoteTrailing { found: 'd' })
        );
    }

    #[test]
    fn test_other_escapes_kept_literally() {
        let mut view = StringView::new(r#""a\nb""#);
        assert_eq!(view.get_quoted_word().unwrap().as_deref(), Some(r"a\nb"));
    }

    #[test]
    fn test_escaped_quote_in_plain_word() {
        let mut view = StringView::new(r#"it\"s fine"#);
        assert_eq!(view.get_quoted_word().unwrap().as_deref(), Some(r#"it"s"#));
    }

    #[test]
    fn test_curly_quote_escape_only_active_pair() {
        let mut view = StringView::new("\u{201C}say \\\"hi\\\u{201D}\u{201D}");
        assert_eq!(
            view.get_quoted_word().unwrap().as_deref(),
            Some("say \\\"hi\u{201D}")
        );
    }

    #[test]
    fn test_skip_ws_noop_on_non_whitespace() {
        let mut view = StringView::new("abc");
        assert!(!view.skip_ws());
        assert_eq!(view.index(), 0);
        assert_eq!(view.current(), Some('a'));
    }

    #[test]
    fn test_plain_word_drops_dangling_escape() {
        let mut view = StringView::new("path\\");
        assert_eq!(view.get_quoted_word().unwrap().as_deref(), Some("path"));
        assert!(view.eof());

        let mut view = StringView::new("a\\b c");
        assert_eq!(view.get_quoted_word().unwrap().as_deref(), Some("a\\b"));
    }

    #[test]
    fn test_skip_ws_advances() {
        let mut view = StringView::new("  \tabc");
        assert!(view.skip_ws());
        assert_eq!(view.current(), Some('a'));
    }

    #[test]
    fn test_skip_string() {
        let mut view = StringView::new("!ping");
        assert!(!view.skip_string("?"));
        assert!(view.skip_string("!"));
        assert_eq!(view.get_word(), "ping");

        let mut view = StringView::new("BOT ping");
        assert!(!view.skip_string("bot"));
        assert!(view.skip_string_ignore_case("bot"));
    }

    #[test]
    fn test_get_and_undo() {
        let mut view = StringView::new("ab");
        assert_eq!(view.get(), Some('a'));
        assert_eq!(view.get(), Some('b'));
        view.undo();
        assert_eq!(view.current(), Some('b'));
        assert_eq!(view.get(), Some('b'));
        assert_eq!(view.get(), None);
    }

    #[test]
    fn test_read_and_read_rest() {
        let mut view = StringView::new("abcdef");
        assert_eq!(view.read(2), "ab");
        assert_eq!(view.read(10), "cdef");
        assert!(view.eof());
        assert_eq!(view.read_rest(), "");
    }

    #[test]
    fn test_get_word_leaves_whitespace() {
        let mut view = StringView::new("one two");
        assert_eq!(view.get_word(), "one");
        assert_eq!(view.current(), Some(' '));
    }
}
