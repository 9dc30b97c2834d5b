//! Argument tokenizer
//!
//! Splits a source line into tokens on spaces and tabs. A token that opens
//! with `"` runs until the next unescaped `"`; the quotes are stripped and
//! `\"` becomes `"`. A literal that is never closed swallows the rest of the
//! line. Empty tokens (from repeated separators) are kept, because the
//! dictionary format uses a double space to separate usage from docs.

use crate::syntax::COMMENT;

/// A token and its byte range within the line.
///
/// For quoted tokens the range includes the quotes while `text` holds the
/// unescaped content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub quoted: bool,
}

impl Token {
    /// True for an unquoted token that starts an inline comment.
    pub fn is_comment(&self) -> bool {
        !self.quoted && self.text.starts_with(COMMENT)
    }

    pub fn contains(&self, column: usize) -> bool {
        self.start <= column && column <= self.end
    }
}

fn is_separator(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut start = 0;
    let mut quoted = false;
    let mut in_string = false;
    let mut chars = line.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if in_string {
            match ch {
                '\\' if matches!(chars.peek(), Some((_, '"'))) => {
                    chars.next();
                    text.push('"');
                }
                '"' => in_string = false,
                _ => text.push(ch),
            }
            continue;
        }

        if is_separator(ch) {
            tokens.push(Token {
                text: std::mem::take(&mut text),
                start,
                end: idx,
                quoted,
            });
            quoted = false;
            start = idx + ch.len_utf8();
        } else if ch == '"' && idx == start {
            in_string = true;
            quoted = true;
        } else {
            text.push(ch);
        }
    }

    tokens.push(Token {
        text,
        start,
        end: line.len(),
        quoted,
    });
    tokens
}

/// Non-empty tokens of a line.
pub fn words(line: &str) -> Vec<Token> {
    tokenize(line)
        .into_iter()
        .filter(|token| token.quoted || !token.text.is_empty())
        .collect()
}

/// Tokens after the command word, up to (excluding) an inline comment.
pub fn arguments(words: &[Token]) -> &[Token] {
    let Some(rest) = words.get(1..) else {
        return &[];
    };
    let end = rest
        .iter()
        .position(Token::is_comment)
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Index into `words` of the token under `column`, if any.
pub fn token_at(words: &[Token], column: usize) -> Option<usize> {
    words.iter().position(|token| token.contains(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(line: &str) -> Vec<String> {
        tokenize(line).into_iter().map(|t| t.text).collect()
    }

    fn rejoin(tokens: &[Token]) -> String {
        tokens
            .iter()
            .map(|t| {
                if t.quoted {
                    format!("\"{}\"", t.text.replace('"', "\\\""))
                } else {
                    t.text.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn splits_on_single_spaces() {
        assert_eq!(texts("add $x 1"), vec!["add", "$x", "1"]);
        assert_eq!(texts("add  $x"), vec!["add", "", "$x"]);
    }

    #[test]
    fn quoted_literal_is_one_token() {
        let tokens = tokenize(r#"#include "lib/std io.bfa""#);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text, "lib/std io.bfa");
        assert!(tokens[1].quoted);
        assert_eq!(tokens[1].start, 9);
        assert_eq!(tokens[1].end, 25);
    }

    #[test]
    fn escaped_quotes_are_unescaped() {
        assert_eq!(
            texts(r#"wrt.s "say \"hi\" now""#),
            vec!["wrt.s", r#"say "hi" now"#]
        );
    }

    #[test]
    fn unterminated_literal_absorbs_rest_of_line() {
        assert_eq!(texts(r#"wrt.s "open ended text"#), vec!["wrt.s", "open ended text"]);
    }

    #[test]
    fn quote_inside_a_word_is_literal() {
        assert_eq!(texts(r#"said"hi""#), vec![r#"said"hi""#]);
    }

    #[test]
    fn balanced_lines_round_trip() {
        for line in [
            "add $x 1",
            r#"wrt.s "say \"hi\" now" end"#,
            r#"#include "a b.bfa""#,
            r#"jmp "" loop"#,
        ] {
            assert_eq!(rejoin(&tokenize(line)), line);
        }
    }

    #[test]
    fn arguments_stop_at_inline_comment() {
        let words = words("add $x 1 // bump");
        let args: Vec<_> = arguments(&words).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(args, vec!["$x", "1"]);
    }

    #[test]
    fn quoted_comment_marker_is_an_argument() {
        let words = words(r#"wrt.s "// not a comment""#);
        assert_eq!(arguments(&words).len(), 1);
    }

    #[test]
    fn words_skip_indentation() {
        let words = words("    add $0 1");
        assert_eq!(words[0].text, "add");
        assert_eq!(words[0].start, 4);
        assert_eq!(token_at(&words, 9), Some(1));
    }
}
