//! Enclosing-macro resolution for positional argument visibility.

use crate::symbol::NO_MACRO;
use crate::syntax::{self, MACRO, MACRO_END};
use crate::tokenizer;

enum Marker {
    Start(i32),
    End,
}

fn marker(line: &str) -> Option<Marker> {
    if syntax::is_comment(line) {
        return None;
    }
    let words = tokenizer::words(line);
    match words.first().map(|token| token.text.as_str()) {
        Some(MACRO) => {
            let count = match words.get(2) {
                Some(token) => token.text.parse().unwrap_or(NO_MACRO),
                None => NO_MACRO,
            };
            Some(Marker::Start(count))
        }
        Some(MACRO_END) => Some(Marker::End),
        _ => None,
    }
}

/// Declared argument count of the macro enclosing `line`, or [`NO_MACRO`].
///
/// Scans backward from `line` itself, so a macro header line is inside its
/// own macro and a `macroend` line is not.
pub fn macro_argument_count<S: AsRef<str>>(lines: &[S], line: usize) -> i32 {
    let end = line.saturating_add(1).min(lines.len());
    lines[..end]
        .iter()
        .rev()
        .find_map(|line| marker(line.as_ref()))
        .map_or(NO_MACRO, |marker| match marker {
            Marker::Start(count) => count,
            Marker::End => NO_MACRO,
        })
}

/// Macro context of every line in one forward pass.
///
/// Same result as calling [`macro_argument_count`] for each line.
pub fn macro_contexts<S: AsRef<str>>(lines: &[S]) -> Vec<i32> {
    let mut current = NO_MACRO;
    lines
        .iter()
        .map(|line| {
            match marker(line.as_ref()) {
                Some(Marker::Start(count)) => current = count,
                Some(Marker::End) => current = NO_MACRO,
                None => {}
            }
            current
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &[&str] = &[
        "all $x",
        "macro twice 2",
        "  add $0 1",
        "  // macroend",
        "  add $1 1",
        "macroend",
        "add $x 1",
        "macro broken",
        "  add $0 1",
        "macroend",
        "macro words many",
    ];

    #[test]
    fn resolves_enclosing_macro() {
        assert_eq!(macro_argument_count(DOCUMENT, 0), NO_MACRO);
        assert_eq!(macro_argument_count(DOCUMENT, 1), 2);
        assert_eq!(macro_argument_count(DOCUMENT, 2), 2);
        assert_eq!(macro_argument_count(DOCUMENT, 4), 2);
        assert_eq!(macro_argument_count(DOCUMENT, 5), NO_MACRO);
        assert_eq!(macro_argument_count(DOCUMENT, 6), NO_MACRO);
    }

    #[test]
    fn malformed_header_yields_sentinel() {
        assert_eq!(macro_argument_count(DOCUMENT, 8), NO_MACRO);
        assert_eq!(macro_argument_count(DOCUMENT, 10), NO_MACRO);
    }

    #[test]
    fn out_of_range_line_is_clamped() {
        assert_eq!(macro_argument_count(DOCUMENT, 99), NO_MACRO);
        assert_eq!(macro_argument_count::<&str>(&[], 0), NO_MACRO);
        assert_eq!(macro_argument_count(&["macro m 3"], 5), 3);
    }

    #[test]
    fn forward_pass_matches_backward_scan() {
        let contexts = macro_contexts(DOCUMENT);
        for (line, context) in contexts.iter().enumerate() {
            assert_eq!(*context, macro_argument_count(DOCUMENT, line), "line {line}");
        }
    }
}
