//! Position conversions between the analysis library and LSP
//!
//! The library works with byte columns; the protocol counts UTF-16 code
//! units.

use bfalsp::Span;
use tower_lsp::lsp_types::{Position as LspPosition, Range as LspRange};

/// UTF-16 column of a byte offset within `line`.
pub fn utf16_column(line: &str, byte: usize) -> u32 {
    let byte = byte.min(line.len());
    let end = (0..=byte)
        .rev()
        .find(|&index| line.is_char_boundary(index))
        .unwrap_or(0);
    line[..end].encode_utf16().count() as u32
}

/// Byte offset of a UTF-16 column within `line`, clamped to the line end.
pub fn byte_column(line: &str, utf16: u32) -> usize {
    let mut units = 0u32;
    for (index, ch) in line.char_indices() {
        if units >= utf16 {
            return index;
        }
        units += ch.len_utf16() as u32;
    }
    line.len()
}

pub fn span_to_range(span: &Span, line: &str) -> LspRange {
    LspRange::new(
        LspPosition::new(span.line as u32, utf16_column(line, span.start)),
        LspPosition::new(span.line as u32, utf16_column(line, span.end)),
    )
}

/// Library position of an LSP position in `content`.
pub fn to_position(content: &str, position: LspPosition) -> bfalsp::queries::Position {
    let line = content.lines().nth(position.line as usize).unwrap_or_default();
    bfalsp::queries::Position::new(position.line as usize, byte_column(line, position.character))
}
