//! Surface syntax of the BFA macro language
//!
//! Markers, sigils and directive names shared by the extractor, the
//! diagnostics engine and the query layer.

/// Doc-comment marker. Also ends the argument list when it starts a token.
pub const COMMENT: &str = "//";

/// Prefix of every variable name (`$counter`, `$0`).
pub const VARIABLE_SIGIL: char = '$';

/// Prefix of compiler directives such as `#include`.
pub const DIRECTIVE_SIGIL: char = '#';

/// A line whose first token starts with this declares a label.
pub const LABEL_PREFIX: char = ':';

pub const MACRO: &str = "macro";
pub const MACRO_END: &str = "macroend";

/// Deprecated variable declaration, superseded by [`ALLOCATE`].
pub const LEGACY_VARIABLE: &str = "var";
pub const ALLOCATE: &str = "all";
pub const FREE: &str = "fre";
pub const INCLUDE: &str = "#include";
pub const WRITE_STRING: &str = "wrt.s";

/// Usage placeholder marking an argument slot that takes a label.
pub const LABEL_PLACEHOLDER: &str = "<label>";

/// Parameter names containing this (case-insensitive) take a variable.
pub const ADDRESS_HINT: &str = "address";

pub fn is_comment(text: &str) -> bool {
    text.trim_start().starts_with(COMMENT)
}

pub fn is_variable(text: &str) -> bool {
    text.starts_with(VARIABLE_SIGIL)
}

/// A line starting with the label prefix is a label line, even when no
/// name follows the colon.
pub fn is_label_word(text: &str) -> bool {
    text.starts_with(LABEL_PREFIX)
}

/// Name declared by a label line, without the leading colon.
pub fn label_name(text: &str) -> Option<&str> {
    text.strip_prefix(LABEL_PREFIX).filter(|name| !name.is_empty())
}

/// Compares a harvested usage word against a declared name, ignoring sigils.
pub fn names_match(word: &str, name: &str) -> bool {
    let strip = |s: &str| s.trim_start_matches([VARIABLE_SIGIL, LABEL_PREFIX]).to_string();
    !word.is_empty() && (word == name || strip(word) == strip(name))
}
