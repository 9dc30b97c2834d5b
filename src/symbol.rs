//! Symbol model shared by the dictionary loader, the extractor and the
//! diagnostics engine.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;

use crate::tokenizer;

/// Macro context value meaning "not inside any macro".
pub const NO_MACRO: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Invocable command or macro
    Function,
    /// Memory-backed name
    Variable,
    /// Jump target
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolScope {
    Compiler,
    InFile,
    InIncludedFile,
    Undefined,
}

impl fmt::Display for SymbolScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SymbolScope::Compiler => "built-in",
            SymbolScope::InFile => "this file",
            SymbolScope::InIncludedFile => "included file",
            SymbolScope::Undefined => "undefined",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: PathBuf,
    /// Zero-based line
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Location {
            file: file.into(),
            line,
        }
    }
}

/// Capability bitset of a symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const FIRST_WORD: Capabilities = Capabilities(1);
    pub const LABEL: Capabilities = Capabilities(1 << 1);
    pub const VARIABLE: Capabilities = Capabilities(1 << 2);
    /// First-word directive such as `#include`
    pub const KEYWORD: Capabilities = Capabilities(1 << 3);
    /// Never offered as a completion candidate
    pub const HIDDEN: Capabilities = Capabilities(1 << 4);
    pub const CHECK_ARGUMENT_COUNT: Capabilities = Capabilities(1 << 5);
    pub const CHECK_UNESCAPED_STRINGS: Capabilities = Capabilities(1 << 6);

    pub const fn empty() -> Self {
        Capabilities(0)
    }

    /// Flags every symbol of `kind` has without any override.
    pub fn intrinsic(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Function => Self::FIRST_WORD | Self::CHECK_ARGUMENT_COUNT,
            SymbolKind::Variable => Self::VARIABLE,
            SymbolKind::Label => Self::LABEL,
        }
    }

    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Capabilities) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Capabilities) {
        self.0 &= !other.0;
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Capabilities) {
        self.insert(rhs);
    }
}

/// Zero-based argument slots that take a label or a variable.
///
/// Argument `i` corresponds to usage token `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentMap {
    pub label_arguments: BTreeSet<usize>,
    pub variable_arguments: BTreeSet<usize>,
}

impl ArgumentMap {
    pub fn is_label_slot(&self, index: usize) -> bool {
        self.label_arguments.contains(&index)
    }

    pub fn is_variable_slot(&self, index: usize) -> bool {
        self.variable_arguments.contains(&index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub label: String,
    pub kind: SymbolKind,
    pub scope: SymbolScope,
    pub usage: String,
    pub documentation: String,
    pub argument_count: usize,
    pub definition: Option<Location>,
    pub freed_at: Option<Location>,
    pub only_show_in_macro_argument_count: i32,
    pub arguments: ArgumentMap,
    pub snippet: Option<String>,
    capabilities: Capabilities,
    explicit: Capabilities,
}

impl Symbol {
    pub fn new(label: impl Into<String>, kind: SymbolKind, scope: SymbolScope) -> Self {
        let label = label.into();
        Symbol {
            usage: label.clone(),
            label,
            kind,
            scope,
            documentation: String::new(),
            argument_count: 0,
            definition: None,
            freed_at: None,
            only_show_in_macro_argument_count: NO_MACRO,
            arguments: ArgumentMap::default(),
            snippet: None,
            capabilities: Capabilities::intrinsic(kind),
            explicit: Capabilities::empty(),
        }
    }

    pub fn function(label: impl Into<String>, scope: SymbolScope) -> Self {
        Self::new(label, SymbolKind::Function, scope)
    }

    pub fn variable(label: impl Into<String>, scope: SymbolScope) -> Self {
        Self::new(label, SymbolKind::Variable, scope)
    }

    pub fn label(label: impl Into<String>, scope: SymbolScope) -> Self {
        Self::new(label, SymbolKind::Label, scope)
    }

    /// Sets the usage line and derives the argument count from its
    /// `<...>` tokens.
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self.argument_count = count_parameters(&self.usage);
        self
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }

    pub fn with_definition(mut self, location: Location) -> Self {
        self.definition = Some(location);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_macro_gate(mut self, argument_count: i32) -> Self {
        self.only_show_in_macro_argument_count = argument_count;
        self
    }

    /// Explicitly grants a capability.
    pub fn with_capability(mut self, capability: Capabilities) -> Self {
        self.capabilities.insert(capability);
        self.explicit.insert(capability);
        self
    }

    pub fn without_capability(mut self, capability: Capabilities) -> Self {
        self.capabilities.remove(capability);
        self.explicit.remove(capability);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn has(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    /// True only when the capability was granted by an override, not by kind.
    pub fn has_explicit(&self, capability: Capabilities) -> bool {
        self.explicit.contains(capability)
    }

    pub fn can_be_first_word(&self) -> bool {
        self.has(Capabilities::FIRST_WORD)
    }

    pub fn can_be_label(&self) -> bool {
        self.has(Capabilities::LABEL)
    }

    pub fn can_be_variable(&self) -> bool {
        self.has(Capabilities::VARIABLE)
    }

    pub fn is_keyword(&self) -> bool {
        self.has(Capabilities::KEYWORD)
    }

    pub fn is_hidden(&self) -> bool {
        self.has(Capabilities::HIDDEN)
    }

    pub fn checks_argument_count(&self) -> bool {
        self.has(Capabilities::CHECK_ARGUMENT_COUNT)
    }

    pub fn checks_unescaped_strings(&self) -> bool {
        self.has(Capabilities::CHECK_UNESCAPED_STRINGS)
    }

    /// Valid target for a label argument: an in-file label, or anything
    /// explicitly flagged as usable as a label.
    pub fn is_label_in_file_eligible(&self) -> bool {
        (self.kind == SymbolKind::Label && self.scope == SymbolScope::InFile)
            || self.has_explicit(Capabilities::LABEL)
    }

    pub fn is_visible_in(&self, macro_context: i32) -> bool {
        self.only_show_in_macro_argument_count == NO_MACRO
            || macro_context >= self.only_show_in_macro_argument_count
    }

    pub fn is_freed(&self) -> bool {
        self.freed_at.is_some()
    }
}

pub fn is_parameter(word: &str) -> bool {
    word.len() > 2 && word.starts_with('<') && word.ends_with('>')
}

/// Number of `<...>` tokens after the command word.
pub fn count_parameters(usage: &str) -> usize {
    tokenizer::words(usage)
        .iter()
        .skip(1)
        .filter(|token| is_parameter(&token.text))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_count_comes_from_usage() {
        let symbol = Symbol::function("foo", SymbolScope::Compiler).with_usage("foo <a> <b>");
        assert_eq!(symbol.argument_count, 2);
        assert_eq!(count_parameters("foo"), 0);
        assert_eq!(count_parameters("foo <a> 1 <>"), 1);
    }

    #[test]
    fn kind_sets_intrinsic_capabilities() {
        let function = Symbol::function("add", SymbolScope::Compiler);
        assert!(function.can_be_first_word());
        assert!(function.checks_argument_count());
        assert!(!function.can_be_variable());

        let variable = Symbol::variable("$x", SymbolScope::InFile);
        assert!(variable.can_be_variable());
        assert!(!variable.can_be_label());
        assert!(!variable.is_label_in_file_eligible());
    }

    #[test]
    fn explicit_label_override_is_remembered() {
        let positional =
            Symbol::variable("$0", SymbolScope::Compiler).with_capability(Capabilities::LABEL);
        assert!(positional.can_be_label());
        assert!(positional.has_explicit(Capabilities::LABEL));
        assert!(positional.is_label_in_file_eligible());

        let label = Symbol::label("loop", SymbolScope::InFile);
        assert!(!label.has_explicit(Capabilities::LABEL));
        assert!(label.is_label_in_file_eligible());

        let included = Symbol::label("loop", SymbolScope::InIncludedFile);
        assert!(!included.is_label_in_file_eligible());
    }

    #[test]
    fn capability_can_be_cleared() {
        let symbol = Symbol::function("wrt.s", SymbolScope::Compiler)
            .without_capability(Capabilities::CHECK_ARGUMENT_COUNT)
            .with_capability(Capabilities::CHECK_UNESCAPED_STRINGS);
        assert!(!symbol.checks_argument_count());
        assert!(symbol.checks_unescaped_strings());
        assert!(symbol.can_be_first_word());
    }

    #[test]
    fn macro_gate_controls_visibility() {
        let always = Symbol::variable("$x", SymbolScope::InFile);
        assert!(always.is_visible_in(NO_MACRO));

        let second = Symbol::variable("$1", SymbolScope::Compiler).with_macro_gate(2);
        assert!(!second.is_visible_in(NO_MACRO));
        assert!(!second.is_visible_in(1));
        assert!(second.is_visible_in(2));
        assert!(second.is_visible_in(5));
    }
}
