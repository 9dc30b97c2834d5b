//! Per-query analysis of one document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builtins::Builtins;
use crate::extractor::{normalize, Extractor, Issue, SourceProvider};
use crate::macro_context::macro_contexts;
use crate::symbol::{Symbol, SymbolScope, NO_MACRO};

/// Symbol table and line view of a document snapshot.
///
/// Built from scratch for every query. Only the built-in dictionary is
/// shared between analyses.
#[derive(Debug, Clone)]
pub struct Analysis {
    file: PathBuf,
    lines: Vec<String>,
    builtins: Arc<Builtins>,
    file_symbols: Vec<Symbol>,
    issues: Vec<Issue>,
    contexts: Vec<i32>,
}

impl Analysis {
    pub fn new(
        text: &str,
        file: &Path,
        builtins: Arc<Builtins>,
        provider: &dyn SourceProvider,
    ) -> Self {
        Self::with_options(text, file, builtins, provider, true)
    }

    pub fn with_options(
        text: &str,
        file: &Path,
        builtins: Arc<Builtins>,
        provider: &dyn SourceProvider,
        follow_includes: bool,
    ) -> Self {
        let extraction = Extractor::new(provider)
            .follow_includes(follow_includes)
            .extract(text, file, false);
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let contexts = macro_contexts(lines.as_slice());

        Analysis {
            file: normalize(file),
            lines,
            builtins,
            file_symbols: extraction.symbols,
            issues: extraction.issues,
            contexts,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Built-ins first, then the symbols extracted from the document and its
    /// includes, in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.builtins.symbols().iter().chain(self.file_symbols.iter())
    }

    /// Symbols extracted from the document and its includes.
    pub fn file_symbols(&self) -> &[Symbol] {
        &self.file_symbols
    }

    pub fn lookup(&self, label: &str) -> Option<&Symbol> {
        self.lookup_where(label, |_| true)
    }

    /// A built-in wins over file symbols; among file symbols the last
    /// declaration wins.
    pub fn lookup_where(&self, label: &str, predicate: impl Fn(&Symbol) -> bool) -> Option<&Symbol> {
        let matches = |symbol: &&Symbol| symbol.label == label && predicate(symbol);
        self.builtins
            .symbols()
            .iter()
            .find(matches)
            .or_else(|| self.file_symbols.iter().rev().find(matches))
    }

    /// Like [`Analysis::lookup_where`], but prefers the declaration in this
    /// document that is closest above `line`, so a variable re-allocated
    /// after being freed resolves to its new declaration.
    pub fn resolve(
        &self,
        label: &str,
        line: usize,
        predicate: impl Fn(&Symbol) -> bool,
    ) -> Option<&Symbol> {
        let matches = |symbol: &&Symbol| symbol.label == label && predicate(symbol);
        if let Some(builtin) = self.builtins.symbols().iter().find(matches) {
            return Some(builtin);
        }

        let mut candidates = self.file_symbols.iter().filter(matches);
        let preceding = candidates.clone().rev().find(|symbol| {
            symbol.scope == SymbolScope::InFile
                && symbol
                    .definition
                    .as_ref()
                    .is_some_and(|location| location.line <= line)
        });
        preceding.or_else(|| candidates.next_back())
    }

    pub fn macro_context(&self, line: usize) -> i32 {
        self.contexts.get(line).copied().unwrap_or(NO_MACRO)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}
