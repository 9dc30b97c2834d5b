//! Built-in keyword dictionary
//!
//! The dictionary is a plain text resource. A line made of the comment
//! marker immediately followed by a keyword declares that keyword:
//!
//! ```text
//! //add <address> <value>  Adds value to the cell.
//! ```
//!
//! Everything up to the first double space is the usage line, the rest is
//! the description.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use phf::{phf_map, phf_set};
use regex::Regex;

use crate::classifier;
use crate::error::{Error, Result};
use crate::symbol::{Capabilities, Symbol, SymbolScope};
use crate::syntax::{COMMENT, DIRECTIVE_SIGIL, MACRO, MACRO_END};
use crate::tokenizer;

const PACKAGED_DICTIONARY: &str = include_str!("../resources/builtins.bfadoc");

/// Positional macro arguments `$0` to `$9`.
const POSITIONAL_ARGUMENTS: usize = 10;

/// Cells shared between compiled programs, the interpreter and the standard
/// library. Always defined, never suggested.
static INTERNAL_VARIABLES: phf::Set<&'static str> =
    phf_set!("$__in", "$__out", "$__ret", "$__tmp", "$__ptr");

#[derive(Debug, Clone, Copy)]
enum Special {
    MacroTemplate,
    WriteString,
}

static SPECIAL_KEYWORDS: phf::Map<&'static str, Special> = phf_map! {
    "macro" => Special::MacroTemplate,
    "wrt.s" => Special::WriteString,
};

fn declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^//[^\s$]").expect("declaration pattern is valid"))
}

#[derive(Debug, Clone, Default)]
pub struct Builtins {
    symbols: Vec<Symbol>,
    keyword_count: usize,
}

impl Builtins {
    /// Parses a dictionary resource. Lines that are not declarations are
    /// ignored, so this never fails.
    pub fn parse(resource: &str) -> Self {
        let mut symbols: Vec<Symbol> = resource
            .lines()
            .filter(|line| declaration_pattern().is_match(line))
            .filter_map(|line| parse_declaration(&line[COMMENT.len()..]))
            .collect();
        let keyword_count = symbols.len();

        symbols.extend((0..POSITIONAL_ARGUMENTS).map(|index| {
            Symbol::variable(format!("${index}"), SymbolScope::Compiler)
                .with_documentation(format!("Positional argument {index} of the enclosing macro."))
                .with_capability(Capabilities::LABEL)
                .with_macro_gate(index as i32 + 1)
        }));

        let mut internal: Vec<&str> = INTERNAL_VARIABLES.iter().copied().collect();
        internal.sort_unstable();
        symbols.extend(internal.into_iter().map(|name| {
            Symbol::variable(name, SymbolScope::Compiler)
                .with_documentation("Reserved for the runtime and the standard library.")
                .with_capability(Capabilities::HIDDEN)
        }));

        Builtins {
            symbols,
            keyword_count,
        }
    }

    /// The dictionary compiled into the binary, parsed once per process.
    pub fn packaged() -> Arc<Builtins> {
        static PACKAGED: OnceLock<Arc<Builtins>> = OnceLock::new();
        PACKAGED
            .get_or_init(|| Arc::new(Builtins::parse(PACKAGED_DICTIONARY)))
            .clone()
    }

    /// Reads a dictionary from disk.
    pub fn load(path: &Path) -> Result<Builtins> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let builtins = Builtins::parse(&text);
        if builtins.keyword_count == 0 {
            return Err(Error::EmptyDictionary {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(
            "loaded {} keywords from {}",
            builtins.keyword_count,
            path.display()
        );
        Ok(builtins)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn get(&self, label: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|symbol| symbol.label == label)
    }

    /// Number of declared keywords, excluding synthesized variables.
    pub fn keyword_count(&self) -> usize {
        self.keyword_count
    }
}

fn parse_declaration(body: &str) -> Option<Symbol> {
    let tokens = tokenizer::tokenize(body);
    let split = tokens
        .iter()
        .position(|token| !token.quoted && token.text.is_empty())
        .unwrap_or(tokens.len());

    let usage = tokens[..split]
        .iter()
        .map(|token| token.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let documentation = tokens
        .get(split)
        .map(|token| body[token.end..].trim())
        .unwrap_or_default();

    let name = usage.split(' ').next().filter(|name| !name.is_empty())?;
    let mut symbol = Symbol::function(name, SymbolScope::Compiler)
        .with_usage(usage.as_str())
        .with_documentation(documentation);

    if name.starts_with(DIRECTIVE_SIGIL) {
        symbol = symbol.with_capability(Capabilities::KEYWORD);
    }
    symbol = match SPECIAL_KEYWORDS.get(name) {
        Some(Special::MacroTemplate) => symbol.with_snippet(format!(
            "{MACRO} ${{1:name}} ${{2:0}}\n\t$0\n{MACRO_END}"
        )),
        Some(Special::WriteString) => symbol
            .without_capability(Capabilities::CHECK_ARGUMENT_COUNT)
            .with_capability(Capabilities::CHECK_UNESCAPED_STRINGS),
        None => symbol,
    };

    classifier::classify(&mut symbol);
    Some(symbol)
}
