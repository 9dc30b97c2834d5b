//! Point queries at a cursor position.
//!
//! Results are plain values; the language server turns them into protocol
//! types.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::analysis::Analysis;
use crate::classifier;
use crate::diagnostics::Span;
use crate::extractor::normalize;
use crate::symbol::{Location, Symbol, SymbolKind, SymbolScope};
use crate::syntax::{self, INCLUDE};
use crate::tokenizer::{self, Token};

/// Zero-based line and byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCandidate {
    pub label: String,
    pub kind: SymbolKind,
    pub scope: SymbolScope,
    pub keyword: bool,
    pub detail: String,
    pub documentation: String,
    pub snippet: Option<String>,
}

impl From<&Symbol> for CompletionCandidate {
    fn from(symbol: &Symbol) -> Self {
        CompletionCandidate {
            label: symbol.label.clone(),
            kind: symbol.kind,
            scope: symbol.scope,
            keyword: symbol.is_keyword(),
            detail: symbol.usage.clone(),
            documentation: symbol.documentation.clone(),
            snippet: symbol.snippet.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverInfo {
    pub usage: String,
    pub documentation: String,
    pub scope: SymbolScope,
    pub freed_at: Option<Location>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: String,
    /// Byte range of the parameter within the signature label
    pub range: (usize, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub label: String,
    pub documentation: String,
    pub parameters: Vec<ParameterInfo>,
    pub active_parameter: usize,
}

/// What the cursor sits on within its line.
enum Slot {
    Command,
    Argument { command: String, index: usize },
}

/// Cursor slot plus the partial word typed so far.
fn slot_at(line: &str, column: usize) -> Option<(Slot, String)> {
    let column = floor_char_boundary(line, column);
    let prefix = &line[..column];
    if syntax::is_comment(prefix) {
        return None;
    }

    let words = tokenizer::words(prefix);
    let typing = !prefix.ends_with([' ', '\t']) && !words.is_empty();
    let partial = if typing {
        words.last().map(|token| token.text.clone()).unwrap_or_default()
    } else {
        String::new()
    };
    let complete = if typing { words.len() - 1 } else { words.len() };

    if complete == 0 {
        return Some((Slot::Command, partial));
    }
    if tokenizer::arguments(&words).len() < words.len() - 1 {
        // Inside an inline comment.
        return None;
    }
    Some((
        Slot::Argument {
            command: words[0].text.clone(),
            index: complete - 1,
        },
        partial,
    ))
}

fn floor_char_boundary(text: &str, column: usize) -> usize {
    let mut column = column.min(text.len());
    while !text.is_char_boundary(column) {
        column -= 1;
    }
    column
}

fn first_word_symbol<'a>(analysis: &'a Analysis, word: &str) -> Option<&'a Symbol> {
    analysis.lookup_where(word, Symbol::can_be_first_word)
}

/// Candidates for the word under the cursor, filtered by what has been typed.
pub fn completion(analysis: &Analysis, position: Position) -> Vec<CompletionCandidate> {
    let Some(line) = analysis.line(position.line) else {
        return Vec::new();
    };
    let Some((slot, partial)) = slot_at(line, position.column) else {
        return Vec::new();
    };
    let context = analysis.macro_context(position.line);

    let accept: Box<dyn Fn(&Symbol) -> bool> = match slot {
        Slot::Command => {
            if partial.starts_with(syntax::LABEL_PREFIX) {
                return Vec::new();
            }
            Box::new(|symbol: &Symbol| symbol.can_be_first_word() && !symbol.is_hidden())
        }
        Slot::Argument { command, index } => {
            let arguments = first_word_symbol(analysis, &command)
                .map(|symbol| symbol.arguments.clone())
                .unwrap_or_default();
            let visible = move |symbol: &Symbol| symbol.is_visible_in(context) && !symbol.is_hidden();

            if syntax::is_variable(&partial) || arguments.is_variable_slot(index) {
                Box::new(move |symbol: &Symbol| visible(symbol) && symbol.can_be_variable())
            } else if arguments.is_label_slot(index) {
                Box::new(move |symbol: &Symbol| visible(symbol) && symbol.is_label_in_file_eligible())
            } else {
                Box::new(move |symbol: &Symbol| {
                    visible(symbol) && (symbol.can_be_variable() || symbol.kind == SymbolKind::Label)
                })
            }
        }
    };

    let mut seen = HashSet::new();
    analysis
        .symbols()
        .filter(|symbol| accept(symbol) && symbol.label.starts_with(partial.as_str()))
        .filter(|symbol| seen.insert(symbol.label.clone()))
        .map(CompletionCandidate::from)
        .collect()
}

/// The token under the cursor and the symbol it names.
fn symbol_at(analysis: &Analysis, position: Position) -> Option<(&Symbol, Token)> {
    let line = analysis.line(position.line)?;
    let words = tokenizer::words(line);
    let index = tokenizer::token_at(&words, position.column)?;
    let token = words[index].clone();

    if index == 0 {
        if let Some(name) = syntax::label_name(&token.text) {
            let symbol = analysis.resolve(name, position.line, |symbol| {
                symbol.kind == SymbolKind::Label
            })?;
            return Some((symbol, token));
        }
        return first_word_symbol(analysis, &token.text).map(|symbol| (symbol, token));
    }
    if index > tokenizer::arguments(&words).len() {
        return None;
    }

    let context = analysis.macro_context(position.line);
    let symbol = analysis.resolve(&token.text, position.line, |symbol| {
        symbol.kind != SymbolKind::Function && symbol.is_visible_in(context)
    })?;
    Some((symbol, token))
}

pub fn hover(analysis: &Analysis, position: Position) -> Option<HoverInfo> {
    let (symbol, token) = symbol_at(analysis, position)?;
    Some(HoverInfo {
        usage: symbol.usage.clone(),
        documentation: symbol.documentation.clone(),
        scope: symbol.scope,
        freed_at: symbol.freed_at.clone(),
        span: Span::of(position.line, &token),
    })
}

/// Declaration of the symbol under the cursor. On an include directive,
/// the included file itself.
pub fn definition(analysis: &Analysis, position: Position) -> Option<Location> {
    let line = analysis.line(position.line)?;
    let words = tokenizer::words(line);
    if words.first().map(|token| token.text.as_str()) == Some(INCLUDE) {
        let target = words.get(1).filter(|token| token.contains(position.column))?;
        let base = analysis.file().parent().map(PathBuf::from).unwrap_or_default();
        return Some(Location::new(normalize(&base.join(&target.text)), 0));
    }

    let (symbol, _) = symbol_at(analysis, position)?;
    symbol.definition.clone()
}

pub fn signature_help(analysis: &Analysis, position: Position) -> Option<SignatureInfo> {
    let line = analysis.line(position.line)?;
    let words = tokenizer::words(line);
    let first = words.first()?;
    if position.column <= first.end {
        return None;
    }
    let command = first_word_symbol(analysis, &first.text)?;

    let arguments = tokenizer::arguments(&words);
    if arguments.len() < words.len() - 1 {
        let comment = &words[arguments.len() + 1];
        if position.column >= comment.start {
            return None;
        }
    }
    let active_parameter = arguments
        .iter()
        .filter(|token| token.end < position.column)
        .count();

    let parameters = classifier::parameters(&command.usage)
        .into_iter()
        .map(|token| ParameterInfo {
            name: token.text,
            range: (token.start, token.end),
        })
        .collect();

    Some(SignatureInfo {
        label: command.usage.clone(),
        documentation: command.documentation.clone(),
        parameters,
        active_parameter,
    })
}

/// Outline of the symbols declared in the document itself.
pub fn document_symbols(analysis: &Analysis) -> Vec<&Symbol> {
    analysis
        .file_symbols()
        .iter()
        .filter(|symbol| symbol.scope == SymbolScope::InFile)
        .collect()
}
