//! # BFA Analysis Library
//!
//! Static analysis for the BFA macro assembly language, which compiles to
//! Brainfuck. Builds a symbol table for a document (built-in keywords,
//! in-file and included declarations), checks it, and answers cursor
//! queries for editors.
//!
//! ## Modules
//! - `tokenizer` - Quote-aware line tokenizer
//! - `symbol` - Symbols, scopes and capability flags
//! - `builtins` - Built-in keyword dictionary
//! - `classifier` - Label/variable argument slots of commands
//! - `extractor` - Declarations of a document and its includes
//! - `macro_context` - Enclosing macro of a line
//! - `analysis` - Combined symbol table of one document snapshot
//! - `diagnostics` - Full-document checks
//! - `queries` - Completion, hover, definition and signature help

pub mod analysis;
pub mod builtins;
pub mod classifier;
pub mod diagnostics;
pub mod error;
pub mod extractor;
pub mod macro_context;
pub mod queries;
pub mod symbol;
pub mod syntax;
pub mod tokenizer;

pub use analysis::Analysis;
pub use builtins::Builtins;
pub use diagnostics::{Diagnostic, DiagnosticOptions, Severity, Span};
pub use error::{Error, Result};
pub use extractor::{FsSourceProvider, SourceProvider};
pub use symbol::{Location, Symbol, SymbolKind, SymbolScope};
