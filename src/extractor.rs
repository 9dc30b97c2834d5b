//! Document symbol extraction
//!
//! Walks the lines of a document, collecting macros, variables and labels,
//! and follows `#include` directives into other files. Each included file is
//! visited at most once per extraction, so include cycles terminate.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use crate::classifier;
use crate::error::{Error, Result};
use crate::symbol::{Capabilities, Location, Symbol, SymbolKind, SymbolScope};
use crate::syntax::{self, ALLOCATE, COMMENT, FREE, INCLUDE, LEGACY_VARIABLE, MACRO};
use crate::tokenizer::{self, Token};

/// Source of included files.
pub trait SourceProvider {
    fn read(&self, path: &Path) -> Result<String>;

    /// Identity used to detect files that were already visited.
    fn identity(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Reads includes straight from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceProvider;

impl SourceProvider for FsSourceProvider {
    fn read(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// In-memory file set, mostly for tests and unsaved buffers.
impl SourceProvider for HashMap<PathBuf, String> {
    fn read(&self, path: &Path) -> Result<String> {
        self.get(path).cloned().ok_or_else(|| Error::Io {
            path: path.to_path_buf(),
            source: std::io::ErrorKind::NotFound.into(),
        })
    }

    fn identity(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// Include target could not be read
    MissingInclude { target: PathBuf },
    /// Free directive with no variable declared before it
    OrphanFree { name: String },
}

/// A finding of the extraction pass in the queried document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub symbols: Vec<Symbol>,
    pub issues: Vec<Issue>,
}

pub struct Extractor<'a> {
    provider: &'a dyn SourceProvider,
    follow_includes: bool,
    visited: HashSet<PathBuf>,
    issues: Vec<Issue>,
}

impl<'a> Extractor<'a> {
    pub fn new(provider: &'a dyn SourceProvider) -> Self {
        Extractor {
            provider,
            follow_includes: true,
            visited: HashSet::new(),
            issues: Vec::new(),
        }
    }

    pub fn follow_includes(mut self, follow: bool) -> Self {
        self.follow_includes = follow;
        self
    }

    /// Extracts the symbols of `text`, stored at `file`. With `included`
    /// set, every symbol is tagged as coming from an included file.
    pub fn extract(mut self, text: &str, file: &Path, included: bool) -> Extraction {
        let file = normalize(file);
        self.visited.insert(self.provider.identity(&file));
        let symbols = self.extract_file(text, &file, included);
        Extraction {
            symbols,
            issues: self.issues,
        }
    }

    fn extract_file(&mut self, text: &str, file: &Path, included: bool) -> Vec<Symbol> {
        let scope = if included {
            SymbolScope::InIncludedFile
        } else {
            SymbolScope::InFile
        };
        let lines: Vec<&str> = text.lines().collect();
        let mut symbols: Vec<Symbol> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            if syntax::is_comment(line) {
                continue;
            }
            let words = tokenizer::words(line);
            let Some(first) = words.first() else {
                continue;
            };
            let location = Location::new(file, index);

            match first.text.as_str() {
                MACRO => {
                    let Some(name) = words.get(1) else {
                        continue;
                    };
                    let declared = words.get(2).and_then(|token| token.text.parse().ok());
                    symbols.push(declare_macro(&lines, index, &name.text, declared, scope, location));
                }
                LEGACY_VARIABLE | ALLOCATE => {
                    if let Some(name) = words.get(1) {
                        symbols.push(declare(&lines, index, &name.text, SymbolKind::Variable, scope, location));
                    }
                }
                FREE => {
                    if let Some(name) = words.get(1) {
                        self.free(&mut symbols, name, location, included);
                    }
                }
                INCLUDE => {
                    if let Some(target) = words.get(1) {
                        symbols.extend(self.include(file, target, index, included));
                    }
                }
                word => {
                    if let Some(name) = syntax::label_name(word) {
                        symbols.push(declare(&lines, index, name, SymbolKind::Label, scope, location));
                    }
                }
            }
        }

        symbols
    }

    fn free(&mut self, symbols: &mut [Symbol], name: &Token, location: Location, included: bool) {
        let line = location.line;
        let declared = symbols
            .iter_mut()
            .rev()
            .find(|symbol| symbol.kind == SymbolKind::Variable && symbol.label == name.text);
        match declared {
            Some(symbol) => {
                if symbol.freed_at.is_none() {
                    symbol.freed_at = Some(location);
                }
            }
            None if !included => self.issues.push(Issue {
                kind: IssueKind::OrphanFree {
                    name: name.text.clone(),
                },
                line,
                start: name.start,
                end: name.end,
            }),
            None => {}
        }
    }

    fn include(&mut self, file: &Path, target: &Token, line: usize, included: bool) -> Vec<Symbol> {
        if !self.follow_includes {
            return Vec::new();
        }

        let base = file.parent().unwrap_or_else(|| Path::new(""));
        let path = normalize(&base.join(&target.text));
        let identity = self.provider.identity(&path);
        if !self.visited.insert(identity) {
            tracing::debug!("skipping already visited include {}", path.display());
            return Vec::new();
        }

        match self.provider.read(&path) {
            Ok(text) => {
                tracing::debug!("following include {}", path.display());
                self.extract_file(&text, &path, true)
            }
            Err(err) => {
                tracing::debug!("unresolved include: {err}");
                if !included {
                    self.issues.push(Issue {
                        kind: IssueKind::MissingInclude { target: path },
                        line,
                        start: target.start,
                        end: target.end,
                    });
                }
                Vec::new()
            }
        }
    }
}

fn declare(
    lines: &[&str],
    index: usize,
    name: &str,
    kind: SymbolKind,
    scope: SymbolScope,
    location: Location,
) -> Symbol {
    let (usage, documentation) = harvest_comments(lines, index, name);
    let usage = usage.unwrap_or_else(|| lines[index].trim().to_string());
    Symbol::new(name, kind, scope)
        .with_usage(usage)
        .with_documentation(documentation)
        .with_definition(location)
}

fn declare_macro(
    lines: &[&str],
    index: usize,
    name: &str,
    declared: Option<usize>,
    scope: SymbolScope,
    location: Location,
) -> Symbol {
    let (usage, documentation) = harvest_comments(lines, index, name);
    let mut symbol = Symbol::function(name, scope)
        .with_usage(usage.unwrap_or_else(|| name.to_string()))
        .with_documentation(documentation)
        .with_definition(location);

    match declared {
        Some(count) => symbol.argument_count = count,
        None => symbol = symbol.without_capability(Capabilities::CHECK_ARGUMENT_COUNT),
    }
    classifier::classify(&mut symbol);
    symbol
}

/// Collects the comment block directly above `index`.
///
/// A comment whose first word is the declared name is the usage line; the
/// remaining comments, in source order, form the documentation.
pub fn harvest_comments(lines: &[&str], index: usize, name: &str) -> (Option<String>, String) {
    let mut usage = None;
    let mut documentation = Vec::new();

    let mut cursor = index;
    while cursor > 0 && syntax::is_comment(lines[cursor - 1]) {
        cursor -= 1;
        let body = lines[cursor].trim_start()[COMMENT.len()..].trim();
        let first = body.split_whitespace().next().unwrap_or_default();
        if usage.is_none() && syntax::names_match(first, name) {
            usage = Some(body.to_string());
        } else {
            documentation.push(body);
        }
    }

    documentation.reverse();
    (usage, documentation.join("\n").trim().to_string())
}

/// Resolves `.` and `..` without touching the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> HashMap<PathBuf, String> {
        entries
            .iter()
            .map(|(path, text)| (PathBuf::from(path), text.to_string()))
            .collect()
    }

    fn extract(provider: &HashMap<PathBuf, String>, text: &str) -> Extraction {
        Extractor::new(provider).extract(text, Path::new("/src/main.bfa"), false)
    }

    fn find<'a>(symbols: &'a [Symbol], label: &str) -> &'a Symbol {
        symbols.iter().find(|s| s.label == label).unwrap()
    }

    #[test]
    fn collects_declarations() {
        let text = "all $x\nvar $y\n:loop\nmacro twice 2\nmacroend\nadd $x 1";
        let extraction = extract(&HashMap::new(), text);
        let labels: Vec<_> = extraction.symbols.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["$x", "$y", "loop", "twice"]);

        let twice = find(&extraction.symbols, "twice");
        assert_eq!(twice.kind, SymbolKind::Function);
        assert_eq!(twice.scope, SymbolScope::InFile);
        assert_eq!(twice.argument_count, 2);
        assert_eq!(twice.usage, "twice <arg0> <arg1>");
        assert_eq!(
            twice.definition,
            Some(Location::new("/src/main.bfa", 3))
        );

        let label = find(&extraction.symbols, "loop");
        assert_eq!(label.kind, SymbolKind::Label);
        assert_eq!(label.usage, ":loop");
    }

    #[test]
    fn comments_are_not_declarations() {
        let extraction = extract(&HashMap::new(), "// all $x\n  // :loop");
        assert!(extraction.symbols.is_empty());
    }

    #[test]
    fn harvests_usage_and_documentation() {
        let text = "add $a 1\n// Doubles a cell.\n// twice <address> <label>\n// Jumps afterwards.\nmacro twice 2\nmacroend";
        let extraction = extract(&HashMap::new(), text);
        let twice = find(&extraction.symbols, "twice");
        assert_eq!(twice.usage, "twice <address> <label>");
        assert_eq!(twice.documentation, "Doubles a cell.\nJumps afterwards.");
        assert!(twice.arguments.is_variable_slot(0));
        assert!(twice.arguments.is_label_slot(1));
    }

    #[test]
    fn harvest_stops_at_code() {
        let lines = ["// far", "add $x 1", "// near", "all $x"];
        let (usage, documentation) = harvest_comments(&lines, 3, "$x");
        assert_eq!(usage, None);
        assert_eq!(documentation, "near");

        let (usage, _) = harvest_comments(&["// x the counter", "all $x"], 1, "$x");
        assert_eq!(usage.as_deref(), Some("x the counter"));
    }

    #[test]
    fn unparseable_macro_count_disables_checking() {
        let extraction = extract(&HashMap::new(), "macro odd many\nmacroend\nmacro bare\nmacroend");
        let odd = find(&extraction.symbols, "odd");
        assert!(!odd.checks_argument_count());
        assert!(odd.can_be_first_word());
        assert!(!find(&extraction.symbols, "bare").checks_argument_count());
    }

    #[test]
    fn free_marks_the_latest_declaration() {
        let text = "all $x\nfre $x\nall $x\nfre $x";
        let extraction = extract(&HashMap::new(), text);
        let freed: Vec<_> = extraction
            .symbols
            .iter()
            .map(|s| s.freed_at.as_ref().map(|l| l.line))
            .collect();
        assert_eq!(freed, vec![Some(1), Some(3)]);
        assert!(extraction.issues.is_empty());
    }

    #[test]
    fn orphan_free_is_reported() {
        let extraction = extract(&HashMap::new(), "fre $ghost\nall $ghost");
        assert_eq!(
            extraction.issues,
            vec![Issue {
                kind: IssueKind::OrphanFree {
                    name: "$ghost".to_string()
                },
                line: 0,
                start: 4,
                end: 10,
            }]
        );
        assert!(extraction.symbols[0].freed_at.is_none());
    }

    #[test]
    fn included_symbols_are_tagged() {
        let provider = files(&[
            ("/src/lib/io.bfa", "#include \"../core.bfa\"\nmacro print 1\nmacroend"),
            ("/src/core.bfa", "all $__acc\n:start"),
        ]);
        let extraction = extract(&provider, "#include \"lib/io.bfa\"\n:main");

        assert_eq!(find(&extraction.symbols, "print").scope, SymbolScope::InIncludedFile);
        assert_eq!(find(&extraction.symbols, "$__acc").scope, SymbolScope::InIncludedFile);
        assert_eq!(find(&extraction.symbols, "start").scope, SymbolScope::InIncludedFile);
        assert_eq!(find(&extraction.symbols, "main").scope, SymbolScope::InFile);
        assert_eq!(
            find(&extraction.symbols, "$__acc").definition,
            Some(Location::new("/src/core.bfa", 0))
        );
    }

    #[test]
    fn include_cycles_terminate() {
        let provider = files(&[
            ("/src/a.bfa", "#include \"b.bfa\"\n:in_a"),
            ("/src/b.bfa", "#include \"a.bfa\"\n#include \"b.bfa\"\n:in_b"),
            ("/src/main.bfa", "#include \"a.bfa\""),
        ]);
        let extraction = extract(&provider, "#include \"a.bfa\"\n#include \"main.bfa\"\n#include \"a.bfa\"");
        let labels: Vec<_> = extraction.symbols.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["in_b", "in_a"]);
        assert!(extraction.issues.is_empty());
    }

    #[test]
    fn missing_include_is_reported() {
        let extraction = extract(&HashMap::new(), "#include \"nope.bfa\"");
        assert_eq!(extraction.issues.len(), 1);
        let issue = &extraction.issues[0];
        assert_eq!(
            issue.kind,
            IssueKind::MissingInclude {
                target: PathBuf::from("/src/nope.bfa")
            }
        );
        assert_eq!((issue.start, issue.end), (9, 19));
    }

    #[test]
    fn includes_can_be_disabled() {
        let provider = files(&[("/src/a.bfa", ":in_a")]);
        let extraction = Extractor::new(&provider)
            .follow_includes(false)
            .extract("#include \"a.bfa\"\n#include \"gone.bfa\"", Path::new("/src/main.bfa"), false);
        assert!(extraction.symbols.is_empty());
        assert!(extraction.issues.is_empty());
    }

    #[test]
    fn reads_includes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib/inner.bfa"), ":deep").unwrap();
        std::fs::write(dir.path().join("outer.bfa"), "#include \"lib/inner.bfa\"").unwrap();
        let main = dir.path().join("main.bfa");
        std::fs::write(&main, "#include \"outer.bfa\"").unwrap();

        let extraction =
            Extractor::new(&FsSourceProvider).extract("#include \"outer.bfa\"", &main, false);
        let deep = find(&extraction.symbols, "deep");
        assert_eq!(deep.scope, SymbolScope::InIncludedFile);
        assert!(extraction.issues.is_empty());
    }

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d.bfa")), PathBuf::from("/a/c/d.bfa"));
        assert_eq!(normalize(Path::new("../x.bfa")), PathBuf::from("../x.bfa"));
    }
}
