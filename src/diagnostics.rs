//! Full-document diagnostic sweep.

use std::collections::HashSet;
use std::fmt;

use crate::analysis::Analysis;
use crate::extractor::IssueKind;
use crate::symbol::Symbol;
use crate::syntax::{self, LEGACY_VARIABLE, MACRO, MACRO_END};
use crate::tokenizer::{self, Token};

pub const UNKNOWN_COMMAND: &str = "unknown-command";
pub const ARGUMENT_COUNT: &str = "argument-count";
pub const UNCLOSED_MACRO: &str = "unclosed-macro";
pub const DANGLING_MACRO_END: &str = "dangling-macroend";
pub const DEPRECATED_VAR: &str = "deprecated-var";
pub const UNDEFINED_VARIABLE: &str = "undefined-variable";
pub const USE_AFTER_FREE: &str = "use-after-free";
pub const UNDEFINED_LABEL: &str = "undefined-label";
pub const UNESCAPED_QUOTE: &str = "unescaped-quote";
pub const MISSING_INCLUDE: &str = "missing-include";
pub const ORPHAN_FREE: &str = "orphan-free";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Information,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Information => "INFO",
        };
        f.write_str(text)
    }
}

/// Byte range on one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(line: usize, start: usize, end: usize) -> Self {
        Span { line, start, end }
    }

    pub fn of(line: usize, token: &Token) -> Self {
        Span::new(line, token.start, token.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub span: Span,
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    fn error(span: Span, code: &'static str, message: String) -> Self {
        Diagnostic {
            span,
            severity: Severity::Error,
            code,
            message,
        }
    }

    fn warning(span: Span, code: &'static str, message: String) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(span, code, message)
        }
    }

    fn information(span: Span, code: &'static str, message: String) -> Self {
        Diagnostic {
            severity: Severity::Information,
            ..Diagnostic::error(span, code, message)
        }
    }
}

/// Switches for the optional checks. Errors are always reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticOptions {
    pub deprecated: bool,
    pub use_after_free: bool,
    pub unescaped_strings: bool,
    pub missing_includes: bool,
    pub orphan_frees: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions {
            deprecated: true,
            use_after_free: true,
            unescaped_strings: true,
            missing_includes: true,
            orphan_frees: true,
        }
    }
}

/// Runs every check over the document, sorted by position and deduplicated.
pub fn run(analysis: &Analysis, options: &DiagnosticOptions) -> Vec<Diagnostic> {
    let lines = analysis.lines();
    let first_word = |line: &str| -> Option<String> {
        if syntax::is_comment(line) {
            return None;
        }
        tokenizer::words(line).into_iter().next().map(|token| token.text)
    };
    let first_macro = lines
        .iter()
        .position(|line| first_word(line).as_deref() == Some(MACRO));
    let last_macro_end = lines
        .iter()
        .rposition(|line| first_word(line).as_deref() == Some(MACRO_END));

    let mut diagnostics = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if syntax::is_comment(line) {
            continue;
        }
        let words = tokenizer::words(line);
        let Some(first) = words.first() else {
            continue;
        };
        if syntax::is_label_word(&first.text) {
            continue;
        }

        let checker = LineChecker {
            analysis,
            options,
            index,
            line,
            words: &words,
            context: analysis.macro_context(index),
        };
        checker.check_command(&mut diagnostics);

        match first.text.as_str() {
            MACRO if last_macro_end.map_or(true, |end| end < index) => {
                diagnostics.push(Diagnostic::error(
                    Span::of(index, first),
                    UNCLOSED_MACRO,
                    "Macro is never closed with `macroend`".to_string(),
                ));
            }
            MACRO_END if first_macro.map_or(true, |start| start > index) => {
                diagnostics.push(Diagnostic::error(
                    Span::of(index, first),
                    DANGLING_MACRO_END,
                    "`macroend` without a preceding `macro`".to_string(),
                ));
            }
            LEGACY_VARIABLE if options.deprecated => {
                diagnostics.push(Diagnostic::warning(
                    Span::of(index, first),
                    DEPRECATED_VAR,
                    "`var` is deprecated, use `all` instead".to_string(),
                ));
            }
            _ => {}
        }

        checker.check_variables(&mut diagnostics);
    }

    for issue in analysis.issues() {
        let span = Span::new(issue.line, issue.start, issue.end);
        match &issue.kind {
            IssueKind::MissingInclude { target } if options.missing_includes => {
                diagnostics.push(Diagnostic::information(
                    span,
                    MISSING_INCLUDE,
                    format!("Cannot read included file {}", target.display()),
                ));
            }
            IssueKind::OrphanFree { name }
                if options.orphan_frees && !is_builtin_variable(analysis, name) =>
            {
                diagnostics.push(Diagnostic::information(
                    span,
                    ORPHAN_FREE,
                    format!("`{name}` is freed but was never declared before this line"),
                ));
            }
            _ => {}
        }
    }

    let mut seen = HashSet::new();
    diagnostics.retain(|diagnostic| seen.insert(diagnostic.clone()));
    diagnostics.sort_by(|a, b| {
        (a.span, a.severity, a.code, &a.message).cmp(&(b.span, b.severity, b.code, &b.message))
    });
    diagnostics
}

/// Compiler-provided variables (`$0`, `$__tmp`) need no declaration, so
/// freeing them is never an orphan free.
fn is_builtin_variable(analysis: &Analysis, name: &str) -> bool {
    analysis
        .builtins()
        .get(name)
        .is_some_and(Symbol::can_be_variable)
}

struct LineChecker<'a> {
    analysis: &'a Analysis,
    options: &'a DiagnosticOptions,
    index: usize,
    line: &'a str,
    words: &'a [Token],
    context: i32,
}

impl<'a> LineChecker<'a> {
    fn command(&self) -> Option<&'a Symbol> {
        let first = &self.words[0];
        self.analysis
            .lookup_where(&first.text, Symbol::can_be_first_word)
    }

    fn check_command(&self, diagnostics: &mut Vec<Diagnostic>) {
        let first = &self.words[0];
        let Some(command) = self.command() else {
            diagnostics.push(Diagnostic::error(
                Span::of(self.index, first),
                UNKNOWN_COMMAND,
                format!("Unknown command `{}`", first.text),
            ));
            return;
        };

        let arguments = tokenizer::arguments(self.words);
        if command.checks_argument_count() && arguments.len() != command.argument_count {
            diagnostics.push(Diagnostic::error(
                Span::of(self.index, first),
                ARGUMENT_COUNT,
                format!(
                    "`{}` expects {} argument{}, found {}",
                    command.label,
                    command.argument_count,
                    if command.argument_count == 1 { "" } else { "s" },
                    arguments.len()
                ),
            ));
        }

        for &slot in &command.arguments.label_arguments {
            let Some(token) = arguments.get(slot) else {
                continue;
            };
            let target = self.analysis.resolve(&token.text, self.index, |symbol| {
                symbol.is_label_in_file_eligible() && symbol.is_visible_in(self.context)
            });
            if target.is_none() {
                diagnostics.push(Diagnostic::error(
                    Span::of(self.index, token),
                    UNDEFINED_LABEL,
                    format!("Undefined label `{}`", token.text),
                ));
            }
        }

        if command.checks_unescaped_strings() && self.options.unescaped_strings {
            let comment_start = self
                .words
                .get(arguments.len() + 1)
                .map_or(self.line.len(), |comment| comment.start);
            self.check_quotes(first.end, comment_start, diagnostics);
        }
    }

    fn check_variables(&self, diagnostics: &mut Vec<Diagnostic>) {
        for token in tokenizer::arguments(self.words) {
            if token.quoted || !syntax::is_variable(&token.text) {
                continue;
            }
            let resolved = self.analysis.resolve(&token.text, self.index, |symbol| {
                symbol.can_be_variable() && symbol.is_visible_in(self.context)
            });
            let Some(variable) = resolved else {
                diagnostics.push(Diagnostic::error(
                    Span::of(self.index, token),
                    UNDEFINED_VARIABLE,
                    format!("Undefined variable `{}`", token.text),
                ));
                continue;
            };

            if !self.options.use_after_free {
                continue;
            }
            if let Some(freed) = &variable.freed_at {
                if freed.file == self.analysis.file() && freed.line < self.index {
                    diagnostics.push(Diagnostic::warning(
                        Span::of(self.index, token),
                        USE_AFTER_FREE,
                        format!("`{}` is used after being freed on line {}", token.text, freed.line + 1),
                    ));
                }
            }
        }
    }

    /// Flags each `"` in `from..to` with no backslash on either side.
    fn check_quotes(&self, from: usize, to: usize, diagnostics: &mut Vec<Diagnostic>) {
        let bytes = self.line.as_bytes();
        for position in from..to.min(bytes.len()) {
            if bytes[position] != b'"' {
                continue;
            }
            let escaped_before = position > 0 && bytes[position - 1] == b'\\';
            let escaped_after = bytes.get(position + 1) == Some(&b'\\');
            if !escaped_before && !escaped_after {
                diagnostics.push(Diagnostic::warning(
                    Span::new(self.index, position, position + 1),
                    UNESCAPED_QUOTE,
                    "Unescaped `\"` ends the text argument, write `\\\"` instead".to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtins;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn diagnose_with(text: &str, provider: &HashMap<PathBuf, String>) -> Vec<Diagnostic> {
        let analysis = Analysis::new(text, Path::new("/work/main.bfa"), Builtins::packaged(), provider);
        run(&analysis, &DiagnosticOptions::default())
    }

    fn diagnose(text: &str) -> Vec<Diagnostic> {
        diagnose_with(text, &HashMap::new())
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<&'static str> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    fn with_foo(body: &str) -> Vec<Diagnostic> {
        let builtins = Builtins::parse("//foo <a> <b>  Takes two.\n");
        let analysis = Analysis::new(
            body,
            Path::new("/work/main.bfa"),
            std::sync::Arc::new(builtins),
            &HashMap::<PathBuf, String>::new(),
        );
        run(&analysis, &DiagnosticOptions::default())
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let text = "\
// Counts down from three.
all $n
set $n 3
:loop
sub $n 1
jnz $n loop
out $n
fre $n
";
        assert!(diagnose(text).is_empty(), "{:?}", diagnose(text));
    }

    #[test]
    fn argument_count_follows_usage() {
        assert_eq!(codes(&with_foo("foo 1")), vec![ARGUMENT_COUNT]);
        assert!(with_foo("foo 1 2").is_empty());
        assert!(with_foo("foo 1 2 // trailing note").is_empty());
        assert_eq!(codes(&with_foo("foo 1 2 3")), vec![ARGUMENT_COUNT]);
    }

    #[test]
    fn unknown_command_spans_the_word() {
        let diagnostics = diagnose("  bogus $x");
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].code, UNKNOWN_COMMAND);
        assert_eq!(diagnostics[0].span, Span::new(0, 2, 7));
        assert_eq!(diagnostics[1].code, UNDEFINED_VARIABLE);
    }

    #[test]
    fn comments_labels_and_blank_lines_are_skipped() {
        assert!(diagnose("// bogus\n\n   \n:start\n\t// more").is_empty());
    }

    #[test]
    fn freeing_compiler_variables_is_not_an_orphan_free() {
        assert!(diagnose("macro m 1\n  fre $0\nmacroend").is_empty());
        assert!(diagnose("fre $__tmp").is_empty());
        assert_eq!(codes(&diagnose("fre $ghost")), vec![UNDEFINED_VARIABLE, ORPHAN_FREE]);
    }

    #[test]
    fn bare_colon_is_a_label_line() {
        assert!(diagnose(":").is_empty());
        assert!(diagnose("  : trailing words").is_empty());
    }

    #[test]
    fn quotes_in_inline_comments_are_ignored() {
        assert!(diagnose("wrt.s hi // say \"x\"").is_empty());
        let diagnostics = diagnose("wrt.s a\"b // \"fine\"");
        assert_eq!(codes(&diagnostics), vec![UNESCAPED_QUOTE]);
        assert_eq!(diagnostics[0].span, Span::new(0, 7, 8));
    }

    #[test]
    fn use_after_free_is_ordered() {
        let text = "\n\nall $x\n\nout $x\nfre $x\nout $x";
        let diagnostics = diagnose(text);
        assert_eq!(codes(&diagnostics), vec![USE_AFTER_FREE]);
        assert_eq!(diagnostics[0].span, Span::new(6, 4, 6));
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn reallocation_after_free_is_fine() {
        assert!(diagnose("all $x\nfre $x\nall $x\nout $x\nfre $x").is_empty());
    }

    #[test]
    fn freeing_twice_warns() {
        assert_eq!(codes(&diagnose("all $x\nfre $x\nfre $x")), vec![USE_AFTER_FREE]);
    }

    #[test]
    fn positional_arguments_follow_macro_context() {
        let text = "macro pair 2\n  add $0 1\n  add $1 1\n  add $2 1\n  add $9 1\nmacroend\nadd $0 1";
        let diagnostics = diagnose(text);
        let undefined: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.code == UNDEFINED_VARIABLE)
            .map(|d| d.span.line)
            .collect();
        assert_eq!(undefined, vec![3, 4, 6]);
    }

    #[test]
    fn positional_argument_can_be_a_label() {
        let text = "macro go 1\n  jmp $0\nmacroend\njmp $0";
        let diagnostics = diagnose(text);
        assert_eq!(codes(&diagnostics), vec![UNDEFINED_LABEL, UNDEFINED_VARIABLE]);
        assert!(diagnostics.iter().all(|d| d.span.line == 3));
    }

    #[test]
    fn unclosed_macro_is_reported_once() {
        let diagnostics = diagnose("all $x\nmacro foo 0\nadd $x 1");
        assert_eq!(codes(&diagnostics), vec![UNCLOSED_MACRO]);
        assert_eq!(diagnostics[0].span, Span::new(1, 0, 5));
    }

    #[test]
    fn dangling_macroend_is_reported() {
        let diagnostics = diagnose("macroend\nmacro foo 0\nmacroend");
        assert_eq!(codes(&diagnostics), vec![DANGLING_MACRO_END]);
        assert_eq!(diagnostics[0].span.line, 0);
    }

    #[test]
    fn legacy_declaration_is_deprecated() {
        let diagnostics = diagnose("var $x\nout $x");
        assert_eq!(codes(&diagnostics), vec![DEPRECATED_VAR]);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn undefined_label_in_label_slot() {
        let diagnostics = diagnose("all $x\n:here\njz $x here\njz $x there");
        assert_eq!(codes(&diagnostics), vec![UNDEFINED_LABEL]);
        assert_eq!(diagnostics[0].span, Span::new(3, 6, 11));
    }

    #[test]
    fn included_labels_are_not_jump_targets() {
        let provider: HashMap<PathBuf, String> =
            [(PathBuf::from("/work/lib.bfa"), ":elsewhere\nall $shared".to_string())].into();
        let diagnostics = diagnose_with("#include \"lib.bfa\"\nout $shared\njmp elsewhere", &provider);
        assert_eq!(codes(&diagnostics), vec![UNDEFINED_LABEL]);
    }

    #[test]
    fn unescaped_quotes_are_flagged() {
        let diagnostics = diagnose("wrt.s They said \"hi\"");
        assert_eq!(codes(&diagnostics), vec![UNESCAPED_QUOTE, UNESCAPED_QUOTE]);
        assert_eq!(diagnostics[0].span, Span::new(0, 16, 17));
        assert_eq!(diagnostics[1].span, Span::new(0, 19, 20));

        assert!(diagnose("wrt.s They said \\\"hi\\\"").is_empty());
    }

    #[test]
    fn write_string_takes_any_number_of_words() {
        assert!(diagnose("wrt.s Hello there world").is_empty());
    }

    #[test]
    fn supplemented_issues_are_informational() {
        let diagnostics = diagnose("#include \"missing.bfa\"\nfre $ghost");
        assert_eq!(codes(&diagnostics), vec![MISSING_INCLUDE, UNDEFINED_VARIABLE, ORPHAN_FREE]);
        assert_eq!(diagnostics[0].severity, Severity::Information);
        assert_eq!(diagnostics[2].severity, Severity::Information);
        assert_eq!(diagnostics[2].span, Span::new(1, 4, 10));
    }

    #[test]
    fn options_switch_off_optional_checks() {
        let analysis = Analysis::new(
            "var $x\nfre $x\nout $x\nwrt.s \"\n#include \"gone.bfa\"\nfre $y\nall $y",
            Path::new("/work/main.bfa"),
            Builtins::packaged(),
            &HashMap::<PathBuf, String>::new(),
        );
        let options = DiagnosticOptions {
            deprecated: false,
            use_after_free: false,
            unescaped_strings: false,
            missing_includes: false,
            orphan_frees: false,
        };
        assert!(run(&analysis, &options).is_empty());
        assert!(!run(&analysis, &DiagnosticOptions::default()).is_empty());
    }

    #[test]
    fn diagnostics_are_stable() {
        let text = "bogus\nmacro m\nvar $x\nfre $x\nout $x\njmp nowhere";
        assert_eq!(diagnose(text), diagnose(text));
        let diagnostics = diagnose(text);
        let mut sorted = diagnostics.clone();
        sorted.sort_by_key(|d| d.span);
        assert_eq!(
            diagnostics.iter().map(|d| d.span).collect::<Vec<_>>(),
            sorted.iter().map(|d| d.span).collect::<Vec<_>>()
        );
    }
}
