//! Diagnostic helper utilities
//!
//! Conversion of library diagnostics to LSP diagnostics, plus deduplication
//! and digests used to skip republishing unchanged results.

use bfalsp::{Diagnostic as BfaDiagnostic, Severity};
use sha2::{Digest, Sha256};
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};

use crate::types::span_to_range;

/// Create a unique identity tuple for a diagnostic
///
/// Two diagnostics with the same identity are considered duplicates.
pub fn diagnostic_identity(diag: &Diagnostic) -> (u32, u32, u32, u32, String) {
    (
        diag.range.start.line,
        diag.range.start.character,
        diag.range.end.line,
        diag.range.end.character,
        diag.message.clone(),
    )
}

pub fn to_lsp_severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
    }
}

pub fn to_lsp_diagnostic(diagnostic: &BfaDiagnostic, content: &str) -> Diagnostic {
    let line = content.lines().nth(diagnostic.span.line).unwrap_or_default();
    Diagnostic {
        source: Some("bfa".to_string()),
        ..Diagnostic::new(
            span_to_range(&diagnostic.span, line),
            Some(to_lsp_severity(diagnostic.severity)),
            Some(NumberOrString::String(diagnostic.code.to_string())),
            None,
            diagnostic.message.clone(),
            None,
            None,
        )
    }
}

/// Hex digest of a diagnostic set, stable for equal sets.
pub fn diagnostics_digest(diagnostics: &[Diagnostic]) -> String {
    let mut hasher = Sha256::new();
    for diag in diagnostics {
        let (start_line, start_char, end_line, end_char, message) = diagnostic_identity(diag);
        hasher.update(format!("{start_line}:{start_char}:{end_line}:{end_char}:{:?}:{message}\n", diag.severity));
    }
    format!("{:x}", hasher.finalize())
}
