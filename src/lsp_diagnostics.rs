//! LSP diagnostics handler
//!
//! Runs the full diagnostic sweep for a document and publishes the result.
//! A digest of the last published set per document lets identical results
//! (for example after an edit inside a comment) skip the round trip.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use bfalsp::{diagnostics, Analysis, Builtins, SourceProvider};
use tower_lsp::lsp_types::{Diagnostic, Url};

use crate::diagnostic_helpers::{diagnostic_identity, diagnostics_digest, to_lsp_diagnostic};
use crate::document::{url_to_path, Configuration, OverlaySourceProvider};
use crate::performance::{Profiler, ProfilingSourceProvider, Stage};
use crate::Backend;

/// Compute the LSP diagnostics of one text buffer.
pub fn compute_diagnostics(
    content: &str,
    path: &Path,
    builtins: Arc<Builtins>,
    provider: &dyn SourceProvider,
    config: &Configuration,
    profiler: &Profiler,
) -> Vec<Diagnostic> {
    let analysis = {
        let _timer = profiler.time(Stage::Analysis);
        let provider = ProfilingSourceProvider::new(provider, profiler);
        Analysis::with_options(content, path, builtins, &provider, config.follow_includes)
    };
    let found = {
        let _timer = profiler.time(Stage::DiagnosticSweep);
        diagnostics::run(&analysis, &config.diagnostic_options())
    };
    let mut seen = HashSet::new();
    found
        .iter()
        .map(|diagnostic| to_lsp_diagnostic(diagnostic, content))
        .filter(|diagnostic| seen.insert(diagnostic_identity(diagnostic)))
        .collect()
}

pub async fn run_diagnostics(backend: &Backend, uri: &Url) {
    // If diagnostics disabled, clear and bail
    if !*backend.diagnostics_enabled.read().await {
        backend.published_digests.remove(uri);
        backend
            .client
            .publish_diagnostics(uri.clone(), vec![], None)
            .await;
        return;
    }

    let (content, provider) = {
        let files = backend.files.read().await;
        let Some(file_data) = files.get(uri) else {
            return;
        };
        (
            file_data.document_data.content.clone(),
            OverlaySourceProvider::from_files(&files),
        )
    };
    let config = backend.config.read().await.clone();

    let diagnostics = compute_diagnostics(
        &content,
        &url_to_path(uri),
        backend.builtins.clone(),
        &provider,
        &config,
        &backend.profiler,
    );

    let digest = diagnostics_digest(&diagnostics);
    if backend
        .published_digests
        .get(uri)
        .is_some_and(|previous| *previous == digest)
    {
        backend.profiler.note_unchanged_publish();
        tracing::debug!("diagnostics for {uri} unchanged, not republishing");
        return;
    }
    backend.published_digests.insert(uri.clone(), digest);

    backend
        .client
        .publish_diagnostics(uri.clone(), diagnostics, None)
        .await;
}
