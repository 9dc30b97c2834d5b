//! Document storage and server configuration
//!
//! Open documents are kept as plain text; every request re-analyzes the
//! current snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bfalsp::{DiagnosticOptions, FsSourceProvider, SourceProvider};
use serde_json::Value;
use tower_lsp::lsp_types::Url;

/// Configuration for the language server
#[derive(Debug, Clone)]
pub struct Configuration {
    pub warn_deprecated: bool,
    pub warn_use_after_free: bool,
    pub warn_unescaped_strings: bool,
    pub report_missing_includes: bool,
    pub report_orphan_frees: bool,
    pub follow_includes: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            warn_deprecated: true,
            warn_use_after_free: true,
            warn_unescaped_strings: true,
            report_missing_includes: true,
            report_orphan_frees: true,
            follow_includes: true,
        }
    }
}

impl Configuration {
    /// Applies the fields present in a client settings object. Missing or
    /// mistyped fields keep their current value.
    pub fn update_from_json(&mut self, value: &Value) {
        if let Some(diagnostics) = value.get("diagnostics").and_then(Value::as_object) {
            let flag = |name: &str, current: bool| {
                diagnostics
                    .get(name)
                    .and_then(Value::as_bool)
                    .unwrap_or(current)
            };
            self.warn_deprecated = flag("deprecated", self.warn_deprecated);
            self.warn_use_after_free = flag("useAfterFree", self.warn_use_after_free);
            self.warn_unescaped_strings = flag("unescapedStrings", self.warn_unescaped_strings);
            self.report_missing_includes = flag("missingIncludes", self.report_missing_includes);
            self.report_orphan_frees = flag("orphanFrees", self.report_orphan_frees);
        }
        self.follow_includes = value
            .get("followIncludes")
            .and_then(Value::as_bool)
            .unwrap_or(self.follow_includes);
    }

    pub fn diagnostic_options(&self) -> DiagnosticOptions {
        DiagnosticOptions {
            deprecated: self.warn_deprecated,
            use_after_free: self.warn_use_after_free,
            unescaped_strings: self.warn_unescaped_strings,
            missing_includes: self.report_missing_includes,
            orphan_frees: self.report_orphan_frees,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentData {
    pub url: Url,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct FileData {
    pub document_data: DocumentData,
}

/// File system path of a document. Non-file URLs map to their path part so
/// relative includes still resolve against something stable.
pub fn url_to_path(url: &Url) -> PathBuf {
    url.to_file_path()
        .unwrap_or_else(|_| PathBuf::from(url.path()))
}

/// Reads includes from open editor buffers first, then from disk.
pub struct OverlaySourceProvider {
    buffers: HashMap<PathBuf, String>,
}

impl OverlaySourceProvider {
    pub fn from_files(files: &HashMap<Url, FileData>) -> Self {
        let buffers = files
            .values()
            .map(|data| (url_to_path(&data.document_data.url), data.document_data.content.clone()))
            .collect();
        OverlaySourceProvider { buffers }
    }
}

impl SourceProvider for OverlaySourceProvider {
    fn read(&self, path: &Path) -> bfalsp::Result<String> {
        match self.buffers.get(path) {
            Some(text) => Ok(text.clone()),
            None => FsSourceProvider.read(path),
        }
    }
}
