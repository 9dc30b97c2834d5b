//! # BFA Language Server (bfalsp)
//!
//! Language Server Protocol front end for the BFA macro-assembly language,
//! which compiles to Brainfuck.
//!
//! ## Key Features
//! - Diagnostics for unknown commands, argument counts, macro structure,
//!   undefined variables and labels, use after free and unescaped quotes
//! - Completion of commands, variables and labels, aware of macro bodies
//! - Hover documentation, signature help and go-to-definition
//! - Following of `#include` directives, including unsaved editor buffers
//!
//! ## Architecture
//! All analysis lives in the `bfalsp` library. Every request re-analyzes the
//! current snapshot of its document; this binary only stores documents,
//! debounces diagnostics and converts results to LSP types.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bfalsp::{Analysis, Builtins, FsSourceProvider};
use dashmap::DashMap;
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::RwLock,
};
use tower_lsp::{async_trait, jsonrpc::Result, lsp_types::*, Client};
use tower_lsp::{LanguageServer, LspService, Server};

/// Command-line interface handling
mod cli;

/// Profiling of analysis stages and request handlers
mod performance;

/// Position conversions between byte and UTF-16 columns
mod types;

/// Document storage and configuration
mod document;

/// Diagnostic helper utilities
mod diagnostic_helpers;

/// LSP completion handler
mod lsp_completion;

/// LSP diagnostics handler
mod lsp_diagnostics;

/// LSP hover handler
mod lsp_hover;

/// LSP handlers for document symbols, signature help and goto definition
mod lsp_handlers;

use document::*;
use performance::{ProfilingSourceProvider, Stage};

const DIAGNOSTIC_DEBOUNCE_MS: u64 = 250;
const DEFAULT_PORT: u16 = 9257;

struct Backend {
    client: Client,
    files: Arc<RwLock<HashMap<Url, FileData>>>,
    config: Arc<RwLock<Configuration>>,
    // Runtime flag to allow diagnostics suppression without restart
    diagnostics_enabled: Arc<RwLock<bool>>,
    builtins: Arc<Builtins>,
    profiler: Arc<performance::Profiler>,
    // Debounce: pending diagnostic task per file
    pending_diagnostics: Arc<tokio::sync::Mutex<HashMap<Url, tokio::task::JoinHandle<()>>>>,
    // Digest of the diagnostics last published per file
    published_digests: Arc<DashMap<Url, String>>,
}

#[async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(init_options) = params.initialization_options {
            self.config.write().await.update_from_json(&init_options);
        }

        self.client
            .log_message(
                MessageType::INFO,
                format!(
                    "BFALSP init: symbols={} keywords={}",
                    self.builtins.symbols().len(),
                    self.builtins.keyword_count()
                ),
            )
            .await;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![
                        "version".to_string(),
                        "setDiagnostics".to_string(),
                        "bfa.server.enableProfiling".to_string(),
                        "bfa.server.getProfileReport".to_string(),
                    ],
                    work_done_progress_options: WorkDoneProgressOptions {
                        work_done_progress: None,
                    },
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec![" ".to_string()]),
                    retrigger_characters: None,
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                document_symbol_provider: Some(OneOf::Left(true)),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec![" ".to_string(), "$".to_string()]),
                    completion_item: Some(CompletionOptionsCompletionItem {
                        label_details_support: Some(true),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "bfalsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        match params.command.as_str() {
            "version" => {
                self.client
                    .show_message(
                        MessageType::INFO,
                        concat!("BFALSP Version: ", env!("CARGO_PKG_VERSION")),
                    )
                    .await;
            }
            "setDiagnostics" => {
                if let Some(enabled) = params.arguments.first().and_then(Value::as_bool) {
                    *self.diagnostics_enabled.write().await = enabled;
                    // re-run or clear diagnostics for all open documents
                    for uri in self.open_uris().await {
                        self.run_diagnostics(&uri).await;
                    }
                }
            }
            "bfa.server.enableProfiling" => {
                if let Some(enabled) = params.arguments.first().and_then(Value::as_bool) {
                    self.profiler.set_enabled(enabled);
                    let message = if enabled {
                        "BFA profiling enabled, timing analysis stages and include reads."
                    } else {
                        "BFA profiling disabled."
                    };
                    self.client.show_message(MessageType::INFO, message).await;
                }
            }
            "bfa.server.getProfileReport" => {
                let report = self.profiler.report();
                self.client.log_message(MessageType::INFO, report.clone()).await;
                return Ok(Some(Value::String(report)));
            }
            other => {
                tracing::warn!("unknown command {other}");
            }
        }
        Ok(None)
    }

    async fn shutdown(&self) -> Result<()> {
        let mut pending = self.pending_diagnostics.lock().await;
        for (_, handle) in pending.drain() {
            handle.abort();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.update_content(params.text_document.uri.clone(), params.text_document.text)
            .await;
        self.run_diagnostics(&params.text_document.uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        for change in params.content_changes {
            // Should only ever be one, because we are getting full updates
            self.update_content(params.text_document.uri.clone(), change.text)
                .await;
        }

        // Diagnostics run once the edits stop for the debounce window
        let uri = params.text_document.uri;
        {
            let mut pending = self.pending_diagnostics.lock().await;
            if let Some(handle) = pending.remove(&uri) {
                handle.abort();
            }
        }

        let uri_for_task = uri.clone();
        let backend = self.clone_handles();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(DIAGNOSTIC_DEBOUNCE_MS)).await;
            backend.run_diagnostics(&uri_for_task).await;
            backend.pending_diagnostics.lock().await.remove(&uri_for_task);
        });

        self.pending_diagnostics.lock().await.insert(uri, handle);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(handle) = self.pending_diagnostics.lock().await.remove(&uri) {
            handle.abort();
        }
        self.files.write().await.remove(&uri);
        self.published_digests.remove(&uri);
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.config.write().await.update_from_json(&params.settings);
        tracing::info!("configuration updated: {:?}", *self.config.read().await);

        for uri in self.open_uris().await {
            self.run_diagnostics(&uri).await;
        }
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        lsp_handlers::handle_document_symbol(self, params).await
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        lsp_completion::handle_completion(self, params).await
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        lsp_handlers::handle_signature_help(self, params).await
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        lsp_handlers::handle_goto_definition(self, params).await
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        lsp_hover::handle_hover(self, params).await
    }
}

impl Backend {
    fn new(client: Client, builtins: Arc<Builtins>) -> Self {
        Backend {
            client,
            files: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(RwLock::new(Configuration::default())),
            diagnostics_enabled: Arc::new(RwLock::new(true)),
            builtins,
            profiler: Arc::new(performance::Profiler::new()),
            pending_diagnostics: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            published_digests: Arc::new(DashMap::new()),
        }
    }

    /// Shares all state with `self`, for moving into spawned tasks.
    fn clone_handles(&self) -> Self {
        Backend {
            client: self.client.clone(),
            files: self.files.clone(),
            config: self.config.clone(),
            diagnostics_enabled: self.diagnostics_enabled.clone(),
            builtins: self.builtins.clone(),
            profiler: self.profiler.clone(),
            pending_diagnostics: self.pending_diagnostics.clone(),
            published_digests: self.published_digests.clone(),
        }
    }

    async fn update_content(&self, uri: Url, text: String) {
        let mut files = self.files.write().await;
        match files.get_mut(&uri) {
            Some(file_data) => file_data.document_data.content = text,
            None => {
                files.insert(
                    uri.clone(),
                    FileData {
                        document_data: DocumentData { url: uri, content: text },
                    },
                );
            }
        }
    }

    async fn open_uris(&self) -> Vec<Url> {
        self.files.read().await.keys().cloned().collect()
    }

    /// Fresh analysis of an open document, with its text.
    ///
    /// Includes are read from other open buffers before the disk.
    async fn analysis_for(&self, uri: &Url) -> Option<(Analysis, String)> {
        let (content, provider) = {
            let files = self.files.read().await;
            let file_data = files.get(uri)?;
            (
                file_data.document_data.content.clone(),
                OverlaySourceProvider::from_files(&files),
            )
        };
        let follow_includes = self.config.read().await.follow_includes;
        let _timer = self.profiler.time(Stage::Analysis);
        let analysis = Analysis::with_options(
            &content,
            &url_to_path(uri),
            self.builtins.clone(),
            &ProfilingSourceProvider::new(&provider, &self.profiler),
            follow_includes,
        );
        Some((analysis, content))
    }

    async fn run_diagnostics(&self, uri: &Url) {
        lsp_diagnostics::run_diagnostics(self, uri).await
    }
}

fn severity_name(severity: Option<DiagnosticSeverity>) -> &'static str {
    match severity {
        Some(DiagnosticSeverity::ERROR) => "ERROR",
        Some(DiagnosticSeverity::WARNING) => "WARN",
        Some(DiagnosticSeverity::INFORMATION) => "INFO",
        Some(DiagnosticSeverity::HINT) => "HINT",
        _ => "UNKNOWN",
    }
}

/// Diagnostic runner mode: prints the diagnostics of each file to stdout.
fn diagnose(paths: &[std::path::PathBuf], builtins: Arc<Builtins>) -> ExitCode {
    let config = Configuration::default();
    let mut status = ExitCode::SUCCESS;
    for path in paths {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("cannot read {}: {e}", path.display());
                status = ExitCode::FAILURE;
                continue;
            }
        };
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
        let diagnostics = lsp_diagnostics::compute_diagnostics(
            &content,
            &absolute,
            builtins.clone(),
            &FsSourceProvider,
            &config,
            &performance::Profiler::new(),
        );

        println!("Diagnostics for {}:", path.display());
        if diagnostics.is_empty() {
            println!("  (no diagnostics)");
        } else {
            for d in diagnostics {
                println!(
                    "  {}:{}:{} - {}",
                    severity_name(d.severity),
                    d.range.start.line,
                    d.range.start.character,
                    d.message
                );
            }
        }
        println!();
    }
    status
}

fn load_builtins(path: Option<&Path>) -> Arc<Builtins> {
    let Some(path) = path else {
        return Builtins::packaged();
    };
    match Builtins::load(path) {
        Ok(builtins) => Arc::new(builtins),
        Err(e) => {
            tracing::error!("{e}; falling back to the bundled dictionary");
            Builtins::packaged()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    use clap::Parser as _;
    let cli = cli::Cli::parse();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level)
        .init();

    let builtins = load_builtins(cli.builtins.as_deref());

    if !cli.diagnose.is_empty() {
        return diagnose(&cli.diagnose, builtins);
    }

    let (service, socket) = LspService::new(|client| Backend::new(client, builtins));

    if !cli.listen && cli.host.is_none() {
        // stdin/stdout
        Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
            .serve(service)
            .await;
    } else if cli.listen {
        let host = match cli.host.as_deref().unwrap_or("127.0.0.1").parse::<Ipv4Addr>() {
            Ok(host) => host,
            Err(e) => {
                tracing::error!("could not parse IP address: {e}");
                return ExitCode::FAILURE;
            }
        };
        let port = cli.port.unwrap_or(DEFAULT_PORT);

        let stream = match TcpListener::bind((host, port)).await {
            Ok(listener) => match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::error!("failed to accept connection: {e}");
                    return ExitCode::FAILURE;
                }
            },
            Err(e) => {
                tracing::error!("failed to bind {host}:{port}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let (input, output) = tokio::io::split(stream);
        Server::new(input, output, socket).serve(service).await;
    } else {
        let (Some(host), Some(port)) = (cli.host, cli.port) else {
            tracing::error!("--host requires --port");
            return ExitCode::FAILURE;
        };

        let stream = match TcpStream::connect((host.as_str(), port)).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("could not open TCP stream to {host}:{port}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let (input, output) = tokio::io::split(stream);
        Server::new(input, output, socket).serve(service).await;
    }
    ExitCode::SUCCESS
}
