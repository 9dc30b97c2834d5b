//! LSP completion handler

use bfalsp::queries::{self, CompletionCandidate};
use bfalsp::SymbolKind;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;

use crate::performance::Stage;
use crate::types::to_position;
use crate::Backend;

fn completion_item_kind(candidate: &CompletionCandidate) -> CompletionItemKind {
    if candidate.keyword {
        return CompletionItemKind::KEYWORD;
    }
    match candidate.kind {
        SymbolKind::Function => CompletionItemKind::FUNCTION,
        SymbolKind::Variable => CompletionItemKind::VARIABLE,
        SymbolKind::Label => CompletionItemKind::REFERENCE,
    }
}

pub(crate) fn to_completion_item(mut candidate: CompletionCandidate) -> CompletionItem {
    let kind = completion_item_kind(&candidate);
    let (insert_text, insert_text_format) = match candidate.snippet.take() {
        Some(snippet) => (Some(snippet), Some(InsertTextFormat::SNIPPET)),
        None => (None, None),
    };
    CompletionItem {
        kind: Some(kind),
        detail: Some(candidate.detail),
        label_details: Some(CompletionItemLabelDetails {
            detail: None,
            description: Some(candidate.scope.to_string()),
        }),
        documentation: (!candidate.documentation.is_empty())
            .then(|| Documentation::String(candidate.documentation)),
        insert_text,
        insert_text_format,
        label: candidate.label,
        ..Default::default()
    }
}

pub async fn handle_completion(
    backend: &Backend,
    params: CompletionParams,
) -> Result<Option<CompletionResponse>> {
    let _timer = backend.profiler.time(Stage::Completion);

    let uri = params.text_document_position.text_document.uri;
    let Some((analysis, content)) = backend.analysis_for(&uri).await else {
        return Err(tower_lsp::jsonrpc::Error::invalid_request());
    };

    let position = to_position(&content, params.text_document_position.position);
    let items: Vec<CompletionItem> = queries::completion(&analysis, position)
        .into_iter()
        .map(to_completion_item)
        .collect();
    tracing::trace!("{} completion items for {uri}", items.len());
    Ok(Some(CompletionResponse::Array(items)))
}
