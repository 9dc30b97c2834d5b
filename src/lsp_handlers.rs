//! LSP handlers for document symbols, signature help and goto definition

use bfalsp::queries::{self, SignatureInfo};
use bfalsp::{syntax, tokenizer, Symbol, SymbolKind as BfaSymbolKind};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;

use crate::performance::Stage;
use crate::types::{to_position, utf16_column};
use crate::Backend;

/// Range of the declared name on a declaration line: the word after the
/// keyword (`macro m 1`, `all $x`), or the label word minus its colon.
/// Falls back to the whole line when the name is not written out.
fn declaration_range(line_number: usize, line: &str, label: &str) -> Range {
    let words = tokenizer::words(line);
    let name = match words.first() {
        Some(first) if syntax::label_name(&first.text) == Some(label) => {
            Some((first.start + syntax::LABEL_PREFIX.len_utf8(), first.end))
        }
        _ => words
            .get(1)
            .filter(|token| token.text == label)
            .map(|token| (token.start, token.end)),
    };
    let (start, end) =
        name.unwrap_or((line.len() - line.trim_start().len(), line.trim_end().len()));
    Range::new(
        Position::new(line_number as u32, utf16_column(line, start)),
        Position::new(line_number as u32, utf16_column(line, end)),
    )
}

fn symbol_kind(symbol: &Symbol) -> SymbolKind {
    match symbol.kind {
        BfaSymbolKind::Function => SymbolKind::FUNCTION,
        BfaSymbolKind::Variable => SymbolKind::VARIABLE,
        BfaSymbolKind::Label => SymbolKind::KEY,
    }
}

pub async fn handle_document_symbol(
    backend: &Backend,
    params: DocumentSymbolParams,
) -> Result<Option<DocumentSymbolResponse>> {
    let _timer = backend.profiler.time(Stage::DocumentSymbols);

    let uri = params.text_document.uri;
    let Some((analysis, _)) = backend.analysis_for(&uri).await else {
        return Err(tower_lsp::jsonrpc::Error::invalid_request());
    };

    let mut ret = Vec::new();
    for symbol in queries::document_symbols(&analysis) {
        let Some(definition) = &symbol.definition else {
            continue;
        };
        let line = analysis.line(definition.line).unwrap_or_default();
        #[allow(deprecated)]
        ret.push(SymbolInformation {
            name: symbol.label.clone(),
            kind: symbol_kind(symbol),
            tags: None,
            deprecated: None,
            location: Location::new(
                uri.clone(),
                declaration_range(definition.line, line, &symbol.label),
            ),
            container_name: None,
        });
    }
    Ok(Some(DocumentSymbolResponse::Flat(ret)))
}

pub(crate) fn to_signature_help(info: SignatureInfo) -> SignatureHelp {
    let parameters = info
        .parameters
        .iter()
        .map(|parameter| ParameterInformation {
            label: ParameterLabel::LabelOffsets([
                utf16_column(&info.label, parameter.range.0),
                utf16_column(&info.label, parameter.range.1),
            ]),
            documentation: None,
        })
        .collect();

    SignatureHelp {
        signatures: vec![SignatureInformation {
            label: info.label,
            documentation: (!info.documentation.is_empty())
                .then(|| Documentation::String(info.documentation)),
            parameters: Some(parameters),
            active_parameter: None,
        }],
        active_signature: Some(0),
        active_parameter: Some(info.active_parameter as u32),
    }
}

pub async fn handle_signature_help(
    backend: &Backend,
    params: SignatureHelpParams,
) -> Result<Option<SignatureHelp>> {
    let _timer = backend.profiler.time(Stage::SignatureHelp);

    let uri = params.text_document_position_params.text_document.uri;
    let Some((analysis, content)) = backend.analysis_for(&uri).await else {
        return Err(tower_lsp::jsonrpc::Error::invalid_request());
    };

    let position = to_position(&content, params.text_document_position_params.position);
    Ok(queries::signature_help(&analysis, position).map(to_signature_help))
}

pub async fn handle_goto_definition(
    backend: &Backend,
    params: GotoDefinitionParams,
) -> Result<Option<GotoDefinitionResponse>> {
    let _timer = backend.profiler.time(Stage::Definition);

    let uri = params.text_document_position_params.text_document.uri;
    let Some((analysis, content)) = backend.analysis_for(&uri).await else {
        return Err(tower_lsp::jsonrpc::Error::invalid_request());
    };

    let position = to_position(&content, params.text_document_position_params.position);
    let Some(target) = queries::definition(&analysis, position) else {
        return Ok(None);
    };

    // Declarations in this document span the declaring line; other files
    // get an empty range at the start of the target line.
    if target.file == analysis.file() {
        let line = analysis.line(target.line).unwrap_or_default();
        return Ok(Some(GotoDefinitionResponse::Scalar(Location::new(
            uri,
            line_range(target.line, line),
        ))));
    }
    match Url::from_file_path(&target.file) {
        Ok(url) => Ok(Some(GotoDefinitionResponse::Scalar(Location::new(
            url,
            line_range(target.line, ""),
        )))),
        Err(()) => {
            tracing::debug!("no file url for {}", target.file.display());
            Ok(None)
        }
    }
}

fn line_range(line_number: usize, line: &str) -> Range {
    Range::new(
        Position::new(line_number as u32, 0),
        Position::new(line_number as u32, utf16_column(line, line.len())),
    )
}
