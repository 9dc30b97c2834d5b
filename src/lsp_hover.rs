//! LSP hover handler

use bfalsp::queries::{self, HoverInfo};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;

use crate::performance::Stage;
use crate::types::{span_to_range, to_position};
use crate::Backend;

pub(crate) fn to_hover(info: HoverInfo, line: &str) -> Hover {
    let mut contents = vec![MarkedString::LanguageString(LanguageString {
        language: "bfa".to_string(),
        value: info.usage,
    })];
    if !info.documentation.is_empty() {
        contents.push(MarkedString::String(info.documentation));
    }
    contents.push(MarkedString::String(format!("*{}*", info.scope)));
    if let Some(freed) = info.freed_at {
        contents.push(MarkedString::String(format!(
            "Freed on line {} of `{}`",
            freed.line + 1,
            freed.file.display()
        )));
    }

    Hover {
        contents: HoverContents::Array(contents),
        range: Some(span_to_range(&info.span, line)),
    }
}

pub async fn handle_hover(backend: &Backend, params: HoverParams) -> Result<Option<Hover>> {
    let _timer = backend.profiler.time(Stage::Hover);

    let uri = params.text_document_position_params.text_document.uri;
    let Some((analysis, content)) = backend.analysis_for(&uri).await else {
        return Err(tower_lsp::jsonrpc::Error::invalid_request());
    };

    let position = to_position(&content, params.text_document_position_params.position);
    let Some(info) = queries::hover(&analysis, position) else {
        return Ok(None);
    };
    let line = analysis.line(position.line).unwrap_or_default();
    Ok(Some(to_hover(info, line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfalsp::{Location, Span, SymbolScope};

    #[test]
    fn hover_lists_usage_docs_and_scope() {
        let info = HoverInfo {
            usage: "add <address> <value>".to_string(),
            documentation: "Adds a value to a cell.".to_string(),
            scope: SymbolScope::Compiler,
            freed_at: None,
            span: Span::new(0, 0, 3),
        };
        let hover = to_hover(info, "add $x 1");
        let HoverContents::Array(contents) = hover.contents else {
            panic!("expected array contents");
        };
        assert_eq!(contents.len(), 3);
        assert!(matches!(
            &contents[0],
            MarkedString::LanguageString(LanguageString { language, value })
                if language == "bfa" && value == "add <address> <value>"
        ));
        assert_eq!(contents[2], MarkedString::String("*built-in*".to_string()));
        assert_eq!(hover.range.map(|range| range.end.character), Some(3));
    }

    #[test]
    fn freed_variables_mention_the_free() {
        let info = HoverInfo {
            usage: "$x".to_string(),
            documentation: String::new(),
            scope: SymbolScope::InFile,
            freed_at: Some(Location::new("/project/main.bfa", 4)),
            span: Span::new(6, 4, 6),
        };
        let HoverContents::Array(contents) = to_hover(info, "out $x").contents else {
            panic!("expected array contents");
        };
        assert_eq!(contents.len(), 3);
        assert_eq!(
            contents[2],
            MarkedString::String("Freed on line 5 of `/project/main.bfa`".to_string())
        );
    }
}
