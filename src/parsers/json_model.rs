//! JSON structural model adapter
//!
//! Reads models that an out-of-process front end has already produced and
//! serialized. The document carries the node arena verbatim:
//!
//! ```json
//! { "lineCount": 12, "root": 0, "nodes": [ { "id": 0, "kind": "Module", ... } ] }
//! ```

use super::Adapter;
use crate::errors::ParseError;
use crate::ir::{Node, NodeId, StructuralModel};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// On-disk form of one file's structural model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u32>,
    pub root: NodeId,
    pub nodes: Vec<Node>,
}

impl ModelDocument {
    /// Serialize an existing model back into document form
    pub fn from_model(model: &StructuralModel) -> Self {
        Self {
            line_count: model.line_count(),
            root: model.root(),
            nodes: model.nodes().cloned().collect(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonModelAdapter;

impl JsonModelAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for JsonModelAdapter {
    fn name(&self) -> &'static str {
        "json-model"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json", "ir.json"]
    }

    fn parse(&self, contents: &str, path: &Path) -> Result<StructuralModel, ParseError> {
        let doc: ModelDocument =
            serde_json::from_str(contents).map_err(|e| ParseError::Failed {
                adapter: self.name().to_string(),
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(StructuralModel::new(
            path,
            doc.root,
            doc.nodes,
            doc.line_count,
        )?)
    }

    fn looks_like_code(&self, comment: &str) -> bool {
        comment_looks_like_code(comment)
    }
}

fn code_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // statement terminators and braces
            r"[;{}]\s*$",
            // keyword-led statements followed by syntax, not prose
            r"^(if|for|while|return|def|fn|function|class|import|from|const|let|var|elif|else)\b.*[(:=;{]",
            // assignment / compound assignment
            r"^[A-Za-z_][\w.\[\]]*\s*(=|\+=|-=|\*=|/=)\s*[^=\s]",
            // bare call
            r"^[A-Za-z_][\w.]*\(.*\)$",
            r"(->|=>|&&|\|\|)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Language-neutral heuristic shared by adapters that have no grammar to ask
pub fn comment_looks_like_code(comment: &str) -> bool {
    let patterns = code_patterns();
    comment.lines().any(|line| {
        let line = line
            .trim()
            .trim_start_matches("//")
            .trim_start_matches('#')
            .trim_start_matches("/*")
            .trim_start_matches('*')
            .trim_end_matches("*/")
            .trim();
        !line.is_empty() && patterns.iter().any(|re| re.is_match(line))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ModelError;
    use crate::ir::{ModelBuilder, NodeKind, StatementKind};

    #[test]
    fn test_parse_document() {
        let json = r#"{
            "lineCount": 3,
            "root": 0,
            "nodes": [
                {"id": 0, "kind": "Module", "name": "m",
                 "span": {"startLine": 1, "startCol": 1, "endLine": 3, "endCol": 1},
                 "children": [1]},
                {"id": 1, "kind": "Function", "name": "run",
                 "span": {"startLine": 1, "startCol": 1, "endLine": 3, "endCol": 1}}
            ]
        }"#;
        let model = JsonModelAdapter.parse(json, Path::new("m.json")).unwrap();
        assert_eq!(model.len(), 2);
        assert_eq!(
            model.nodes_of_kind(NodeKind::Function).next().unwrap().name_str(),
            "run"
        );
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = JsonModelAdapter
            .parse("{ not json", Path::new("bad.json"))
            .unwrap_err();
        assert!(matches!(err, ParseError::Failed { .. }));
    }

    #[test]
    fn test_invalid_tree_is_model_error() {
        let json = r#"{"root": 0, "nodes": [
            {"id": 0, "kind": "Class", "span": {"startLine": 1, "startCol": 1, "endLine": 1, "endCol": 1}}
        ]}"#;
        let err = JsonModelAdapter
            .parse(json, Path::new("bad.json"))
            .unwrap_err();
        assert_eq!(err, ParseError::Model(ModelError::RootNotModule(NodeId(0))));
    }

    #[test]
    fn test_document_round_trip_preserves_model() {
        let mut b = ModelBuilder::new("rt.json");
        let m = b.module("rt");
        let f = b.function(m, "go");
        let body = b.block(f);
        b.statement(body, StatementKind::Return);
        let model = b.build().unwrap();

        let text = serde_json::to_string(&ModelDocument::from_model(&model)).unwrap();
        let back = JsonModelAdapter.parse(&text, Path::new("rt.json")).unwrap();
        assert_eq!(back.len(), model.len());
    }

    #[test]
    fn test_looks_like_code() {
        assert!(comment_looks_like_code("// total = compute(items);"));
        assert!(comment_looks_like_code("# if user.active:"));
        assert!(comment_looks_like_code("refresh()"));
        assert!(!comment_looks_like_code("// Computes the weekly total"));
        assert!(!comment_looks_like_code("# if the cache is cold we fall back"));
        assert!(!comment_looks_like_code(""));
    }
}
