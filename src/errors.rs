//! Error taxonomy
//!
//! Only [`ConfigError`] is fatal for a run. Parse and model errors are
//! scoped to one file and end up as diagnostics; rule panics never surface
//! as errors at all.

use crate::ir::NodeId;
use std::path::PathBuf;
use thiserror::Error;

/// Bad configuration. Fails the whole run before any file is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config document: {0}")]
    Parse(String),

    #[error("unknown rule id `{0}`")]
    UnknownRule(String),

    #[error("rule `{rule}` has no threshold named `{key}`")]
    UnknownThreshold { rule: String, key: String },

    #[error("threshold `{rule}.{key}` is invalid: {reason}")]
    InvalidThreshold {
        rule: String,
        key: String,
        reason: String,
    },

    #[error("global setting `{key}` is invalid: {reason}")]
    InvalidGlobal { key: String, reason: String },

    #[error("conflicting settings at `{key}`: {reason}")]
    Conflict { key: String, reason: String },
}

impl ConfigError {
    /// The configuration key responsible for the failure, if there is one
    pub fn key(&self) -> Option<String> {
        match self {
            ConfigError::Io { .. } | ConfigError::Parse(_) => None,
            ConfigError::UnknownRule(rule) => Some(format!("rules.{rule}")),
            ConfigError::UnknownThreshold { rule, key }
            | ConfigError::InvalidThreshold { rule, key, .. } => {
                Some(format!("rules.{rule}.thresholds.{key}"))
            }
            ConfigError::InvalidGlobal { key, .. } | ConfigError::Conflict { key, .. } => {
                Some(key.clone())
            }
        }
    }
}

/// Adapter failure for a single file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no adapter registered for {path}")]
    NoAdapter { path: PathBuf },

    #[error("adapter `{adapter}` failed on {path}: {message}")]
    Failed {
        adapter: String,
        path: PathBuf,
        message: String,
    },

    #[error("adapter timed out on {path} after {timeout_ms}ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },

    #[error("adapter worker for {path} exited without a result")]
    Disconnected { path: PathBuf },

    #[error("{0}")]
    Model(#[from] ModelError),
}

/// Structural model rejected at ingestion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("model contains no nodes")]
    Empty,

    #[error("root node {0} is missing")]
    MissingRoot(NodeId),

    #[error("root node {0} is not a Module")]
    RootNotModule(NodeId),

    #[error("root node {0} is listed as a child")]
    RootHasParent(NodeId),

    #[error("duplicate node id {0}")]
    DuplicateId(NodeId),

    #[error("node {parent} references missing node {missing}")]
    DanglingReference { parent: NodeId, missing: NodeId },

    #[error("node {node} is a child of both {first} and {second}")]
    MultipleParents {
        node: NodeId,
        first: NodeId,
        second: NodeId,
    },

    #[error("node {0} is not reachable from the root")]
    Orphan(NodeId),

    #[error("node {0} has a span that ends before it starts")]
    InvertedSpan(NodeId),

    #[error("node {node} ends on line {line}, past the end of the file ({line_count} lines)")]
    OutOfBounds {
        node: NodeId,
        line: u32,
        line_count: u32,
    },

    #[error("node {child} lies outside its parent {parent}")]
    ChildOutsideParent { parent: NodeId, child: NodeId },

    #[error("siblings {first} and {second} overlap or are out of source order")]
    SiblingOrder { first: NodeId, second: NodeId },

    #[error("node {owner} attaches {comment}, which is not a Comment")]
    NotAComment { owner: NodeId, comment: NodeId },

    #[error("comment {comment} is attached to both {first} and {second}")]
    CommentAttachedTwice {
        comment: NodeId,
        first: NodeId,
        second: NodeId,
    },
}

/// Run-level failures
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_key() {
        let err = ConfigError::InvalidThreshold {
            rule: "TooManyArguments".to_string(),
            key: "maxParams".to_string(),
            reason: "must not be negative".to_string(),
        };
        assert_eq!(
            err.key().as_deref(),
            Some("rules.TooManyArguments.thresholds.maxParams")
        );
        assert_eq!(
            ConfigError::UnknownRule("Nope".into()).key().as_deref(),
            Some("rules.Nope")
        );
        assert!(ConfigError::Parse("bad".into()).key().is_none());
    }

    #[test]
    fn test_model_error_wraps_into_parse_error() {
        let err: ParseError = ModelError::Empty.into();
        assert_eq!(err.to_string(), "model contains no nodes");
    }
}
