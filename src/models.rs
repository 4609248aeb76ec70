//! Core data models for craftcheck
//!
//! These models are shared by every analysis stage: rules produce
//! [`Violation`]s, the aggregator filters and orders them, and the
//! survivors are handed back to the caller as [`Diagnostic`]s.

use crate::ir::{NodeId, Span};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Rule id emitted when an adapter fails or times out on a file
pub const PARSE_ERROR: &str = "ParseError";
/// Rule id emitted when an adapter produced a structurally invalid model
pub const MODEL_INVARIANT: &str = "ModelInvariant";
/// Rule id emitted when a rule panics while evaluating a node
pub const INTERNAL_RULE_ERROR: &str = "InternalRuleError";
/// Rule id emitted when a suppression marker names a rule nobody knows
pub const UNKNOWN_SUPPRESSION: &str = "UnknownSuppression";

/// Severity levels for violations
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Scale severity by how far `actual` overshoots `threshold`.
    ///
    /// More than twice the threshold is high, more than one and a half
    /// times is medium, anything else past the threshold is low.
    pub fn scaled(actual: f64, threshold: f64) -> Self {
        if threshold <= 0.0 {
            return Severity::High;
        }
        let ratio = actual / threshold;
        if ratio > 2.0 {
            Severity::High
        } else if ratio > 1.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Rule families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Comments,
    Functions,
    Naming,
    Structure,
    Duplication,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Comments => "comments",
            Category::Functions => "functions",
            Category::Naming => "naming",
            Category::Structure => "structure",
            Category::Duplication => "duplication",
        };
        f.write_str(name)
    }
}

/// A span inside a specific file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRange {
    pub file: PathBuf,
    #[serde(flatten)]
    pub span: Span,
}

impl SourceRange {
    pub fn new(file: impl Into<PathBuf>, span: Span) -> Self {
        Self {
            file: file.into(),
            span,
        }
    }

    /// Whether `other` lies in the same file and entirely inside this range
    pub fn covers(&self, other: &SourceRange) -> bool {
        self.file == other.file && self.span.contains(&other.span)
    }

    /// Deterministic ordering key: file, then start position
    pub fn sort_key(&self) -> (&Path, u32, u32) {
        (&self.file, self.span.start_line, self.span.start_col)
    }
}

/// A rule hit, before suppression and deduplication
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub range: SourceRange,
    pub related: Vec<SourceRange>,
    /// Node the violation is anchored to, when it came from a node rule
    pub node: Option<NodeId>,
}

impl Violation {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        range: SourceRange,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            range,
            related: Vec::new(),
            node: None,
        }
    }

    pub fn with_related(mut self, related: Vec<SourceRange>) -> Self {
        self.related = related;
        self
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }
}

/// A violation that survived suppression and merging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub file: PathBuf,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    #[serde(default)]
    pub related_ranges: Vec<SourceRange>,
}

impl Diagnostic {
    /// Primary range of the diagnostic
    pub fn range(&self) -> SourceRange {
        SourceRange::new(
            self.file.clone(),
            Span::new(self.start_line, self.start_col, self.end_line, self.end_col),
        )
    }
}

impl From<Violation> for Diagnostic {
    fn from(v: Violation) -> Self {
        let span = v.range.span;
        Self {
            rule_id: v.rule_id,
            severity: v.severity,
            message: v.message,
            file: v.range.file,
            start_line: span.start_line,
            start_col: span.start_col,
            end_line: span.end_line,
            end_col: span.end_col,
            related_ranges: v.related,
        }
    }
}

/// Summary of diagnostics by severity and rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub total: usize,
    pub by_rule: BTreeMap<String, usize>,
}

impl DiagnosticsSummary {
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        let mut summary = Self::default();
        for d in diagnostics {
            match d.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
            *summary.by_rule.entry(d.rule_id.clone()).or_insert(0) += 1;
            summary.total += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_scaling() {
        assert_eq!(Severity::scaled(4.0, 3.0), Severity::Low);
        assert_eq!(Severity::scaled(5.0, 3.0), Severity::Medium);
        assert_eq!(Severity::scaled(7.0, 3.0), Severity::High);
        assert_eq!(Severity::scaled(1.0, 0.0), Severity::High);
    }

    #[test]
    fn test_diagnostic_serializes_camel_case() {
        let v = Violation::new(
            "MagicLiteral",
            Severity::Low,
            SourceRange::new("a.py", Span::new(3, 5, 3, 10)),
            "magic",
        );
        let json = serde_json::to_value(Diagnostic::from(v)).unwrap();
        assert_eq!(json["ruleId"], "MagicLiteral");
        assert_eq!(json["startLine"], 3);
        assert_eq!(json["endCol"], 10);
        assert_eq!(json["severity"], "low");
    }

    #[test]
    fn test_summary_counts() {
        let mk = |rule: &str, severity| {
            Diagnostic::from(Violation::new(
                rule,
                severity,
                SourceRange::new("a.py", Span::new(1, 1, 1, 2)),
                "m",
            ))
        };
        let summary = DiagnosticsSummary::from_diagnostics(&[
            mk("A", Severity::High),
            mk("A", Severity::Low),
            mk("B", Severity::Low),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.low, 2);
        assert_eq!(summary.by_rule["A"], 2);
    }

    #[test]
    fn test_range_covers() {
        let outer = SourceRange::new("a.py", Span::new(1, 1, 10, 1));
        let inner = SourceRange::new("a.py", Span::new(2, 1, 3, 4));
        let other_file = SourceRange::new("b.py", Span::new(2, 1, 3, 4));
        assert!(outer.covers(&inner));
        assert!(!inner.covers(&outer));
        assert!(!outer.covers(&other_file));
    }
}
