//! Diagnostics Aggregator & Suppression
//!
//! The single merge step at the end of a run. It only starts once every
//! producer is done, and its sort is what makes the output independent of
//! worker completion order:
//!
//! 1. drop violations covered by a matching suppression marker
//! 2. sort by file, start line, start column, rule id (then the rest of the
//!    range and the message, so equal keys still order deterministically)
//! 3. drop exact `(rule id, range)` repeats
//!
//! `UnknownSuppression` diagnostics are never suppressed, otherwise a `*`
//! marker could hide its own typo.

mod suppression;

pub use suppression::{collect_suppressions, parse_marker, SuppressedRules, Suppression};

use crate::models::{Diagnostic, Violation, UNKNOWN_SUPPRESSION};
use std::cmp::Ordering;
use tracing::debug;

/// Collects violations and markers from every stage
#[derive(Debug, Default)]
pub struct Aggregator {
    violations: Vec<Violation>,
    suppressions: Vec<Suppression>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_violations(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }

    pub fn add_suppressions(&mut self, suppressions: impl IntoIterator<Item = Suppression>) {
        self.suppressions.extend(suppressions);
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn is_suppressed(&self, violation: &Violation) -> bool {
        violation.rule_id != UNKNOWN_SUPPRESSION
            && self
                .suppressions
                .iter()
                .any(|s| s.suppresses(&violation.rule_id, &violation.range))
    }

    /// Filter, order and deduplicate into the final diagnostics
    pub fn finish(self) -> Vec<Diagnostic> {
        let total = self.violations.len();
        let mut kept: Vec<Violation> = self
            .violations
            .iter()
            .filter(|v| !self.is_suppressed(v))
            .cloned()
            .collect();
        let suppressed = total - kept.len();

        kept.sort_by(compare);
        kept.dedup_by(|later, earlier| {
            later.rule_id == earlier.rule_id && later.range == earlier.range
        });

        debug!(
            "Aggregated {} violations: {} suppressed, {} diagnostics",
            total,
            suppressed,
            kept.len()
        );
        kept.into_iter().map(Diagnostic::from).collect()
    }
}

/// Total order over violations
fn compare(a: &Violation, b: &Violation) -> Ordering {
    let span = |v: &Violation| (v.range.span.end_line, v.range.span.end_col);
    a.range
        .sort_key()
        .cmp(&b.range.sort_key())
        .then_with(|| a.rule_id.cmp(&b.rule_id))
        .then_with(|| span(a).cmp(&span(b)))
        .then_with(|| b.severity.cmp(&a.severity))
        .then_with(|| a.message.cmp(&b.message))
        .then_with(|| a.related.cmp(&b.related))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Span;
    use crate::models::{Severity, SourceRange};

    fn violation(rule: &str, file: &str, line: u32, col: u32) -> Violation {
        Violation::new(
            rule,
            Severity::Medium,
            SourceRange::new(file, Span::new(line, col, line, col + 4)),
            format!("{rule} at {line}:{col}"),
        )
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let mut aggregator = Aggregator::new();
        aggregator.add_violations(vec![
            violation("ShortName", "b.py", 1, 1),
            violation("TooManyArguments", "a.py", 9, 1),
            violation("LongFunction", "a.py", 9, 1),
            violation("ShortName", "a.py", 2, 5),
            violation("ShortName", "a.py", 2, 5),
        ]);
        let diagnostics = aggregator.finish();
        let order: Vec<(String, u32, String)> = diagnostics
            .iter()
            .map(|d| (d.file.display().to_string(), d.start_line, d.rule_id.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a.py".to_string(), 2, "ShortName".to_string()),
                ("a.py".to_string(), 9, "LongFunction".to_string()),
                ("a.py".to_string(), 9, "TooManyArguments".to_string()),
                ("b.py".to_string(), 1, "ShortName".to_string()),
            ]
        );
    }

    #[test]
    fn test_suppression_is_exact_and_scoped() {
        let scope = SourceRange::new("a.py", Span::new(5, 1, 20, 1));
        let mut aggregator = Aggregator::new();
        aggregator.add_suppressions(vec![Suppression {
            scope: scope.clone(),
            rules: SuppressedRules::Only(vec!["MagicLiteral"]),
            marker: SourceRange::new("a.py", Span::new(4, 1, 4, 30)),
        }]);
        aggregator.add_violations(vec![
            violation("MagicLiteral", "a.py", 10, 3),
            violation("MagicLiteral", "a.py", 30, 3),
            violation("ShortName", "a.py", 10, 3),
        ]);
        let diagnostics = aggregator.finish();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .all(|d| !(d.rule_id == "MagicLiteral" && scope.covers(&d.range()))));
    }

    #[test]
    fn test_wildcard_never_hides_unknown_suppression() {
        let mut aggregator = Aggregator::new();
        aggregator.add_suppressions(vec![Suppression {
            scope: SourceRange::new("a.py", Span::new(1, 1, 50, 1)),
            rules: SuppressedRules::All,
            marker: SourceRange::new("a.py", Span::new(1, 1, 1, 20)),
        }]);
        aggregator.add_violations(vec![
            violation(UNKNOWN_SUPPRESSION, "a.py", 1, 1),
            violation("DeepNesting", "a.py", 3, 1),
        ]);
        let diagnostics = aggregator.finish();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, UNKNOWN_SUPPRESSION);
    }
}
