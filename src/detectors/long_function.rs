//! Long function detector
//!
//! Flags functions whose line count exceeds `maxFunctionLines`. Severity
//! scales with how far past the limit the function runs.

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{Node, NodeKind};
use crate::metrics::Metric;
use crate::models::{Category, Severity, Violation};

pub struct LongFunctionRule;

impl LongFunctionRule {
    pub const MAX_LINES: ThresholdSpec = ThresholdSpec::count("maxFunctionLines", 40.0);
}

impl Rule for LongFunctionRule {
    fn id(&self) -> &'static str {
        "LongFunction"
    }

    fn description(&self) -> &'static str {
        "Detects functions with too many lines"
    }

    fn category(&self) -> Category {
        Category::Functions
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Function]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MAX_LINES]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let Some(lines) = ctx.metrics.get(node.id, Metric::LineCount) else {
            return vec![];
        };
        let max = ctx.threshold(&Self::MAX_LINES);
        if lines <= max {
            return vec![];
        }
        vec![ctx.violation(
            self.id(),
            Severity::scaled(lines, max),
            node,
            format!(
                "Function `{}` is {} lines long (max {}); extract smaller functions",
                node.name_str(),
                lines,
                max
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::detectors::test_support::{run_rule, run_rule_with};
    use crate::ir::{ModelBuilder, StatementKind};
    use std::sync::Arc;

    fn function_with_statements(n: usize) -> crate::ir::StructuralModel {
        let mut b = ModelBuilder::new("long.py");
        let m = b.module("long");
        let f = b.function(m, "process");
        let body = b.block(f);
        for _ in 0..n {
            b.statement(body, StatementKind::Expression);
        }
        b.build().unwrap()
    }

    #[test]
    fn test_short_function_passes() {
        let model = function_with_statements(5);
        assert!(run_rule(Arc::new(LongFunctionRule), &model).is_empty());
    }

    #[test]
    fn test_long_function_flagged_with_scaled_severity() {
        // function line + body line + 100 statements
        let model = function_with_statements(100);
        let found = run_rule(Arc::new(LongFunctionRule), &model);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::High);
        assert!(found[0].message.contains("process"));

        let config = AnalysisConfig::default().with_threshold("LongFunction", "maxFunctionLines", 200.0);
        assert!(run_rule_with(Arc::new(LongFunctionRule), &model, config).is_empty());
    }
}
