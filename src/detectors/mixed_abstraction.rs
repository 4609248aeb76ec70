//! Mixed levels of abstraction
//!
//! A function that delegates to its own helpers should stay at that level.
//! When it also does low-level work directly (literals, arithmetic,
//! indexing, library calls) the reader has to switch gears mid-function.

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{Node, NodeKind};
use crate::metrics::Metric;
use crate::models::{Category, Severity, Violation};
use crate::symbols::Callee;

pub struct MixedAbstractionRule;

impl MixedAbstractionRule {
    pub const MAX_DISTANCE: ThresholdSpec = ThresholdSpec::count("maxAbstractionDistance", 1.0);
}

impl Rule for MixedAbstractionRule {
    fn id(&self) -> &'static str {
        "MixedAbstraction"
    }

    fn description(&self) -> &'static str {
        "Detects functions mixing high-level calls with low-level operations"
    }

    fn category(&self) -> Category {
        Category::Functions
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Function]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MAX_DISTANCE]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let helpers = ctx
            .symbols
            .calls_from(node.id)
            .filter(|c| matches!(c.callee, Callee::Resolved(target) if target != node.id))
            .count();
        if helpers == 0 {
            return vec![];
        }
        let distance = ctx
            .metrics
            .get(node.id, Metric::AbstractionDistance)
            .unwrap_or(0.0);
        let max = ctx.threshold(&Self::MAX_DISTANCE);
        if distance <= max {
            return vec![];
        }
        vec![ctx.violation(
            self.id(),
            self.severity(),
            node,
            format!(
                "`{}` calls {} of its own helpers but also uses {} kinds of low-level operations directly; keep one level of abstraction per function",
                node.name_str(),
                helpers,
                distance
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run_rule;
    use crate::ir::{ModelBuilder, StatementKind};
    use std::sync::Arc;

    #[test]
    fn test_helpers_plus_arithmetic_and_library_calls() {
        let mut b = ModelBuilder::new("report.py");
        let m = b.module("report");
        let load = b.function(m, "load_rows");
        b.block(load);
        let f = b.function(m, "build_report");
        let body = b.block(f);
        let stmt = b.statement(body, StatementKind::Expression);
        b.call(stmt, "load_rows");
        let stmt = b.statement(body, StatementKind::Expression);
        let print = b.call(stmt, "print");
        let sum = b.binary(print, "*");
        b.ident(sum, "rate");
        b.int(sum, 7);
        let model = b.build().unwrap();

        let found = run_rule(Arc::new(MixedAbstractionRule), &model);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("build_report"));
    }

    #[test]
    fn test_pure_orchestration_is_clean() {
        let mut b = ModelBuilder::new("report.py");
        let m = b.module("report");
        for helper in ["load_rows", "render"] {
            let h = b.function(m, helper);
            b.block(h);
        }
        let f = b.function(m, "build_report");
        let body = b.block(f);
        for helper in ["load_rows", "render"] {
            let stmt = b.statement(body, StatementKind::Expression);
            b.call(stmt, helper);
        }
        let model = b.build().unwrap();
        assert!(run_rule(Arc::new(MixedAbstractionRule), &model).is_empty());
    }
}
