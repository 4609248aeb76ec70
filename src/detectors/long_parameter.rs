//! Long parameter list detector
//!
//! Flags functions taking more than `maxParams` parameters. Related
//! parameters usually want to travel together as one object.

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{Node, NodeKind};
use crate::metrics::Metric;
use crate::models::{Category, Severity, Violation};

pub struct TooManyArgumentsRule;

impl TooManyArgumentsRule {
    pub const MAX_PARAMS: ThresholdSpec = ThresholdSpec::count("maxParams", 3.0);
}

impl Rule for TooManyArgumentsRule {
    fn id(&self) -> &'static str {
        "TooManyArguments"
    }

    fn description(&self) -> &'static str {
        "Detects functions with long parameter lists"
    }

    fn category(&self) -> Category {
        Category::Functions
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Function]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MAX_PARAMS]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let count = ctx.metrics.get(node.id, Metric::ParamCount).unwrap_or(0.0);
        let max = ctx.threshold(&Self::MAX_PARAMS);
        if count <= max {
            return vec![];
        }
        let names: Vec<&str> = ctx.model.parameters(node.id).map(|p| p.name_str()).collect();
        vec![ctx.violation(
            self.id(),
            Severity::scaled(count, max),
            node,
            format!(
                "Function `{}` takes {} parameters (max {}): {}; group related ones into an object",
                node.name_str(),
                count,
                max,
                names.join(", ")
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run_rule;
    use crate::ir::ModelBuilder;
    use std::sync::Arc;

    fn with_params(n: usize) -> (crate::ir::StructuralModel, crate::ir::NodeId) {
        let mut b = ModelBuilder::new("params.py");
        let m = b.module("params");
        let f = b.function(m, "configure");
        for i in 0..n {
            b.parameter(f, &format!("option{i}"), None);
        }
        b.block(f);
        (b.build().unwrap(), f)
    }

    #[test]
    fn test_at_limit_is_clean() {
        let (model, _) = with_params(3);
        assert!(run_rule(Arc::new(TooManyArgumentsRule), &model).is_empty());
    }

    #[test]
    fn test_over_limit_flags_declaration() {
        let (model, f) = with_params(4);
        let found = run_rule(Arc::new(TooManyArgumentsRule), &model);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node, Some(f));
        assert_eq!(found[0].range.span, model.node(f).unwrap().span);
        assert_eq!(found[0].severity, Severity::Low);
    }
}
