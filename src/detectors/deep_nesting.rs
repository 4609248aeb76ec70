//! Deep nesting detector
//!
//! Flags functions whose control statements (if / while / for / select)
//! nest deeper than `maxNestingDepth`.

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{Node, NodeKind};
use crate::metrics::Metric;
use crate::models::{Category, Severity, Violation};

pub struct DeepNestingRule;

impl DeepNestingRule {
    pub const MAX_DEPTH: ThresholdSpec = ThresholdSpec::count("maxNestingDepth", 3.0);
}

impl Rule for DeepNestingRule {
    fn id(&self) -> &'static str {
        "DeepNesting"
    }

    fn description(&self) -> &'static str {
        "Detects deeply nested control flow"
    }

    fn category(&self) -> Category {
        Category::Functions
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Function]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MAX_DEPTH]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let depth = ctx.metrics.get(node.id, Metric::NestingDepth).unwrap_or(0.0);
        let max = ctx.threshold(&Self::MAX_DEPTH);
        if depth <= max {
            return vec![];
        }
        vec![ctx.violation(
            self.id(),
            Severity::scaled(depth, max),
            node,
            format!(
                "Function `{}` nests control flow {} levels deep (max {}); use guard clauses or extract the inner blocks",
                node.name_str(),
                depth,
                max
            ),
        )]
    }
}
