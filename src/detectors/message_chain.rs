//! Transitive navigation detector (Law of Demeter)
//!
//! Flags expressions like `order.getCustomer().getAddress().getCity()`
//! that walk through one collaborator to reach another. Chain depth is
//! recorded by the resolver, so this rule only looks at the outermost link
//! of each chain.

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{ExprKind, Node, NodeKind};
use crate::models::{Category, Severity, Violation};

pub struct TransitiveNavigationRule;

impl TransitiveNavigationRule {
    pub const MIN_CHAIN: ThresholdSpec = ThresholdSpec::count("minChainLength", 2.0);
}

impl Rule for TransitiveNavigationRule {
    fn id(&self) -> &'static str {
        "TransitiveNavigation"
    }

    fn description(&self) -> &'static str {
        "Detects accessor chains that navigate through collaborators"
    }

    fn category(&self) -> Category {
        Category::Structure
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Expression]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MIN_CHAIN]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        if !node.is_expression(ExprKind::Member) {
            return vec![];
        }
        let Some(access) = ctx.symbols.foreign_access_at(node.id) else {
            return vec![];
        };
        if !access.chain_end || access.root.is_none() {
            return vec![];
        }
        let min = ctx.threshold(&Self::MIN_CHAIN);
        if (access.depth as f64) < min {
            return vec![];
        }

        // Report the whole call when the last link is invoked
        let anchor = ctx
            .model
            .parent(node.id)
            .filter(|p| p.is_expression(ExprKind::Call) && p.children.first() == Some(&node.id))
            .unwrap_or(node);

        let root = access.root_name.as_deref().unwrap_or("?");
        vec![ctx.violation(
            self.id(),
            Severity::scaled(access.depth as f64, min.max(1.0)),
            anchor,
            format!(
                "`{}` is reached through {} links from `{}`; ask `{}` for what you need instead",
                access.member, access.depth, root, root
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
    fn test_reports_outermost_link_once() {
        let mut b = ModelBuilder::new("ship.java");
        let m = b.module("ship");
        let f = b.function(m, "label");
        b.parameter(f, "order", Some("Order"));
        let body = b.block(f);
        let ret = b.statement(body, StatementKind::Return);
        let (outer, city) = b.chained_call(ret, "getCity");
        let (_, address) = b.chained_call(city, "getAddress");
        b.method_call(address, "order", "getCustomer");
        let model = b.build().unwrap();

        let found = run_rule(Arc::new(TransitiveNavigationRule), &model);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node, Some(outer));
        assert!(found[0].message.contains("getCity"));
        assert!(found[0].message.contains("3 links"));
    }

    #[test]
    fn test_single_hop_is_fine() {
        let mut b = ModelBuilder::new("ok.java");
        let m = b.module("ok");
        let f = b.function(m, "label");
        b.parameter(f, "order", Some("Order"));
        let body = b.block(f);
        let ret = b.statement(body, StatementKind::Return);
        b.method_call(ret, "order", "getCustomer");
        let model = b.build().unwrap();
        assert!(run_rule(Arc::new(TransitiveNavigationRule), &model).is_empty());
    }
}
