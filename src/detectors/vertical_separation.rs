//! Vertical separation detector
//!
//! Local variables should be declared just above their first use. Distance
//! is counted in statements of the declaring block, so a use nested deep
//! inside the fifth statement is five statements away.

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{Node, NodeId, NodeKind, StatementKind, StructuralModel};
use crate::models::{Category, Severity, Violation};

pub struct VerticalSeparationRule;

impl VerticalSeparationRule {
    pub const MAX_DISTANCE: ThresholdSpec = ThresholdSpec::count("maxStatementDistance", 5.0);
}

/// Child of `block` that contains `node`
fn statement_in_block(model: &StructuralModel, node: NodeId, block: NodeId) -> Option<NodeId> {
    let mut current = node;
    loop {
        let parent = model.parent(current)?;
        if parent.id == block {
            return Some(current);
        }
        current = parent.id;
    }
}

impl Rule for VerticalSeparationRule {
    fn id(&self) -> &'static str {
        "VerticalSeparation"
    }

    fn description(&self) -> &'static str {
        "Detects local variables declared far from their first use"
    }

    fn category(&self) -> Category {
        Category::Structure
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Statement]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MAX_DISTANCE]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        if !node.is_statement(StatementKind::VarDecl)
            || ctx.symbols.enclosing_function(node.id).is_none()
        {
            return vec![];
        }
        let Some(block) = ctx
            .model
            .parent(node.id)
            .filter(|p| p.is_statement(StatementKind::Block))
        else {
            return vec![];
        };
        let Some(symbol) = ctx.symbols.declared_by(node.id) else {
            return vec![];
        };
        // Only the first declaration measures; redeclarations are writes
        if symbol.declaration != node.id {
            return vec![];
        }

        let Some(first_use) = symbol
            .references
            .iter()
            .filter_map(|r| ctx.model.node(r.node))
            .find(|n| !n.is_declaration())
        else {
            return vec![];
        };
        let Some(decl_index) = ctx.model.child_index(node.id) else {
            return vec![];
        };
        let Some(use_index) = statement_in_block(ctx.model, first_use.id, block.id)
            .and_then(|s| ctx.model.child_index(s))
        else {
            return vec![];
        };

        let distance = use_index.saturating_sub(decl_index);
        let max = ctx.threshold(&Self::MAX_DISTANCE) as usize;
        if distance <= max {
            return vec![];
        }

        vec![ctx
            .violation(
                self.id(),
                self.severity(),
                node,
                format!(
                    "`{}` is declared {} statements before its first use; move the declaration down",
                    symbol.name, distance
                ),
            )
            .with_related(vec![ctx.range(first_use)])]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run_rule;
    use crate::ir::ModelBuilder;
    use std::sync::Arc;

    fn model_with_gap(gap: usize) -> (StructuralModel, NodeId) {
        let mut b = ModelBuilder::new("v.py");
        let m = b.module("v");
        let f = b.function(m, "report");
        let body = b.block(f);
        let decl = b.var_decl(body, "total");
        b.int(decl, 0);
        for _ in 1..gap {
            let stmt = b.statement(body, StatementKind::Expression);
            b.call(stmt, "tick");
        }
        let ret = b.statement(body, StatementKind::Return);
        b.ident(ret, "total");
        (b.build().unwrap(), decl)
    }

    #[test]
    fn test_far_declaration_flagged() {
        let (model, decl) = model_with_gap(6);
        let found = run_rule(Arc::new(VerticalSeparationRule), &model);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node, Some(decl));
        assert_eq!(found[0].related.len(), 1);
    }

    #[test]
    fn test_distance_at_threshold_allowed() {
        let (model, _) = model_with_gap(5);
        assert!(run_rule(Arc::new(VerticalSeparationRule), &model).is_empty());
    }
}
