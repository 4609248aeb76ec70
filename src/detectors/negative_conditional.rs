//! Negative conditional detector
//!
//! `if !valid { a } else { b }` reads better as `if valid { b } else { a }`.
//! Only negations that have an else branch to swap with are reported.

use super::base::{Rule, RuleContext};
use crate::ir::{ExprKind, Node, NodeKind, StatementKind};
use crate::models::{Category, Severity, Violation};

const NEGATIONS: &[&str] = &["!", "not"];

pub struct NegativeConditionalRule;

impl Rule for NegativeConditionalRule {
    fn id(&self) -> &'static str {
        "NegativeConditional"
    }

    fn description(&self) -> &'static str {
        "Detects negated conditions that have an else branch"
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

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        if !node.is_statement(StatementKind::If) || node.children.len() < 3 {
            return vec![];
        }
        let Some(condition) = ctx.model.child(node.id, 0) else {
            return vec![];
        };
        let negated = condition.is_expression(ExprKind::Unary)
            && condition
                .operator
                .as_deref()
                .is_some_and(|op| NEGATIONS.contains(&op));
        if !negated {
            return vec![];
        }
        vec![ctx.violation(
            self.id(),
            self.severity(),
            condition,
            "Negated condition with an else branch; swap the branches and test the positive case",
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run_rule;
    use crate::ir::ModelBuilder;
    use std::sync::Arc;

    #[test]
    fn test_negation_with_else() {
        let mut b = ModelBuilder::new("neg.js");
        let m = b.module("neg");
        let f = b.function(m, "show");
        b.parameter(f, "user", None);
        let body = b.block(f);

        let with_else = b.statement(body, StatementKind::If);
        let not = b.unary(with_else, "!");
        b.ident(not, "user");
        b.block(with_else);
        b.block(with_else);

        let guard = b.statement(body, StatementKind::If);
        let not_guard = b.unary(guard, "!");
        b.ident(not_guard, "user");
        let then = b.block(guard);
        b.statement(then, StatementKind::Return);
        let model = b.build().unwrap();

        let found = run_rule(Arc::new(NegativeConditionalRule), &model);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node, Some(not));
    }
}
