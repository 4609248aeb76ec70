//! Command-query separation
//!
//! A function should either change state or answer a question. This rule
//! flags functions that write a field of the current object (or of an
//! argument) and also return a value read from somewhere other than a
//! literal or the receiver itself. Constructors are exempt.

use super::base::{Rule, RuleContext};
use super::is_constructor;
use crate::ir::{Node, NodeKind, StatementKind};
use crate::models::{Category, Severity, Violation};
use crate::symbols::{is_self_name, SymbolKind};

pub struct QueryAndMutateRule;

impl QueryAndMutateRule {
    fn mutates(&self, node: &Node, ctx: &RuleContext<'_>) -> bool {
        let own = ctx
            .symbols
            .field_accesses_in(node.id)
            .any(|a| a.is_write && !a.is_call);
        let argument = ctx.symbols.foreign_accesses_in(node.id).any(|a| {
            a.is_write
                && a.depth == 1
                && a.root
                    .and_then(|r| ctx.symbols.symbol(r))
                    .is_some_and(|s| s.kind == SymbolKind::Parameter)
        });
        own || argument
    }

    /// First `return <expr>` whose value reads state
    fn answering_return<'a>(&self, node: &Node, ctx: &RuleContext<'a>) -> Option<&'a Node> {
        ctx.model
            .within_function(node.id)
            .into_iter()
            .filter(|n| n.is_statement(StatementKind::Return))
            .find(|ret| {
                let Some(value) = ctx.model.child(ret.id, 0) else {
                    return false;
                };
                let returns_receiver = value.kind == NodeKind::Identifier && is_self_name(value.name_str());
                value.kind != NodeKind::Literal && !returns_receiver
            })
    }
}

impl Rule for QueryAndMutateRule {
    fn id(&self) -> &'static str {
        "QueryAndMutate"
    }

    fn description(&self) -> &'static str {
        "Detects functions that both change state and return a value"
    }

    fn category(&self) -> Category {
        Category::Functions
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Function]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        if is_constructor(ctx.model, node) || !self.mutates(node, ctx) {
            return vec![];
        }
        let Some(ret) = self.answering_return(node, ctx) else {
            return vec![];
        };
        vec![ctx
            .violation(
                self.id(),
                Severity::Medium,
                node,
                format!(
                    "`{}` both changes state and returns a value; separate the command from the query",
                    node.name_str()
                ),
            )
            .with_related(vec![ctx.range(ret)])]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run_rule;
    use crate::ir::ModelBuilder;
    use std::sync::Arc;

    /// class Stack: def pop(self): self.size = ...; return <value>
    fn stack(return_literal: bool, method: &str) -> crate::ir::StructuralModel {
        let mut b = ModelBuilder::new("stack.py");
        let m = b.module("stack");
        let class = b.class(m, "Stack");
        let f = b.function(class, method);
        let body = b.block(f);
        let assign = b.statement(body, StatementKind::Assign);
        let target = b.member(assign, "size");
        b.ident(target, "self");
        b.int(assign, 0);
        let ret = b.statement(body, StatementKind::Return);
        if return_literal {
            b.boolean(ret, true);
        } else {
            let top = b.member(ret, "top");
            b.ident(top, "self");
        }
        b.build().unwrap()
    }

    #[test]
    fn test_mutating_query_flagged() {
        let found = run_rule(Arc::new(QueryAndMutateRule), &stack(false, "pop"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].related.len(), 1);
    }

    #[test]
    fn test_status_literal_and_constructor_are_clean() {
        assert!(run_rule(Arc::new(QueryAndMutateRule), &stack(true, "pop")).is_empty());
        assert!(run_rule(Arc::new(QueryAndMutateRule), &stack(false, "__init__")).is_empty());
    }
}
