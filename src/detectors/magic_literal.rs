//! Magic literal detector
//!
//! Flags numbers (and strings used as comparison or case keys) that appear
//! in code without a name explaining them. Literals are fine when they:
//! - are part of a constant declaration or an UPPER_CASE variable
//! - initialize a variable or parameter default through a short expression
//!   (`seconds_per_day = 24 * 60 * 60`), which names them
//! - sit inside an enumeration
//! - are one of a handful of self-explanatory numbers

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{LiteralValue, Node, NodeKind, StatementKind, StructuralModel};
use crate::models::{Category, Severity, Violation};

/// Numbers that read the same as their name would
const ACCEPTABLE_INTS: &[i64] = &[-1, 0, 1, 2, 10, 100, 1000];
const ACCEPTABLE_FLOATS: &[f64] = &[0.0, 0.5, 1.0, 2.0, 100.0];

const EQUALITY_OPS: &[&str] = &["==", "!=", "===", "!==", "is", "is not"];

pub struct MagicLiteralRule;

impl MagicLiteralRule {
    pub const MAX_EXPLANATORY_NODES: ThresholdSpec =
        ThresholdSpec::count("maxExplanatoryExprNodes", 3.0);
}

fn is_upper_case(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Strings only matter where they act as keys of a decision
fn string_is_key(model: &StructuralModel, literal: &Node) -> bool {
    let Some(parent) = model.parent(literal.id) else {
        return false;
    };
    if parent.is_statement(StatementKind::Case) {
        return true;
    }
    parent
        .operator
        .as_deref()
        .is_some_and(|op| EQUALITY_OPS.contains(&op))
}

fn is_candidate(model: &StructuralModel, literal: &Node) -> bool {
    match &literal.literal {
        Some(LiteralValue::Int(i)) => !ACCEPTABLE_INTS.contains(i),
        Some(LiteralValue::Float(f)) => !ACCEPTABLE_FLOATS.contains(f),
        Some(LiteralValue::Str(s)) => s.chars().count() > 1 && string_is_key(model, literal),
        Some(LiteralValue::Bool(_) | LiteralValue::Null) | None => false,
    }
}

impl MagicLiteralRule {
    /// Whether the literal is already explained by where it sits
    fn is_named(&self, literal: &Node, ctx: &RuleContext<'_>) -> bool {
        let max_nodes = ctx.threshold(&Self::MAX_EXPLANATORY_NODES) as usize;
        let mut only_expressions = true;

        for ancestor in ctx.model.ancestors(literal.id) {
            match ancestor.kind {
                NodeKind::Statement => match ancestor.statement {
                    Some(StatementKind::ConstDecl) => return true,
                    Some(StatementKind::VarDecl) => {
                        if is_upper_case(ancestor.name_str()) {
                            return true;
                        }
                        if only_expressions
                            && ctx.model.descendants(ancestor.id).count() - 1 <= max_nodes
                        {
                            return true;
                        }
                        only_expressions = false;
                    }
                    _ => only_expressions = false,
                },
                NodeKind::Parameter => {
                    if only_expressions
                        && ctx.model.descendants(ancestor.id).count() - 1 <= max_nodes
                    {
                        return true;
                    }
                    only_expressions = false;
                }
                NodeKind::Class if ancestor.attrs.is_enum => return true,
                NodeKind::Expression => {}
                _ => only_expressions = false,
            }
        }
        false
    }
}

impl Rule for MagicLiteralRule {
    fn id(&self) -> &'static str {
        "MagicLiteral"
    }

    fn description(&self) -> &'static str {
        "Detects unexplained numeric and string literals"
    }

    fn category(&self) -> Category {
        Category::Structure
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Literal]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MAX_EXPLANATORY_NODES]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        if !is_candidate(ctx.model, node) || self.is_named(node, ctx) {
            return vec![];
        }
        let Some(value) = &node.literal else {
            return vec![];
        };
        let what = if value.is_numeric() { "number" } else { "string" };
        vec![ctx.violation(
            self.id(),
            self.severity(),
            node,
            format!("Magic {what} {value}; give it a name that explains it"),
        )]
    }
}
