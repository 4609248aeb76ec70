//! Selector (flag) argument detector
//!
//! A boolean or small-enum parameter that decides which of two disjoint
//! behaviors a function performs means the function does more than one
//! thing. Example:
//!
//! ```text
//! def render(page, as_pdf: bool):
//!     if as_pdf:
//!         return pdf(page)
//!     return html(page)
//! ```
//!
//! Only parameters whose declared type is known are considered; an
//! untyped parameter is never reported.

use super::base::{Rule, RuleContext, ThresholdSpec};
use crate::ir::{Node, NodeKind, StatementKind, StructuralModel};
use crate::models::{Category, Severity, Violation};
use crate::symbols::{Access, SymbolKind};

const BOOLEAN_TYPES: &[&str] = &["bool", "boolean", "Bool", "Boolean"];

pub struct SelectorArgumentRule;

impl SelectorArgumentRule {
    pub const MAX_ENUM_VARIANTS: ThresholdSpec = ThresholdSpec::count("maxEnumVariants", 4.0);

    fn is_selector_type(&self, param: &Node, ctx: &RuleContext<'_>) -> bool {
        let Some(type_name) = param.attrs.type_name.as_deref() else {
            return false;
        };
        if BOOLEAN_TYPES.contains(&type_name) {
            return true;
        }
        // Small enumeration declared in the same file
        let max_variants = ctx.threshold(&Self::MAX_ENUM_VARIANTS) as usize;
        ctx.symbols
            .symbols()
            .iter()
            .filter(|s| s.kind == SymbolKind::Class && s.name == type_name)
            .filter_map(|s| ctx.model.node(s.declaration))
            .any(|class| {
                class.attrs.is_enum
                    && ctx
                        .model
                        .children(class.id)
                        .filter(|c| c.is_statement(StatementKind::ConstDecl))
                        .count()
                        <= max_variants
            })
    }
}

/// Whether a read of the parameter at `node` is (part of) the condition of
/// a branch that selects disjoint behavior
fn gates_disjoint_branch(model: &StructuralModel, node: &Node) -> bool {
    let mut current = node.id;
    while let Some(parent) = model.parent(current) {
        if parent.kind == NodeKind::Statement {
            if model.child_index(current) != Some(0) {
                return false;
            }
            return match parent.statement {
                Some(StatementKind::If) => if_selects(model, parent),
                Some(StatementKind::Select) => {
                    model
                        .children(parent.id)
                        .filter(|c| c.is_statement(StatementKind::Case))
                        .count()
                        >= 2
                }
                _ => false,
            };
        }
        if parent.kind != NodeKind::Expression {
            return false;
        }
        current = parent.id;
    }
    false
}

/// An `if` selects between behaviors when it has an else branch or when
/// its then-branch leaves the function
fn if_selects(model: &StructuralModel, if_node: &Node) -> bool {
    if if_node.children.len() >= 3 {
        return true;
    }
    model.child(if_node.id, 1).is_some_and(|then| {
        model.children(then.id).any(|s| {
            matches!(s.statement, Some(StatementKind::Return | StatementKind::Throw))
        })
    })
}

impl Rule for SelectorArgumentRule {
    fn id(&self) -> &'static str {
        "SelectorArgument"
    }

    fn description(&self) -> &'static str {
        "Detects boolean or enum parameters that select between behaviors"
    }

    fn category(&self) -> Category {
        Category::Functions
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Function]
    }

    fn thresholds(&self) -> &'static [ThresholdSpec] {
        &[Self::MAX_ENUM_VARIANTS]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for param in ctx.model.parameters(node.id) {
            if !self.is_selector_type(param, ctx) {
                continue;
            }
            let Some(symbol) = ctx.symbols.declared_by(param.id) else {
                continue;
            };
            let selects = symbol
                .references
                .iter()
                .filter(|r| r.access == Access::Read)
                .filter_map(|r| ctx.model.node(r.node))
                .any(|use_site| gates_disjoint_branch(ctx.model, use_site));
            if selects {
                violations.push(ctx.violation(
                    self.id(),
                    Severity::Medium,
                    param,
                    format!(
                        "Parameter `{}` selects what `{}` does; split it into one function per behavior",
                        param.name_str(),
                        node.name_str()
                    ),
                ));
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run_rule;
    use crate::ir::ModelBuilder;
    use std::sync::Arc;

    #[test]
    fn test_boolean_gating_two_returns() {
        let mut b = ModelBuilder::new("render.py");
        let m = b.module("render");
        let f = b.function(m, "render");
        b.parameter(f, "page", None);
        let flag = b.parameter(f, "as_pdf", Some("bool"));
        let body = b.block(f);
        let branch = b.statement(body, StatementKind::If);
        b.ident(branch, "as_pdf");
        let then = b.block(branch);
        let ret = b.statement(then, StatementKind::Return);
        let call = b.call(ret, "pdf");
        b.ident(call, "page");
        let ret = b.statement(body, StatementKind::Return);
        let call = b.call(ret, "html");
        b.ident(call, "page");
        let model = b.build().unwrap();

        let found = run_rule(Arc::new(SelectorArgumentRule), &model);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node, Some(flag));
    }

    #[test]
    fn test_split_functions_are_clean() {
        let mut b = ModelBuilder::new("render.py");
        let m = b.module("render");
        for name in ["render_pdf", "render_html"] {
            let f = b.function(m, name);
            b.parameter(f, "page", None);
            let body = b.block(f);
            let ret = b.statement(body, StatementKind::Return);
            let call = b.call(ret, "convert");
            b.ident(call, "page");
        }
        let model = b.build().unwrap();
        assert!(run_rule(Arc::new(SelectorArgumentRule), &model).is_empty());
    }

    #[test]
    fn test_boolean_used_as_data_is_clean() {
        let mut b = ModelBuilder::new("save.py");
        let m = b.module("save");
        let f = b.function(m, "save");
        b.parameter(f, "verbose", Some("bool"));
        let body = b.block(f);
        let stmt = b.statement(body, StatementKind::Expression);
        let call = b.call(stmt, "store");
        b.ident(call, "verbose");
        let model = b.build().unwrap();
        assert!(run_rule(Arc::new(SelectorArgumentRule), &model).is_empty());
    }

    #[test]
    fn test_small_enum_in_select() {
        let mut b = ModelBuilder::new("shape.py");
        let m = b.module("shape");
        let kind = b.class(m, "Kind");
        b.attrs_mut(kind).unwrap().is_enum = true;
        b.const_decl(kind, "CIRCLE");
        b.const_decl(kind, "SQUARE");
        let f = b.function(m, "area");
        b.parameter(f, "kind", Some("Kind"));
        let body = b.block(f);
        let select = b.statement(body, StatementKind::Select);
        b.ident(select, "kind");
        for _ in 0..2 {
            let case = b.statement(select, StatementKind::Case);
            let block = b.block(case);
            b.statement(block, StatementKind::Return);
        }
        let model = b.build().unwrap();
        assert_eq!(run_rule(Arc::new(SelectorArgumentRule), &model).len(), 1);
    }
}
