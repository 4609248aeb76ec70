//! Temporal coupling detector
//!
//! Flags method pairs where one method silently depends on another having
//! run first: `send()` reads `self.socket` unconditionally, but only
//! `open()` ever assigns it, and nothing in the signatures forces callers
//! to call `open()` first. Passing `open()`'s result into `send()` makes
//! the order explicit; when some caller does that, the pair is fine.

use super::base::{Rule, RuleContext};
use super::is_constructor;
use crate::ir::{ExprKind, Node, NodeId, NodeKind, StatementKind, StructuralModel};
use crate::models::{Category, Violation};
use crate::symbols::{Access, Callee, Resolution, SymbolKind, SymbolTable};
use std::collections::{BTreeMap, BTreeSet};

/// Whether `node` runs every time `function` runs
fn runs_unconditionally(model: &StructuralModel, node: NodeId, function: NodeId) -> bool {
    for ancestor in model.ancestors(node) {
        if ancestor.id == function {
            return true;
        }
        let conditional = ancestor.is_control()
            || ancestor.is_statement(StatementKind::Case)
            || ancestor.is_statement(StatementKind::Try)
            || ancestor.is_expression(ExprKind::Lambda)
            || (ancestor.is_expression(ExprKind::Binary)
                && ancestor
                    .operator
                    .as_deref()
                    .is_some_and(|op| matches!(op, "&&" | "||" | "and" | "or" | "??")));
        if conditional {
            return false;
        }
    }
    false
}

/// Whether the subtree at `root` contains a call resolved to `target`
fn calls_into(model: &StructuralModel, symbols: &SymbolTable, root: NodeId, target: NodeId) -> bool {
    model.descendants(root).any(|n| {
        n.is_expression(ExprKind::Call)
            && symbols
                .calls()
                .iter()
                .any(|c| c.call == n.id && c.callee == Callee::Resolved(target))
    })
}

/// Whether an argument carries the result of calling `target`, directly or
/// through a local variable initialized or assigned from such a call
fn carries_result_of(
    model: &StructuralModel,
    symbols: &SymbolTable,
    argument: &Node,
    target: NodeId,
) -> bool {
    if calls_into(model, symbols, argument.id, target) {
        return true;
    }
    model.descendants(argument.id).any(|n| {
        let Some(Resolution::Local(id)) = symbols.resolution(n.id) else {
            return false;
        };
        let Some(symbol) = symbols.symbol(id) else {
            return false;
        };
        if symbol.kind != SymbolKind::Variable {
            return false;
        }
        if calls_into(model, symbols, symbol.declaration, target) {
            return true;
        }
        symbol
            .references
            .iter()
            .filter(|r| r.access == Access::Write)
            .filter_map(|r| model.parent(r.node))
            .filter(|p| p.is_statement(StatementKind::Assign))
            .filter_map(|assign| model.child(assign.id, 1))
            .any(|value| calls_into(model, symbols, value.id, target))
    })
}

pub struct TemporalCouplingRule;

impl TemporalCouplingRule {
    /// Whether any call of `reader` passes the result of `writer` in
    fn order_is_explicit(&self, ctx: &RuleContext<'_>, writer: NodeId, reader: NodeId) -> bool {
        ctx.symbols.callers_of(reader).any(|edge| {
            ctx.model
                .children(edge.call)
                .skip(1)
                .any(|arg| carries_result_of(ctx.model, ctx.symbols, arg, writer))
        })
    }
}

impl Rule for TemporalCouplingRule {
    fn id(&self) -> &'static str {
        "TemporalCoupling"
    }

    fn description(&self) -> &'static str {
        "Detects methods that must be called in an order nothing enforces"
    }

    fn category(&self) -> Category {
        Category::Structure
    }

    fn subscribed_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Class]
    }

    fn evaluate(&self, node: &Node, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let methods: Vec<&Node> = ctx
            .model
            .children(node.id)
            .filter(|n| n.kind == NodeKind::Function)
            .collect();
        if methods.len() < 2 {
            return vec![];
        }

        // Fields declared with an initial value are never unset
        let initialized: BTreeSet<&str> = ctx
            .model
            .children(node.id)
            .filter(|n| n.is_statement(StatementKind::VarDecl) && !n.children.is_empty())
            .map(|n| n.name_str())
            .collect();

        let mut writers: BTreeMap<&str, BTreeSet<NodeId>> = BTreeMap::new();
        let mut readers: BTreeMap<&str, BTreeSet<NodeId>> = BTreeMap::new();
        for method in &methods {
            for access in ctx.symbols.field_accesses_in(method.id) {
                if access.is_call || initialized.contains(access.field.as_str()) {
                    continue;
                }
                if access.is_write {
                    writers.entry(&access.field).or_default().insert(method.id);
                } else if runs_unconditionally(ctx.model, access.node, method.id) {
                    readers.entry(&access.field).or_default().insert(method.id);
                }
            }
        }

        // (writer, reader) -> fields that couple them
        let mut pairs: BTreeMap<(NodeId, NodeId), Vec<&str>> = BTreeMap::new();
        for (field, written_by) in &writers {
            if written_by.len() != 1 {
                continue;
            }
            let Some(&writer) = written_by.iter().next() else {
                continue;
            };
            let Some(writer_node) = ctx.model.node(writer) else { continue };
            if is_constructor(ctx.model, writer_node) {
                continue;
            }
            for &reader in readers.get(field).into_iter().flatten() {
                if reader != writer {
                    pairs.entry((writer, reader)).or_default().push(*field);
                }
            }
        }

        let mut violations = Vec::new();
        for ((writer, reader), fields) in pairs {
            if self.order_is_explicit(ctx, writer, reader) {
                continue;
            }
            let (Some(writer_node), Some(reader_node)) =
                (ctx.model.node(writer), ctx.model.node(reader))
            else {
                continue;
            };
            violations.push(
                ctx.violation(
                    self.id(),
                    self.severity(),
                    reader_node,
                    format!(
                        "`{}` reads {} which only `{}` sets; make the order explicit, e.g. pass what `{}` produces",
                        reader_node.name_str(),
                        fields
                            .iter()
                            .map(|f| format!("`{f}`"))
                            .collect::<Vec<_>>()
                            .join(", "),
                        writer_node.name_str(),
                        writer_node.name_str()
                    ),
                )
                .with_related(vec![ctx.range(writer_node)]),
            );
        }
        violations
    }
}
