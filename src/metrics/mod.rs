//! Metrics Calculator
//!
//! Pure function from a resolved model to a `(node, metric) -> value`
//! table. Function metrics only look at the function's own statements;
//! nested functions, lambdas and classes are measured on their own.

use crate::ir::{ExprKind, Node, NodeId, NodeKind, StatementKind, StructuralModel};
use crate::symbols::{Callee, SymbolTable};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Boolean operators counted as extra branches
const SHORT_CIRCUIT_OPS: &[&str] = &["&&", "||", "and", "or"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    LineCount,
    ParamCount,
    NestingDepth,
    CyclomaticBranches,
    StatementCount,
    AbstractionDistance,
    MethodCount,
    FieldCount,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::LineCount => "lineCount",
            Metric::ParamCount => "paramCount",
            Metric::NestingDepth => "nestingDepth",
            Metric::CyclomaticBranches => "cyclomaticBranches",
            Metric::StatementCount => "statementCount",
            Metric::AbstractionDistance => "abstractionDistance",
            Metric::MethodCount => "methodCount",
            Metric::FieldCount => "fieldCount",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computed metrics for one file
#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    values: FxHashMap<(NodeId, Metric), f64>,
}

impl MetricTable {
    pub fn get(&self, node: NodeId, metric: Metric) -> Option<f64> {
        self.values.get(&(node, metric)).copied()
    }

    /// Integer view of a count metric; 0 when absent
    pub fn count(&self, node: NodeId, metric: Metric) -> usize {
        self.get(node, metric).map(|v| v as usize).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn set(&mut self, node: NodeId, metric: Metric, value: impl Into<f64>) {
        self.values.insert((node, metric), value.into());
    }
}

pub fn compute(model: &StructuralModel, symbols: &SymbolTable) -> MetricTable {
    let mut table = MetricTable::default();
    for node in model.nodes() {
        match node.kind {
            NodeKind::Function => function_metrics(model, symbols, node, &mut table),
            NodeKind::Class => class_metrics(model, node, &mut table),
            _ => {}
        }
    }
    table
}

fn function_metrics(
    model: &StructuralModel,
    symbols: &SymbolTable,
    function: &Node,
    table: &mut MetricTable,
) {
    let id = function.id;
    let own = model.within_function(id);

    table.set(id, Metric::LineCount, function.span.line_count());
    table.set(id, Metric::ParamCount, model.parameters(id).count() as u32);
    table.set(id, Metric::NestingDepth, nesting_depth(model, id) as u32);

    let branches = own
        .iter()
        .filter(|n| {
            matches!(
                n.statement,
                Some(
                    StatementKind::If
                        | StatementKind::While
                        | StatementKind::For
                        | StatementKind::Case
                )
            ) && n.kind == NodeKind::Statement
                || (n.is_expression(ExprKind::Binary)
                    && n.operator
                        .as_deref()
                        .is_some_and(|op| SHORT_CIRCUIT_OPS.contains(&op)))
        })
        .count();
    table.set(id, Metric::CyclomaticBranches, (branches + 1) as u32);

    let statements = own
        .iter()
        .filter(|n| n.kind == NodeKind::Statement && n.statement != Some(StatementKind::Block))
        .count();
    table.set(id, Metric::StatementCount, statements as u32);

    table.set(
        id,
        Metric::AbstractionDistance,
        abstraction_distance(symbols, id, &own),
    );
}

/// Deepest chain of control statements inside the function's own body
///
/// An `If` in the else slot of another `If` continues the same chain
/// (`else if`), so it sits at its parent's level.
fn nesting_depth(model: &StructuralModel, function: NodeId) -> usize {
    let Some(body) = model.function_body(function) else {
        return 0;
    };
    let mut max = 0;
    let mut stack = vec![(body.id, 0usize, false)];
    while let Some((id, depth, else_if)) = stack.pop() {
        let Some(node) = model.node(id) else { continue };
        if node.kind == NodeKind::Function
            || node.kind == NodeKind::Class
            || node.is_expression(ExprKind::Lambda)
        {
            continue;
        }
        let depth = if else_if {
            depth
        } else if node.is_control() {
            depth + 1
        } else {
            depth
        };
        max = max.max(depth);
        let is_if = node.is_statement(StatementKind::If);
        for (i, child) in node.children.iter().enumerate() {
            let chained = is_if
                && i == 2
                && model
                    .node(*child)
                    .is_some_and(|c| c.is_statement(StatementKind::If));
            stack.push((*child, depth, chained));
        }
    }
    max
}

/// Number of distinct low-level operation families a function uses
/// directly: literals, operators (including indexing) and calls into code
/// that is not a function of this file. A body that only calls its own
/// helpers sits at distance 0.
fn abstraction_distance(symbols: &SymbolTable, function: NodeId, own: &[&Node]) -> u32 {
    let literals = own.iter().any(|n| n.kind == NodeKind::Literal);
    let operators = own.iter().any(|n| {
        n.is_expression(ExprKind::Binary)
            || n.is_expression(ExprKind::Unary)
            || n.is_expression(ExprKind::Index)
    });
    let primitives = symbols
        .calls_from(function)
        .any(|c| matches!(c.callee, Callee::Named(_)));
    [literals, operators, primitives]
        .iter()
        .filter(|used| **used)
        .count() as u32
}

fn class_metrics(model: &StructuralModel, class: &Node, table: &mut MetricTable) {
    let methods = model
        .children(class.id)
        .filter(|n| n.kind == NodeKind::Function)
        .count();
    let fields = model
        .children(class.id)
        .filter(|n| {
            n.is_statement(StatementKind::VarDecl) || n.is_statement(StatementKind::ConstDecl)
        })
        .count();
    table.set(class.id, Metric::MethodCount, methods as u32);
    table.set(class.id, Metric::FieldCount, fields as u32);
}
