//! Per-file fingerprint extraction
//!
//! Runs inside each file's worker. Everything clustering needs is copied
//! out of the model into owned [`FileFingerprints`], so models can be
//! dropped before the corpus-wide barrier.
//!
//! Three views of each candidate subtree:
//! - exact: xxh3 over the normalized token stream (identifiers replaced by
//!   positional placeholders, literals by their type tag)
//! - shape: xxh3 over the control-flow skeleton only, kept when the subtree
//!   has enough control statements for the skeleton to mean anything
//! - bigrams: hashed pairs of consecutive normalized tokens, compared with
//!   Jaccard similarity for near-duplicates

use crate::ir::{ExprKind, Node, NodeId, NodeKind, StatementKind, StructuralModel};
use crate::models::SourceRange;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::PathBuf;
use xxhash_rust::xxh3::xxh3_64;

/// Control statements a skeleton needs before similar shapes are reported
const MIN_SHAPE_CONTROL_NODES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Function,
    Block,
}

/// A function or block large enough to be worth comparing
#[derive(Debug, Clone)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub range: SourceRange,
    /// Function name, for messages
    pub name: Option<String>,
    pub statements: usize,
    pub exact: u64,
    pub shape: Option<u64>,
    pub bigrams: FxHashSet<u64>,
}

/// An if/else-if chain or a select whose predicates can be compared across
/// functions
#[derive(Debug, Clone)]
pub struct ConditionalChain {
    pub range: SourceRange,
    /// Function (or module) the chain lives in
    pub owner: SourceRange,
    pub branches: usize,
    /// Hash of the literal predicate texts, in order
    pub key: u64,
}

#[derive(Debug, Clone, Default)]
pub struct FileFingerprints {
    pub path: PathBuf,
    pub candidates: Vec<Candidate>,
    pub chains: Vec<ConditionalChain>,
}

/// Extract duplication candidates and conditional chains from one model
pub fn extract(model: &StructuralModel, min_statements: usize) -> FileFingerprints {
    let mut out = FileFingerprints {
        path: model.path().to_path_buf(),
        ..Default::default()
    };

    for node in model.nodes() {
        let kind = match node.kind {
            NodeKind::Function => CandidateKind::Function,
            NodeKind::Statement
                if node.statement == Some(StatementKind::Block) && !is_function_body(model, node) =>
            {
                CandidateKind::Block
            }
            NodeKind::Statement => {
                if let Some(chain) = conditional_chain(model, node) {
                    out.chains.push(chain);
                }
                continue;
            }
            _ => continue,
        };

        let statements = statement_count(model, node);
        if statements < min_statements {
            continue;
        }
        let tokens = normalized_tokens(model, node);
        out.candidates.push(Candidate {
            kind,
            range: SourceRange::new(model.path(), node.span),
            name: (kind == CandidateKind::Function).then(|| node.name_str().to_string()),
            statements,
            exact: xxh3_64(tokens.join(" ").as_bytes()),
            shape: shape_key(model, node),
            bigrams: tokens
                .windows(2)
                .map(|pair| xxh3_64(format!("{}:{}", pair[0], pair[1]).as_bytes()))
                .collect(),
        });
    }
    out
}

fn is_function_body(model: &StructuralModel, block: &Node) -> bool {
    model
        .parent(block.id)
        .is_some_and(|p| p.kind == NodeKind::Function && p.children.last() == Some(&block.id))
}

/// Non-block statements in the subtree
fn statement_count(model: &StructuralModel, root: &Node) -> usize {
    model
        .descendants(root.id)
        .filter(|n| n.kind == NodeKind::Statement && n.statement != Some(StatementKind::Block))
        .count()
}

/// Token stream with names replaced by `$N` in order of first appearance
///
/// The root's own name is left out, so two functions with identical bodies
/// fingerprint the same whatever they are called.
fn normalized_tokens(model: &StructuralModel, root: &Node) -> Vec<String> {
    let mut placeholders: FxHashMap<&str, usize> = FxHashMap::default();
    let mut tokens = Vec::new();
    for node in model.descendants(root.id) {
        let shape = match node.kind {
            NodeKind::Statement => format!("S:{:?}", node.statement.unwrap_or(StatementKind::Other)),
            NodeKind::Expression => format!(
                "E:{:?}:{}",
                node.expression.unwrap_or(ExprKind::Other),
                node.operator.as_deref().unwrap_or("")
            ),
            NodeKind::Literal => node
                .literal
                .as_ref()
                .map(|l| l.type_tag().to_string())
                .unwrap_or_else(|| "$LIT".to_string()),
            other => format!("{other:?}"),
        };
        tokens.push(format!("{shape}/{}", node.children.len()));

        if node.id == root.id || node.kind == NodeKind::Literal {
            continue;
        }
        if let Some(name) = node.name.as_deref().filter(|n| !n.is_empty()) {
            let next = placeholders.len();
            let index = *placeholders.entry(name).or_insert(next);
            tokens.push(format!("${index}"));
        }
    }
    tokens
}

/// Skeleton of control statements and exits with their nesting depth
fn shape_key(model: &StructuralModel, root: &Node) -> Option<u64> {
    let mut skeleton = Vec::new();
    let mut control = 0;
    let mut stack = vec![(root.id, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let Some(node) = model.node(id) else { continue };
        let mut child_depth = depth;
        if let (NodeKind::Statement, Some(kind)) = (node.kind, node.statement) {
            if kind.is_control() || kind == StatementKind::Try {
                control += 1;
                child_depth += 1;
                skeleton.push(format!("{kind:?}@{depth}"));
            } else if kind.is_exit() {
                skeleton.push(format!("{kind:?}@{depth}"));
            }
        }
        stack.extend(node.children.iter().rev().map(|c| (*c, child_depth)));
    }
    (control >= MIN_SHAPE_CONTROL_NODES).then(|| xxh3_64(skeleton.join(" ").as_bytes()))
}

/// Source-faithful rendering of a predicate: names and values kept
fn raw_text(model: &StructuralModel, root: NodeId) -> String {
    let mut parts = Vec::new();
    for node in model.descendants(root) {
        parts.push(format!("{:?}", node.kind));
        parts.extend(node.operator.clone());
        parts.extend(node.name.clone());
        parts.extend(node.literal.as_ref().map(|l| l.to_string()));
    }
    parts.join(" ")
}

/// Chain starting at `node`, if it heads one
fn conditional_chain(model: &StructuralModel, node: &Node) -> Option<ConditionalChain> {
    let mut predicates = Vec::new();
    match node.statement? {
        StatementKind::If => {
            // An `else if` belongs to the chain of the `if` above it
            let parent = model.parent(node.id)?;
            if parent.is_statement(StatementKind::If) && model.child_index(node.id) == Some(2) {
                return None;
            }
            predicates.push("if".to_string());
            let mut current = node;
            loop {
                let condition = model.child(current.id, 0)?;
                predicates.push(raw_text(model, condition.id));
                match model.child(current.id, 2) {
                    Some(next) if next.is_statement(StatementKind::If) => current = next,
                    _ => break,
                }
            }
        }
        StatementKind::Select => {
            predicates.push("select".to_string());
            let scrutinee = model.child(node.id, 0)?;
            predicates.push(raw_text(model, scrutinee.id));
            for case in model
                .children(node.id)
                .filter(|c| c.is_statement(StatementKind::Case))
            {
                let labels: Vec<String> = model
                    .children(case.id)
                    .filter(|c| !c.is_statement(StatementKind::Block))
                    .map(|c| raw_text(model, c.id))
                    .collect();
                predicates.push(labels.join("|"));
            }
        }
        _ => return None,
    }

    // Leading kind tag, plus the scrutinee for selects
    let prefix = if predicates[0] == "select" { 2 } else { 1 };
    let owner = model
        .ancestors(node.id)
        .find(|a| a.kind == NodeKind::Function || a.kind == NodeKind::Module)?;
    Some(ConditionalChain {
        range: SourceRange::new(model.path(), node.span),
        owner: SourceRange::new(model.path(), owner.span),
        branches: predicates.len() - prefix,
        key: xxh3_64(predicates.join("\u{1f}").as_bytes()),
    })
}

/// Jaccard similarity of two bigram sets
pub fn jaccard(a: &FxHashSet<u64>, b: &FxHashSet<u64>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ModelBuilder;

    /// `def <name>(<param>): <var> = <param> * 2; if <var>: log(<var>); return <var>`
    fn scaled(b: &mut ModelBuilder, module: NodeId, name: &str, param: &str, var: &str) -> NodeId {
        let f = b.function(module, name);
        b.parameter(f, param, None);
        let body = b.block(f);
        let decl = b.var_decl(body, var);
        let product = b.binary(decl, "*");
        b.ident(product, param);
        b.int(product, 2);
        let check = b.statement(body, StatementKind::If);
        b.ident(check, var);
        let then = b.block(check);
        let stmt = b.statement(then, StatementKind::Expression);
        let call = b.call(stmt, "log");
        b.ident(call, var);
        let ret = b.statement(body, StatementKind::Return);
        b.ident(ret, var);
        f
    }

    #[test]
    fn test_renamed_copies_share_exact_fingerprint() {
        let mut b = ModelBuilder::new("dup.py");
        let m = b.module("dup");
        scaled(&mut b, m, "double_price", "price", "result");
        scaled(&mut b, m, "double_weight", "weight", "total");
        let model = b.build().unwrap();

        let prints = extract(&model, 3);
        let functions: Vec<&Candidate> = prints
            .candidates
            .iter()
            .filter(|c| c.kind == CandidateKind::Function)
            .collect();
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[0].exact, functions[1].exact);
        assert_eq!(functions[0].name.as_deref(), Some("double_price"));
        // A single `if` is not enough control flow for a shape key
        assert!(functions[0].shape.is_none());
    }

    #[test]
    fn test_placeholders_keep_name_identity() {
        // `a + a` and `a + b` must differ
        let mut b = ModelBuilder::new("p.py");
        let m = b.module("p");
        for (name, rhs) in [("same", "a"), ("other", "b")] {
            let f = b.function(m, name);
            let body = b.block(f);
            for _ in 0..3 {
                let ret = b.statement(body, StatementKind::Expression);
                let sum = b.binary(ret, "+");
                b.ident(sum, "a");
                b.ident(sum, rhs);
            }
        }
        let model = b.build().unwrap();
        let prints = extract(&model, 3);
        assert_eq!(prints.candidates.len(), 2);
        assert_ne!(prints.candidates[0].exact, prints.candidates[1].exact);
    }

    #[test]
    fn test_else_if_chain_is_one_chain() {
        let mut b = ModelBuilder::new("c.py");
        let m = b.module("c");
        let f = b.function(m, "fee");
        b.parameter(f, "plan", None);
        let body = b.block(f);
        let first = b.statement(body, StatementKind::If);
        let eq = b.binary(first, "==");
        b.ident(eq, "plan");
        b.string(eq, "gold");
        b.block(first);
        let second = b.statement(first, StatementKind::If);
        let eq = b.binary(second, "==");
        b.ident(eq, "plan");
        b.string(eq, "silver");
        b.block(second);
        let model = b.build().unwrap();

        let prints = extract(&model, 3);
        assert_eq!(prints.chains.len(), 1);
        assert_eq!(prints.chains[0].branches, 2);
    }

    #[test]
    fn test_jaccard() {
        let a: FxHashSet<u64> = [1, 2, 3].into_iter().collect();
        let b: FxHashSet<u64> = [2, 3, 4].into_iter().collect();
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(jaccard(&FxHashSet::default(), &FxHashSet::default()), 1.0);
    }
}
