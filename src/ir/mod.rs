//! Structural model (IR)
//!
//! The language-agnostic tree every adapter produces. Nodes live in one
//! arena per file and refer to each other only by [`NodeId`], so the
//! graph layered on top (class ↔ method, caller ↔ callee) can be cyclic
//! without any ownership between nodes.
//!
//! # Encoding conventions
//!
//! ```text
//! Module     children: Class | Function | Statement
//! Class      children: Function (methods) | Statement VarDecl/ConstDecl (fields) | Class
//! Function   children: Parameter* , Statement(Block)?        (body last)
//! If         children: condition, Block, (Block | If)?       (else / else-if)
//! While      children: condition, Block
//! For        children: VarDecl?, iterable?, Block
//! Select     children: scrutinee, Case*
//! Case       children: label?, Block
//! Assign     children: target, value
//! VarDecl    name = binding, children: initializer?
//! Call       children: callee (Identifier | Member), args*
//! Member     name = member, children: object
//! ```
//!
//! Comments are not children. A comment is referenced from the `comments`
//! list of the statement or declaration that follows it.

mod builder;
mod validate;

pub use builder::ModelBuilder;

use crate::errors::ModelError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stable id of a node within one file's arena
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node types in the structural model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Module,
    Class,
    Function,
    Parameter,
    Statement,
    Expression,
    Identifier,
    Comment,
    Literal,
}

impl NodeKind {
    pub const ALL: [NodeKind; 9] = [
        NodeKind::Module,
        NodeKind::Class,
        NodeKind::Function,
        NodeKind::Parameter,
        NodeKind::Statement,
        NodeKind::Expression,
        NodeKind::Identifier,
        NodeKind::Comment,
        NodeKind::Literal,
    ];
}

/// 1-based source span, ordered by (line, column)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn start(&self) -> (u32, u32) {
        (self.start_line, self.start_col)
    }

    pub fn end(&self) -> (u32, u32) {
        (self.end_line, self.end_col)
    }

    pub fn is_ordered(&self) -> bool {
        self.start() <= self.end()
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start() <= other.start() && other.end() <= self.end()
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Statement flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    If,
    While,
    For,
    Select,
    Case,
    Return,
    Assign,
    Expression,
    VarDecl,
    ConstDecl,
    Block,
    Break,
    Continue,
    Throw,
    Try,
    Other,
}

impl StatementKind {
    /// Control constructs counted by nesting depth
    pub fn is_control(self) -> bool {
        matches!(
            self,
            StatementKind::If | StatementKind::While | StatementKind::For | StatementKind::Select
        )
    }

    /// Statements that leave the current block
    pub fn is_exit(self) -> bool {
        matches!(
            self,
            StatementKind::Return
                | StatementKind::Throw
                | StatementKind::Break
                | StatementKind::Continue
        )
    }
}

/// Expression flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprKind {
    Call,
    Member,
    Binary,
    Unary,
    Index,
    Lambda,
    Other,
}

/// Literal payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl LiteralValue {
    /// Tag used in place of the value when fingerprinting
    pub fn type_tag(&self) -> &'static str {
        match self {
            LiteralValue::Int(_) => "$INT",
            LiteralValue::Float(_) => "$FLOAT",
            LiteralValue::Str(_) => "$STR",
            LiteralValue::Bool(_) => "$BOOL",
            LiteralValue::Null => "$NULL",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, LiteralValue::Int(_) | LiteralValue::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LiteralValue::Int(i) => Some(*i as f64),
            LiteralValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralValue::Int(i) => write!(f, "{i}"),
            LiteralValue::Float(x) => write!(f, "{x}"),
            LiteralValue::Str(s) => write!(f, "{s:?}"),
            LiteralValue::Bool(b) => write!(f, "{b}"),
            LiteralValue::Null => write!(f, "null"),
        }
    }
}

/// Adapter-supplied facts that have no structural encoding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeAttrs {
    /// Declared type of a parameter or variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Parameter is passed by reference (out/ref/&mut/pointer)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub by_reference: bool,
    /// Function overrides or implements an inherited member
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_override: bool,
    /// Class is an enumeration; its ConstDecl children are the variants
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_enum: bool,
    /// Base classes / implemented interfaces
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    /// Declared return type of a function
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

/// A typed element of source structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub span: Span,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<LiteralValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<StatementKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<ExprKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub attrs: NodeAttrs,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, span: Span) -> Self {
        Self {
            id,
            kind,
            span,
            children: Vec::new(),
            comments: Vec::new(),
            name: None,
            literal: None,
            statement: None,
            expression: None,
            operator: None,
            text: None,
            attrs: NodeAttrs::default(),
        }
    }

    /// Name of the node, or the empty string
    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn is_statement(&self, kind: StatementKind) -> bool {
        self.kind == NodeKind::Statement && self.statement == Some(kind)
    }

    pub fn is_expression(&self, kind: ExprKind) -> bool {
        self.kind == NodeKind::Expression && self.expression == Some(kind)
    }

    /// If/While/For/Select statement
    pub fn is_control(&self) -> bool {
        self.kind == NodeKind::Statement && self.statement.is_some_and(StatementKind::is_control)
    }

    /// Declarations that can own a suppression marker or a comment
    pub fn is_declaration(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Module | NodeKind::Class | NodeKind::Function | NodeKind::Parameter
        ) || self.is_statement(StatementKind::VarDecl)
            || self.is_statement(StatementKind::ConstDecl)
    }
}

/// Validated per-file arena of nodes
///
/// Immutable once built; every lookup goes through ids.
#[derive(Debug, Clone)]
pub struct StructuralModel {
    path: PathBuf,
    root: NodeId,
    line_count: Option<u32>,
    nodes: Vec<Node>,
    index: FxHashMap<NodeId, usize>,
    parents: FxHashMap<NodeId, NodeId>,
    comment_owners: FxHashMap<NodeId, NodeId>,
}

impl StructuralModel {
    /// Ingest adapter output, enforcing the tree invariants
    pub fn new(
        path: impl Into<PathBuf>,
        root: NodeId,
        nodes: Vec<Node>,
        line_count: Option<u32>,
    ) -> Result<Self, ModelError> {
        let links = validate::validate(root, &nodes, line_count)?;
        Ok(Self {
            path: path.into(),
            root,
            line_count,
            nodes,
            index: links.index,
            parents: links.parents,
            comment_owners: links.comment_owners,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn line_count(&self) -> Option<u32> {
        self.line_count
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// All nodes in arena order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<&Node> {
        self.parents.get(&id).and_then(|p| self.node(*p))
    }

    /// Node a comment is attached to
    pub fn comment_owner(&self, comment: NodeId) -> Option<&Node> {
        self.comment_owners.get(&comment).and_then(|o| self.node(*o))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|c| self.node(*c))
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<&Node> {
        self.node(id)
            .and_then(|n| n.children.get(index))
            .and_then(|c| self.node(*c))
    }

    /// Comments attached to a node
    pub fn comments(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.node(id)
            .map(|n| n.comments.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|c| self.node(*c))
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            model: self,
            current: self.parents.get(&id).copied(),
        }
    }

    /// Pre-order walk of the subtree rooted at `id`, including `id`
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            model: self,
            stack: vec![id],
        }
    }

    /// Nearest ancestor of the given kind
    pub fn enclosing(&self, id: NodeId, kind: NodeKind) -> Option<&Node> {
        self.ancestors(id).find(|n| n.kind == kind)
    }

    /// Whether `ancestor` is `id` or one of its ancestors
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|n| n.id == ancestor)
    }

    /// Body block of a function (its last child, when it is a Block)
    pub fn function_body(&self, function: NodeId) -> Option<&Node> {
        self.node(function)
            .and_then(|f| f.children.last())
            .and_then(|c| self.node(*c))
            .filter(|n| n.is_statement(StatementKind::Block))
    }

    /// Parameters of a function, in order
    pub fn parameters(&self, function: NodeId) -> impl Iterator<Item = &Node> {
        self.children(function)
            .filter(|n| n.kind == NodeKind::Parameter)
    }

    /// Nodes belonging to a function itself, in pre-order, excluding the
    /// function node and anything inside nested functions, lambdas or classes
    pub fn within_function(&self, function: NodeId) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .node(function)
            .map(|f| f.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            if node.kind == NodeKind::Function
                || node.kind == NodeKind::Class
                || node.is_expression(ExprKind::Lambda)
            {
                continue;
            }
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Position of a node within its parent's child list
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        self.parent(id)
            .and_then(|p| p.children.iter().position(|c| *c == id))
    }
}

/// Iterator over a node's ancestors
pub struct Ancestors<'a> {
    model: &'a StructuralModel,
    current: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.model.node(self.current?)?;
        self.current = self.model.parents.get(&node.id).copied();
        Some(node)
    }
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    model: &'a StructuralModel,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.model.node(id) {
                self.stack.extend(node.children.iter().rev());
                return Some(node);
            }
        }
        None
    }
}
