//! Programmatic construction of structural models
//!
//! The builder hands out ids in creation order and lays nodes out on
//! synthetic lines so the resulting spans always satisfy the ingestion
//! checks: declarations, parameters, statements and comments each start a
//! new line, expressions are placed left to right on the current line, and
//! every ancestor's span grows to cover what is added beneath it. Nodes
//! must therefore be created in source order.

use super::{ExprKind, LiteralValue, Node, NodeAttrs, NodeId, NodeKind, Span, StatementKind};
use super::StructuralModel;
use crate::errors::ModelError;
use std::path::PathBuf;

pub struct ModelBuilder {
    path: PathBuf,
    nodes: Vec<Node>,
    parents: Vec<Option<usize>>,
    root: Option<NodeId>,
    line: u32,
    col: u32,
    pending_comments: Vec<NodeId>,
}

impl ModelBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            nodes: Vec::new(),
            parents: Vec::new(),
            root: None,
            line: 1,
            col: 1,
            pending_comments: Vec::new(),
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn attrs_mut(&mut self, id: NodeId) -> Option<&mut NodeAttrs> {
        self.node_mut(id).map(|n| &mut n.attrs)
    }

    /// Root module; must be created first
    pub fn module(&mut self, name: &str) -> NodeId {
        let id = self.alloc(NodeKind::Module, Span::new(1, 1, 1, 1), None);
        self.nodes[id.0 as usize].name = Some(name.to_string());
        self.root = Some(id);
        id
    }

    pub fn class(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.line_node(parent, NodeKind::Class, Some(name))
    }

    pub fn function(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.line_node(parent, NodeKind::Function, Some(name))
    }

    pub fn parameter(&mut self, function: NodeId, name: &str, type_name: Option<&str>) -> NodeId {
        let id = self.line_node(function, NodeKind::Parameter, Some(name));
        self.nodes[id.0 as usize].attrs.type_name = type_name.map(str::to_string);
        id
    }

    pub fn statement(&mut self, parent: NodeId, kind: StatementKind) -> NodeId {
        let id = self.line_node(parent, NodeKind::Statement, None);
        self.nodes[id.0 as usize].statement = Some(kind);
        id
    }

    pub fn block(&mut self, parent: NodeId) -> NodeId {
        self.statement(parent, StatementKind::Block)
    }

    pub fn var_decl(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.statement(parent, StatementKind::VarDecl);
        self.nodes[id.0 as usize].name = Some(name.to_string());
        id
    }

    pub fn const_decl(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.statement(parent, StatementKind::ConstDecl);
        self.nodes[id.0 as usize].name = Some(name.to_string());
        id
    }

    /// Comment attached to the next declaration or statement created
    pub fn comment(&mut self, text: &str) -> NodeId {
        self.line += 1;
        self.col = 1;
        let width = text.chars().count() as u32;
        let span = Span::new(self.line, 1, self.line, width.max(1));
        let id = self.alloc(NodeKind::Comment, span, None);
        self.nodes[id.0 as usize].text = Some(text.to_string());
        self.pending_comments.push(id);
        id
    }

    pub fn expr(&mut self, parent: NodeId, kind: ExprKind) -> NodeId {
        let id = self.inline_node(parent, NodeKind::Expression, None, 1);
        self.nodes[id.0 as usize].expression = Some(kind);
        id
    }

    pub fn ident(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.inline_node(parent, NodeKind::Identifier, Some(name), name.len() as u32)
    }

    /// `object.name`; add the object expression as the child afterwards
    pub fn member(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.inline_node(parent, NodeKind::Expression, Some(name), name.len() as u32);
        self.nodes[id.0 as usize].expression = Some(ExprKind::Member);
        id
    }

    pub fn binary(&mut self, parent: NodeId, op: &str) -> NodeId {
        let id = self.expr(parent, ExprKind::Binary);
        self.nodes[id.0 as usize].operator = Some(op.to_string());
        id
    }

    pub fn unary(&mut self, parent: NodeId, op: &str) -> NodeId {
        let id = self.expr(parent, ExprKind::Unary);
        self.nodes[id.0 as usize].operator = Some(op.to_string());
        id
    }

    /// `name(...)`; returns the call so arguments can be appended
    pub fn call(&mut self, parent: NodeId, name: &str) -> NodeId {
        let call = self.expr(parent, ExprKind::Call);
        self.ident(call, name);
        call
    }

    /// `object.method(...)`; returns the call so arguments can be appended
    pub fn method_call(&mut self, parent: NodeId, object: &str, method: &str) -> NodeId {
        let call = self.expr(parent, ExprKind::Call);
        let m = self.member(call, method);
        self.ident(m, object);
        call
    }

    /// `<receiver>.method(...)` where the receiver expression is built by
    /// the caller; returns `(call, member)` with the receiver still to add
    /// under `member`
    pub fn chained_call(&mut self, parent: NodeId, method: &str) -> (NodeId, NodeId) {
        let call = self.expr(parent, ExprKind::Call);
        let m = self.member(call, method);
        (call, m)
    }

    pub fn literal(&mut self, parent: NodeId, value: LiteralValue) -> NodeId {
        let width = value.to_string().chars().count() as u32;
        let id = self.inline_node(parent, NodeKind::Literal, None, width);
        self.nodes[id.0 as usize].literal = Some(value);
        id
    }

    pub fn int(&mut self, parent: NodeId, value: i64) -> NodeId {
        self.literal(parent, LiteralValue::Int(value))
    }

    pub fn string(&mut self, parent: NodeId, value: &str) -> NodeId {
        self.literal(parent, LiteralValue::Str(value.to_string()))
    }

    pub fn boolean(&mut self, parent: NodeId, value: bool) -> NodeId {
        self.literal(parent, LiteralValue::Bool(value))
    }

    pub fn build(self) -> Result<StructuralModel, ModelError> {
        let root = self.root.ok_or(ModelError::Empty)?;
        let line_count = self.line;
        StructuralModel::new(self.path, root, self.nodes, Some(line_count))
    }

    fn line_node(&mut self, parent: NodeId, kind: NodeKind, name: Option<&str>) -> NodeId {
        self.line += 1;
        self.col = 1;
        let span = Span::new(self.line, 1, self.line, 1);
        let id = self.alloc(kind, span, Some(parent));
        self.nodes[id.0 as usize].name = name.map(str::to_string);
        let comments = std::mem::take(&mut self.pending_comments);
        self.nodes[id.0 as usize].comments = comments;
        id
    }

    fn inline_node(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: Option<&str>,
        width: u32,
    ) -> NodeId {
        let start = self.col + 1;
        let end = start + width.max(1) - 1;
        self.col = end;
        let span = Span::new(self.line, start, self.line, end);
        let id = self.alloc(kind, span, Some(parent));
        self.nodes[id.0 as usize].name = name.map(str::to_string);
        id
    }

    fn alloc(&mut self, kind: NodeKind, span: Span, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, kind, span));
        let parent_index = parent.map(|p| p.0 as usize);
        self.parents.push(parent_index);

        if let Some(p) = parent_index {
            self.nodes[p].children.push(id);
            // Grow every ancestor to cover the new node.
            let end = span.end();
            let mut cursor = Some(p);
            while let Some(i) = cursor {
                let node_span = &mut self.nodes[i].span;
                if node_span.end() < end {
                    node_span.end_line = end.0;
                    node_span.end_col = end.1;
                }
                cursor = self.parents[i];
            }
        }
        id
    }
}
