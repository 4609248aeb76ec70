//! Two passes over one model: declarations first (so every scope is fully
//! populated before anything is looked up), then references.

use super::{
    is_self_name, Access, CallEdge, Callee, FieldAccess, ForeignAccess, Reference, Resolution,
    Scope, ScopeId, ScopeKind, Symbol, SymbolId, SymbolKind, SymbolTable,
};
use crate::ir::{ExprKind, Node, NodeId, NodeKind, StatementKind, StructuralModel};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Build the symbol table for one model
pub fn resolve(model: &StructuralModel) -> SymbolTable {
    let mut resolver = Resolver {
        model,
        table: SymbolTable::default(),
    };
    resolver.declare();
    resolver.bind();
    resolver.finish();

    debug!(
        "Resolved {} symbols in {} scopes for {} ({} unresolved)",
        resolver.table.symbols.len(),
        resolver.table.scopes.len(),
        model.path().display(),
        resolver.table.unresolved.len()
    );
    resolver.table
}

/// How the receiver of a member access was classified
enum Receiver {
    Own(Option<SymbolId>),
    Foreign {
        root: Option<SymbolId>,
        root_name: Option<String>,
        depth: u32,
        receiver: Option<NodeId>,
    },
}

struct Resolver<'a> {
    model: &'a StructuralModel,
    table: SymbolTable,
}

impl<'a> Resolver<'a> {
    // ---- declarations -------------------------------------------------

    fn declare(&mut self) {
        let model = self.model;
        let root = model.root();
        let module_scope = self.open_scope(ScopeKind::Module, root, None);
        self.table.scope_of.insert(root, module_scope);

        let mut stack: Vec<(NodeId, ScopeId, Option<NodeId>)> = model
            .node(root)
            .map(|n| n.children.iter().rev().map(|c| (*c, module_scope, None)).collect())
            .unwrap_or_default();

        while let Some((id, scope, function)) = stack.pop() {
            let Some(node) = model.node(id) else { continue };
            self.table.scope_of.insert(id, scope);
            if let Some(f) = function {
                self.table.enclosing_function.insert(id, f);
            }

            let mut inner_scope = scope;
            let mut inner_function = function;
            match node.kind {
                NodeKind::Class => {
                    self.declare_symbol(node, SymbolKind::Class, scope);
                    inner_scope = self.open_scope(ScopeKind::Class, id, Some(scope));
                }
                NodeKind::Function => {
                    self.declare_symbol(node, SymbolKind::Function, scope);
                    inner_scope = self.open_scope(ScopeKind::Function, id, Some(scope));
                    inner_function = Some(id);
                }
                NodeKind::Parameter => self.declare_symbol(node, SymbolKind::Parameter, scope),
                NodeKind::Statement => match node.statement {
                    Some(StatementKind::VarDecl) => {
                        self.declare_symbol(node, SymbolKind::Variable, scope)
                    }
                    Some(StatementKind::ConstDecl) => {
                        self.declare_symbol(node, SymbolKind::Constant, scope)
                    }
                    // A function body shares the function's scope
                    Some(StatementKind::Block) if !self.is_function_body(node) => {
                        inner_scope = self.open_scope(ScopeKind::Block, id, Some(scope));
                    }
                    Some(StatementKind::For) => {
                        inner_scope = self.open_scope(ScopeKind::Block, id, Some(scope));
                    }
                    _ => {}
                },
                NodeKind::Expression if node.expression == Some(ExprKind::Lambda) => {
                    inner_scope = self.open_scope(ScopeKind::Function, id, Some(scope));
                }
                _ => {}
            }

            for child in node.children.iter().rev() {
                stack.push((*child, inner_scope, inner_function));
            }
        }
    }

    fn is_function_body(&self, node: &Node) -> bool {
        self.model
            .parent(node.id)
            .is_some_and(|p| p.kind == NodeKind::Function && p.children.last() == Some(&node.id))
    }

    fn open_scope(&mut self, kind: ScopeKind, node: NodeId, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.table.scopes.len() as u32);
        self.table.scopes.push(Scope {
            id,
            kind,
            node,
            parent,
            symbols: Vec::new(),
            by_name: FxHashMap::default(),
        });
        self.table.scope_opened_by.insert(node, id);
        id
    }

    fn declare_symbol(&mut self, node: &Node, kind: SymbolKind, scope: ScopeId) {
        let Some(name) = node.name.as_deref().filter(|n| !n.is_empty()) else {
            return;
        };

        // Redeclaration in the same scope rebinds the first symbol
        if let Some(existing) = self.table.scopes[scope.0 as usize].get(name) {
            self.table.declared_by.insert(node.id, existing);
            self.table.symbols[existing.0 as usize]
                .references
                .push(Reference {
                    node: node.id,
                    access: Access::Write,
                });
            return;
        }

        let declared_type = match kind {
            SymbolKind::Class => Some(name.to_string()),
            SymbolKind::Function => node.attrs.return_type.clone(),
            _ => node.attrs.type_name.clone(),
        };
        let id = SymbolId(self.table.symbols.len() as u32);
        self.table.symbols.push(Symbol {
            id,
            name: name.to_string(),
            kind,
            declaration: node.id,
            scope,
            declared_type,
            references: Vec::new(),
            accessor_calls: Vec::new(),
        });
        let scope = &mut self.table.scopes[scope.0 as usize];
        scope.symbols.push(id);
        scope.by_name.insert(name.to_string(), id);
        self.table.declared_by.insert(node.id, id);
    }

    // ---- references ---------------------------------------------------

    fn bind(&mut self) {
        let model = self.model;
        for node in model.descendants(model.root()) {
            match node.kind {
                NodeKind::Identifier => self.bind_identifier(node),
                NodeKind::Expression => match node.expression {
                    Some(ExprKind::Member) => self.bind_member(node),
                    Some(ExprKind::Call) => self.bind_call(node),
                    _ => {}
                },
                _ => {}
            }
        }
    }

    fn bind_identifier(&mut self, node: &Node) {
        let name = node.name_str();
        if name.is_empty() {
            return;
        }
        if is_self_name(name) {
            self.table.resolutions.insert(node.id, Resolution::SelfRef);
            return;
        }

        let Some((symbol, found_in)) = self.lookup_from(node.id, name) else {
            self.table.resolutions.insert(node.id, Resolution::Unresolved);
            self.table.unresolved.push(node.id);
            return;
        };

        let is_write = self.is_write_target(node.id);
        self.add_reference(symbol, node.id, is_write);

        let function = self.table.enclosing_function.get(&node.id).copied();
        let kind = self.table.symbols[symbol.0 as usize].kind;
        let own_member = found_in == ScopeKind::Class
            && function.is_some()
            && matches!(
                kind,
                SymbolKind::Variable | SymbolKind::Constant | SymbolKind::Function
            );

        if own_member {
            self.table
                .resolutions
                .insert(node.id, Resolution::OwnField(Some(symbol)));
            self.table.field_accesses.push(FieldAccess {
                node: node.id,
                function,
                field: name.to_string(),
                symbol: Some(symbol),
                is_call: self.is_callee(node.id),
                is_write,
            });
        } else {
            self.table
                .resolutions
                .insert(node.id, Resolution::Local(symbol));
        }
    }

    fn bind_member(&mut self, node: &Node) {
        let is_call = self.is_callee(node.id);
        let is_write = self.is_write_target(node.id);
        let function = self.table.enclosing_function.get(&node.id).copied();

        match self.classify_member(node.id) {
            Receiver::Own(symbol) => {
                if let Some(s) = symbol {
                    self.add_reference(s, node.id, is_write);
                }
                self.table
                    .resolutions
                    .insert(node.id, Resolution::OwnField(symbol));
                self.table.field_accesses.push(FieldAccess {
                    node: node.id,
                    function,
                    field: node.name_str().to_string(),
                    symbol,
                    is_call,
                    is_write,
                });
            }
            Receiver::Foreign {
                root,
                root_name,
                depth,
                receiver,
            } => {
                let index = self.table.foreign_accesses.len();
                self.table.foreign_accesses.push(ForeignAccess {
                    node: node.id,
                    function,
                    root,
                    root_name,
                    member: node.name_str().to_string(),
                    is_call,
                    is_write,
                    depth,
                    receiver,
                    chain_end: true,
                });
                self.table.foreign_by_node.insert(node.id, index);
                if let Some(r) = root {
                    self.table.symbols[r.0 as usize].accessor_calls.push(index);
                }
                self.table
                    .resolutions
                    .insert(node.id, Resolution::ForeignAccessor { depth });
            }
        }
    }

    fn bind_call(&mut self, node: &Node) {
        let Some(callee) = self.model.child(node.id, 0) else {
            return;
        };
        let target = match callee.kind {
            NodeKind::Identifier => {
                let name = callee.name_str();
                match self.lookup_from(callee.id, name) {
                    Some((s, _)) if self.symbol_kind(s) == SymbolKind::Function => {
                        Callee::Resolved(self.table.symbols[s.0 as usize].declaration)
                    }
                    _ => Callee::Named(name.to_string()),
                }
            }
            NodeKind::Expression if callee.expression == Some(ExprKind::Member) => {
                let method = callee.name_str();
                match self.classify_member(callee.id) {
                    Receiver::Own(Some(s)) if self.symbol_kind(s) == SymbolKind::Function => {
                        Callee::Resolved(self.table.symbols[s.0 as usize].declaration)
                    }
                    Receiver::Foreign {
                        root: Some(root),
                        depth: 1,
                        ..
                    } => self
                        .method_of_type(root, method)
                        .map(Callee::Resolved)
                        .unwrap_or_else(|| Callee::Named(method.to_string())),
                    _ => Callee::Named(method.to_string()),
                }
            }
            _ => return,
        };

        self.table.calls.push(CallEdge {
            call: node.id,
            caller: self.table.enclosing_function.get(&node.id).copied(),
            callee: target,
        });
    }

    /// Classify a Member node by walking down its receiver chain
    fn classify_member(&self, member: NodeId) -> Receiver {
        let foreign_root = |root, root_name| Receiver::Foreign {
            root,
            root_name,
            depth: 1,
            receiver: None,
        };

        let Some(object) = self.model.child(member, 0) else {
            return foreign_root(None, None);
        };

        if object.kind == NodeKind::Identifier {
            let name = object.name_str();
            if is_self_name(name) {
                let field = self.model.node(member).map(|m| m.name_str()).unwrap_or("");
                return Receiver::Own(self.class_member(member, field));
            }
            let root = self.lookup_from(object.id, name).map(|(s, _)| s);
            return foreign_root(root, Some(name.to_string()));
        }

        let inner = if object.expression == Some(ExprKind::Member) {
            Some(object)
        } else if object.expression == Some(ExprKind::Call) {
            self.model
                .child(object.id, 0)
                .filter(|c| c.is_expression(ExprKind::Member))
        } else {
            None
        };

        match inner {
            Some(inner) => match self.classify_member(inner.id) {
                Receiver::Own(symbol) => foreign_root(symbol, Some(inner.name_str().to_string())),
                Receiver::Foreign {
                    root,
                    root_name,
                    depth,
                    ..
                } => Receiver::Foreign {
                    root,
                    root_name,
                    depth: depth + 1,
                    receiver: Some(inner.id),
                },
            },
            None => foreign_root(None, None),
        }
    }

    /// Member declared by the class enclosing `node`
    fn class_member(&self, node: NodeId, name: &str) -> Option<SymbolId> {
        let mut scope = self.table.scope_of.get(&node).copied();
        while let Some(id) = scope {
            let s = &self.table.scopes[id.0 as usize];
            if s.kind == ScopeKind::Class {
                return s.get(name);
            }
            scope = s.parent;
        }
        None
    }

    /// Method `name` of the class named by a symbol's declared type
    fn method_of_type(&self, symbol: SymbolId, name: &str) -> Option<NodeId> {
        let type_name = self.table.symbols[symbol.0 as usize]
            .declared_type
            .as_deref()?;
        let class = self
            .table
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Class && s.name == type_name)?;
        let scope = self.table.scope_opened_by.get(&class.declaration)?;
        let method = self.table.scopes[scope.0 as usize].get(name)?;
        let method = &self.table.symbols[method.0 as usize];
        (method.kind == SymbolKind::Function).then_some(method.declaration)
    }

    fn lookup_from(&self, node: NodeId, name: &str) -> Option<(SymbolId, ScopeKind)> {
        let mut scope = self.table.scope_of.get(&node).copied();
        while let Some(id) = scope {
            let s = &self.table.scopes[id.0 as usize];
            if let Some(symbol) = s.get(name) {
                return Some((symbol, s.kind));
            }
            scope = s.parent;
        }
        None
    }

    fn symbol_kind(&self, id: SymbolId) -> SymbolKind {
        self.table.symbols[id.0 as usize].kind
    }

    fn add_reference(&mut self, symbol: SymbolId, node: NodeId, is_write: bool) {
        let access = if is_write { Access::Write } else { Access::Read };
        self.table.symbols[symbol.0 as usize]
            .references
            .push(Reference { node, access });
    }

    fn is_callee(&self, node: NodeId) -> bool {
        self.model
            .parent(node)
            .is_some_and(|p| p.is_expression(ExprKind::Call))
            && self.model.child_index(node) == Some(0)
    }

    /// Assignment target, possibly through indexing (`a[i] = v` writes `a`)
    fn is_write_target(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            let Some(parent) = self.model.parent(current) else {
                return false;
            };
            let first = self.model.child_index(current) == Some(0);
            if parent.is_statement(StatementKind::Assign) {
                return first;
            }
            if parent.is_expression(ExprKind::Unary) {
                return matches!(parent.operator.as_deref(), Some("++" | "--"));
            }
            if parent.is_expression(ExprKind::Index) && first {
                current = parent.id;
                continue;
            }
            return false;
        }
    }

    fn finish(&mut self) {
        let model = self.model;
        let start = |id: NodeId| model.node(id).map(|n| n.span.start()).unwrap_or((0, 0));
        for symbol in &mut self.table.symbols {
            symbol.references.sort_by_key(|r| start(r.node));
            symbol.references.dedup();
        }

        let receivers: FxHashSet<NodeId> = self
            .table
            .foreign_accesses
            .iter()
            .filter_map(|a| a.receiver)
            .collect();
        for access in &mut self.table.foreign_accesses {
            access.chain_end = !receivers.contains(&access.node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ModelBuilder;

    #[test]
    fn test_hoisting_and_duplicate_declarations() {
        let mut b = ModelBuilder::new("scopes.py");
        let module = b.module("scopes");
        let f = b.function(module, "run");
        let body = b.block(f);
        let ret = b.statement(body, StatementKind::Return);
        let use_site = b.ident(ret, "total");
        b.var_decl(body, "total");
        b.var_decl(body, "total");
        let model = b.build().unwrap();

        let table = resolve(&model);
        let Some(Resolution::Local(sym)) = table.resolution(use_site) else {
            panic!("total should resolve locally");
        };
        let symbol = table.symbol(sym).unwrap();
        assert_eq!(symbol.kind, SymbolKind::Variable);
        assert_eq!(symbol.reads().count(), 1);
        assert_eq!(symbol.writes().count(), 1);
        let function_scope = table.scope_opened_by(f).unwrap();
        assert_eq!(function_scope.symbols.len(), 1);
    }

    #[test]
    fn test_foreign_chain_depth() {
        let mut b = ModelBuilder::new("chain.py");
        let module = b.module("chain");
        let f = b.function(module, "city_of");
        b.parameter(f, "order", Some("Order"));
        let body = b.block(f);
        let stmt = b.statement(body, StatementKind::Expression);
        let (_, outer) = b.chained_call(stmt, "getCity");
        let inner_call = b.method_call(outer, "order", "getAddress");
        let model = b.build().unwrap();

        let table = resolve(&model);
        let inner_member = model.child(inner_call, 0).unwrap().id;
        let outer_access = table.foreign_access_at(outer).unwrap();
        let inner_access = table.foreign_access_at(inner_member).unwrap();

        assert_eq!(outer_access.depth, 2);
        assert_eq!(inner_access.depth, 1);
        assert_eq!(outer_access.receiver, Some(inner_member));
        assert!(outer_access.chain_end);
        assert!(!inner_access.chain_end);
        assert!(outer_access.is_call);

        let root = table.symbol(outer_access.root.unwrap()).unwrap();
        assert_eq!(root.name, "order");
        assert_eq!(root.declared_type.as_deref(), Some("Order"));
        assert_eq!(root.accessor_calls.len(), 2);
        assert_eq!(
            table.resolution(outer),
            Some(Resolution::ForeignAccessor { depth: 2 })
        );
    }

    #[test]
    fn test_own_fields_and_call_edges() {
        let mut b = ModelBuilder::new("account.py");
        let module = b.module("account");
        let class = b.class(module, "Account");
        b.var_decl(class, "balance");

        let deposit = b.function(class, "deposit");
        b.parameter(deposit, "amount", None);
        let body = b.block(deposit);
        let assign = b.statement(body, StatementKind::Assign);
        let target = b.member(assign, "balance");
        b.ident(target, "self");
        b.ident(assign, "amount");

        let audit = b.function(class, "audit");
        let body = b.block(audit);
        let stmt = b.statement(body, StatementKind::Expression);
        b.method_call(stmt, "self", "deposit");
        let stmt = b.statement(body, StatementKind::Expression);
        let log_call = b.call(stmt, "log");

        let main = b.function(module, "main");
        b.parameter(main, "acct", Some("Account"));
        let body = b.block(main);
        let stmt = b.statement(body, StatementKind::Expression);
        b.method_call(stmt, "acct", "deposit");
        let model = b.build().unwrap();

        let table = resolve(&model);
        let write = table
            .field_accesses_in(deposit)
            .find(|a| a.field == "balance")
            .unwrap();
        assert!(write.is_write);
        let balance = table.symbol(write.symbol.unwrap()).unwrap();
        assert_eq!(balance.writes().count(), 1);

        let callers: Vec<Option<NodeId>> = table.callers_of(deposit).map(|c| c.caller).collect();
        assert_eq!(callers, vec![Some(audit), Some(main)]);

        let log_ident = model.child(log_call, 0).unwrap().id;
        assert!(table.unresolved().contains(&log_ident));
        assert!(table
            .calls_from(audit)
            .any(|c| c.callee == Callee::Named("log".to_string())));
        assert_eq!(table.enclosing_function(target), Some(deposit));
    }
}
