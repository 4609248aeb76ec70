//! Symbol & scope resolution
//!
//! Binds identifiers to declarations, records which members a function
//! reaches through `self` versus through other objects, and links callers
//! to callees within one file. Everything here is id based, like the IR
//! it sits on; the table is built once per file and never mutated.

mod resolver;

pub use resolver::resolve;

use crate::ir::NodeId;
use rustc_hash::FxHashMap;

/// Receivers that denote the current object
pub const SELF_NAMES: &[&str] = &["self", "this", "Self", "me"];

pub fn is_self_name(name: &str) -> bool {
    SELF_NAMES.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Module,
    Class,
    Function,
    Block,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    /// Node that opens the scope
    pub node: NodeId,
    pub parent: Option<ScopeId>,
    /// Direct symbols, in declaration order
    pub symbols: Vec<SymbolId>,
    by_name: FxHashMap<String, SymbolId>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Class,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub node: NodeId,
    pub access: Access,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub declaration: NodeId,
    pub scope: ScopeId,
    /// Type annotation, return type for functions, own name for classes
    pub declared_type: Option<String>,
    /// References in source order
    pub references: Vec<Reference>,
    /// Indexes into [`SymbolTable::foreign_accesses`] rooted at this symbol
    pub accessor_calls: Vec<usize>,
}

impl Symbol {
    pub fn reads(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| r.access == Access::Read)
    }

    pub fn writes(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| r.access == Access::Write)
    }
}

/// How an Identifier or Member node was bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A symbol reached through the lexical scope chain
    Local(SymbolId),
    /// A member of the current object; the symbol is known when the
    /// class declares the member
    OwnField(Option<SymbolId>),
    /// A member reached through another object
    ForeignAccessor { depth: u32 },
    /// The receiver keyword itself
    SelfRef,
    Unresolved,
}

/// `self.x`, `this.x()` and bare class members used inside methods
#[derive(Debug, Clone)]
pub struct FieldAccess {
    pub node: NodeId,
    pub function: Option<NodeId>,
    pub field: String,
    pub symbol: Option<SymbolId>,
    pub is_call: bool,
    pub is_write: bool,
}

/// `obj.x`, `obj.getX()`, `a.getB().getC()`
#[derive(Debug, Clone)]
pub struct ForeignAccess {
    /// The Member node
    pub node: NodeId,
    pub function: Option<NodeId>,
    /// Symbol at the base of the chain, when it resolved
    pub root: Option<SymbolId>,
    /// Name at the base of the chain (`e` in `e.getB().getC()`)
    pub root_name: Option<String>,
    pub member: String,
    pub is_call: bool,
    pub is_write: bool,
    /// Number of member hops from the root, 1 for `e.getX()`
    pub depth: u32,
    /// Inner Member node this access navigates through
    pub receiver: Option<NodeId>,
    /// No further access navigates through this one
    pub chain_end: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// Function declared in the same file
    Resolved(NodeId),
    /// Anything else, kept by name
    Named(String),
}

#[derive(Debug, Clone)]
pub struct CallEdge {
    pub call: NodeId,
    /// Enclosing function, `None` for module-level code
    pub caller: Option<NodeId>,
    pub callee: Callee,
}

/// Resolved symbols for one file
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub(crate) scopes: Vec<Scope>,
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) scope_of: FxHashMap<NodeId, ScopeId>,
    pub(crate) scope_opened_by: FxHashMap<NodeId, ScopeId>,
    pub(crate) declared_by: FxHashMap<NodeId, SymbolId>,
    pub(crate) resolutions: FxHashMap<NodeId, Resolution>,
    pub(crate) field_accesses: Vec<FieldAccess>,
    pub(crate) foreign_accesses: Vec<ForeignAccess>,
    pub(crate) foreign_by_node: FxHashMap<NodeId, usize>,
    pub(crate) calls: Vec<CallEdge>,
    pub(crate) enclosing_function: FxHashMap<NodeId, NodeId>,
    pub(crate) unresolved: Vec<NodeId>,
}

impl SymbolTable {
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0 as usize)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0 as usize)
    }

    /// Scope a node sits in (for scope-opening nodes, the outer scope)
    pub fn scope_of(&self, node: NodeId) -> Option<&Scope> {
        self.scope_of.get(&node).and_then(|s| self.scope(*s))
    }

    /// Scope opened by a Module, Class, Function, Lambda or block node
    pub fn scope_opened_by(&self, node: NodeId) -> Option<&Scope> {
        self.scope_opened_by.get(&node).and_then(|s| self.scope(*s))
    }

    /// Symbol introduced by a declaration node
    pub fn declared_by(&self, node: NodeId) -> Option<&Symbol> {
        self.declared_by.get(&node).and_then(|s| self.symbol(*s))
    }

    pub fn resolution(&self, node: NodeId) -> Option<Resolution> {
        self.resolutions.get(&node).copied()
    }

    /// Symbol a node refers to, through scope lookup or an own member
    pub fn referenced_symbol(&self, node: NodeId) -> Option<&Symbol> {
        match self.resolution(node)? {
            Resolution::Local(s) | Resolution::OwnField(Some(s)) => self.symbol(s),
            _ => None,
        }
    }

    /// Look a name up through the scope chain starting at `scope`
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = self.scope(scope);
        while let Some(s) = current {
            if let Some(id) = s.get(name) {
                return self.symbol(id);
            }
            current = s.parent.and_then(|p| self.scope(p));
        }
        None
    }

    pub fn field_accesses(&self) -> &[FieldAccess] {
        &self.field_accesses
    }

    pub fn foreign_accesses(&self) -> &[ForeignAccess] {
        &self.foreign_accesses
    }

    pub fn foreign_access_at(&self, node: NodeId) -> Option<&ForeignAccess> {
        self.foreign_by_node
            .get(&node)
            .and_then(|i| self.foreign_accesses.get(*i))
    }

    pub fn field_accesses_in(&self, function: NodeId) -> impl Iterator<Item = &FieldAccess> {
        self.field_accesses
            .iter()
            .filter(move |a| a.function == Some(function))
    }

    pub fn foreign_accesses_in(&self, function: NodeId) -> impl Iterator<Item = &ForeignAccess> {
        self.foreign_accesses
            .iter()
            .filter(move |a| a.function == Some(function))
    }

    pub fn calls(&self) -> &[CallEdge] {
        &self.calls
    }

    pub fn calls_from(&self, function: NodeId) -> impl Iterator<Item = &CallEdge> {
        self.calls.iter().filter(move |c| c.caller == Some(function))
    }

    pub fn callers_of(&self, function: NodeId) -> impl Iterator<Item = &CallEdge> {
        self.calls
            .iter()
            .filter(move |c| c.callee == Callee::Resolved(function))
    }

    /// Innermost Function enclosing a node
    pub fn enclosing_function(&self, node: NodeId) -> Option<NodeId> {
        self.enclosing_function.get(&node).copied()
    }

    /// Identifier nodes with no matching declaration
    pub fn unresolved(&self) -> &[NodeId] {
        &self.unresolved
    }
}
