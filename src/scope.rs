//! # Symbol Table
//!
//! Lexical scopes live in an arena indexed by [`ScopeId`]. Each scope stores its
//! parent handle and its child handles, so the tree can be walked both ways
//! without ownership cycles. The table keeps every scope it ever created for
//! inspection after a pass; only the *current* pointer moves.
//!
//! ## Invariants
//!
//! 1. **Single root**: scope `0` is `Global`, has no parent and is seeded with
//!    the built-ins table before any user symbol is defined.
//! 2. **Unique names per scope**: a second definition in the same scope is a
//!    [`RedefinitionError`]. The same name in a child scope shadows.
//! 3. **Stack discipline**: `current` only moves to a new child
//!    ([`SymbolTable::enter_scope`]) or to its parent
//!    ([`SymbolTable::exit_scope`]). Exiting `Global` is a [`ScopeError`].

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

use crate::ast::Position;

// ═══════════════════════════════════════════════════════════════════════════════
// SYMBOLS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolKind {
    Property,
    State,
    Component,
    Function,
    Variable,
    Parameter,
    Import,
    BuiltIn,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Property => "property",
            SymbolKind::State => "state",
            SymbolKind::Component => "component",
            SymbolKind::Function => "function",
            SymbolKind::Variable => "variable",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Import => "import",
            SymbolKind::BuiltIn => "built-in",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Declared type as written, `any` when omitted.
    pub ty: String,
    /// `None` for built-ins.
    pub position: Option<Position>,
    /// Set for `const` variables.
    pub constant: bool,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        ty: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            ty: ty.into(),
            position: Some(position),
            constant: false,
        }
    }

    pub fn builtin(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::BuiltIn,
            ty: ty.into(),
            position: None,
            constant: true,
        }
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILT-INS
// ═══════════════════════════════════════════════════════════════════════════════

const PRIMITIVE_TYPES: &[&str] = &[
    "string", "number", "boolean", "object", "array", "void", "any",
];

const BUILTIN_CALLABLES: &[(&str, &str)] = &[
    ("console", "object"),
    ("log", "function"),
    ("Math", "object"),
    ("min", "function"),
    ("max", "function"),
    ("abs", "function"),
    ("floor", "function"),
    ("ceil", "function"),
    ("round", "function"),
    ("random", "function"),
    ("parseInt", "function"),
    ("parseFloat", "function"),
    ("String", "function"),
    ("Number", "function"),
    ("JSON", "object"),
    ("Date", "function"),
    ("setTimeout", "function"),
    ("clearTimeout", "function"),
    ("fetch", "function"),
    ("navigate", "function"),
];

/// Read-only table copied into every fresh `Global` scope. Share it across
/// compilations behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Builtins {
    symbols: Vec<Symbol>,
}

impl Builtins {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    /// Primitive type names plus the standard callables.
    pub fn standard() -> Self {
        let types = PRIMITIVE_TYPES
            .iter()
            .map(|name| Symbol::builtin(*name, "type"));
        let callables = BUILTIN_CALLABLES
            .iter()
            .map(|(name, ty)| Symbol::builtin(*name, *ty));
        Self::new(types.chain(callables).collect())
    }

    pub fn with(mut self, symbol: Symbol) -> Self {
        self.symbols.push(symbol);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.iter().any(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::standard()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScopeKind {
    Global,
    Document,
    Function,
    Block,
    Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub name: String,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    symbols: IndexMap<String, Symbol>,
}

impl Scope {
    fn new(id: ScopeId, kind: ScopeKind, name: String, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            kind,
            name,
            parent,
            children: Vec::new(),
            symbols: IndexMap::new(),
        }
    }

    /// Lookup within this scope only.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Symbols in definition order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Error)]
#[error("'{name}' is already defined in this scope")]
pub struct RedefinitionError {
    pub name: String,
    pub scope: ScopeId,
    /// Where the existing definition lives, if it has a position.
    pub previous: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("cannot exit the global scope")]
    ExitGlobal,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SYMBOL TABLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
    components: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub const GLOBAL: ScopeId = ScopeId(0);

    pub fn new(builtins: &Builtins) -> Self {
        let mut global = Scope::new(Self::GLOBAL, ScopeKind::Global, "global".into(), None);
        for symbol in builtins.iter() {
            // Later entries of a custom table win over earlier ones.
            global.symbols.insert(symbol.name.clone(), symbol.clone());
        }
        Self {
            scopes: vec![global],
            current: Self::GLOBAL,
            components: IndexMap::new(),
        }
    }

    /// Inserts into the current scope. Ancestors are not consulted.
    pub fn define(&mut self, symbol: Symbol) -> Result<(), RedefinitionError> {
        self.define_in(self.current, symbol)
    }

    fn define_in(&mut self, id: ScopeId, symbol: Symbol) -> Result<(), RedefinitionError> {
        let scope = &mut self.scopes[id.index()];
        if let Some(existing) = scope.symbols.get(&symbol.name) {
            return Err(RedefinitionError {
                name: symbol.name,
                scope: id,
                previous: existing.position.clone(),
            });
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Registers a document-level component in the component map and in
    /// `Global`, so `lookup_recursive` finds it from anywhere.
    pub fn define_component(&mut self, symbol: Symbol) -> Result<(), RedefinitionError> {
        self.define_in(Self::GLOBAL, symbol.clone())?;
        self.components.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    pub fn component(&self, name: &str) -> Option<&Symbol> {
        self.components.get(name)
    }

    pub fn components(&self) -> impl Iterator<Item = &Symbol> {
        self.components.values()
    }

    /// Current scope only.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.current_scope().get(name)
    }

    /// Current scope, then each ancestor up to `Global`. Inner scopes shadow.
    pub fn lookup_recursive(&self, name: &str) -> Option<&Symbol> {
        self.resolve(name).map(|(_, symbol)| symbol)
    }

    /// Like [`lookup_recursive`](Self::lookup_recursive), also returning the
    /// scope that holds the definition.
    pub fn resolve(&self, name: &str) -> Option<(ScopeId, &Symbol)> {
        self.ancestors(self.current)
            .find_map(|scope| scope.get(name).map(|symbol| (scope.id, symbol)))
    }

    /// Resolution starting above the current scope, used to detect shadowing.
    pub fn lookup_outer(&self, name: &str) -> Option<&Symbol> {
        self.ancestors(self.current)
            .skip(1)
            .find_map(|scope| scope.get(name))
    }

    pub fn enter_scope(&mut self, kind: ScopeKind, name: impl Into<String>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes
            .push(Scope::new(id, kind, name.into(), Some(self.current)));
        self.scopes[self.current.index()].children.push(id);
        self.current = id;
        id
    }

    pub fn exit_scope(&mut self) -> Result<(), ScopeError> {
        match self.current_scope().parent {
            Some(parent) => {
                self.current = parent;
                Ok(())
            }
            None => Err(ScopeError::ExitGlobal),
        }
    }

    /// Enters a child scope that is exited when the guard drops, on every
    /// path out of the caller.
    pub fn scoped(&mut self, kind: ScopeKind, name: impl Into<String>) -> ScopeGuard<'_> {
        let parent = self.current;
        let id = self.enter_scope(kind, name);
        ScopeGuard {
            table: self,
            parent,
            id,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn current_scope(&self) -> &Scope {
        &self.scopes[self.current.index()]
    }

    pub fn global(&self) -> &Scope {
        &self.scopes[Self::GLOBAL.index()]
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.index())
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    /// Number of scopes between the current one and `Global`.
    pub fn depth(&self) -> usize {
        self.ancestors(self.current).count() - 1
    }

    /// `id` followed by its parent chain up to `Global`.
    pub fn ancestors(&self, id: ScopeId) -> impl Iterator<Item = &Scope> {
        let mut next = self.scopes.get(id.index());
        std::iter::from_fn(move || {
            let scope = next?;
            next = scope.parent.and_then(|p| self.scopes.get(p.index()));
            Some(scope)
        })
    }
}

/// RAII scope entry returned by [`SymbolTable::scoped`].
///
/// Dropping the guard restores the scope that was current when it was
/// created, even if nested scopes were left unbalanced inside it.
pub struct ScopeGuard<'t> {
    table: &'t mut SymbolTable,
    parent: ScopeId,
    id: ScopeId,
}

impl ScopeGuard<'_> {
    pub fn id(&self) -> ScopeId {
        self.id
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = SymbolTable;

    fn deref(&self) -> &SymbolTable {
        self.table
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut SymbolTable {
        self.table
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.table.current = self.parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32) -> Position {
        Position::new("scope.jml", line, 1)
    }

    fn table() -> SymbolTable {
        SymbolTable::new(&Builtins::standard())
    }

    #[test]
    fn test_builtins_seeded_into_global() {
        let table = table();
        let string = table.lookup("string").expect("primitive type");
        assert_eq!(string.kind, SymbolKind::BuiltIn);
        assert!(string.position.is_none());
        assert!(table.lookup("console").is_some());
        assert_eq!(table.current(), SymbolTable::GLOBAL);
        assert!(table.global().parent.is_none());
    }

    #[test]
    fn test_inner_definition_shadows_outer() {
        let mut table = table();
        table
            .define(Symbol::new("x", SymbolKind::Variable, "number", pos(1)))
            .unwrap();
        table.enter_scope(ScopeKind::Function, "f");
        table
            .define(Symbol::new("x", SymbolKind::Parameter, "string", pos(2)))
            .unwrap();

        let found = table.lookup_recursive("x").unwrap();
        assert_eq!(found.kind, SymbolKind::Parameter);
        assert_eq!(found.position, Some(pos(2)));

        table.exit_scope().unwrap();
        assert_eq!(table.lookup_recursive("x").unwrap().kind, SymbolKind::Variable);
    }

    #[test]
    fn test_redefinition_in_same_scope_fails() {
        let mut table = table();
        table.enter_scope(ScopeKind::Document, "Home");
        table
            .define(Symbol::new("count", SymbolKind::State, "number", pos(1)))
            .unwrap();
        let err = table
            .define(Symbol::new("count", SymbolKind::Variable, "any", pos(2)))
            .unwrap_err();
        assert_eq!(err.name, "count");
        assert_eq!(err.previous, Some(pos(1)));
        // the original survives
        assert_eq!(table.lookup("count").unwrap().kind, SymbolKind::State);

        table.enter_scope(ScopeKind::Block, "block");
        assert!(table
            .define(Symbol::new("count", SymbolKind::Variable, "any", pos(3)))
            .is_ok());
    }

    #[test]
    fn test_lookup_is_current_scope_only() {
        let mut table = table();
        table.enter_scope(ScopeKind::Document, "Home");
        assert!(table.lookup("console").is_none());
        assert!(table.lookup_recursive("console").is_some());
    }

    #[test]
    fn test_balanced_enter_exit_restores_current() {
        let mut table = table();
        let doc = table.enter_scope(ScopeKind::Document, "Home");
        for _ in 0..3 {
            table.enter_scope(ScopeKind::Block, "block");
        }
        for _ in 0..3 {
            table.exit_scope().unwrap();
        }
        assert_eq!(table.current(), doc);
        table.exit_scope().unwrap();
        assert_eq!(table.current(), SymbolTable::GLOBAL);
    }

    #[test]
    fn test_exit_past_global_errors_and_stays() {
        let mut table = table();
        assert_eq!(table.exit_scope(), Err(ScopeError::ExitGlobal));
        assert_eq!(table.current(), SymbolTable::GLOBAL);
    }

    #[test]
    fn test_scope_tree_retained_after_exit() {
        let mut table = table();
        let doc = table.enter_scope(ScopeKind::Document, "Home");
        let func = table.enter_scope(ScopeKind::Function, "go");
        table.exit_scope().unwrap();
        table.exit_scope().unwrap();

        assert_eq!(table.scopes().count(), 3);
        assert_eq!(table.global().children, vec![doc]);
        let doc_scope = table.scope(doc).unwrap();
        assert_eq!(doc_scope.children, vec![func]);
        assert_eq!(table.scope(func).unwrap().parent, Some(doc));
    }

    #[test]
    fn test_guard_exits_on_early_return() {
        fn define_until_clash(table: &mut SymbolTable) -> Result<(), RedefinitionError> {
            let mut guard = table.scoped(ScopeKind::Function, "f");
            guard.define(Symbol::new("a", SymbolKind::Parameter, "any", pos(1)))?;
            guard.enter_scope(ScopeKind::Block, "unbalanced");
            guard.define(Symbol::new("b", SymbolKind::Variable, "any", pos(2)))?;
            guard.define(Symbol::new("b", SymbolKind::Variable, "any", pos(3)))?;
            Ok(())
        }

        let mut table = table();
        let doc = table.enter_scope(ScopeKind::Document, "Home");
        assert!(define_until_clash(&mut table).is_err());
        assert_eq!(table.current(), doc);
        assert_eq!(table.depth(), 1);
    }

    #[test]
    fn test_define_component_visible_everywhere() {
        let mut table = table();
        table.enter_scope(ScopeKind::Document, "Card");
        table
            .define_component(Symbol::new("Card", SymbolKind::Component, "component", pos(1)))
            .unwrap();
        table.enter_scope(ScopeKind::Element, "View");

        assert_eq!(table.component("Card").unwrap().kind, SymbolKind::Component);
        assert!(table.global().get("Card").is_some());
        assert_eq!(
            table.lookup_recursive("Card").unwrap().kind,
            SymbolKind::Component
        );
        assert!(table
            .define_component(Symbol::new("Card", SymbolKind::Component, "component", pos(2)))
            .is_err());
    }

    #[test]
    fn test_resolve_reports_defining_scope() {
        let mut table = table();
        let doc = table.enter_scope(ScopeKind::Document, "Home");
        table
            .define(Symbol::new("title", SymbolKind::Property, "string", pos(1)))
            .unwrap();
        table.enter_scope(ScopeKind::Element, "View");
        let (scope, symbol) = table.resolve("title").unwrap();
        assert_eq!(scope, doc);
        assert_eq!(symbol.kind, SymbolKind::Property);
        assert!(table.lookup_outer("title").is_some());
    }
}
