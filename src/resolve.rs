//! Scope Resolution Pass
//!
//! Walks one document, registers every declaration in the scope tree and
//! resolves every identifier reference against it. Findings are collected as
//! diagnostics; only a scope-discipline violation aborts the pass.
//!
//! ## Rules
//!
//! 1. Document-level names (props, state, variables, functions, exports) are
//!    hoisted before anything is resolved, so functions may refer to each
//!    other regardless of order.
//! 2. Block-level declarations are visible from their declaration onward.
//!    A variable's initializer is resolved before the name is bound.
//! 3. Redefinition in the same scope is an error; shadowing an outer name is
//!    reported as info.
//! 4. Only state, parameters and non-constant variables may be assigned.
//! 5. Element tags must name a default import, a registry component or the
//!    document itself, in that order of precedence. Registry components get
//!    their attributes validated.
//! 6. Relative imports are checked against the project index when one is
//!    given; external package imports are bound unchecked.
//! 7. A page has exactly one root element; a component at most one.

use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::ast::*;
use crate::diagnostic::*;
use crate::discovery::{resolve_import, ProjectIndex};
use crate::registry::{ComponentRegistry, PropValue};
use crate::scope::{Builtins, ScopeId, ScopeKind, Symbol, SymbolKind, SymbolTable};
use crate::visitor::{AstNode, Visitor};

const ORIGIN: &str = "resolver";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("unbalanced scopes in {file}: expected to leave {expected:?}, current is {found:?}")]
    Unbalanced {
        file: PathBuf,
        expected: ScopeId,
        found: ScopeId,
    },
}

/// Outcome of a successful pass. The table keeps the whole scope tree.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub table: SymbolTable,
    pub diagnostics: Diagnostics,
}

pub struct Resolver<'a> {
    table: SymbolTable,
    cx: ResolveState<'a>,
}

/// Everything the pass tracks besides the scope tree.
struct ResolveState<'a> {
    registry: &'a ComponentRegistry,
    index: Option<&'a ProjectIndex>,
    diagnostics: Diagnostics,
    file: PathBuf,
    loop_depth: usize,
    imports: Vec<Identifier>,
    used_imports: HashSet<String>,
    fatal: Option<ResolveError>,
}

/// The visitor proper. Nested scopes get a pass whose table is borrowed
/// through a [`ScopeGuard`](crate::scope::ScopeGuard), so leaving the
/// closure always restores the enclosing scope.
struct ResolvePass<'r, 'a> {
    table: &'r mut SymbolTable,
    cx: &'r mut ResolveState<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(builtins: &Builtins, registry: &'a ComponentRegistry) -> Self {
        Self {
            table: SymbolTable::new(builtins),
            cx: ResolveState {
                registry,
                index: None,
                diagnostics: Diagnostics::new(),
                file: PathBuf::new(),
                loop_depth: 0,
                imports: Vec::new(),
                used_imports: HashSet::new(),
                fatal: None,
            },
        }
    }

    /// Checks relative imports against discovered documents. Without an
    /// index imports are bound unchecked.
    pub fn with_index(mut self, index: &'a ProjectIndex) -> Self {
        self.cx.index = Some(index);
        self
    }

    pub fn resolve(mut self, document: &Document) -> Result<Resolution, ResolveError> {
        self.cx.file = document.path.clone();
        tracing::debug!(file = %self.cx.file.display(), name = %document.name.name, "resolving document");

        document.accept(&mut ResolvePass {
            table: &mut self.table,
            cx: &mut self.cx,
        });

        if let Some(error) = self.cx.fatal {
            return Err(error);
        }
        if self.table.current() != SymbolTable::GLOBAL {
            return Err(ResolveError::Unbalanced {
                file: self.cx.file,
                expected: SymbolTable::GLOBAL,
                found: self.table.current(),
            });
        }

        tracing::debug!(
            file = %self.cx.file.display(),
            scopes = self.table.scopes().count(),
            errors = self.cx.diagnostics.error_count(),
            "resolution finished"
        );
        Ok(Resolution {
            table: self.table,
            diagnostics: self.cx.diagnostics,
        })
    }
}

impl<'a> ResolvePass<'_, 'a> {
    // ═══════════════════════════════════════════════════════════════════════════
    // SCOPE HELPERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Runs `f` inside a fresh child scope. The scope is left when the guard
    /// drops; anything `f` left open beneath it is recorded as fatal.
    fn with_scope(&mut self, kind: ScopeKind, name: &str, f: impl FnOnce(&mut ResolvePass<'_, 'a>)) {
        if self.cx.fatal.is_some() {
            return;
        }
        let mut scope = self.table.scoped(kind, name);
        let id = scope.id();
        let mut inner = ResolvePass {
            table: &mut *scope,
            cx: &mut *self.cx,
        };
        f(&mut inner);

        let found = inner.table.current();
        if found != id && inner.cx.fatal.is_none() {
            inner.cx.fatal = Some(ResolveError::Unbalanced {
                file: inner.cx.file.clone(),
                expected: id,
                found,
            });
        }
    }

    /// Runs `f` outside any loop, as inside a function body.
    fn outside_loops(&mut self, f: impl FnOnce(&mut Self)) {
        let saved = std::mem::replace(&mut self.cx.loop_depth, 0);
        f(self);
        self.cx.loop_depth = saved;
    }

    fn declare(&mut self, symbol: Symbol) {
        let name = symbol.name.clone();
        let position = symbol.position.clone();
        let shadows = self.table.lookup_outer(&name).is_some();

        match self.table.define(symbol) {
            Ok(()) => {
                if shadows {
                    if let Some(position) = position {
                        self.cx.diagnostics.push(Diagnostic::info(
                            INFO_SHADOWED,
                            format!("'{}' shadows an outer declaration", name),
                            position,
                            ORIGIN,
                        ));
                    }
                }
            }
            Err(err) => self.redefinition(err.to_string(), err.previous, position),
        }
    }

    fn redefinition(&mut self, message: String, previous: Option<Position>, at: Option<Position>) {
        let message = match previous {
            Some(previous) => format!("{} (previous definition at {})", message, previous),
            None => message,
        };
        self.cx
            .diagnostics
            .push(Diagnostic::new(Severity::Error, ERR_REDEFINITION, message, at, ORIGIN));
    }

    fn error(&mut self, code: &str, message: String, position: &Position) {
        self.cx
            .diagnostics
            .push(Diagnostic::error(code, message, position.clone(), ORIGIN));
    }

    fn reference(&mut self, ident: &Identifier) {
        match self.table.lookup_recursive(&ident.name) {
            Some(symbol) => {
                if symbol.kind == SymbolKind::Import {
                    self.cx.used_imports.insert(ident.name.clone());
                }
            }
            None => self.error(
                ERR_UNRESOLVED_IDENTIFIER,
                format!("cannot find '{}' in this scope", ident.name),
                &ident.position,
            ),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DOCUMENT LEVEL
    // ═══════════════════════════════════════════════════════════════════════════

    fn declare_import(&mut self, import: &ImportDecl) {
        // External specifiers are bound unchecked.
        let target = self
            .cx
            .index
            .zip(resolve_import(&self.cx.file, &import.source))
            .map(|(index, path)| (index.get(&path).cloned(), path));

        if let Some((None, path)) = &target {
            self.error(
                ERR_IMPORT,
                format!("cannot find '{}' (resolved to {})", import.source, path.display()),
                &import.position,
            );
        }
        let summary = target.and_then(|(summary, _)| summary);

        if let Some(default) = &import.default {
            if let Some(summary) = &summary {
                if summary.kind != DocumentKind::Component {
                    self.error(
                        ERR_IMPORT,
                        format!("'{}' is a {}; only components can be imported", import.source, summary.kind),
                        &default.position,
                    );
                }
            }
            let symbol = Symbol::new(&default.name, SymbolKind::Import, "component", default.position.clone());
            if let Err(err) = self.table.define_component(symbol) {
                self.redefinition(err.to_string(), err.previous, Some(default.position.clone()));
            }
            self.cx.imports.push(default.clone());
        }

        for named in &import.named {
            if let Some(summary) = &summary {
                if !summary.exports_name(&named.name) {
                    self.error(
                        ERR_IMPORT,
                        format!("'{}' is not exported by '{}'", named.name, import.source),
                        &named.position,
                    );
                }
            }
            self.declare(Symbol::new(&named.name, SymbolKind::Import, "any", named.position.clone()));
            self.cx.imports.push(named.clone());
        }
    }

    fn hoist(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Property(prop) => self.declare(Symbol::new(
                &prop.name.name,
                SymbolKind::Property,
                type_name(&prop.ty),
                prop.name.position.clone(),
            )),
            Stmt::State(state) => self.declare(Symbol::new(
                &state.name.name,
                SymbolKind::State,
                type_name(&state.ty),
                state.name.position.clone(),
            )),
            Stmt::Variable(var) => self.declare(variable_symbol(var)),
            Stmt::Function(func) => self.declare(function_symbol(func)),
            Stmt::Export(export) => self.hoist(&export.declaration),
            _ => {}
        }
    }

    fn check_root_elements(&mut self, document: &Document) {
        let roots: Vec<&ComponentElement> = document.root_elements().collect();
        match (document.kind, roots.len()) {
            (DocumentKind::Page, 0) => self.error(
                ERR_ROOT_ELEMENT,
                format!("page '{}' has no root element", document.name.name),
                &document.name.position,
            ),
            (DocumentKind::Page, n) if n > 1 => self.error(
                ERR_ROOT_ELEMENT,
                format!("page '{}' must have exactly one root element, found {}", document.name.name, n),
                &roots[1].position,
            ),
            (DocumentKind::Component, n) if n > 1 => self.error(
                ERR_ROOT_ELEMENT,
                format!("component '{}' may have at most one root element, found {}", document.name.name, n),
                &roots[1].position,
            ),
            _ => {}
        }
    }

    fn report_unused_imports(&mut self) {
        let unused: Vec<Identifier> = self
            .cx
            .imports
            .iter()
            .filter(|ident| !self.cx.used_imports.contains(&ident.name))
            .cloned()
            .collect();
        for ident in unused {
            self.cx.diagnostics.push(Diagnostic::warning(
                WARN_UNUSED_IMPORT,
                format!("'{}' is imported but never used", ident.name),
                ident.position,
                ORIGIN,
            ));
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ELEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn check_tag(&mut self, element: &ComponentElement) {
        let tag = &element.tag;
        let imported = self
            .table
            .component(&tag.name)
            .map_or(false, |symbol| symbol.kind == SymbolKind::Import);
        if imported {
            self.cx.used_imports.insert(tag.name.clone());
            return;
        }

        if self.cx.registry.contains(&tag.name) {
            let properties: Vec<(&str, PropValue<'_>)> = element
                .attributes()
                .map(|attr| (attr.name.name.as_str(), prop_value(&attr.value)))
                .collect();
            for issue in self.cx.registry.validate(&tag.name, &properties) {
                let position = issue
                    .attribute()
                    .and_then(|name| element.attributes().find(|a| a.name.name == name))
                    .map(|attr| attr.position.clone())
                    .unwrap_or_else(|| tag.position.clone());
                self.error(ERR_COMPONENT_ATTRIBUTE, issue.to_string(), &position);
            }
            return;
        }

        if self.table.component(&tag.name).is_none() {
            self.error(
                ERR_UNKNOWN_COMPONENT,
                format!("unknown component '{}'", tag.name),
                &tag.position,
            );
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FUNCTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parameters(&mut self, params: &[Parameter]) {
        for param in params {
            if let Some(default) = &param.default {
                default.accept(self);
            }
            self.declare(Symbol::new(
                &param.name.name,
                SymbolKind::Parameter,
                type_name(&param.ty),
                param.name.position.clone(),
            ));
        }
    }

    fn statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            if self.cx.fatal.is_some() {
                return;
            }
            stmt.accept(self);
        }
    }

    fn at_document_level(&self) -> bool {
        self.table.current_scope().kind == ScopeKind::Document
    }
}

fn type_name(ty: &Option<TypeAnnotation>) -> String {
    ty.as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "any".to_string())
}

fn variable_symbol(var: &VariableDecl) -> Symbol {
    let symbol = Symbol::new(
        &var.name.name,
        SymbolKind::Variable,
        type_name(&var.ty),
        var.name.position.clone(),
    );
    if var.constant {
        symbol.constant()
    } else {
        symbol
    }
}

fn function_symbol(func: &FunctionDecl) -> Symbol {
    Symbol::new(
        &func.name.name,
        SymbolKind::Function,
        "function",
        func.name.position.clone(),
    )
}

fn prop_value(expr: &Expr) -> PropValue<'_> {
    match expr {
        Expr::String(s) => PropValue::String(&s.value),
        Expr::Number(n) => PropValue::Number(n.value),
        Expr::Boolean(b) => PropValue::Boolean(b.value),
        Expr::Null(_) => PropValue::Null,
        _ => PropValue::Dynamic,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAVERSAL
// ═══════════════════════════════════════════════════════════════════════════════

impl Visitor for ResolvePass<'_, '_> {
    fn visit_document(&mut self, node: &Document) {
        let own = Symbol::new(
            &node.name.name,
            SymbolKind::Component,
            node.kind.as_str(),
            node.name.position.clone(),
        );
        if let Err(err) = self.table.define_component(own) {
            self.redefinition(err.to_string(), err.previous, Some(node.name.position.clone()));
        }

        self.with_scope(ScopeKind::Document, &node.name.name, |r| {
            for import in node.imports() {
                r.declare_import(import);
            }
            for stmt in &node.body {
                r.hoist(stmt);
            }
            r.statements(&node.body);
        });

        self.check_root_elements(node);
        self.report_unused_imports();
    }

    fn visit_export(&mut self, node: &ExportDecl) {
        node.declaration.accept(self);
    }

    fn visit_variable(&mut self, node: &VariableDecl) {
        if let Some(init) = &node.init {
            init.accept(self);
        }
        if !self.at_document_level() {
            self.declare(variable_symbol(node));
        }
    }

    fn visit_function(&mut self, node: &FunctionDecl) {
        if !self.at_document_level() {
            self.declare(function_symbol(node));
        }
        self.with_scope(ScopeKind::Function, &node.name.name, |r| {
            r.parameters(&node.params);
            r.outside_loops(|r| r.statements(&node.body.statements));
        });
    }

    fn visit_property(&mut self, node: &PropertyDecl) {
        if let Some(default) = &node.default {
            default.accept(self);
        }
    }

    fn visit_state(&mut self, node: &StateDecl) {
        if let Some(init) = &node.init {
            init.accept(self);
        }
    }

    fn visit_block(&mut self, node: &Block) {
        self.with_scope(ScopeKind::Block, "block", |r| r.statements(&node.statements));
    }

    fn visit_expr_stmt(&mut self, node: &ExprStmt) {
        node.expr.accept(self);
    }

    fn visit_if(&mut self, node: &IfStmt) {
        node.condition.accept(self);
        self.visit_block(&node.then_branch);
        if let Some(else_branch) = &node.else_branch {
            else_branch.accept(self);
        }
    }

    fn visit_for(&mut self, node: &ForStmt) {
        node.iterable.accept(self);
        self.with_scope(ScopeKind::Block, "for", |r| {
            r.declare(Symbol::new(
                &node.binding.name,
                SymbolKind::Variable,
                "any",
                node.binding.position.clone(),
            ));
            r.cx.loop_depth += 1;
            r.statements(&node.body.statements);
            r.cx.loop_depth -= 1;
        });
    }

    fn visit_while(&mut self, node: &WhileStmt) {
        node.condition.accept(self);
        self.cx.loop_depth += 1;
        self.visit_block(&node.body);
        self.cx.loop_depth -= 1;
    }

    fn visit_return(&mut self, node: &ReturnStmt) {
        if let Some(value) = &node.value {
            value.accept(self);
        }
    }

    fn visit_break(&mut self, node: &BreakStmt) {
        if self.cx.loop_depth == 0 {
            self.error(ERR_LOOP_CONTROL, "'break' outside of a loop".into(), &node.position);
        }
    }

    fn visit_continue(&mut self, node: &ContinueStmt) {
        if self.cx.loop_depth == 0 {
            self.error(ERR_LOOP_CONTROL, "'continue' outside of a loop".into(), &node.position);
        }
    }

    fn visit_import(&mut self, _node: &ImportDecl) {
        // Bound up front in `visit_document`.
    }

    fn visit_identifier(&mut self, node: &Identifier) {
        self.reference(node);
    }

    fn visit_array(&mut self, node: &ArrayLiteral) {
        for element in &node.elements {
            element.accept(self);
        }
    }

    fn visit_object(&mut self, node: &ObjectLiteral) {
        for property in &node.properties {
            property.value.accept(self);
        }
    }

    fn visit_binary(&mut self, node: &BinaryExpr) {
        node.left.accept(self);
        node.right.accept(self);
    }

    fn visit_unary(&mut self, node: &UnaryExpr) {
        node.operand.accept(self);
    }

    fn visit_assign(&mut self, node: &AssignExpr) {
        node.value.accept(self);

        let Expr::Identifier(target) = node.target.as_ref() else {
            node.target.accept(self);
            return;
        };
        let Some(symbol) = self.table.lookup_recursive(&target.name) else {
            self.reference(target);
            return;
        };

        let assignable = match symbol.kind {
            SymbolKind::State | SymbolKind::Parameter => true,
            SymbolKind::Variable => !symbol.constant,
            _ => false,
        };
        if !assignable {
            let what = if symbol.constant && symbol.kind == SymbolKind::Variable {
                "constant".to_string()
            } else {
                symbol.kind.to_string()
            };
            let message = format!("cannot assign to {} '{}'", what, target.name);
            self.error(ERR_INVALID_ASSIGNMENT, message, &target.position);
        }
    }

    fn visit_call(&mut self, node: &CallExpr) {
        node.callee.accept(self);
        for argument in &node.arguments {
            argument.accept(self);
        }
    }

    fn visit_member(&mut self, node: &MemberExpr) {
        node.object.accept(self);
    }

    fn visit_index(&mut self, node: &IndexExpr) {
        node.object.accept(self);
        node.index.accept(self);
    }

    fn visit_conditional(&mut self, node: &ConditionalExpr) {
        node.condition.accept(self);
        node.consequent.accept(self);
        node.alternate.accept(self);
    }

    fn visit_arrow(&mut self, node: &ArrowFunction) {
        self.with_scope(ScopeKind::Function, "arrow", |r| {
            r.parameters(&node.params);
            r.outside_loops(|r| match &node.body {
                ArrowBody::Expr(expr) => expr.accept(r),
                ArrowBody::Block(block) => r.statements(&block.statements),
            });
        });
    }

    fn visit_element(&mut self, node: &ComponentElement) {
        self.check_tag(node);
        self.with_scope(ScopeKind::Element, &node.tag.name, |r| {
            for item in &node.body {
                if r.cx.fatal.is_some() {
                    return;
                }
                item.accept(r);
            }
        });
    }

    fn visit_attribute(&mut self, node: &Attribute) {
        node.value.accept(self);
    }
}

/// Resolves `document` with a fresh symbol table.
pub fn resolve_document(
    document: &Document,
    builtins: &Builtins,
    registry: &ComponentRegistry,
    index: Option<&ProjectIndex>,
) -> Result<Resolution, ResolveError> {
    let resolver = Resolver::new(builtins, registry);
    match index {
        Some(index) => resolver.with_index(index).resolve(document),
        None => resolver.resolve(document),
    }
}
