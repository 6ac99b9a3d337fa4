//! # JML Compiler
//!
//! Front end and incremental build orchestrator for JML, a declarative UI
//! markup language compiled to HTML.
//!
//! ## Pipeline
//!
//! 1. **Parse**: a [`Frontend`] turns source text into a generic [`ParseNode`]
//!    tree. Syntax errors become `error` nodes, never panics.
//! 2. **Build**: [`AstBuilder`] converts the tree into a typed [`Document`],
//!    dropping only the statements that contain errors.
//! 3. **Resolve**: [`Resolver`] walks the document with a fresh
//!    [`SymbolTable`] rooted at the shared built-ins, reporting redefinitions,
//!    unresolved names, invalid assignments and unknown components.
//! 4. **Emit**: [`HtmlEmitter`] prints the root element as HTML.
//!
//! [`BuildManager`] runs the pipeline over a project, ordered by the
//! [`DependencyGraph`] and skipping files the [`BuildCache`] proves unchanged.

pub mod ast;
pub mod builder;
pub mod cache;
pub mod config;
pub mod diagnostic;
pub mod discovery;
pub mod emit;
pub mod frontend;
pub mod graph;
pub mod lexer;
pub mod manager;
pub mod parser;
pub mod registry;
pub mod resolve;
pub mod scope;
pub mod visitor;

#[cfg(test)]
mod build_tests;

pub use ast::{Document, DocumentKind, Position, Program};
pub use builder::{build_document, build_program, AstBuilder, BuildOutput};
pub use cache::{BuildCache, CacheError, CacheRecord, ChangeDetection};
pub use config::{BuildConfig, ConfigError};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use discovery::{DocumentSummary, ProjectIndex};
pub use emit::{emit_document, HtmlEmitter};
pub use frontend::{Frontend, JmlFrontend, ParseNode};
pub use graph::{Cycle, DependencyGraph, FileCategory, GraphError};
pub use manager::{BuildError, BuildManager, BuildReport, CompiledFile};
pub use registry::{ComponentDef, ComponentRegistry};
pub use resolve::{resolve_document, Resolution, ResolveError, Resolver};
pub use scope::{Builtins, ScopeId, ScopeKind, Symbol, SymbolKind, SymbolTable};
pub use visitor::{walk, AstNode, Node, Visitor};
