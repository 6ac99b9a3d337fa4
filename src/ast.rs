//! # JML Abstract Syntax Tree
//!
//! Typed node hierarchy for one compile pass. Every node owns its [`Position`]
//! and exclusively owns its children; there are no parent back-references.
//!
//! Nodes are grouped the same way the traversal contract in
//! [`crate::visitor`] groups them:
//!
//! - roots: [`Program`], [`Document`]
//! - declarations: imports, exports, variables, functions, parameters,
//!   properties, state and type annotations
//! - statements: blocks, `if`, `for`, `while`, `return`, `break`, `continue`
//! - expressions
//! - JML elements: [`ComponentElement`], [`Attribute`], [`TextContent`]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════════
// POSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Source location of a node. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROOTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Page,
    Component,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Page => "page",
            DocumentKind::Component => "component",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of a compile pass, one [`Document`] per source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub documents: Vec<Document>,
    pub position: Position,
}

impl Program {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            position: Position::new("<program>", 1, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub kind: DocumentKind,
    pub name: Identifier,
    pub path: PathBuf,
    pub body: Vec<Stmt>,
    pub position: Position,
}

impl Document {
    /// Top-level UI elements in source order. A well-formed page has exactly one.
    pub fn root_elements(&self) -> impl Iterator<Item = &ComponentElement> {
        self.body.iter().filter_map(|stmt| match stmt {
            Stmt::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn root_element(&self) -> Option<&ComponentElement> {
        self.root_elements().next()
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.body.iter().filter_map(|stmt| match stmt {
            Stmt::Import(import) => Some(import),
            _ => None,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub position: Position,
}

impl Identifier {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// `name`, `name[]`, `name?`. The type is recorded, never checked.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub name: String,
    pub array_depth: u32,
    pub optional: bool,
    pub position: Position,
}

impl fmt::Display for TypeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for _ in 0..self.array_depth {
            f.write_str("[]")?;
        }
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// `import Default, { a, b } from "./file.jml";`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub default: Option<Identifier>,
    pub named: Vec<Identifier>,
    pub source: String,
    pub position: Position,
}

impl ImportDecl {
    /// Every local name this import binds, default first.
    pub fn bindings(&self) -> impl Iterator<Item = &Identifier> {
        self.default.iter().chain(self.named.iter())
    }
}

/// `export` wrapping a variable or function declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDecl {
    pub declaration: Box<Stmt>,
    pub position: Position,
}

impl ExportDecl {
    pub fn exported_name(&self) -> Option<&Identifier> {
        match self.declaration.as_ref() {
            Stmt::Variable(var) => Some(&var.name),
            Stmt::Function(func) => Some(&func.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub constant: bool,
    pub name: Identifier,
    pub ty: Option<TypeAnnotation>,
    pub init: Option<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Identifier,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Block,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Identifier,
    pub ty: Option<TypeAnnotation>,
    pub default: Option<Expr>,
    pub position: Position,
}

/// `prop name: type = default;`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: Identifier,
    pub ty: Option<TypeAnnotation>,
    pub default: Option<Expr>,
    pub position: Position,
}

/// `state name: type = init;`
#[derive(Debug, Clone, PartialEq)]
pub struct StateDecl {
    pub name: Identifier,
    pub ty: Option<TypeAnnotation>,
    pub init: Option<Expr>,
    pub position: Position,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import(ImportDecl),
    Export(ExportDecl),
    Variable(VariableDecl),
    Function(FunctionDecl),
    Property(PropertyDecl),
    State(StateDecl),
    Element(ComponentElement),
    Block(Block),
    Expr(ExprStmt),
    If(IfStmt),
    For(ForStmt),
    While(WhileStmt),
    Return(ReturnStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
}

impl Stmt {
    pub fn position(&self) -> &Position {
        match self {
            Stmt::Import(n) => &n.position,
            Stmt::Export(n) => &n.position,
            Stmt::Variable(n) => &n.position,
            Stmt::Function(n) => &n.position,
            Stmt::Property(n) => &n.position,
            Stmt::State(n) => &n.position,
            Stmt::Element(n) => &n.position,
            Stmt::Block(n) => &n.position,
            Stmt::Expr(n) => &n.position,
            Stmt::If(n) => &n.position,
            Stmt::For(n) => &n.position,
            Stmt::While(n) => &n.position,
            Stmt::Return(n) => &n.position,
            Stmt::Break(n) => &n.position,
            Stmt::Continue(n) => &n.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Block,
    /// Either a [`Stmt::Block`] or a chained [`Stmt::If`].
    pub else_branch: Option<Box<Stmt>>,
    pub position: Position,
}

/// `for (binding in iterable) { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub binding: Identifier,
    pub iterable: Expr,
    pub body: Block,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Block,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakStmt {
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinueStmt {
    pub position: Position,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(Identifier),
    String(StringLiteral),
    Number(NumberLiteral),
    Boolean(BooleanLiteral),
    Null(NullLiteral),
    Array(ArrayLiteral),
    Object(ObjectLiteral),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Assign(AssignExpr),
    Call(CallExpr),
    Member(MemberExpr),
    Index(IndexExpr),
    Conditional(ConditionalExpr),
    Arrow(ArrowFunction),
}

impl Expr {
    pub fn position(&self) -> &Position {
        match self {
            Expr::Identifier(n) => &n.position,
            Expr::String(n) => &n.position,
            Expr::Number(n) => &n.position,
            Expr::Boolean(n) => &n.position,
            Expr::Null(n) => &n.position,
            Expr::Array(n) => &n.position,
            Expr::Object(n) => &n.position,
            Expr::Binary(n) => &n.position,
            Expr::Unary(n) => &n.position,
            Expr::Assign(n) => &n.position,
            Expr::Call(n) => &n.position,
            Expr::Member(n) => &n.position,
            Expr::Index(n) => &n.position,
            Expr::Conditional(n) => &n.position,
            Expr::Arrow(n) => &n.position,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::String(_) | Expr::Number(_) | Expr::Boolean(_) | Expr::Null(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    pub value: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    pub value: f64,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanLiteral {
    pub value: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NullLiteral {
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLiteral {
    pub elements: Vec<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLiteral {
    pub properties: Vec<ObjectProperty>,
    pub position: Position,
}

/// `key: value` inside an object literal. The key is a label, not a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub key: Identifier,
    pub value: Expr,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::NotEq,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::LtEq,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::GtEq,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "!" => Some(UnaryOp::Not),
            "-" => Some(UnaryOp::Neg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(AssignOp::Assign),
            "+=" => Some(AssignOp::AddAssign),
            "-=" => Some(AssignOp::SubAssign),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpr {
    pub op: AssignOp,
    pub target: Box<Expr>,
    pub value: Box<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub arguments: Vec<Expr>,
    pub position: Position,
}

/// `object.property`. The property is a label and is never resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpr {
    pub object: Box<Expr>,
    pub property: Identifier,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub object: Box<Expr>,
    pub index: Box<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpr {
    pub condition: Box<Expr>,
    pub consequent: Box<Expr>,
    pub alternate: Box<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowFunction {
    pub params: Vec<Parameter>,
    pub body: ArrowBody,
    pub position: Position,
}

// ═══════════════════════════════════════════════════════════════════════════════
// JML ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// `Tag { attr: value  Child { ... }  "text"  let x = ...; }`
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentElement {
    pub tag: Identifier,
    pub body: Vec<ElementItem>,
    pub position: Position,
}

impl ComponentElement {
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.body.iter().filter_map(|item| match item {
            ElementItem::Attribute(attr) => Some(attr),
            _ => None,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = &ElementItem> {
        self.body
            .iter()
            .filter(|item| matches!(item, ElementItem::Element(_) | ElementItem::Text(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementItem {
    Attribute(Attribute),
    Element(ComponentElement),
    Text(TextContent),
    Variable(VariableDecl),
}

impl ElementItem {
    pub fn position(&self) -> &Position {
        match self {
            ElementItem::Attribute(n) => &n.position,
            ElementItem::Element(n) => &n.position,
            ElementItem::Text(n) => &n.position,
            ElementItem::Variable(n) => &n.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: Identifier,
    pub value: Expr,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextContent {
    pub value: String,
    pub position: Position,
}
