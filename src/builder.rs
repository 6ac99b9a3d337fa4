//! AST Builder
//!
//! Lowers a `ParseNode` tree into a typed `Document`. Conversion is total: it
//! never panics and never unwinds. A document is produced whenever its header
//! (`page`/`component` plus a name) is intact. Every top-level statement or
//! element body item whose subtree contains an `error` node is dropped whole
//! and reported; its siblings are kept. An element whose tag is intact is not
//! dropped for errors inside its body, only the affected body items are.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ast::*;
use crate::diagnostic::{Diagnostic, Diagnostics, ERR_MALFORMED_TREE, ERR_SYNTAX};
use crate::frontend::ParseNode;
use crate::parser as kind;

const ORIGIN_PARSER: &str = "parser";
const ORIGIN_BUILDER: &str = "builder";

/// Parse tree did not have the shape a node kind requires.
#[derive(Debug, Clone)]
struct Malformed {
    message: String,
    line: u32,
    column: u32,
}

type BuildResult<T> = Result<T, Malformed>;

fn malformed(node: &ParseNode, message: impl Into<String>) -> Malformed {
    Malformed {
        message: message.into(),
        line: node.line,
        column: node.column,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub document: Option<Document>,
    pub diagnostics: Diagnostics,
}

pub struct AstBuilder {
    path: PathBuf,
    file: Arc<str>,
    diagnostics: Diagnostics,
}

impl AstBuilder {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: Arc::from(path.to_string_lossy().as_ref()),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn build(mut self, tree: &ParseNode) -> BuildOutput {
        let document = self.source_file(tree);
        if document.is_none() && !self.diagnostics.has_errors() {
            self.diagnostics.push(Diagnostic::error(
                ERR_SYNTAX,
                "file declares no page or component",
                self.position(tree),
                ORIGIN_PARSER,
            ));
        }
        BuildOutput {
            document,
            diagnostics: self.diagnostics,
        }
    }

    fn position(&self, node: &ParseNode) -> Position {
        Position::new(self.file.clone(), node.line, node.column)
    }

    fn report_syntax(&mut self, error: &ParseNode) {
        let position = self.position(error);
        self.diagnostics.push(Diagnostic::error(
            ERR_SYNTAX,
            error.text.clone(),
            position,
            ORIGIN_PARSER,
        ));
    }

    fn report_malformed(&mut self, problem: Malformed) {
        let position = Position::new(self.file.clone(), problem.line, problem.column);
        self.diagnostics.push(Diagnostic::error(
            ERR_MALFORMED_TREE,
            problem.message,
            position,
            ORIGIN_BUILDER,
        ));
    }

    /// Drops `node` when its subtree carries a syntax error, otherwise converts
    /// it and reports shape problems. `None` means the item was dropped.
    fn keep<T>(
        &mut self,
        node: &ParseNode,
        convert: impl FnOnce(&mut Self, &ParseNode) -> BuildResult<T>,
    ) -> Option<T> {
        if let Some(error) = node.find_error() {
            self.report_syntax(error);
            return None;
        }
        match convert(self, node) {
            Ok(value) => Some(value),
            Err(problem) => {
                self.report_malformed(problem);
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DOCUMENT LEVEL
    // ═══════════════════════════════════════════════════════════════════════════

    fn source_file(&mut self, tree: &ParseNode) -> Option<Document> {
        if tree.is_error() {
            self.report_syntax(tree);
            return None;
        }

        let mut imports = Vec::new();
        let mut document: Option<Document> = None;

        for child in &tree.children {
            match child.kind.as_str() {
                kind::IMPORT_DECLARATION => {
                    if let Some(import) = self.keep(child, Self::import) {
                        imports.push(Stmt::Import(import));
                    }
                }
                kind::DOCUMENT if document.is_some() => {
                    self.diagnostics.push(Diagnostic::error(
                        ERR_SYNTAX,
                        "only one page or component may be declared per file",
                        self.position(child),
                        ORIGIN_PARSER,
                    ));
                }
                kind::DOCUMENT => document = self.document(child),
                _ if child.is_error() => self.report_syntax(child),
                _ => {
                    let problem = malformed(child, format!("unexpected '{}' at file level", child.kind));
                    self.report_malformed(problem);
                }
            }
        }

        let mut document = document?;
        if !imports.is_empty() {
            imports.append(&mut document.body);
            document.body = imports;
        }
        Some(document)
    }

    fn document(&mut self, node: &ParseNode) -> Option<Document> {
        let header = node.children.first();
        let doc_kind = match node.text.as_str() {
            "page" => DocumentKind::Page,
            "component" => DocumentKind::Component,
            other => {
                self.report_malformed(malformed(node, format!("unknown document kind '{}'", other)));
                return None;
            }
        };
        let name = match header {
            Some(ident) if ident.is(kind::IDENTIFIER) => self.identifier(ident),
            Some(error) if error.contains_error() => {
                let error = error.find_error().unwrap_or(error);
                self.report_syntax(error);
                return None;
            }
            _ => {
                self.report_malformed(malformed(node, "document is missing its name"));
                return None;
            }
        };

        let mut body = Vec::new();
        for item in &node.children[1..] {
            if let Some(stmt) = self.body_item(item) {
                body.push(stmt);
            }
        }

        Some(Document {
            kind: doc_kind,
            name,
            path: self.path.clone(),
            body,
            position: self.position(node),
        })
    }

    fn body_item(&mut self, node: &ParseNode) -> Option<Stmt> {
        if node.is(kind::ELEMENT) && self.has_intact_tag(node) {
            return Some(Stmt::Element(self.element(node)));
        }
        self.keep(node, Self::stmt)
    }

    fn has_intact_tag(&self, node: &ParseNode) -> bool {
        node.children
            .first()
            .map_or(false, |tag| tag.is(kind::IDENTIFIER))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ELEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn element(&mut self, node: &ParseNode) -> ComponentElement {
        let tag = self.identifier(&node.children[0]);
        let mut body = Vec::new();

        for item in &node.children[1..] {
            let converted = if item.is(kind::ELEMENT) && self.has_intact_tag(item) {
                Some(ElementItem::Element(self.element(item)))
            } else {
                self.keep(item, Self::element_item)
            };
            body.extend(converted);
        }

        ComponentElement {
            tag,
            body,
            position: self.position(node),
        }
    }

    fn element_item(&mut self, node: &ParseNode) -> BuildResult<ElementItem> {
        match node.kind.as_str() {
            kind::ATTRIBUTE => {
                let name = self.identifier_at(node, 0)?;
                let value = self.expr(child_at(node, 1)?)?;
                Ok(ElementItem::Attribute(Attribute {
                    name,
                    value,
                    position: self.position(node),
                }))
            }
            kind::TEXT => Ok(ElementItem::Text(TextContent {
                value: node.text.clone(),
                position: self.position(node),
            })),
            kind::VARIABLE_DECLARATION => Ok(ElementItem::Variable(self.variable(node)?)),
            other => Err(malformed(node, format!("'{}' cannot appear in an element body", other))),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn stmt(&mut self, node: &ParseNode) -> BuildResult<Stmt> {
        let position = self.position(node);
        Ok(match node.kind.as_str() {
            kind::IMPORT_DECLARATION => Stmt::Import(self.import(node)?),
            kind::EXPORT_DECLARATION => {
                let declaration = self.stmt(child_at(node, 0)?)?;
                if !matches!(declaration, Stmt::Variable(_) | Stmt::Function(_)) {
                    return Err(malformed(node, "only variables and functions can be exported"));
                }
                Stmt::Export(ExportDecl {
                    declaration: Box::new(declaration),
                    position,
                })
            }
            kind::VARIABLE_DECLARATION => Stmt::Variable(self.variable(node)?),
            kind::FUNCTION_DECLARATION => Stmt::Function(self.function(node)?),
            kind::PROPERTY_DECLARATION => {
                let (name, ty, default) = self.member(node)?;
                Stmt::Property(PropertyDecl {
                    name,
                    ty,
                    default,
                    position,
                })
            }
            kind::STATE_DECLARATION => {
                let (name, ty, init) = self.member(node)?;
                Stmt::State(StateDecl {
                    name,
                    ty,
                    init,
                    position,
                })
            }
            kind::ELEMENT => {
                let tag = self.identifier_at(node, 0)?;
                let body = node.children[1..]
                    .iter()
                    .map(|item| match item.kind.as_str() {
                        kind::ELEMENT => self.stmt(item).and_then(|stmt| match stmt {
                            Stmt::Element(el) => Ok(ElementItem::Element(el)),
                            _ => Err(malformed(item, "expected element")),
                        }),
                        _ => self.element_item(item),
                    })
                    .collect::<BuildResult<Vec<_>>>()?;
                Stmt::Element(ComponentElement { tag, body, position })
            }
            kind::BLOCK => Stmt::Block(self.block(node)?),
            kind::EXPRESSION_STATEMENT => Stmt::Expr(ExprStmt {
                expr: self.expr(child_at(node, 0)?)?,
                position,
            }),
            kind::IF_STATEMENT => Stmt::If(self.if_stmt(node)?),
            kind::FOR_STATEMENT => Stmt::For(ForStmt {
                binding: self.identifier_at(node, 0)?,
                iterable: self.expr(child_at(node, 1)?)?,
                body: self.block(child_of_kind(node, 2, kind::BLOCK)?)?,
                position,
            }),
            kind::WHILE_STATEMENT => Stmt::While(WhileStmt {
                condition: self.expr(child_at(node, 0)?)?,
                body: self.block(child_of_kind(node, 1, kind::BLOCK)?)?,
                position,
            }),
            kind::RETURN_STATEMENT => Stmt::Return(ReturnStmt {
                value: node.children.first().map(|v| self.expr(v)).transpose()?,
                position,
            }),
            kind::BREAK_STATEMENT => Stmt::Break(BreakStmt { position }),
            kind::CONTINUE_STATEMENT => Stmt::Continue(ContinueStmt { position }),
            other => return Err(malformed(node, format!("'{}' is not a statement", other))),
        })
    }

    fn import(&mut self, node: &ParseNode) -> BuildResult<ImportDecl> {
        let mut default = None;
        let mut named = Vec::new();
        let mut source = None;

        for child in &node.children {
            match child.kind.as_str() {
                kind::IDENTIFIER => default = Some(self.identifier(child)),
                kind::NAMED_IMPORTS => {
                    for ident in &child.children {
                        named.push(self.identifier_checked(ident)?);
                    }
                }
                kind::STRING => source = Some(child.text.clone()),
                other => return Err(malformed(child, format!("unexpected '{}' in import", other))),
            }
        }

        let source = source.ok_or_else(|| malformed(node, "import is missing its source path"))?;
        if default.is_none() && named.is_empty() {
            return Err(malformed(node, "import binds no names"));
        }
        Ok(ImportDecl {
            default,
            named,
            source,
            position: self.position(node),
        })
    }

    fn variable(&mut self, node: &ParseNode) -> BuildResult<VariableDecl> {
        let (name, ty, init) = self.member(node)?;
        Ok(VariableDecl {
            constant: node.text == "const",
            name,
            ty,
            init,
            position: self.position(node),
        })
    }

    /// Shared shape of `prop`, `state`, `let`, `const` and parameters:
    /// identifier, optional `type`, optional expression.
    fn member(
        &mut self,
        node: &ParseNode,
    ) -> BuildResult<(Identifier, Option<TypeAnnotation>, Option<Expr>)> {
        let name = self.identifier_at(node, 0)?;
        let mut ty = None;
        let mut value = None;
        for child in &node.children[1..] {
            if child.is(kind::TYPE) && ty.is_none() && value.is_none() {
                ty = Some(self.type_annotation(child));
            } else if value.is_none() {
                value = Some(self.expr(child)?);
            } else {
                return Err(malformed(child, "unexpected trailing node in declaration"));
            }
        }
        Ok((name, ty, value))
    }

    fn function(&mut self, node: &ParseNode) -> BuildResult<FunctionDecl> {
        let name = self.identifier_at(node, 0)?;
        let params = self.parameters(child_of_kind(node, 1, kind::PARAMETERS)?)?;
        let return_type = node.child(kind::TYPE).map(|ty| self.type_annotation(ty));
        let body = node
            .child(kind::BLOCK)
            .ok_or_else(|| malformed(node, "function is missing its body"))?;
        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body: self.block(body)?,
            position: self.position(node),
        })
    }

    fn parameters(&mut self, node: &ParseNode) -> BuildResult<Vec<Parameter>> {
        node.children
            .iter()
            .map(|param| {
                if !param.is(kind::PARAMETER) {
                    return Err(malformed(param, "expected parameter"));
                }
                let (name, ty, default) = self.member(param)?;
                Ok(Parameter {
                    name,
                    ty,
                    default,
                    position: self.position(param),
                })
            })
            .collect()
    }

    fn block(&mut self, node: &ParseNode) -> BuildResult<Block> {
        let statements = node
            .children
            .iter()
            .map(|stmt| self.stmt(stmt))
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(Block {
            statements,
            position: self.position(node),
        })
    }

    fn if_stmt(&mut self, node: &ParseNode) -> BuildResult<IfStmt> {
        let condition = self.expr(child_at(node, 0)?)?;
        let then_branch = self.block(child_of_kind(node, 1, kind::BLOCK)?)?;
        let else_branch = match node.children.get(2) {
            Some(branch) if branch.is(kind::IF_STATEMENT) => {
                Some(Box::new(Stmt::If(self.if_stmt(branch)?)))
            }
            Some(branch) if branch.is(kind::BLOCK) => Some(Box::new(Stmt::Block(self.block(branch)?))),
            Some(branch) => return Err(malformed(branch, "else branch must be a block or if")),
            None => None,
        };
        Ok(IfStmt {
            condition,
            then_branch,
            else_branch,
            position: self.position(node),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn expr(&mut self, node: &ParseNode) -> BuildResult<Expr> {
        let position = self.position(node);
        Ok(match node.kind.as_str() {
            kind::IDENTIFIER => Expr::Identifier(self.identifier(node)),
            kind::STRING => Expr::String(StringLiteral {
                value: node.text.clone(),
                position,
            }),
            kind::NUMBER => {
                let value = node
                    .text
                    .parse::<f64>()
                    .map_err(|_| malformed(node, format!("invalid number '{}'", node.text)))?;
                Expr::Number(NumberLiteral { value, position })
            }
            kind::BOOLEAN => match node.text.as_str() {
                "true" | "false" => Expr::Boolean(BooleanLiteral {
                    value: node.text == "true",
                    position,
                }),
                other => return Err(malformed(node, format!("invalid boolean '{}'", other))),
            },
            kind::NULL => Expr::Null(NullLiteral { position }),
            kind::ARRAY => Expr::Array(ArrayLiteral {
                elements: node
                    .children
                    .iter()
                    .map(|e| self.expr(e))
                    .collect::<BuildResult<_>>()?,
                position,
            }),
            kind::OBJECT => {
                let mut properties = Vec::with_capacity(node.children.len());
                for pair in &node.children {
                    properties.push(ObjectProperty {
                        key: self.identifier_at(pair, 0)?,
                        value: self.expr(child_at(pair, 1)?)?,
                        position: self.position(pair),
                    });
                }
                Expr::Object(ObjectLiteral {
                    properties,
                    position,
                })
            }
            kind::BINARY_EXPRESSION => {
                let op = BinaryOp::from_symbol(&node.text)
                    .ok_or_else(|| malformed(node, format!("unknown operator '{}'", node.text)))?;
                Expr::Binary(BinaryExpr {
                    op,
                    left: Box::new(self.expr(child_at(node, 0)?)?),
                    right: Box::new(self.expr(child_at(node, 1)?)?),
                    position,
                })
            }
            kind::UNARY_EXPRESSION => {
                let op = UnaryOp::from_symbol(&node.text)
                    .ok_or_else(|| malformed(node, format!("unknown operator '{}'", node.text)))?;
                Expr::Unary(UnaryExpr {
                    op,
                    operand: Box::new(self.expr(child_at(node, 0)?)?),
                    position,
                })
            }
            kind::ASSIGNMENT_EXPRESSION => {
                let op = AssignOp::from_symbol(&node.text)
                    .ok_or_else(|| malformed(node, format!("unknown operator '{}'", node.text)))?;
                Expr::Assign(AssignExpr {
                    op,
                    target: Box::new(self.expr(child_at(node, 0)?)?),
                    value: Box::new(self.expr(child_at(node, 1)?)?),
                    position,
                })
            }
            kind::CALL_EXPRESSION => {
                let callee = Box::new(self.expr(child_at(node, 0)?)?);
                let arguments = child_of_kind(node, 1, kind::ARGUMENTS)?
                    .children
                    .iter()
                    .map(|a| self.expr(a))
                    .collect::<BuildResult<_>>()?;
                Expr::Call(CallExpr {
                    callee,
                    arguments,
                    position,
                })
            }
            kind::MEMBER_EXPRESSION => Expr::Member(MemberExpr {
                object: Box::new(self.expr(child_at(node, 0)?)?),
                property: self.identifier_at(node, 1)?,
                position,
            }),
            kind::INDEX_EXPRESSION => Expr::Index(IndexExpr {
                object: Box::new(self.expr(child_at(node, 0)?)?),
                index: Box::new(self.expr(child_at(node, 1)?)?),
                position,
            }),
            kind::CONDITIONAL_EXPRESSION => Expr::Conditional(ConditionalExpr {
                condition: Box::new(self.expr(child_at(node, 0)?)?),
                consequent: Box::new(self.expr(child_at(node, 1)?)?),
                alternate: Box::new(self.expr(child_at(node, 2)?)?),
                position,
            }),
            kind::ARROW_FUNCTION => {
                let params = self.parameters(child_of_kind(node, 0, kind::PARAMETERS)?)?;
                let body = child_at(node, 1)?;
                let body = if body.is(kind::BLOCK) {
                    ArrowBody::Block(self.block(body)?)
                } else {
                    ArrowBody::Expr(Box::new(self.expr(body)?))
                };
                Expr::Arrow(ArrowFunction {
                    params,
                    body,
                    position,
                })
            }
            other => return Err(malformed(node, format!("'{}' is not an expression", other))),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LEAVES
    // ═══════════════════════════════════════════════════════════════════════════

    fn identifier(&self, node: &ParseNode) -> Identifier {
        Identifier::new(node.text.clone(), self.position(node))
    }

    fn identifier_checked(&self, node: &ParseNode) -> BuildResult<Identifier> {
        if node.is(kind::IDENTIFIER) && !node.text.is_empty() {
            Ok(self.identifier(node))
        } else {
            Err(malformed(node, format!("expected identifier, found '{}'", node.kind)))
        }
    }

    fn identifier_at(&self, node: &ParseNode, index: usize) -> BuildResult<Identifier> {
        self.identifier_checked(child_at(node, index)?)
    }

    /// Node text is the base name followed by `[]` per array level and an
    /// optional trailing `?`.
    fn type_annotation(&self, node: &ParseNode) -> TypeAnnotation {
        let mut name = node.text.trim();
        let optional = name.ends_with('?');
        if optional {
            name = &name[..name.len() - 1];
        }
        let mut array_depth = 0;
        while let Some(inner) = name.strip_suffix("[]") {
            name = inner;
            array_depth += 1;
        }
        TypeAnnotation {
            name: name.to_string(),
            array_depth,
            optional,
            position: self.position(node),
        }
    }
}

fn child_at(node: &ParseNode, index: usize) -> BuildResult<&ParseNode> {
    node.children.get(index).ok_or_else(|| {
        malformed(
            node,
            format!("'{}' is missing child {}", node.kind, index + 1),
        )
    })
}

fn child_of_kind<'a>(node: &'a ParseNode, index: usize, expected: &str) -> BuildResult<&'a ParseNode> {
    let child = child_at(node, index)?;
    if child.is(expected) {
        Ok(child)
    } else {
        Err(malformed(
            child,
            format!("expected '{}' in '{}', found '{}'", expected, node.kind, child.kind),
        ))
    }
}

/// Builds one document from a parse tree.
pub fn build_document(path: &Path, tree: &ParseNode) -> BuildOutput {
    AstBuilder::new(path).build(tree)
}

/// Builds a `Program` from one parse tree per file, in the given order. Files
/// without a usable header contribute only diagnostics.
pub fn build_program(trees: impl IntoIterator<Item = (PathBuf, ParseNode)>) -> (Program, Diagnostics) {
    let mut documents = Vec::new();
    let mut diagnostics = Diagnostics::new();
    for (path, tree) in trees {
        let output = build_document(&path, &tree);
        documents.extend(output.document);
        diagnostics.extend(output.diagnostics);
    }
    (Program::new(documents), diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn build(source: &str) -> BuildOutput {
        build_document(Path::new("src/Home.jml"), &parse_source(source))
    }

    #[test]
    fn test_builds_full_page() {
        let out = build(
            r#"import Button from "./Button.jml";
            page Home {
                prop title: string = "Home";
                state count: number = 0;
                const limit = 10;
                function increment(step: number): void {
                    if (count < limit) { count += step; }
                }
                View {
                    class: "container"
                    let label = title + "!";
                    Heading { text: label }
                    Button { label: "Add", onClick: () => increment(1) }
                    "Clicked"
                }
            }"#,
        );
        assert!(out.diagnostics.is_empty(), "{}", out.diagnostics);
        let doc = out.document.unwrap();
        assert_eq!(doc.kind, DocumentKind::Page);
        assert_eq!(doc.name.name, "Home");
        assert_eq!(doc.path, PathBuf::from("src/Home.jml"));
        assert_eq!(doc.body.len(), 6);
        assert!(matches!(doc.body[0], Stmt::Import(_)));
        assert_eq!(doc.imports().next().unwrap().source, "./Button.jml");

        let root = doc.root_element().unwrap();
        assert_eq!(root.tag.name, "View");
        assert_eq!(root.body.len(), 5);
        assert_eq!(root.attributes().count(), 1);
        assert_eq!(root.position.line, 9);
        assert_eq!(&*root.position.file, "src/Home.jml");
    }

    #[test]
    fn test_type_annotations_parse_suffixes() {
        let out = build("component C { prop items: string[][]?; }");
        let doc = out.document.unwrap();
        let Stmt::Property(prop) = &doc.body[0] else {
            panic!("expected property");
        };
        let ty = prop.ty.as_ref().unwrap();
        assert_eq!(ty.name, "string");
        assert_eq!(ty.array_depth, 2);
        assert!(ty.optional);
        assert_eq!(ty.to_string(), "string[][]?");
    }

    #[test]
    fn test_partial_ast_keeps_siblings() {
        let out = build(
            r#"page Home {
                state count: number = 0;
                function broken( { }
                const limit = 10;
                View { "ok" }
            }"#,
        );
        let doc = out.document.expect("header is intact");
        let kinds: Vec<_> = doc
            .body
            .iter()
            .map(|s| match s {
                Stmt::State(_) => "state",
                Stmt::Variable(_) => "const",
                Stmt::Element(_) => "element",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["state", "const", "element"]);
        assert_eq!(out.diagnostics.error_count(), 1);
        let diag = out.diagnostics.errors().next().unwrap();
        assert_eq!(diag.code, ERR_SYNTAX);
        assert_eq!(diag.position.as_ref().unwrap().line, 3);
    }

    #[test]
    fn test_bad_element_item_dropped_alone() {
        let out = build(
            r#"page Home {
                View {
                    class: @
                    Text { text: "kept" }
                }
            }"#,
        );
        let doc = out.document.unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(root.body.len(), 1);
        assert!(matches!(root.body[0], ElementItem::Element(_)));
        assert_eq!(out.diagnostics.error_count(), 1);
    }

    #[test]
    fn test_missing_header_yields_no_document() {
        let out = build("page { View {} }");
        assert!(out.document.is_none());
        assert!(out.diagnostics.has_errors());

        let out = build("");
        assert!(out.document.is_none());
        assert_eq!(out.diagnostics.error_count(), 1);
    }

    #[test]
    fn test_second_document_rejected() {
        let out = build("component A {}\ncomponent B {}");
        assert_eq!(out.document.unwrap().name.name, "A");
        assert_eq!(out.diagnostics.error_count(), 1);
    }

    #[test]
    fn test_malformed_external_tree() {
        let tree = ParseNode::new(kind::SOURCE_FILE, 1, 1).with_child(
            ParseNode::leaf(kind::DOCUMENT, "page", 1, 1)
                .with_child(ParseNode::leaf(kind::IDENTIFIER, "P", 1, 6))
                .with_child(ParseNode::new(kind::STATE_DECLARATION, 2, 1))
                .with_child(
                    ParseNode::new(kind::EXPRESSION_STATEMENT, 3, 1)
                        .with_child(ParseNode::leaf(kind::NUMBER, "1.5", 3, 1)),
                ),
        );
        let out = build_document(Path::new("p.jml"), &tree);
        let doc = out.document.unwrap();
        assert_eq!(doc.body.len(), 1);
        assert_eq!(out.diagnostics.with_code(ERR_MALFORMED_TREE).count(), 1);
    }

    #[test]
    fn test_build_program_collects_documents() {
        let trees = vec![
            (PathBuf::from("a.jml"), parse_source("component A {}")),
            (PathBuf::from("b.jml"), parse_source("nonsense")),
            (PathBuf::from("c.jml"), parse_source("page C { View {} }")),
        ];
        let (program, diagnostics) = build_program(trees);
        assert_eq!(program.documents.len(), 2);
        assert_eq!(program.documents[1].name.name, "C");
        assert!(diagnostics.has_errors());
    }
}
