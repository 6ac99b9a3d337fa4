use crate::ast::*;

/// The Visitor trait is the double-dispatch half of AST traversal.
///
/// Rules:
/// 1. Every method defaults to a no-op, so a visitor overrides only what it needs.
/// 2. A node's `accept` fires exactly one method: the one matching its kind.
/// 3. Visitor methods never recurse on their own. Call [`walk`] for a full
///    pre-order traversal, or call `accept` / [`walk_children`] on selected
///    children when the visitor must control order or bracket children
///    (scope entry and exit, printing).
pub trait Visitor {
    fn visit_program(&mut self, _node: &Program) {}
    fn visit_document(&mut self, _node: &Document) {}

    fn visit_import(&mut self, _node: &ImportDecl) {}
    fn visit_export(&mut self, _node: &ExportDecl) {}
    fn visit_variable(&mut self, _node: &VariableDecl) {}
    fn visit_function(&mut self, _node: &FunctionDecl) {}
    fn visit_parameter(&mut self, _node: &Parameter) {}
    fn visit_property(&mut self, _node: &PropertyDecl) {}
    fn visit_state(&mut self, _node: &StateDecl) {}
    fn visit_type_annotation(&mut self, _node: &TypeAnnotation) {}

    fn visit_block(&mut self, _node: &Block) {}
    fn visit_expr_stmt(&mut self, _node: &ExprStmt) {}
    fn visit_if(&mut self, _node: &IfStmt) {}
    fn visit_for(&mut self, _node: &ForStmt) {}
    fn visit_while(&mut self, _node: &WhileStmt) {}
    fn visit_return(&mut self, _node: &ReturnStmt) {}
    fn visit_break(&mut self, _node: &BreakStmt) {}
    fn visit_continue(&mut self, _node: &ContinueStmt) {}

    fn visit_identifier(&mut self, _node: &Identifier) {}
    fn visit_string(&mut self, _node: &StringLiteral) {}
    fn visit_number(&mut self, _node: &NumberLiteral) {}
    fn visit_boolean(&mut self, _node: &BooleanLiteral) {}
    fn visit_null(&mut self, _node: &NullLiteral) {}
    fn visit_array(&mut self, _node: &ArrayLiteral) {}
    fn visit_object(&mut self, _node: &ObjectLiteral) {}
    fn visit_object_property(&mut self, _node: &ObjectProperty) {}
    fn visit_binary(&mut self, _node: &BinaryExpr) {}
    fn visit_unary(&mut self, _node: &UnaryExpr) {}
    fn visit_assign(&mut self, _node: &AssignExpr) {}
    fn visit_call(&mut self, _node: &CallExpr) {}
    fn visit_member(&mut self, _node: &MemberExpr) {}
    fn visit_index(&mut self, _node: &IndexExpr) {}
    fn visit_conditional(&mut self, _node: &ConditionalExpr) {}
    fn visit_arrow(&mut self, _node: &ArrowFunction) {}

    fn visit_element(&mut self, _node: &ComponentElement) {}
    fn visit_attribute(&mut self, _node: &Attribute) {}
    fn visit_text(&mut self, _node: &TextContent) {}
}

/// Implemented by every concrete node struct.
pub trait AstNode {
    fn position(&self) -> &Position;
    fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V);
    fn as_node(&self) -> Node<'_>;
}

macro_rules! ast_nodes {
    ($($variant:ident($ty:ident) => $visit:ident,)*) => {
        /// Borrowed view of any AST node. Traversal code matches on this
        /// exhaustively, so a new node kind fails to compile until every
        /// traversal handles it.
        #[derive(Debug, Clone, Copy)]
        pub enum Node<'a> {
            $($variant(&'a $ty),)*
        }

        impl<'a> Node<'a> {
            pub fn position(self) -> &'a Position {
                match self {
                    $(Node::$variant(n) => &n.position,)*
                }
            }

            pub fn accept<V: Visitor + ?Sized>(self, visitor: &mut V) {
                match self {
                    $(Node::$variant(n) => visitor.$visit(n),)*
                }
            }

            pub fn kind(self) -> &'static str {
                match self {
                    $(Node::$variant(_) => stringify!($variant),)*
                }
            }
        }

        $(
            impl AstNode for $ty {
                fn position(&self) -> &Position {
                    &self.position
                }

                fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
                    visitor.$visit(self)
                }

                fn as_node(&self) -> Node<'_> {
                    Node::$variant(self)
                }
            }

            impl<'a> From<&'a $ty> for Node<'a> {
                fn from(node: &'a $ty) -> Self {
                    Node::$variant(node)
                }
            }
        )*
    };
}

ast_nodes! {
    Program(Program) => visit_program,
    Document(Document) => visit_document,
    Import(ImportDecl) => visit_import,
    Export(ExportDecl) => visit_export,
    Variable(VariableDecl) => visit_variable,
    Function(FunctionDecl) => visit_function,
    Parameter(Parameter) => visit_parameter,
    Property(PropertyDecl) => visit_property,
    State(StateDecl) => visit_state,
    TypeAnnotation(TypeAnnotation) => visit_type_annotation,
    Block(Block) => visit_block,
    ExprStmt(ExprStmt) => visit_expr_stmt,
    If(IfStmt) => visit_if,
    For(ForStmt) => visit_for,
    While(WhileStmt) => visit_while,
    Return(ReturnStmt) => visit_return,
    Break(BreakStmt) => visit_break,
    Continue(ContinueStmt) => visit_continue,
    Identifier(Identifier) => visit_identifier,
    StringLiteral(StringLiteral) => visit_string,
    NumberLiteral(NumberLiteral) => visit_number,
    BooleanLiteral(BooleanLiteral) => visit_boolean,
    NullLiteral(NullLiteral) => visit_null,
    ArrayLiteral(ArrayLiteral) => visit_array,
    ObjectLiteral(ObjectLiteral) => visit_object,
    ObjectProperty(ObjectProperty) => visit_object_property,
    Binary(BinaryExpr) => visit_binary,
    Unary(UnaryExpr) => visit_unary,
    Assign(AssignExpr) => visit_assign,
    Call(CallExpr) => visit_call,
    Member(MemberExpr) => visit_member,
    Index(IndexExpr) => visit_index,
    Conditional(ConditionalExpr) => visit_conditional,
    Arrow(ArrowFunction) => visit_arrow,
    Element(ComponentElement) => visit_element,
    Attribute(Attribute) => visit_attribute,
    Text(TextContent) => visit_text,
}

impl<'a> From<&'a Stmt> for Node<'a> {
    fn from(stmt: &'a Stmt) -> Self {
        match stmt {
            Stmt::Import(n) => Node::Import(n),
            Stmt::Export(n) => Node::Export(n),
            Stmt::Variable(n) => Node::Variable(n),
            Stmt::Function(n) => Node::Function(n),
            Stmt::Property(n) => Node::Property(n),
            Stmt::State(n) => Node::State(n),
            Stmt::Element(n) => Node::Element(n),
            Stmt::Block(n) => Node::Block(n),
            Stmt::Expr(n) => Node::ExprStmt(n),
            Stmt::If(n) => Node::If(n),
            Stmt::For(n) => Node::For(n),
            Stmt::While(n) => Node::While(n),
            Stmt::Return(n) => Node::Return(n),
            Stmt::Break(n) => Node::Break(n),
            Stmt::Continue(n) => Node::Continue(n),
        }
    }
}

impl<'a> From<&'a Expr> for Node<'a> {
    fn from(expr: &'a Expr) -> Self {
        match expr {
            Expr::Identifier(n) => Node::Identifier(n),
            Expr::String(n) => Node::StringLiteral(n),
            Expr::Number(n) => Node::NumberLiteral(n),
            Expr::Boolean(n) => Node::BooleanLiteral(n),
            Expr::Null(n) => Node::NullLiteral(n),
            Expr::Array(n) => Node::ArrayLiteral(n),
            Expr::Object(n) => Node::ObjectLiteral(n),
            Expr::Binary(n) => Node::Binary(n),
            Expr::Unary(n) => Node::Unary(n),
            Expr::Assign(n) => Node::Assign(n),
            Expr::Call(n) => Node::Call(n),
            Expr::Member(n) => Node::Member(n),
            Expr::Index(n) => Node::Index(n),
            Expr::Conditional(n) => Node::Conditional(n),
            Expr::Arrow(n) => Node::Arrow(n),
        }
    }
}

impl<'a> From<&'a ElementItem> for Node<'a> {
    fn from(item: &'a ElementItem) -> Self {
        match item {
            ElementItem::Attribute(n) => Node::Attribute(n),
            ElementItem::Element(n) => Node::Element(n),
            ElementItem::Text(n) => Node::Text(n),
            ElementItem::Variable(n) => Node::Variable(n),
        }
    }
}

impl<'a> From<&'a ArrowBody> for Node<'a> {
    fn from(body: &'a ArrowBody) -> Self {
        match body {
            ArrowBody::Expr(expr) => Node::from(expr.as_ref()),
            ArrowBody::Block(block) => Node::Block(block),
        }
    }
}

impl Stmt {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        Node::from(self).accept(visitor)
    }
}

impl Expr {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        Node::from(self).accept(visitor)
    }
}

impl ElementItem {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        Node::from(self).accept(visitor)
    }
}

impl<'a> Node<'a> {
    /// Calls `f` on each structurally owned child in traversal order.
    /// Absent optional children are skipped.
    pub fn for_each_child(self, mut f: impl FnMut(Node<'a>)) {
        match self {
            Node::Program(n) => n.documents.iter().for_each(|d| f(Node::Document(d))),
            Node::Document(n) => {
                f(Node::Identifier(&n.name));
                n.body.iter().for_each(|s| f(s.into()));
            }
            Node::Import(n) => n.bindings().for_each(|id| f(Node::Identifier(id))),
            Node::Export(n) => f(n.declaration.as_ref().into()),
            Node::Variable(n) => {
                f(Node::Identifier(&n.name));
                if let Some(ty) = &n.ty {
                    f(Node::TypeAnnotation(ty));
                }
                if let Some(init) = &n.init {
                    f(init.into());
                }
            }
            Node::Function(n) => {
                f(Node::Identifier(&n.name));
                n.params.iter().for_each(|p| f(Node::Parameter(p)));
                if let Some(ty) = &n.return_type {
                    f(Node::TypeAnnotation(ty));
                }
                f(Node::Block(&n.body));
            }
            Node::Parameter(n) => {
                f(Node::Identifier(&n.name));
                if let Some(ty) = &n.ty {
                    f(Node::TypeAnnotation(ty));
                }
                if let Some(default) = &n.default {
                    f(default.into());
                }
            }
            Node::Property(n) => {
                f(Node::Identifier(&n.name));
                if let Some(ty) = &n.ty {
                    f(Node::TypeAnnotation(ty));
                }
                if let Some(default) = &n.default {
                    f(default.into());
                }
            }
            Node::State(n) => {
                f(Node::Identifier(&n.name));
                if let Some(ty) = &n.ty {
                    f(Node::TypeAnnotation(ty));
                }
                if let Some(init) = &n.init {
                    f(init.into());
                }
            }
            Node::Block(n) => n.statements.iter().for_each(|s| f(s.into())),
            Node::ExprStmt(n) => f((&n.expr).into()),
            Node::If(n) => {
                f((&n.condition).into());
                f(Node::Block(&n.then_branch));
                if let Some(else_branch) = &n.else_branch {
                    f(else_branch.as_ref().into());
                }
            }
            Node::For(n) => {
                f(Node::Identifier(&n.binding));
                f((&n.iterable).into());
                f(Node::Block(&n.body));
            }
            Node::While(n) => {
                f((&n.condition).into());
                f(Node::Block(&n.body));
            }
            Node::Return(n) => {
                if let Some(value) = &n.value {
                    f(value.into());
                }
            }
            Node::ArrayLiteral(n) => n.elements.iter().for_each(|e| f(e.into())),
            Node::ObjectLiteral(n) => n.properties.iter().for_each(|p| f(Node::ObjectProperty(p))),
            Node::ObjectProperty(n) => {
                f(Node::Identifier(&n.key));
                f((&n.value).into());
            }
            Node::Binary(n) => {
                f(n.left.as_ref().into());
                f(n.right.as_ref().into());
            }
            Node::Unary(n) => f(n.operand.as_ref().into()),
            Node::Assign(n) => {
                f(n.target.as_ref().into());
                f(n.value.as_ref().into());
            }
            Node::Call(n) => {
                f(n.callee.as_ref().into());
                n.arguments.iter().for_each(|a| f(a.into()));
            }
            Node::Member(n) => {
                f(n.object.as_ref().into());
                f(Node::Identifier(&n.property));
            }
            Node::Index(n) => {
                f(n.object.as_ref().into());
                f(n.index.as_ref().into());
            }
            Node::Conditional(n) => {
                f(n.condition.as_ref().into());
                f(n.consequent.as_ref().into());
                f(n.alternate.as_ref().into());
            }
            Node::Arrow(n) => {
                n.params.iter().for_each(|p| f(Node::Parameter(p)));
                f((&n.body).into());
            }
            Node::Element(n) => {
                f(Node::Identifier(&n.tag));
                n.body.iter().for_each(|item| f(item.into()));
            }
            Node::Attribute(n) => {
                f(Node::Identifier(&n.name));
                f((&n.value).into());
            }
            Node::TypeAnnotation(_)
            | Node::Break(_)
            | Node::Continue(_)
            | Node::Identifier(_)
            | Node::StringLiteral(_)
            | Node::NumberLiteral(_)
            | Node::BooleanLiteral(_)
            | Node::NullLiteral(_)
            | Node::Text(_) => {}
        }
    }

    pub fn children(self) -> Vec<Node<'a>> {
        let mut children = Vec::new();
        self.for_each_child(|child| children.push(child));
        children
    }
}

/// Full pre-order traversal: the node itself, then every owned child.
/// Passing `None` is a no-op.
pub fn walk<'a, V: Visitor + ?Sized>(node: impl Into<Option<Node<'a>>>, visitor: &mut V) {
    let Some(node) = node.into() else {
        return;
    };
    node.accept(visitor);
    walk_children(node, visitor);
}

/// Pre-order traversal of a node's children only.
pub fn walk_children<'a, V: Visitor + ?Sized>(node: Node<'a>, visitor: &mut V) {
    node.for_each_child(|child| walk(child, visitor));
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION PRINTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Renders expressions back to source-like text. Compound operands are
/// parenthesized so the output is unambiguous without precedence tables.
#[derive(Debug, Default)]
pub struct ExprPrinter {
    out: String,
}

impl ExprPrinter {
    pub fn print(expr: &Expr) -> String {
        let mut printer = ExprPrinter::default();
        expr.accept(&mut printer);
        printer.out
    }

    fn operand(&mut self, expr: &Expr) {
        let compound = matches!(
            expr,
            Expr::Binary(_) | Expr::Conditional(_) | Expr::Assign(_) | Expr::Arrow(_)
        );
        if compound {
            self.out.push('(');
        }
        expr.accept(self);
        if compound {
            self.out.push(')');
        }
    }

    fn list(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            expr.accept(self);
        }
    }
}

impl Visitor for ExprPrinter {
    fn visit_identifier(&mut self, node: &Identifier) {
        self.out.push_str(&node.name);
    }

    fn visit_string(&mut self, node: &StringLiteral) {
        self.out.push('"');
        for c in node.value.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                _ => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    fn visit_number(&mut self, node: &NumberLiteral) {
        self.out.push_str(&node.value.to_string());
    }

    fn visit_boolean(&mut self, node: &BooleanLiteral) {
        self.out.push_str(if node.value { "true" } else { "false" });
    }

    fn visit_null(&mut self, _node: &NullLiteral) {
        self.out.push_str("null");
    }

    fn visit_array(&mut self, node: &ArrayLiteral) {
        self.out.push('[');
        self.list(&node.elements);
        self.out.push(']');
    }

    fn visit_object(&mut self, node: &ObjectLiteral) {
        if node.properties.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{ ");
        for (i, prop) in node.properties.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            prop.accept(self);
        }
        self.out.push_str(" }");
    }

    fn visit_object_property(&mut self, node: &ObjectProperty) {
        self.out.push_str(&node.key.name);
        self.out.push_str(": ");
        node.value.accept(self);
    }

    fn visit_binary(&mut self, node: &BinaryExpr) {
        self.operand(&node.left);
        self.out.push(' ');
        self.out.push_str(node.op.as_str());
        self.out.push(' ');
        self.operand(&node.right);
    }

    fn visit_unary(&mut self, node: &UnaryExpr) {
        self.out.push_str(node.op.as_str());
        self.operand(&node.operand);
    }

    fn visit_assign(&mut self, node: &AssignExpr) {
        node.target.accept(self);
        self.out.push(' ');
        self.out.push_str(node.op.as_str());
        self.out.push(' ');
        node.value.accept(self);
    }

    fn visit_call(&mut self, node: &CallExpr) {
        self.operand(&node.callee);
        self.out.push('(');
        self.list(&node.arguments);
        self.out.push(')');
    }

    fn visit_member(&mut self, node: &MemberExpr) {
        self.operand(&node.object);
        self.out.push('.');
        self.out.push_str(&node.property.name);
    }

    fn visit_index(&mut self, node: &IndexExpr) {
        self.operand(&node.object);
        self.out.push('[');
        node.index.accept(self);
        self.out.push(']');
    }

    fn visit_conditional(&mut self, node: &ConditionalExpr) {
        self.operand(&node.condition);
        self.out.push_str(" ? ");
        self.operand(&node.consequent);
        self.out.push_str(" : ");
        self.operand(&node.alternate);
    }

    fn visit_arrow(&mut self, node: &ArrowFunction) {
        self.out.push('(');
        for (i, param) in node.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&param.name.name);
        }
        self.out.push_str(") => ");
        match &node.body {
            ArrowBody::Expr(expr) => self.operand(expr),
            ArrowBody::Block(_) => self.out.push_str("{ ... }"),
        }
    }
}
