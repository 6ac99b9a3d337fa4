//! Recursive-descent parser for the reference JML frontend.
//!
//! Each construct becomes a `ParseNode` named after it (`element`,
//! `if_statement`, `binary_expression`, ...). Failures are local: the failing
//! item is replaced by an `error` node, tokens are skipped to the next item
//! boundary and parsing continues with the siblings.

use crate::frontend::ParseNode;
use crate::lexer::{is_keyword, tokenize, Token, TokenKind};

// ═══════════════════════════════════════════════════════════════════════════════
// NODE KINDS
// ═══════════════════════════════════════════════════════════════════════════════

pub const SOURCE_FILE: &str = "source_file";
pub const IMPORT_DECLARATION: &str = "import_declaration";
pub const NAMED_IMPORTS: &str = "named_imports";
pub const DOCUMENT: &str = "document";
pub const EXPORT_DECLARATION: &str = "export_declaration";
pub const VARIABLE_DECLARATION: &str = "variable_declaration";
pub const FUNCTION_DECLARATION: &str = "function_declaration";
pub const PARAMETERS: &str = "parameters";
pub const PARAMETER: &str = "parameter";
pub const PROPERTY_DECLARATION: &str = "property_declaration";
pub const STATE_DECLARATION: &str = "state_declaration";
pub const TYPE: &str = "type";
pub const ELEMENT: &str = "element";
pub const ATTRIBUTE: &str = "attribute";
pub const TEXT: &str = "text";
pub const BLOCK: &str = "block";
pub const EXPRESSION_STATEMENT: &str = "expression_statement";
pub const IF_STATEMENT: &str = "if_statement";
pub const FOR_STATEMENT: &str = "for_statement";
pub const WHILE_STATEMENT: &str = "while_statement";
pub const RETURN_STATEMENT: &str = "return_statement";
pub const BREAK_STATEMENT: &str = "break_statement";
pub const CONTINUE_STATEMENT: &str = "continue_statement";
pub const IDENTIFIER: &str = "identifier";
pub const STRING: &str = "string";
pub const NUMBER: &str = "number";
pub const BOOLEAN: &str = "boolean";
pub const NULL: &str = "null";
pub const ARRAY: &str = "array";
pub const OBJECT: &str = "object";
pub const PAIR: &str = "pair";
pub const BINARY_EXPRESSION: &str = "binary_expression";
pub const UNARY_EXPRESSION: &str = "unary_expression";
pub const ASSIGNMENT_EXPRESSION: &str = "assignment_expression";
pub const CALL_EXPRESSION: &str = "call_expression";
pub const ARGUMENTS: &str = "arguments";
pub const MEMBER_EXPRESSION: &str = "member_expression";
pub const INDEX_EXPRESSION: &str = "index_expression";
pub const CONDITIONAL_EXPRESSION: &str = "conditional_expression";
pub const ARROW_FUNCTION: &str = "arrow_function";

const BINARY_LEVELS: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["==", "!="],
    &["<", "<=", ">", ">="],
    &["+", "-"],
    &["*", "/", "%"],
];

#[derive(Debug)]
struct SyntaxError {
    message: String,
    line: u32,
    column: u32,
}

impl SyntaxError {
    fn into_node(self) -> ParseNode {
        ParseNode::error(self.message, self.line, self.column)
    }
}

type PResult<T> = Result<T, SyntaxError>;

pub fn parse_source(source: &str) -> ParseNode {
    let mut parser = Parser {
        tokens: tokenize(source),
        pos: 0,
    };
    parser.source_file()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    // ───────────────────────────────────────────────────────────────────────────
    // Token cursor
    // ───────────────────────────────────────────────────────────────────────────

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn nth(&self, offset: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn previous_line(&self) -> u32 {
        self.pos
            .checked_sub(1)
            .map(|i| self.tokens[i].line)
            .unwrap_or(0)
    }

    fn is_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn bump(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.current().is_punct(punct)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.current().is_keyword(keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error_here(&self, expected: &str) -> SyntaxError {
        let token = self.current();
        let message = if token.kind == TokenKind::Error {
            token.text.clone()
        } else {
            format!("expected {}, found {}", expected, token)
        };
        SyntaxError {
            message,
            line: token.line,
            column: token.column,
        }
    }

    fn expect_punct(&mut self, punct: &str) -> PResult<Token> {
        if self.at_punct(punct) {
            Ok(self.bump())
        } else {
            Err(self.error_here(&format!("'{}'", punct)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<Token> {
        if self.at_keyword(keyword) {
            Ok(self.bump())
        } else {
            Err(self.error_here(&format!("'{}'", keyword)))
        }
    }

    fn at_identifier(&self) -> bool {
        let token = self.current();
        token.kind == TokenKind::Ident && !is_keyword(&token.text)
    }

    fn identifier(&mut self) -> PResult<ParseNode> {
        if self.at_identifier() {
            let token = self.bump();
            Ok(ParseNode::leaf(IDENTIFIER, token.text, token.line, token.column))
        } else {
            Err(self.error_here("identifier"))
        }
    }

    fn start(&self, kind: &str) -> ParseNode {
        let token = self.current();
        ParseNode::new(kind, token.line, token.column)
    }

    fn eat_terminator(&mut self) {
        if !self.eat_punct(";") {
            self.eat_punct(",");
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Recovery
    // ───────────────────────────────────────────────────────────────────────────

    /// Runs an item parser; on failure, skips to the next item boundary and
    /// yields an `error` node in place of the item.
    fn item(&mut self, parse: impl FnOnce(&mut Self) -> PResult<ParseNode>) -> ParseNode {
        let start = self.pos;
        match parse(self) {
            Ok(node) => node,
            Err(error) => {
                self.synchronize(start);
                error.into_node()
            }
        }
    }

    /// Skips to a `;` (consumed), a closing `}` of the enclosing body (kept), or
    /// the first token of a later line once at bracket depth zero.
    fn synchronize(&mut self, start: usize) {
        let mut depth = 0usize;
        while !self.is_eof() {
            let token = self.current();
            if depth == 0 {
                if token.is_punct(";") {
                    self.bump();
                    return;
                }
                if token.is_punct("}") && self.pos > start {
                    return;
                }
                if self.pos > start && token.line > self.previous_line() && token.kind != TokenKind::Punct {
                    return;
                }
            }
            match token.text.as_str() {
                "{" | "(" | "[" if token.kind == TokenKind::Punct => depth += 1,
                "}" | ")" | "]" if token.kind == TokenKind::Punct => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.bump();
        }
    }

    fn synchronize_top_level(&mut self) {
        self.bump();
        while !self.is_eof()
            && !self.at_keyword("import")
            && !self.at_keyword("page")
            && !self.at_keyword("component")
        {
            self.bump();
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Top level
    // ───────────────────────────────────────────────────────────────────────────

    fn source_file(&mut self) -> ParseNode {
        let mut root = ParseNode::new(SOURCE_FILE, 1, 1);
        while !self.is_eof() {
            if self.at_keyword("import") {
                let node = self.item(Self::import_declaration);
                root.push(node);
            } else if self.at_keyword("page") || self.at_keyword("component") {
                match self.document() {
                    Ok(node) => root.push(node),
                    Err(error) => {
                        root.push(error.into_node());
                        self.synchronize_top_level();
                    }
                }
            } else {
                root.push(self.error_here("'import', 'page' or 'component'").into_node());
                self.synchronize_top_level();
            }
        }
        root
    }

    fn import_declaration(&mut self) -> PResult<ParseNode> {
        let mut node = self.start(IMPORT_DECLARATION);
        self.expect_keyword("import")?;

        if self.at_identifier() {
            node.push(self.identifier()?);
            if self.eat_punct(",") {
                node.push(self.named_imports()?);
            }
        } else if self.at_punct("{") {
            node.push(self.named_imports()?);
        } else {
            return Err(self.error_here("import binding"));
        }

        self.expect_keyword("from")?;
        node.push(self.string_literal()?);
        self.eat_punct(";");
        Ok(node)
    }

    fn named_imports(&mut self) -> PResult<ParseNode> {
        let mut node = self.start(NAMED_IMPORTS);
        self.expect_punct("{")?;
        while !self.at_punct("}") {
            node.push(self.identifier()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(node)
    }

    fn string_literal(&mut self) -> PResult<ParseNode> {
        if self.current().kind == TokenKind::String {
            let token = self.bump();
            Ok(ParseNode::leaf(STRING, token.text, token.line, token.column))
        } else {
            Err(self.error_here("string literal"))
        }
    }

    /// `page Name { ... }` / `component Name { ... }`. Only the header can fail;
    /// body items recover individually.
    fn document(&mut self) -> PResult<ParseNode> {
        let keyword = self.bump();
        let mut node = ParseNode::leaf(DOCUMENT, keyword.text, keyword.line, keyword.column);
        node.push(self.identifier()?);
        self.expect_punct("{")?;

        while !self.at_punct("}") {
            if self.is_eof() {
                node.push(self.error_here("'}' to close the document").into_node());
                return Ok(node);
            }
            let item = self.item(Self::document_item);
            node.push(item);
        }
        self.bump();
        Ok(node)
    }

    fn document_item(&mut self) -> PResult<ParseNode> {
        if self.at_keyword("export") {
            return self.export_declaration();
        }
        if self.at_keyword("prop") {
            return self.member_declaration(PROPERTY_DECLARATION);
        }
        if self.at_keyword("state") {
            return self.member_declaration(STATE_DECLARATION);
        }
        if self.at_element_start() {
            return self.element();
        }
        self.statement()
    }

    fn export_declaration(&mut self) -> PResult<ParseNode> {
        let mut node = self.start(EXPORT_DECLARATION);
        self.expect_keyword("export")?;
        let declaration = if self.at_keyword("function") {
            self.function_declaration()?
        } else if self.at_keyword("let") || self.at_keyword("const") {
            self.variable_declaration()?
        } else {
            return Err(self.error_here("'let', 'const' or 'function' after 'export'"));
        };
        node.push(declaration);
        Ok(node)
    }

    /// `prop name: type = default;` and `state name: type = init;`
    fn member_declaration(&mut self, kind: &str) -> PResult<ParseNode> {
        let mut node = self.start(kind);
        self.bump();
        node.push(self.identifier()?);
        if self.eat_punct(":") {
            node.push(self.type_annotation()?);
        }
        if self.eat_punct("=") {
            node.push(self.expression()?);
        }
        self.eat_punct(";");
        Ok(node)
    }

    fn variable_declaration(&mut self) -> PResult<ParseNode> {
        let keyword = self.bump();
        let mut node = ParseNode::leaf(VARIABLE_DECLARATION, keyword.text, keyword.line, keyword.column);
        node.push(self.identifier()?);
        if self.eat_punct(":") {
            node.push(self.type_annotation()?);
        }
        if self.eat_punct("=") {
            node.push(self.expression()?);
        }
        self.eat_punct(";");
        Ok(node)
    }

    /// `name`, `name[]`, `name[][]?`. The node text carries the suffixes.
    fn type_annotation(&mut self) -> PResult<ParseNode> {
        let token = self.current().clone();
        if token.kind != TokenKind::Ident {
            return Err(self.error_here("type name"));
        }
        self.bump();
        let mut text = token.text;
        while self.at_punct("[") && self.nth(1).is_punct("]") {
            self.bump();
            self.bump();
            text.push_str("[]");
        }
        if self.eat_punct("?") {
            text.push('?');
        }
        Ok(ParseNode::leaf(TYPE, text, token.line, token.column))
    }

    fn function_declaration(&mut self) -> PResult<ParseNode> {
        let mut node = self.start(FUNCTION_DECLARATION);
        self.expect_keyword("function")?;
        node.push(self.identifier()?);
        node.push(self.parameters()?);
        if self.eat_punct(":") {
            node.push(self.type_annotation()?);
        }
        node.push(self.block()?);
        Ok(node)
    }

    fn parameters(&mut self) -> PResult<ParseNode> {
        let mut node = self.start(PARAMETERS);
        self.expect_punct("(")?;
        while !self.at_punct(")") {
            let mut param = self.start(PARAMETER);
            param.push(self.identifier()?);
            if self.eat_punct(":") {
                param.push(self.type_annotation()?);
            }
            if self.eat_punct("=") {
                param.push(self.expression()?);
            }
            node.push(param);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(node)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Elements
    // ───────────────────────────────────────────────────────────────────────────

    fn at_element_start(&self) -> bool {
        let token = self.current();
        self.at_identifier()
            && token.text.starts_with(|c: char| c.is_ascii_uppercase())
            && self.nth(1).is_punct("{")
    }

    fn element(&mut self) -> PResult<ParseNode> {
        let mut node = self.start(ELEMENT);
        node.push(self.identifier()?);
        self.expect_punct("{")?;
        while !self.at_punct("}") {
            if self.is_eof() {
                return Err(self.error_here("'}' to close the element"));
            }
            let item = self.item(Self::element_item);
            node.push(item);
        }
        self.bump();
        Ok(node)
    }

    fn element_item(&mut self) -> PResult<ParseNode> {
        if self.at_keyword("let") || self.at_keyword("const") {
            return self.variable_declaration();
        }
        if self.current().kind == TokenKind::String {
            let token = self.bump();
            self.eat_terminator();
            return Ok(ParseNode::leaf(TEXT, token.text, token.line, token.column));
        }
        if self.at_element_start() {
            return self.element();
        }
        if self.current().kind == TokenKind::Ident && self.nth(1).is_punct(":") {
            let name = self.bump();
            self.bump();
            let mut node = ParseNode::new(ATTRIBUTE, name.line, name.column);
            node.push(ParseNode::leaf(IDENTIFIER, name.text, name.line, name.column));
            node.push(self.expression()?);
            self.eat_terminator();
            return Ok(node);
        }
        Err(self.error_here("attribute, element, text or 'let'"))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Statements
    // ───────────────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> PResult<ParseNode> {
        if self.at_punct("{") {
            return self.block();
        }
        if self.at_keyword("let") || self.at_keyword("const") {
            return self.variable_declaration();
        }
        if self.at_keyword("function") {
            return self.function_declaration();
        }
        if self.at_keyword("if") {
            return self.if_statement();
        }
        if self.at_keyword("for") {
            let mut node = self.start(FOR_STATEMENT);
            self.bump();
            self.expect_punct("(")?;
            node.push(self.identifier()?);
            self.expect_keyword("in")?;
            node.push(self.expression()?);
            self.expect_punct(")")?;
            node.push(self.block()?);
            return Ok(node);
        }
        if self.at_keyword("while") {
            let mut node = self.start(WHILE_STATEMENT);
            self.bump();
            self.expect_punct("(")?;
            node.push(self.expression()?);
            self.expect_punct(")")?;
            node.push(self.block()?);
            return Ok(node);
        }
        if self.at_keyword("return") {
            let mut node = self.start(RETURN_STATEMENT);
            let keyword = self.bump();
            let ends_here = self.at_punct(";") || self.at_punct("}") || self.current().line > keyword.line;
            if !ends_here {
                node.push(self.expression()?);
            }
            self.eat_punct(";");
            return Ok(node);
        }
        if self.at_keyword("break") || self.at_keyword("continue") {
            let kind = if self.at_keyword("break") {
                BREAK_STATEMENT
            } else {
                CONTINUE_STATEMENT
            };
            let node = self.start(kind);
            self.bump();
            self.eat_punct(";");
            return Ok(node);
        }
        if self.at_keyword("import") {
            return Err(self.error_here("statement ('import' is only allowed at file level)"));
        }

        let mut node = self.start(EXPRESSION_STATEMENT);
        node.push(self.expression()?);
        self.eat_punct(";");
        Ok(node)
    }

    fn block(&mut self) -> PResult<ParseNode> {
        let mut node = self.start(BLOCK);
        self.expect_punct("{")?;
        while !self.at_punct("}") {
            if self.is_eof() {
                return Err(self.error_here("'}' to close the block"));
            }
            let statement = self.item(Self::statement);
            node.push(statement);
        }
        self.bump();
        Ok(node)
    }

    fn if_statement(&mut self) -> PResult<ParseNode> {
        let mut node = self.start(IF_STATEMENT);
        self.expect_keyword("if")?;
        self.expect_punct("(")?;
        node.push(self.expression()?);
        self.expect_punct(")")?;
        node.push(self.block()?);
        if self.at_keyword("else") {
            self.bump();
            if self.at_keyword("if") {
                node.push(self.if_statement()?);
            } else {
                node.push(self.block()?);
            }
        }
        Ok(node)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Expressions
    // ───────────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> PResult<ParseNode> {
        let target = self.conditional()?;
        let op = ["=", "+=", "-="].into_iter().find(|op| self.at_punct(op));
        let Some(op) = op else {
            return Ok(target);
        };
        if !matches!(
            target.kind.as_str(),
            IDENTIFIER | MEMBER_EXPRESSION | INDEX_EXPRESSION
        ) {
            return Err(self.error_here("assignable expression before assignment operator"));
        }
        self.bump();
        let value = self.expression()?;
        Ok(ParseNode::leaf(ASSIGNMENT_EXPRESSION, op, target.line, target.column)
            .with_child(target)
            .with_child(value))
    }

    fn conditional(&mut self) -> PResult<ParseNode> {
        let condition = self.binary(0)?;
        if !self.eat_punct("?") {
            return Ok(condition);
        }
        let consequent = self.expression()?;
        self.expect_punct(":")?;
        let alternate = self.expression()?;
        Ok(ParseNode::new(CONDITIONAL_EXPRESSION, condition.line, condition.column)
            .with_child(condition)
            .with_child(consequent)
            .with_child(alternate))
    }

    fn binary(&mut self, level: usize) -> PResult<ParseNode> {
        let Some(ops) = BINARY_LEVELS.get(level) else {
            return self.unary();
        };
        let mut left = self.binary(level + 1)?;
        while let Some(op) = ops.iter().copied().find(|op| self.at_punct(op)) {
            self.bump();
            let right = self.binary(level + 1)?;
            left = ParseNode::leaf(BINARY_EXPRESSION, op, left.line, left.column)
                .with_child(left)
                .with_child(right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> PResult<ParseNode> {
        if self.at_punct("!") || self.at_punct("-") {
            let op = self.bump();
            let operand = self.unary()?;
            return Ok(ParseNode::leaf(UNARY_EXPRESSION, op.text, op.line, op.column).with_child(operand));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> PResult<ParseNode> {
        let mut expr = self.primary()?;
        loop {
            let (line, column) = (expr.line, expr.column);
            if self.at_punct("(") {
                let mut arguments = self.start(ARGUMENTS);
                self.bump();
                while !self.at_punct(")") {
                    arguments.push(self.expression()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct(")")?;
                expr = ParseNode::new(CALL_EXPRESSION, line, column)
                    .with_child(expr)
                    .with_child(arguments);
            } else if self.at_punct(".") {
                self.bump();
                let property = self.property_name()?;
                expr = ParseNode::new(MEMBER_EXPRESSION, line, column)
                    .with_child(expr)
                    .with_child(property);
            } else if self.at_punct("[") {
                self.bump();
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = ParseNode::new(INDEX_EXPRESSION, line, column)
                    .with_child(expr)
                    .with_child(index);
            } else {
                return Ok(expr);
            }
        }
    }

    /// Member and object keys may be keywords (`item.state`).
    fn property_name(&mut self) -> PResult<ParseNode> {
        if self.current().kind == TokenKind::Ident {
            let token = self.bump();
            Ok(ParseNode::leaf(IDENTIFIER, token.text, token.line, token.column))
        } else {
            Err(self.error_here("property name"))
        }
    }

    fn primary(&mut self) -> PResult<ParseNode> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Number => {
                self.bump();
                Ok(ParseNode::leaf(NUMBER, token.text, token.line, token.column))
            }
            TokenKind::String => {
                self.bump();
                Ok(ParseNode::leaf(STRING, token.text, token.line, token.column))
            }
            TokenKind::Ident if token.text == "true" || token.text == "false" => {
                self.bump();
                Ok(ParseNode::leaf(BOOLEAN, token.text, token.line, token.column))
            }
            TokenKind::Ident if token.text == "null" => {
                self.bump();
                Ok(ParseNode::new(NULL, token.line, token.column))
            }
            TokenKind::Ident if self.at_identifier() && self.nth(1).is_punct("=>") => {
                let mut params = ParseNode::new(PARAMETERS, token.line, token.column);
                let name = self.identifier()?;
                params.push(ParseNode::new(PARAMETER, token.line, token.column).with_child(name));
                self.bump();
                self.arrow_body(params)
            }
            TokenKind::Ident if self.at_identifier() => self.identifier(),
            TokenKind::Punct if token.text == "(" => {
                if self.at_arrow_parameters() {
                    let params = self.parameters()?;
                    self.expect_punct("=>")?;
                    return self.arrow_body(params);
                }
                self.bump();
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct if token.text == "[" => {
                let mut node = self.start(ARRAY);
                self.bump();
                while !self.at_punct("]") {
                    node.push(self.expression()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                Ok(node)
            }
            TokenKind::Punct if token.text == "{" => self.object(),
            _ => Err(self.error_here("expression")),
        }
    }

    fn object(&mut self) -> PResult<ParseNode> {
        let mut node = self.start(OBJECT);
        self.expect_punct("{")?;
        while !self.at_punct("}") {
            let key = if self.current().kind == TokenKind::String {
                let token = self.bump();
                ParseNode::leaf(IDENTIFIER, token.text, token.line, token.column)
            } else {
                self.property_name()?
            };
            self.expect_punct(":")?;
            let value = self.expression()?;
            node.push(
                ParseNode::new(PAIR, key.line, key.column)
                    .with_child(key)
                    .with_child(value),
            );
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(node)
    }

    /// Looks past the matching `)` for `=>`.
    fn at_arrow_parameters(&self) -> bool {
        let mut depth = 0usize;
        let mut offset = 0;
        loop {
            let token = self.nth(offset);
            match token.kind {
                TokenKind::Eof => return false,
                TokenKind::Punct if token.text == "(" => depth += 1,
                TokenKind::Punct if token.text == ")" => {
                    depth -= 1;
                    if depth == 0 {
                        return self.nth(offset + 1).is_punct("=>");
                    }
                }
                _ => {}
            }
            offset += 1;
        }
    }

    fn arrow_body(&mut self, params: ParseNode) -> PResult<ParseNode> {
        let mut node = ParseNode::new(ARROW_FUNCTION, params.line, params.column);
        node.push(params);
        if self.at_punct("{") {
            node.push(self.block()?);
        } else {
            node.push(self.expression()?);
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(source: &str) -> ParseNode {
        let tree = parse_source(source);
        tree.child(DOCUMENT).cloned().expect("document node")
    }

    #[test]
    fn test_parses_imports_and_document_header() {
        let tree = parse_source(
            "import Button from \"./Button.jml\";\nimport { a, b } from './util.jml';\npage Home {}",
        );
        assert!(!tree.contains_error(), "{:?}", tree.find_error());
        let imports: Vec<_> = tree.children_of(IMPORT_DECLARATION).collect();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].children[0].text, "Button");
        assert_eq!(imports[0].children[1].text, "./Button.jml");
        assert_eq!(imports[1].children[0].kind, NAMED_IMPORTS);
        assert_eq!(imports[1].children[0].children.len(), 2);

        let doc = tree.child(DOCUMENT).unwrap();
        assert_eq!(doc.text, "page");
        assert_eq!(doc.children[0].text, "Home");
        assert_eq!((doc.line, doc.column), (3, 1));
    }

    #[test]
    fn test_parses_element_items() {
        let doc = document(
            r#"component Card {
                View {
                    class: "card"
                    let label = title + "!";
                    Heading { text: label }
                    Button { label: "Add", onClick: () => add(1) }
                    "Done"
                }
            }"#,
        );
        let view = &doc.children[1];
        assert_eq!(view.kind, ELEMENT);
        let kinds: Vec<_> = view.children.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![IDENTIFIER, ATTRIBUTE, VARIABLE_DECLARATION, ELEMENT, ELEMENT, TEXT]
        );
        let button = &view.children[4];
        assert_eq!(button.children.len(), 3);
        assert_eq!(button.children[2].children[1].kind, ARROW_FUNCTION);
    }

    #[test]
    fn test_operator_precedence() {
        let doc = document("page P { const x = a || b && c + d * -e; }");
        let init = &doc.children[1].children[1];
        assert_eq!(init.text, "||");
        let and = &init.children[1];
        assert_eq!(and.text, "&&");
        let plus = &and.children[1];
        assert_eq!(plus.text, "+");
        assert_eq!(plus.children[1].text, "*");
        assert_eq!(plus.children[1].children[1].kind, UNARY_EXPRESSION);
    }

    #[test]
    fn test_function_with_control_flow() {
        let doc = document(
            r#"page P {
                function run(items: string[], limit: number = 3): void {
                    for (item in items) { if (item == "x") { break; } else if (limit) { continue; } }
                    while (limit > 0) { limit -= 1; }
                    return;
                }
            }"#,
        );
        assert!(!doc.contains_error(), "{:?}", doc.find_error());
        let function = &doc.children[1];
        assert_eq!(function.kind, FUNCTION_DECLARATION);
        let params = function.child(PARAMETERS).unwrap();
        assert_eq!(params.children[0].child(TYPE).unwrap().text, "string[]");
        assert_eq!(function.child(TYPE).unwrap().text, "void");
        let body = function.child(BLOCK).unwrap();
        let kinds: Vec<_> = body.children.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec![FOR_STATEMENT, WHILE_STATEMENT, RETURN_STATEMENT]);
    }

    #[test]
    fn test_recovers_at_item_level() {
        let doc = document(
            r#"page P {
                prop title: string = ;
                state count: number = 0;
                View { class: @
                    Text { text: "ok" }
                }
            }"#,
        );
        assert!(doc.children[1].is_error());
        assert_eq!(doc.children[2].kind, STATE_DECLARATION);
        let view = &doc.children[3];
        assert_eq!(view.kind, ELEMENT);
        assert!(view.children[1].is_error());
        assert_eq!(view.children[2].kind, ELEMENT);
    }

    #[test]
    fn test_invalid_assignment_target_is_error() {
        let doc = document("page P { function f() { a + b = 3; ok(); } }");
        let body = doc.children[1].child(BLOCK).unwrap();
        assert!(body.children[0].is_error());
        assert_eq!(body.children[1].kind, EXPRESSION_STATEMENT);
    }

    #[test]
    fn test_missing_header_yields_error_only() {
        let tree = parse_source("page { }\nimport X from \"./x.jml\";");
        assert!(tree.children[0].is_error());
        assert!(tree.child(DOCUMENT).is_none());
        assert_eq!(tree.children[1].kind, IMPORT_DECLARATION);
    }
}
