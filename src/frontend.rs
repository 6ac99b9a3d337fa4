//! Parse-tree boundary.
//!
//! A `Frontend` turns source text into a generic `ParseNode` tree. Parsing never
//! fails: syntax problems are `error` nodes inside the tree, and the AST builder
//! decides what survives. Trees are serde-serializable so an out-of-process
//! grammar can hand them over as JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::parser;

pub const ERROR_KIND: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseNode {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    pub line: u32,
    pub column: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    pub fn new(kind: &str, line: u32, column: u32) -> Self {
        Self {
            kind: kind.to_string(),
            text: String::new(),
            line,
            column,
            children: Vec::new(),
        }
    }

    pub fn leaf(kind: &str, text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            text: text.into(),
            ..Self::new(kind, line, column)
        }
    }

    pub fn error(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self::leaf(ERROR_KIND, message, line, column)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: ParseNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: ParseNode) {
        self.children.push(child);
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn is_error(&self) -> bool {
        self.kind == ERROR_KIND
    }

    /// First `error` node in pre-order, including `self`.
    pub fn find_error(&self) -> Option<&ParseNode> {
        if self.is_error() {
            return Some(self);
        }
        self.children.iter().find_map(ParseNode::find_error)
    }

    pub fn contains_error(&self) -> bool {
        self.find_error().is_some()
    }

    pub fn child(&self, kind: &str) -> Option<&ParseNode> {
        self.children.iter().find(|c| c.kind == kind)
    }

    pub fn children_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a ParseNode> + 'a {
        self.children.iter().filter(move |c| c.kind == kind)
    }
}

/// Source-to-tree collaborator used by the build manager.
pub trait Frontend: Send + Sync {
    fn parse(&self, path: &Path, source: &str) -> ParseNode;

    /// File extension (without dot) this frontend understands.
    fn extension(&self) -> &str {
        "jml"
    }
}

/// Hand-written recursive-descent frontend for the JML surface syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct JmlFrontend;

impl Frontend for JmlFrontend {
    fn parse(&self, _path: &Path, source: &str) -> ParseNode {
        parser::parse_source(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_error_is_preorder() {
        let tree = ParseNode::new("source_file", 1, 1)
            .with_child(ParseNode::leaf("identifier", "a", 1, 1))
            .with_child(
                ParseNode::new("block", 2, 1)
                    .with_child(ParseNode::error("first", 2, 3))
                    .with_child(ParseNode::error("second", 3, 1)),
            );
        assert_eq!(tree.find_error().unwrap().text, "first");
        assert!(tree.contains_error());
        assert!(!tree.children[0].contains_error());
    }

    #[test]
    fn test_json_shape_omits_empty_fields() {
        let node = ParseNode::new("document", 1, 1)
            .with_text("page")
            .with_child(ParseNode::leaf("identifier", "Home", 1, 6));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "document");
        assert!(json["children"][0].get("children").is_none());

        let back: ParseNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_jml_frontend_never_fails() {
        let tree = JmlFrontend.parse(Path::new("x.jml"), "page { ??? ");
        assert_eq!(tree.kind, "source_file");
        assert!(tree.contains_error());
    }
}
