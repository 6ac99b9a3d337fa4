use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::Position;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_SYNTAX: &str = "JML-ERR-SYNTAX-001";
pub const ERR_MALFORMED_TREE: &str = "JML-ERR-SYNTAX-002";
pub const ERR_REDEFINITION: &str = "JML-ERR-SCOPE-001";
pub const ERR_UNRESOLVED_IDENTIFIER: &str = "JML-ERR-SCOPE-002";
pub const ERR_SCOPE_DISCIPLINE: &str = "JML-ERR-SCOPE-003";
pub const ERR_INVALID_ASSIGNMENT: &str = "JML-ERR-ASSIGN-001";
pub const ERR_LOOP_CONTROL: &str = "JML-ERR-FLOW-001";
pub const ERR_UNKNOWN_COMPONENT: &str = "JML-ERR-COMPONENT-001";
pub const ERR_COMPONENT_ATTRIBUTE: &str = "JML-ERR-COMPONENT-002";
pub const ERR_ROOT_ELEMENT: &str = "JML-ERR-COMPONENT-003";
pub const ERR_IMPORT: &str = "JML-ERR-IMPORT-001";
pub const WARN_UNUSED_IMPORT: &str = "JML-WARN-IMPORT-001";
pub const INFO_SHADOWED: &str = "JML-INFO-SCOPE-001";

/// Short statement of the rule behind a code, attached to rendered output.
pub fn rule_for(code: &str) -> &'static str {
    match code {
        ERR_SYNTAX => "Source must match the JML grammar.",
        ERR_MALFORMED_TREE => "Parse trees must follow the node shapes the AST builder expects.",
        ERR_REDEFINITION => "A name may be declared only once per scope.",
        ERR_UNRESOLVED_IDENTIFIER => "Every identifier must resolve to a declaration in scope.",
        ERR_SCOPE_DISCIPLINE => "Scope entry and exit must be balanced.",
        ERR_INVALID_ASSIGNMENT => "Only state and non-constant variables may be assigned.",
        ERR_LOOP_CONTROL => "break and continue are only valid inside loops.",
        ERR_UNKNOWN_COMPONENT => "Element tags must name a built-in or imported component.",
        ERR_COMPONENT_ATTRIBUTE => "Built-in component attributes must match the registry schema.",
        ERR_ROOT_ELEMENT => "Pages have exactly one root element; components at most one.",
        ERR_IMPORT => "Imports must name documents and exports that exist.",
        WARN_UNUSED_IMPORT => "Imported names should be used.",
        INFO_SHADOWED => "Inner declarations hide outer ones with the same name.",
        _ => "Unknown rule.",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// One finding handed to an external reporter. The core never prints these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Option<Position>,
    pub message: String,
    pub code: String,
    /// Subsystem that produced the diagnostic (`parser`, `resolver`, ...).
    pub origin: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: &str,
        message: impl Into<String>,
        position: Option<Position>,
        origin: &str,
    ) -> Self {
        Self {
            severity,
            position,
            message: message.into(),
            code: code.to_string(),
            origin: origin.to_string(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>, position: Position, origin: &str) -> Self {
        Self::new(Severity::Error, code, message, Some(position), origin)
    }

    pub fn warning(code: &str, message: impl Into<String>, position: Position, origin: &str) -> Self {
        Self::new(Severity::Warning, code, message, Some(position), origin)
    }

    pub fn info(code: &str, message: impl Into<String>, position: Position, origin: &str) -> Self {
        Self::new(Severity::Info, code, message, Some(position), origin)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn rule(&self) -> &'static str {
        rule_for(&self.code)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = &self.position {
            write!(f, "{}: ", position)?;
        }
        write!(f, "{}[{}]: {}", self.severity.as_str(), self.code, self.message)
    }
}

/// Diagnostics owned by a single pass. Merged into the build report at the end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(other);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.items.iter().filter(move |d| d.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.items {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position_and_code() {
        let diag = Diagnostic::error(
            ERR_REDEFINITION,
            "'count' is already defined in this scope",
            Position::new("Home.jml", 4, 5),
            "resolver",
        );
        assert_eq!(
            diag.to_string(),
            "Home.jml:4:5: error[JML-ERR-SCOPE-001]: 'count' is already defined in this scope"
        );
        assert_eq!(diag.rule(), "A name may be declared only once per scope.");
    }

    #[test]
    fn test_error_counting_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(
            WARN_UNUSED_IMPORT,
            "unused",
            Position::new("a.jml", 1, 1),
            "resolver",
        ));
        assert!(!diags.has_errors());
        diags.push(Diagnostic::error(
            ERR_IMPORT,
            "missing",
            Position::new("a.jml", 2, 1),
            "resolver",
        ));
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_serializes_lowercase_severity() {
        let diag = Diagnostic::info(INFO_SHADOWED, "shadowed", Position::new("a.jml", 1, 2), "resolver");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "info");
        assert_eq!(json["position"]["line"], 1);
        assert_eq!(json["origin"], "resolver");
    }
}
