//! Component Registry for JML
//!
//! Maps built-in component names (`View`, `Button`, ...) to their HTML output
//! tag, default classes and attribute schema. The registry is built once,
//! wrapped in an `Arc` and only read during compilation.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

lazy_static! {
    static ref COLOR_RE: Regex =
        Regex::new(r"^(#([0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})|[a-z]+|(rgb|hsl)a?\([^)]*\))$")
            .unwrap();

    /// Absolute http(s)/mailto URLs, root-relative and dot-relative paths, fragments.
    static ref URL_RE: Regex = Regex::new(r"^(https?://\S+|mailto:\S+|/\S*|\.{1,2}/\S*|#\S*)$").unwrap();

    static ref ATTRIBUTE_NAME_RE: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]*$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEMA TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    String,
    Number,
    Boolean,
    Color,
    Url,
    Enum(Vec<String>),
    Any,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::String => f.write_str("string"),
            AttrType::Number => f.write_str("number"),
            AttrType::Boolean => f.write_str("boolean"),
            AttrType::Color => f.write_str("color"),
            AttrType::Url => f.write_str("url"),
            AttrType::Enum(values) => write!(f, "one of [{}]", values.join(", ")),
            AttrType::Any => f.write_str("any"),
        }
    }
}

/// Where an attribute lands in the emitted HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMapping {
    /// Emitted as an HTML attribute with this name.
    Attribute(String),
    /// Emitted as the element's text content.
    Content,
    /// Accepted but not emitted.
    Omit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    #[serde(rename = "type")]
    pub ty: AttrType,
    #[serde(default)]
    pub required: bool,
    pub maps_to: OutputMapping,
    #[serde(default)]
    pub default: Option<String>,
}

impl AttributeDef {
    fn new(ty: AttrType, output: OutputMapping) -> Self {
        Self {
            ty,
            required: false,
            maps_to: output,
            default: None,
        }
    }

    fn html(name: &str, ty: AttrType) -> Self {
        Self::new(ty, OutputMapping::Attribute(name.to_string()))
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    Layout,
    Typography,
    Form,
    Media,
    Navigation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
    pub name: String,
    pub tag: String,
    pub category: ComponentCategory,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeDef>,
    #[serde(default)]
    pub self_closing: bool,
}

impl ComponentDef {
    fn new(name: &str, tag: &str, category: ComponentCategory, class: &str) -> Self {
        let mut attributes = IndexMap::new();
        attributes.insert("class".to_string(), AttributeDef::html("class", AttrType::String));
        attributes.insert("id".to_string(), AttributeDef::html("id", AttrType::String));
        attributes.insert("style".to_string(), AttributeDef::html("style", AttrType::String));
        Self {
            name: name.to_string(),
            tag: tag.to_string(),
            category,
            classes: vec![class.to_string()],
            attributes,
            self_closing: false,
        }
    }

    fn attr(mut self, name: &str, def: AttributeDef) -> Self {
        self.attributes.insert(name.to_string(), def);
        self
    }

    fn self_closing(mut self) -> Self {
        self.self_closing = true;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.get(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Attribute value as seen by the registry. Anything that is not a literal is
/// `Dynamic` and only checked for presence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropValue<'a> {
    String(&'a str),
    Number(f64),
    Boolean(bool),
    Null,
    Dynamic,
}

impl PropValue<'_> {
    fn describe(&self) -> &'static str {
        match self {
            PropValue::String(_) => "string",
            PropValue::Number(_) => "number",
            PropValue::Boolean(_) => "boolean",
            PropValue::Null => "null",
            PropValue::Dynamic => "expression",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryIssue {
    #[error("'{0}' is not a built-in component")]
    UnknownComponent(String),

    #[error("'{component}' has no attribute '{attribute}'")]
    UnknownAttribute { component: String, attribute: String },

    #[error("'{component}' requires attribute '{attribute}'")]
    MissingRequired { component: String, attribute: String },

    #[error("attribute '{attribute}' of '{component}' expects {expected}, found {found}")]
    TypeMismatch {
        component: String,
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("'{value}' is not a valid {expected} for attribute '{attribute}' of '{component}'")]
    InvalidValue {
        component: String,
        attribute: String,
        value: String,
        expected: String,
    },

    #[error("attribute '{attribute}' is given more than once on '{component}'")]
    Duplicate { component: String, attribute: String },
}

impl RegistryIssue {
    /// The attribute the issue is about, if any.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            RegistryIssue::UnknownComponent(_) => None,
            RegistryIssue::UnknownAttribute { attribute, .. }
            | RegistryIssue::MissingRequired { attribute, .. }
            | RegistryIssue::TypeMismatch { attribute, .. }
            | RegistryIssue::InvalidValue { attribute, .. }
            | RegistryIssue::Duplicate { attribute, .. } => Some(attribute),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("component '{component}' declares invalid attribute name '{attribute}'")]
    InvalidAttributeName { component: String, attribute: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, ComponentDef>,
}

impl ComponentRegistry {
    pub fn new(defs: impl IntoIterator<Item = ComponentDef>) -> Self {
        Self {
            components: defs.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }

    /// Loads a registry from a JSON array of component definitions.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let defs: Vec<ComponentDef> = serde_json::from_str(json)?;
        for def in &defs {
            if let Some(bad) = def.attributes.keys().find(|k| !ATTRIBUTE_NAME_RE.is_match(k)) {
                return Err(RegistryError::InvalidAttributeName {
                    component: def.name.clone(),
                    attribute: bad.clone(),
                });
            }
        }
        Ok(Self::new(defs))
    }

    /// The standard JML component set.
    pub fn builtin() -> Self {
        use AttrType::*;
        use ComponentCategory::*;

        let variant = Enum(vec!["primary".into(), "secondary".into(), "danger".into()]);
        let input_type = Enum(vec![
            "text".into(),
            "password".into(),
            "email".into(),
            "number".into(),
        ]);
        let target = Enum(vec!["_self".into(), "_blank".into()]);

        Self::new([
            ComponentDef::new("View", "div", Layout, "jml-view"),
            ComponentDef::new("Row", "div", Layout, "jml-row"),
            ComponentDef::new("Column", "div", Layout, "jml-column"),
            ComponentDef::new("List", "ul", Layout, "jml-list"),
            ComponentDef::new("ListItem", "li", Layout, "jml-list-item"),
            ComponentDef::new("Text", "span", Typography, "jml-text")
                .attr("text", AttributeDef::new(String, OutputMapping::Content))
                .attr(
                    "color",
                    AttributeDef::new(Color, OutputMapping::Attribute("data-color".into())),
                ),
            ComponentDef::new("Heading", "h1", Typography, "jml-heading")
                .attr("text", AttributeDef::new(String, OutputMapping::Content)),
            ComponentDef::new("Button", "button", Form, "jml-button")
                .attr("label", AttributeDef::new(String, OutputMapping::Content))
                .attr("onClick", AttributeDef::html("onclick", Any))
                .attr("disabled", AttributeDef::html("disabled", Boolean))
                .attr(
                    "variant",
                    AttributeDef::new(variant, OutputMapping::Attribute("data-variant".into()))
                        .default_value("primary"),
                ),
            ComponentDef::new("Input", "input", Form, "jml-input")
                .attr("value", AttributeDef::html("value", Any))
                .attr("placeholder", AttributeDef::html("placeholder", String))
                .attr(
                    "type",
                    AttributeDef::html("type", input_type).default_value("text"),
                )
                .attr("onChange", AttributeDef::html("onchange", Any))
                .self_closing(),
            ComponentDef::new("Link", "a", Navigation, "jml-link")
                .attr("href", AttributeDef::html("href", Url).required())
                .attr("text", AttributeDef::new(String, OutputMapping::Content))
                .attr("target", AttributeDef::html("target", target)),
            ComponentDef::new("Image", "img", Media, "jml-image")
                .attr("src", AttributeDef::html("src", Url).required())
                .attr("alt", AttributeDef::html("alt", String).default_value(""))
                .attr("width", AttributeDef::html("width", Number))
                .attr("height", AttributeDef::html("height", Number))
                .self_closing(),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&ComponentDef> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn is_self_closing(&self, name: &str) -> bool {
        self.get(name).map(|d| d.self_closing).unwrap_or(false)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Checks attribute names, required attributes and literal value types.
    /// Returns every issue found, in attribute order.
    pub fn validate(&self, name: &str, properties: &[(&str, PropValue<'_>)]) -> Vec<RegistryIssue> {
        let Some(def) = self.get(name) else {
            return vec![RegistryIssue::UnknownComponent(name.to_string())];
        };

        let mut issues = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for (attr_name, value) in properties {
            if seen.contains(attr_name) {
                issues.push(RegistryIssue::Duplicate {
                    component: name.to_string(),
                    attribute: attr_name.to_string(),
                });
                continue;
            }
            seen.push(attr_name);

            let Some(attr) = def.attribute(attr_name) else {
                issues.push(RegistryIssue::UnknownAttribute {
                    component: name.to_string(),
                    attribute: attr_name.to_string(),
                });
                continue;
            };
            if let Some(issue) = check_value(name, attr_name, &attr.ty, value) {
                issues.push(issue);
            }
        }

        for (attr_name, attr) in &def.attributes {
            if attr.required && !seen.contains(&attr_name.as_str()) {
                issues.push(RegistryIssue::MissingRequired {
                    component: name.to_string(),
                    attribute: attr_name.clone(),
                });
            }
        }

        issues
    }
}

fn check_value(
    component: &str,
    attribute: &str,
    expected: &AttrType,
    value: &PropValue<'_>,
) -> Option<RegistryIssue> {
    let mismatch = || RegistryIssue::TypeMismatch {
        component: component.to_string(),
        attribute: attribute.to_string(),
        expected: expected.to_string(),
        found: value.describe().to_string(),
    };
    let invalid = |text: &str| RegistryIssue::InvalidValue {
        component: component.to_string(),
        attribute: attribute.to_string(),
        value: text.to_string(),
        expected: expected.to_string(),
    };

    match (expected, value) {
        (_, PropValue::Dynamic) | (AttrType::Any, _) => None,
        (AttrType::String, PropValue::String(_)) => None,
        (AttrType::Number, PropValue::Number(_)) => None,
        (AttrType::Boolean, PropValue::Boolean(_)) => None,
        (AttrType::Color, PropValue::String(text)) => {
            (!COLOR_RE.is_match(text)).then(|| invalid(*text))
        }
        (AttrType::Url, PropValue::String(text)) => (!URL_RE.is_match(text)).then(|| invalid(*text)),
        (AttrType::Enum(values), PropValue::String(text)) => {
            (!values.iter().any(|v| v == *text)).then(|| invalid(*text))
        }
        _ => Some(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_and_self_closing() {
        let registry = ComponentRegistry::builtin();
        let button = registry.get("Button").unwrap();
        assert_eq!(button.tag, "button");
        assert_eq!(button.classes, vec!["jml-button".to_string()]);
        assert!(registry.is_self_closing("Image"));
        assert!(registry.is_self_closing("Input"));
        assert!(!registry.is_self_closing("View"));
        assert!(!registry.is_self_closing("Nope"));
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let registry = ComponentRegistry::builtin();
        let issues = registry.validate(
            "Link",
            &[
                ("href", PropValue::String("/about")),
                ("text", PropValue::Dynamic),
                ("target", PropValue::String("_blank")),
            ],
        );
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_validate_reports_all_issues() {
        let registry = ComponentRegistry::builtin();
        let issues = registry.validate(
            "Image",
            &[
                ("alt", PropValue::Number(3.0)),
                ("srcset", PropValue::String("x")),
            ],
        );
        assert_eq!(issues.len(), 3);
        assert!(matches!(issues[0], RegistryIssue::TypeMismatch { .. }));
        assert!(matches!(issues[1], RegistryIssue::UnknownAttribute { .. }));
        assert!(matches!(
            &issues[2],
            RegistryIssue::MissingRequired { attribute, .. } if attribute == "src"
        ));
    }

    #[test]
    fn test_validate_pattern_and_enum_values() {
        let registry = ComponentRegistry::builtin();
        assert!(registry
            .validate("Text", &[("color", PropValue::String("#ff0000"))])
            .is_empty());
        assert_eq!(
            registry
                .validate("Text", &[("color", PropValue::String("#ff00"))])
                .len(),
            1
        );
        let issues = registry.validate("Button", &[("variant", PropValue::String("loud"))]);
        assert!(matches!(issues[0], RegistryIssue::InvalidValue { .. }));
        assert_eq!(issues[0].attribute(), Some("variant"));
    }

    #[test]
    fn test_validate_unknown_component_and_duplicates() {
        let registry = ComponentRegistry::builtin();
        assert_eq!(
            registry.validate("Carousel", &[]),
            vec![RegistryIssue::UnknownComponent("Carousel".into())]
        );
        let issues = registry.validate(
            "View",
            &[("id", PropValue::String("a")), ("id", PropValue::String("b"))],
        );
        assert!(matches!(issues[0], RegistryIssue::Duplicate { .. }));
    }

    #[test]
    fn test_from_json_registry() {
        let json = r#"[{
            "name": "Badge",
            "tag": "span",
            "category": "typography",
            "classes": ["badge"],
            "attributes": {
                "count": { "type": "number", "required": true, "maps_to": { "attribute": "data-count" } }
            }
        }]"#;
        let registry = ComponentRegistry::from_json(json).unwrap();
        let badge = registry.get("Badge").unwrap();
        assert_eq!(badge.attribute("count").unwrap().ty, AttrType::Number);
        assert!(!badge.self_closing);

        let bad = r#"[{"name": "X", "tag": "div", "category": "layout",
            "attributes": {"1bad": {"type": "any", "maps_to": "omit"}}}]"#;
        assert!(matches!(
            ComponentRegistry::from_json(bad),
            Err(RegistryError::InvalidAttributeName { .. })
        ));
    }
}
