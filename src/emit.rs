//! HTML emission.
//!
//! Prints a document's root element as HTML. Registry components become their
//! output tag; anything else is treated as a user component placeholder.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::ast::*;
use crate::registry::{ComponentDef, ComponentRegistry, OutputMapping};
use crate::visitor::{ExprPrinter, Visitor};

const INDENT: &str = "  ";

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\"', "&quot;")
        .replace('\'', "&#39;")
}

/// `out_dir/<path relative to source_dir>.html`. Files outside `source_dir`
/// keep only their file name.
pub fn output_path(source_dir: &Path, out_dir: &Path, file: &Path) -> PathBuf {
    let relative = file
        .strip_prefix(source_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| file.file_name().map(PathBuf::from).unwrap_or_default());
    out_dir.join(relative).with_extension("html")
}

/// Attribute value as it appears in markup.
enum Rendered {
    Text(String),
    /// Present without a value (`disabled`).
    Flag,
    Absent,
}

fn render_value(expr: &Expr) -> Rendered {
    match expr {
        Expr::String(s) => Rendered::Text(s.value.clone()),
        Expr::Number(n) => Rendered::Text(n.value.to_string()),
        Expr::Boolean(b) if b.value => Rendered::Flag,
        Expr::Boolean(_) | Expr::Null(_) => Rendered::Absent,
        other => Rendered::Text(format!("{{{}}}", ExprPrinter::print(other))),
    }
}

pub struct HtmlEmitter<'a> {
    registry: &'a ComponentRegistry,
    /// Default-imported component names. These shadow registry components.
    user_components: HashSet<String>,
    out: String,
    depth: usize,
}

impl<'a> HtmlEmitter<'a> {
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self {
            registry,
            user_components: HashSet::new(),
            out: String::new(),
            depth: 0,
        }
    }

    /// Renders the document. Pages get a full HTML shell; components render
    /// their root element only. A document without a root element yields an
    /// empty string.
    pub fn emit(mut self, document: &Document) -> String {
        self.user_components = document
            .imports()
            .filter_map(|import| import.default.as_ref())
            .map(|id| id.name.clone())
            .collect();

        let Some(root) = document.root_element() else {
            return self.out;
        };

        match document.kind {
            DocumentKind::Page => {
                self.out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
                let _ = writeln!(
                    self.out,
                    "{}<meta charset=\"utf-8\">\n{}<title>{}</title>",
                    INDENT,
                    INDENT,
                    escape_html(&document.name.name)
                );
                self.out.push_str("</head>\n<body>\n");
                self.depth = 1;
                self.visit_element(root);
                self.out.push_str("</body>\n</html>\n");
            }
            DocumentKind::Component => self.visit_element(root),
        }
        self.out
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn registry_def(&self, name: &str) -> Option<&'a ComponentDef> {
        if self.user_components.contains(name) {
            return None;
        }
        self.registry.get(name)
    }

    fn open_tag(tag: &str, classes: &[String], attrs: &[(String, Rendered)]) -> String {
        let mut open = format!("<{}", tag);
        if !classes.is_empty() {
            let _ = write!(open, " class=\"{}\"", escape_html(&classes.join(" ")));
        }
        for (name, value) in attrs {
            match value {
                Rendered::Text(text) => {
                    let _ = write!(open, " {}=\"{}\"", name, escape_html(text));
                }
                Rendered::Flag => {
                    let _ = write!(open, " {}", name);
                }
                Rendered::Absent => {}
            }
        }
        open.push('>');
        open
    }

    fn emit_registry_element(&mut self, def: &ComponentDef, node: &ComponentElement) {
        let mut classes = def.classes.clone();
        let mut attrs: Vec<(String, Rendered)> = Vec::new();
        let mut content: Vec<Rendered> = Vec::new();
        let mut given: HashSet<&str> = HashSet::new();

        for attr in node.attributes() {
            let name = attr.name.name.as_str();
            given.insert(name);
            if name == "class" {
                if let Rendered::Text(text) = render_value(&attr.value) {
                    classes.extend(text.split_whitespace().map(str::to_string));
                }
                continue;
            }
            match def.attribute(name).map(|a| &a.maps_to) {
                Some(OutputMapping::Attribute(out)) => attrs.push((out.clone(), render_value(&attr.value))),
                Some(OutputMapping::Content) => content.push(render_value(&attr.value)),
                Some(OutputMapping::Omit) => {}
                None => attrs.push((name.to_string(), render_value(&attr.value))),
            }
        }

        for (name, meta) in &def.attributes {
            let Some(default) = &meta.default else { continue };
            if given.contains(name.as_str()) {
                continue;
            }
            match &meta.maps_to {
                OutputMapping::Attribute(out) => attrs.push((out.clone(), Rendered::Text(default.clone()))),
                OutputMapping::Content => content.push(Rendered::Text(default.clone())),
                OutputMapping::Omit => {}
            }
        }

        self.line(&Self::open_tag(&def.tag, &classes, &attrs));
        if def.self_closing {
            return;
        }

        self.depth += 1;
        for text in content {
            if let Rendered::Text(text) = text {
                self.line(&escape_html(&text));
            }
        }
        self.children(node);
        self.depth -= 1;
        self.line(&format!("</{}>", def.tag));
    }

    fn emit_user_element(&mut self, node: &ComponentElement) {
        let mut classes: Vec<String> = Vec::new();
        let mut props = Vec::new();
        for attr in node.attributes() {
            let value = render_value(&attr.value);
            if attr.name.name == "class" {
                if let Rendered::Text(text) = &value {
                    classes.extend(text.split_whitespace().map(str::to_string));
                }
                continue;
            }
            props.push((format!("data-prop-{}", attr.name.name), value));
        }

        let mut attrs = vec![(
            "data-component".to_string(),
            Rendered::Text(node.tag.name.clone()),
        )];
        if !classes.is_empty() {
            attrs.push(("class".to_string(), Rendered::Text(classes.join(" "))));
        }
        attrs.extend(props);
        self.line(&Self::open_tag("div", &[], &attrs));

        self.depth += 1;
        self.children(node);
        self.depth -= 1;
        self.line("</div>");
    }

    fn children(&mut self, node: &ComponentElement) {
        for child in node.children() {
            child.accept(self);
        }
    }
}

impl Visitor for HtmlEmitter<'_> {
    fn visit_element(&mut self, node: &ComponentElement) {
        match self.registry_def(&node.tag.name) {
            Some(def) => self.emit_registry_element(def, node),
            None => self.emit_user_element(node),
        }
    }

    fn visit_text(&mut self, node: &TextContent) {
        self.line(&escape_html(&node.value));
    }
}

pub fn emit_document(document: &Document, registry: &ComponentRegistry) -> String {
    HtmlEmitter::new(registry).emit(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_document;
    use crate::frontend::{Frontend, JmlFrontend};

    fn emit(source: &str) -> String {
        let path = Path::new("/p/src/Test.jml");
        let tree = JmlFrontend.parse(path, source);
        let output = build_document(path, &tree);
        assert!(!output.diagnostics.has_errors(), "{}", output.diagnostics);
        emit_document(&output.document.unwrap(), &ComponentRegistry::builtin())
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href='x'>&\"</a>"), "&lt;a href=&#39;x&#39;&gt;&amp;&quot;&lt;/a&gt;");
    }

    #[test]
    fn test_output_path_mirrors_source_tree() {
        assert_eq!(
            output_path(Path::new("/p/src"), Path::new("/p/dist"), Path::new("/p/src/pages/Home.jml")),
            PathBuf::from("/p/dist/pages/Home.html")
        );
        assert_eq!(
            output_path(Path::new("/p/src"), Path::new("/p/dist"), Path::new("/other/Card.jml")),
            PathBuf::from("/p/dist/Card.html")
        );
    }

    #[test]
    fn test_page_shell_and_registry_mapping() {
        let html = emit(
            r#"page Home {
                View {
                    class: "container main"
                    Heading { text: "Hi <you>" }
                    Button { label: "Add", onClick: () => go(), disabled: true }
                    Image { src: "/a.png" }
                    "plain & simple"
                }
            }"#,
        );
        assert!(html.starts_with("<!DOCTYPE html>\n<html>\n<head>\n"));
        assert!(html.contains("<title>Home</title>"));
        assert!(html.contains("  <div class=\"jml-view container main\">\n"));
        assert!(html.contains("    <h1 class=\"jml-heading\">\n      Hi &lt;you&gt;\n    </h1>\n"));
        assert!(html.contains(
            "<button class=\"jml-button\" onclick=\"{() =&gt; go()}\" disabled data-variant=\"primary\">\n      Add\n    </button>"
        ));
        assert!(html.contains("<img class=\"jml-image\" src=\"/a.png\" alt=\"\">\n"));
        assert!(!html.contains("</img>"));
        assert!(html.contains("    plain &amp; simple\n"));
        assert!(html.ends_with("</body>\n</html>\n"));
    }

    #[test]
    fn test_bound_content_and_user_components() {
        let html = emit(
            r##"import Card from "./Card.jml";
            component Panel {
                prop title: string;
                Column {
                    Text { text: title, color: "#fff" }
                    Card { heading: title, class: "wide" }
                }
            }"##,
        );
        assert_eq!(
            html,
            "<div class=\"jml-column\">\n\
             \x20 <span class=\"jml-text\" data-color=\"#fff\">\n\
             \x20   {title}\n\
             \x20 </span>\n\
             \x20 <div data-component=\"Card\" class=\"wide\" data-prop-heading=\"{title}\">\n\
             \x20 </div>\n\
             </div>\n"
        );
    }

    #[test]
    fn test_imported_name_shadows_registry_component() {
        let html = emit(
            r#"import Button from "./Button.jml";
            component Toolbar { Row { Button { label: "x" } } }"#,
        );
        assert!(html.contains("<div data-component=\"Button\" data-prop-label=\"x\">"));
        assert!(!html.contains("<button"));
    }

    #[test]
    fn test_document_without_root_is_empty() {
        assert_eq!(emit("component Util { function f() { } }"), "");
    }
}
