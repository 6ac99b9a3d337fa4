//! Discovery Module for JML
//!
//! Recursively scans a source directory for `.jml` files, parses each one and
//! extracts the metadata other passes need before full compilation: the
//! document name and kind, resolved imports, exported names, declared props
//! and the element tags it uses.

use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::ast::*;
use crate::builder::{build_document, BuildOutput};
use crate::frontend::Frontend;
use crate::visitor::{walk, AstNode, Visitor};

// ═══════════════════════════════════════════════════════════════════════════════
// METADATA TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub specifier: String,
    /// Target file for relative specifiers; `None` for external packages.
    pub resolved: Option<PathBuf>,
    pub default: Option<String>,
    pub named: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub name: String,
    pub imports: Vec<ImportSummary>,
    pub exports: Vec<String>,
    pub props: Vec<String>,
    /// Element tags in first-use order, without duplicates.
    pub tags: Vec<String>,
}

impl DocumentSummary {
    /// Files this document depends on, in import order, without duplicates.
    /// External imports are not dependencies.
    pub fn dependencies(&self) -> Vec<PathBuf> {
        let mut deps: Vec<PathBuf> = Vec::new();
        for resolved in self.imports.iter().filter_map(|i| i.resolved.as_ref()) {
            if !deps.contains(resolved) {
                deps.push(resolved.clone());
            }
        }
        deps
    }

    pub fn exports_name(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e == name)
    }
}

/// Summaries of every discovered document keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    documents: IndexMap<PathBuf, DocumentSummary>,
}

impl ProjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, summary: DocumentSummary) {
        self.documents.insert(summary.path.clone(), summary);
    }

    pub fn get(&self, path: &Path) -> Option<&DocumentSummary> {
        self.documents.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentSummary> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FromIterator<DocumentSummary> for ProjectIndex {
    fn from_iter<I: IntoIterator<Item = DocumentSummary>>(iter: I) -> Self {
        let mut index = ProjectIndex::new();
        iter.into_iter().for_each(|s| index.insert(s));
        index
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATHS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lexically resolves `.` and `..` without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `./` and `../` specifiers name project files; anything else is external.
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Resolves a relative import specifier against the importing file's
/// directory. A specifier without extension gets `.jml` appended. External
/// specifiers resolve to `None`.
pub fn resolve_import(from: &Path, specifier: &str) -> Option<PathBuf> {
    if !is_relative_specifier(specifier) {
        return None;
    }
    let base = from.parent().unwrap_or_else(|| Path::new(""));
    let mut target = base.join(specifier);
    if target.extension().is_none() {
        target.set_extension("jml");
    }
    Some(normalize_path(&target))
}

/// Recursively find all files with `extension` under `dir`, sorted.
pub fn find_source_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            root: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().map_or(false, |ext| ext == extension) {
            files.push(normalize_path(path));
        }
    }

    files.sort();
    Ok(files)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUMMARY EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct TagCollector {
    tags: Vec<String>,
}

impl Visitor for TagCollector {
    fn visit_element(&mut self, node: &ComponentElement) {
        if !self.tags.contains(&node.tag.name) {
            self.tags.push(node.tag.name.clone());
        }
    }
}

pub fn summarize(document: &Document) -> DocumentSummary {
    let mut collector = TagCollector::default();
    walk(document.as_node(), &mut collector);

    let imports = document
        .imports()
        .map(|import| ImportSummary {
            specifier: import.source.clone(),
            resolved: resolve_import(&document.path, &import.source),
            default: import.default.as_ref().map(|d| d.name.clone()),
            named: import.named.iter().map(|n| n.name.clone()).collect(),
        })
        .collect();

    let exports = document
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Export(export) => export.exported_name().map(|n| n.name.clone()),
            _ => None,
        })
        .collect();

    let props = document
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Property(prop) => Some(prop.name.name.clone()),
            _ => None,
        })
        .collect();

    DocumentSummary {
        path: document.path.clone(),
        kind: document.kind,
        name: document.name.name.clone(),
        imports,
        exports,
        props,
        tags: collector.tags,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// One source file after parsing and AST building.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub source: String,
    pub output: BuildOutput,
    pub summary: Option<DocumentSummary>,
}

impl ParsedFile {
    pub fn dependencies(&self) -> Vec<PathBuf> {
        self.summary
            .as_ref()
            .map(DocumentSummary::dependencies)
            .unwrap_or_default()
    }
}

/// Reads and parses a single file.
pub fn parse_file(path: &Path, frontend: &dyn Frontend) -> Result<ParsedFile, DiscoveryError> {
    let source = fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_source_file(path, source, frontend))
}

pub fn parse_source_file(path: &Path, source: String, frontend: &dyn Frontend) -> ParsedFile {
    let tree = frontend.parse(path, &source);
    let output = build_document(path, &tree);
    let summary = output.document.as_ref().map(summarize);
    tracing::trace!(
        path = %path.display(),
        diagnostics = output.diagnostics.len(),
        "parsed source file"
    );
    ParsedFile {
        path: path.to_path_buf(),
        source,
        output,
        summary,
    }
}

/// Scans `dir` and parses every file with `extension` found.
pub fn discover(dir: &Path, extension: &str, frontend: &dyn Frontend) -> Result<Vec<ParsedFile>, DiscoveryError> {
    let files = find_source_files(dir, extension)?;
    tracing::debug!(root = %dir.display(), count = files.len(), "discovered source files");
    files.iter().map(|path| parse_file(path, frontend)).collect()
}
