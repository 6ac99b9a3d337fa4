//! Incremental Build Manager
//!
//! Drives multi-file compilation:
//!
//! 1. **Scan**: discover every source file, summarize it and rebuild the
//!    dependency graph and project index.
//! 2. **Validate**: reject dependency cycles and imports of missing files.
//! 3. **Select**: everything for a full build; for an incremental build the
//!    files that changed plus everything that transitively imports them.
//! 4. **Compile** in build order (level by level when parallel), writing one
//!    HTML artifact per file and a cache record after each success.
//!
//! A failing file stops the build. Records of files compiled before it are
//! persisted first, so the next incremental build resumes from there. The
//! failing file and everything selected after it lose their records, so
//! the next incremental build retries them even when their bytes did not
//! change.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::builder::build_document;
use crate::cache::{modified_time, BuildCache, CacheError, CacheRecord};
use crate::config::BuildConfig;
use crate::diagnostic::Diagnostics;
use crate::discovery::{discover, summarize, DiscoveryError, ProjectIndex};
use crate::emit::{emit_document, output_path};
use crate::frontend::Frontend;
use crate::graph::{DependencyGraph, FileCategory, GraphError};
use crate::registry::ComponentRegistry;
use crate::resolve::{resolve_document, ResolveError};
use crate::scope::Builtins;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compilation of {file} failed:\n{diagnostics}")]
    Compilation { file: PathBuf, diagnostics: Diagnostics },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Result of compiling one file.
#[derive(Debug, Clone)]
pub struct CompiledFile {
    pub path: PathBuf,
    pub output_path: PathBuf,
    pub html: String,
    pub dependencies: Vec<PathBuf>,
    /// Warnings and info; a compiled file has no errors.
    pub diagnostics: Diagnostics,
    /// Source mtime, read before the source itself.
    pub last_modified: DateTime<Utc>,
    source: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Files compiled in this call, in build order.
    pub compiled: Vec<PathBuf>,
    /// Files in the graph that were up to date.
    pub skipped: Vec<PathBuf>,
    pub diagnostics: Diagnostics,
}

pub struct BuildManager {
    config: BuildConfig,
    frontend: Box<dyn Frontend>,
    registry: Arc<ComponentRegistry>,
    builtins: Arc<Builtins>,
    graph: DependencyGraph,
    index: ProjectIndex,
    cache: BuildCache,
}

impl BuildManager {
    pub fn new(config: BuildConfig, frontend: Box<dyn Frontend>) -> Self {
        let cache = BuildCache::load(config.cache_path());
        Self {
            config,
            frontend,
            registry: Arc::new(ComponentRegistry::builtin()),
            builtins: Arc::new(Builtins::standard()),
            graph: DependencyGraph::new(),
            index: ProjectIndex::new(),
            cache,
        }
    }

    pub fn with_registry(mut self, registry: Arc<ComponentRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    pub fn index(&self) -> &ProjectIndex {
        &self.index
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DISCOVERY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Rebuilds the graph and project index from the source directory.
    pub fn scan(&mut self) -> Result<(), BuildError> {
        let files = discover(
            &self.config.source_path(),
            self.frontend.extension(),
            self.frontend.as_ref(),
        )?;

        let mut graph = DependencyGraph::new();
        let mut index = ProjectIndex::new();
        for file in files {
            let category = file
                .summary
                .as_ref()
                .map_or(FileCategory::Unknown, |s| FileCategory::from(s.kind));
            graph.add_file(&file.path, category, file.dependencies());
            if let Some(summary) = file.summary {
                index.insert(summary);
            }
        }

        tracing::debug!(files = graph.len(), "scanned project");
        self.graph = graph;
        self.index = index;
        Ok(())
    }

    pub fn validate_dependencies(&self) -> Result<(), BuildError> {
        let cycles = self.graph.find_cycles();
        if !cycles.is_empty() {
            return Err(GraphError::Cycles(cycles).into());
        }
        self.graph.validate()?;
        Ok(())
    }

    pub fn has_changed(&self, path: &Path) -> Result<bool, BuildError> {
        Ok(self.cache.has_changed(path, self.config.change_detection)?)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BUILDS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Compiles every file from scratch.
    pub fn compile_project(&mut self) -> Result<BuildReport, BuildError> {
        self.scan()?;
        self.validate_dependencies()?;
        self.cache.clear();

        let order = self.graph.build_order()?;
        tracing::info!(files = order.len(), "full build");
        self.compile_in_order(order, Vec::new())
    }

    /// Compiles changed files and everything that depends on them.
    pub fn compile_changed(&mut self) -> Result<BuildReport, BuildError> {
        self.scan()?;
        self.validate_dependencies()?;

        let graph = &self.graph;
        self.cache.retain(|path, _| graph.contains(path));

        let mut changed: Vec<PathBuf> = Vec::new();
        for path in self.graph.files() {
            let dependencies_differ = match (self.cache.get(path), self.graph.get(path)) {
                (Some(record), Some(node)) => record.dependencies != node.dependencies,
                _ => false,
            };
            if dependencies_differ || self.has_changed(path)? {
                changed.push(path.to_path_buf());
            }
        }

        let mut affected: HashSet<PathBuf> = changed.iter().cloned().collect();
        affected.extend(
            self.graph
                .transitive_dependents(changed.iter().map(PathBuf::as_path)),
        );

        let (order, skipped): (Vec<PathBuf>, Vec<PathBuf>) = self
            .graph
            .build_order()?
            .into_iter()
            .partition(|path| affected.contains(path));

        tracing::info!(
            changed = changed.len(),
            affected = order.len(),
            skipped = skipped.len(),
            "incremental build"
        );
        self.compile_in_order(order, skipped)
    }

    fn compile_in_order(&mut self, order: Vec<PathBuf>, skipped: Vec<PathBuf>) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport {
            skipped,
            ..BuildReport::default()
        };

        let outcome = if self.config.parallel {
            self.compile_levels(&order, &mut report)
        } else {
            order.iter().try_for_each(|path| {
                let compiled = self.compile_file(path)?;
                self.record(compiled, &mut report)
            })
        };

        if outcome.is_err() {
            self.invalidate_unrecorded(&order, &report);
        }
        // Earlier successes are kept even when a later file failed.
        self.cache.save()?;
        outcome?;
        Ok(report)
    }

    /// Compiles one graph level at a time on the rayon pool. Results are
    /// recorded following `order`.
    fn compile_levels(&mut self, order: &[PathBuf], report: &mut BuildReport) -> Result<(), BuildError> {
        let selected: HashSet<&PathBuf> = order.iter().collect();
        for level in self.graph.levels() {
            let level: Vec<PathBuf> = level.into_iter().filter(|p| selected.contains(p)).collect();
            if level.is_empty() {
                continue;
            }

            let this = &*self;
            let mut results: HashMap<PathBuf, Result<CompiledFile, BuildError>> = level
                .par_iter()
                .map(|path| (path.clone(), this.compile_file(path)))
                .collect();

            for path in order.iter().filter(|p| level.contains(p)) {
                if let Some(result) = results.remove(path) {
                    self.record(result?, report)?;
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, compiled: CompiledFile, report: &mut BuildReport) -> Result<(), BuildError> {
        let record = CacheRecord::new(
            compiled.last_modified,
            compiled.source.as_bytes(),
            &compiled.output_path,
            compiled.dependencies,
        );
        self.cache.insert(&compiled.path, record);
        report.diagnostics.extend(compiled.diagnostics.into_vec());
        report.compiled.push(compiled.path);
        Ok(())
    }

    /// Drops the records of selected files this run did not record, so the
    /// next incremental build retries them.
    fn invalidate_unrecorded(&mut self, order: &[PathBuf], report: &BuildReport) {
        let recorded: HashSet<&PathBuf> = report.compiled.iter().collect();
        for path in order.iter().filter(|p| !recorded.contains(p)) {
            if self.cache.remove(path).is_some() {
                tracing::debug!(path = %path.display(), "invalidated cache record");
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SINGLE FILE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Parses, builds, resolves and emits one file, writing its HTML artifact.
    pub fn compile_file(&self, path: &Path) -> Result<CompiledFile, BuildError> {
        let last_modified = modified_time(path)?;
        let source = fs::read_to_string(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let tree = self.frontend.parse(path, &source);
        let built = build_document(path, &tree);
        let mut diagnostics = built.diagnostics;
        let document = match built.document {
            Some(document) if !diagnostics.has_errors() => document,
            _ => return Err(self.failed(path, diagnostics)),
        };

        let index = (!self.index.is_empty()).then_some(&self.index);
        let resolution = resolve_document(&document, &self.builtins, &self.registry, index)?;
        diagnostics.extend(resolution.diagnostics.into_vec());
        if diagnostics.has_errors() {
            return Err(self.failed(path, diagnostics));
        }

        let html = emit_document(&document, &self.registry);
        let output_path = output_path(&self.config.source_path(), &self.config.out_path(), path);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|source| BuildError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&output_path, &html).map_err(|source| BuildError::Io {
            path: output_path.clone(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            output = %output_path.display(),
            diagnostics = diagnostics.len(),
            "compiled file"
        );
        Ok(CompiledFile {
            path: path.to_path_buf(),
            output_path,
            html,
            dependencies: summarize(&document).dependencies(),
            diagnostics,
            last_modified,
            source,
        })
    }

    fn failed(&self, path: &Path, diagnostics: Diagnostics) -> BuildError {
        for diagnostic in diagnostics.iter() {
            tracing::debug!(path = %path.display(), "{}", diagnostic);
        }
        BuildError::Compilation {
            file: path.to_path_buf(),
            diagnostics,
        }
    }
}
