//! File Dependency Graph
//!
//! Directed graph over source files: an edge `a -> b` means `a` imports `b`.
//! Nodes keep their first insertion position, which is the tie-break for every
//! ordering the graph produces, so identical inputs give identical builds.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::ast::DocumentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Page,
    Component,
    /// A file that could not be summarized (no document header).
    Unknown,
}

impl From<DocumentKind> for FileCategory {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Page => FileCategory::Page,
            DocumentKind::Component => FileCategory::Component,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub path: PathBuf,
    pub category: FileCategory,
    pub dependencies: Vec<PathBuf>,
}

/// Files of one cycle in edge order; the first file is not repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub files: Vec<PathBuf>,
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            write!(f, "{} -> ", file.display())?;
        }
        match self.files.first() {
            Some(first) => write!(f, "{}", first.display()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    pub file: PathBuf,
    pub dependency: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("dependency cycle detected: {}", join(.0))]
    Cycles(Vec<Cycle>),

    #[error("missing dependencies: {}", join_missing(.0))]
    MissingDependencies(Vec<MissingDependency>),
}

fn join(cycles: &[Cycle]) -> String {
    cycles.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("; ")
}

fn join_missing(missing: &[MissingDependency]) -> String {
    missing
        .iter()
        .map(|m| format!("{} imports {}", m.file.display(), m.dependency.display()))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<PathBuf, GraphNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the node for `path`. A replaced node keeps its
    /// original position.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, category: FileCategory, dependencies: Vec<PathBuf>) {
        let path = path.into();
        let node = GraphNode {
            path: path.clone(),
            category,
            dependencies,
        };
        self.nodes.insert(path, node);
    }

    pub fn remove_file(&mut self, path: &Path) -> Option<GraphNode> {
        self.nodes.shift_remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&GraphNode> {
        self.nodes.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.nodes.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dependencies of node `index` that are present in the graph, as indices.
    fn known_dependencies(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let node = &self.nodes[index];
        let mut seen = HashSet::new();
        node.dependencies
            .iter()
            .filter_map(|dep| self.nodes.get_index_of(dep))
            .filter(move |dep| seen.insert(*dep))
    }

    /// `dependents[i]` lists the nodes that import node `i`.
    fn reverse_edges(&self) -> Vec<Vec<usize>> {
        let mut dependents = vec![Vec::new(); self.nodes.len()];
        for index in 0..self.nodes.len() {
            for dep in self.known_dependencies(index) {
                dependents[dep].push(index);
            }
        }
        dependents
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ORDERING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Kahn layers. Each layer only depends on earlier layers; files inside a
    /// layer are in insertion order. Files on or behind a cycle are left out.
    pub fn levels(&self) -> Vec<Vec<PathBuf>> {
        self.kahn_levels()
            .into_iter()
            .map(|level| level.into_iter().map(|i| self.nodes[i].path.clone()).collect())
            .collect()
    }

    /// Every file after all of its dependencies. Among files with no ordering
    /// constraint between them, the earlier-inserted one comes first.
    pub fn build_order(&self) -> Result<Vec<PathBuf>, GraphError> {
        let mut indegree: Vec<usize> = (0..self.nodes.len())
            .map(|i| self.known_dependencies(i).count())
            .collect();
        let dependents = self.reverse_edges();

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(next) = ready.pop_first() {
            order.push(self.nodes[next].path.clone());
            for &dependent in &dependents[next] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(GraphError::Cycles(self.find_cycles()));
        }
        Ok(order)
    }

    fn kahn_levels(&self) -> Vec<Vec<usize>> {
        let mut indegree: Vec<usize> = (0..self.nodes.len())
            .map(|i| self.known_dependencies(i).count())
            .collect();
        let dependents = self.reverse_edges();

        let mut level: Vec<usize> = (0..self.nodes.len()).filter(|i| indegree[*i] == 0).collect();
        let mut levels = Vec::new();

        while !level.is_empty() {
            let mut next = BTreeSet::new();
            for &done in &level {
                for &dependent in &dependents[done] {
                    indegree[dependent] -= 1;
                    if indegree[dependent] == 0 {
                        next.insert(dependent);
                    }
                }
            }
            levels.push(level);
            level = next.into_iter().collect();
        }

        levels
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CYCLES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Three-color DFS. Each back edge yields the cycle along the current DFS
    /// stack. A file importing itself is a one-file cycle.
    pub fn find_cycles(&self) -> Vec<Cycle> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color = vec![Color::White; self.nodes.len()];
        let mut stack: Vec<usize> = Vec::new();
        let mut cycles = Vec::new();

        for root in 0..self.nodes.len() {
            if color[root] != Color::White {
                continue;
            }
            // Explicit stack of (node, remaining dependencies) to avoid recursion.
            let mut frames: Vec<(usize, Vec<usize>)> = Vec::new();
            color[root] = Color::Gray;
            stack.push(root);
            frames.push((root, self.known_dependencies(root).collect()));

            while let Some((node, pending)) = frames.last_mut() {
                let node = *node;
                match pending.pop() {
                    Some(dep) => match color[dep] {
                        Color::White => {
                            color[dep] = Color::Gray;
                            stack.push(dep);
                            let deps = self.known_dependencies(dep).collect();
                            frames.push((dep, deps));
                        }
                        Color::Gray => {
                            let start = stack.iter().rposition(|&n| n == dep).unwrap_or(0);
                            cycles.push(Cycle {
                                files: stack[start..]
                                    .iter()
                                    .map(|&i| self.nodes[i].path.clone())
                                    .collect(),
                            });
                        }
                        Color::Black => {}
                    },
                    None => {
                        color[node] = Color::Black;
                        stack.pop();
                        frames.pop();
                    }
                }
            }
        }

        cycles
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Reports every dependency without a node, in insertion order.
    pub fn validate(&self) -> Result<(), GraphError> {
        let missing: Vec<MissingDependency> = self
            .nodes
            .values()
            .flat_map(|node| {
                node.dependencies
                    .iter()
                    .filter(|dep| !self.nodes.contains_key(*dep))
                    .map(|dep| MissingDependency {
                        file: node.path.clone(),
                        dependency: dep.clone(),
                    })
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GraphError::MissingDependencies(missing))
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REVERSE EDGES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Files that import `path` directly, in insertion order.
    pub fn dependents(&self, path: &Path) -> Vec<PathBuf> {
        self.nodes
            .values()
            .filter(|node| node.dependencies.iter().any(|d| d == path))
            .map(|node| node.path.clone())
            .collect()
    }

    /// Breadth-first closure over reverse edges. The result excludes the
    /// seeds unless a seed is itself a dependent of another seed.
    pub fn transitive_dependents<'p>(&self, seeds: impl IntoIterator<Item = &'p Path>) -> Vec<PathBuf> {
        let dependents = self.reverse_edges();
        let mut visited = vec![false; self.nodes.len()];
        let mut queue: VecDeque<usize> = seeds
            .into_iter()
            .filter_map(|p| self.nodes.get_index_of(p))
            .collect();
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            for &dependent in &dependents[current] {
                if !visited[dependent] {
                    visited[dependent] = true;
                    found.push(self.nodes[dependent].path.clone());
                    queue.push_back(dependent);
                }
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> PathBuf {
        PathBuf::from(format!("/src/{}.jml", name))
    }

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (file, deps) in edges {
            graph.add_file(p(file), FileCategory::Component, deps.iter().map(|d| p(d)).collect());
        }
        graph
    }

    #[test]
    fn test_build_order_respects_dependencies() {
        let graph = graph(&[("Home", &["Button", "Card"]), ("Card", &["Button"]), ("Button", &[])]);
        assert_eq!(graph.build_order().unwrap(), vec![p("Button"), p("Card"), p("Home")]);
    }

    #[test]
    fn test_build_order_ties_follow_insertion() {
        let graph = graph(&[("B", &[]), ("A", &[]), ("C", &["A"]), ("D", &[])]);
        assert_eq!(graph.build_order().unwrap(), vec![p("B"), p("A"), p("C"), p("D")]);
    }

    #[test]
    fn test_readding_keeps_position() {
        let mut graph = graph(&[("A", &[]), ("B", &[])]);
        graph.add_file(p("A"), FileCategory::Page, vec![p("B")]);
        assert_eq!(graph.files().next(), Some(p("A").as_path()));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(&p("A")).unwrap().category, FileCategory::Page);
        assert_eq!(graph.build_order().unwrap(), vec![p("B"), p("A")]);
    }

    #[test]
    fn test_unknown_dependencies_do_not_block_order() {
        let graph = graph(&[("A", &["Missing"])]);
        assert_eq!(graph.build_order().unwrap(), vec![p("A")]);
        assert_eq!(
            graph.validate(),
            Err(GraphError::MissingDependencies(vec![MissingDependency {
                file: p("A"),
                dependency: p("Missing"),
            }]))
        );
    }

    #[test]
    fn test_cycle_is_reported() {
        let graph = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"]), ("D", &[])]);
        let err = graph.build_order().unwrap_err();
        let GraphError::Cycles(cycles) = err else {
            panic!("expected cycles");
        };
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].files, vec![p("A"), p("B"), p("C")]);
        assert_eq!(
            cycles[0].to_string(),
            "/src/A.jml -> /src/B.jml -> /src/C.jml -> /src/A.jml"
        );
    }

    #[test]
    fn test_self_dependency_is_one_file_cycle() {
        let graph = graph(&[("A", &["A"]), ("B", &[])]);
        assert_eq!(graph.find_cycles(), vec![Cycle { files: vec![p("A")] }]);
        assert!(matches!(graph.build_order(), Err(GraphError::Cycles(_))));
    }

    #[test]
    fn test_levels_group_independent_files() {
        let graph = graph(&[("Home", &["Card"]), ("Card", &["Button"]), ("Button", &[]), ("Icon", &[])]);
        assert_eq!(
            graph.levels(),
            vec![vec![p("Button"), p("Icon")], vec![p("Card")], vec![p("Home")]]
        );
    }

    #[test]
    fn test_transitive_dependents_cascade() {
        let graph = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &[]), ("D", &[])]);
        assert_eq!(graph.dependents(&p("C")), vec![p("B")]);
        assert_eq!(
            graph.transitive_dependents([p("C").as_path()]),
            vec![p("B"), p("A")]
        );
        assert!(graph.transitive_dependents([p("D").as_path()]).is_empty());
    }

    #[test]
    fn test_remove_file() {
        let mut graph = graph(&[("A", &["B"]), ("B", &[])]);
        assert!(graph.remove_file(&p("B")).is_some());
        assert!(!graph.contains(&p("B")));
        assert!(graph.validate().is_err());
    }
}
