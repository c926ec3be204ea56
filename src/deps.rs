//! The file↔symbol dependency tracker.
//!
//! A bipartite directed graph: file nodes point at symbol nodes with
//! `Defines` or `References` edges. The inverse direction ("which files
//! reference symbol S") falls out of petgraph's incoming-edge iteration,
//! so cascade queries never consult a stale secondary index.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use petgraph::Directed;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

/// Node payload: a watched file or a symbol name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DepNode {
    File(PathBuf),
    Symbol(String),
}

/// Edge payload, always from a file node to a symbol node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepEdge {
    Defines,
    References,
}

/// Aggregate counts for observability, surfaced in the status snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerStatistics {
    pub total_files: usize,
    pub total_symbols: usize,
    pub files_with_definitions: usize,
    pub files_with_references: usize,
    pub avg_definitions_per_file: f64,
    pub avg_references_per_file: f64,
}

/// Tracks which files define and reference which symbols, answering the one
/// question the watch pipeline needs: "file X's exports changed, so which
/// other files must be retranspiled?"
#[derive(Debug, Default)]
pub struct DependencyTracker {
    graph: StableGraph<DepNode, DepEdge, Directed>,
    file_index: HashMap<PathBuf, NodeIndex>,
    symbol_index: HashMap<String, NodeIndex>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_file(&mut self, file: &Path) -> NodeIndex {
        if let Some(&idx) = self.file_index.get(file) {
            return idx;
        }
        let idx = self.graph.add_node(DepNode::File(file.to_path_buf()));
        self.file_index.insert(file.to_path_buf(), idx);
        idx
    }

    fn ensure_symbol(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.symbol_index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(DepNode::Symbol(name.to_string()));
        self.symbol_index.insert(name.to_string(), idx);
        idx
    }

    /// Drop symbol nodes that no file defines or references any more, so the
    /// symbol index never accumulates names from long-deleted files.
    fn prune_orphan_symbol(&mut self, idx: NodeIndex) {
        let orphaned = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .next()
            .is_none();
        if orphaned
            && let Some(DepNode::Symbol(name)) = self.graph.remove_node(idx)
        {
            self.symbol_index.remove(&name);
        }
    }

    /// Replace every edge of `kind` out of `file` with edges to `symbols`.
    fn replace_edges<I, S>(&mut self, file: &Path, kind: DepEdge, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let file_idx = self.ensure_file(file);

        let old: Vec<(petgraph::stable_graph::EdgeIndex, NodeIndex)> = self
            .graph
            .edges_directed(file_idx, Direction::Outgoing)
            .filter(|e| *e.weight() == kind)
            .map(|e| (e.id(), e.target()))
            .collect();
        let mut touched: Vec<NodeIndex> = Vec::with_capacity(old.len());
        for (edge_idx, symbol_idx) in old {
            self.graph.remove_edge(edge_idx);
            touched.push(symbol_idx);
        }

        // Set semantics: duplicates collapse to a single edge.
        let mut seen = BTreeSet::new();
        for symbol in symbols {
            let name = symbol.as_ref();
            if !seen.insert(name.to_string()) {
                continue;
            }
            let symbol_idx = self.ensure_symbol(name);
            let already = self
                .graph
                .edges_directed(file_idx, Direction::Outgoing)
                .any(|e| e.target() == symbol_idx && *e.weight() == kind);
            if !already {
                self.graph.add_edge(file_idx, symbol_idx, kind);
            }
        }

        for symbol_idx in touched {
            if self.graph.contains_node(symbol_idx) {
                self.prune_orphan_symbol(symbol_idx);
            }
        }
    }

    /// Atomically replace `file`'s definition set. The previous set is
    /// discarded wholesale; there is no partial patching.
    pub fn replace_file_defines<I, S>(&mut self, file: &Path, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.replace_edges(file, DepEdge::Defines, symbols);
    }

    /// Atomically replace `file`'s reference set.
    pub fn replace_file_references<I, S>(&mut self, file: &Path, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.replace_edges(file, DepEdge::References, symbols);
    }

    /// Current definition snapshot for `file`, sorted for stable comparison.
    pub fn file_definitions(&self, file: &Path) -> Vec<String> {
        let Some(&file_idx) = self.file_index.get(file) else {
            return Vec::new();
        };
        let mut defs: Vec<String> = self
            .graph
            .edges_directed(file_idx, Direction::Outgoing)
            .filter(|e| *e.weight() == DepEdge::Defines)
            .filter_map(|e| match &self.graph[e.target()] {
                DepNode::Symbol(name) => Some(name.clone()),
                DepNode::File(_) => None,
            })
            .collect();
        defs.sort();
        defs
    }

    /// Every file whose current reference set intersects `file`'s current
    /// definition set. `file` itself appears only when it references one of
    /// its own definitions (recursive scripts).
    pub fn dependent_files(&self, file: &Path) -> BTreeSet<PathBuf> {
        let mut dependents = BTreeSet::new();
        let Some(&file_idx) = self.file_index.get(file) else {
            return dependents;
        };

        let defined: Vec<NodeIndex> = self
            .graph
            .edges_directed(file_idx, Direction::Outgoing)
            .filter(|e| *e.weight() == DepEdge::Defines)
            .map(|e| e.target())
            .collect();

        for symbol_idx in defined {
            for edge in self.graph.edges_directed(symbol_idx, Direction::Incoming) {
                if *edge.weight() != DepEdge::References {
                    continue;
                }
                if let DepNode::File(path) = &self.graph[edge.source()] {
                    dependents.insert(path.clone());
                }
            }
        }
        dependents
    }

    /// Files that reference `symbol` right now.
    pub fn files_referencing(&self, symbol: &str) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();
        let Some(&symbol_idx) = self.symbol_index.get(symbol) else {
            return files;
        };
        for edge in self.graph.edges_directed(symbol_idx, Direction::Incoming) {
            if *edge.weight() == DepEdge::References
                && let DepNode::File(path) = &self.graph[edge.source()]
            {
                files.insert(path.clone());
            }
        }
        files
    }

    /// Files that currently define `symbol`. One definer is expected in a
    /// well-formed project; redefinition is observable here, not an error.
    pub fn files_defining(&self, symbol: &str) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();
        let Some(&symbol_idx) = self.symbol_index.get(symbol) else {
            return files;
        };
        for edge in self.graph.edges_directed(symbol_idx, Direction::Incoming) {
            if *edge.weight() == DepEdge::Defines
                && let DepNode::File(path) = &self.graph[edge.source()]
            {
                files.insert(path.clone());
            }
        }
        files
    }

    /// Purge `file` from both sides of the graph (file deletion).
    pub fn remove_file(&mut self, file: &Path) {
        let Some(file_idx) = self.file_index.remove(file) else {
            return;
        };
        let neighbors: Vec<NodeIndex> = self
            .graph
            .edges_directed(file_idx, Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        self.graph.remove_node(file_idx);
        for symbol_idx in neighbors {
            if self.graph.contains_node(symbol_idx) {
                self.prune_orphan_symbol(symbol_idx);
            }
        }
    }

    pub fn file_count(&self) -> usize {
        self.file_index.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbol_index.len()
    }

    pub fn statistics(&self) -> TrackerStatistics {
        let total_files = self.file_index.len();
        let mut files_with_definitions = 0;
        let mut files_with_references = 0;
        let mut total_defs = 0usize;
        let mut total_refs = 0usize;

        for &file_idx in self.file_index.values() {
            let defs = self
                .graph
                .edges_directed(file_idx, Direction::Outgoing)
                .filter(|e| *e.weight() == DepEdge::Defines)
                .count();
            let refs = self
                .graph
                .edges_directed(file_idx, Direction::Outgoing)
                .filter(|e| *e.weight() == DepEdge::References)
                .count();
            if defs > 0 {
                files_with_definitions += 1;
            }
            if refs > 0 {
                files_with_references += 1;
            }
            total_defs += defs;
            total_refs += refs;
        }

        let denom = total_files.max(1) as f64;
        TrackerStatistics {
            total_files,
            total_symbols: self.symbol_index.len(),
            files_with_definitions,
            files_with_references,
            avg_definitions_per_file: total_defs as f64 / denom,
            avg_references_per_file: total_refs as f64 / denom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_replace_defines_supersedes_not_accumulates() {
        let mut tracker = DependencyTracker::new();
        tracker.replace_file_defines(&p("a.gml"), ["foo", "bar"]);
        tracker.replace_file_defines(&p("a.gml"), ["baz"]);
        assert_eq!(
            tracker.file_definitions(&p("a.gml")),
            vec!["baz".to_string()],
            "only the most recent call must be reflected"
        );
        assert!(tracker.files_defining("foo").is_empty(), "old symbol pruned");
    }

    #[test]
    fn test_dependents_are_exactly_the_referencing_intersection() {
        let mut tracker = DependencyTracker::new();
        tracker.replace_file_defines(&p("a.gml"), ["foo"]);
        tracker.replace_file_references(&p("b.gml"), ["foo"]);
        tracker.replace_file_references(&p("c.gml"), ["bar"]);

        let dependents = tracker.dependent_files(&p("a.gml"));
        assert_eq!(dependents, BTreeSet::from([p("b.gml")]));
    }

    #[test]
    fn test_self_reference_is_tracked() {
        let mut tracker = DependencyTracker::new();
        tracker.replace_file_defines(&p("fib.gml"), ["fib"]);
        tracker.replace_file_references(&p("fib.gml"), ["fib"]);
        assert!(
            tracker.dependent_files(&p("fib.gml")).contains(&p("fib.gml")),
            "recursive scripts depend on themselves"
        );
    }

    #[test]
    fn test_multiple_definers_are_observable() {
        let mut tracker = DependencyTracker::new();
        tracker.replace_file_defines(&p("a.gml"), ["foo"]);
        tracker.replace_file_defines(&p("b.gml"), ["foo"]);
        assert_eq!(
            tracker.files_defining("foo"),
            BTreeSet::from([p("a.gml"), p("b.gml")])
        );
    }

    #[test]
    fn test_duplicate_symbols_collapse_to_set_semantics() {
        let mut tracker = DependencyTracker::new();
        tracker.replace_file_defines(&p("a.gml"), ["foo", "foo", "foo"]);
        assert_eq!(tracker.file_definitions(&p("a.gml")), vec!["foo".to_string()]);
    }

    #[test]
    fn test_remove_file_clears_dependents_of_its_symbols() {
        let mut tracker = DependencyTracker::new();
        tracker.replace_file_defines(&p("a.gml"), ["foo"]);
        tracker.replace_file_references(&p("b.gml"), ["foo"]);

        tracker.remove_file(&p("a.gml"));
        assert!(tracker.dependent_files(&p("a.gml")).is_empty());
        assert!(tracker.files_defining("foo").is_empty());
        // b still references foo, so the symbol node survives via b's edge.
        assert_eq!(tracker.files_referencing("foo"), BTreeSet::from([p("b.gml")]));
    }

    #[test]
    fn test_zero_definition_file_contributes_nothing() {
        let mut tracker = DependencyTracker::new();
        tracker.replace_file_defines(&p("init.gml"), Vec::<String>::new());
        tracker.replace_file_references(&p("init.gml"), ["scr_spawn"]);
        assert!(tracker.dependent_files(&p("init.gml")).is_empty());
        assert_eq!(tracker.file_count(), 1);
    }

    #[test]
    fn test_statistics() {
        let mut tracker = DependencyTracker::new();
        tracker.replace_file_defines(&p("a.gml"), ["foo", "bar"]);
        tracker.replace_file_references(&p("b.gml"), ["foo"]);

        let stats = tracker.statistics();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_symbols, 2);
        assert_eq!(stats.files_with_definitions, 1);
        assert_eq!(stats.files_with_references, 1);
        assert!((stats.avg_definitions_per_file - 1.0).abs() < f64::EPSILON);
        assert!((stats.avg_references_per_file - 0.5).abs() < f64::EPSILON);
    }
}
