//! Reference Graph
//!
//! Snapshot of the ref store as a petgraph `DiGraph`: one node per bound
//! name, one edge per dependency (a ref in the schema's body, or a nested
//! named schema). Targets that are not bound yet become nodes too, flagged
//! as dangling. Used for diagnostics only; the compiled artifacts never need it.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::store::SchemaStore;

/// A reference whose target is not bound
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingRef {
    pub from: String,
    pub to: String,
}

/// Summary of the store's reference structure
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefAnalysis {
    /// Number of bound schemas
    pub schemas: usize,
    /// Refs to names not (yet) registered, sorted
    pub dangling: Vec<DanglingRef>,
    /// Recursive groups: multi-member SCCs and self-referencing schemas.
    /// Members sorted, groups sorted by first member.
    pub cycles: Vec<Vec<String>>,
}

impl RefAnalysis {
    /// Every ref resolves
    pub fn is_complete(&self) -> bool {
        self.dangling.is_empty()
    }

    /// Is `name` part of a recursive group?
    pub fn is_recursive(&self, name: &str) -> bool {
        self.cycles.iter().any(|group| group.iter().any(|n| n == name))
    }
}

/// Dependency graph over schema names
pub struct RefGraph {
    graph: DiGraph<String, ()>,
    node_indices: HashMap<String, NodeIndex>,
    bound: HashSet<String>,
}

impl RefGraph {
    /// Build from the store's current bindings
    pub fn from_store(store: &SchemaStore) -> Self {
        let mut this = Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            bound: HashSet::new(),
        };

        let entries = store.entries();
        for (name, _) in &entries {
            this.node(name);
            this.bound.insert(name.clone());
        }
        for (name, schema) in &entries {
            let from = this.node(name);
            for dep in schema.dependencies() {
                let to = this.node(&dep);
                this.graph.add_edge(from, to, ());
            }
        }
        this
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.node_indices.insert(name.to_string(), idx);
        idx
    }

    pub fn schema_count(&self) -> usize {
        self.bound.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Immediate dependencies of `name`, sorted
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Schemas that refer to `name` directly, sorted
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
            .filter_map(|n| self.graph.node_weight(n).map(String::as_str))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Every name reachable from `name` (excluding itself unless recursive), sorted
    pub fn closure(&self, name: &str) -> Vec<&str> {
        let Some(&start) = self.node_indices.get(name) else {
            return Vec::new();
        };
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = self.graph.neighbors(start).collect();
        while let Some(idx) = queue.pop_front() {
            if seen.insert(idx) {
                queue.extend(self.graph.neighbors(idx));
            }
        }
        let mut out: Vec<&str> = seen
            .into_iter()
            .filter_map(|n| self.graph.node_weight(n).map(String::as_str))
            .collect();
        out.sort();
        out
    }

    /// Dangling refs and recursive groups
    pub fn analyze(&self) -> RefAnalysis {
        let mut dangling: Vec<DanglingRef> = self
            .graph
            .edge_references()
            .filter_map(|e| {
                let to = self.graph.node_weight(e.target())?;
                if self.bound.contains(to) {
                    return None;
                }
                let from = self.graph.node_weight(e.source())?;
                Some(DanglingRef {
                    from: from.clone(),
                    to: to.clone(),
                })
            })
            .collect();
        dangling.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        dangling.dedup();

        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || scc
                        .first()
                        .map(|&idx| self.graph.contains_edge(idx, idx))
                        .unwrap_or(false)
            })
            .map(|scc| {
                let mut members: Vec<String> = scc
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();

        RefAnalysis {
            schemas: self.schema_count(),
            dangling,
            cycles,
        }
    }
}
