//! Graph fact store: the queryable triple collaborator.
//!
//! The core consumes facts through the [`FactStore`] trait (wildcard query +
//! membership test) and never assumes anything about the backing
//! implementation. [`MemoryFactStore`] is the bundled in-memory store, backed
//! by `petgraph` with a `DashMap` node index for O(1) resource lookups.

use std::collections::HashMap;
use std::sync::RwLock;

use dashmap::DashMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::matcher::OpportunisticResult;
use crate::triple::Triple;

/// Read interface over a triple store. Any argument `None` is a wildcard.
///
/// Reads are point-in-time snapshots; no transactional semantics.
pub trait FactStore: Send + Sync {
    /// Return every triple matching the given (subject, predicate, object)
    /// template, where `None` matches anything.
    fn query(&self, subject: Option<&str>, predicate: Option<&str>, object: Option<&str>)
    -> Vec<Triple>;

    /// Whether the exact triple is present.
    fn contains(&self, triple: &Triple) -> bool {
        self.query(
            Some(&triple.subject),
            Some(&triple.predicate),
            Some(&triple.object),
        )
        .into_iter()
        .next()
        .is_some()
    }

    /// Resources with a direct link pointing at `resource`, sorted and
    /// deduplicated, self-links excluded.
    fn incoming_links(&self, resource: &str) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .query(None, None, Some(resource))
            .into_iter()
            .filter(|t| !t.is_self_loop())
            .map(|t| t.subject)
            .collect();
        subjects.sort();
        subjects.dedup();
        subjects
    }

    /// Resources `resource` links directly to, sorted and deduplicated,
    /// self-links excluded.
    fn outgoing_links(&self, resource: &str) -> Vec<String> {
        let mut objects: Vec<String> = self
            .query(Some(resource), None, None)
            .into_iter()
            .filter(|t| !t.is_self_loop())
            .map(|t| t.object)
            .collect();
        objects.sort();
        objects.dedup();
        objects
    }
}

/// In-memory fact store: directed graph of resources with predicate-labelled
/// edges, dual-indexed for fast subject/object lookups.
pub struct MemoryFactStore {
    /// Nodes are resource names, edges carry the predicate.
    graph: RwLock<DiGraph<String, String>>,
    /// Resource name → NodeIndex, for O(1) node lookups.
    node_index: DashMap<String, NodeIndex>,
}

impl MemoryFactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
        }
    }

    /// Ensure a node exists for the given resource, returning its index.
    fn ensure_node(&self, resource: &str) -> NodeIndex {
        if let Some(idx) = self.node_index.get(resource) {
            return *idx.value();
        }
        let mut graph = self.graph.write().expect("graph lock poisoned");
        // Double-check after acquiring the write lock.
        if let Some(idx) = self.node_index.get(resource) {
            return *idx.value();
        }
        let idx = graph.add_node(resource.to_string());
        self.node_index.insert(resource.to_string(), idx);
        idx
    }

    /// Insert a triple. Returns `false` if the exact triple was already present.
    pub fn insert(&self, triple: Triple) -> bool {
        if self.contains(&triple) {
            return false;
        }
        let subj_idx = self.ensure_node(&triple.subject);
        let obj_idx = self.ensure_node(&triple.object);
        let mut graph = self.graph.write().expect("graph lock poisoned");
        graph.add_edge(subj_idx, obj_idx, triple.predicate);
        true
    }

    /// Bulk-insert triples, returning the number actually added.
    pub fn insert_all(&self, triples: impl IntoIterator<Item = Triple>) -> usize {
        triples.into_iter().filter(|t| self.insert(t.clone())).count()
    }

    /// Number of triples (edges).
    pub fn len(&self) -> usize {
        self.graph.read().expect("graph lock poisoned").edge_count()
    }

    /// Whether the store holds no triples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All triples currently in the store.
    pub fn all_triples(&self) -> Vec<Triple> {
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edge_indices()
            .filter_map(|ei| {
                let (src, dst) = graph.edge_endpoints(ei)?;
                Some(Triple {
                    subject: graph.node_weight(src)?.clone(),
                    predicate: graph.edge_weight(ei)?.clone(),
                    object: graph.node_weight(dst)?.clone(),
                })
            })
            .collect()
    }
}

impl FactStore for MemoryFactStore {
    fn query(
        &self,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
    ) -> Vec<Triple> {
        let graph = self.graph.read().expect("graph lock poisoned");

        let matches_pred = |p: &str| predicate.is_none_or(|want| want == p);

        match (subject, object) {
            (Some(s), _) => {
                let Some(idx) = self.node_index.get(s).map(|r| *r.value()) else {
                    return vec![];
                };
                graph
                    .edges_directed(idx, Direction::Outgoing)
                    .filter(|e| matches_pred(e.weight()))
                    .filter_map(|e| {
                        let obj = graph.node_weight(e.target())?;
                        if object.is_none_or(|want| want == obj) {
                            Some(Triple::new(s, e.weight().clone(), obj.clone()))
                        } else {
                            None
                        }
                    })
                    .collect()
            }
            (None, Some(o)) => {
                let Some(idx) = self.node_index.get(o).map(|r| *r.value()) else {
                    return vec![];
                };
                graph
                    .edges_directed(idx, Direction::Incoming)
                    .filter(|e| matches_pred(e.weight()))
                    .filter_map(|e| {
                        let subj = graph.node_weight(e.source())?;
                        Some(Triple::new(subj.clone(), e.weight().clone(), o))
                    })
                    .collect()
            }
            (None, None) => graph
                .edge_indices()
                .filter_map(|ei| {
                    let (src, dst) = graph.edge_endpoints(ei)?;
                    let pred = graph.edge_weight(ei)?;
                    if !matches_pred(pred) {
                        return None;
                    }
                    Some(Triple {
                        subject: graph.node_weight(src)?.clone(),
                        predicate: pred.clone(),
                        object: graph.node_weight(dst)?.clone(),
                    })
                })
                .collect(),
        }
    }
}

impl Default for MemoryFactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryFactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFactStore")
            .field("nodes", &self.node_index.len())
            .field("triples", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Derived facts
// ---------------------------------------------------------------------------

/// Where a derived fact came from.
///
/// Perception-derived facts are cleared and recomputed every cycle;
/// contingency-sourced mental notes persist until explicitly superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactOrigin {
    /// Freshly derived from the current perception batch.
    Perception,
    /// Emitted as opportunistic guidance by a recovery strategy.
    Contingency,
}

/// The 3-ary derived-fact shape handed to the belief layer: `(target, type,
/// utility)` annotated with the producing pattern and arbitrary metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFact {
    /// The resource the fact is about.
    pub target: String,
    /// The semantic type tag of the producing pattern.
    pub fact_type: String,
    /// Bounded utility in [-1.0, 1.0].
    pub utility: f64,
    /// Id of the pattern (or strategy) that produced this fact.
    pub pattern_id: String,
    /// Perception vs. contingency provenance.
    pub origin: FactOrigin,
    /// Pattern-declared metadata key/value pairs.
    pub metadata: HashMap<String, String>,
}

impl DerivedFact {
    /// Build a derived fact from an opportunistic result with the given origin.
    pub fn from_result(result: &OpportunisticResult, origin: FactOrigin) -> Self {
        Self {
            target: result.target.clone(),
            fact_type: result.result_type.clone(),
            utility: result.utility,
            pattern_id: result.pattern_id.clone(),
            origin,
            metadata: result.metadata.clone(),
        }
    }

    /// Render as a triple `(target, type, utility)` for fact-store injection.
    pub fn as_triple(&self) -> Triple {
        Triple::new(
            self.target.clone(),
            self.fact_type.clone(),
            format!("{:.4}", self.utility),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryFactStore {
        let store = MemoryFactStore::new();
        store.insert(Triple::new("a", "linksTo", "b"));
        store.insert(Triple::new("a", "linksTo", "c"));
        store.insert(Triple::new("b", "linksTo", "c"));
        store.insert(Triple::new("c", "type", "Page"));
        store
    }

    #[test]
    fn wildcard_queries() {
        let store = seeded();
        assert_eq!(store.query(Some("a"), None, None).len(), 2);
        assert_eq!(store.query(None, None, Some("c")).len(), 3);
        assert_eq!(store.query(None, Some("linksTo"), None).len(), 3);
        assert_eq!(store.query(None, None, None).len(), 4);
        assert_eq!(
            store.query(Some("a"), Some("linksTo"), Some("b")).len(),
            1
        );
    }

    #[test]
    fn contains_and_dedup() {
        let store = seeded();
        assert!(store.contains(&Triple::new("a", "linksTo", "b")));
        assert!(!store.contains(&Triple::new("a", "linksTo", "z")));
        assert!(!store.insert(Triple::new("a", "linksTo", "b")));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn incoming_and_outgoing_exclude_self_loops() {
        let store = seeded();
        store.insert(Triple::new("c", "linksTo", "c"));
        assert_eq!(store.incoming_links("c"), vec!["a", "b"]);
        let out = store.outgoing_links("a");
        assert_eq!(out, vec!["b", "c"]);
    }

    #[test]
    fn unknown_resource_queries_are_empty() {
        let store = seeded();
        assert!(store.query(Some("nope"), None, None).is_empty());
        assert!(store.query(None, None, Some("nope")).is_empty());
    }

    #[test]
    fn derived_fact_triple_shape() {
        let result = OpportunisticResult {
            result_type: "marker".into(),
            target: "m1".into(),
            pattern_id: "p1".into(),
            utility: 0.5,
            metadata: HashMap::new(),
        };
        let fact = DerivedFact::from_result(&result, FactOrigin::Perception);
        let triple = fact.as_triple();
        assert_eq!(triple.subject, "m1");
        assert_eq!(triple.predicate, "marker");
        assert_eq!(triple.object, "0.5000");
    }
}
