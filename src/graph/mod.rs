//! Call graph over method facts
//!
//! Pure in-memory graph built once per analysis run and read-only after.
//! Nodes live in a petgraph arena addressed by `NodeIndex`; a key map gives
//! O(1) lookup from `MethodKey`, and `neighbors_directed` gives backward
//! (callee→callers) and forward (caller→callees) adjacency. Cycles are
//! fine: traversals carry their own visited sets.

mod builder;

pub use builder::CallGraphBuilder;

use crate::models::{CallSiteLocation, MethodKey, MethodNode};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Target of a call edge: resolved to a known method, or left ambiguous
/// with the candidate list attached for diagnostics. An unresolved target
/// is a dead end for traversal, never a silent guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallTarget {
    Resolved(MethodKey),
    Unresolved {
        description: String,
        candidates: Vec<MethodKey>,
    },
}

/// A directed call edge. Multiple call sites between the same caller/callee
/// pair are distinct edges, each with its own location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: MethodKey,
    pub target: CallTarget,
    pub location: CallSiteLocation,
}

/// A call site whose callee could not be resolved to a single method.
/// Non-fatal; kept on the graph as a diagnostic and surfaced in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedCall {
    pub caller: MethodKey,
    pub callee_name: String,
    pub arg_count: usize,
    pub location: CallSiteLocation,
    pub candidates: Vec<MethodKey>,
}

/// The call graph for one analysis run.
pub struct CallGraph {
    graph: DiGraph<MethodNode, CallSiteLocation>,
    index: FxHashMap<MethodKey, NodeIndex>,
    unresolved: Vec<UnresolvedCall>,
}

impl CallGraph {
    pub(crate) fn new(
        graph: DiGraph<MethodNode, CallSiteLocation>,
        index: FxHashMap<MethodKey, NodeIndex>,
        unresolved: Vec<UnresolvedCall>,
    ) -> Self {
        Self {
            graph,
            index,
            unresolved,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up a node by key.
    pub fn node(&self, key: &MethodKey) -> Option<&MethodNode> {
        self.index.get(key).map(|&idx| &self.graph[idx])
    }

    pub fn index_of(&self, key: &MethodKey) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    pub fn node_at(&self, idx: NodeIndex) -> &MethodNode {
        &self.graph[idx]
    }

    /// Backward adjacency: methods that call `idx`.
    pub fn callers_of(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Incoming)
    }

    /// Forward adjacency: methods that `idx` calls.
    pub fn callees_of(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Outgoing)
    }

    pub fn has_callers(&self, idx: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
            .is_some()
    }

    /// All resolved edges, each carrying its call-site location.
    pub fn edges(&self) -> impl Iterator<Item = CallEdge> + '_ {
        self.graph.edge_references().map(|e| CallEdge {
            caller: self.graph[e.source()].key(),
            target: CallTarget::Resolved(self.graph[e.target()].key()),
            location: e.weight().clone(),
        })
    }

    /// Call sites that resolution left ambiguous.
    pub fn unresolved(&self) -> &[UnresolvedCall] {
        &self.unresolved
    }

    /// Entry points: every method with a non-empty route-marker set,
    /// sorted by key for stable output.
    pub fn entry_points(&self) -> Vec<MethodKey> {
        let mut keys: Vec<MethodKey> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_entry_point())
            .map(|idx| self.graph[idx].key())
            .collect();
        keys.sort();
        keys
    }

    pub fn node_keys(&self) -> impl Iterator<Item = MethodKey> + '_ {
        self.graph.node_indices().map(|idx| self.graph[idx].key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{CallSiteFact, FactSet, MethodFact};
    use crate::models::RouteMarker;

    fn method(type_name: &str, name: &str, file: &str) -> MethodFact {
        MethodFact {
            type_name: type_name.to_string(),
            method_name: name.to_string(),
            parameters: vec![],
            return_type: "void".to_string(),
            file: file.into(),
            route_markers: vec![],
            annotations: vec![],
            call_sites: vec![],
        }
    }

    #[test]
    fn test_adjacency_both_directions() {
        let mut caller = method("A", "top", "A.java");
        caller.call_sites.push(CallSiteFact {
            receiver_type: Some("B".to_string()),
            callee_name: "bottom".to_string(),
            arg_count: 0,
            line: 3,
        });
        let facts = FactSet {
            files: vec![],
            methods: vec![caller, method("B", "bottom", "B.java")],
            accesses: vec![],
        };

        let graph = CallGraphBuilder::build(&facts);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);

        let a = graph.index_of(&MethodKey::new("A", "top", 0)).unwrap();
        let b = graph.index_of(&MethodKey::new("B", "bottom", 0)).unwrap();
        assert_eq!(graph.callees_of(a).collect::<Vec<_>>(), vec![b]);
        assert_eq!(graph.callers_of(b).collect::<Vec<_>>(), vec![a]);
        assert!(!graph.has_callers(a));
    }

    #[test]
    fn test_entry_points_sorted() {
        let mut m1 = method("Zeta", "z", "Z.java");
        m1.route_markers.push(RouteMarker {
            verb: "GET".to_string(),
            path: "/z".to_string(),
        });
        let mut m2 = method("Alpha", "a", "A.java");
        m2.route_markers.push(RouteMarker {
            verb: "POST".to_string(),
            path: "/a".to_string(),
        });
        let facts = FactSet {
            files: vec![],
            methods: vec![m1, m2, method("Plain", "p", "P.java")],
            accesses: vec![],
        };

        let graph = CallGraphBuilder::build(&facts);
        let entries = graph.entry_points();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].type_name, "Alpha");
        assert_eq!(entries[1].type_name, "Zeta");
    }
}
