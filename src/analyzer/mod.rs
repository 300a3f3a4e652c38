//! Backward reachability from data-access points to entry points
//!
//! For each configured (table, column) pair, every SQL access fact owned by
//! a graph method becomes a traversal root. The walk follows backward
//! adjacency (callee → callers) breadth-first with a per-root visited set:
//! a node already visited within the same traversal is not re-expanded, but
//! a chain that reaches it is still recorded once as a complete path. That
//! keeps every distinct call chain in the report while bounding each root's
//! work by O(V+E), cycles included.
//!
//! Traversal terminates at a method with no callers or at an entry point;
//! entry-point termini are flagged externally reachable.

use crate::graph::CallGraph;
use crate::models::{ImpactPath, Layer, MethodKey, TableAccessFact, TableColumn};
use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Everything the analyzer found for one configured (table, column) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactSet {
    pub table: String,
    pub column: String,
    /// One path per distinct root-to-terminus chain, across all access
    /// facts for this pair. Sorted for stable output.
    pub paths: Vec<ImpactPath>,
    /// Union of files spanned by all paths; the downstream modification
    /// target. Sorted.
    pub files: Vec<PathBuf>,
    /// The same files grouped by architectural layer.
    pub files_by_layer: BTreeMap<Layer, Vec<PathBuf>>,
    /// Number of access facts that seeded this set.
    pub access_count: usize,
}

impl ImpactSet {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// True when at least one chain reaches a route-marked entry point.
    pub fn externally_reachable(&self) -> bool {
        self.paths.iter().any(|p| p.externally_reachable)
    }
}

/// Output of a full analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub sets: Vec<ImpactSet>,
    /// Configured pairs with no matching access facts. Reported, not an
    /// error.
    pub missing: Vec<TableColumn>,
}

impl ImpactAnalysis {
    /// All impacted files across every configured pair, deduplicated,
    /// in first-seen order of the (sorted) sets.
    pub fn impacted_files(&self) -> Vec<PathBuf> {
        let mut seen = FxHashSet::default();
        let mut files = Vec::new();
        for set in &self.sets {
            for file in &set.files {
                if seen.insert(file.clone()) {
                    files.push(file.clone());
                }
            }
        }
        files
    }

    /// The (table, column) contexts that impact a given file.
    pub fn contexts_for(&self, file: &PathBuf) -> Vec<TableColumn> {
        self.sets
            .iter()
            .filter(|s| s.files.contains(file))
            .map(|s| TableColumn::new(s.table.clone(), s.column.clone()))
            .collect()
    }
}

pub struct DbAccessAnalyzer<'g> {
    graph: &'g CallGraph,
}

impl<'g> DbAccessAnalyzer<'g> {
    pub fn new(graph: &'g CallGraph) -> Self {
        Self { graph }
    }

    /// Run backward reachability for every configured (table, column) pair.
    ///
    /// Pairs are independent read-only traversals over the immutable graph,
    /// so they fan out over rayon; sequential execution produces the same
    /// result.
    pub fn analyze(
        &self,
        accesses: &[TableAccessFact],
        configured: &[TableColumn],
    ) -> ImpactAnalysis {
        let mut sets: Vec<ImpactSet> = configured
            .par_iter()
            .map(|pair| self.analyze_pair(pair, accesses))
            .collect();
        sets.sort_by(|a, b| (&a.table, &a.column).cmp(&(&b.table, &b.column)));

        let missing: Vec<TableColumn> = sets
            .iter()
            .filter(|s| s.access_count == 0)
            .map(|s| TableColumn::new(s.table.clone(), s.column.clone()))
            .collect();
        for pair in &missing {
            info!("configured column {pair} has no access facts; empty impact set");
        }

        ImpactAnalysis { sets, missing }
    }

    fn analyze_pair(&self, pair: &TableColumn, accesses: &[TableAccessFact]) -> ImpactSet {
        let want = pair.normalized();
        let mut paths: Vec<ImpactPath> = Vec::new();
        let mut access_count = 0;

        for fact in accesses {
            let fact_pair = TableColumn::new(fact.table.clone(), fact.column.clone()).normalized();
            if fact_pair != want {
                continue;
            }
            access_count += 1;

            let Some(root) = self.graph.index_of(&fact.owner) else {
                warn!(
                    "access fact {} owned by unknown method {}, skipping",
                    fact.statement_ref, fact.owner
                );
                continue;
            };
            debug!("tracing {} from {}", pair, fact.owner);
            for (chain, externally_reachable) in self.trace(root) {
                paths.push(self.to_impact_path(pair, chain, externally_reachable));
            }
        }

        paths.sort_by(|a, b| a.chain.cmp(&b.chain));
        paths.dedup_by(|a, b| a.chain == b.chain);

        let mut seen = FxHashSet::default();
        let mut files = Vec::new();
        let mut files_by_layer: BTreeMap<Layer, Vec<PathBuf>> = BTreeMap::new();
        for path in &paths {
            for key in &path.chain {
                let Some(node) = self.graph.node(key) else {
                    continue;
                };
                if seen.insert(node.file.clone()) {
                    files.push(node.file.clone());
                    files_by_layer
                        .entry(node.layer)
                        .or_default()
                        .push(node.file.clone());
                }
            }
        }
        files.sort();
        for layer_files in files_by_layer.values_mut() {
            layer_files.sort();
        }

        ImpactSet {
            table: pair.table.clone(),
            column: pair.column.clone(),
            paths,
            files,
            files_by_layer,
            access_count,
        }
    }

    /// Backward BFS from one access root. Returned chains run access-first
    /// (leaf → root); `to_impact_path` reverses them.
    fn trace(&self, root: NodeIndex) -> Vec<(Vec<NodeIndex>, bool)> {
        let mut out = Vec::new();
        let mut visited: FxHashSet<NodeIndex> = FxHashSet::default();
        visited.insert(root);

        let mut queue: VecDeque<Vec<NodeIndex>> = VecDeque::new();
        queue.push_back(vec![root]);

        while let Some(chain) = queue.pop_front() {
            let head = *chain.last().expect("chains are never empty");

            // Entry points are termini even when they have callers.
            if self.graph.node_at(head).is_entry_point() {
                out.push((chain, true));
                continue;
            }

            let mut callers: Vec<NodeIndex> = self.graph.callers_of(head).collect();
            if callers.is_empty() {
                out.push((chain, false));
                continue;
            }
            // Stable expansion order.
            callers.sort_by_key(|&idx| self.graph.node_at(idx).key());
            callers.dedup();

            for caller in callers {
                let mut extended = chain.clone();
                extended.push(caller);
                if visited.insert(caller) {
                    queue.push_back(extended);
                } else {
                    // Already explored from another chain: record this chain
                    // once, terminated here, without re-expanding.
                    let reachable = self.graph.node_at(caller).is_entry_point();
                    out.push((extended, reachable));
                }
            }
        }
        out
    }

    fn to_impact_path(
        &self,
        pair: &TableColumn,
        mut chain: Vec<NodeIndex>,
        externally_reachable: bool,
    ) -> ImpactPath {
        // Stored leaf-first; reports want entry point (root) first.
        chain.reverse();
        let keys: Vec<MethodKey> = chain
            .iter()
            .map(|&idx| self.graph.node_at(idx).key())
            .collect();

        let mut seen = FxHashSet::default();
        let mut files = Vec::new();
        for &idx in &chain {
            let file = self.graph.node_at(idx).file.clone();
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }

        ImpactPath {
            table: pair.table.clone(),
            column: pair.column.clone(),
            chain: keys,
            files,
            externally_reachable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{CallSiteFact, FactSet, MethodFact};
    use crate::graph::CallGraphBuilder;
    use crate::models::{AccessKind, MethodKey, RouteMarker};

    fn method(
        type_name: &str,
        name: &str,
        file: &str,
        routes: bool,
        calls: Vec<(&str, &str)>,
    ) -> MethodFact {
        MethodFact {
            type_name: type_name.to_string(),
            method_name: name.to_string(),
            parameters: vec![],
            return_type: "void".to_string(),
            file: file.into(),
            route_markers: if routes {
                vec![RouteMarker {
                    verb: "GET".to_string(),
                    path: format!("/{name}"),
                }]
            } else {
                vec![]
            },
            annotations: vec![],
            call_sites: calls
                .into_iter()
                .map(|(ty, m)| CallSiteFact {
                    receiver_type: Some(ty.to_string()),
                    callee_name: m.to_string(),
                    arg_count: 0,
                    line: 1,
                })
                .collect(),
        }
    }

    fn access(table: &str, column: &str, owner_type: &str, owner_method: &str) -> TableAccessFact {
        TableAccessFact {
            table: table.to_string(),
            column: column.to_string(),
            access_kind: AccessKind::Read,
            owner: MethodKey::new(owner_type, owner_method, 0),
            statement_ref: format!("{owner_type}.xml#{owner_method}"),
        }
    }

    fn four_layer_facts() -> FactSet {
        FactSet {
            files: vec![],
            methods: vec![
                method(
                    "Controller",
                    "login",
                    "Controller.java",
                    true,
                    vec![("Service", "authenticate")],
                ),
                method(
                    "Service",
                    "authenticate",
                    "Service.java",
                    false,
                    vec![("DAO", "findBySsn")],
                ),
                method(
                    "DAO",
                    "findBySsn",
                    "DAO.java",
                    false,
                    vec![("Mapper", "selectEmployeeBySsn")],
                ),
                method("Mapper", "selectEmployeeBySsn", "Mapper.java", false, vec![]),
            ],
            accesses: vec![access("employee", "ssn", "Mapper", "selectEmployeeBySsn")],
        }
    }

    #[test]
    fn test_four_layer_chain_single_path() {
        let facts = four_layer_facts();
        let graph = CallGraphBuilder::build(&facts);
        let analyzer = DbAccessAnalyzer::new(&graph);
        let analysis = analyzer.analyze(
            &facts.accesses,
            &[TableColumn::new("employee", "ssn")],
        );

        assert_eq!(analysis.sets.len(), 1);
        let set = &analysis.sets[0];
        assert_eq!(set.paths.len(), 1);
        let path = &set.paths[0];
        assert!(path.externally_reachable);
        assert_eq!(
            path.chain,
            vec![
                MethodKey::new("Controller", "login", 0),
                MethodKey::new("Service", "authenticate", 0),
                MethodKey::new("DAO", "findBySsn", 0),
                MethodKey::new("Mapper", "selectEmployeeBySsn", 0),
            ]
        );
        assert_eq!(path.files.len(), 4);
        assert_eq!(set.files.len(), 4);
    }

    #[test]
    fn test_cycle_terminates() {
        // a <-> b mutually recursive, both called from an entry point.
        let facts = FactSet {
            files: vec![],
            methods: vec![
                method("Web", "handler", "Web.java", true, vec![("A", "a")]),
                method("A", "a", "A.java", false, vec![("B", "b")]),
                method("B", "b", "B.java", false, vec![("A", "a")]),
                method("Store", "load", "Store.java", false, vec![]),
            ],
            accesses: vec![access("t", "c", "Store", "load")],
        };
        // b also calls the access owner.
        let mut facts = facts;
        facts.methods[2].call_sites.push(CallSiteFact {
            receiver_type: Some("Store".to_string()),
            callee_name: "load".to_string(),
            arg_count: 0,
            line: 2,
        });

        let graph = CallGraphBuilder::build(&facts);
        let analyzer = DbAccessAnalyzer::new(&graph);
        let analysis = analyzer.analyze(&facts.accesses, &[TableColumn::new("t", "c")]);

        let set = &analysis.sets[0];
        assert!(!set.paths.is_empty());
        // Termination is the property under test; every chain is finite and
        // no chain repeats a node more times than the record-once policy
        // allows.
        for path in &set.paths {
            assert!(path.chain.len() <= graph.node_count() + 1);
        }
        assert!(set.externally_reachable());
    }

    #[test]
    fn test_multiple_chains_into_shared_node() {
        // Two entry points converge on the same service before the DAO.
        let facts = FactSet {
            files: vec![],
            methods: vec![
                method("Api1", "get", "Api1.java", true, vec![("Svc", "mid")]),
                method("Api2", "post", "Api2.java", true, vec![("Svc", "mid")]),
                method("Svc", "mid", "Svc.java", false, vec![("Dao", "q")]),
                method("Dao", "q", "Dao.java", false, vec![]),
            ],
            accesses: vec![access("t", "c", "Dao", "q")],
        };
        let graph = CallGraphBuilder::build(&facts);
        let analysis =
            DbAccessAnalyzer::new(&graph).analyze(&facts.accesses, &[TableColumn::new("t", "c")]);

        let set = &analysis.sets[0];
        // Both chains are recorded; each is complete up to its terminus.
        assert_eq!(set.paths.len(), 2);
        assert!(set.paths.iter().all(|p| p.externally_reachable));
        assert_eq!(set.files.len(), 4);
    }

    #[test]
    fn test_configured_but_absent_reported_empty() {
        let facts = four_layer_facts();
        let graph = CallGraphBuilder::build(&facts);
        let analysis = DbAccessAnalyzer::new(&graph).analyze(
            &facts.accesses,
            &[
                TableColumn::new("employee", "ssn"),
                TableColumn::new("customer", "card_no"),
            ],
        );

        assert_eq!(analysis.sets.len(), 2);
        assert_eq!(analysis.missing.len(), 1);
        assert_eq!(analysis.missing[0].table, "customer");
        let empty = analysis
            .sets
            .iter()
            .find(|s| s.table == "customer")
            .unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.access_count, 0);
    }

    #[test]
    fn test_case_insensitive_matching() {
        let facts = four_layer_facts();
        let graph = CallGraphBuilder::build(&facts);
        let analysis = DbAccessAnalyzer::new(&graph)
            .analyze(&facts.accesses, &[TableColumn::new("EMPLOYEE", "Ssn")]);
        assert_eq!(analysis.sets[0].paths.len(), 1);
    }

    #[test]
    fn test_impacted_files_and_contexts() {
        let facts = four_layer_facts();
        let graph = CallGraphBuilder::build(&facts);
        let analysis = DbAccessAnalyzer::new(&graph)
            .analyze(&facts.accesses, &[TableColumn::new("employee", "ssn")]);

        let files = analysis.impacted_files();
        assert_eq!(files.len(), 4);
        let contexts = analysis.contexts_for(&"DAO.java".into());
        assert_eq!(contexts, vec![TableColumn::new("employee", "ssn")]);
    }
}
