//! Call graph construction and call-site resolution
//!
//! Resolution is best-effort, in three ordered attempts per call site:
//! 1. exact (declaring type, name, arity) match when the site carries a
//!    receiver-type hint that is visible in the caller file's import scope;
//! 2. unique (name, arity) match across all known types;
//! 3. otherwise the site is recorded as unresolved, with every same-name
//!    candidate attached for diagnostics. Never a silent guess.
//!
//! The build is deterministic: method facts are sorted by declaring-type
//! name then method name before insertion, so repeated runs over the same
//! input produce an identical graph.

use crate::facts::{CallSiteFact, FactSet, MethodFact};
use crate::graph::{CallGraph, UnresolvedCall};
use crate::models::{CallSiteLocation, Layer, MethodKey, MethodNode};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct CallGraphBuilder;

impl CallGraphBuilder {
    /// Build the call graph from a fact set. Pure function of its input;
    /// no I/O.
    pub fn build(facts: &FactSet) -> CallGraph {
        let mut graph: DiGraph<MethodNode, CallSiteLocation> = DiGraph::new();
        let mut index: FxHashMap<MethodKey, NodeIndex> = FxHashMap::default();

        // Fixed insertion order: declaring-type name, then method name.
        let mut ordered: Vec<&MethodFact> = facts.methods.iter().collect();
        ordered.sort_by(|a, b| {
            (&a.type_name, &a.method_name, a.parameters.len()).cmp(&(
                &b.type_name,
                &b.method_name,
                b.parameters.len(),
            ))
        });

        for fact in &ordered {
            let key = fact.key();
            if index.contains_key(&key) {
                warn!("duplicate method fact for {key}, keeping first");
                continue;
            }
            let node = MethodNode {
                type_name: fact.type_name.clone(),
                method_name: fact.method_name.clone(),
                parameters: fact.parameters.clone(),
                return_type: fact.return_type.clone(),
                file: fact.file.clone(),
                route_markers: fact.route_markers.clone(),
                layer: Layer::classify(&fact.annotations, &fact.type_name),
            };
            let idx = graph.add_node(node);
            index.insert(key, idx);
        }

        let scope = ImportScope::collect(facts);
        let by_name_arity = Self::group_by_name_arity(&index);
        let by_name = Self::group_by_name(&index);

        let mut unresolved = Vec::new();
        for fact in &ordered {
            let caller_key = fact.key();
            let Some(&caller_idx) = index.get(&caller_key) else {
                continue;
            };
            for site in &fact.call_sites {
                let location = CallSiteLocation {
                    file: fact.file.clone(),
                    line: site.line,
                };
                match Self::resolve(site, &fact.file, &scope, &index, &by_name_arity) {
                    Some(callee_idx) => {
                        graph.add_edge(caller_idx, callee_idx, location);
                    }
                    None => {
                        let mut candidates = by_name
                            .get(site.callee_name.as_str())
                            .cloned()
                            .unwrap_or_default();
                        candidates.sort();
                        debug!(
                            "unresolved call {}({} args) from {} ({} candidates)",
                            site.callee_name,
                            site.arg_count,
                            caller_key,
                            candidates.len()
                        );
                        unresolved.push(UnresolvedCall {
                            caller: caller_key.clone(),
                            callee_name: site.callee_name.clone(),
                            arg_count: site.arg_count,
                            location,
                            candidates,
                        });
                    }
                }
            }
        }

        CallGraph::new(graph, index, unresolved)
    }

    fn resolve(
        site: &CallSiteFact,
        caller_file: &PathBuf,
        scope: &ImportScope,
        index: &FxHashMap<MethodKey, NodeIndex>,
        by_name_arity: &FxHashMap<(String, usize), Vec<MethodKey>>,
    ) -> Option<NodeIndex> {
        // Attempt 1: exact match on the hinted receiver type, provided the
        // type is visible from the caller's file.
        if let Some(receiver) = &site.receiver_type {
            if scope.is_visible(caller_file, receiver) {
                let exact = MethodKey::new(receiver.clone(), site.callee_name.clone(), site.arg_count);
                if let Some(&idx) = index.get(&exact) {
                    return Some(idx);
                }
            }
        }

        // Attempt 2: unambiguous (name, arity) across all known types.
        let candidates = by_name_arity.get(&(site.callee_name.clone(), site.arg_count))?;
        if candidates.len() == 1 {
            return index.get(&candidates[0]).copied();
        }
        None
    }

    fn group_by_name_arity(
        index: &FxHashMap<MethodKey, NodeIndex>,
    ) -> FxHashMap<(String, usize), Vec<MethodKey>> {
        let mut map: FxHashMap<(String, usize), Vec<MethodKey>> = FxHashMap::default();
        for key in index.keys() {
            map.entry((key.method_name.clone(), key.arity))
                .or_default()
                .push(key.clone());
        }
        map
    }

    fn group_by_name(index: &FxHashMap<MethodKey, NodeIndex>) -> FxHashMap<String, Vec<MethodKey>> {
        let mut map: FxHashMap<String, Vec<MethodKey>> = FxHashMap::default();
        for key in index.keys() {
            map.entry(key.method_name.clone()).or_default().push(key.clone());
        }
        map
    }
}

/// Which type names are visible from each file: types declared in the file
/// itself plus the simple names of its imports. When the front end supplied
/// no import facts for a file, its scope is unknown and receiver hints are
/// trusted as-is; resolution is best-effort, not a type checker.
struct ImportScope {
    declared: FxHashMap<PathBuf, FxHashSet<String>>,
    imported: FxHashMap<PathBuf, FxHashSet<String>>,
}

impl ImportScope {
    fn collect(facts: &FactSet) -> Self {
        let mut declared: FxHashMap<PathBuf, FxHashSet<String>> = FxHashMap::default();
        for method in &facts.methods {
            declared
                .entry(method.file.clone())
                .or_default()
                .insert(method.type_name.clone());
        }
        let mut imported: FxHashMap<PathBuf, FxHashSet<String>> = FxHashMap::default();
        for file in &facts.files {
            let entry = imported.entry(file.path.clone()).or_default();
            for import in &file.imports {
                let simple = import.rsplit('.').next().unwrap_or(import);
                entry.insert(simple.to_string());
            }
        }
        Self { declared, imported }
    }

    fn is_visible(&self, file: &PathBuf, type_name: &str) -> bool {
        if self
            .declared
            .get(file)
            .is_some_and(|types| types.contains(type_name))
        {
            return true;
        }
        match self.imported.get(file) {
            Some(imports) => imports.contains(type_name),
            // No import facts for this file: scope unknown, trust the hint.
            None => true,
        }
    }
}
