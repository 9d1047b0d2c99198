use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use petgraph::{
    algo,
    graph::{DiGraph, NodeIndex},
    Direction,
};

use crate::{
    estimates,
    registry::{canonical_name, Registry},
};

/// One hop of a worst-case call path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Call(String),
    /// Traversal re-entered a function already on the active call path.
    /// The branch is truncated here and contributes no further stack.
    Recursion(String),
}

impl Step {
    pub fn function(&self) -> &str {
        match self {
            Step::Call(name) | Step::Recursion(name) => name,
        }
    }

    pub fn is_recursion(&self) -> bool {
        matches!(self, Step::Recursion(_))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Step::Call(name) => f.write_str(name),
            Step::Recursion(name) => write!(f, "<recursion: {name}>"),
        }
    }
}

/// The heaviest call path from one entry point down to a leaf (or a
/// truncated cycle), with its accumulated byte total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathResult {
    pub total_bytes: u64,
    pub path: Vec<Step>,
}

/// Worst-case path computation over the call graph.
///
/// Holds the registry mutably for the duration of the analysis: the first
/// time an unknown function is costed, a synthesized estimate is recorded
/// so later lookups and the report see it.
pub struct Resolver<'a> {
    registry: &'a mut Registry,
    graph: DiGraph<String, ()>,
    indices: BTreeMap<String, NodeIndex>,
    // path-context-sensitive memoization: the same function reached under
    // two different recursion-guard sets is cached separately
    cache: HashMap<(NodeIndex, BTreeSet<NodeIndex>), PathResult>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a mut Registry) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = BTreeMap::new();

        for name in registry.names() {
            let idx = graph.add_node(name.to_string());
            indices.insert(name.to_string(), idx);
        }

        // callees may reference names with no fact of their own (library
        // and HAL symbols); they become leaf nodes costed lazily
        for fact in registry.iter() {
            let caller = indices[&fact.name];
            for callee in &fact.callees {
                let callee = *indices.entry(callee.clone()).or_insert_with(|| graph.add_node(callee.clone()));
                graph.add_edge(caller, callee, ());
            }
        }

        let resolver = Resolver {
            registry,
            graph,
            indices,
            cache: HashMap::new(),
        };
        resolver.warn_on_recursion();
        resolver
    }

    /// Warn about recursive call groups up front: any total through a
    /// cycle is a lower bound, because recursion depth is not statically
    /// knowable.
    fn warn_on_recursion(&self) {
        for scc in algo::kosaraju_scc(&self.graph) {
            let is_cycle = scc.len() > 1
                || self
                    .graph
                    .neighbors_directed(scc[0], Direction::Outgoing)
                    .any(|n| n == scc[0]);

            if is_cycle {
                let names: Vec<_> = scc.iter().map(|idx| self.graph[*idx].as_str()).collect();
                log::warn!(
                    "recursive call group detected ({}); totals through it are lower bounds",
                    names.join(", ")
                );
            }
        }
    }

    /// Compute the worst-case path from `entry`. Never fails: functions
    /// without facts fall back to the estimate table or the global
    /// unknown-function default.
    pub fn resolve(&mut self, entry: &str) -> PathResult {
        let node = self.ensure_node(&canonical_name(entry));
        let mut active = BTreeSet::new();
        self.walk(node, &mut active)
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.indices.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.indices.insert(name.to_string(), idx);
        idx
    }

    fn walk(&mut self, node: NodeIndex, active: &mut BTreeSet<NodeIndex>) -> PathResult {
        let name = self.graph[node].clone();

        if active.contains(&node) {
            log::debug!("recursion detected at `{name}`");
            return PathResult {
                total_bytes: 0,
                path: vec![Step::Recursion(name)],
            };
        }

        let key = (node, active.clone());
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }

        let own = u64::from(self.own_cost(&name));

        active.insert(node);
        let callees: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        let mut heaviest: Option<PathResult> = None;
        for callee in callees {
            let sub = self.walk(callee, active);
            // ties keep the first candidate seen; the winner on a tie is
            // unspecified, only the total is contractual
            let wins = heaviest
                .as_ref()
                .map_or(true, |best| sub.total_bytes > best.total_bytes);
            if wins {
                heaviest = Some(sub);
            }
        }
        active.remove(&node);

        let result = match heaviest {
            None => PathResult {
                total_bytes: own,
                path: vec![Step::Call(name)],
            },
            Some(sub) => {
                let mut path = Vec::with_capacity(sub.path.len() + 1);
                path.push(Step::Call(name));
                path.extend(sub.path);
                PathResult {
                    total_bytes: own + sub.total_bytes,
                    path,
                }
            }
        };

        self.cache.insert(key, result.clone());
        result
    }

    /// A function's own frame cost: its declared fact if present,
    /// otherwise the estimate table, otherwise the unknown default. The
    /// non-fact cases record a synthesized estimate into the registry.
    fn own_cost(&mut self, name: &str) -> u32 {
        if let Some(fact) = self.registry.fact(name) {
            return fact.own_stack_bytes;
        }

        let bytes = match estimates::estimate_for(name) {
            Some(bytes) => bytes,
            None => {
                log::debug!("no estimate for `{name}`; assuming {} bytes", estimates::UNKNOWN_CALL_BYTES);
                estimates::UNKNOWN_CALL_BYTES
            }
        };
        self.registry.record_estimate(name, bytes);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::registry::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation {
            file: "main.c".into(),
            line: 1,
        }
    }

    fn registry_with(facts: &[(&str, u32)], edges: &[(&str, &str)]) -> Registry {
        let mut registry = Registry::new();
        for (name, bytes) in facts {
            registry.record_fact(name, *bytes, false, loc());
        }
        for (caller, callee) in edges {
            registry.record_call(caller, callee);
        }
        registry
    }

    fn call_names(result: &PathResult) -> Vec<&str> {
        result.path.iter().map(Step::function).collect()
    }

    #[test]
    fn leaf_total_is_its_own_frame() {
        let mut registry = registry_with(&[("leaf", 40)], &[]);
        let result = Resolver::new(&mut registry).resolve("leaf");

        assert_eq!(result.total_bytes, 40);
        assert_eq!(result.path, vec![Step::Call("leaf".into())]);
    }

    #[test]
    fn linear_chain_accumulates() {
        let mut registry = registry_with(
            &[("A", 10), ("B", 20), ("C", 30)],
            &[("A", "B"), ("B", "C")],
        );
        let result = Resolver::new(&mut registry).resolve("A");

        assert_eq!(result.total_bytes, 60);
        assert_eq!(call_names(&result), ["A", "B", "C"]);
    }

    #[test]
    fn diamond_takes_the_heavier_branch() {
        let mut registry = registry_with(
            &[("A", 1), ("B", 2), ("C", 3), ("D", 50), ("E", 5)],
            &[("A", "B"), ("A", "C"), ("B", "E"), ("C", "D")],
        );
        let result = Resolver::new(&mut registry).resolve("A");

        assert_eq!(result.total_bytes, 1 + 3 + 50);
        assert_eq!(call_names(&result), ["A", "C", "D"]);
    }

    #[test]
    fn direct_cycle_terminates_with_marker() {
        let mut registry = registry_with(&[("A", 10), ("B", 20)], &[("A", "B"), ("B", "A")]);
        let result = Resolver::new(&mut registry).resolve("A");

        assert_eq!(result.total_bytes, 30, "cycle branch contributes zero beyond one traversal");
        assert_eq!(
            result.path,
            vec![
                Step::Call("A".into()),
                Step::Call("B".into()),
                Step::Recursion("A".into()),
            ]
        );
    }

    #[test]
    fn self_recursion_terminates() {
        let mut registry = registry_with(&[("A", 16)], &[("A", "A")]);
        let result = Resolver::new(&mut registry).resolve("A");

        assert_eq!(result.total_bytes, 16);
        assert!(result.path.last().unwrap().is_recursion());
    }

    #[test]
    fn unknown_callee_costs_the_default_and_is_marked_estimated() {
        let mut registry = registry_with(&[("A", 10)], &[("A", "mystery_blob")]);
        let result = Resolver::new(&mut registry).resolve("A");

        assert_eq!(result.total_bytes, 10 + u64::from(estimates::UNKNOWN_CALL_BYTES));
        assert!(registry.is_estimated("mystery_blob"));
        assert_eq!(registry.declared_stack("mystery_blob"), None);
    }

    #[test]
    fn library_callee_uses_the_estimate_table() {
        let mut registry = registry_with(&[("A", 10)], &[("A", "printf")]);
        let result = Resolver::new(&mut registry).resolve("A");

        assert_eq!(result.total_bytes, 10 + 512);
        assert!(registry.is_estimated("printf"));
    }

    #[test]
    fn equal_branches_tie_on_total_only() {
        let mut registry = registry_with(
            &[("A", 4), ("B", 8), ("C", 8)],
            &[("A", "B"), ("A", "C")],
        );
        let result = Resolver::new(&mut registry).resolve("A");

        // which of B/C wins is unspecified; the total is not
        assert_eq!(result.total_bytes, 12);
        assert_eq!(result.path.len(), 2);
    }

    #[test]
    fn resolving_an_unregistered_entry_still_succeeds() {
        let mut registry = Registry::new();
        let result = Resolver::new(&mut registry).resolve("GhostTask");

        assert_eq!(result.total_bytes, u64::from(estimates::UNKNOWN_CALL_BYTES));
        assert_eq!(result.path, vec![Step::Call("GhostTask".into())]);
    }

    #[test]
    fn shared_subtree_is_memoized_consistently() {
        // A -> B -> D, A -> C -> D: D is resolved under two different
        // active sets and must produce the same total both times
        let mut registry = registry_with(
            &[("A", 1), ("B", 2), ("C", 3), ("D", 40)],
            &[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")],
        );
        let result = Resolver::new(&mut registry).resolve("A");

        assert_eq!(result.total_bytes, 1 + 3 + 40);
    }
}
