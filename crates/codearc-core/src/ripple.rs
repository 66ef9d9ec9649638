//! Ripple-effect queries over a finalized call graph.
//!
//! `update_code` is deliberately one hop: it reports the direct callers of the
//! edited function. `impact_radius` is the separate, transitive variant.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::graph::call_graph::CallGraph;

/// Result of a code edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RippleReport {
    pub node_id: String,
    /// Direct callers of the edited node, sorted.
    pub affected_nodes: Vec<String>,
}

/// Replace a node's code and return its direct callers.
///
/// Identity, edges and cluster membership are untouched. Unknown ids fail with
/// `NodeNotFound` before anything is mutated.
pub fn update_code(graph: &mut CallGraph, node_id: &str, code: &str) -> Result<RippleReport> {
    let node = graph
        .node_mut(node_id)
        .ok_or_else(|| AnalysisError::NodeNotFound(node_id.to_string()))?;
    node.code = code.to_string();
    Ok(RippleReport {
        node_id: node_id.to_string(),
        affected_nodes: direct_callers(graph, node_id)?,
    })
}

/// Nodes with an edge into `node_id`, sorted.
pub fn direct_callers(graph: &CallGraph, node_id: &str) -> Result<Vec<String>> {
    graph
        .predecessors(node_id)
        .ok_or_else(|| AnalysisError::NodeNotFound(node_id.to_string()))
}

/// Nodes `node_id` calls, sorted.
pub fn direct_callees(graph: &CallGraph, node_id: &str) -> Result<Vec<String>> {
    graph
        .successors(node_id)
        .ok_or_else(|| AnalysisError::NodeNotFound(node_id.to_string()))
}

/// Reverse BFS from `node_id`: every transitive caller within `max_depth` hops,
/// mapped to its shortest distance. The node itself is excluded.
pub fn impact_radius(
    graph: &CallGraph,
    node_id: &str,
    max_depth: usize,
) -> Result<BTreeMap<String, usize>> {
    if !graph.contains(node_id) {
        return Err(AnalysisError::NodeNotFound(node_id.to_string()));
    }

    let mut ancestors: BTreeMap<String, usize> = BTreeMap::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    ancestors.insert(node_id.to_string(), 0);
    queue.push_back((node_id.to_string(), 0));

    while let Some((current, d)) = queue.pop_front() {
        if d >= max_depth {
            continue;
        }
        for caller in graph.predecessors(&current).unwrap_or_default() {
            if !ancestors.contains_key(&caller) {
                ancestors.insert(caller.clone(), d + 1);
                queue.push_back((caller, d + 1));
            }
        }
    }

    ancestors.remove(node_id);
    Ok(ancestors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FunctionNode;
    use pretty_assertions::assert_eq;

    fn node(id: &str) -> FunctionNode {
        FunctionNode {
            id: id.to_string(),
            name: id.to_string(),
            file: "x.java".to_string(),
            scope: None,
            signature: String::new(),
            start_line: 1,
            end_line: 1,
            code: format!("old {id}"),
            cluster: Some(0),
        }
    }

    /// a -> b -> c, d -> c, c -> c
    fn chain() -> CallGraph {
        let mut g = CallGraph::new();
        for id in ["a", "b", "c", "d"] {
            g.add_function(node(id));
        }
        g.add_call("a", "b");
        g.add_call("b", "c");
        g.add_call("d", "c");
        g.add_call("c", "c");
        g
    }

    #[test]
    fn update_returns_direct_callers_only() {
        let mut g = chain();
        let report = update_code(&mut g, "c", "new c").unwrap();
        assert_eq!(report.affected_nodes, vec!["b", "c", "d"]);
        assert_eq!(g.node("c").unwrap().code, "new c");
    }

    #[test]
    fn update_is_idempotent() {
        let mut g = chain();
        let first = update_code(&mut g, "b", "same").unwrap();
        let second = update_code(&mut g, "b", "same").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.affected_nodes, vec!["a"]);
    }

    #[test]
    fn update_keeps_edges_and_cluster() {
        let mut g = chain();
        let edges_before = g.edges();
        update_code(&mut g, "b", "changed").unwrap();
        assert_eq!(g.edges(), edges_before);
        assert_eq!(g.node("b").unwrap().cluster, Some(0));
    }

    #[test]
    fn unknown_node_is_rejected_without_mutation() {
        let mut g = chain();
        let err = update_code(&mut g, "nonexistent", "x").unwrap_err();
        assert!(matches!(err, AnalysisError::NodeNotFound(ref id) if id == "nonexistent"));
        assert!(g.nodes().iter().all(|n| n.code.starts_with("old")));
    }

    #[test]
    fn callee_query() {
        let g = chain();
        assert_eq!(direct_callees(&g, "a").unwrap(), vec!["b"]);
        assert!(direct_callees(&g, "zzz").is_err());
    }

    #[test]
    fn impact_radius_walks_transitively() {
        let g = chain();
        let radius = impact_radius(&g, "c", 5).unwrap();
        let expected: BTreeMap<String, usize> =
            [("a".to_string(), 2), ("b".to_string(), 1), ("d".to_string(), 1)]
                .into_iter()
                .collect();
        assert_eq!(radius, expected);
    }

    #[test]
    fn impact_radius_respects_depth() {
        let g = chain();
        let radius = impact_radius(&g, "c", 1).unwrap();
        assert_eq!(radius.keys().cloned().collect::<Vec<_>>(), vec!["b", "d"]);
    }
}
