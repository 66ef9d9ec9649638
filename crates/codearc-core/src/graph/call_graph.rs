//! Whole-program call graph backed by petgraph::DiGraph.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::config::FunctionNode;

/// Directed call graph: an edge `a -> b` means `a` calls `b`.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    graph: DiGraph<FunctionNode, ()>,
    /// O(1) string ID → NodeIndex lookup.
    id_index: HashMap<String, NodeIndex>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Returns false (and leaves the graph unchanged) on a duplicate id.
    pub fn add_function(&mut self, node: FunctionNode) -> bool {
        if self.id_index.contains_key(&node.id) {
            return false;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        true
    }

    /// Add a call edge. Repeated calls between the same pair collapse to one edge.
    /// Returns false if either endpoint is unknown.
    pub fn add_call(&mut self, caller: &str, callee: &str) -> bool {
        match (self.id_index.get(caller), self.id_index.get(callee)) {
            (Some(&from), Some(&to)) => {
                self.graph.update_edge(from, to, ());
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&FunctionNode> {
        self.id_index
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut FunctionNode> {
        let idx = *self.id_index.get(id)?;
        self.graph.node_weight_mut(idx)
    }

    /// Callers of `id`, sorted. `None` when the node is unknown.
    pub fn predecessors(&self, id: &str) -> Option<Vec<String>> {
        self.neighbours(id, Direction::Incoming)
    }

    /// Callees of `id`, sorted. `None` when the node is unknown.
    pub fn successors(&self, id: &str) -> Option<Vec<String>> {
        self.neighbours(id, Direction::Outgoing)
    }

    fn neighbours(&self, id: &str, direction: Direction) -> Option<Vec<String>> {
        let &idx = self.id_index.get(id)?;
        let mut ids: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Some(ids)
    }

    /// All nodes sorted by id.
    pub fn nodes(&self) -> Vec<&FunctionNode> {
        let mut nodes: Vec<&FunctionNode> = self.graph.node_weights().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// All node ids, sorted.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes().into_iter().map(|n| n.id.clone()).collect()
    }

    /// All edges as (caller, callee), sorted.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].id.clone(),
                    self.graph[e.target()].id.clone(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Set the cluster of every node listed in `assignment`.
    pub fn assign_clusters(&mut self, assignment: &HashMap<String, usize>) {
        for node in self.graph.node_weights_mut() {
            node.cluster = assignment.get(&node.id).copied();
        }
    }
}
