//! Graph model.
//!
//! Nodes and edges live in two arenas indexed by [`NodeHandle`] and
//! [`EdgeHandle`]. Handles are only meaningful for the graph that issued
//! them, except that a spanning tree built from a graph keeps the node
//! handles of its source.
//!
//! Every change that can alter shortest paths (new node, new edge, new cost,
//! new identity) bumps the graph's revision so that memoised distances can be
//! recognised as stale.

pub mod identity;
pub mod types;

use std::collections::{BTreeMap, HashMap};

pub use identity::{IdentityScheme, NodeId, ParseNodeIdError};
pub use types::{Edge, EdgeHandle, FlowDirection, Node, NodeHandle};

/// Errors that can occur while building a graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Self-loop on node '{0}' is not supported")]
    SelfLoop(String),

    #[error("Unknown node handle: {0}")]
    UnknownNode(NodeHandle),
}

/// Undirected simple graph with traffic counters
#[derive(Debug, Clone)]
pub struct Graph {
    revision: u64,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<(NodeHandle, EdgeHandle)>>,
    by_label: HashMap<String, NodeHandle>,
    by_endpoints: HashMap<(NodeHandle, NodeHandle), EdgeHandle>,
    /// Graph-level attributes from the topology
    pub attributes: BTreeMap<String, String>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            revision: 0,
            nodes: Vec::new(),
            edges: Vec::new(),
            adjacency: Vec::new(),
            by_label: HashMap::new(),
            by_endpoints: HashMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Counter bumped on every topology, cost or identity change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node, or return the existing handle if the label is taken.
    pub fn add_node(&mut self, label: &str) -> NodeHandle {
        if let Some(&handle) = self.by_label.get(label) {
            return handle;
        }

        let handle = NodeHandle(self.nodes.len());
        self.nodes.push(Node::new(label));
        self.adjacency.push(Vec::new());
        self.by_label.insert(label.to_string(), handle);
        self.revision += 1;
        handle
    }

    /// Add an undirected edge between `u` and `v`.
    ///
    /// If the pair is already connected the existing edge is returned and its
    /// canonical direction is left untouched.
    pub fn add_edge(&mut self, u: NodeHandle, v: NodeHandle) -> Result<EdgeHandle, GraphError> {
        self.check(u)?;
        self.check(v)?;
        if u == v {
            return Err(GraphError::SelfLoop(self.nodes[u.0].label.clone()));
        }

        let key = Self::endpoint_key(u, v);
        if let Some(&existing) = self.by_endpoints.get(&key) {
            return Ok(existing);
        }

        let handle = EdgeHandle(self.edges.len());
        let canonical = format!("{},{}", self.nodes[u.0].label, self.nodes[v.0].label);
        self.edges.push(Edge::new(u, v, canonical));
        self.adjacency[u.0].push((v, handle));
        self.adjacency[v.0].push((u, handle));
        self.by_endpoints.insert(key, handle);
        self.revision += 1;
        Ok(handle)
    }

    /// Convenience wrapper creating both endpoints by label.
    pub fn connect(&mut self, u: &str, v: &str) -> Result<EdgeHandle, GraphError> {
        let u = self.add_node(u);
        let v = self.add_node(v);
        self.add_edge(u, v)
    }

    pub fn find(&self, label: &str) -> Option<NodeHandle> {
        self.by_label.get(label).copied()
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        handle.0 < self.nodes.len()
    }

    /// Node behind `handle`.
    ///
    /// Panics if the handle was not issued by this graph.
    pub fn node(&self, handle: NodeHandle) -> &Node {
        &self.nodes[handle.0]
    }

    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle.0)
    }

    pub(crate) fn node_mut(&mut self, handle: NodeHandle) -> &mut Node {
        &mut self.nodes[handle.0]
    }

    /// Edge behind `handle`.
    ///
    /// Panics if the handle was not issued by this graph.
    pub fn edge(&self, handle: EdgeHandle) -> &Edge {
        &self.edges[handle.0]
    }

    pub fn get_edge(&self, handle: EdgeHandle) -> Option<&Edge> {
        self.edges.get(handle.0)
    }

    pub(crate) fn edge_mut(&mut self, handle: EdgeHandle) -> &mut Edge {
        &mut self.edges[handle.0]
    }

    pub fn edge_between(&self, u: NodeHandle, v: NodeHandle) -> Option<EdgeHandle> {
        self.by_endpoints.get(&Self::endpoint_key(u, v)).copied()
    }

    pub fn label(&self, handle: NodeHandle) -> &str {
        &self.nodes[handle.0].label
    }

    pub fn id(&self, handle: NodeHandle) -> Option<&NodeId> {
        self.nodes[handle.0].id.as_ref()
    }

    /// Neighbours of `handle` with the connecting edge, in insertion order.
    pub fn neighbors(&self, handle: NodeHandle) -> impl Iterator<Item = (NodeHandle, EdgeHandle)> + '_ {
        self.adjacency[handle.0].iter().copied()
    }

    pub fn degree(&self, handle: NodeHandle) -> usize {
        self.adjacency[handle.0].len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &Node)> + '_ {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeHandle(i), n))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeHandle, &Edge)> + '_ {
        self.edges.iter().enumerate().map(|(i, e)| (EdgeHandle(i), e))
    }

    pub fn node_handles(&self) -> impl Iterator<Item = NodeHandle> {
        (0..self.nodes.len()).map(NodeHandle)
    }

    pub fn set_node_id(&mut self, handle: NodeHandle, id: NodeId) {
        let node = &mut self.nodes[handle.0];
        if node.id.as_ref() != Some(&id) {
            node.id = Some(id);
            self.revision += 1;
        }
    }

    pub fn set_edge_cost(&mut self, handle: EdgeHandle, cost: u32) {
        let edge = &mut self.edges[handle.0];
        if edge.cost != Some(cost) {
            edge.cost = Some(cost);
            self.revision += 1;
        }
    }

    /// Cost of the edge joining `u` and `v`, if both the edge and its cost exist.
    pub fn cost_between(&self, u: NodeHandle, v: NodeHandle) -> Option<u32> {
        self.edge_between(u, v).and_then(|e| self.edges[e.0].cost)
    }

    fn check(&self, handle: NodeHandle) -> Result<(), GraphError> {
        if self.contains(handle) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(handle))
        }
    }

    fn endpoint_key(u: NodeHandle, v: NodeHandle) -> (NodeHandle, NodeHandle) {
        if u <= v {
            (u, v)
        } else {
            (v, u)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_is_idempotent_per_label() {
        let mut graph = Graph::new();
        let a = graph.add_node("A");
        let again = graph.add_node("A");
        assert_eq!(a, again);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.find("A"), Some(a));
        assert_eq!(graph.find("B"), None);
    }

    #[test]
    fn test_add_edge_records_canonical_direction() {
        let mut graph = Graph::new();
        let e = graph.connect("S1", "S2").unwrap();
        assert_eq!(graph.edge(e).canonical_direction(), "S1,S2");

        // Re-adding in the opposite orientation keeps the first direction
        let again = graph.connect("S2", "S1").unwrap();
        assert_eq!(e, again);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge(e).canonical_direction(), "S1,S2");
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut graph = Graph::new();
        let a = graph.add_node("A");
        assert_eq!(graph.add_edge(a, a), Err(GraphError::SelfLoop("A".to_string())));
    }

    #[test]
    fn test_unknown_handle_rejected() {
        let mut graph = Graph::new();
        let a = graph.add_node("A");
        assert_eq!(
            graph.add_edge(a, NodeHandle(5)),
            Err(GraphError::UnknownNode(NodeHandle(5)))
        );
    }

    #[test]
    fn test_revision_tracks_changes() {
        let mut graph = Graph::new();
        let start = graph.revision();
        let e = graph.connect("A", "B").unwrap();
        let after_edge = graph.revision();
        assert!(after_edge > start);

        graph.set_edge_cost(e, 19);
        let after_cost = graph.revision();
        assert!(after_cost > after_edge);

        // Same cost again is not a change
        graph.set_edge_cost(e, 19);
        assert_eq!(graph.revision(), after_cost);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut graph = Graph::new();
        let e = graph.connect("A", "B").unwrap();
        let mut copy = graph.clone();
        assert_eq!(copy.revision(), graph.revision());

        copy.set_edge_cost(e, 4);
        assert!(copy.revision() > graph.revision());
        assert_eq!(graph.edge(e).cost(), None);
    }

    #[test]
    fn test_neighbors_in_insertion_order() {
        let mut graph = Graph::new();
        graph.connect("hub", "x").unwrap();
        graph.connect("hub", "y").unwrap();
        let hub = graph.find("hub").unwrap();
        let labels: Vec<&str> = graph.neighbors(hub).map(|(n, _)| graph.label(n)).collect();
        assert_eq!(labels, vec!["x", "y"]);
        assert_eq!(graph.degree(hub), 2);
    }
}
