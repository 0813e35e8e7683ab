//! Node and edge records stored in the graph arena.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::identity::NodeId;

/// Stable index of a node inside a [`Graph`](super::Graph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeHandle(pub(crate) usize);

impl NodeHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Stable index of an edge inside a [`Graph`](super::Graph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeHandle(pub(crate) usize);

impl EdgeHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which of an edge's two counters a traversal updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowDirection {
    /// Same orientation as the edge's canonical direction
    Forward,
    /// Against the canonical direction
    Backward,
}

/// A switch or host in the topology
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub label: String,
    /// `ID` attribute as written in the topology, if any
    pub raw_id: Option<String>,
    /// Assigned identity; `None` until attributes are assigned
    pub id: Option<NodeId>,
    /// Other attributes carried through from the topology
    pub attributes: BTreeMap<String, String>,
    pub(crate) tx: f64,
    pub(crate) rx: f64,
}

impl Node {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            raw_id: None,
            id: None,
            attributes: BTreeMap::new(),
            tx: 0.0,
            rx: 0.0,
        }
    }

    /// Traffic transmitted by this node
    pub fn tx(&self) -> f64 {
        self.tx
    }

    /// Traffic received by this node
    pub fn rx(&self) -> f64 {
        self.rx
    }

    pub(crate) fn reset_traffic(&mut self) {
        self.tx = 0.0;
        self.rx = 0.0;
    }
}

/// An undirected link between two nodes.
///
/// The link remembers the orientation it was created with so that traffic in
/// each direction lands in its own counter.
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub(crate) endpoints: (NodeHandle, NodeHandle),
    pub(crate) canonical_direction: String,
    /// `speed` attribute as written in the topology, if any
    pub speed: Option<String>,
    pub(crate) cost: Option<u32>,
    /// Other attributes carried through from the topology
    pub attributes: BTreeMap<String, String>,
    pub(crate) forward: f64,
    pub(crate) backward: f64,
    pub(crate) bandwidth: f64,
}

impl Edge {
    pub(crate) fn new(u: NodeHandle, v: NodeHandle, canonical_direction: String) -> Self {
        Self {
            endpoints: (u, v),
            canonical_direction,
            speed: None,
            cost: None,
            attributes: BTreeMap::new(),
            forward: 0.0,
            backward: 0.0,
            bandwidth: 0.0,
        }
    }

    /// Endpoints in creation order `(u, v)`
    pub fn endpoints(&self) -> (NodeHandle, NodeHandle) {
        self.endpoints
    }

    /// The `"u,v"` tag fixed when the edge was created
    pub fn canonical_direction(&self) -> &str {
        &self.canonical_direction
    }

    pub fn cost(&self) -> Option<u32> {
        self.cost
    }

    pub fn forward(&self) -> f64 {
        self.forward
    }

    pub fn backward(&self) -> f64 {
        self.backward
    }

    /// Larger of the two directional counters
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn connects(&self, node: NodeHandle) -> bool {
        self.endpoints.0 == node || self.endpoints.1 == node
    }

    /// The endpoint opposite `node`
    pub fn opposite(&self, node: NodeHandle) -> Option<NodeHandle> {
        match self.endpoints {
            (u, v) if u == node => Some(v),
            (u, v) if v == node => Some(u),
            _ => None,
        }
    }

    /// Direction of a traversal from `from` to `to`.
    pub fn direction(&self, from: NodeHandle, to: NodeHandle) -> FlowDirection {
        if self.endpoints == (from, to) {
            FlowDirection::Forward
        } else {
            FlowDirection::Backward
        }
    }

    pub(crate) fn record(&mut self, direction: FlowDirection, amount: f64) {
        match direction {
            FlowDirection::Forward => self.forward += amount,
            FlowDirection::Backward => self.backward += amount,
        }
        self.bandwidth = self.forward.max(self.backward);
    }

    pub(crate) fn reset_traffic(&mut self) {
        self.forward = 0.0;
        self.backward = 0.0;
        self.bandwidth = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_direction_and_bandwidth() {
        let (a, b) = (NodeHandle(0), NodeHandle(1));
        let mut edge = Edge::new(a, b, "a,b".to_string());

        assert_eq!(edge.direction(a, b), FlowDirection::Forward);
        assert_eq!(edge.direction(b, a), FlowDirection::Backward);

        edge.record(FlowDirection::Forward, 3.0);
        assert_eq!(edge.bandwidth(), 3.0);
        edge.record(FlowDirection::Backward, 5.0);
        assert_eq!(edge.forward(), 3.0);
        assert_eq!(edge.backward(), 5.0);
        assert_eq!(edge.bandwidth(), 5.0);

        edge.reset_traffic();
        assert_eq!(edge.bandwidth(), 0.0);
    }

    #[test]
    fn test_edge_opposite() {
        let edge = Edge::new(NodeHandle(3), NodeHandle(7), "x,y".to_string());
        assert_eq!(edge.opposite(NodeHandle(3)), Some(NodeHandle(7)));
        assert_eq!(edge.opposite(NodeHandle(7)), Some(NodeHandle(3)));
        assert_eq!(edge.opposite(NodeHandle(1)), None);
        assert!(edge.connects(NodeHandle(7)));
    }
}
