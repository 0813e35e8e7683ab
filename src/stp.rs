//! Spanning tree construction.
//!
//! Emulates how 802.1D bridges settle on a loop-free topology: the bridge
//! with the lowest ID becomes root, every other bridge keeps the port on its
//! cheapest path to the root, and equal-cost candidates are decided in favour
//! of the neighbour with the lowest ID.
//!
//! The tree is returned as a separate [`Graph`] holding every node of the
//! input and only the selected links; the input graph is never modified.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};
use serde::Serialize;

use crate::graph::{Graph, NodeHandle, NodeId};
use crate::routing::{self, Distances};

/// Errors that abort spanning tree construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StpError {
    #[error("Cannot build a spanning tree of an empty graph")]
    EmptyGraph,

    #[error("Node '{0}' has no ID; assign attributes first")]
    MissingIdentity(String),

    #[error("Link {0} has no cost; assign attributes first")]
    MissingCost(String),

    #[error("Nodes '{first}' and '{second}' share ID {id}")]
    DuplicateNodeId {
        id: NodeId,
        first: String,
        second: String,
    },

    #[error("Graph is not connected: {unreachable} node(s) cannot reach root '{root}' (e.g. '{example}')")]
    GraphNotConnected {
        root: String,
        unreachable: usize,
        example: String,
    },
}

/// What a cache remembers about the graph its entries were computed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GraphStamp {
    revision: u64,
    nodes: usize,
    edges: usize,
}

impl GraphStamp {
    fn of(graph: &Graph) -> Self {
        Self {
            revision: graph.revision(),
            nodes: graph.node_count(),
            edges: graph.edge_count(),
        }
    }
}

/// Memoised root distances for one graph.
///
/// The cache is owned by the caller and never attached to the graph. Entries
/// are keyed by root and are all dropped once the graph's stamp (revision,
/// node and link counts) differs from the one they were computed under. Use
/// one cache per graph.
#[derive(Default)]
pub struct DistanceCache {
    stamp: Option<GraphStamp>,
    entries: HashMap<NodeHandle, Distances>,
    hits: u64,
    misses: u64,
}

impl DistanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distances from `root`, computed on first use or after a graph change.
    pub fn distances(&mut self, graph: &Graph, root: NodeHandle) -> &Distances {
        let stamp = GraphStamp::of(graph);
        if self.stamp != Some(stamp) {
            self.entries.clear();
            self.stamp = Some(stamp);
        }

        if self.entries.contains_key(&root) {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        self.entries
            .entry(root)
            .or_insert_with(|| routing::distances(graph, root))
    }

    /// Drop every entry.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.stamp = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl std::fmt::Debug for DistanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceCache")
            .field("entries", &self.entries.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

/// A link kept by the spanning tree: `node`'s root port leads to `next_hop`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeEdge {
    pub node: NodeHandle,
    pub next_hop: NodeHandle,
    pub cost: u32,
}

/// Result of [`build_spanning_tree`]
#[derive(Debug, Clone)]
pub struct SpanningTree {
    root: NodeHandle,
    edges: Vec<TreeEdge>,
    graph: Graph,
}

impl SpanningTree {
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Tree links in the order nodes were settled (ascending root distance)
    pub fn edges(&self) -> &[TreeEdge] {
        &self.edges
    }

    /// Tree links as unordered pairs, smaller handle first
    pub fn edge_set(&self) -> BTreeSet<(NodeHandle, NodeHandle)> {
        self.edges
            .iter()
            .map(|e| {
                if e.node <= e.next_hop {
                    (e.node, e.next_hop)
                } else {
                    (e.next_hop, e.node)
                }
            })
            .collect()
    }

    /// The tree as a graph sharing node handles with its source
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Next hop towards the root, `None` for the root itself.
    pub fn next_hop(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.edges.iter().find(|e| e.node == node).map(|e| e.next_hop)
    }

    /// Tree path from `node` up to the root, inclusive.
    pub fn path_to_root(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let mut path = vec![node];
        let mut current = node;
        while let Some(next) = self.next_hop(current) {
            path.push(next);
            current = next;
            if path.len() > self.graph.node_count() {
                break;
            }
        }
        path
    }
}

/// Node with the smallest ID, after checking every node has a unique one.
pub fn select_root(graph: &Graph) -> Result<NodeHandle, StpError> {
    let mut seen: HashMap<&NodeId, NodeHandle> = HashMap::new();
    let mut root: Option<(&NodeId, NodeHandle)> = None;

    for (handle, node) in graph.nodes() {
        let id = node
            .id
            .as_ref()
            .ok_or_else(|| StpError::MissingIdentity(node.label.clone()))?;

        if let Some(&other) = seen.get(id) {
            return Err(StpError::DuplicateNodeId {
                id: id.clone(),
                first: graph.label(other).to_string(),
                second: node.label.clone(),
            });
        }
        seen.insert(id, handle);

        if root.map_or(true, |(best, _)| id < best) {
            root = Some((id, handle));
        }
    }

    root.map(|(_, handle)| handle).ok_or(StpError::EmptyGraph)
}

/// Root port selection: among the neighbours that lie on a shortest path to
/// the root, the one with the smallest ID.
pub fn preferred_next_hop(graph: &Graph, node: NodeHandle, to_root: &Distances) -> Option<NodeHandle> {
    routing::shortest_path_successors(graph, node, to_root).min_by(|a, b| graph.id(*a).cmp(&graph.id(*b)))
}

/// The shortest path from `node` to the root whose ID sequence is smallest.
///
/// Taking the lowest-ID next hop at every step yields the lexicographically
/// smallest sequence among all shortest paths, since every continuation from
/// a shortest-path successor is itself a shortest path.
pub fn preferred_path_to_root(graph: &Graph, node: NodeHandle, to_root: &Distances) -> Vec<NodeHandle> {
    let mut path = vec![node];
    let mut current = node;
    while current != to_root.source() {
        match preferred_next_hop(graph, current, to_root) {
            Some(next) => {
                path.push(next);
                current = next;
            }
            None => break,
        }
    }
    path
}

/// Build the spanning tree with a throwaway distance cache.
pub fn get_spanning_tree(graph: &Graph) -> Result<SpanningTree, StpError> {
    let mut cache = DistanceCache::new();
    build_spanning_tree(graph, &mut cache)
}

/// Build the spanning tree of a connected graph with IDs and costs assigned.
///
/// No partial tree is ever returned: a missing ID or cost, a duplicate ID or
/// a node that cannot reach the root fails the whole call.
pub fn build_spanning_tree(graph: &Graph, cache: &mut DistanceCache) -> Result<SpanningTree, StpError> {
    if graph.is_empty() {
        return Err(StpError::EmptyGraph);
    }

    let root = select_root(graph)?;

    if let Some((_, edge)) = graph.edges().find(|(_, e)| e.cost().is_none()) {
        return Err(StpError::MissingCost(edge.canonical_direction().to_string()));
    }

    let to_root = cache.distances(graph, root);

    let unreachable: Vec<NodeHandle> = to_root.unreachable().collect();
    if let Some(&example) = unreachable.first() {
        return Err(StpError::GraphNotConnected {
            root: graph.label(root).to_string(),
            unreachable: unreachable.len(),
            example: graph.label(example).to_string(),
        });
    }

    let mut edges = Vec::with_capacity(graph.node_count().saturating_sub(1));
    for node in to_root.order_by_distance() {
        if node == root {
            continue;
        }

        // Reachable nodes other than the root always have a successor
        let Some(next_hop) = preferred_next_hop(graph, node, to_root) else {
            continue;
        };
        let cost = graph.cost_between(node, next_hop).unwrap_or_default();

        debug!(
            "Root port of '{}' -> '{}' (distance {})",
            graph.label(node),
            graph.label(next_hop),
            to_root.get(node).unwrap_or_default()
        );
        edges.push(TreeEdge { node, next_hop, cost });
    }

    let tree_graph = tree_graph(graph, root, &edges);

    info!(
        "Spanning tree rooted at '{}' with {} links ({} links blocked)",
        graph.label(root),
        edges.len(),
        graph.edge_count() - edges.len()
    );

    Ok(SpanningTree {
        root,
        edges,
        graph: tree_graph,
    })
}

/// Copy every node of `source` and only the tree links into a new graph.
fn tree_graph(source: &Graph, root: NodeHandle, edges: &[TreeEdge]) -> Graph {
    let mut tree = Graph::new();
    tree.attributes = source.attributes.clone();
    tree.attributes.insert("root".to_string(), source.label(root).to_string());

    for (_, node) in source.nodes() {
        let handle = tree.add_node(&node.label);
        let copy = tree.node_mut(handle);
        copy.raw_id = node.raw_id.clone();
        copy.attributes = node.attributes.clone();
        if let Some(id) = node.id.clone() {
            tree.set_node_id(handle, id);
        }
    }

    for tree_edge in edges {
        let Ok(handle) = tree.add_edge(tree_edge.node, tree_edge.next_hop) else {
            continue;
        };
        if let Some(original) = source.edge_between(tree_edge.node, tree_edge.next_hop) {
            let original = source.edge(original);
            let copy = tree.edge_mut(handle);
            copy.speed = original.speed.clone();
            copy.attributes = original.attributes.clone();
        }
        tree.set_edge_cost(handle, tree_edge.cost);
    }

    tree
}
