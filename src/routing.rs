//! Shortest-path primitives over link cost.
//!
//! Links without an assigned cost count as one hop, so an un-costed graph is
//! routed by hop count.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::Serialize;

use crate::graph::{Edge, Graph, NodeHandle};

/// Metric used for a link
pub fn link_cost(edge: &Edge) -> u64 {
    edge.cost().map(u64::from).unwrap_or(1)
}

/// Single-source shortest-path distances
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distances {
    source: NodeHandle,
    dist: Vec<Option<u64>>,
}

impl Distances {
    pub fn source(&self) -> NodeHandle {
        self.source
    }

    /// Distance to `node`, `None` if unreachable.
    pub fn get(&self, node: NodeHandle) -> Option<u64> {
        self.dist.get(node.index()).copied().flatten()
    }

    pub fn is_reachable(&self, node: NodeHandle) -> bool {
        self.get(node).is_some()
    }

    pub fn all_reachable(&self) -> bool {
        self.dist.iter().all(Option::is_some)
    }

    pub fn unreachable(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.dist
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_none())
            .map(|(i, _)| NodeHandle(i))
    }

    /// Reachable nodes sorted by ascending distance; ties keep handle order.
    pub fn order_by_distance(&self) -> Vec<NodeHandle> {
        let mut order: Vec<(u64, NodeHandle)> = self
            .dist
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|d| (d, NodeHandle(i))))
            .collect();
        order.sort();
        order.into_iter().map(|(_, n)| n).collect()
    }
}

/// Run Dijkstra from `source`, optionally stopping once `target` is settled.
///
/// Returns distances and the predecessor of every settled node. Ties are
/// settled in handle order, and a predecessor is only replaced by a strictly
/// shorter path, so the result is deterministic for a given graph.
fn dijkstra(
    graph: &Graph,
    source: NodeHandle,
    target: Option<NodeHandle>,
) -> (Vec<Option<u64>>, Vec<Option<NodeHandle>>) {
    let n = graph.node_count();
    let mut dist: Vec<Option<u64>> = vec![None; n];
    let mut prev: Vec<Option<NodeHandle>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();

    dist[source.index()] = Some(0);
    heap.push(Reverse((0u64, source)));

    while let Some(Reverse((d, node))) = heap.pop() {
        if settled[node.index()] {
            continue;
        }
        settled[node.index()] = true;

        if Some(node) == target {
            break;
        }

        for (neighbor, edge) in graph.neighbors(node) {
            if settled[neighbor.index()] {
                continue;
            }
            let candidate = d + link_cost(graph.edge(edge));
            let better = match dist[neighbor.index()] {
                Some(current) => candidate < current,
                None => true,
            };
            if better {
                dist[neighbor.index()] = Some(candidate);
                prev[neighbor.index()] = Some(node);
                heap.push(Reverse((candidate, neighbor)));
            }
        }
    }

    (dist, prev)
}

/// Shortest-path distances from `source` to every node.
pub fn distances(graph: &Graph, source: NodeHandle) -> Distances {
    let (dist, _) = dijkstra(graph, source, None);
    Distances { source, dist }
}

/// True if every node is reachable from every other node.
pub fn is_connected(graph: &Graph) -> bool {
    match graph.node_handles().next() {
        None => true,
        Some(first) => distances(graph, first).all_reachable(),
    }
}

/// One shortest path from `source` to `target`, inclusive of both ends.
pub fn shortest_path(graph: &Graph, source: NodeHandle, target: NodeHandle) -> Option<Vec<NodeHandle>> {
    if !graph.contains(source) || !graph.contains(target) {
        return None;
    }

    let (dist, prev) = dijkstra(graph, source, Some(target));
    dist[target.index()]?;

    let mut path = vec![target];
    let mut current = target;
    while current != source {
        current = prev[current.index()]?;
        path.push(current);
    }
    path.reverse();
    Some(path)
}

/// Total cost of a path.
pub fn path_cost(graph: &Graph, path: &[NodeHandle]) -> Option<u64> {
    path.windows(2)
        .map(|hop| graph.edge_between(hop[0], hop[1]).map(|e| link_cost(graph.edge(e))))
        .sum()
}

/// Successors of `node` on some shortest path towards the source of
/// `to_target`, in neighbour insertion order.
pub fn shortest_path_successors<'a>(
    graph: &'a Graph,
    node: NodeHandle,
    to_target: &'a Distances,
) -> impl Iterator<Item = NodeHandle> + 'a {
    let here = to_target.get(node);
    graph.neighbors(node).filter_map(move |(neighbor, edge)| {
        let here = here?;
        let there = to_target.get(neighbor)?;
        (there + link_cost(graph.edge(edge)) == here).then_some(neighbor)
    })
}

/// Every shortest path from `source` to `target`.
///
/// The number of paths can grow exponentially with the graph; this is meant
/// for inspection and small topologies.
pub fn all_shortest_paths(graph: &Graph, source: NodeHandle, target: NodeHandle) -> Vec<Vec<NodeHandle>> {
    if !graph.contains(source) || !graph.contains(target) {
        return Vec::new();
    }

    let to_target = distances(graph, target);
    if !to_target.is_reachable(source) {
        return Vec::new();
    }

    let mut paths = Vec::new();
    let mut stack = vec![source];
    collect_paths(graph, target, &to_target, &mut stack, &mut paths);
    paths
}

fn collect_paths(
    graph: &Graph,
    target: NodeHandle,
    to_target: &Distances,
    stack: &mut Vec<NodeHandle>,
    paths: &mut Vec<Vec<NodeHandle>>,
) {
    let Some(&node) = stack.last() else {
        return;
    };
    if node == target {
        paths.push(stack.clone());
        return;
    }

    let next: Vec<NodeHandle> = shortest_path_successors(graph, node, to_target).collect();
    for neighbor in next {
        stack.push(neighbor);
        collect_paths(graph, target, to_target, stack, paths);
        stack.pop();
    }
}
