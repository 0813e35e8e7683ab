//! Traffic accumulation.
//!
//! Each demand is routed along one shortest path and its volume is added to
//! every link on the way (in the counter matching the direction of travel)
//! and to the nodes it crosses. The source only transmits, the target only
//! receives, and every node in between both receives and re-transmits.

use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::graph::{Graph, NodeHandle};
use crate::routing;

/// A traffic request between two nodes, referenced by label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    #[serde(alias = "Source")]
    pub source: String,
    #[serde(alias = "Target")]
    pub target: String,
    #[serde(alias = "Flow", alias = "flow")]
    pub amount: f64,
}

impl Demand {
    pub fn new(source: impl Into<String>, target: impl Into<String>, amount: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            amount,
        }
    }
}

impl fmt::Display for Demand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.source, self.target, self.amount)
    }
}

/// Why a demand was rejected before routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DemandProblem {
    UnknownSource,
    UnknownTarget,
    SameEndpoints,
    NonPositiveAmount,
}

impl fmt::Display for DemandProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemandProblem::UnknownSource => write!(f, "unknown source node"),
            DemandProblem::UnknownTarget => write!(f, "unknown target node"),
            DemandProblem::SameEndpoints => write!(f, "source and target are the same node"),
            DemandProblem::NonPositiveAmount => write!(f, "amount must be a positive number"),
        }
    }
}

/// Per-demand failures; the rest of a batch is still processed
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum TrafficError {
    #[error("Invalid demand {from} -> {to} ({amount}): {problem}")]
    InvalidDemand {
        from: String,
        to: String,
        amount: f64,
        problem: DemandProblem,
    },

    #[error("No route from '{from}' to '{to}'")]
    NoRouteFound { from: String, to: String },
}

/// Path a demand was routed along
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub hops: Vec<String>,
    pub cost: u64,
}

/// Status of one demand of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandOutcome {
    /// Position of the demand in the input
    pub index: usize,
    pub demand: Demand,
    pub result: Result<Route, TrafficError>,
}

impl DemandOutcome {
    pub fn is_routed(&self) -> bool {
        self.result.is_ok()
    }
}

fn reject(demand: &Demand, problem: DemandProblem) -> TrafficError {
    TrafficError::InvalidDemand {
        from: demand.source.clone(),
        to: demand.target.clone(),
        amount: demand.amount,
        problem,
    }
}

/// Resolve and check a demand without touching any counter.
fn validate(graph: &Graph, demand: &Demand) -> Result<(NodeHandle, NodeHandle), TrafficError> {
    let source = graph
        .find(&demand.source)
        .ok_or_else(|| reject(demand, DemandProblem::UnknownSource))?;
    let target = graph
        .find(&demand.target)
        .ok_or_else(|| reject(demand, DemandProblem::UnknownTarget))?;

    // NaN fails this comparison too
    if !(demand.amount > 0.0 && demand.amount.is_finite()) {
        return Err(reject(demand, DemandProblem::NonPositiveAmount));
    }
    if source == target {
        return Err(reject(demand, DemandProblem::SameEndpoints));
    }

    Ok((source, target))
}

/// Route one demand and add its volume to the counters along the path.
///
/// On error nothing is modified.
pub fn accumulate(graph: &mut Graph, demand: &Demand) -> Result<Route, TrafficError> {
    let (source, target) = validate(graph, demand)?;

    let path = routing::shortest_path(graph, source, target).ok_or_else(|| TrafficError::NoRouteFound {
        from: demand.source.clone(),
        to: demand.target.clone(),
    })?;

    add_along_path(graph, &path, demand.amount);

    let route = Route {
        hops: path.iter().map(|h| graph.label(*h).to_string()).collect(),
        cost: routing::path_cost(graph, &path).unwrap_or_default(),
    };
    debug!("Routed {} via {}", demand, route.hops.join(" - "));
    Ok(route)
}

fn add_along_path(graph: &mut Graph, path: &[NodeHandle], amount: f64) {
    for hop in path.windows(2) {
        let (x, y) = (hop[0], hop[1]);
        if let Some(handle) = graph.edge_between(x, y) {
            let edge = graph.edge_mut(handle);
            let direction = edge.direction(x, y);
            edge.record(direction, amount);
        }
    }

    let (Some(&source), Some(&target)) = (path.first(), path.last()) else {
        return;
    };
    graph.node_mut(target).rx += amount;
    graph.node_mut(source).tx += amount;

    if path.len() > 2 {
        for &transit in &path[1..path.len() - 1] {
            let node = graph.node_mut(transit);
            node.rx += amount;
            node.tx += amount;
        }
    }
}

/// Apply every demand in order, collecting per-demand outcomes.
pub fn accumulate_all(graph: &mut Graph, demands: &[Demand]) -> Vec<DemandOutcome> {
    let outcomes: Vec<DemandOutcome> = demands
        .iter()
        .enumerate()
        .map(|(index, demand)| {
            let result = accumulate(graph, demand);
            if let Err(e) = &result {
                warn!("Skipping demand #{}: {}", index + 1, e);
            }
            DemandOutcome {
                index,
                demand: demand.clone(),
                result,
            }
        })
        .collect();

    let routed = outcomes.iter().filter(|o| o.is_routed()).count();
    info!("Routed {} of {} demands", routed, outcomes.len());

    outcomes
}
