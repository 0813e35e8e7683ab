//! Attribute assignment.
//!
//! Turns the optional `ID` and `speed` attributes of a parsed topology into
//! node identities and link costs, and zeroes traffic counters before an
//! analysis run.

use log::{debug, info, warn};
use serde::Serialize;

use crate::graph::{Graph, IdentityScheme, NodeId};

/// Link speed to cost table used by 802.1D path costs
pub const SPEED_TO_COST: [(&str, u32); 5] = [
    ("10", 100),
    ("100", 19),
    ("1000", 4),
    ("10000", 2),
    ("100000", 1),
];

/// Speed assumed for links without a `speed` attribute
pub const DEFAULT_SPEED: &str = "100";

/// Cost of a link running at [`DEFAULT_SPEED`]
pub const DEFAULT_COST: u32 = 19;

/// Recoverable per-item failures during attribute assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum AttributeError {
    #[error("Unknown speed '{speed}' on link {link}; using default cost {}", DEFAULT_COST)]
    UnknownSpeedKind { link: String, speed: String },

    #[error("Node '{node}' has non-integer ID '{value}'; synthesizing from label")]
    InvalidIdentity { node: String, value: String },

    #[error("Cannot derive an identity for node '{node}'")]
    IdentityUnavailable { node: String },
}

/// Outcome of [`assign_stp_attributes`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttributeReport {
    pub nodes_tagged: usize,
    pub edges_costed: usize,
    pub warnings: Vec<AttributeError>,
}

impl AttributeReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Look up the cost of a link speed.
///
/// # Examples
/// ```
/// use stpflow::attributes::cost_for_speed;
///
/// assert_eq!(cost_for_speed("1000"), Ok(4));
/// assert!(cost_for_speed("25000").is_err());
/// ```
pub fn cost_for_speed(speed: &str) -> Result<u32, AttributeError> {
    SPEED_TO_COST
        .iter()
        .find(|(key, _)| *key == speed)
        .map(|(_, cost)| *cost)
        .ok_or_else(|| AttributeError::UnknownSpeedKind {
            link: String::new(),
            speed: speed.to_string(),
        })
}

/// Identity of a node: the supplied `ID` when it parses, otherwise one
/// derived from the label.
fn resolve_identity(
    label: &str,
    raw_id: Option<&str>,
    scheme: IdentityScheme,
    warnings: &mut Vec<AttributeError>,
) -> Option<NodeId> {
    if let Some(raw) = raw_id {
        match raw.parse::<NodeId>() {
            Ok(id) => return Some(id),
            Err(_) => {
                let warning = AttributeError::InvalidIdentity {
                    node: label.to_string(),
                    value: raw.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    match scheme.derive(label) {
        Ok(id) => Some(id),
        Err(_) => {
            let warning = AttributeError::IdentityUnavailable {
                node: label.to_string(),
            };
            warn!("{}", warning);
            warnings.push(warning);
            None
        }
    }
}

/// Assign an identity to every node and a cost to every edge.
///
/// Topology is not altered. Running this twice yields the same identities
/// and costs. Unknown link speeds fall back to [`DEFAULT_COST`] and are
/// reported in the returned warnings.
pub fn assign_stp_attributes(graph: &mut Graph, scheme: IdentityScheme) -> AttributeReport {
    let mut report = AttributeReport::default();

    let handles: Vec<_> = graph.node_handles().collect();
    for handle in handles {
        let node = graph.node(handle);
        let resolved = resolve_identity(&node.label, node.raw_id.as_deref(), scheme, &mut report.warnings);
        if let Some(id) = resolved {
            debug!("Node '{}' -> ID {}", graph.label(handle), id);
            graph.set_node_id(handle, id);
            report.nodes_tagged += 1;
        }
    }

    let edge_handles: Vec<_> = graph.edges().map(|(h, _)| h).collect();
    for handle in edge_handles {
        let edge = graph.edge(handle);
        let speed = edge.speed.as_deref().unwrap_or(DEFAULT_SPEED);
        let cost = match cost_for_speed(speed) {
            Ok(cost) => cost,
            Err(_) => {
                let warning = AttributeError::UnknownSpeedKind {
                    link: edge.canonical_direction().to_string(),
                    speed: speed.to_string(),
                };
                warn!("{}", warning);
                report.warnings.push(warning);
                DEFAULT_COST
            }
        };
        graph.set_edge_cost(handle, cost);
        report.edges_costed += 1;
    }

    info!(
        "Assigned identities to {} nodes and costs to {} links ({} warnings)",
        report.nodes_tagged,
        report.edges_costed,
        report.warnings.len()
    );

    report
}

/// Zero the traffic counters of every node and edge.
///
/// This is a reset, not a merge: existing traffic is discarded.
pub fn assign_flow_attributes(graph: &mut Graph) {
    let nodes: Vec<_> = graph.node_handles().collect();
    for handle in nodes {
        graph.node_mut(handle).reset_traffic();
    }

    let edges: Vec<_> = graph.edges().map(|(h, _)| h).collect();
    for handle in edges {
        graph.edge_mut(handle).reset_traffic();
    }
}
