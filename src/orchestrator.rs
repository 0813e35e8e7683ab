//! Analysis orchestrator.
//!
//! Coordinates a run from configuration through topology loading, attribute
//! assignment and the optional spanning tree to traffic accumulation and
//! report output.

use crate::attributes::{assign_flow_attributes, assign_stp_attributes, AttributeError};
use crate::config::{AnalysisConfig, ReportFormat};
use crate::demands::{load_demands, DemandList};
use crate::dot_parser::load_topology;
use crate::graph::{Graph, IdentityScheme};
use crate::report::{self, AnalysisReport, ReportMetadata};
use crate::routing;
use crate::stp::{build_spanning_tree, select_root, DistanceCache, SpanningTree, StpError};
use crate::traffic::accumulate_all;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

/// Knobs of a single analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub spanning_tree: bool,
    pub identity: IdentityScheme,
}

impl From<&AnalysisConfig> for AnalysisOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            spanning_tree: config.spanning_tree,
            identity: config.identity,
        }
    }
}

/// Everything an analysis produced
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    /// Input topology with identities and costs assigned
    pub topology: Graph,
    pub tree: Option<SpanningTree>,
    pub report: AnalysisReport,
}

impl AnalysisRun {
    /// Graph the demands were routed over
    pub fn active_graph(&self) -> &Graph {
        self.tree.as_ref().map(|t| t.graph()).unwrap_or(&self.topology)
    }
}

/// Run an analysis over an in-memory topology.
///
/// With `spanning_tree` set the demands are routed over the tree graph and
/// the topology's own counters stay at zero.
pub fn analyze(
    mut topology: Graph,
    topology_name: &str,
    demands: &DemandList,
    options: &AnalysisOptions,
) -> Result<AnalysisRun, StpError> {
    let attributes = assign_stp_attributes(&mut topology, options.identity);

    let mut tree = if options.spanning_tree {
        let mut cache = DistanceCache::new();
        Some(build_spanning_tree(&topology, &mut cache)?)
    } else {
        None
    };

    let active = match tree.as_mut() {
        Some(tree) => tree.graph_mut(),
        None => &mut topology,
    };
    assign_flow_attributes(active);
    let outcomes = accumulate_all(active, &demands.demands);

    let active: &Graph = tree.as_ref().map(|t| t.graph()).unwrap_or(&topology);
    let metadata = ReportMetadata {
        analysis_timestamp: chrono::Utc::now().to_rfc3339(),
        topology: topology_name.to_string(),
        identity_scheme: options.identity,
        spanning_tree: options.spanning_tree,
        root: tree.as_ref().map(|t| topology.label(t.root()).to_string()),
        total_nodes: topology.node_count(),
        total_links: topology.edge_count(),
        total_demands: outcomes.len(),
        routed_demands: outcomes.iter().filter(|o| o.is_routed()).count(),
    };

    let report = AnalysisReport {
        metadata,
        links: report::link_traffic(active),
        nodes: report::node_traffic(active),
        tree: tree.as_ref().map(report::tree_links).unwrap_or_default(),
        demands: outcomes,
        attribute_warnings: attributes.warnings,
        skipped_rows: demands.skipped.clone(),
    };

    Ok(AnalysisRun {
        topology,
        tree,
        report,
    })
}

/// Load the inputs named by `config` and analyze them
pub fn run_analysis(config: &AnalysisConfig) -> Result<AnalysisRun> {
    config.validate()?;

    let topology_path = config
        .topology
        .as_ref()
        .ok_or_else(|| eyre!("No topology file configured"))?;
    let topology = load_topology(topology_path)?;
    info!(
        "Loaded topology '{}' with {} nodes and {} links",
        topology_path.display(),
        topology.node_count(),
        topology.edge_count()
    );

    let demands = match &config.demands_file {
        Some(path) => load_demands(path)?,
        None => DemandList {
            demands: config.demands.clone(),
            skipped: Vec::new(),
        },
    };
    if demands.demands.is_empty() {
        warn!("No demands to route; traffic counters will stay at zero");
    }

    let run = analyze(
        topology,
        &topology_path.display().to_string(),
        &demands,
        &AnalysisOptions::from(config),
    )
    .wrap_err("Spanning tree construction failed")?;

    let meta = &run.report.metadata;
    info!(
        "Routed {} of {} demands over {} links",
        meta.routed_demands,
        meta.total_demands,
        run.active_graph().edge_count()
    );

    Ok(run)
}

/// Write the configured report formats, returning the files written
pub fn write_reports(run: &AnalysisRun, config: &AnalysisConfig) -> Result<Vec<PathBuf>> {
    let directory = &config.output.directory;
    fs::create_dir_all(directory)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", directory.display()))?;

    let mut written = Vec::new();
    for format in &config.output.formats {
        let path = match format {
            ReportFormat::Json => directory.join("analysis_report.json"),
            ReportFormat::Text => directory.join("analysis_report.txt"),
            ReportFormat::Dot => directory.join(format!("topology.{}", format.extension())),
        };

        match format {
            ReportFormat::Json => report::write_json_report(&run.report, &path)?,
            ReportFormat::Text => report::write_text_report(&run.report, &path)?,
            ReportFormat::Dot => report::write_dot(&run.topology, run.tree.as_ref(), &path)?,
        }
        written.push(path);
    }

    Ok(written)
}

/// Result of checking a topology without routing anything
#[derive(Debug, Clone)]
pub struct TopologyCheck {
    pub nodes: usize,
    pub links: usize,
    pub connected: bool,
    /// Label of the bridge that would be elected root
    pub root: Option<String>,
    pub warnings: Vec<AttributeError>,
    /// Why no tree can be built, if it cannot
    pub tree_error: Option<StpError>,
}

impl TopologyCheck {
    pub fn is_valid(&self) -> bool {
        self.tree_error.is_none()
    }
}

/// Assign attributes and check whether a spanning tree can be built.
pub fn validate_topology(graph: &mut Graph, identity: IdentityScheme) -> TopologyCheck {
    let attributes = assign_stp_attributes(graph, identity);
    let root = select_root(graph).ok().map(|r| graph.label(r).to_string());
    let tree_error = build_spanning_tree(graph, &mut DistanceCache::new()).err();

    TopologyCheck {
        nodes: graph.node_count(),
        links: graph.edge_count(),
        connected: routing::is_connected(graph),
        root,
        warnings: attributes.warnings,
        tree_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot_parser::parse_dot_str;
    use crate::traffic::Demand;

    fn ring() -> Graph {
        parse_dot_str("graph { A -- B -- C -- D -- A }").unwrap().into_graph()
    }

    fn demands(list: Vec<Demand>) -> DemandList {
        DemandList {
            demands: list,
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_analyze_over_topology() {
        let run = analyze(
            ring(),
            "ring.dot",
            &demands(vec![Demand::new("A", "C", 4.0)]),
            &AnalysisOptions::default(),
        )
        .unwrap();

        assert!(run.tree.is_none());
        assert_eq!(run.report.metadata.routed_demands, 1);
        assert_eq!(run.report.metadata.root, None);
        // Equal-cost ring: one path of two links carries the demand
        assert_eq!(run.report.links.len(), 2);
        assert!(run.report.tree.is_empty());
    }

    #[test]
    fn test_analyze_over_tree_leaves_topology_idle() {
        let options = AnalysisOptions {
            spanning_tree: true,
            identity: IdentityScheme::LabelCodes,
        };
        let run = analyze(ring(), "ring.dot", &demands(vec![Demand::new("B", "D", 1.0)]), &options).unwrap();

        let tree = run.tree.as_ref().unwrap();
        assert_eq!(run.report.metadata.root.as_deref(), Some("A"));
        assert_eq!(tree.edges().len(), 3);
        assert_eq!(run.report.tree.len(), 3);
        // B and D both hang off A, so the demand crosses the root
        assert_eq!(run.report.links.len(), 2);
        assert!(run.topology.edges().all(|(_, e)| e.forward() == 0.0 && e.backward() == 0.0));
        assert_eq!(run.active_graph().edge_count(), 3);
    }

    #[test]
    fn test_analyze_fails_on_disconnected_tree() {
        let graph = parse_dot_str("graph { A -- B; C -- D }").unwrap().into_graph();
        let options = AnalysisOptions {
            spanning_tree: true,
            ..Default::default()
        };

        let result = analyze(graph, "split.dot", &demands(Vec::new()), &options);
        assert!(matches!(result, Err(StpError::GraphNotConnected { .. })));
    }

    #[test]
    fn test_validate_topology() {
        let mut graph = ring();
        let check = validate_topology(&mut graph, IdentityScheme::LabelCodes);
        assert!(check.is_valid());
        assert!(check.connected);
        assert_eq!(check.root.as_deref(), Some("A"));
        assert_eq!((check.nodes, check.links), (4, 4));

        let mut split = parse_dot_str("graph { A -- B; C }").unwrap().into_graph();
        let check = validate_topology(&mut split, IdentityScheme::LabelCodes);
        assert!(!check.connected);
        assert!(!check.is_valid());
    }

    #[test]
    fn test_run_analysis_writes_reports() {
        let dir = tempfile::tempdir().unwrap();
        let topology = dir.path().join("ring.dot");
        fs::write(&topology, "graph { A -- B -- C -- D -- A }").unwrap();

        let mut config = AnalysisConfig {
            topology: Some(topology),
            demands: vec![Demand::new("A", "B", 2.0), Demand::new("A", "Z", 1.0)],
            spanning_tree: true,
            ..Default::default()
        };
        config.output.directory = dir.path().join("out");
        config.output.formats = vec![ReportFormat::Json, ReportFormat::Text, ReportFormat::Dot];

        let run = run_analysis(&config).unwrap();
        assert_eq!(run.report.metadata.total_demands, 2);
        assert_eq!(run.report.metadata.routed_demands, 1);

        let written = write_reports(&run, &config).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));
        assert!(written[2].ends_with("topology.dot"));
    }
}
