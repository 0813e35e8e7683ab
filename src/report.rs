//! Report generation for traffic analysis.
//!
//! Generates JSON, human-readable text and Graphviz reports.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use crate::attributes::AttributeError;
use crate::demands::DemandParseError;
use crate::graph::{Graph, IdentityScheme};
use crate::stp::SpanningTree;
use crate::traffic::DemandOutcome;

/// Run-level facts
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub analysis_timestamp: String,
    pub topology: String,
    pub identity_scheme: IdentityScheme,
    pub spanning_tree: bool,
    pub root: Option<String>,
    pub total_nodes: usize,
    pub total_links: usize,
    pub total_demands: usize,
    pub routed_demands: usize,
}

/// Traffic on one link, oriented along its canonical direction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkTraffic {
    pub source: String,
    pub target: String,
    pub forward: f64,
    pub backward: f64,
    pub bandwidth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTraffic {
    pub node: String,
    pub tx: f64,
    pub rx: f64,
}

/// A spanning tree link, by label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeLink {
    pub node: String,
    pub next_hop: String,
    pub cost: u32,
}

/// Complete analysis report
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    /// Links that carried traffic
    pub links: Vec<LinkTraffic>,
    /// Nodes that sent or received traffic
    pub nodes: Vec<NodeTraffic>,
    pub tree: Vec<TreeLink>,
    pub demands: Vec<DemandOutcome>,
    pub attribute_warnings: Vec<AttributeError>,
    pub skipped_rows: Vec<DemandParseError>,
}

/// Links with non-zero forward or backward traffic, in link creation order.
pub fn link_traffic(graph: &Graph) -> Vec<LinkTraffic> {
    graph
        .edges()
        .filter(|(_, e)| e.forward() != 0.0 || e.backward() != 0.0)
        .map(|(_, e)| {
            let (u, v) = e.endpoints();
            LinkTraffic {
                source: graph.label(u).to_string(),
                target: graph.label(v).to_string(),
                forward: e.forward(),
                backward: e.backward(),
                bandwidth: e.bandwidth(),
            }
        })
        .collect()
}

/// Nodes with non-zero tx or rx, in node creation order.
pub fn node_traffic(graph: &Graph) -> Vec<NodeTraffic> {
    graph
        .nodes()
        .filter(|(_, n)| n.tx() != 0.0 || n.rx() != 0.0)
        .map(|(_, n)| NodeTraffic {
            node: n.label.clone(),
            tx: n.tx(),
            rx: n.rx(),
        })
        .collect()
}

pub fn tree_links(tree: &SpanningTree) -> Vec<TreeLink> {
    let graph = tree.graph();
    tree.edges()
        .iter()
        .map(|e| TreeLink {
            node: graph.label(e.node).to_string(),
            next_hop: graph.label(e.next_hop).to_string(),
            cost: e.cost,
        })
        .collect()
}

/// Generate JSON report
pub fn write_json_report(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.push("=".repeat(80));
    lines.push(format!("{:^80}", title));
    lines.push("=".repeat(80));
    lines.push(String::new());
}

/// Render the human-readable text report
pub fn render_text_report(report: &AnalysisReport) -> String {
    let mut lines: Vec<String> = Vec::new();
    let meta = &report.metadata;

    section(&mut lines, "STPFLOW TRAFFIC ANALYSIS");

    lines.push(format!("Analysis Date: {}", meta.analysis_timestamp));
    lines.push(format!("Topology: {}", meta.topology));
    lines.push(format!("Nodes: {}", meta.total_nodes));
    lines.push(format!("Links: {}", meta.total_links));
    lines.push(format!("Identity Scheme: {}", meta.identity_scheme));
    match &meta.root {
        Some(root) if meta.spanning_tree => lines.push(format!("Spanning Tree: yes (root {})", root)),
        _ => lines.push("Spanning Tree: no".to_string()),
    }
    lines.push(format!(
        "Demands: {} routed of {}",
        meta.routed_demands, meta.total_demands
    ));
    lines.push(String::new());

    if !report.tree.is_empty() {
        section(&mut lines, "SPANNING TREE");
        lines.push(format!("{:<24} {:<24} {:>8}", "Node", "Root Port To", "Cost"));
        lines.push("-".repeat(58));
        for link in &report.tree {
            lines.push(format!("{:<24} {:<24} {:>8}", link.node, link.next_hop, link.cost));
        }
        lines.push(String::new());
    }

    section(&mut lines, "LINK TRAFFIC");
    if report.links.is_empty() {
        lines.push("No link carried traffic.".to_string());
    } else {
        lines.push(format!(
            "{:<20} {:<20} {:>12} {:>12} {:>12}",
            "Source", "Target", "Forward", "Backward", "Bandwidth"
        ));
        lines.push("-".repeat(80));
        for link in &report.links {
            lines.push(format!(
                "{:<20} {:<20} {:>12} {:>12} {:>12}",
                link.source, link.target, link.forward, link.backward, link.bandwidth
            ));
        }
    }
    lines.push(String::new());

    section(&mut lines, "NODE TRAFFIC");
    if report.nodes.is_empty() {
        lines.push("No node sent or received traffic.".to_string());
    } else {
        lines.push(format!("{:<24} {:>12} {:>12}", "Node", "Tx", "Rx"));
        lines.push("-".repeat(50));
        for node in &report.nodes {
            lines.push(format!("{:<24} {:>12} {:>12}", node.node, node.tx, node.rx));
        }
    }
    lines.push(String::new());

    let failed: Vec<&DemandOutcome> = report.demands.iter().filter(|o| !o.is_routed()).collect();
    let has_warnings =
        !failed.is_empty() || !report.attribute_warnings.is_empty() || !report.skipped_rows.is_empty();

    if has_warnings {
        section(&mut lines, "WARNINGS");
        for outcome in failed {
            if let Err(e) = &outcome.result {
                lines.push(format!("  demand #{}: {}", outcome.index + 1, e));
            }
        }
        for warning in &report.attribute_warnings {
            lines.push(format!("  {}", warning));
        }
        for row in &report.skipped_rows {
            lines.push(format!("  skipped row: {}", row));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Generate human-readable text report
pub fn write_text_report(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_text_report(report))
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Quote a DOT ID. Backslash sequences such as `\n` are kept for Graphviz.
fn quote(label: &str) -> String {
    format!("\"{}\"", label.replace('"', "\\\""))
}

/// Render the topology as DOT.
///
/// With a tree, its links are drawn bold and the blocked ones dashed, and
/// traffic is read from the tree graph, whose handles match the topology's.
pub fn render_dot(topology: &Graph, tree: Option<&SpanningTree>) -> String {
    let active = tree.map(|t| t.graph()).unwrap_or(topology);

    let mut dot = String::new();
    dot.push_str("graph Topology {\n");
    dot.push_str("    node [shape=box];\n");
    if let Some(tree) = tree {
        dot.push_str(&format!(
            "    label={};\n",
            quote(&format!("Spanning tree rooted at {}", topology.label(tree.root())))
        ));
        dot.push_str("    labelloc=t;\n");
    }
    dot.push('\n');

    for (handle, node) in topology.nodes() {
        let traffic = active.node(handle);
        let mut attrs = vec![format!(
            "label={}",
            quote(&format!("{}\\ntx {} / rx {}", node.label, traffic.tx(), traffic.rx()))
        )];
        if let Some(id) = &node.id {
            attrs.push(format!("ID={}", quote(&id.to_string())));
        }
        if tree.is_some_and(|t| t.root() == handle) {
            attrs.push("style=filled, fillcolor=gold".to_string());
        }
        dot.push_str(&format!("    {} [{}];\n", quote(&node.label), attrs.join(", ")));
    }

    dot.push('\n');

    for (_, edge) in topology.edges() {
        let (u, v) = edge.endpoints();
        let carried = active.edge_between(u, v).map(|h| active.edge(h));

        let mut attrs = Vec::new();
        if let Some(speed) = &edge.speed {
            attrs.push(format!("speed={}", quote(speed)));
        }
        match (tree, carried) {
            (Some(_), None) => attrs.push("style=dashed, color=gray".to_string()),
            (Some(_), Some(_)) => attrs.push("penwidth=3, color=blue".to_string()),
            _ => {}
        }
        if let Some(carried) = carried.filter(|e| e.forward() != 0.0 || e.backward() != 0.0) {
            attrs.push(format!(
                "label={}",
                quote(&format!("fw {} / bk {}", carried.forward(), carried.backward()))
            ));
        }

        let attr_list = if attrs.is_empty() {
            String::new()
        } else {
            format!(" [{}]", attrs.join(", "))
        };
        dot.push_str(&format!(
            "    {} -- {}{};\n",
            quote(topology.label(u)),
            quote(topology.label(v)),
            attr_list
        ));
    }

    dot.push_str("}\n");
    dot
}

pub fn write_dot(topology: &Graph, tree: Option<&SpanningTree>, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_dot(topology, tree))
        .with_context(|| format!("Failed to write DOT output to {}", output_path.display()))?;

    log::info!("DOT output written to {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{assign_flow_attributes, assign_stp_attributes};
    use crate::dot_parser::parse_dot_str;
    use crate::stp::get_spanning_tree;
    use crate::traffic::{accumulate, Demand};

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            analysis_timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            topology: "line.dot".to_string(),
            identity_scheme: IdentityScheme::LabelCodes,
            spanning_tree: false,
            root: None,
            total_nodes: 3,
            total_links: 2,
            total_demands: 1,
            routed_demands: 1,
        }
    }

    fn loaded_line() -> Graph {
        let mut graph = Graph::new();
        graph.connect("a", "b").unwrap();
        graph.connect("b", "c").unwrap();
        graph.connect("c", "d").unwrap();
        assign_stp_attributes(&mut graph, IdentityScheme::LabelCodes);
        assign_flow_attributes(&mut graph);
        accumulate(&mut graph, &Demand::new("c", "a", 3.0)).unwrap();
        graph
    }

    #[test]
    fn test_traffic_rows_skip_idle_elements() {
        let graph = loaded_line();

        let links = link_traffic(&graph);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].source, "a");
        assert_eq!(links[0].target, "b");
        assert_eq!(links[0].forward, 0.0);
        assert_eq!(links[0].backward, 3.0);
        assert_eq!(links[0].bandwidth, 3.0);

        let nodes = node_traffic(&graph);
        let names: Vec<&str> = nodes.iter().map(|n| n.node.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(nodes[1].tx, 3.0);
        assert_eq!(nodes[1].rx, 3.0);
    }

    #[test]
    fn test_text_report_sections() {
        let graph = loaded_line();
        let report = AnalysisReport {
            metadata: metadata(),
            links: link_traffic(&graph),
            nodes: node_traffic(&graph),
            tree: Vec::new(),
            demands: Vec::new(),
            attribute_warnings: Vec::new(),
            skipped_rows: vec![DemandParseError::InvalidFlow {
                line: 4,
                value: "x".to_string(),
            }],
        };

        let text = render_text_report(&report);
        assert!(text.contains("STPFLOW TRAFFIC ANALYSIS"));
        assert!(text.contains("LINK TRAFFIC"));
        assert!(text.contains("Spanning Tree: no"));
        assert!(text.contains("skipped row: line 4: invalid flow 'x'"));
        assert!(!text.contains("Root Port To"));
    }

    #[test]
    fn test_json_report_roundtrips_through_serde_json() {
        let graph = loaded_line();
        let report = AnalysisReport {
            metadata: metadata(),
            links: link_traffic(&graph),
            nodes: node_traffic(&graph),
            tree: Vec::new(),
            demands: Vec::new(),
            attribute_warnings: Vec::new(),
            skipped_rows: Vec::new(),
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json_report(&report, &path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["identity_scheme"], "label-codes");
        assert_eq!(value["links"][1]["source"], "b");
        assert_eq!(value["links"][1]["backward"], 3.0);
    }

    #[test]
    fn test_render_dot_highlights_tree() {
        let mut graph = parse_dot_str("graph { a -- b; b -- c; c -- a }")
            .unwrap()
            .into_graph();
        assign_stp_attributes(&mut graph, IdentityScheme::LabelCodes);
        let tree = get_spanning_tree(&graph).unwrap();

        let dot = render_dot(&graph, Some(&tree));
        assert!(dot.contains("Spanning tree rooted at a"));
        assert_eq!(dot.matches("penwidth=3").count(), 2);
        assert_eq!(dot.matches("style=dashed").count(), 1);
        assert!(dot.contains("\"a\" [label=\"a\\ntx 0 / rx 0\", ID=\"97\", style=filled, fillcolor=gold];"));

        // The output reads back as a topology
        let reparsed = parse_dot_str(&dot).unwrap();
        assert_eq!(reparsed.nodes.len(), 3);
        assert_eq!(reparsed.edges.len(), 3);
    }
}
