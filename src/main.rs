use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use stpflow::config::{AnalysisConfig, ReportFormat};
use stpflow::config_loader::{self, CliOverrides};
use stpflow::dot_parser::load_topology;
use stpflow::graph::IdentityScheme;
use stpflow::orchestrator;
use stpflow::report;
use stpflow::stp::{build_spanning_tree, DistanceCache};

/// Spanning tree and traffic analysis for switched network topologies
#[derive(Parser, Debug)]
#[command(name = "stpflow", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Route demands over a topology and write traffic reports
    Analyze {
        /// DOT topology file (overrides the config file)
        #[arg(short, long)]
        topology: Option<PathBuf>,

        /// CSV demand list with Source, Target and Flow columns
        #[arg(short, long)]
        demands: Option<PathBuf>,

        /// Route over the spanning tree instead of the full topology
        #[arg(long)]
        stp: bool,

        /// How node IDs are derived from labels (label-codes, hashed)
        #[arg(long)]
        identity: Option<IdentityScheme>,

        /// Analysis configuration YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for reports
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report formats to write (json, text, dot)
        #[arg(long, value_delimiter = ',')]
        format: Option<Vec<ReportFormat>>,
    },

    /// Print the spanning tree of a topology
    Tree {
        /// DOT topology file
        #[arg(short, long)]
        topology: PathBuf,

        /// How node IDs are derived from labels (label-codes, hashed)
        #[arg(long, default_value = "label-codes")]
        identity: IdentityScheme,

        /// Also write the topology with the tree highlighted as DOT
        #[arg(long)]
        dot: Option<PathBuf>,
    },

    /// Check that a topology can be analyzed
    Validate {
        /// DOT topology file
        #[arg(short, long)]
        topology: PathBuf,

        /// How node IDs are derived from labels (label-codes, hashed)
        #[arg(long, default_value = "label-codes")]
        identity: IdentityScheme,
    },
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_level.as_str())).init();

    match cli.command {
        Commands::Analyze {
            topology,
            demands,
            stp,
            identity,
            config,
            output,
            format,
        } => {
            let mut analysis = match &config {
                Some(path) => config_loader::load_config(path)?,
                None => AnalysisConfig::default(),
            };

            let overrides = CliOverrides {
                topology,
                demands_file: demands,
                spanning_tree: stp,
                identity,
                output_directory: output,
                formats: format,
            };
            config_loader::apply_overrides(&mut analysis, &overrides)?;

            let run = orchestrator::run_analysis(&analysis)?;

            let written = orchestrator::write_reports(&run, &analysis)?;
            for path in &written {
                info!("Wrote {}", path.display());
            }

            // Link table on stdout, one line per link that carried traffic
            for link in &run.report.links {
                println!("{},{},{},{}", link.source, link.target, link.forward, link.backward);
            }
        }

        Commands::Tree {
            topology,
            identity,
            dot,
        } => {
            let mut graph = load_topology(&topology)?;
            stpflow::attributes::assign_stp_attributes(&mut graph, identity);

            let tree = build_spanning_tree(&graph, &mut DistanceCache::new())
                .wrap_err_with(|| format!("No spanning tree for '{}'", topology.display()))?;

            println!("root {}", graph.label(tree.root()));
            for link in report::tree_links(&tree) {
                println!("{} -> {} (cost {})", link.node, link.next_hop, link.cost);
            }

            if let Some(path) = dot {
                report::write_dot(&graph, Some(&tree), &path)?;
            }
        }

        Commands::Validate { topology, identity } => {
            let mut graph = load_topology(&topology)?;
            let check = orchestrator::validate_topology(&mut graph, identity);

            println!("nodes: {}", check.nodes);
            println!("links: {}", check.links);
            println!("connected: {}", check.connected);
            if let Some(root) = &check.root {
                println!("root: {}", root);
            }
            for warning in &check.warnings {
                println!("warning: {}", warning);
            }

            if let Some(e) = check.tree_error {
                bail!("Topology '{}' is not usable: {}", topology.display(), e);
            }
            info!("Topology '{}' is valid", topology.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_args() {
        let cli = Cli::parse_from([
            "stpflow",
            "analyze",
            "--topology",
            "lab.dot",
            "--demands",
            "demands.csv",
            "--stp",
            "--identity",
            "hashed",
            "--format",
            "json,dot",
        ]);

        match cli.command {
            Commands::Analyze {
                topology,
                demands,
                stp,
                identity,
                config,
                output,
                format,
            } => {
                assert_eq!(topology, Some(PathBuf::from("lab.dot")));
                assert_eq!(demands, Some(PathBuf::from("demands.csv")));
                assert!(stp);
                assert_eq!(identity, Some(IdentityScheme::Hashed));
                assert_eq!(config, None);
                assert_eq!(output, None);
                assert_eq!(format, Some(vec![ReportFormat::Json, ReportFormat::Dot]));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_tree_args() {
        let cli = Cli::parse_from(["stpflow", "--log-level", "debug", "tree", "-t", "lab.dot"]);

        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Tree {
                topology,
                identity,
                dot,
            } => {
                assert_eq!(topology, PathBuf::from("lab.dot"));
                assert_eq!(identity, IdentityScheme::LabelCodes);
                assert_eq!(dot, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_identity() {
        let result = Cli::try_parse_from(["stpflow", "validate", "-t", "lab.dot", "--identity", "md5"]);
        assert!(result.is_err());
    }
}
