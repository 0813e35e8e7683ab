//! # stpflow - Spanning tree and traffic analysis for switched networks
//!
//! This library computes, over an undirected network topology, the spanning
//! tree a set of bridges running the Spanning Tree Protocol would converge
//! to, and the per-link and per-node traffic produced by routing a list of
//! point-to-point demands along shortest paths.
//!
//! ## Overview
//!
//! A run reads a DOT topology, gives every node an integer bridge ID and every
//! link a path cost derived from its speed, optionally reduces the topology to
//! its spanning tree, and then routes each demand in order, accumulating
//! forward/backward link counters and tx/rx node counters.
//!
//! ## Key Features
//!
//! - **Deterministic trees**: root election by lowest ID and root-port
//!   tie-breaking by lowest neighbour ID, independent of input order
//! - **802.1D path costs**: `10 -> 100`, `100 -> 19`, `1000 -> 4`,
//!   `10000 -> 2`, `100000 -> 1`
//! - **Directional counters**: every link records traffic along and against
//!   the direction it was declared in
//! - **Batch tolerance**: a bad demand is reported and skipped, the rest still
//!   route
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `graph`: Arena-backed undirected graph with node and link records
//! - `attributes`: Node identities, link costs and counter reset
//! - `routing`: Dijkstra distances and shortest paths over link cost
//! - `stp`: Root election and spanning tree construction
//! - `traffic`: Demand routing and counter accumulation
//! - `dot_parser`: DOT topology reader
//! - `demands`: CSV demand list reader
//! - `config`: Analysis configuration structures and validation
//! - `config_loader`: YAML loading and command-line overrides
//! - `report`: JSON, text and DOT output
//! - `orchestrator`: End-to-end analysis runs
//!
//! ## Example Usage
//!
//! ```rust
//! use stpflow::attributes::{assign_flow_attributes, assign_stp_attributes};
//! use stpflow::dot_parser::parse_dot_str;
//! use stpflow::graph::IdentityScheme;
//! use stpflow::stp::get_spanning_tree;
//! use stpflow::traffic::{accumulate, Demand};
//!
//! let mut graph = parse_dot_str("graph { 1 -- 2 [speed=1000]; 2 -- 3; 1 -- 3 [speed=10] }")?
//!     .into_graph();
//! assign_stp_attributes(&mut graph, IdentityScheme::LabelCodes);
//!
//! let mut tree = get_spanning_tree(&graph)?;
//! assert_eq!(tree.graph().label(tree.root()), "1");
//!
//! let active = tree.graph_mut();
//! assign_flow_attributes(active);
//! let route = accumulate(active, &Demand::new("3", "1", 5.0))?;
//! assert_eq!(route.hops, vec!["3", "2", "1"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Format
//!
//! Runs can be described in YAML:
//!
//! ```yaml
//! topology: "lab.dot"
//! demands_file: "demands.csv"   # or an inline `demands:` list
//! spanning_tree: true
//! identity: label-codes         # or hashed
//! output:
//!   directory: "stpflow_output"
//!   formats: [json, text, dot]
//! ```
//!
//! ## Error Handling
//!
//! Library operations return typed `thiserror` errors. Per-demand failures are
//! collected rather than raised; spanning tree failures abort the call. File
//! loaders and the binary use `color_eyre` for error reports with context.

pub mod graph;
pub mod attributes;
pub mod routing;
pub mod stp;
pub mod traffic;

pub mod dot_parser;
pub mod demands;
pub mod config;
pub mod config_loader;
pub mod report;
pub mod orchestrator;
