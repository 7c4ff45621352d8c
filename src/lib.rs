//! kube-graph — Cluster Resource Relationship Graphs
//!
//! Build a relationship graph from a batch of cluster resource objects and
//! render it in one of four output formats.
//!
//! # Features
//! - Deduplicating node/relationship store with owner-reference walking
//! - Per-group producers deriving explicit and selector-based relationships,
//!   with live supplemental lookups through a pluggable reader
//! - Finalize pass rooting every node under its namespace or the cluster
//! - Output formats: graphviz (dot), cypher (cql), arangodb (aql), mermaid
//!
//! # Quickstart (Library)
//! ```no_run
//! use kube_graph::client::BatchReader;
//! use kube_graph::graph;
//! use kube_graph::render::Format;
//!
//! let objects = kube_graph::app::load_objects("dump.json").expect("read dump");
//! let reader = BatchReader::new(&objects);
//! let (graph, errors) = graph::build(&reader, &objects).expect("build graph");
//! eprintln!("{} nodes, {} warnings", graph.node_count(), errors.len());
//! println!("{}", graph.render(Format::Graphviz).expect("render"));
//! ```
//!
//! # Quickstart (CLI)
//! ```text
//! kubectl get all,namespaces -A -o json > dump.json
//! kube-graph build -f dump.json -o cypher | cypher-shell -u neo4j -p secret
//! ```
pub mod app;
pub mod cli;
pub mod client;
pub mod errors;
pub mod graph;
pub mod render;
pub mod resources;
pub mod utils;
