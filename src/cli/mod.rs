use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "kube-graph",
    version,
    about = "Visualize cluster resources and relationships",
    long_about = "Build a relationship graph from a dump of cluster resource objects and render it in one of four output formats. Graph-database formats (cypher, arangodb) are written to be piped straight into their query shells."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the graph from resource dump files and render it
    Build {
        /// Resource dump file (JSON or YAML; a List object, a plain array,
        /// or multi-document YAML). Repeatable.
        #[arg(short, long, required = true)]
        file: Vec<String>,
        /// Output format
        #[arg(
            short = 'o',
            long,
            value_parser = ["graphviz", "dot", "cypher", "cql", "cyp", "arangodb", "aql", "mermaid"],
            default_value = "graphviz"
        )]
        output: String,
        /// Truncate node names to N characters (graphviz and mermaid). Pass 0 to disable.
        #[arg(short = 't', long, default_value_t = 12)]
        truncate: usize,
        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<String>,
        /// Write the rendered output to a file instead of stdout
        #[arg(long)]
        out: Option<String>,
        /// Host name used for the synthetic cluster root node
        #[arg(long, default_value = "kubernetes")]
        cluster_host: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
