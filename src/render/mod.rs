//! Multi-format output for a finished graph.
//!
//! All four formats walk the same traversal: nodes in uid order (grouped by
//! namespace where the format supports visual nesting) followed by
//! relationships in (from, to) order. The graph-database formats (cypher,
//! arangodb) are parsed literally by downstream shells and import scripts,
//! so their shape is part of the output contract.
use crate::errors::GraphError;
use crate::graph::{Graph, Node, Relationship};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

/// Alpha suffix appended to fill colors.
const FILL_ALPHA: &str = "60";

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Graphviz,
    Cypher,
    ArangoDb,
    Mermaid,
}

impl FromStr for Format {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graphviz" | "dot" => Ok(Format::Graphviz),
            "cypher" | "cql" | "cyp" => Ok(Format::Cypher),
            "arangodb" | "aql" => Ok(Format::ArangoDb),
            "mermaid" => Ok(Format::Mermaid),
            other => Err(GraphError::Render(format!("unknown output format {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Truncate node names to this many characters in graphviz and mermaid
    /// output; 0 disables truncation.
    pub truncate: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { truncate: 12 }
    }
}

/// Template state, constructed once and owned by the caller.
#[derive(Debug)]
pub struct Renderer {
    opts: RenderOptions,
    non_alnum: Regex,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl Renderer {
    #[must_use]
    pub fn new(opts: RenderOptions) -> Self {
        Self { opts, non_alnum: Regex::new("[^a-z0-9]+").unwrap() }
    }

    /// Render the graph in the requested format.
    ///
    /// # Errors
    /// Returns `GraphError::Render` when a helper fails to serialize a node
    /// record; the graph itself is left untouched.
    pub fn render(&self, graph: &Graph, format: Format) -> Result<String, GraphError> {
        match format {
            Format::Graphviz => self.graphviz(graph),
            Format::Cypher => self.cypher(graph),
            Format::ArangoDb => self.arangodb(graph),
            Format::Mermaid => self.mermaid(graph),
        }
    }

    /// Deterministic per-kind color: first three digest bytes as hex.
    #[must_use]
    pub fn color(&self, kind: &str) -> String {
        let digest = md5::compute(kind.as_bytes());
        format!("#{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2])
    }

    /// Cut `name` to the configured width; 0 leaves names unchanged.
    #[must_use]
    pub fn truncate(&self, name: &str) -> String {
        let limit = self.opts.truncate;
        if limit > 0 && name.chars().count() > limit {
            name.chars().take(limit).collect()
        } else {
            name.to_string()
        }
    }

    /// Lowercase `key` and squash every run of non-alphanumerics to one
    /// underscore, producing a safe property name.
    #[must_use]
    pub fn underscore(&self, key: &str) -> String {
        self.non_alnum.replace_all(&key.to_lowercase(), "_").into_owned()
    }

    /// Full node record as JSON, for embedding in output.
    ///
    /// # Errors
    /// `GraphError::Render` on serialization failure.
    pub fn json(&self, node: &Node) -> Result<String, GraphError> {
        serde_json::to_string(node).map_err(|e| GraphError::Render(e.to_string()))
    }

    /// Full node record as YAML, trimmed, for tooltip payloads.
    ///
    /// # Errors
    /// `GraphError::Render` on serialization failure.
    pub fn yaml(&self, node: &Node) -> Result<String, GraphError> {
        serde_yaml::to_string(node)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| GraphError::Render(e.to_string()))
    }

    // Nodes split into cluster-scoped and per-namespace groups, each in uid
    // order; edges sorted by (from, to). Grouping happens only here, never
    // in the store.
    fn traversal<'g>(
        graph: &'g Graph,
    ) -> (Vec<&'g Node>, BTreeMap<&'g str, Vec<&'g Node>>, Vec<&'g Relationship>) {
        let mut cluster_scoped = Vec::new();
        let mut by_namespace: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();
        for node in graph.nodes() {
            if node.namespace.is_empty() {
                cluster_scoped.push(node);
            } else {
                by_namespace.entry(node.namespace.as_str()).or_default().push(node);
            }
        }
        let mut edges: Vec<&Relationship> = graph.relationships().iter().collect();
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        (cluster_scoped, by_namespace, edges)
    }

    fn graphviz(&self, graph: &Graph) -> Result<String, GraphError> {
        let (cluster_scoped, by_namespace, edges) = Self::traversal(graph);

        let mut s = String::new();
        s.push_str("digraph {\n");
        s.push_str("  graph [rankdir=LR, compound=true, fontname=\"Helvetica\"];\n");
        s.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10];\n");
        s.push_str("  edge [fontname=\"Helvetica\", fontsize=9];\n");

        for node in &cluster_scoped {
            self.graphviz_node(node, "  ", &mut s)?;
        }
        for (namespace, nodes) in &by_namespace {
            let _ = writeln!(s, "  subgraph \"cluster_{}\" {{", escape_quoted(namespace));
            let _ = writeln!(s, "    label=\"{}\";", escape_quoted(namespace));
            s.push_str("    color=lightgrey;\n");
            for node in nodes {
                self.graphviz_node(node, "    ", &mut s)?;
            }
            s.push_str("  }\n");
        }

        for rel in &edges {
            let mut attrs = format!("label=\"{}\"", escape_quoted(&rel.label));
            for (key, value) in &rel.attr {
                let _ = write!(attrs, ", {}=\"{}\"", key, escape_quoted(value));
            }
            let _ = writeln!(s, "  \"{}\" -> \"{}\" [{}];", rel.from, rel.to, attrs);
        }

        s.push_str("}\n");
        Ok(s)
    }

    fn graphviz_node(&self, node: &Node, indent: &str, out: &mut String) -> Result<(), GraphError> {
        let tooltip = self.yaml(node)?;
        let _ = writeln!(
            out,
            "{indent}\"{}\" [label=\"{}\", fillcolor=\"{}{FILL_ALPHA}\", tooltip=\"{}\"];",
            node.uid,
            escape_quoted(&self.truncate(&node.name)),
            self.color(&node.kind),
            escape_quoted(&tooltip)
        );
        Ok(())
    }

    // Two transactions: every node MERGEd by uid first, an index-await
    // barrier, then every edge MERGEd by matching endpoint uids. Re-running
    // the script is idempotent.
    fn cypher(&self, graph: &Graph) -> Result<String, GraphError> {
        let (cluster_scoped, by_namespace, edges) = Self::traversal(graph);

        let mut s = String::new();
        s.push_str(":begin\n");
        for node in cluster_scoped.iter().chain(by_namespace.values().flatten()) {
            let mut props = format!(
                "apiVersion: \"{}\", kind: \"{}\", name: \"{}\"",
                escape_quoted(&node.api_version),
                escape_quoted(&node.kind),
                escape_quoted(&node.name)
            );
            if !node.namespace.is_empty() {
                let _ = write!(props, ", namespace: \"{}\"", escape_quoted(&node.namespace));
            }
            for (key, value) in &node.labels {
                let _ =
                    write!(props, ", label_{}: \"{}\"", self.underscore(key), escape_quoted(value));
            }
            for (key, value) in &node.annotations {
                let _ = write!(
                    props,
                    ", annotation_{}: \"{}\"",
                    self.underscore(key),
                    escape_quoted(value)
                );
            }
            let _ = writeln!(
                s,
                "MERGE (node:{} {{UID: \"{}\"}}) SET node += {{{}}};",
                node.kind, node.uid, props
            );
        }
        s.push_str(":commit\n");
        s.push_str("CALL db.awaitIndexes();\n");
        s.push_str(":begin\n");
        for rel in &edges {
            let _ = writeln!(
                s,
                "MATCH (from {{UID: \"{}\"}}),(to {{UID: \"{}\"}}) MERGE (from)-[:{}]->(to);",
                rel.from, rel.to, rel.label
            );
        }
        s.push_str(":commit\n");
        Ok(s)
    }

    // One AQL query: batch upsert of all node documents into `resources`,
    // then all edge documents into `relationships`, both in overwrite mode.
    fn arangodb(&self, graph: &Graph) -> Result<String, GraphError> {
        let (cluster_scoped, by_namespace, edges) = Self::traversal(graph);

        let mut node_docs = Vec::new();
        for node in cluster_scoped.iter().chain(by_namespace.values().flatten()) {
            let mut doc = serde_json::to_value(node)
                .map_err(|e| GraphError::Render(e.to_string()))?;
            if let Some(map) = doc.as_object_mut() {
                map.insert("_key".to_string(), serde_json::Value::String(node.uid.to_string()));
            }
            node_docs.push(doc.to_string());
        }

        let mut edge_docs = Vec::new();
        for rel in &edges {
            let mut map = serde_json::Map::new();
            map.insert("_from".to_string(), format!("resources/{}", rel.from).into());
            map.insert("_to".to_string(), format!("resources/{}", rel.to).into());
            map.insert("label".to_string(), rel.label.clone().into());
            for (key, value) in &rel.attr {
                map.insert(key.clone(), value.clone().into());
            }
            edge_docs.push(serde_json::Value::Object(map).to_string());
        }

        let mut s = String::new();
        s.push_str("LET nodes = (\n    FOR node IN [\n");
        let _ = writeln!(s, "        {}", node_docs.join(",\n        "));
        s.push_str("    ]\n");
        s.push_str("    INSERT node INTO resources OPTIONS { overwriteMode: \"update\" }\n");
        s.push_str("    RETURN NEW\n)\n");
        s.push_str("LET edges = (\n    FOR edge IN [\n");
        let _ = writeln!(s, "        {}", edge_docs.join(",\n        "));
        s.push_str("    ]\n");
        s.push_str("    INSERT edge INTO relationships OPTIONS { overwriteMode: \"update\" }\n");
        s.push_str("    RETURN NEW\n)\n");
        s.push_str("RETURN { resources: LENGTH(nodes), relationships: LENGTH(edges) }\n");
        Ok(s)
    }

    fn mermaid(&self, graph: &Graph) -> Result<String, GraphError> {
        let (cluster_scoped, by_namespace, edges) = Self::traversal(graph);

        let mut s = String::new();
        s.push_str("flowchart LR\n");
        for node in &cluster_scoped {
            self.mermaid_node(node, "  ", &mut s);
        }
        for (namespace, nodes) in &by_namespace {
            let _ = writeln!(s, "  subgraph {}", sanitize_id(namespace));
            for node in nodes {
                self.mermaid_node(node, "    ", &mut s);
            }
            s.push_str("  end\n");
        }
        for rel in &edges {
            let _ = writeln!(
                s,
                "  {} -->|{}| {}",
                sanitize_id(&rel.from.0),
                escape_mermaid(&rel.label),
                sanitize_id(&rel.to.0)
            );
        }
        Ok(s)
    }

    fn mermaid_node(&self, node: &Node, indent: &str, out: &mut String) {
        let id = sanitize_id(&node.uid.0);
        let _ = writeln!(
            out,
            "{indent}{id}[\"{}\"]\n{indent}style {id} fill:{}{FILL_ALPHA}",
            escape_mermaid(&self.truncate(&node.name)),
            self.color(&node.kind)
        );
    }
}

impl Graph {
    /// Render with default options; see [`Renderer::render`].
    ///
    /// # Errors
    /// Same contract as [`Renderer::render`].
    pub fn render(&self, format: Format) -> Result<String, GraphError> {
        Renderer::default().render(self, format)
    }
}

fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_mermaid(s: &str) -> String {
    s.replace('"', "'")
}

fn sanitize_id(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => c,
            _ => '_',
        })
        .collect()
}
