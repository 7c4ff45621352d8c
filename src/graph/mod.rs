//! Graph model and builder for the crate.
//!
//! This module defines the core data structures for the resource graph
//! (`Graph`, `Node`, `Relationship`, `Uid`) and the ingest machinery that
//! populates them: a dispatch table routing each raw object to a per-group
//! producer, and the finalize pass that roots orphan nodes.
//!
//! You typically construct a graph via [`build`] and then hand it to
//! `crate::render` for output.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

use crate::client::ResourceReader;
use crate::errors::GraphError;
use crate::resources::{self, Metadata};

mod core;
mod networking;
mod route;

/// apiVersion of the core group.
pub const CORE_API_VERSION: &str = "v1";
/// apiVersion of the networking group.
pub const NETWORKING_API_VERSION: &str = "networking.k8s.io/v1";
/// apiVersion of the route extension group.
pub const ROUTE_API_VERSION: &str = "route.openshift.io/v1";
/// apiVersion stamped on nodes that exist only in the graph (cluster root,
/// node facts) and never in the cluster.
pub const SYNTHETIC_API_VERSION: &str = "kube-graph/v1";

/// Primary key of a graph node.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uid(pub String);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive a stable identifier from a list of identifying values.
///
/// The values are joined with `-`, MD5-hashed, and rendered in the canonical
/// 8-4-4-4-12 hex grouping. The same list always yields the same identifier.
/// Used for every synthetic node; authoritative nodes keep their native uid.
#[must_use]
pub fn derive_uid<I, S>(parts: I) -> Uid
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = parts.into_iter().map(|p| p.as_ref().to_string()).collect::<Vec<_>>().join("-");
    let hex = format!("{:x}", md5::compute(joined.as_bytes()));
    Uid(format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..]
    ))
}

/// One graph entity, authoritative or synthetic.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub api_version: String,
    pub kind: String,
    pub uid: Uid,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Directed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub from: Uid,
    pub label: String,
    pub to: Uid,
    pub attr: BTreeMap<String, String>,
}

/// Handle to a stored relationship, for incremental attribute updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeId(usize);

/// Store of deduplicated nodes and relationships.
///
/// The store is flat (uid → node); any cluster/namespace grouping is
/// computed at render time from each node's namespace field.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: BTreeMap<Uid, Node>,
    edges: Vec<Relationship>,
    // Edge indices grouped by target uid, for dedup and orphan detection.
    incoming: HashMap<Uid, Vec<usize>>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a node into the store and walk its owner references.
    ///
    /// Re-inserting a uid overwrites the record, except that non-empty
    /// labels/annotations already stored are carried forward. Annotation
    /// values that look like embedded JSON documents are dropped. Each owner
    /// reference is upserted as a stub in the same namespace, with an
    /// owner→child edge labeled with the child's kind.
    pub fn upsert(&mut self, api_version: &str, kind: &str, meta: &Metadata) -> Uid {
        let uid = Uid(meta.uid.clone());
        let annotations: BTreeMap<String, String> = meta
            .annotations
            .iter()
            .filter(|(_, v)| !v.starts_with('{') && !v.starts_with('['))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut node = Node {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            uid: uid.clone(),
            name: meta.name.clone(),
            namespace: meta.namespace.clone(),
            labels: meta.labels.clone(),
            annotations,
        };
        if let Some(prior) = self.nodes.get(&uid) {
            if !prior.annotations.is_empty() {
                node.annotations = prior.annotations.clone();
            }
            if !prior.labels.is_empty() {
                node.labels = prior.labels.clone();
            }
        }
        self.nodes.insert(uid.clone(), node);

        for owner in &meta.owner_references {
            let owner_meta = Metadata {
                uid: owner.uid.clone(),
                name: owner.name.clone(),
                namespace: meta.namespace.clone(),
                ..Metadata::default()
            };
            let o = self.upsert(&owner.api_version, &owner.kind, &owner_meta);
            self.relationship(&o, kind, &uid);
        }

        uid
    }

    /// Create a relationship, or return the existing one for this ordered
    /// `(from, to)` pair.
    pub fn relationship(&mut self, from: &Uid, label: &str, to: &Uid) -> EdgeId {
        if let Some(indices) = self.incoming.get(to) {
            for &i in indices {
                if self.edges[i].from == *from {
                    return EdgeId(i);
                }
            }
        }
        let id = self.edges.len();
        self.edges.push(Relationship {
            from: from.clone(),
            label: label.to_string(),
            to: to.clone(),
            attr: BTreeMap::new(),
        });
        self.incoming.entry(to.clone()).or_default().push(id);
        EdgeId(id)
    }

    /// Set one attribute on a relationship; later writes overwrite.
    pub fn attribute(&mut self, edge: EdgeId, key: &str, value: &str) {
        self.edges[edge.0].attr.insert(key.to_string(), value.to_string());
    }

    #[must_use]
    pub fn node(&self, uid: &Uid) -> Option<&Node> {
        self.nodes.get(uid)
    }

    /// All nodes, in uid order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.edges
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &Relationship {
        &self.edges[id.0]
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn has_incoming(&self, uid: &Uid) -> bool {
        self.incoming.get(uid).is_some_and(|v| !v.is_empty())
    }
}

/// Ingest state: the store under construction plus the live read handle.
pub struct Builder<'a> {
    pub(crate) graph: Graph,
    pub(crate) reader: &'a dyn ResourceReader,
}

type Producer = fn(&mut Builder<'_>, &serde_json::Value) -> Result<(), GraphError>;

// Capability table: (group, kind) → producer. Unlisted kinds fall through to
// the generic producer, so no input object is ever dropped.
const PRODUCERS: &[((&str, &str), Producer)] = &[
    (("", "Namespace"), produce_namespace),
    (("", "Pod"), produce_pod),
    (("", "Endpoints"), produce_endpoints),
    (("", "Service"), produce_service),
    (("", "Node"), produce_node),
    (("networking.k8s.io", "Ingress"), produce_ingress),
    (("networking.k8s.io", "NetworkPolicy"), produce_network_policy),
    (("route.openshift.io", "Route"), produce_route),
];

fn produce_namespace(b: &mut Builder<'_>, value: &serde_json::Value) -> Result<(), GraphError> {
    let obj: resources::Namespace = resources::convert(value)?;
    b.namespace(&obj);
    Ok(())
}

fn produce_pod(b: &mut Builder<'_>, value: &serde_json::Value) -> Result<(), GraphError> {
    let obj: resources::Pod = resources::convert(value)?;
    b.pod(&obj);
    Ok(())
}

fn produce_endpoints(b: &mut Builder<'_>, value: &serde_json::Value) -> Result<(), GraphError> {
    let obj: resources::Endpoints = resources::convert(value)?;
    b.endpoints(&obj);
    Ok(())
}

fn produce_service(b: &mut Builder<'_>, value: &serde_json::Value) -> Result<(), GraphError> {
    let obj: resources::Service = resources::convert(value)?;
    b.service(&obj).map(|_| ())
}

fn produce_node(b: &mut Builder<'_>, value: &serde_json::Value) -> Result<(), GraphError> {
    let obj: resources::Node = resources::convert(value)?;
    b.node(&obj);
    Ok(())
}

fn produce_ingress(b: &mut Builder<'_>, value: &serde_json::Value) -> Result<(), GraphError> {
    let obj: resources::Ingress = resources::convert(value)?;
    b.ingress(&obj).map(|_| ())
}

fn produce_network_policy(b: &mut Builder<'_>, value: &serde_json::Value) -> Result<(), GraphError> {
    let obj: resources::NetworkPolicy = resources::convert(value)?;
    b.network_policy(&obj).map(|_| ())
}

fn produce_route(b: &mut Builder<'_>, value: &serde_json::Value) -> Result<(), GraphError> {
    let obj: resources::Route = resources::convert(value)?;
    b.route(&obj).map(|_| ())
}

fn produce_generic(b: &mut Builder<'_>, value: &serde_json::Value) -> Result<(), GraphError> {
    let obj: resources::GenericObject = resources::convert(value)?;
    b.graph.upsert(&obj.api_version, &obj.kind, &obj.metadata);
    Ok(())
}

impl<'a> Builder<'a> {
    /// Route one raw object to its producer.
    ///
    /// # Errors
    /// Conversion or lookup failures from the producer; the store keeps any
    /// mutations made before the failure.
    pub(crate) fn insert_object(&mut self, value: &serde_json::Value) -> Result<(), GraphError> {
        let api_version =
            value.get("apiVersion").and_then(serde_json::Value::as_str).unwrap_or("");
        let kind = value.get("kind").and_then(serde_json::Value::as_str).unwrap_or("");
        let group = resources::api_group(api_version);
        let producer = PRODUCERS
            .iter()
            .find(|((g, k), _)| *g == group && *k == kind)
            .map_or(produce_generic as Producer, |(_, p)| *p);
        producer(self, value)
    }

    /// Attach every orphan node to its namespace node or to the cluster root.
    ///
    /// Nodes of kind Cluster or Namespace and nodes that already have an
    /// incoming edge are left alone.
    ///
    /// # Errors
    /// Failure to materialize a root node is fatal to the build.
    pub(crate) fn finalize(&mut self) -> Result<(), GraphError> {
        let orphans: Vec<(Uid, String, String)> = self
            .graph
            .nodes()
            .filter(|n| {
                n.kind != "Cluster" && n.kind != "Namespace" && !self.graph.has_incoming(&n.uid)
            })
            .map(|n| (n.uid.clone(), n.kind.clone(), n.namespace.clone()))
            .collect();

        for (uid, kind, namespace) in orphans {
            if namespace.is_empty() {
                let cluster = self.cluster()?;
                self.graph.relationship(&cluster, &kind, &uid);
            } else {
                let ns = self.namespace(&resources::Namespace {
                    metadata: Metadata { name: namespace, ..Metadata::default() },
                });
                self.graph.relationship(&ns, &kind, &uid);
            }
        }
        Ok(())
    }
}

/// Build a graph from a batch of raw resource objects.
///
/// Non-fatal errors (conversion and lookup failures) are accumulated and
/// returned beside the still-usable graph.
///
/// # Errors
/// Returns `Err` only when the finalize pass fails to root the graph.
pub fn build(
    reader: &dyn ResourceReader,
    objects: &[serde_json::Value],
) -> Result<(Graph, Vec<GraphError>), GraphError> {
    build_with_progress(reader, objects, || {})
}

/// [`build`] with a per-object progress observer.
///
/// The observer is called once per input object, after the object has been
/// dispatched; it must not block indefinitely.
///
/// # Errors
/// Same contract as [`build`].
pub fn build_with_progress<F: FnMut()>(
    reader: &dyn ResourceReader,
    objects: &[serde_json::Value],
    mut processed: F,
) -> Result<(Graph, Vec<GraphError>), GraphError> {
    let mut builder = Builder { graph: Graph::new(), reader };
    let mut errors = Vec::new();

    for value in objects {
        debug!(
            kind = value.get("kind").and_then(serde_json::Value::as_str).unwrap_or(""),
            name = value.pointer("/metadata/name").and_then(serde_json::Value::as_str).unwrap_or(""),
            "processing object"
        );
        if let Err(err) = builder.insert_object(value) {
            warn!(error = %err, "derived relationships skipped");
            errors.push(err);
        }
        processed();
    }

    builder.finalize()?;
    Ok((builder.graph, errors))
}
