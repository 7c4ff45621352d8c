//! Live read capability required by the graph producers.
//!
//! The engine never fetches the batch itself; it only issues the narrow set
//! of supplemental reads below while producing relationships. A real
//! cluster-backed implementation lives with the fetch layer; [`BatchReader`]
//! answers the same questions from an already-fetched object dump, which is
//! what the CLI and the tests use.
use std::collections::HashMap;

use crate::errors::LookupError;
use crate::resources::{self, Endpoints, Namespace, Pod, Selector, Service};

/// Field selector applied to every pod list issued by the producers.
pub const FIELD_SELECTOR_RUNNING: &str = "status.phase=Running";

/// Read access to the cluster, restricted to what producers need.
pub trait ResourceReader {
    /// Host naming the cluster; used for the singleton cluster root node.
    fn cluster_host(&self) -> String {
        "kubernetes".to_string()
    }

    /// Get a Service by namespace and name.
    ///
    /// # Errors
    /// `LookupError::NotFound` when no such object exists, or a transport
    /// failure.
    fn get_service(&self, namespace: &str, name: &str) -> Result<Service, LookupError>;

    /// Get an Endpoints object by namespace and name.
    ///
    /// # Errors
    /// `LookupError::NotFound` when no such object exists, or a transport
    /// failure.
    fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, LookupError>;

    /// List pods in a namespace matching a label selector and an optional
    /// field selector (`""` means unfiltered).
    ///
    /// # Errors
    /// `LookupError::Selector` for an unsupported field selector, or a
    /// transport failure.
    fn list_pods(
        &self,
        namespace: &str,
        selector: &Selector,
        field_selector: &str,
    ) -> Result<Vec<Pod>, LookupError>;

    /// List namespaces matching a label selector.
    ///
    /// # Errors
    /// Transport failure.
    fn list_namespaces(&self, selector: &Selector) -> Result<Vec<Namespace>, LookupError>;
}

/// [`ResourceReader`] backed by the ingested batch itself.
#[derive(Debug, Default)]
pub struct BatchReader {
    cluster_host: String,
    services: HashMap<(String, String), Service>,
    endpoints: HashMap<(String, String), Endpoints>,
    pods: Vec<Pod>,
    namespaces: Vec<Namespace>,
}

impl BatchReader {
    /// Index the lookup-relevant kinds out of a raw object batch.
    ///
    /// Objects that fail conversion are skipped here; the ingest pass
    /// reports those failures itself.
    #[must_use]
    pub fn new(objects: &[serde_json::Value]) -> Self {
        let mut reader = Self { cluster_host: "kubernetes".to_string(), ..Self::default() };
        for value in objects {
            let api_version = value.get("apiVersion").and_then(serde_json::Value::as_str).unwrap_or("");
            if !resources::api_group(api_version).is_empty() {
                continue;
            }
            match value.get("kind").and_then(serde_json::Value::as_str) {
                Some("Service") => {
                    if let Ok(obj) = resources::convert::<Service>(value) {
                        let key = (obj.metadata.namespace.clone(), obj.metadata.name.clone());
                        reader.services.insert(key, obj);
                    }
                }
                Some("Endpoints") => {
                    if let Ok(obj) = resources::convert::<Endpoints>(value) {
                        let key = (obj.metadata.namespace.clone(), obj.metadata.name.clone());
                        reader.endpoints.insert(key, obj);
                    }
                }
                Some("Pod") => {
                    if let Ok(obj) = resources::convert::<Pod>(value) {
                        reader.pods.push(obj);
                    }
                }
                Some("Namespace") => {
                    if let Ok(obj) = resources::convert::<Namespace>(value) {
                        reader.namespaces.push(obj);
                    }
                }
                _ => {}
            }
        }
        reader
    }

    /// Override the host used for the cluster root node.
    #[must_use]
    pub fn with_cluster_host(mut self, host: impl Into<String>) -> Self {
        self.cluster_host = host.into();
        self
    }

    fn matches_field_selector(pod: &Pod, field_selector: &str) -> Result<bool, LookupError> {
        if field_selector.is_empty() {
            return Ok(true);
        }
        match field_selector.split_once('=') {
            Some(("status.phase", phase)) => Ok(pod.status.phase == phase),
            _ => Err(LookupError::Selector(format!(
                "unsupported field selector {:?}",
                field_selector
            ))),
        }
    }
}

impl ResourceReader for BatchReader {
    fn cluster_host(&self) -> String {
        self.cluster_host.clone()
    }

    fn get_service(&self, namespace: &str, name: &str) -> Result<Service, LookupError> {
        self.services
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                kind: "Service".to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, LookupError> {
        self.endpoints
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                kind: "Endpoints".to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    fn list_pods(
        &self,
        namespace: &str,
        selector: &Selector,
        field_selector: &str,
    ) -> Result<Vec<Pod>, LookupError> {
        let mut out = Vec::new();
        for pod in &self.pods {
            if pod.metadata.namespace != namespace {
                continue;
            }
            if !selector.matches(&pod.metadata.labels) {
                continue;
            }
            if Self::matches_field_selector(pod, field_selector)? {
                out.push(pod.clone());
            }
        }
        Ok(out)
    }

    fn list_namespaces(&self, selector: &Selector) -> Result<Vec<Namespace>, LookupError> {
        Ok(self
            .namespaces
            .iter()
            .filter(|ns| selector.matches(&ns.metadata.labels))
            .cloned()
            .collect())
    }
}
