//! Producers for the networking API group.
//!
//! NetworkPolicy resolution issues live pod/namespace lists; edge direction
//! follows the rule direction (ingress edges point at the policy, egress
//! edges point away from it), with per-direction styling attributes.
use super::{derive_uid, Builder, EdgeId, Uid, NETWORKING_API_VERSION};
use crate::client::FIELD_SELECTOR_RUNNING;
use crate::errors::GraphError;
use crate::resources::{
    Ingress, IngressBackend, LabelSelector, Metadata, NetworkPolicy, NetworkPolicyPeer,
};

const INGRESS_COLOR: &str = "#34A853";
const EGRESS_COLOR: &str = "#EA4335";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PolicyType {
    Ingress,
    Egress,
}

impl PolicyType {
    fn label(self) -> &'static str {
        match self {
            PolicyType::Ingress => "Ingress",
            PolicyType::Egress => "Egress",
        }
    }
}

impl<'a> Builder<'a> {
    /// Create a direction-sensitive relationship: ingress edges run
    /// `to`→`from`, egress edges `from`→`to`. Both get dashed styling and a
    /// per-direction color.
    pub(crate) fn policy_relationship(
        &mut self,
        from: &Uid,
        policy_type: PolicyType,
        to: &Uid,
    ) -> EdgeId {
        let edge = match policy_type {
            PolicyType::Ingress => {
                let e = self.graph.relationship(to, policy_type.label(), from);
                self.graph.attribute(e, "color", INGRESS_COLOR);
                e
            }
            PolicyType::Egress => {
                let e = self.graph.relationship(from, policy_type.label(), to);
                self.graph.attribute(e, "color", EGRESS_COLOR);
                e
            }
        };
        self.graph.attribute(edge, "style", "dashed");
        edge
    }

    /// Add an Ingress: backends feed the ingress, the ingress feeds its
    /// rule hostnames.
    ///
    /// # Errors
    /// Backend resolution failures (missing Service, unsupported backend);
    /// the ingress node itself is already in the store by then.
    pub(crate) fn ingress(&mut self, obj: &Ingress) -> Result<Uid, GraphError> {
        let n = self.graph.upsert(NETWORKING_API_VERSION, "Ingress", &obj.metadata);

        for rule in &obj.spec.rules {
            if let Some(http) = &rule.http {
                for path in &http.paths {
                    let b = self.ingress_backend(obj, &path.backend)?;
                    self.policy_relationship(&n, PolicyType::Ingress, &b);
                }
            }

            let h = self.host(&rule.host);
            self.policy_relationship(&h, PolicyType::Ingress, &n);
        }

        Ok(n)
    }

    // A backend is either a named Service, resolved live and run through the
    // Service producer, or a typed local resource reference.
    fn ingress_backend(
        &mut self,
        obj: &Ingress,
        backend: &IngressBackend,
    ) -> Result<Uid, GraphError> {
        if let Some(service) = &backend.service {
            let resolved = self.reader.get_service(&obj.metadata.namespace, &service.name)?;
            return self.service(&resolved);
        }
        if let Some(resource) = &backend.resource {
            return Ok(self.typed_local_object_reference(resource, &obj.metadata.namespace));
        }

        Err(GraphError::UnsupportedBackend {
            kind: "Ingress".to_string(),
            namespace: obj.metadata.namespace.clone(),
            name: obj.metadata.name.clone(),
        })
    }

    /// Add an external host node, keyed by the hostname.
    pub(crate) fn host(&mut self, name: &str) -> Uid {
        let meta = Metadata {
            uid: derive_uid([name]).0,
            name: name.to_string(),
            ..Metadata::default()
        };
        self.graph.upsert(NETWORKING_API_VERSION, "Host", &meta)
    }

    /// Add a NetworkPolicy and resolve its selector and rule peers.
    ///
    /// # Errors
    /// Selector compilation or live list failures; the policy node itself is
    /// already in the store by then.
    pub(crate) fn network_policy(&mut self, obj: &NetworkPolicy) -> Result<Uid, GraphError> {
        let n = self.graph.upsert(NETWORKING_API_VERSION, "NetworkPolicy", &obj.metadata);

        let selector = obj.spec.pod_selector.selector()?;
        let pods =
            self.reader.list_pods(&obj.metadata.namespace, &selector, FIELD_SELECTOR_RUNNING)?;
        for pod in &pods {
            let p = self.pod(pod);
            if !obj.spec.ingress.is_empty() {
                self.policy_relationship(&p, PolicyType::Ingress, &n);
            }
            if !obj.spec.egress.is_empty() {
                self.policy_relationship(&p, PolicyType::Egress, &n);
            }
        }

        // An empty peer list means "any peer": one synthetic all-pods peer.
        let any_peer = NetworkPolicyPeer {
            pod_selector: Some(LabelSelector::default()),
            ..NetworkPolicyPeer::default()
        };

        for rule in &obj.spec.ingress {
            let peers: &[NetworkPolicyPeer] = if rule.from.is_empty() {
                std::slice::from_ref(&any_peer)
            } else {
                &rule.from
            };
            for peer in peers {
                self.network_policy_peer(obj, PolicyType::Ingress, peer)?;
            }
        }

        for rule in &obj.spec.egress {
            let peers: &[NetworkPolicyPeer] = if rule.to.is_empty() {
                std::slice::from_ref(&any_peer)
            } else {
                &rule.to
            };
            for peer in peers {
                self.network_policy_peer(obj, PolicyType::Egress, peer)?;
            }
        }

        Ok(n)
    }

    fn network_policy_peer(
        &mut self,
        obj: &NetworkPolicy,
        policy_type: PolicyType,
        peer: &NetworkPolicyPeer,
    ) -> Result<(), GraphError> {
        match (&peer.namespace_selector, &peer.pod_selector, &peer.ip_block) {
            (Some(namespaces), Some(pods), _) => {
                self.peer_namespace_and_pod_selector(obj, policy_type, namespaces, pods)
            }
            (Some(namespaces), None, _) => {
                self.peer_namespace_selector(obj, policy_type, namespaces)
            }
            (None, Some(pods), _) => self.peer_pod_selector(obj, policy_type, pods),
            (None, None, Some(block)) => {
                let n = self.graph.upsert(NETWORKING_API_VERSION, "NetworkPolicy", &obj.metadata);
                let i = self.ip_block(&block.cidr);
                self.policy_relationship(&n, policy_type, &i);
                Ok(())
            }
            (None, None, None) => Ok(()),
        }
    }

    // Pods matching the pod selector, but only within namespaces matching
    // the namespace selector.
    fn peer_namespace_and_pod_selector(
        &mut self,
        obj: &NetworkPolicy,
        policy_type: PolicyType,
        namespace_selector: &LabelSelector,
        pod_selector: &LabelSelector,
    ) -> Result<(), GraphError> {
        let n = self.graph.upsert(NETWORKING_API_VERSION, "NetworkPolicy", &obj.metadata);

        let namespaces = self.reader.list_namespaces(&namespace_selector.selector()?)?;
        for namespace in &namespaces {
            let selector = pod_selector.selector()?;
            let pods = self.reader.list_pods(
                &namespace.metadata.name,
                &selector,
                FIELD_SELECTOR_RUNNING,
            )?;
            for pod in &pods {
                let p = self.pod(pod);
                self.policy_relationship(&n, policy_type, &p);
            }
        }

        Ok(())
    }

    fn peer_namespace_selector(
        &mut self,
        obj: &NetworkPolicy,
        policy_type: PolicyType,
        namespace_selector: &LabelSelector,
    ) -> Result<(), GraphError> {
        let n = self.graph.upsert(NETWORKING_API_VERSION, "NetworkPolicy", &obj.metadata);

        let namespaces = self.reader.list_namespaces(&namespace_selector.selector()?)?;
        for namespace in &namespaces {
            let ns = self.namespace(namespace);
            let edge = self.policy_relationship(&n, policy_type, &ns);
            // Compound-edge hint so renderers can clip the edge at the
            // namespace's visual boundary.
            let boundary = format!("cluster_{}", namespace.metadata.name);
            match policy_type {
                PolicyType::Ingress => self.graph.attribute(edge, "ltail", &boundary),
                PolicyType::Egress => self.graph.attribute(edge, "lhead", &boundary),
            }
        }

        Ok(())
    }

    fn peer_pod_selector(
        &mut self,
        obj: &NetworkPolicy,
        policy_type: PolicyType,
        pod_selector: &LabelSelector,
    ) -> Result<(), GraphError> {
        let n = self.graph.upsert(NETWORKING_API_VERSION, "NetworkPolicy", &obj.metadata);

        let selector = pod_selector.selector()?;
        let pods =
            self.reader.list_pods(&obj.metadata.namespace, &selector, FIELD_SELECTOR_RUNNING)?;
        for pod in &pods {
            let p = self.pod(pod);
            self.policy_relationship(&n, policy_type, &p);
        }

        Ok(())
    }

    /// Add an IP block node, keyed by the CIDR string.
    pub(crate) fn ip_block(&mut self, cidr: &str) -> Uid {
        let meta = Metadata {
            uid: derive_uid([cidr]).0,
            name: cidr.to_string(),
            ..Metadata::default()
        };
        self.graph.upsert(NETWORKING_API_VERSION, "IPBlock", &meta)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::BatchReader;
    use crate::graph::{build, derive_uid, Uid};
    use serde_json::json;

    fn running_pod(name: &str, namespace: &str, uid: &str, app: &str) -> serde_json::Value {
        json!({
            "apiVersion": "v1", "kind": "Pod",
            "metadata": {"name": name, "namespace": namespace, "uid": uid,
                         "labels": {"app": app}},
            "spec": {"containers": []},
            "status": {"phase": "Running"}
        })
    }

    #[test]
    fn empty_ingress_peer_list_allows_any_pod() {
        // Policy with one ingress rule and no peers: the synthetic
        // empty-selector peer matches every running pod in the namespace.
        let objects = vec![
            running_pod("web-0", "default", "pod-1", "web"),
            json!({
                "apiVersion": "v1", "kind": "Pod",
                "metadata": {"name": "web-1", "namespace": "default", "uid": "pod-2",
                             "labels": {"app": "web"}},
                "spec": {"containers": []},
                "status": {"phase": "Pending"}
            }),
            json!({
                "apiVersion": "networking.k8s.io/v1", "kind": "NetworkPolicy",
                "metadata": {"name": "allow-all", "namespace": "default", "uid": "np-1"},
                "spec": {
                    "podSelector": {"matchLabels": {"app": "web"}},
                    "ingress": [{}]
                }
            }),
        ];
        let reader = BatchReader::new(&objects);
        let (graph, errors) = build(&reader, &objects).unwrap();
        assert!(errors.is_empty());

        // Running pod only; edge points peer → policy.
        let ingress_edges: Vec<_> = graph
            .relationships()
            .iter()
            .filter(|r| r.label == "Ingress" && r.to == Uid("np-1".into()))
            .collect();
        assert_eq!(ingress_edges.len(), 1);
        assert_eq!(ingress_edges[0].from, Uid("pod-1".into()));
        assert_eq!(ingress_edges[0].attr.get("color").map(String::as_str), Some("#34A853"));
        assert_eq!(ingress_edges[0].attr.get("style").map(String::as_str), Some("dashed"));
        // The pending pod is in the graph (it was in the batch) but the
        // peer resolution must not have matched it.
        let pending = Uid("pod-2".into());
        assert!(!graph
            .relationships()
            .iter()
            .any(|r| r.label == "Ingress" && (r.from == pending || r.to == pending)));
    }

    #[test]
    fn egress_peer_edges_point_away_from_policy() {
        let objects = vec![
            running_pod("db-0", "default", "pod-9", "db"),
            json!({
                "apiVersion": "networking.k8s.io/v1", "kind": "NetworkPolicy",
                "metadata": {"name": "to-db", "namespace": "default", "uid": "np-1"},
                "spec": {
                    "podSelector": {"matchLabels": {"app": "none"}},
                    "egress": [{"to": [{"podSelector": {"matchLabels": {"app": "db"}}}]}]
                }
            }),
        ];
        let reader = BatchReader::new(&objects);
        let (graph, errors) = build(&reader, &objects).unwrap();
        assert!(errors.is_empty());

        let edge = graph
            .relationships()
            .iter()
            .find(|r| r.label == "Egress" && r.from == Uid("np-1".into()))
            .unwrap();
        assert_eq!(edge.to, Uid("pod-9".into()));
        assert_eq!(edge.attr.get("color").map(String::as_str), Some("#EA4335"));
    }

    #[test]
    fn namespace_selector_peer_links_namespaces_with_boundary_hint() {
        let objects = vec![
            json!({
                "apiVersion": "v1", "kind": "Namespace",
                "metadata": {"name": "prod", "labels": {"env": "prod"}}
            }),
            json!({
                "apiVersion": "networking.k8s.io/v1", "kind": "NetworkPolicy",
                "metadata": {"name": "from-prod", "namespace": "default", "uid": "np-1"},
                "spec": {
                    "podSelector": {},
                    "ingress": [{"from": [{"namespaceSelector": {"matchLabels": {"env": "prod"}}}]}]
                }
            }),
        ];
        let reader = BatchReader::new(&objects);
        let (graph, errors) = build(&reader, &objects).unwrap();
        assert!(errors.is_empty());

        let edge = graph
            .relationships()
            .iter()
            .find(|r| r.from == Uid("prod".into()) && r.to == Uid("np-1".into()))
            .unwrap();
        assert_eq!(edge.label, "Ingress");
        assert_eq!(edge.attr.get("ltail").map(String::as_str), Some("cluster_prod"));
    }

    #[test]
    fn combined_namespace_and_pod_selector_matches_pods_in_selected_namespaces() {
        let objects = vec![
            json!({
                "apiVersion": "v1", "kind": "Namespace",
                "metadata": {"name": "prod", "labels": {"env": "prod"}}
            }),
            running_pod("api-0", "prod", "pod-5", "api"),
            running_pod("api-9", "staging", "pod-6", "api"),
            json!({
                "apiVersion": "networking.k8s.io/v1", "kind": "NetworkPolicy",
                "metadata": {"name": "from-prod-api", "namespace": "default", "uid": "np-1"},
                "spec": {
                    "podSelector": {},
                    "ingress": [{"from": [{
                        "namespaceSelector": {"matchLabels": {"env": "prod"}},
                        "podSelector": {"matchLabels": {"app": "api"}}
                    }]}]
                }
            }),
        ];
        let reader = BatchReader::new(&objects);
        let (graph, errors) = build(&reader, &objects).unwrap();
        assert!(errors.is_empty());

        let peer_edges: Vec<_> = graph
            .relationships()
            .iter()
            .filter(|r| r.label == "Ingress" && r.to == Uid("np-1".into()))
            .collect();
        assert_eq!(peer_edges.len(), 1);
        assert_eq!(peer_edges[0].from, Uid("pod-5".into()));
    }

    #[test]
    fn ip_block_peer_creates_synthetic_cidr_node() {
        let objects = vec![json!({
            "apiVersion": "networking.k8s.io/v1", "kind": "NetworkPolicy",
            "metadata": {"name": "from-cidr", "namespace": "default", "uid": "np-1"},
            "spec": {
                "podSelector": {},
                "ingress": [{"from": [{"ipBlock": {"cidr": "10.0.0.0/8"}}]}]
            }
        })];
        let reader = BatchReader::new(&objects);
        let (graph, errors) = build(&reader, &objects).unwrap();
        assert!(errors.is_empty());

        let block = graph.node(&derive_uid(["10.0.0.0/8"])).unwrap();
        assert_eq!(block.kind, "IPBlock");
        assert_eq!(block.name, "10.0.0.0/8");
        let edge = graph
            .relationships()
            .iter()
            .find(|r| r.from == block.uid && r.to == Uid("np-1".into()))
            .unwrap();
        assert_eq!(edge.label, "Ingress");
    }

    #[test]
    fn invalid_selector_operator_is_reported_but_keeps_the_policy_node() {
        let objects = vec![json!({
            "apiVersion": "networking.k8s.io/v1", "kind": "NetworkPolicy",
            "metadata": {"name": "bad", "namespace": "default", "uid": "np-1"},
            "spec": {
                "podSelector": {"matchExpressions": [{"key": "a", "operator": "Near", "values": []}]}
            }
        })];
        let reader = BatchReader::new(&objects);
        let (graph, errors) = build(&reader, &objects).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(graph.node(&Uid("np-1".into())).is_some());
    }

    #[test]
    fn ingress_backends_feed_the_ingress_and_hosts_hang_off_it() {
        let objects = vec![
            json!({
                "apiVersion": "v1", "kind": "Service",
                "metadata": {"name": "web", "namespace": "default", "uid": "svc-1"},
                "spec": {"type": "ClusterIP"}
            }),
            json!({
                "apiVersion": "v1", "kind": "Endpoints",
                "metadata": {"name": "web", "namespace": "default", "uid": "ep-1"},
                "subsets": []
            }),
            json!({
                "apiVersion": "networking.k8s.io/v1", "kind": "Ingress",
                "metadata": {"name": "edge", "namespace": "default", "uid": "ing-1"},
                "spec": {"rules": [{
                    "host": "shop.example.com",
                    "http": {"paths": [{"path": "/", "backend": {"service": {"name": "web"}}}]}
                }]}
            }),
        ];
        let reader = BatchReader::new(&objects);
        let (graph, errors) = build(&reader, &objects).unwrap();
        assert!(errors.is_empty());

        // backend → ingress
        let backend_edge = graph
            .relationships()
            .iter()
            .find(|r| r.from == Uid("svc-1".into()) && r.to == Uid("ing-1".into()))
            .unwrap();
        assert_eq!(backend_edge.label, "Ingress");

        // ingress → host
        let host_uid = derive_uid(["shop.example.com"]);
        let host_edge = graph
            .relationships()
            .iter()
            .find(|r| r.from == Uid("ing-1".into()) && r.to == host_uid)
            .unwrap();
        assert_eq!(host_edge.label, "Ingress");
        assert_eq!(graph.node(&host_uid).unwrap().kind, "Host");
    }

    #[test]
    fn ingress_resource_backend_uses_typed_reference() {
        let objects = vec![json!({
            "apiVersion": "networking.k8s.io/v1", "kind": "Ingress",
            "metadata": {"name": "edge", "namespace": "default", "uid": "ing-1"},
            "spec": {"rules": [{
                "host": "shop.example.com",
                "http": {"paths": [{"path": "/", "backend": {
                    "resource": {"apiGroup": "k8s.example.com", "kind": "StorageBucket", "name": "assets"}
                }}]}
            }]}
        })];
        let reader = BatchReader::new(&objects);
        let (graph, errors) = build(&reader, &objects).unwrap();
        assert!(errors.is_empty());

        let bucket_uid = derive_uid(["k8s.example.com", "StorageBucket", "assets"]);
        let bucket = graph.node(&bucket_uid).unwrap();
        assert_eq!(bucket.kind, "StorageBucket");
        assert_eq!(bucket.namespace, "default");
        assert!(graph
            .relationships()
            .iter()
            .any(|r| r.from == bucket_uid && r.to == Uid("ing-1".into())));
    }

    #[test]
    fn ingress_with_missing_backend_service_keeps_its_node() {
        let objects = vec![json!({
            "apiVersion": "networking.k8s.io/v1", "kind": "Ingress",
            "metadata": {"name": "edge", "namespace": "default", "uid": "ing-1"},
            "spec": {"rules": [{
                "host": "shop.example.com",
                "http": {"paths": [{"path": "/", "backend": {"service": {"name": "ghost"}}}]}
            }]}
        })];
        let reader = BatchReader::new(&objects);
        let (graph, errors) = build(&reader, &objects).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(graph.node(&Uid("ing-1".into())).is_some());
    }
}
