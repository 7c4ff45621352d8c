//! Producers for the core API group.
use super::{derive_uid, Builder, Uid, CORE_API_VERSION, SYNTHETIC_API_VERSION};
use crate::errors::GraphError;
use crate::resources::{
    Container, Endpoints, Metadata, Namespace, Node, ObjectReference, Pod, Service,
    TypedLocalObjectReference,
};

impl<'a> Builder<'a> {
    /// Add a Namespace. Namespaces have no native uid requirement here: the
    /// name doubles as the uid so stubs created from a namespace string merge
    /// with the real object.
    pub(crate) fn namespace(&mut self, obj: &Namespace) -> Uid {
        let mut meta = obj.metadata.clone();
        meta.uid = meta.name.clone();
        meta.namespace = meta.name.clone();
        self.graph.upsert(CORE_API_VERSION, "Namespace", &meta)
    }

    /// Add a Pod and one child node per declared container.
    pub(crate) fn pod(&mut self, obj: &Pod) -> Uid {
        let n = self.graph.upsert(CORE_API_VERSION, "Pod", &obj.metadata);

        for container in &obj.spec.containers {
            let c = self.container(obj, container);
            self.graph.relationship(&n, "Container", &c);
        }

        n
    }

    /// Add a container child node, keyed by `(pod uid, container name)`.
    pub(crate) fn container(&mut self, pod: &Pod, container: &Container) -> Uid {
        let meta = Metadata {
            uid: derive_uid([pod.metadata.uid.as_str(), container.name.as_str()]).0,
            namespace: pod.metadata.namespace.clone(),
            name: container.name.clone(),
            ..Metadata::default()
        };
        self.graph.upsert(CORE_API_VERSION, "Container", &meta)
    }

    /// Add an Endpoints object and link every subset address target.
    pub(crate) fn endpoints(&mut self, obj: &Endpoints) -> Uid {
        let n = self.graph.upsert(CORE_API_VERSION, "Endpoints", &obj.metadata);

        for subset in &obj.subsets {
            for address in &subset.addresses {
                if let Some(target) = &address.target_ref {
                    let t = self.object_reference(target);
                    self.graph.relationship(&n, &target.kind, &t);
                }
            }
        }

        n
    }

    /// Add the node a reference points at, using its native identity.
    pub(crate) fn object_reference(&mut self, obj: &ObjectReference) -> Uid {
        let meta = Metadata {
            uid: obj.uid.clone(),
            name: obj.name.clone(),
            namespace: obj.namespace.clone(),
            ..Metadata::default()
        };
        self.graph.upsert(&obj.api_version, &obj.kind, &meta)
    }

    /// Add a typed local reference, keyed by `(group, kind, name)`.
    pub(crate) fn typed_local_object_reference(
        &mut self,
        obj: &TypedLocalObjectReference,
        namespace: &str,
    ) -> Uid {
        let meta = Metadata {
            uid: derive_uid([obj.api_group.as_str(), obj.kind.as_str(), obj.name.as_str()]).0,
            name: obj.name.clone(),
            namespace: namespace.to_string(),
            ..Metadata::default()
        };
        self.graph.upsert(&obj.api_group, &obj.kind, &meta)
    }

    /// Add a Service; derived edges depend on the service type.
    ///
    /// # Errors
    /// A failed Endpoints lookup for ClusterIP/LoadBalancer services; the
    /// service node itself is already in the store by then.
    pub(crate) fn service(&mut self, obj: &Service) -> Result<Uid, GraphError> {
        match obj.spec.service_type.as_str() {
            // An unset type defaults to ClusterIP server-side.
            "ClusterIP" | "LoadBalancer" | "" => self.service_backed_by_endpoints(obj),
            "ExternalName" => Ok(self.service_external_name(obj)),
            _ => Ok(self.graph.upsert(CORE_API_VERSION, "Service", &obj.metadata)),
        }
    }

    // ClusterIP and LoadBalancer services resolve through the same-named
    // Endpoints object in the service's namespace.
    fn service_backed_by_endpoints(&mut self, obj: &Service) -> Result<Uid, GraphError> {
        let n = self.graph.upsert(CORE_API_VERSION, "Service", &obj.metadata);

        let endpoints =
            self.reader.get_endpoints(&obj.metadata.namespace, &obj.metadata.name)?;
        let e = self.endpoints(&endpoints);
        self.graph.relationship(&n, "Endpoints", &e);

        Ok(n)
    }

    fn service_external_name(&mut self, obj: &Service) -> Uid {
        let n = self.graph.upsert(CORE_API_VERSION, "Service", &obj.metadata);

        let meta = Metadata {
            uid: derive_uid([obj.spec.external_name.as_str()]).0,
            name: obj.spec.external_name.clone(),
            ..Metadata::default()
        };
        let e = self.graph.upsert(CORE_API_VERSION, "ExternalName", &meta);
        self.graph.relationship(&n, "ExternalName", &e);

        n
    }

    /// Add a cluster member and one fact node per hardware/software fact.
    pub(crate) fn node(&mut self, obj: &Node) -> Uid {
        let n = self.graph.upsert(CORE_API_VERSION, "Node", &obj.metadata);

        let info = &obj.status.node_info;
        let facts = [
            ("Architecture", &info.architecture),
            ("Runtime", &info.container_runtime_version),
            ("Kernel", &info.kernel_version),
            ("OSImage", &info.os_image),
        ];
        for (kind, value) in facts {
            let meta = Metadata {
                uid: derive_uid([value.as_str()]).0,
                name: value.clone(),
                ..Metadata::default()
            };
            let f = self.graph.upsert(SYNTHETIC_API_VERSION, kind, &meta);
            self.graph.relationship(&n, kind, &f);
        }

        n
    }

    /// Add the singleton cluster root, named by the API host.
    ///
    /// # Errors
    /// None today; the signature matches the finalize contract, which treats
    /// a missing root as fatal.
    pub(crate) fn cluster(&mut self) -> Result<Uid, GraphError> {
        let host = self.reader.cluster_host();
        let meta = Metadata {
            uid: derive_uid([host.as_str()]).0,
            name: host,
            ..Metadata::default()
        };
        Ok(self.graph.upsert(SYNTHETIC_API_VERSION, "Cluster", &meta))
    }
}

#[cfg(test)]
mod tests {
    use crate::client::BatchReader;
    use crate::errors::GraphError;
    use crate::graph::{build, derive_uid, Builder, Graph, Uid};
    use crate::resources::{convert, Namespace};
    use serde_json::json;

    fn builder_graph(objects: &[serde_json::Value]) -> (Graph, Vec<GraphError>) {
        let reader = BatchReader::new(objects);
        build(&reader, objects).unwrap()
    }

    #[test]
    fn pod_with_two_containers() {
        let objects = vec![json!({
            "apiVersion": "v1", "kind": "Pod",
            "metadata": {"name": "web-0", "namespace": "default", "uid": "pod-1"},
            "spec": {"containers": [{"name": "web"}, {"name": "sidecar"}]}
        })];
        let (graph, errors) = builder_graph(&objects);
        assert!(errors.is_empty());

        let containers: Vec<_> = graph.nodes().filter(|n| n.kind == "Container").collect();
        assert_eq!(containers.len(), 2);
        for c in &containers {
            let expected = derive_uid(["pod-1", c.name.as_str()]);
            assert_eq!(c.uid, expected);
        }

        let container_edges: Vec<_> = graph
            .relationships()
            .iter()
            .filter(|r| r.label == "Container" && r.from == Uid("pod-1".into()))
            .collect();
        assert_eq!(container_edges.len(), 2);

        // Post-finalize, the pod hangs off its namespace node.
        let root = graph
            .relationships()
            .iter()
            .find(|r| r.to == Uid("pod-1".into()))
            .unwrap();
        let ns = graph.node(&root.from).unwrap();
        assert_eq!(ns.kind, "Namespace");
        assert_eq!(ns.name, "default");
    }

    #[test]
    fn endpoints_link_subset_address_targets() {
        let objects = vec![json!({
            "apiVersion": "v1", "kind": "Endpoints",
            "metadata": {"name": "web", "namespace": "default", "uid": "ep-1"},
            "subsets": [{"addresses": [
                {"ip": "10.0.0.1", "targetRef": {"kind": "Pod", "name": "web-0", "namespace": "default", "uid": "pod-1"}},
                {"ip": "10.0.0.2"}
            ]}]
        })];
        let (graph, errors) = builder_graph(&objects);
        assert!(errors.is_empty());

        let edge = graph
            .relationships()
            .iter()
            .find(|r| r.from == Uid("ep-1".into()))
            .unwrap();
        assert_eq!(edge.label, "Pod");
        assert_eq!(edge.to, Uid("pod-1".into()));
    }

    #[test]
    fn cluster_ip_service_links_endpoints() {
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
        ];
        let (graph, errors) = builder_graph(&objects);
        assert!(errors.is_empty());

        let edge = graph
            .relationships()
            .iter()
            .find(|r| r.from == Uid("svc-1".into()) && r.to == Uid("ep-1".into()))
            .unwrap();
        assert_eq!(edge.label, "Endpoints");
    }

    #[test]
    fn cluster_ip_service_without_endpoints_records_lookup_error() {
        let objects = vec![json!({
            "apiVersion": "v1", "kind": "Service",
            "metadata": {"name": "lonely", "namespace": "default", "uid": "svc-1"},
            "spec": {"type": "ClusterIP"}
        })];
        let (graph, errors) = builder_graph(&objects);
        assert_eq!(errors.len(), 1);
        // The service node survives the failed lookup.
        assert!(graph.node(&Uid("svc-1".into())).is_some());
    }

    #[test]
    fn external_name_service_links_synthetic_external_node() {
        let objects = vec![json!({
            "apiVersion": "v1", "kind": "Service",
            "metadata": {"name": "upstream", "namespace": "default", "uid": "svc-1"},
            "spec": {"type": "ExternalName", "externalName": "example.com"}
        })];
        let (graph, errors) = builder_graph(&objects);
        assert!(errors.is_empty());

        let external = graph.node(&derive_uid(["example.com"])).unwrap();
        assert_eq!(external.kind, "ExternalName");
        assert_eq!(external.name, "example.com");

        let edge = graph
            .relationships()
            .iter()
            .find(|r| r.from == Uid("svc-1".into()))
            .unwrap();
        assert_eq!(edge.label, "ExternalName");
        assert_eq!(edge.to, external.uid);
    }

    #[test]
    fn node_port_service_yields_no_edges() {
        let objects = vec![json!({
            "apiVersion": "v1", "kind": "Service",
            "metadata": {"name": "np", "namespace": "default", "uid": "svc-1"},
            "spec": {"type": "NodePort"}
        })];
        let (graph, errors) = builder_graph(&objects);
        assert!(errors.is_empty());
        assert!(graph.node(&Uid("svc-1".into())).is_some());
        let outgoing: Vec<_> = graph
            .relationships()
            .iter()
            .filter(|r| r.from == Uid("svc-1".into()))
            .collect();
        assert!(outgoing.is_empty());
    }

    #[test]
    fn cluster_member_gets_fact_nodes() {
        let objects = vec![json!({
            "apiVersion": "v1", "kind": "Node",
            "metadata": {"name": "worker-1", "uid": "node-1"},
            "status": {"nodeInfo": {
                "architecture": "amd64",
                "containerRuntimeVersion": "containerd://1.7.2",
                "kernelVersion": "6.1.0",
                "osImage": "Debian GNU/Linux 12"
            }}
        })];
        let (graph, errors) = builder_graph(&objects);
        assert!(errors.is_empty());

        for (kind, value) in [
            ("Architecture", "amd64"),
            ("Runtime", "containerd://1.7.2"),
            ("Kernel", "6.1.0"),
            ("OSImage", "Debian GNU/Linux 12"),
        ] {
            let fact = graph.node(&derive_uid([value])).unwrap();
            assert_eq!(fact.kind, kind);
            let edge = graph
                .relationships()
                .iter()
                .find(|r| r.from == Uid("node-1".into()) && r.to == fact.uid)
                .unwrap();
            assert_eq!(edge.label, kind);
        }
    }

    #[test]
    fn namespace_uid_is_its_name() {
        let value = json!({
            "apiVersion": "v1", "kind": "Namespace",
            "metadata": {"name": "prod", "labels": {"team": "core"}}
        });
        let obj: Namespace = convert(&value).unwrap();
        let reader = BatchReader::new(&[]);
        let mut b = Builder { graph: Graph::new(), reader: &reader };
        let uid = b.namespace(&obj);
        assert_eq!(uid, Uid("prod".into()));
        let node = b.graph.node(&uid).unwrap();
        assert_eq!(node.namespace, "prod");
        assert_eq!(node.labels.get("team").map(String::as_str), Some("core"));
    }
}
