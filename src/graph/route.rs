//! Producer for the route extension group.
use super::{Builder, Uid, ROUTE_API_VERSION};
use crate::errors::GraphError;
use crate::resources::Route;

impl<'a> Builder<'a> {
    /// Add a Route and link it to its target Service.
    ///
    /// # Errors
    /// A failed Service lookup; the route node itself is already in the
    /// store by then.
    pub(crate) fn route(&mut self, obj: &Route) -> Result<Uid, GraphError> {
        let n = self.graph.upsert(ROUTE_API_VERSION, "Route", &obj.metadata);

        let service = self.reader.get_service(&obj.metadata.namespace, &obj.spec.to.name)?;
        let s = self.service(&service)?;
        self.graph.relationship(&n, "Route", &s);

        Ok(n)
    }
}
