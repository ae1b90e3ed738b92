//! Redfish service access — transport, response caching, and
//! lazily-navigable resource views.

pub mod cache;
pub mod transport;
pub mod view;

use transport::{Transport, TransportError};
use view::ResourceView;

/// A Redfish service: a transport plus its service root.
///
/// The transport may be raw HTTP, a cached decorator, or an in-memory
/// mock; the query engine is oblivious to which.
pub struct RedfishService {
    transport: Box<dyn Transport>,
}

impl RedfishService {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// View over the service root resource.
    pub fn root(&self) -> Result<ResourceView<'_>, TransportError> {
        ResourceView::root(self.transport.as_ref())
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::MockRedfishService;

    #[test]
    fn test_service_root() {
        let service = RedfishService::new(MockRedfishService::chassis_mockup());
        let root = service.root().unwrap();
        assert_eq!(root.uri(), "/redfish/v1");
    }

    #[test]
    fn test_service_root_unreachable() {
        let service = RedfishService::new(transport::NullTransport);
        assert!(service.root().is_err());
    }
}
