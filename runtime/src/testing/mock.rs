//! In-memory mock Redfish service.
//!
//! Serves a URI → resource map through the [`Transport`] trait and
//! records every request, so tests can assert on fetch counts (e.g.
//! that a shared path prefix was fetched exactly once).

use crate::redfish::transport::{ResponseBody, Transport, TransportError, TransportResponse};
use crate::redfish::view::ResourceView;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Mock transport over an in-memory resource tree.
pub struct MockRedfishService {
    resources: HashMap<String, Value>,
    requests: Mutex<Vec<String>>,
}

impl MockRedfishService {
    /// An empty service; populate with [`MockRedfishService::add_resource`].
    pub fn new() -> Self {
        Self {
            resources: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The standard single-chassis mockup used across the test suite:
    /// a service root, a `Chassis` collection with one member, and the
    /// member resource itself.
    pub fn chassis_mockup() -> Self {
        let mut service = Self::new();
        service.add_resource(
            "/redfish/v1",
            json!({
                "@odata.id": "/redfish/v1",
                "Id": "RootService",
                "Name": "Root Service",
                "Chassis": {"@odata.id": "/redfish/v1/Chassis"}
            }),
        );
        service.add_resource(
            "/redfish/v1/Chassis",
            json!({
                "@odata.id": "/redfish/v1/Chassis",
                "Name": "Chassis Collection",
                "Members": [
                    {"@odata.id": "/redfish/v1/Chassis/chassis"}
                ],
                "Members@odata.count": 1
            }),
        );
        service.add_resource(
            "/redfish/v1/Chassis/chassis",
            json!({
                "@odata.id": "/redfish/v1/Chassis/chassis",
                "Id": "chassis",
                "Name": "chassis",
                "Status": {"State": "StandbyOffline", "Health": "OK"}
            }),
        );
        service
    }

    /// Like [`MockRedfishService::chassis_mockup`] but with an empty
    /// `Chassis` collection.
    pub fn empty_chassis_mockup() -> Self {
        let mut service = Self::chassis_mockup();
        service.add_resource(
            "/redfish/v1/Chassis",
            json!({
                "@odata.id": "/redfish/v1/Chassis",
                "Name": "Chassis Collection",
                "Members": [],
                "Members@odata.count": 0
            }),
        );
        service.resources.remove("/redfish/v1/Chassis/chassis");
        service
    }

    /// Register (or replace) the resource served at `uri`.
    pub fn add_resource(&mut self, uri: impl Into<String>, body: Value) {
        self.resources.insert(uri.into(), body);
    }

    /// Every URI requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// How many times `uri` has been requested.
    pub fn count(&self, uri: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| *r == uri)
            .count()
    }

    /// Resource map, for handing to the mock HTTP server.
    pub fn resources(&self) -> &HashMap<String, Value> {
        &self.resources
    }

    /// Test helper: a view over the resource at `uri`.
    ///
    /// Panics when the URI is not registered.
    pub fn view(&self, uri: &str) -> ResourceView<'_> {
        ResourceView::fetch(self, uri.to_string()).expect("resource not registered")
    }
}

impl Transport for MockRedfishService {
    fn get(&self, path: &str) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(path.to_string());
        match self.resources.get(path) {
            Some(body) => Ok(TransportResponse {
                code: 200,
                body: ResponseBody::Json(body.clone()),
                headers: HashMap::new(),
            }),
            None => Ok(TransportResponse {
                code: 404,
                body: ResponseBody::Json(json!({
                    "error": {
                        "code": "Base.1.0.GeneralError",
                        "message": format!("resource {path} does not exist")
                    }
                })),
                headers: HashMap::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_uri_answers_200() {
        let service = MockRedfishService::chassis_mockup();
        let resp = service.get("/redfish/v1").unwrap();
        assert_eq!(resp.code, 200);
        assert!(resp.body.as_json().is_some());
    }

    #[test]
    fn test_unknown_uri_answers_404() {
        let service = MockRedfishService::new();
        let resp = service.get("/redfish/v1/Missing").unwrap();
        assert_eq!(resp.code, 404);
    }

    #[test]
    fn test_request_log_preserves_order() {
        let service = MockRedfishService::chassis_mockup();
        service.get("/redfish/v1").unwrap();
        service.get("/redfish/v1/Chassis").unwrap();
        service.get("/redfish/v1").unwrap();
        assert_eq!(
            service.requests(),
            vec!["/redfish/v1", "/redfish/v1/Chassis", "/redfish/v1"]
        );
        assert_eq!(service.count("/redfish/v1"), 2);
    }
}
