//! Lazily-navigable views over Redfish resources.
//!
//! A [`ResourceView`] is a handle over one node of the resource tree:
//! a singleton object, an iterable collection, or a scalar. Navigation
//! never copies the tree — child lookup wraps the inline value, or
//! resolves a bare `@odata.id` reference through the transport. Every
//! view knows the URI it came from, with JSON-pointer fragments for
//! inline descent.

use crate::redfish::transport::{Transport, TransportError};
use serde_json::Value;
use tracing::warn;

/// Key marking a Redfish resource reference.
const ODATA_ID: &str = "@odata.id";

/// Member list of a Redfish resource collection.
const MEMBERS: &str = "Members";

/// A view over one node in the resource tree.
pub struct ResourceView<'t> {
    transport: &'t dyn Transport,
    uri: String,
    json: Value,
}

/// If `value` is a bare, unexpanded reference (`{"@odata.id": uri}` and
/// nothing else), return the target URI.
fn reference_uri(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(ODATA_ID)?.as_str()
}

impl<'t> ResourceView<'t> {
    /// View over the service root.
    pub fn root(transport: &'t dyn Transport) -> Result<Self, TransportError> {
        let uri = transport.root_uri().to_string();
        Self::fetch(transport, uri)
    }

    /// Fetch `uri` through the transport and wrap the body.
    pub fn fetch(transport: &'t dyn Transport, uri: String) -> Result<Self, TransportError> {
        let response = transport.get(&uri)?;
        if !response.is_success() {
            return Err(TransportError::Status {
                code: response.code,
                uri,
            });
        }
        let json = response
            .body
            .as_json()
            .cloned()
            .ok_or_else(|| TransportError::NotJson { uri: uri.clone() })?;
        Ok(Self {
            transport,
            uri,
            json,
        })
    }

    fn wrap(&self, uri: String, json: Value) -> ResourceView<'t> {
        ResourceView {
            transport: self.transport,
            uri,
            json,
        }
    }

    /// URI this view was resolved from. Inline values carry a
    /// JSON-pointer fragment under their parent's URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The JSON value backing this view.
    pub fn json(&self) -> &Value {
        &self.json
    }

    /// Whether this resource is a JSON object.
    pub fn is_object(&self) -> bool {
        self.json.is_object()
    }

    /// Whether this resource can be iterated: a JSON array, or a
    /// Redfish collection (an object with a `Members` array).
    pub fn is_iterable(&self) -> bool {
        if self.json.is_array() {
            return true;
        }
        self.json
            .get(MEMBERS)
            .is_some_and(Value::is_array)
    }

    /// Look up the child resource `name`.
    ///
    /// Returns `Ok(None)` when the member is absent. A bare reference
    /// is resolved through the transport; anything else is wrapped in
    /// place.
    pub fn child(&self, name: &str) -> Result<Option<ResourceView<'t>>, TransportError> {
        let value = match self.json.get(name) {
            Some(v) => v,
            None => return Ok(None),
        };
        if let Some(target) = reference_uri(value) {
            return Self::fetch(self.transport, target.to_string()).map(Some);
        }
        Ok(Some(self.wrap(self.fragment_uri(name), value.clone())))
    }

    /// Views over the members of an iterable resource, in underlying
    /// order. Members that fail to resolve are logged and skipped; the
    /// rest of the collection is unaffected.
    pub fn members(&self) -> Vec<ResourceView<'t>> {
        let entries: &[Value] = if let Some(array) = self.json.as_array() {
            array
        } else if let Some(array) = self.json.get(MEMBERS).and_then(Value::as_array) {
            array
        } else {
            return Vec::new();
        };

        let mut members = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if let Some(target) = reference_uri(entry) {
                match Self::fetch(self.transport, target.to_string()) {
                    Ok(view) => members.push(view),
                    Err(e) => {
                        warn!(uri = target, error = %e, "skipping unreachable collection member");
                    }
                }
            } else {
                members.push(self.wrap(self.fragment_uri(&index.to_string()), entry.clone()));
            }
        }
        members
    }

    /// URI for an inline descendant, e.g. `/redfish/v1/Chassis/ch#/Status`.
    fn fragment_uri(&self, name: &str) -> String {
        if self.uri.contains('#') {
            format!("{}/{}", self.uri, name)
        } else {
            format!("{}#/{}", self.uri, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::MockRedfishService;

    #[test]
    fn test_root_view_is_object() {
        let service = MockRedfishService::chassis_mockup();
        let root = ResourceView::root(&service).unwrap();
        assert!(root.is_object());
        assert!(!root.is_iterable());
        assert_eq!(root.uri(), "/redfish/v1");
    }

    #[test]
    fn test_child_resolves_reference_through_transport() {
        let service = MockRedfishService::chassis_mockup();
        let root = ResourceView::root(&service).unwrap();
        let chassis = root.child("Chassis").unwrap().unwrap();
        assert!(chassis.is_iterable());
        assert_eq!(chassis.uri(), "/redfish/v1/Chassis");
        assert_eq!(service.count("/redfish/v1/Chassis"), 1);
    }

    #[test]
    fn test_child_wraps_inline_object_without_fetching() {
        let service = MockRedfishService::chassis_mockup();
        let root = ResourceView::root(&service).unwrap();
        let member = root
            .child("Chassis")
            .unwrap()
            .unwrap()
            .members()
            .remove(0);
        let fetched_before = service.requests().len();

        let status = member.child("Status").unwrap().unwrap();
        assert!(status.is_object());
        assert_eq!(status.uri(), "/redfish/v1/Chassis/chassis#/Status");
        assert_eq!(service.requests().len(), fetched_before);
    }

    #[test]
    fn test_absent_child_is_none() {
        let service = MockRedfishService::chassis_mockup();
        let root = ResourceView::root(&service).unwrap();
        assert!(root.child("Managers").unwrap().is_none());
    }

    #[test]
    fn test_collection_members_resolve_once_each() {
        let service = MockRedfishService::chassis_mockup();
        let root = ResourceView::root(&service).unwrap();
        let chassis = root.child("Chassis").unwrap().unwrap();
        let members = chassis.members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].uri(), "/redfish/v1/Chassis/chassis");
        assert_eq!(service.count("/redfish/v1/Chassis/chassis"), 1);
    }

    #[test]
    fn test_plain_array_members_are_inline() {
        let mut service = MockRedfishService::new();
        service.add_resource(
            "/redfish/v1",
            serde_json::json!({"Fans": [{"Reading": 4200}, "broken", {"Reading": 3900}]}),
        );
        let root = ResourceView::root(&service).unwrap();
        let fans = root.child("Fans").unwrap().unwrap();
        assert!(fans.is_iterable());
        assert!(!fans.is_object());

        let members = fans.members();
        assert_eq!(members.len(), 3);
        assert!(members[0].is_object());
        // Scalar elements still come back as views; callers decide.
        assert!(!members[1].is_object());
    }

    #[test]
    fn test_unreachable_member_is_skipped() {
        let mut service = MockRedfishService::new();
        service.add_resource(
            "/redfish/v1/Chassis",
            serde_json::json!({
                "Members": [
                    {"@odata.id": "/redfish/v1/Chassis/ok"},
                    {"@odata.id": "/redfish/v1/Chassis/gone"}
                ],
                "Members@odata.count": 2
            }),
        );
        service.add_resource("/redfish/v1/Chassis/ok", serde_json::json!({"Id": "ok"}));

        let chassis = service.view("/redfish/v1/Chassis");
        let members = chassis.members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].uri(), "/redfish/v1/Chassis/ok");
    }
}
