//! Property extraction and type coercion for matched resources.
//!
//! The normalizer is a single function-shaped seam between the planner
//! and the output records, so callers can decorate or replace it
//! without touching the executor.

use crate::query::model::{Primitive, Subquery};
#[cfg(test)]
use crate::query::model::Property;
use crate::query::result::{Record, TypedValue};
use crate::redfish::view::ResourceView;
use chrono::DateTime;
use serde_json::Value;
use tracing::warn;

/// Produces one output record from a matched resource, or a skip.
///
/// Implementations must be stateless or internally synchronized; the
/// planner treats them as read-only.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, view: &ResourceView, subquery: &Subquery) -> Option<Record>;
}

/// Walk a dot-separated property path into a JSON object.
fn resolve_path<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = json;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Coerce a JSON value to the property's declared primitive.
fn coerce(value: &Value, primitive: Primitive) -> Option<TypedValue> {
    match primitive {
        Primitive::Boolean => value.as_bool().map(TypedValue::Boolean),
        Primitive::Int64 => value.as_i64().map(TypedValue::Int64),
        Primitive::String => value.as_str().map(|s| TypedValue::String(s.to_string())),
        Primitive::Double => value.as_f64().map(TypedValue::Double),
        Primitive::DateTimeOffset => value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(TypedValue::DateTimeOffset),
    }
}

/// Default normalizer: extracts the subquery's declared properties.
///
/// Absent properties are omitted from the record; values that do not
/// coerce to their declared type are dropped with a warning. A record
/// that ends up with no properties at all is skipped.
#[derive(Debug, Default)]
pub struct PropertyNormalizer;

impl Normalizer for PropertyNormalizer {
    fn normalize(&self, view: &ResourceView, subquery: &Subquery) -> Option<Record> {
        let mut record = Record::new();
        for property in &subquery.properties {
            let Some(value) = resolve_path(view.json(), &property.path) else {
                continue;
            };
            match coerce(value, property.primitive) {
                Some(typed) => {
                    record.insert(property.output_key().to_string(), typed);
                }
                None => warn!(
                    subquery_id = %subquery.subquery_id,
                    property = %property.path,
                    declared = ?property.primitive,
                    uri = view.uri(),
                    "property does not coerce to its declared type, dropped"
                ),
            }
        }
        if record.is_empty() {
            return None;
        }
        Some(record)
    }
}

/// Decorator that stamps the matched resource's URI into each record
/// under `@odata.id`, so consumers can locate the source resource.
pub struct LocationNormalizer<N> {
    inner: N,
}

impl<N> LocationNormalizer<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

impl<N: Normalizer> Normalizer for LocationNormalizer<N> {
    fn normalize(&self, view: &ResourceView, subquery: &Subquery) -> Option<Record> {
        let mut record = self.inner.normalize(view, subquery)?;
        record.insert(
            "@odata.id".to_string(),
            TypedValue::String(view.uri().to_string()),
        );
        Some(record)
    }
}
