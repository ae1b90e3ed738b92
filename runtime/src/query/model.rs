//! The compiled, in-memory query model and its JSON wire form.
//!
//! A query is a set of subqueries, each pairing a path expression over
//! the resource tree with the properties to extract from matching
//! resources. Queries are immutable once parsed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Primitive types a property can be normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Primitive {
    Boolean,
    Int64,
    String,
    Double,
    DateTimeOffset,
}

/// A property to extract from a matched resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    /// Dot-separated path into the resource JSON, e.g. `Status.State`.
    pub path: String,
    /// Optional output key; the path is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared primitive type the value is coerced to.
    #[serde(rename = "type")]
    pub primitive: Primitive,
}

impl Property {
    /// Key under which this property appears in output records.
    pub fn output_key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }
}

/// One path expression plus the properties to extract from its matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subquery {
    /// Caller-chosen id; duplicates alias into one output bucket.
    pub subquery_id: String,
    /// Grouping metadata, preserved verbatim into the result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub root_subquery_ids: Vec<String>,
    /// Path expression, e.g. `/Chassis[*]/Thermal[*]`.
    pub path: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// A declarative platform query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub query_id: String,
    #[serde(default)]
    pub subqueries: Vec<Subquery>,
}

impl Query {
    /// Parse a query from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("malformed query document")
    }
}
