//! Typed output records and the result assembler.
//!
//! Record emission is append-only: when the same subquery id matches
//! several resources (or several subqueries share an id), records
//! accumulate in one bucket in traversal order. Maps are BTree-backed
//! so serialized results are deterministic for identical inputs.

use crate::query::model::Subquery;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A normalized value, tagged by its primitive type on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    #[serde(rename = "BOOLEAN")]
    Boolean(bool),
    #[serde(rename = "INT64")]
    Int64(i64),
    #[serde(rename = "STRING")]
    String(String),
    #[serde(rename = "DOUBLE")]
    Double(f64),
    #[serde(rename = "DATE_TIME_OFFSET")]
    DateTimeOffset(DateTime<FixedOffset>),
}

/// One normalized record: output key → typed value.
pub type Record = BTreeMap<String, TypedValue>;

/// All records emitted for one subquery id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Grouping metadata copied verbatim from the subquery; the engine
    /// never interprets it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub root_subquery_ids: Vec<String>,
    pub records: Vec<Record>,
}

/// The assembled result of one query execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The originating query id, exactly once.
    pub query_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<DateTime<Utc>>,
    pub records_by_subquery_id: BTreeMap<String, RecordSet>,
}

impl QueryResult {
    pub fn new(query_id: impl Into<String>) -> Self {
        Self {
            query_ids: vec![query_id.into()],
            ..Self::default()
        }
    }

    /// Make sure a (possibly empty) bucket exists for `subquery`.
    pub fn ensure_bucket(&mut self, subquery: &Subquery) {
        self.records_by_subquery_id
            .entry(subquery.subquery_id.clone())
            .or_insert_with(|| RecordSet {
                root_subquery_ids: subquery.root_subquery_ids.clone(),
                records: Vec::new(),
            });
    }

    /// Append one record to `subquery`'s bucket.
    pub fn append(&mut self, subquery: &Subquery, record: Record) {
        self.ensure_bucket(subquery);
        self.records_by_subquery_id
            .get_mut(&subquery.subquery_id)
            .expect("bucket just ensured")
            .records
            .push(record);
    }

    /// Records for a subquery id; empty when the bucket is missing.
    pub fn records(&self, subquery_id: &str) -> &[Record] {
        self.records_by_subquery_id
            .get(subquery_id)
            .map(|set| set.records.as_slice())
            .unwrap_or(&[])
    }
}
