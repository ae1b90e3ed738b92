//! The deduplicating query planner / executor.
//!
//! One `execute` call walks the resource tree breadth-first, driving
//! every subquery handle together. At each node the demand of all live
//! handles is coalesced by next step name, so a child shared by N
//! subqueries is fetched once per branch, not N times. Handles move by
//! value through the recursion: each sibling branch owns its cursors.

use crate::query::model::Query;
use crate::query::normalize::Normalizer;
use crate::query::path::{PredicateOutcome, SubqueryHandle};
use crate::query::result::QueryResult;
use crate::redfish::view::ResourceView;
use crate::time::Clock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Cooperative cancellation flag.
///
/// The planner checks it between qualify iterations and returns early
/// with a partial result once set.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Handles grouped by the node name each wants fetched next.
///
/// BTree order keeps traversal deterministic for identical inputs.
type NodeToHandles = BTreeMap<String, Vec<SubqueryHandle>>;

/// Compiled execution plan for one query.
pub struct QueryPlanner {
    query_id: String,
    handles: Vec<SubqueryHandle>,
    normalizer: Arc<dyn Normalizer>,
}

impl QueryPlanner {
    /// Compile `query` into a plan.
    ///
    /// Subqueries whose path fails to compile are logged and dropped;
    /// their siblings are unaffected.
    pub fn new(query: Query, normalizer: Arc<dyn Normalizer>) -> Self {
        let mut handles = Vec::with_capacity(query.subqueries.len());
        for subquery in query.subqueries {
            let subquery_id = subquery.subquery_id.clone();
            match SubqueryHandle::compile(subquery) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(%subquery_id, error = %e, "dropping uncompilable subquery")
                }
            }
        }
        Self {
            query_id: query.query_id,
            handles,
            normalizer,
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Execute the plan against `root`, reading start/end timestamps
    /// from `clock`. Always returns a result; per-branch failures are
    /// logged and absorbed.
    pub fn execute(&self, root: &ResourceView, clock: &dyn Clock) -> QueryResult {
        self.execute_cancellable(root, clock, &CancelToken::new())
    }

    /// Like [`QueryPlanner::execute`], returning early with a partial
    /// result if `cancel` fires mid-traversal.
    pub fn execute_cancellable(
        &self,
        root: &ResourceView,
        clock: &dyn Clock,
        cancel: &CancelToken,
    ) -> QueryResult {
        let mut result = self.result_shell(clock);
        self.run_recursive(root, self.handles.clone(), &mut result, cancel);
        result.end_timestamp = Some(clock.now());
        result
    }

    /// Result carrying the query id, a start timestamp, and an empty
    /// bucket per live subquery, before any traversal.
    ///
    /// Also serves as the completed result when the service root is
    /// unreachable (the caller stamps the end timestamp).
    pub fn result_shell(&self, clock: &dyn Clock) -> QueryResult {
        let mut result = QueryResult::new(self.query_id.clone());
        result.start_timestamp = Some(clock.now());
        for handle in &self.handles {
            result.ensure_bucket(handle.subquery());
        }
        result
    }

    /// Pair each node name with the handles that demand it next.
    fn dedupe(handles: Vec<SubqueryHandle>) -> NodeToHandles {
        let mut node_to_handles = NodeToHandles::new();
        for handle in handles {
            if let Some(node) = handle.next_node() {
                node_to_handles
                    .entry(node.to_string())
                    .or_default()
                    .push(handle);
            }
        }
        node_to_handles
    }

    fn run_recursive(
        &self,
        view: &ResourceView,
        handles: Vec<SubqueryHandle>,
        result: &mut QueryResult,
        cancel: &CancelToken,
    ) {
        let node_to_handles = Self::dedupe(handles);
        if node_to_handles.is_empty() {
            return;
        }
        self.dispatch(view, node_to_handles, result, cancel);
    }

    /// Fetch each unique demanded child once and qualify the handles
    /// that asked for it.
    fn dispatch(
        &self,
        view: &ResourceView,
        node_to_handles: NodeToHandles,
        result: &mut QueryResult,
        cancel: &CancelToken,
    ) {
        for (node, handles) in node_to_handles {
            if cancel.is_cancelled() {
                return;
            }

            let child = match view.child(&node) {
                Ok(Some(child)) => child,
                Ok(None) => {
                    debug!(parent = view.uri(), node = %node, "node absent, branch ends");
                    continue;
                }
                Err(e) => {
                    warn!(parent = view.uri(), node = %node, error = %e, "fetch failed, skipping branch");
                    continue;
                }
            };

            if child.is_iterable() {
                for member in child.members() {
                    if !member.is_object() {
                        continue;
                    }
                    self.qualify(&member, handles.clone(), result, cancel);
                }
            } else if child.is_object() {
                self.qualify(&child, handles, result, cancel);
            }
            // Scalar children end the branch silently.
        }
    }

    /// Run every handle's current predicate against one resource.
    ///
    /// Exactly one of three things happens per handle: it is dropped
    /// (predicate rejected), it emits a record (accepted at the last
    /// step), or it continues into the recursion (accepted early).
    fn qualify(
        &self,
        member: &ResourceView,
        handles: Vec<SubqueryHandle>,
        result: &mut QueryResult,
        cancel: &CancelToken,
    ) {
        let mut qualified = Vec::new();
        for mut handle in handles {
            if cancel.is_cancelled() {
                return;
            }
            match handle.filter(member) {
                PredicateOutcome::EndByPredicate => {}
                PredicateOutcome::EndOfPath => {
                    if let Some(record) = self.normalizer.normalize(member, handle.subquery()) {
                        result.append(handle.subquery(), record);
                    }
                }
                PredicateOutcome::Continue => qualified.push(handle),
            }
        }
        if qualified.is_empty() {
            return;
        }
        self.run_recursive(member, qualified, result, cancel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::model::{Primitive, Property, Subquery};
    use crate::query::normalize::PropertyNormalizer;
    use crate::query::result::TypedValue;
    use crate::testing::mock::MockRedfishService;
    use crate::time::FakeClock;

    fn subquery(id: &str, path: &str, properties: &[(&str, Primitive)]) -> Subquery {
        Subquery {
            subquery_id: id.to_string(),
            root_subquery_ids: Vec::new(),
            path: path.to_string(),
            properties: properties
                .iter()
                .map(|(p, t)| Property {
                    path: p.to_string(),
                    name: None,
                    primitive: *t,
                })
                .collect(),
        }
    }

    fn planner(subqueries: Vec<Subquery>) -> QueryPlanner {
        QueryPlanner::new(
            Query {
                query_id: "Q".to_string(),
                subqueries,
            },
            Arc::new(PropertyNormalizer),
        )
    }

    #[test]
    fn test_single_step_collection_match() {
        let service = MockRedfishService::chassis_mockup();
        let planner = planner(vec![subquery(
            "S1",
            "/Chassis[*]",
            &[("Name", Primitive::String)],
        )]);

        let result = planner.execute(&service.view("/redfish/v1"), &FakeClock::default());
        let records = result.records("S1");
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0]["Name"],
            TypedValue::String("chassis".to_string())
        );
        assert_eq!(result.query_ids, vec!["Q".to_string()]);
    }

    #[test]
    fn test_shared_prefix_fetched_once() {
        let service = MockRedfishService::chassis_mockup();
        let planner = planner(vec![
            subquery("Names", "/Chassis[*]", &[("Name", Primitive::String)]),
            subquery("Ids", "/Chassis[*]", &[("Id", Primitive::String)]),
        ]);

        let result = planner.execute(&service.view("/redfish/v1"), &FakeClock::default());
        assert_eq!(result.records("Names").len(), 1);
        assert_eq!(result.records("Ids").len(), 1);
        assert_eq!(service.count("/redfish/v1/Chassis"), 1);
        assert_eq!(service.count("/redfish/v1/Chassis/chassis"), 1);
    }

    #[test]
    fn test_uncompilable_subquery_is_dropped_without_bucket() {
        let service = MockRedfishService::chassis_mockup();
        let planner = planner(vec![
            subquery("Bad", "/Chassis*", &[("Name", Primitive::String)]),
            subquery("Good", "/Chassis[*]", &[("Name", Primitive::String)]),
        ]);

        let result = planner.execute(&service.view("/redfish/v1"), &FakeClock::default());
        assert!(!result.records_by_subquery_id.contains_key("Bad"));
        assert_eq!(result.records("Good").len(), 1);
    }

    #[test]
    fn test_empty_collection_keeps_bucket() {
        let service = MockRedfishService::empty_chassis_mockup();
        let planner = planner(vec![subquery(
            "S1",
            "/Chassis[*]",
            &[("Name", Primitive::String)],
        )]);

        let result = planner.execute(&service.view("/redfish/v1"), &FakeClock::default());
        assert!(result.records_by_subquery_id.contains_key("S1"));
        assert!(result.records("S1").is_empty());
    }

    #[test]
    fn test_timestamps_come_from_injected_clock() {
        let service = MockRedfishService::chassis_mockup();
        let planner = planner(Vec::new());
        let clock = FakeClock::default();

        let result = planner.execute(&service.view("/redfish/v1"), &clock);
        assert_eq!(result.start_timestamp, Some(clock.now()));
        assert_eq!(result.end_timestamp, Some(clock.now()));
        assert!(result.end_timestamp >= result.start_timestamp);
    }

    #[test]
    fn test_cancelled_token_yields_partial_result() {
        let service = MockRedfishService::chassis_mockup();
        let planner = planner(vec![subquery(
            "S1",
            "/Chassis[*]",
            &[("Name", Primitive::String)],
        )]);

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = planner.execute_cancellable(
            &service.view("/redfish/v1"),
            &FakeClock::default(),
            &cancel,
        );

        assert!(result.records("S1").is_empty());
        assert!(result.start_timestamp.is_some());
        assert!(result.end_timestamp.is_some());
    }
}
