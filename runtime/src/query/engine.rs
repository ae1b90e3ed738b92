//! The query engine: compiled plans for a set of queries, executed
//! against one Redfish service.

use crate::query::model::Query;
use crate::query::normalize::{LocationNormalizer, Normalizer, PropertyNormalizer};
use crate::query::planner::{CancelToken, QueryPlanner};
use crate::query::result::QueryResult;
use crate::redfish::RedfishService;
use crate::time::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Engine construction options.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Stamp each record with the matched resource's URI.
    pub annotate_location: bool,
}

/// Query-id → plan registry over a Redfish service.
pub struct QueryEngine {
    planners: HashMap<String, QueryPlanner>,
    service: RedfishService,
    clock: Arc<dyn Clock>,
}

impl QueryEngine {
    /// Build plans for `queries`. The first plan wins when two queries
    /// share an id.
    pub fn new(
        queries: Vec<Query>,
        service: RedfishService,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let normalizer: Arc<dyn Normalizer> = if config.annotate_location {
            Arc::new(LocationNormalizer::new(PropertyNormalizer))
        } else {
            Arc::new(PropertyNormalizer)
        };

        let mut planners = HashMap::new();
        for query in queries {
            if planners.contains_key(&query.query_id) {
                warn!(query_id = %query.query_id, "duplicate query id, keeping first plan");
                continue;
            }
            planners.insert(
                query.query_id.clone(),
                QueryPlanner::new(query, normalizer.clone()),
            );
        }

        Self {
            planners,
            service,
            clock,
        }
    }

    /// Registered query ids, sorted.
    pub fn query_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.planners.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Execute the plans for `query_ids`, in the given order. Unknown
    /// ids are logged and skipped.
    pub fn execute(&self, query_ids: &[&str]) -> Vec<QueryResult> {
        self.execute_cancellable(query_ids, &CancelToken::new())
    }

    /// Execute every registered plan, in sorted id order.
    pub fn execute_all(&self) -> Vec<QueryResult> {
        self.execute(&self.query_ids())
    }

    /// Like [`QueryEngine::execute`] with a cooperative cancel token.
    pub fn execute_cancellable(
        &self,
        query_ids: &[&str],
        cancel: &CancelToken,
    ) -> Vec<QueryResult> {
        let mut results = Vec::with_capacity(query_ids.len());
        for id in query_ids {
            let Some(planner) = self.planners.get(*id) else {
                error!(query_id = *id, "no query plan for id");
                continue;
            };

            let result = match self.service.root() {
                Ok(root) => planner.execute_cancellable(&root, self.clock.as_ref(), cancel),
                Err(e) => {
                    error!(query_id = *id, error = %e, "service root unreachable");
                    let mut shell = planner.result_shell(self.clock.as_ref());
                    shell.end_timestamp = Some(self.clock.now());
                    shell
                }
            };
            results.push(result);
        }
        results
    }
}
