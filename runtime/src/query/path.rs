//! Path expression compiler and per-subquery cursors.
//!
//! A path expression is a slash-separated sequence of `Name[Predicate]`
//! steps. Compilation turns a subquery into a [`SubqueryHandle`]: the
//! step list plus a cursor marking the next step to attempt. The
//! compiler is the single place predicate syntax is parsed; execution
//! only ever sees the tagged [`Predicate`] variant.

use crate::query::model::Subquery;
use crate::redfish::view::ResourceView;
use thiserror::Error;
use tracing::error;

/// Errors from compiling a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A step is missing its `[...]` predicate, or the brackets are
    /// malformed.
    #[error("invalid location step `{0}`")]
    InvalidStep(String),

    /// The predicate text is not part of the supported grammar.
    #[error("unknown predicate `{0}`")]
    UnknownPredicate(String),

    /// The expression contains no steps at all.
    #[error("path expression has no steps")]
    Empty,
}

/// Boolean selector applied to each candidate resource at a step.
///
/// Extending the predicate grammar means adding a variant here plus an
/// arm in [`Predicate::compile`] and [`Predicate::matches`]; the handle
/// and planner shapes are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// `[*]` — select every member.
    SelectAll,
}

impl Predicate {
    fn compile(expr: &str) -> Option<Self> {
        match expr {
            "*" => Some(Predicate::SelectAll),
            _ => None,
        }
    }

    /// Whether `member` passes this predicate.
    pub fn matches(&self, _member: &ResourceView) -> bool {
        match self {
            Predicate::SelectAll => true,
        }
    }
}

/// One compiled step: a node name and the predicate to apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub node: String,
    pub predicate: Predicate,
}

/// Split one `Name[Predicate]` step into its parts.
fn parse_step(step: &str) -> Result<PathStep, CompileError> {
    let open = step.find('[');
    let close = step.find(']');
    let (open, close) = match (open, close) {
        (Some(o), Some(c)) if o < c => (o, c),
        _ => return Err(CompileError::InvalidStep(step.to_string())),
    };

    let node = step[..open].to_string();
    let expr = &step[open + 1..close];
    let predicate =
        Predicate::compile(expr).ok_or_else(|| CompileError::UnknownPredicate(expr.to_string()))?;

    Ok(PathStep { node, predicate })
}

/// Compile a full path expression, skipping empty segments.
pub fn compile_path(path: &str) -> Result<Vec<PathStep>, CompileError> {
    let steps: Vec<PathStep> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(parse_step)
        .collect::<Result<_, _>>()?;
    if steps.is_empty() {
        return Err(CompileError::Empty);
    }
    Ok(steps)
}

/// Outcome of applying a handle's current predicate to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOutcome {
    /// Predicate rejected the resource; the handle is done on this branch.
    EndByPredicate,
    /// Predicate accepted at the last step; normalize and stop recursing.
    EndOfPath,
    /// Predicate accepted with steps remaining; cursor advanced.
    Continue,
}

/// Runtime form of one subquery: compiled steps plus a cursor.
///
/// Handles are cloned into each sibling branch of the traversal, so
/// advancing the cursor in one branch never leaks into another.
#[derive(Debug, Clone)]
pub struct SubqueryHandle {
    subquery: Subquery,
    steps: Vec<PathStep>,
    cursor: usize,
}

impl SubqueryHandle {
    /// Compile `subquery`'s path expression into a handle.
    pub fn compile(subquery: Subquery) -> Result<Self, CompileError> {
        let steps = compile_path(&subquery.path)?;
        Ok(Self {
            subquery,
            steps,
            cursor: 0,
        })
    }

    pub fn subquery(&self) -> &Subquery {
        &self.subquery
    }

    /// Node name this handle wants fetched next.
    pub fn next_node(&self) -> Option<&str> {
        self.steps.get(self.cursor).map(|step| step.node.as_str())
    }

    /// Apply the current step's predicate to `member`.
    ///
    /// On `Continue` the cursor advances; a handle never advances past
    /// its last step.
    pub fn filter(&mut self, member: &ResourceView) -> PredicateOutcome {
        let Some(step) = self.steps.get(self.cursor) else {
            debug_assert!(false, "handle advanced past its last step");
            error!(
                subquery_id = %self.subquery.subquery_id,
                "cursor past end of path, dropping handle"
            );
            return PredicateOutcome::EndByPredicate;
        };

        if !step.predicate.matches(member) {
            return PredicateOutcome::EndByPredicate;
        }
        if self.cursor + 1 == self.steps.len() {
            return PredicateOutcome::EndOfPath;
        }
        self.cursor += 1;
        PredicateOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::MockRedfishService;

    fn subquery(path: &str) -> Subquery {
        Subquery {
            subquery_id: "S".to_string(),
            root_subquery_ids: Vec::new(),
            path: path.to_string(),
            properties: Vec::new(),
        }
    }

    #[test]
    fn test_compile_two_step_path() {
        let steps = compile_path("/Chassis[*]/Thermal[*]").unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].node, "Chassis");
        assert_eq!(steps[0].predicate, Predicate::SelectAll);
        assert_eq!(steps[1].node, "Thermal");
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let steps = compile_path("//Chassis[*]//Sensors[*]/").unwrap();
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_missing_brackets_is_invalid() {
        assert_eq!(
            compile_path("/Chassis*"),
            Err(CompileError::InvalidStep("Chassis*".to_string()))
        );
        assert_eq!(
            compile_path("/Chassis[*"),
            Err(CompileError::InvalidStep("Chassis[*".to_string()))
        );
    }

    #[test]
    fn test_reversed_brackets_are_invalid() {
        assert!(matches!(
            compile_path("/Chassis]*["),
            Err(CompileError::InvalidStep(_))
        ));
    }

    #[test]
    fn test_unknown_predicate_is_rejected() {
        assert_eq!(
            compile_path("/Chassis[Name=foo]"),
            Err(CompileError::UnknownPredicate("Name=foo".to_string()))
        );
    }

    #[test]
    fn test_empty_path_is_rejected() {
        assert_eq!(compile_path("/"), Err(CompileError::Empty));
        assert_eq!(compile_path(""), Err(CompileError::Empty));
    }

    #[test]
    fn test_cursor_walks_to_end_of_path() {
        let service = MockRedfishService::chassis_mockup();
        let member = service.view("/redfish/v1/Chassis/chassis");

        let mut handle = SubqueryHandle::compile(subquery("/Chassis[*]/Status[*]")).unwrap();
        assert_eq!(handle.next_node(), Some("Chassis"));
        assert_eq!(handle.filter(&member), PredicateOutcome::Continue);
        assert_eq!(handle.next_node(), Some("Status"));
        assert_eq!(handle.filter(&member), PredicateOutcome::EndOfPath);
        // Terminal handles stay at the last step.
        assert_eq!(handle.next_node(), Some("Status"));
    }

    #[test]
    fn test_cloned_handles_do_not_share_cursors() {
        let service = MockRedfishService::chassis_mockup();
        let member = service.view("/redfish/v1/Chassis/chassis");

        let mut first = SubqueryHandle::compile(subquery("/Chassis[*]/Status[*]")).unwrap();
        let second = first.clone();
        first.filter(&member);

        assert_eq!(first.next_node(), Some("Status"));
        assert_eq!(second.next_node(), Some("Chassis"));
    }

    #[test]
    fn test_repeated_node_names_terminate_at_true_last_step() {
        // /Fans[*]/Fans[*] must not treat the first step as terminal
        // just because the names repeat.
        let service = MockRedfishService::chassis_mockup();
        let member = service.view("/redfish/v1/Chassis/chassis");

        let mut handle = SubqueryHandle::compile(subquery("/Fans[*]/Fans[*]")).unwrap();
        assert_eq!(handle.filter(&member), PredicateOutcome::Continue);
        assert_eq!(handle.filter(&member), PredicateOutcome::EndOfPath);
    }
}
