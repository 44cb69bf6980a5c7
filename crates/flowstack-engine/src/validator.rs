//! Structural checks run before any execution is attempted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use flowstack_core::config::EngineConfig;
use flowstack_core::{ComponentId, ComponentKind, Workflow};

use crate::graph::ExecutionGraph;

/// Why a workflow is not executable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing {0} component")]
    MissingComponent(ComponentKind),

    #[error("connection references unknown component(s): {}", join_ids(.0))]
    UnknownComponents(Vec<ComponentId>),

    #[error("user_query has no outgoing connections")]
    QueryDisconnected,

    #[error("output has no incoming connections")]
    OutputDisconnected,

    #[error("workflow contains a cycle through component {0}")]
    Cycle(ComponentId),
}

fn join_ids(ids: &[ComponentId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The `(valid, reason)` pair reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub error: Option<String>,
}

impl From<Result<(), ValidationError>> for ValidationReport {
    fn from(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                error: None,
            },
            Err(e) => Self {
                valid: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Fast, purely structural workflow validator.
///
/// Checks run in a fixed order and stop at the first failure. Reachability
/// from the query to the output is not checked.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    reject_cycles: bool,
}

impl Validator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            reject_cycles: config.reject_cycles,
        }
    }

    /// Also fail workflows whose connections form a directed cycle.
    pub fn rejecting_cycles(mut self) -> Self {
        self.reject_cycles = true;
        self
    }

    pub fn validate(&self, workflow: &Workflow) -> Result<(), ValidationError> {
        for kind in [
            ComponentKind::UserQuery,
            ComponentKind::LlmEngine,
            ComponentKind::Output,
        ] {
            if workflow.first_of_kind(kind).is_none() {
                return Err(ValidationError::MissingComponent(kind));
            }
        }

        let known: HashSet<ComponentId> = workflow.components().iter().map(|c| c.id).collect();
        let mut unknown: Vec<ComponentId> = Vec::new();
        for conn in workflow.connections() {
            for id in [conn.source, conn.target] {
                if !known.contains(&id) && !unknown.contains(&id) {
                    unknown.push(id);
                }
            }
        }
        if !unknown.is_empty() {
            return Err(ValidationError::UnknownComponents(unknown));
        }

        if let Some(query) = workflow.first_of_kind(ComponentKind::UserQuery) {
            if !workflow.connections().iter().any(|c| c.source == query.id) {
                return Err(ValidationError::QueryDisconnected);
            }
        }

        if let Some(output) = workflow.first_of_kind(ComponentKind::Output) {
            if !workflow.connections().iter().any(|c| c.target == output.id) {
                return Err(ValidationError::OutputDisconnected);
            }
        }

        if self.reject_cycles {
            if let Some(id) = ExecutionGraph::build(workflow).find_cycle() {
                return Err(ValidationError::Cycle(id));
            }
        }

        Ok(())
    }

    pub fn report(&self, workflow: &Workflow) -> ValidationReport {
        self.validate(workflow).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstack_core::{Component, ComponentSpec, Connection, LlmEngineConfig};

    fn component(id: u64, spec: ComponentSpec) -> Component {
        Component::new(ComponentId(id), format!("node-{}", id), spec)
    }

    fn full_set() -> Vec<Component> {
        vec![
            component(1, ComponentSpec::UserQuery),
            component(2, ComponentSpec::LlmEngine(LlmEngineConfig::default())),
            component(3, ComponentSpec::Output),
        ]
    }

    fn edges(pairs: &[(u64, u64)]) -> Vec<Connection> {
        pairs
            .iter()
            .map(|&(s, t)| Connection::new(ComponentId(s), ComponentId(t)))
            .collect()
    }

    #[test]
    fn test_valid_linear_workflow() {
        let wf = Workflow::new("wf", "ok", full_set(), edges(&[(1, 2), (2, 3)]));
        assert_eq!(Validator::default().validate(&wf), Ok(()));
        let report = Validator::default().report(&wf);
        assert!(report.valid);
        assert!(report.error.is_none());
    }

    #[test]
    fn test_missing_kinds_in_order() {
        let wf = Workflow::new("wf", "empty", vec![], vec![]);
        assert_eq!(
            Validator::default().validate(&wf).unwrap_err().to_string(),
            "missing user_query component"
        );

        let wf = Workflow::new("wf", "q", vec![component(1, ComponentSpec::UserQuery)], vec![]);
        assert_eq!(
            Validator::default().validate(&wf),
            Err(ValidationError::MissingComponent(ComponentKind::LlmEngine))
        );

        let mut parts = full_set();
        parts.pop();
        let wf = Workflow::new("wf", "no output", parts, edges(&[(1, 2)]));
        assert_eq!(
            Validator::default().report(&wf).error.as_deref(),
            Some("missing output component")
        );
    }

    #[test]
    fn test_dangling_connection_names_every_unknown_id() {
        let wf = Workflow::new(
            "wf",
            "dangling",
            full_set(),
            edges(&[(1, 2), (2, 3), (9, 3), (1, 8), (9, 2)]),
        );
        let err = Validator::default().validate(&wf).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownComponents(vec![ComponentId(9), ComponentId(8)])
        );
        assert_eq!(
            err.to_string(),
            "connection references unknown component(s): 9, 8"
        );
    }

    #[test]
    fn test_query_and_output_must_be_wired() {
        let wf = Workflow::new("wf", "q", full_set(), edges(&[(2, 3)]));
        assert_eq!(
            Validator::default().validate(&wf),
            Err(ValidationError::QueryDisconnected)
        );

        let wf = Workflow::new("wf", "o", full_set(), edges(&[(1, 2)]));
        assert_eq!(
            Validator::default().validate(&wf),
            Err(ValidationError::OutputDisconnected)
        );
    }

    #[test]
    fn test_reachability_is_not_checked() {
        // Query feeds a dead end; output is fed by the LLM, which nothing feeds.
        let mut parts = full_set();
        parts.push(component(4, ComponentSpec::Output));
        let wf = Workflow::new("wf", "split", parts, edges(&[(1, 4), (2, 3)]));
        assert_eq!(Validator::default().validate(&wf), Ok(()));
    }

    #[test]
    fn test_cycles_only_rejected_when_enabled() {
        let wf = Workflow::new("wf", "loop", full_set(), edges(&[(1, 2), (2, 3), (3, 2)]));
        assert_eq!(Validator::default().validate(&wf), Ok(()));

        let strict = Validator::new(&EngineConfig {
            reject_cycles: true,
            ..EngineConfig::default()
        });
        assert_eq!(strict.validate(&wf), Err(ValidationError::Cycle(ComponentId(2))));
        assert_eq!(
            Validator::default().rejecting_cycles().report(&wf).error.as_deref(),
            Some("workflow contains a cycle through component 2")
        );
    }
}
