use serde::{Deserialize, Serialize};

use flowstack_core::{ComponentId, ComponentKind};

use crate::executor::NodeError;
use crate::validator::ValidationError;

/// What a successful run reports alongside its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub components_executed: usize,
    /// Component ids in the order they ran.
    pub execution_path: Vec<ComponentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The workflow failed validation; nothing ran.
    Structural,
    /// An external call made by a node failed.
    Provider,
    /// Unknown kind, unsupported provider, missing credential.
    Configuration,
    /// Every node that could run did, but the output node was never reached.
    UnreachableOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub component: Option<ComponentKind>,
    pub reason: String,
}

impl ExecutionFailure {
    pub fn unreachable_output() -> Self {
        Self {
            kind: FailureKind::UnreachableOutput,
            component: Some(ComponentKind::Output),
            reason: "output produced no result".to_string(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Configuration,
            component: None,
            reason: reason.into(),
        }
    }
}

impl From<ValidationError> for ExecutionFailure {
    fn from(e: ValidationError) -> Self {
        Self {
            kind: FailureKind::Structural,
            component: None,
            reason: e.to_string(),
        }
    }
}

impl From<NodeError> for ExecutionFailure {
    fn from(e: NodeError) -> Self {
        let kind = if e.is_configuration() {
            FailureKind::Configuration
        } else {
            FailureKind::Provider
        };
        Self {
            kind,
            component: Some(e.kind),
            reason: e.to_string(),
        }
    }
}

/// Result of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success {
        response: String,
        metadata: ExecutionMetadata,
    },
    Failure(ExecutionFailure),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn response(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Success { response, .. } => Some(response),
            ExecutionOutcome::Failure(_) => None,
        }
    }

    pub fn metadata(&self) -> Option<&ExecutionMetadata> {
        match self {
            ExecutionOutcome::Success { metadata, .. } => Some(metadata),
            ExecutionOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ExecutionFailure> {
        match self {
            ExecutionOutcome::Failure(f) => Some(f),
            ExecutionOutcome::Success { .. } => None,
        }
    }
}

impl From<ExecutionFailure> for ExecutionOutcome {
    fn from(f: ExecutionFailure) -> Self {
        ExecutionOutcome::Failure(f)
    }
}

/// Caller-facing, serializable form of an [`ExecutionOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExecutionMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
}

impl From<ExecutionOutcome> for ExecutionResponse {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Success { response, metadata } => Self {
                success: true,
                response: Some(response),
                metadata: Some(metadata),
                error: None,
                error_kind: None,
            },
            ExecutionOutcome::Failure(f) => Self {
                success: false,
                response: None,
                metadata: None,
                error: Some(f.reason),
                error_kind: Some(f.kind),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstack_core::FlowError;
    use serde_json::json;

    #[test]
    fn test_node_error_classification() {
        let provider: ExecutionFailure = NodeError {
            component: ComponentId(3),
            kind: ComponentKind::LlmEngine,
            source: FlowError::LlmRequest("HTTP 500".into()),
        }
        .into();
        assert_eq!(provider.kind, FailureKind::Provider);
        assert_eq!(provider.component, Some(ComponentKind::LlmEngine));
        assert_eq!(
            provider.reason,
            "error executing component llm_engine: LLM request failed: HTTP 500"
        );

        let config: ExecutionFailure = NodeError {
            component: ComponentId(2),
            kind: ComponentKind::Knowledgebase,
            source: FlowError::MissingCredential("gemini".into()),
        }
        .into();
        assert_eq!(config.kind, FailureKind::Configuration);
    }

    #[test]
    fn test_response_json_shape() {
        let ok = ExecutionResponse::from(ExecutionOutcome::Success {
            response: "hi".into(),
            metadata: ExecutionMetadata {
                components_executed: 2,
                execution_path: vec![ComponentId(0), ComponentId(1)],
            },
        });
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({
                "success": true,
                "response": "hi",
                "metadata": {"components_executed": 2, "execution_path": [0, 1]}
            })
        );

        let failed = ExecutionResponse::from(ExecutionOutcome::from(
            ExecutionFailure::unreachable_output(),
        ));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "success": false,
                "error": "output produced no result",
                "error_kind": "unreachable_output"
            })
        );
    }
}
