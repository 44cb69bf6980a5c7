//! Per-kind node behavior.

mod knowledgebase;
mod llm;

pub use llm::format_web_results;

use thiserror::Error;
use tracing::debug;

use flowstack_core::config::EngineConfig;
use flowstack_core::{Component, ComponentId, ComponentKind, ComponentSpec, FlowError, Payload};

use crate::providers::Providers;

/// A node failed; the execution it belongs to is aborted.
#[derive(Debug, Error)]
#[error("error executing component {kind}: {source}")]
pub struct NodeError {
    pub component: ComponentId,
    pub kind: ComponentKind,
    #[source]
    pub source: FlowError,
}

impl NodeError {
    pub fn is_configuration(&self) -> bool {
        self.source.is_configuration()
    }
}

/// Runs one component against its input payload.
#[derive(Clone)]
pub struct NodeExecutor {
    providers: Providers,
    web_search_results: usize,
}

impl NodeExecutor {
    pub fn new(providers: Providers, config: &EngineConfig) -> Self {
        Self {
            providers,
            web_search_results: config.web_search_results,
        }
    }

    pub async fn run(&self, component: &Component, input: &Payload) -> Result<Payload, NodeError> {
        debug!(
            component = %component.id,
            kind = %component.kind(),
            input = input.type_tag(),
            "Running component"
        );

        let result = match &component.spec {
            ComponentSpec::UserQuery => Ok(Payload::query(input.query_text())),
            ComponentSpec::Knowledgebase(cfg) => {
                knowledgebase::retrieve(&self.providers, &component.node_id, cfg, input).await
            }
            ComponentSpec::LlmEngine(cfg) => {
                llm::generate(&self.providers, self.web_search_results, cfg, input).await
            }
            ComponentSpec::Output => Ok(Payload::Output {
                response: input.response().to_string(),
            }),
        };

        result.map_err(|source| NodeError {
            component: component.id,
            kind: component.kind(),
            source,
        })
    }
}
