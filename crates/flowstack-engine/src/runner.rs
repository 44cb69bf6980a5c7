use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use flowstack_core::config::EngineConfig;
use flowstack_core::{ComponentId, ComponentKind, Payload, Workflow, WorkflowDraft};

use crate::executor::NodeExecutor;
use crate::graph::ExecutionGraph;
use crate::outcome::{ExecutionFailure, ExecutionMetadata, ExecutionOutcome};
use crate::providers::Providers;
use crate::validator::{ValidationReport, Validator};

/// Input waiting for a node that has been enqueued but not yet run.
struct PendingInput {
    payload: Payload,
    producer: ComponentId,
}

/// Validates and executes workflows against a fixed set of providers.
///
/// A runner holds no per-run state, so one instance can serve concurrent
/// executions.
#[derive(Clone)]
pub struct WorkflowRunner {
    validator: Validator,
    executor: NodeExecutor,
}

impl WorkflowRunner {
    pub fn new(providers: Providers, config: &EngineConfig) -> Self {
        Self {
            validator: Validator::new(config),
            executor: NodeExecutor::new(providers, config),
        }
    }

    pub fn validate(&self, workflow: &Workflow) -> ValidationReport {
        self.validator.report(workflow)
    }

    /// Assemble a client definition and execute it.
    pub async fn execute_draft(&self, draft: &WorkflowDraft, query: &str) -> ExecutionOutcome {
        match Workflow::assemble(Uuid::new_v4().to_string(), draft.clone()) {
            Ok(workflow) => self.execute(&workflow, query).await,
            Err(e) => {
                warn!(error = %e, "Workflow definition rejected");
                ExecutionFailure::configuration(e.to_string()).into()
            }
        }
    }

    /// Run the workflow breadth-first from its first `user_query` component.
    ///
    /// Each component runs at most once. A node fed by several producers runs
    /// with the output of whichever producer delivered last before the node
    /// was dequeued; deliveries to nodes that already ran are dropped.
    pub async fn execute(&self, workflow: &Workflow, query: &str) -> ExecutionOutcome {
        let execution_id = Uuid::new_v4();
        let start = Instant::now();

        if let Err(e) = self.validator.validate(workflow) {
            info!(%execution_id, workflow = %workflow.id, reason = %e, "Workflow failed validation");
            return ExecutionFailure::from(e).into();
        }

        let graph = ExecutionGraph::build(workflow);
        let Some(entry) = workflow.first_of_kind(ComponentKind::UserQuery) else {
            return ExecutionFailure::configuration("missing user_query component").into();
        };

        info!(
            %execution_id,
            workflow = %workflow.id,
            components = workflow.components().len(),
            "Starting workflow execution"
        );

        let mut queue: VecDeque<ComponentId> = VecDeque::new();
        let mut pending: HashMap<ComponentId, PendingInput> = HashMap::new();
        let mut enqueued: HashSet<ComponentId> = HashSet::new();
        let mut results: HashMap<ComponentId, Payload> = HashMap::new();
        let mut path: Vec<ComponentId> = Vec::new();

        queue.push_back(entry.id);
        enqueued.insert(entry.id);
        pending.insert(
            entry.id,
            PendingInput {
                payload: Payload::query(query),
                producer: entry.id,
            },
        );

        while let Some(id) = queue.pop_front() {
            if results.contains_key(&id) {
                continue;
            }
            let Some(input) = pending.remove(&id) else {
                continue;
            };
            let Some(component) = workflow.component(id) else {
                warn!(%execution_id, component = %id, "Connection target not found, skipping");
                continue;
            };

            path.push(id);
            let output = match self.executor.run(component, &input.payload).await {
                Ok(output) => output,
                Err(e) => {
                    error!(
                        %execution_id,
                        component = %id,
                        kind = %e.kind,
                        error = %e.source,
                        "Component failed, aborting execution"
                    );
                    return ExecutionFailure::from(e).into();
                }
            };
            debug!(
                %execution_id,
                component = %id,
                produced = output.type_tag(),
                "Component complete"
            );

            for &next in graph.successors(id) {
                if results.contains_key(&next) || next == id {
                    debug!(
                        %execution_id,
                        from = %id,
                        to = %next,
                        join = graph.is_join_point(next),
                        "Component already ran, dropping delivery"
                    );
                    continue;
                }
                let replaced = pending.insert(
                    next,
                    PendingInput {
                        payload: output.clone(),
                        producer: id,
                    },
                );
                if let Some(previous) = replaced {
                    debug!(
                        %execution_id,
                        to = %next,
                        replaced = %previous.producer,
                        by = %id,
                        "Join input overwritten by later producer"
                    );
                }
                if enqueued.insert(next) {
                    queue.push_back(next);
                }
            }

            results.insert(id, output);
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let response = workflow
            .first_of_kind(ComponentKind::Output)
            .and_then(|output| results.get(&output.id))
            .map(|payload| payload.response().to_string());

        match response {
            Some(response) => {
                info!(
                    %execution_id,
                    components_executed = path.len(),
                    elapsed_ms,
                    "Workflow execution complete"
                );
                ExecutionOutcome::Success {
                    response,
                    metadata: ExecutionMetadata {
                        components_executed: path.len(),
                        execution_path: path,
                    },
                }
            }
            None => {
                warn!(
                    %execution_id,
                    components_executed = path.len(),
                    elapsed_ms,
                    "Output component never ran"
                );
                ExecutionFailure::unreachable_output().into()
            }
        }
    }
}
