//! Workflow execution engine.
//!
//! A workflow is validated structurally, turned into a forward adjacency map,
//! and executed by a single breadth-first walk from the first `user_query`
//! component. Each component runs at most once per execution; a failing node
//! aborts the whole run.

pub mod executor;
pub mod graph;
pub mod outcome;
pub mod providers;
pub mod runner;
pub mod validator;

pub use executor::{NodeError, NodeExecutor};
pub use graph::ExecutionGraph;
pub use outcome::{
    ExecutionFailure, ExecutionMetadata, ExecutionOutcome, ExecutionResponse, FailureKind,
};
pub use providers::Providers;
pub use runner::WorkflowRunner;
pub use validator::{ValidationError, ValidationReport, Validator};
