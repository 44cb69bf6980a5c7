use flowstack_core::{Workflow, WorkflowDraft};
use flowstack_engine::Validator;

const RAG_WORKFLOW: &str = r#"{
  "name": "Docs assistant",
  "description": "Answers questions from the product docs",
  "components": [
    {"component_type": "user_query", "node_id": "query-1", "position_x": 0, "position_y": 0},
    {"component_type": "knowledgebase", "node_id": "kb-1", "position_x": 200, "position_y": 0,
     "config": {"embedding_provider": "gemini", "collection_name": "docs", "n_results": 3}},
    {"component_type": "llm_engine", "node_id": "llm-1", "position_x": 400, "position_y": 0,
     "config": {"provider": "openai", "model": "gpt-4o-mini", "use_web_search": true, "temperature": 0.2}},
    {"component_type": "output", "node_id": "out-1", "position_x": 600, "position_y": 0}
  ],
  "connections": [
    {"source_component_id": "query-1", "target_component_id": "kb-1", "source_handle": "query"},
    {"source_component_id": "kb-1", "target_component_id": "llm-1"},
    {"source_component_id": "llm-1", "target_component_id": "out-1"}
  ]
}"#;

#[test]
fn test_client_definition_assembles_and_validates() {
    let draft: WorkflowDraft = serde_json::from_str(RAG_WORKFLOW).expect("parse draft");
    let workflow = Workflow::assemble("wf-docs", draft).expect("assemble");

    assert_eq!(workflow.name, "Docs assistant");
    assert_eq!(workflow.components().len(), 4);
    assert_eq!(workflow.connections().len(), 3);
    assert_eq!(
        workflow.connections()[0].source_handle.as_deref(),
        Some("query")
    );

    let report = Validator::default().report(&workflow);
    assert!(report.valid, "unexpected error: {:?}", report.error);
}

#[test]
fn test_workflow_survives_json_round_trip() {
    let draft: WorkflowDraft = serde_json::from_str(RAG_WORKFLOW).expect("parse draft");
    let workflow = Workflow::assemble("wf-docs", draft).expect("assemble");

    let stored = serde_json::to_string(&workflow).expect("serialize");
    let loaded: Workflow = serde_json::from_str(&stored).expect("deserialize");
    assert_eq!(loaded, workflow);
}

#[test]
fn test_bad_connection_label_is_rejected() {
    let draft: WorkflowDraft = serde_json::from_str(
        r#"{"name": "broken",
            "components": [{"component_type": "user_query", "node_id": "q"}],
            "connections": [{"source": "q", "target": "missing"}]}"#,
    )
    .expect("parse draft");

    let err = Workflow::assemble("wf", draft).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Config error: invalid node labels in connection: q -> missing"
    );
}
