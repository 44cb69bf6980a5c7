//! Mock providers and workflow fixtures shared by the Flowstack test suites.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::json;

use flowstack_core::traits::{EmbeddingProvider, LlmClient, VectorSearch, WebSearch};
use flowstack_core::{
    ComponentDraft, ConnectionDraft, FlowError, GenerationRequest, Metadata, Result,
    ScoredPassage, SearchScope, WebResult, Workflow, WorkflowDraft,
};

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

enum LlmBehavior {
    Reply(String),
    EchoContext,
    Fail(String),
    Misconfigured(String),
}

/// Scripted LLM client that records every request it receives.
pub struct MockLlm {
    behavior: LlmBehavior,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockLlm {
    fn with(behavior: LlmBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::with(LlmBehavior::Reply(text.into()))
    }

    /// Respond with the request's context, or `"<no context>"`.
    pub fn echo_context() -> Self {
        Self::with(LlmBehavior::EchoContext)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with(LlmBehavior::Fail(message.into()))
    }

    /// Fail as if the requested provider had no credential.
    pub fn missing_credential(provider: impl Into<String>) -> Self {
        Self::with(LlmBehavior::Misconfigured(provider.into()))
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LlmClient for MockLlm {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        let result = match &self.behavior {
            LlmBehavior::Reply(text) => Ok(text.clone()),
            LlmBehavior::EchoContext => Ok(request
                .context
                .clone()
                .unwrap_or_else(|| "<no context>".to_string())),
            LlmBehavior::Fail(message) => Err(FlowError::LlmRequest(message.clone())),
            LlmBehavior::Misconfigured(provider) => {
                Err(FlowError::MissingCredential(provider.clone()))
            }
        };
        self.requests.lock().unwrap().push(request);
        Box::pin(async move { result })
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// Embedder returning a fixed unit vector per text.
pub struct MockEmbedder {
    fail: bool,
    empty: bool,
    calls: Mutex<Vec<(Vec<String>, String)>>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            fail: false,
            empty: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Succeeds but returns no vectors at all.
    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Self::new()
        }
    }

    /// `(texts, provider)` per call.
    pub fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for MockEmbedder {
    fn embed(
        &self,
        texts: &[String],
        provider: &str,
        _model: Option<&str>,
    ) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        self.calls
            .lock()
            .unwrap()
            .push((texts.to_vec(), provider.to_string()));
        let result = if self.fail {
            Err(FlowError::Embedding("mock embedding outage".to_string()))
        } else if self.empty {
            Ok(Vec::new())
        } else {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        };
        Box::pin(async move { result })
    }
}

// ---------------------------------------------------------------------------
// Vector search
// ---------------------------------------------------------------------------

/// In-memory passages keyed by scope name, returned in insertion order.
pub struct MockVectorStore {
    passages: HashMap<String, Vec<String>>,
    fail: bool,
    searched: Mutex<Vec<String>>,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self {
            passages: HashMap::new(),
            fail: false,
            searched: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_passages(mut self, scope: &str, texts: &[&str]) -> Self {
        self.passages.insert(
            scope.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// Scope names searched, in call order.
    pub fn searched_scopes(&self) -> Vec<String> {
        self.searched.lock().unwrap().clone()
    }
}

impl Default for MockVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorSearch for MockVectorStore {
    fn search(
        &self,
        scope: &SearchScope,
        _query_vector: &[f32],
        top_k: usize,
        _filter: Option<&Metadata>,
    ) -> BoxFuture<'_, Result<Vec<ScoredPassage>>> {
        let name = scope.name();
        self.searched.lock().unwrap().push(name.clone());
        let result = if self.fail {
            Err(FlowError::VectorStore("mock store unavailable".to_string()))
        } else {
            Ok(self
                .passages
                .get(&name)
                .map(|texts| {
                    texts
                        .iter()
                        .take(top_k)
                        .enumerate()
                        .map(|(i, text)| ScoredPassage {
                            text: text.clone(),
                            score: 1.0 - i as f32 * 0.1,
                            metadata: Metadata::new(),
                        })
                        .collect()
                })
                .unwrap_or_default())
        };
        Box::pin(async move { result })
    }
}

// ---------------------------------------------------------------------------
// Web search
// ---------------------------------------------------------------------------

pub struct MockWebSearch {
    results: Vec<WebResult>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockWebSearch {
    pub fn with_results(results: Vec<WebResult>) -> Self {
        Self {
            results,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            results: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WebSearch for MockWebSearch {
    fn name(&self) -> &str {
        "mock"
    }

    fn search(&self, _query: &str, num_results: usize) -> BoxFuture<'_, Result<Vec<WebResult>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail {
            Err(FlowError::WebSearch {
                provider: "mock".to_string(),
                message: "rate limited".to_string(),
            })
        } else {
            Ok(self.results.iter().take(num_results).cloned().collect())
        };
        Box::pin(async move { result })
    }
}

pub fn web_result(title: &str, link: &str, snippet: &str) -> WebResult {
    WebResult {
        title: title.to_string(),
        link: link.to_string(),
        snippet: snippet.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Workflow fixtures
// ---------------------------------------------------------------------------

/// `q -> kb -> llm -> out`, with the knowledge base scoped to `documents_kb`.
pub fn linear_draft() -> WorkflowDraft {
    WorkflowDraft {
        name: "linear".to_string(),
        description: Some("query, retrieve, generate, answer".to_string()),
        components: vec![
            ComponentDraft::new("user_query", "q"),
            ComponentDraft::new("knowledgebase", "kb")
                .with_config(json!({"collection_name": "documents", "n_results": 2})),
            ComponentDraft::new("llm_engine", "llm"),
            ComponentDraft::new("output", "out"),
        ],
        connections: vec![
            ConnectionDraft::new("q", "kb"),
            ConnectionDraft::new("kb", "llm"),
            ConnectionDraft::new("llm", "out"),
        ],
    }
}

/// [`linear_draft`] assembled; component ids are 0..=3 in declaration order.
pub fn linear_workflow() -> Workflow {
    match Workflow::assemble("wf-linear", linear_draft()) {
        Ok(workflow) => workflow,
        Err(e) => panic!("linear fixture must assemble: {}", e),
    }
}

/// Build a draft from `(kind, label)` pairs and `(source, target)` label pairs.
pub fn draft(components: &[(&str, &str)], connections: &[(&str, &str)]) -> WorkflowDraft {
    WorkflowDraft {
        name: "fixture".to_string(),
        description: None,
        components: components
            .iter()
            .map(|(kind, label)| ComponentDraft::new(*kind, *label))
            .collect(),
        connections: connections
            .iter()
            .map(|(s, t)| ConnectionDraft::new(*s, *t))
            .collect(),
    }
}

/// Write a TOML config into a fresh temp dir; keep the dir alive for the test.
pub fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flowstack.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}
