use std::sync::Arc;

use flowstack_core::traits::{EmbeddingProvider, LlmClient, VectorSearch, WebSearch};

/// The external capabilities node executors call out to.
///
/// Web search is optional; an `llm_engine` asking for it without one
/// configured simply generates without web context.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub vector_store: Arc<dyn VectorSearch>,
    pub llm: Arc<dyn LlmClient>,
    pub web_search: Option<Arc<dyn WebSearch>>,
}

impl Providers {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorSearch>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            llm,
            web_search: None,
        }
    }

    pub fn with_web_search(mut self, web_search: Arc<dyn WebSearch>) -> Self {
        self.web_search = Some(web_search);
        self
    }
}
