use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Turns texts into vectors.
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Embed a batch of texts with the named provider and optional model.
    fn embed(
        &self,
        texts: &[String],
        provider: &str,
        model: Option<&str>,
    ) -> BoxFuture<'_, Result<Vec<Vec<f32>>>>;
}

/// Vector search over knowledge-base scopes.
pub trait VectorSearch: Send + Sync + 'static {
    /// Return up to `top_k` passages ranked by similarity, best first.
    fn search(
        &self,
        scope: &SearchScope,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&Metadata>,
    ) -> BoxFuture<'_, Result<Vec<ScoredPassage>>>;
}

/// Single-shot text generation.
pub trait LlmClient: Send + Sync + 'static {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>>;
}

/// Web search, used as best-effort enrichment for generation.
pub trait WebSearch: Send + Sync + 'static {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    fn search(&self, query: &str, num_results: usize) -> BoxFuture<'_, Result<Vec<WebResult>>>;
}
