use tracing::debug;

use flowstack_core::{FlowError, KnowledgebaseConfig, Payload, Result, SearchScope};

use crate::providers::Providers;

/// Embed the carried query and fetch the nearest passages from this
/// component's scope, joined by blank lines.
pub(super) async fn retrieve(
    providers: &Providers,
    node_id: &str,
    config: &KnowledgebaseConfig,
    input: &Payload,
) -> Result<Payload> {
    let query = input.query_text().to_string();
    let vectors = providers
        .embedder
        .embed(
            std::slice::from_ref(&query),
            &config.embedding_provider,
            config.embedding_model.as_deref(),
        )
        .await?;
    let vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| FlowError::Embedding("provider returned no vectors".to_string()))?;

    let scope = SearchScope::new(&config.collection_name, node_id);
    let passages = providers
        .vector_store
        .search(&scope, &vector, config.n_results, None)
        .await?;
    debug!(scope = %scope.name(), hits = passages.len(), "Knowledge base searched");

    let context = passages
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(Payload::Knowledgebase { query, context })
}
