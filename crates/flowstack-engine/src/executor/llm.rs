use tracing::warn;

use flowstack_core::{GenerationRequest, LlmEngineConfig, Payload, Result, WebResult};

use crate::providers::Providers;

/// Render web hits as a numbered context block.
pub fn format_web_results(results: &[WebResult]) -> String {
    let mut out = String::from("\n\nWeb Search Results:\n");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("{}. {}\n{}\n{}\n\n", i + 1, r.title, r.snippet, r.link));
    }
    out
}

pub(super) async fn generate(
    providers: &Providers,
    web_search_results: usize,
    config: &LlmEngineConfig,
    input: &Payload,
) -> Result<Payload> {
    let query = input.query_text().to_string();
    let mut context = input.context().map(str::to_string);

    if config.use_web_search {
        if let Some(web) = enrich_with_web(providers, web_search_results, &query).await {
            context = Some(match context {
                Some(existing) => format!("{}\n\n{}", existing, web),
                None => web,
            });
        }
    }

    let request = GenerationRequest {
        query,
        context,
        system_prompt: config.system_prompt.clone(),
        provider: config.provider.clone(),
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    let response = providers.llm.generate(request).await?;

    Ok(Payload::Llm { response })
}

/// Web search never fails generation; problems are logged and skipped.
async fn enrich_with_web(providers: &Providers, count: usize, query: &str) -> Option<String> {
    let Some(search) = providers.web_search.as_ref() else {
        warn!("Web search requested but no web search provider is configured");
        return None;
    };
    match search.search(query, count).await {
        Ok(results) if results.is_empty() => None,
        Ok(results) => Some(format_web_results(&results)),
        Err(e) => {
            warn!(provider = search.name(), error = %e, "Web search failed, continuing without it");
            None
        }
    }
}
