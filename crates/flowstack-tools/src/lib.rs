pub mod web_search;

use std::sync::Arc;

use flowstack_core::config::WebSearchConfig;
use flowstack_core::error::{FlowError, Result};
use flowstack_core::traits::WebSearch;

pub use web_search::{SerpApiSearch, TavilySearch};

/// Build the web search provider named in the config.
pub fn create_web_search(config: &WebSearchConfig) -> Result<Arc<dyn WebSearch>> {
    if config.api_key.is_empty() || config.api_key.starts_with("${") {
        return Err(FlowError::MissingCredential(config.provider.clone()));
    }
    match config.provider.to_lowercase().as_str() {
        "serpapi" => Ok(Arc::new(SerpApiSearch::new(&config.api_key))),
        "tavily" => Ok(Arc::new(TavilySearch::new(&config.api_key))),
        other => Err(FlowError::UnsupportedProvider(other.to_string())),
    }
}
