use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Top-level flowstack configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub web_search: Option<WebSearchConfig>,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

/// Workflow engine behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reject workflows whose connections form a cycle (default: false).
    #[serde(default)]
    pub reject_cycles: bool,
    /// Number of web results requested when an LLM engine enables web search.
    #[serde(default = "default_web_search_results")]
    pub web_search_results: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reject_cycles: false,
            web_search_results: default_web_search_results(),
        }
    }
}

fn default_web_search_results() -> usize { 5 }

/// Credentials per generation/embedding provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: Option<ProviderConfig>,
    #[serde(default)]
    pub gemini: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override the provider's API root (OpenAI-compatible servers, proxies).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// The API key, if set to something other than an unexpanded `${VAR}`.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty() && !k.starts_with("${"))
    }
}

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    pub api_key: String,
}

fn default_search_provider() -> String { "serpapi".to_string() }

/// Where knowledge-base passages are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_store_path")]
    pub path: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            path: default_vector_store_path(),
        }
    }
}

fn default_vector_store_path() -> String { "~/.flowstack/vectors.db".to_string() }

/// Retry configuration for provider requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let mut config: Self =
            toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))?;
        config.apply_env_fallbacks();
        Ok(config)
    }

    /// Fill unset API keys from the conventional environment variables.
    pub fn apply_env_fallbacks(&mut self) {
        fill_key(&mut self.providers.openai, "OPENAI_API_KEY");
        fill_key(&mut self.providers.gemini, "GEMINI_API_KEY");

        if self.web_search.is_none() {
            if let Ok(key) = std::env::var("SERPAPI_API_KEY") {
                if !key.is_empty() {
                    self.web_search = Some(WebSearchConfig {
                        provider: default_search_provider(),
                        api_key: key,
                    });
                }
            }
        }
    }

    /// Resolve the vector store path (expand ~).
    pub fn vector_store_path(&self) -> PathBuf {
        expand_home(&self.vector_store.path)
    }

    /// A copy safe to print: every secret replaced.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for provider in [&mut copy.providers.openai, &mut copy.providers.gemini]
            .into_iter()
            .flatten()
        {
            if provider.api_key.is_some() {
                provider.api_key = Some("***".to_string());
            }
        }
        if let Some(ws) = copy.web_search.as_mut() {
            ws.api_key = "***".to_string();
        }
        copy
    }
}

fn fill_key(slot: &mut Option<ProviderConfig>, var: &str) {
    if slot.as_ref().and_then(|p| p.api_key()).is_some() {
        return;
    }
    if let Ok(key) = std::env::var(var) {
        if !key.is_empty() {
            slot.get_or_insert_with(ProviderConfig::default).api_key = Some(key);
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

pub fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
