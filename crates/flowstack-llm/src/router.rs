use std::collections::HashMap;

use futures::future::BoxFuture;
use tracing::debug;

use flowstack_core::config::{AppConfig, ProviderConfig};
use flowstack_core::error::{FlowError, Result};
use flowstack_core::traits::LlmClient;
use flowstack_core::GenerationRequest;

use crate::providers::gemini::GeminiClient;
use crate::providers::openai::OpenAiClient;
use crate::retry::RetryingClient;

/// Provider names the router knows how to build clients for.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "gemini"];

/// Dispatches each request to the client registered for its provider name.
///
/// Names are matched case-insensitively. A known provider without a
/// registered client is a missing credential; anything else is unsupported.
#[derive(Default)]
pub struct ProviderRouter {
    clients: HashMap<String, Box<dyn LlmClient>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every provider that has an API key configured.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut router = Self::new();

        if let Some((key, provider)) = credential(&config.providers.openai) {
            let mut client = OpenAiClient::new(key);
            if let Some(base_url) = &provider.base_url {
                client = client.with_base_url(base_url.clone());
            }
            router = router.with_client("openai", wrap(Box::new(client), config));
        }
        if let Some((key, provider)) = credential(&config.providers.gemini) {
            let mut client = GeminiClient::new(key);
            if let Some(base_url) = &provider.base_url {
                client = client.with_base_url(base_url.clone());
            }
            router = router.with_client("gemini", wrap(Box::new(client), config));
        }

        router
    }

    pub fn with_client(mut self, name: &str, client: Box<dyn LlmClient>) -> Self {
        self.clients.insert(name.to_lowercase(), client);
        self
    }

    /// Names of providers with a client registered, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn route(&self, provider: &str) -> Result<&dyn LlmClient> {
        let name = provider.to_lowercase();
        match self.clients.get(&name) {
            Some(client) => Ok(client.as_ref()),
            None if KNOWN_PROVIDERS.contains(&name.as_str()) => {
                Err(FlowError::MissingCredential(name))
            }
            None => Err(FlowError::UnsupportedProvider(provider.to_string())),
        }
    }
}

fn credential(slot: &Option<ProviderConfig>) -> Option<(String, &ProviderConfig)> {
    let provider = slot.as_ref()?;
    provider.api_key().map(|k| (k.to_string(), provider))
}

fn wrap(client: Box<dyn LlmClient>, config: &AppConfig) -> Box<dyn LlmClient> {
    match &config.retry {
        Some(retry) => Box::new(RetryingClient::new(client, retry.clone())),
        None => client,
    }
}

impl LlmClient for ProviderRouter {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let client = self.route(&request.provider)?;
            debug!(provider = %request.provider, "Routing generation request");
            client.generate(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstack_core::config::ProvidersConfig;

    struct Fixed(&'static str);

    impl LlmClient for Fixed {
        fn generate(&self, _request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
            let text = self.0.to_string();
            Box::pin(async move { Ok(text) })
        }
    }

    fn request(provider: &str) -> GenerationRequest {
        GenerationRequest {
            query: "q".into(),
            context: None,
            system_prompt: None,
            provider: provider.into(),
            model: None,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    #[tokio::test]
    async fn test_routes_case_insensitively() {
        let router = ProviderRouter::new()
            .with_client("openai", Box::new(Fixed("from openai")))
            .with_client("Gemini", Box::new(Fixed("from gemini")));
        assert_eq!(router.generate(request("OpenAI")).await.unwrap(), "from openai");
        assert_eq!(router.generate(request("gemini")).await.unwrap(), "from gemini");
    }

    #[tokio::test]
    async fn test_unconfigured_known_provider_is_missing_credential() {
        let router = ProviderRouter::new().with_client("openai", Box::new(Fixed("x")));
        let err = router.generate(request("gemini")).await.unwrap_err();
        assert!(matches!(err, FlowError::MissingCredential(ref p) if p == "gemini"));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_unknown_provider_is_unsupported() {
        let router = ProviderRouter::new();
        let err = router.generate(request("anthropic")).await.unwrap_err();
        assert_eq!(err.to_string(), "Provider not supported: anthropic");
    }

    #[test]
    fn test_from_config_registers_keyed_providers_only() {
        let config = AppConfig {
            providers: ProvidersConfig {
                openai: Some(ProviderConfig {
                    api_key: Some("sk-test".into()),
                    base_url: None,
                }),
                gemini: Some(ProviderConfig {
                    api_key: Some("${GEMINI_API_KEY}".into()),
                    base_url: None,
                }),
            },
            ..AppConfig::default()
        };
        assert_eq!(ProviderRouter::from_config(&config).providers(), vec!["openai"]);
    }
}
