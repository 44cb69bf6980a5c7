use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use flowstack_core::config::AppConfig;
use flowstack_core::error::{FlowError, Result};
use flowstack_core::traits::EmbeddingProvider;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const OPENAI_DEFAULT_MODEL: &str = "text-embedding-ada-002";
pub const GEMINI_DEFAULT_MODEL: &str = "models/embedding-001";

/// Wire format spoken by an embedding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingApi {
    /// `POST {base}/embeddings` with bearer auth (OpenAI, Ollama, vLLM, ...).
    OpenAi,
    /// `POST {base}/{model}:batchEmbedContents?key=...`.
    Gemini,
}

/// HTTP embedding backend for one provider.
pub struct HttpEmbeddingBackend {
    client: reqwest::Client,
    api: EmbeddingApi,
    base_url: String,
    api_key: String,
}

impl HttpEmbeddingBackend {
    pub fn openai(api_key: &str) -> Self {
        Self::new(EmbeddingApi::OpenAi, OPENAI_API_BASE, api_key)
    }

    pub fn gemini(api_key: &str) -> Self {
        Self::new(EmbeddingApi::Gemini, GEMINI_API_BASE, api_key)
    }

    pub fn new(api: EmbeddingApi, base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn with_base_url(self, base_url: &str) -> Self {
        Self::new(self.api, base_url, &self.api_key)
    }

    pub fn default_model(&self) -> &'static str {
        match self.api {
            EmbeddingApi::OpenAi => OPENAI_DEFAULT_MODEL,
            EmbeddingApi::Gemini => GEMINI_DEFAULT_MODEL,
        }
    }

    /// Embed a batch of texts; one vector per input, in input order.
    pub async fn embed_batch(&self, texts: &[String], model: Option<&str>) -> Result<Vec<Vec<f32>>> {
        let model = model.unwrap_or(self.default_model());
        let vectors = match self.api {
            EmbeddingApi::OpenAi => self.embed_openai(texts, model).await?,
            EmbeddingApi::Gemini => self.embed_gemini(texts, model).await?,
        };
        if vectors.len() != texts.len() {
            return Err(FlowError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    async fn embed_openai(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: model.to_string(),
                input: texts.to_vec(),
            })
            .send()
            .await
            .map_err(|e| FlowError::Embedding(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FlowError::Embedding(format!("API error {}: {}", status, body)));
        }

        let body: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| FlowError::Embedding(format!("failed to parse response: {}", e)))?;

        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn embed_gemini(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let model = gemini_model_path(model);
        let url = format!(
            "{}/{}:batchEmbedContents?key={}",
            self.base_url, model, self.api_key
        );
        let resp = self
            .client
            .post(&url)
            .json(&gemini_request(texts, &model))
            .send()
            .await
            .map_err(|e| FlowError::Embedding(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FlowError::Embedding(format!("API error {}: {}", status, body)));
        }

        let body: GeminiBatchResponse = resp
            .json()
            .await
            .map_err(|e| FlowError::Embedding(format!("failed to parse response: {}", e)))?;

        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GeminiBatchRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
    task_type: &'static str,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiBatchResponse {
    #[serde(default)]
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn gemini_request(texts: &[String], model: &str) -> GeminiBatchRequest {
    GeminiBatchRequest {
        requests: texts
            .iter()
            .map(|text| GeminiEmbedRequest {
                model: model.to_string(),
                content: GeminiContent {
                    parts: vec![GeminiPart { text: text.clone() }],
                },
                task_type: "RETRIEVAL_DOCUMENT",
            })
            .collect(),
    }
}

/// Dispatches embedding calls by provider name (case-insensitive).
#[derive(Default)]
pub struct EmbeddingRouter {
    backends: HashMap<String, HttpEmbeddingBackend>,
}

impl EmbeddingRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend for each provider with an API key configured.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut router = Self::new();
        if let Some(openai) = &config.providers.openai {
            if let Some(key) = openai.api_key() {
                let mut backend = HttpEmbeddingBackend::openai(key);
                if let Some(base_url) = &openai.base_url {
                    backend = backend.with_base_url(base_url);
                }
                router = router.with_backend("openai", backend);
            }
        }
        if let Some(gemini) = &config.providers.gemini {
            if let Some(key) = gemini.api_key() {
                let mut backend = HttpEmbeddingBackend::gemini(key);
                if let Some(base_url) = &gemini.base_url {
                    backend = backend.with_base_url(base_url);
                }
                router = router.with_backend("gemini", backend);
            }
        }
        router
    }

    pub fn with_backend(mut self, name: &str, backend: HttpEmbeddingBackend) -> Self {
        self.backends.insert(name.to_lowercase(), backend);
        self
    }

    fn route(&self, provider: &str) -> Result<&HttpEmbeddingBackend> {
        let name = provider.to_lowercase();
        match self.backends.get(&name) {
            Some(backend) => Ok(backend),
            None if name == "openai" || name == "gemini" => Err(FlowError::MissingCredential(name)),
            None => Err(FlowError::UnsupportedProvider(provider.to_string())),
        }
    }
}

impl EmbeddingProvider for EmbeddingRouter {
    fn embed(
        &self,
        texts: &[String],
        provider: &str,
        model: Option<&str>,
    ) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let texts = texts.to_vec();
        let provider = provider.to_string();
        let model = model.map(String::from);
        Box::pin(async move {
            let backend = self.route(&provider)?;
            debug!(provider = %provider, count = texts.len(), "Embedding texts");
            backend.embed_batch(&texts, model.as_deref()).await
        })
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstack_core::config::ProviderConfig;

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_gemini_request_shape() {
        let req = gemini_request(&["hello".to_string()], &gemini_model_path("embedding-001"));
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "requests": [{
                    "model": "models/embedding-001",
                    "content": {"parts": [{"text": "hello"}]},
                    "taskType": "RETRIEVAL_DOCUMENT"
                }]
            })
        );
    }

    #[test]
    fn test_default_models() {
        assert_eq!(HttpEmbeddingBackend::openai("k").default_model(), "text-embedding-ada-002");
        assert_eq!(HttpEmbeddingBackend::gemini("k").default_model(), "models/embedding-001");
    }

    #[tokio::test]
    async fn test_router_errors() {
        let router = EmbeddingRouter::new();
        let texts = vec!["q".to_string()];

        let err = router.embed(&texts, "OpenAI", None).await.unwrap_err();
        assert!(matches!(err, FlowError::MissingCredential(ref p) if p == "openai"));

        let err = router.embed(&texts, "cohere", None).await.unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedProvider(_)));
    }

    #[test]
    fn test_router_from_config() {
        let config = AppConfig {
            providers: flowstack_core::config::ProvidersConfig {
                openai: None,
                gemini: Some(ProviderConfig {
                    api_key: Some("g-key".into()),
                    base_url: None,
                }),
            },
            ..AppConfig::default()
        };
        let router = EmbeddingRouter::from_config(&config);
        assert!(router.route("gemini").is_ok());
        assert!(router.route("openai").is_err());
    }
}
