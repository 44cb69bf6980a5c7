use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use flowstack_core::error::{FlowError, Result};
use flowstack_core::traits::LlmClient;
use flowstack_core::GenerationRequest;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Google Gemini native API client.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
}

/// One prompt: system prompt or context block, then the question.
pub(crate) fn build_prompt(request: &GenerationRequest) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(prompt) = &request.system_prompt {
        parts.push(prompt.clone());
    } else if let Some(context) = &request.context {
        parts.push(format!("Context:\n{}\n\n", context));
    }
    parts.push(format!("Question: {}\n\nAnswer:", request.query));
    parts.join("\n")
}

impl LlmClient for GeminiClient {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);
            let url = format!(
                "{}/models/{}:generateContent?key={}",
                self.base_url, model, self.api_key
            );
            debug!(model, "Sending Gemini generateContent");

            let body = GeminiRequest {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPart {
                        text: build_prompt(&request),
                    }],
                }],
                generation_config: GenerationConfig {
                    temperature: request.temperature,
                    max_output_tokens: request.max_tokens,
                },
            };

            let response = self
                .http
                .post(&url)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| FlowError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(FlowError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let parsed: GeminiResponse = response
                .json()
                .await
                .map_err(|e| FlowError::LlmParse(e.to_string()))?;
            extract_text(parsed)
        })
    }
}

fn extract_text(response: GeminiResponse) -> Result<String> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| FlowError::LlmParse("response contained no candidates".into()))?;
    Ok(content
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(context: Option<&str>, system_prompt: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            query: "What is Rust?".into(),
            context: context.map(String::from),
            system_prompt: system_prompt.map(String::from),
            provider: "gemini".into(),
            model: None,
            temperature: 0.2,
            max_tokens: 256,
        }
    }

    #[test]
    fn test_prompt_with_context() {
        assert_eq!(
            build_prompt(&request(Some("Rust is fast."), None)),
            "Context:\nRust is fast.\n\n\nQuestion: What is Rust?\n\nAnswer:"
        );
    }

    #[test]
    fn test_prompt_system_prompt_replaces_context() {
        assert_eq!(
            build_prompt(&request(Some("ignored"), Some("You are a tutor."))),
            "You are a tutor.\nQuestion: What is Rust?\n\nAnswer:"
        );
    }

    #[test]
    fn test_prompt_question_only() {
        assert_eq!(
            build_prompt(&request(None, None)),
            "Question: What is Rust?\n\nAnswer:"
        );
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let parsed: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello"},{"text":" world"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let parsed: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(extract_text(parsed), Err(FlowError::LlmParse(_))));
    }
}
