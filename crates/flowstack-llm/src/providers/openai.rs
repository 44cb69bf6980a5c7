use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use flowstack_core::error::{FlowError, Result};
use flowstack_core::traits::LlmClient;
use flowstack_core::GenerationRequest;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI-compatible chat completions client. Works with OpenAI, Ollama,
/// vLLM, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    /// Point the client at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Debug, PartialEq)]
pub(crate) struct OaiMessage {
    role: &'static str,
    content: String,
}

// Response types
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// System message first, then the query as the user turn.
pub(crate) fn build_messages(request: &GenerationRequest) -> Vec<OaiMessage> {
    let system = match (&request.system_prompt, &request.context) {
        (Some(prompt), _) => prompt.clone(),
        (None, Some(context)) => format!(
            "You are a helpful assistant. Use the following context to answer questions:\n\n{}",
            context
        ),
        (None, None) => "You are a helpful assistant.".to_string(),
    };

    vec![
        OaiMessage {
            role: "system",
            content: system,
        },
        OaiMessage {
            role: "user",
            content: request.query.clone(),
        },
    ]
}

impl LlmClient for OpenAiClient {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let body = ChatRequest {
                model: request
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                messages: build_messages(&request),
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            };
            debug!(model = %body.model, "Sending OpenAI chat completion");

            let response = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
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

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| FlowError::LlmParse(e.to_string()))?;

            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| FlowError::LlmParse("response contained no choices".into()))
        })
    }
}
