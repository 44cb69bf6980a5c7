use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use flowstack_core::config::RetryConfig;
use flowstack_core::error::{FlowError, Result};
use flowstack_core::traits::LlmClient;
use flowstack_core::GenerationRequest;

/// An LLM client that retries transient failures with exponential backoff.
pub struct RetryingClient {
    inner: Box<dyn LlmClient>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Box<dyn LlmClient>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }
}

pub(crate) fn is_retryable(e: &FlowError) -> bool {
    match e {
        FlowError::LlmRequest(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        _ => false,
    }
}

pub(crate) fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;
            let mut attempt = 0;
            loop {
                match self.inner.generate(request.clone()).await {
                    Ok(text) => return Ok(text),
                    Err(e) if is_retryable(&e) && attempt < max_retries => {
                        let backoff = calculate_backoff(attempt, &self.retry_config);
                        warn!(
                            attempt = attempt + 1,
                            max_retries,
                            provider = %request.provider,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying LLM request"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Flaky {
        failures: u32,
        error: fn() -> FlowError,
        calls: Arc<AtomicU32>,
    }

    impl LlmClient for Flaky {
        fn generate(&self, _request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if n < self.failures {
                Err((self.error)())
            } else {
                Ok("recovered".to_string())
            };
            Box::pin(async move { result })
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            query: "q".into(),
            context: None,
            system_prompt: None,
            provider: "openai".into(),
            model: None,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    fn fast_retries(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&FlowError::LlmRequest("HTTP 429 Too Many Requests".into())));
        assert!(is_retryable(&FlowError::LlmRequest("connection reset".into())));
        assert!(!is_retryable(&FlowError::LlmRequest("HTTP 401 Unauthorized".into())));
        assert!(!is_retryable(&FlowError::LlmParse("HTTP 500".into())));
        assert!(!is_retryable(&FlowError::MissingCredential("openai".into())));
    }

    #[test]
    fn test_backoff_is_capped_and_jittered() {
        let config = RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
        };
        let first = calculate_backoff(0, &config).as_millis();
        assert!((800..=1200).contains(&first));
        let late = calculate_backoff(20, &config).as_millis();
        assert!((24000..=36000).contains(&late));
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = RetryingClient::new(
            Box::new(Flaky {
                failures: 2,
                error: || FlowError::LlmRequest("HTTP 503".into()),
                calls: calls.clone(),
            }),
            fast_retries(3),
        );
        assert_eq!(client.generate(request()).await.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = RetryingClient::new(
            Box::new(Flaky {
                failures: 10,
                error: || FlowError::LlmRequest("HTTP 502".into()),
                calls: calls.clone(),
            }),
            fast_retries(2),
        );
        assert!(client.generate(request()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = RetryingClient::new(
            Box::new(Flaky {
                failures: 1,
                error: || FlowError::LlmRequest("HTTP 400".into()),
                calls: calls.clone(),
            }),
            fast_retries(3),
        );
        assert!(client.generate(request()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
