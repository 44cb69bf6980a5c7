pub mod providers;
pub mod retry;
pub mod router;

pub use providers::gemini::GeminiClient;
pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;
pub use router::ProviderRouter;
