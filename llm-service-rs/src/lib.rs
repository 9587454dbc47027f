// llm-service-rs/src/lib.rs
// Completion service used by the generative repair stages.

mod llm_client;

pub use llm_client::{LLMClient, LLMConfig, LLMError, DEFAULT_SYSTEM_PROMPT};

use async_trait::async_trait;

/// A text-completion backend: prompt in, free text out.
///
/// Implementations own their retry and timeout policy; an `Err` means the
/// call is finished and failed.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LLMError>;
}

#[async_trait]
impl CompletionService for LLMClient {
    async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
        self.generate_text(prompt, None).await
    }
}
