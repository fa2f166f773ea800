//! Boundary to the natural-language completion service.

pub mod openai;

use async_trait::async_trait;

pub use openai::OpenAiResponses;

/// One user turn, optionally continuing an earlier exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub instructions: String,
    pub text: String,
    pub image_urls: Vec<String>,
    pub previous_response_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    /// Handle for continuing the conversation.
    pub id: String,
    pub output_text: String,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn respond(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse>;
}
