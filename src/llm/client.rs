use super::types::{ChatEventStream, LLMRequest, LLMResponse};
use crate::error::BackendError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError>;

    /// Streams the answer as ordered [`super::StreamEvent`]s.
    ///
    /// Implementations stop producing items once `cancel` fires; the stream
    /// then ends with `Err(BackendError::Cancelled)` or simply terminates.
    async fn chat_stream(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream, BackendError>;

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }
}
