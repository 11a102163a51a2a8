use super::context::ProcessingContext;
use anyhow::Result;
use async_trait::async_trait;

/// One unit of work in a [`Pipeline`](super::Pipeline).
///
/// Steps read and write the shared context; the returned value is recorded
/// under the step name in `step_results` and does not flow anywhere else.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Stable name used for spans, progress events and failure reports
    fn name(&self) -> &'static str;

    async fn execute(&self, context: &mut ProcessingContext) -> Result<serde_json::Value>;
}
