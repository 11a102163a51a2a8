use super::parser::{parse_minimap, strip_thinking};
use crate::error::BackendError;
use crate::llm::{ChatMessage, LLMClient, LLMRequest};
use crate::model::{MiniMap, Warehouse};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Produces a mini-map for one warehouse; `Ok(None)` means nothing usable came back
#[async_trait]
pub trait MiniMapGenerator: Send + Sync {
    async fn generate(
        &self,
        catalogue: &str,
        warehouse: &Warehouse,
        git_path: &Path,
        cancel: CancellationToken,
    ) -> Result<Option<MiniMap>, BackendError>;
}

fn build_prompt(catalogue: &str, repository_url: &str, branch: &str) -> String {
    format!(
        r#"Build a knowledge map of the repository below as a markdown outline.

Repository: {repository_url}
Branch: {branch}

<code_files>
{catalogue}
</code_files>

Rules:
- Use exactly one top-level heading (`#`) naming the project.
- Each deeper heading level (`##`, `###`, ...) is a sub-area of the heading above it.
- When a node corresponds to a file or directory, write it as `## Title:relative/path`.
- Output only the headings; no prose, no code fences.
"#
    )
}

pub struct LlmMiniMapGenerator {
    llm_client: Arc<dyn LLMClient>,
    max_tokens: u32,
    attempts: u32,
}

impl LlmMiniMapGenerator {
    pub fn new(llm_client: Arc<dyn LLMClient>, max_tokens: u32) -> Self {
        Self {
            llm_client,
            max_tokens,
            attempts: 3,
        }
    }

    /// Number of requests made before an empty answer is accepted as final
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }
}

#[async_trait]
impl MiniMapGenerator for LlmMiniMapGenerator {
    async fn generate(
        &self,
        catalogue: &str,
        warehouse: &Warehouse,
        git_path: &Path,
        cancel: CancellationToken,
    ) -> Result<Option<MiniMap>, BackendError> {
        let repository_url = warehouse.address.replace(".git", "");
        let prompt = build_prompt(catalogue, &repository_url, &warehouse.branch);

        for attempt in 1..=self.attempts {
            let request = LLMRequest::new(vec![ChatMessage::user(prompt.clone())])
                .with_max_tokens(self.max_tokens);

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                response = self.llm_client.chat(request) => response?,
            };

            let answer = strip_thinking(&response.content);
            if answer.is_empty() {
                warn!(
                    warehouse_id = %warehouse.id,
                    attempt,
                    attempts = self.attempts,
                    "Mini-map answer was empty"
                );
                continue;
            }

            debug!(
                warehouse_id = %warehouse.id,
                git_path = %git_path.display(),
                chars = answer.len(),
                "Mini-map answer received"
            );
            return Ok(parse_minimap(&answer));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLLMClient, MockResponse};
    use crate::model::WarehouseStatus;
    use std::time::Duration;

    fn warehouse() -> Warehouse {
        Warehouse {
            id: "w1".to_string(),
            name: "widget".to_string(),
            organization: "acme".to_string(),
            address: "https://example.com/acme/widget.git".to_string(),
            branch: "develop".to_string(),
            status: WarehouseStatus::Completed,
            classification: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_generates_tree_and_strips_thinking() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::text(
            "<thinking>look at src</thinking>\n# Widget\n## Core:src/core.rs",
        ));
        let generator = LlmMiniMapGenerator::new(client.clone(), 2048);

        let map = generator
            .generate("src/core.rs\n", &warehouse(), Path::new("/tmp/w"), CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(map.title, "Widget");
        assert_eq!(map.nodes[0].url, "src/core.rs");

        let prompt = &client.last_request().unwrap().messages[0].content;
        assert!(prompt.contains("https://example.com/acme/widget\n"));
        assert!(prompt.contains("Branch: develop"));
    }

    #[tokio::test]
    async fn test_retries_empty_answers() {
        let client = Arc::new(MockLLMClient::new());
        client.add_responses(vec![
            MockResponse::text("   "),
            MockResponse::text("<thinking>hmm</thinking>"),
            MockResponse::text("# Widget"),
        ]);
        let generator = LlmMiniMapGenerator::new(client.clone(), 2048).with_attempts(3);

        let map = generator
            .generate("", &warehouse(), Path::new("/tmp/w"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(map.unwrap().title, "Widget");
        assert_eq!(client.request_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_is_none() {
        let client = Arc::new(MockLLMClient::new());
        client.add_responses(vec![MockResponse::text(""), MockResponse::text("")]);
        let generator = LlmMiniMapGenerator::new(client.clone(), 2048).with_attempts(2);

        let map = generator
            .generate("", &warehouse(), Path::new("/tmp/w"), CancellationToken::new())
            .await
            .unwrap();

        assert!(map.is_none());
        assert_eq!(client.remaining_responses(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_call() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::text("# Late").delayed(Duration::from_secs(30)));
        let generator = LlmMiniMapGenerator::new(client, 2048);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            generator.generate("", &warehouse(), Path::new("/tmp/w"), cancel),
        )
        .await
        .expect("cancellation must abort generation");

        assert!(matches!(result, Err(BackendError::Cancelled)));
    }
}
