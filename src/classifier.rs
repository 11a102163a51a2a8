//! Model-backed project classification

use crate::error::BackendError;
use crate::llm::{ChatMessage, LLMClient, LLMRequest};
use crate::model::Classification;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Classification request failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Model answer did not name a known classification: {0}")]
    Unrecognized(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectClassifier: Send + Sync {
    async fn classify(&self, catalogue: &str, readme: &str)
        -> Result<Classification, ClassifyError>;
}

fn classify_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<classify>(.*?)</classify>").expect("valid regex"))
}

/// Extracts the category from a `<classify>classifyName:Xxx</classify>` answer
pub fn parse_classification(answer: &str) -> Result<Classification, ClassifyError> {
    let captured = classify_tag()
        .captures(answer)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ClassifyError::Unrecognized("missing <classify> tag".to_string()))?;

    let value = captured.as_str().replace("classifyName:", "");
    value
        .trim()
        .parse::<Classification>()
        .map_err(|e| ClassifyError::Unrecognized(e.0))
}

fn build_prompt(catalogue: &str, readme: &str) -> String {
    let categories: Vec<&str> = Classification::ALL.iter().map(|c| c.as_str()).collect();

    format!(
        r#"Classify this repository into exactly one project category.

Categories: {}

Repository file catalogue:
<catalogue>
{}
</catalogue>

README:
<readme>
{}
</readme>

Consider the primary purpose of the code, not its tooling. Answer with the category
wrapped in a classify tag and nothing else, for example:
<classify>classifyName:Libraries</classify>
"#,
        categories.join(", "),
        catalogue,
        readme
    )
}

pub struct LlmClassifier {
    llm_client: Arc<dyn LLMClient>,
    max_tokens: u32,
}

impl LlmClassifier {
    pub fn new(llm_client: Arc<dyn LLMClient>, max_tokens: u32) -> Self {
        Self {
            llm_client,
            max_tokens,
        }
    }
}

#[async_trait]
impl ProjectClassifier for LlmClassifier {
    async fn classify(
        &self,
        catalogue: &str,
        readme: &str,
    ) -> Result<Classification, ClassifyError> {
        let request = LLMRequest::new(vec![ChatMessage::user(build_prompt(catalogue, readme))])
            .with_temperature(0.1)
            .with_max_tokens(self.max_tokens);

        let response = self.llm_client.chat(request).await?;
        debug!(
            response_time_ms = response.response_time.as_millis(),
            "Classification answer received"
        );

        parse_classification(&response.content)
    }
}
