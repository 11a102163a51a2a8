//! Streaming answer synthesis over a repository catalogue.
//!
//! The model answers as a stream of [`StreamEvent`]s. Text deltas are appended
//! in arrival order; a call to the completion tool ends consumption at once and
//! its payload replaces whatever text was streamed before it.

use crate::error::BackendError;
use crate::llm::{ChatMessage, LLMClient, LLMRequest, StreamEvent, ToolCall, ToolDefinition};
use crate::model::{AnswerCost, Warehouse};
use futures_util::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const COMPLETION_TOOL_NAME: &str = "complete";

const SYSTEM_PROMPT: &str = r#"You are a senior engineer who has studied the repository described below.
Answer strictly from what the repository contains; say so when it does not cover the question.
Write in clear, well-structured markdown.

When your answer is final, call the `complete` tool with the full answer as its `answer`
argument. Anything you stream before that call is treated as a draft."#;

const ANSWER_REMINDER: &str = r#"<system-reminder>
- Give a detailed, professional answer grounded in the repository contents above.
- Answer the question as completely and promptly as possible.
</system-reminder>"#;

/// Tool the model calls with its authoritative final answer
pub fn completion_tool() -> ToolDefinition {
    ToolDefinition {
        name: COMPLETION_TOOL_NAME.to_string(),
        description: "Submit the final answer. Call exactly once when the answer is complete."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "The complete final answer in markdown"
                }
            },
            "required": ["answer"]
        }),
    }
}

/// Answer payload carried by a completion tool call, if it has one
fn completion_payload(call: &ToolCall) -> Option<String> {
    if call.name != COMPLETION_TOOL_NAME {
        return None;
    }
    // OpenAI-compatible adapters deliver arguments as unparsed JSON text
    let payload = match &call.arguments {
        serde_json::Value::String(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(parsed) if parsed.is_object() => parsed.get("answer")?.as_str()?.to_string(),
            _ => raw.clone(),
        },
        other => other.get("answer")?.as_str()?.to_string(),
    };
    if payload.trim().is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Repository facts the answer is grounded on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryContext {
    pub name: String,
    pub address: String,
    pub branch: String,
}

impl RepositoryContext {
    pub fn from_warehouse(warehouse: &Warehouse) -> Self {
        Self {
            name: format!("{}/{}", warehouse.organization, warehouse.name),
            address: warehouse.address.trim_end_matches(".git").to_string(),
            branch: warehouse.branch.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub question: String,
    pub catalogue: String,
    pub repository: RepositoryContext,
    /// Extra guidance appended to the system message
    pub instructions: Option<String>,
}

impl SynthesisRequest {
    pub fn new(
        question: impl Into<String>,
        catalogue: impl Into<String>,
        repository: RepositoryContext,
    ) -> Self {
        Self {
            question: question.into(),
            catalogue: catalogue.into(),
            repository,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    fn messages(&self) -> Vec<ChatMessage> {
        let mut system = format!(
            "{}\n\nRepository: {} ({})\nBranch: {}\n\n<catalogue>\n{}\n</catalogue>",
            SYSTEM_PROMPT,
            self.repository.name,
            self.repository.address,
            self.repository.branch,
            self.catalogue
        );
        if let Some(instructions) = &self.instructions {
            system.push_str("\n\n");
            system.push_str(instructions);
        }

        vec![
            ChatMessage::system(system),
            ChatMessage::user(format!("{}\n\n{}", self.question, ANSWER_REMINDER)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStatus {
    /// The stream ended normally; the answer is the concatenated text
    Streamed,
    /// The completion tool fired; the answer is its payload
    CompletedByTool,
    /// The caller cancelled; the answer is whatever had streamed so far
    Cancelled,
    /// An error was converted into an apologetic answer
    Degraded,
    /// Served from the question cache without calling the model
    Cached,
}

#[derive(Debug, Clone)]
pub struct SynthesisAnswer {
    pub text: String,
    pub status: AnswerStatus,
    pub elapsed: Duration,
    pub streamed_tokens: u32,
}

impl SynthesisAnswer {
    /// Only complete, non-degraded answers may be memoized
    pub fn is_cacheable(&self) -> bool {
        matches!(
            self.status,
            AnswerStatus::Streamed | AnswerStatus::CompletedByTool
        )
    }

    pub fn cost(&self) -> AnswerCost {
        AnswerCost {
            latency_ms: self.elapsed.as_millis() as u64,
            streamed_tokens: self.streamed_tokens,
        }
    }
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("Synthesis cancelled by caller")]
    Cancelled { partial: String, streamed_tokens: u32 },
}

pub fn degraded_answer(error: &SynthesisError) -> String {
    format!("Sorry, an error occurred while generating the answer: {}", error)
}

pub struct DocumentSynthesisStage {
    llm_client: Arc<dyn LLMClient>,
    max_tokens: u32,
}

impl DocumentSynthesisStage {
    pub fn new(llm_client: Arc<dyn LLMClient>, max_tokens: u32) -> Self {
        Self {
            llm_client,
            max_tokens,
        }
    }

    /// Interactive entry point: never fails.
    ///
    /// Caller cancellation yields [`AnswerStatus::Cancelled`] with the partial
    /// text; every other failure yields [`AnswerStatus::Degraded`].
    pub async fn execute(
        &self,
        request: SynthesisRequest,
        cancel: CancellationToken,
    ) -> SynthesisAnswer {
        let start = Instant::now();
        match self.try_execute(request, cancel).await {
            Ok(answer) => answer,
            Err(SynthesisError::Cancelled {
                partial,
                streamed_tokens,
            }) => SynthesisAnswer {
                text: partial,
                status: AnswerStatus::Cancelled,
                elapsed: start.elapsed(),
                streamed_tokens,
            },
            Err(e) => {
                warn!(error = %e, "Synthesis failed, returning degraded answer");
                SynthesisAnswer {
                    text: degraded_answer(&e),
                    status: AnswerStatus::Degraded,
                    elapsed: start.elapsed(),
                    streamed_tokens: 0,
                }
            }
        }
    }

    /// Strict entry point used by pipeline steps: failures propagate.
    pub async fn try_execute(
        &self,
        request: SynthesisRequest,
        cancel: CancellationToken,
    ) -> Result<SynthesisAnswer, SynthesisError> {
        let start = Instant::now();
        info!(
            repository = %request.repository.name,
            question_chars = request.question.len(),
            "Starting answer synthesis"
        );

        let llm_request = LLMRequest::new(request.messages())
            .with_tools(vec![completion_tool()])
            .with_max_tokens(self.max_tokens);

        // Cancelled on our own when the completion tool fires; inherits caller cancellation.
        let stream_cancel = cancel.child_token();

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(SynthesisError::Cancelled { partial: String::new(), streamed_tokens: 0 });
            }
            res = self.llm_client.chat_stream(llm_request, stream_cancel.clone()) => res?,
        };

        let mut text = String::new();
        let mut streamed_tokens: u32 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = stream.next() => Some(item),
            };

            let item = match next {
                None => {
                    debug!(streamed_tokens, "Caller cancelled synthesis");
                    return Err(SynthesisError::Cancelled {
                        partial: text,
                        streamed_tokens,
                    });
                }
                Some(None) => break,
                Some(Some(item)) => item,
            };

            match item {
                Ok(StreamEvent::TextDelta(delta)) => {
                    streamed_tokens += 1;
                    text.push_str(&delta);
                }
                Ok(StreamEvent::ToolInvocation(call)) => match completion_payload(&call) {
                    Some(payload) => {
                        stream_cancel.cancel();
                        drop(stream);
                        info!(
                            discarded_chars = text.len(),
                            answer_chars = payload.len(),
                            duration_ms = start.elapsed().as_millis(),
                            "Completion tool ended the stream"
                        );
                        return Ok(SynthesisAnswer {
                            text: payload,
                            status: AnswerStatus::CompletedByTool,
                            elapsed: start.elapsed(),
                            streamed_tokens,
                        });
                    }
                    None => {
                        debug!(tool = %call.name, "Ignoring tool call without an answer payload");
                    }
                },
                Err(BackendError::Cancelled) if cancel.is_cancelled() => {
                    return Err(SynthesisError::Cancelled {
                        partial: text,
                        streamed_tokens,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            answer_chars = text.len(),
            streamed_tokens,
            duration_ms = start.elapsed().as_millis(),
            "Synthesis stream finished"
        );

        Ok(SynthesisAnswer {
            text,
            status: AnswerStatus::Streamed,
            elapsed: start.elapsed(),
            streamed_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLLMClient, MockStreamItem};

    fn request() -> SynthesisRequest {
        SynthesisRequest::new(
            "How is the project built?",
            "Cargo.toml\nsrc/main.rs\n",
            RepositoryContext {
                name: "acme/widget".to_string(),
                address: "https://example.com/acme/widget".to_string(),
                branch: "main".to_string(),
            },
        )
    }

    fn stage(client: &Arc<MockLLMClient>) -> DocumentSynthesisStage {
        DocumentSynthesisStage::new(client.clone(), 4096)
    }

    #[tokio::test]
    async fn test_streamed_text_is_concatenated_in_order() {
        let client = Arc::new(MockLLMClient::new());
        client.add_stream(vec![
            MockStreamItem::text("Run "),
            MockStreamItem::text("cargo "),
            MockStreamItem::text("build"),
        ]);

        let answer = stage(&client)
            .execute(request(), CancellationToken::new())
            .await;

        assert_eq!(answer.text, "Run cargo build");
        assert_eq!(answer.status, AnswerStatus::Streamed);
        assert_eq!(answer.streamed_tokens, 3);
        assert!(answer.is_cacheable());
    }

    #[tokio::test]
    async fn test_completion_tool_replaces_partial_text() {
        let client = Arc::new(MockLLMClient::new());
        client.add_stream(vec![
            MockStreamItem::text("partial-"),
            MockStreamItem::Tool(MockLLMClient::completion_call("c1", "final answer")),
            MockStreamItem::text("never read"),
        ]);

        let answer = stage(&client)
            .execute(request(), CancellationToken::new())
            .await;

        assert_eq!(answer.text, "final answer");
        assert_eq!(answer.status, AnswerStatus::CompletedByTool);
        assert!(answer.is_cacheable());
        assert_eq!(client.stream_items_consumed(), 2);
    }

    #[tokio::test]
    async fn test_completion_tool_with_json_text_arguments() {
        let client = Arc::new(MockLLMClient::new());
        client.add_stream(vec![
            MockStreamItem::text("partial-"),
            MockStreamItem::Tool(ToolCall {
                call_id: "c1".to_string(),
                name: COMPLETION_TOOL_NAME.to_string(),
                arguments: serde_json::Value::String(
                    r#"{"answer": "final answer"}"#.to_string(),
                ),
            }),
        ]);

        let answer = stage(&client)
            .execute(request(), CancellationToken::new())
            .await;

        assert_eq!(answer.text, "final answer");
        assert_eq!(answer.status, AnswerStatus::CompletedByTool);
    }

    #[tokio::test]
    async fn test_completion_tool_stops_a_stream_that_would_hang() {
        let client = Arc::new(MockLLMClient::new());
        client.add_stream(vec![
            MockStreamItem::Tool(MockLLMClient::completion_call("c1", "done")),
            MockStreamItem::Hang,
        ]);

        let answer = tokio::time::timeout(
            Duration::from_secs(1),
            stage(&client).execute(request(), CancellationToken::new()),
        )
        .await
        .expect("completion must not wait for the rest of the stream");

        assert_eq!(answer.text, "done");
    }

    #[tokio::test]
    async fn test_empty_completion_payload_is_ignored() {
        let client = Arc::new(MockLLMClient::new());
        client.add_stream(vec![
            MockStreamItem::text("streamed"),
            MockStreamItem::Tool(MockLLMClient::completion_call("c1", "  ")),
        ]);

        let answer = stage(&client)
            .execute(request(), CancellationToken::new())
            .await;

        assert_eq!(answer.text, "streamed");
        assert_eq!(answer.status, AnswerStatus::Streamed);
    }

    #[tokio::test]
    async fn test_stream_error_becomes_degraded_answer() {
        let client = Arc::new(MockLLMClient::new());
        client.add_stream(vec![
            MockStreamItem::text("half"),
            MockStreamItem::Error(BackendError::StreamError {
                message: "connection reset".to_string(),
            }),
        ]);

        let answer = stage(&client)
            .execute(request(), CancellationToken::new())
            .await;

        assert_eq!(answer.status, AnswerStatus::Degraded);
        assert!(answer.text.starts_with("Sorry"));
        assert!(answer.text.contains("connection reset"));
        assert!(!answer.is_cacheable());
    }

    #[tokio::test]
    async fn test_strict_mode_propagates_errors() {
        let client = Arc::new(MockLLMClient::new());

        let result = stage(&client)
            .try_execute(request(), CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SynthesisError::Backend(_))));
    }

    #[tokio::test]
    async fn test_caller_cancellation_stops_promptly() {
        let client = Arc::new(MockLLMClient::new());
        client.add_stream(vec![MockStreamItem::text("so far"), MockStreamItem::Hang]);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let answer = tokio::time::timeout(
            Duration::from_secs(1),
            stage(&client).execute(request(), cancel),
        )
        .await
        .expect("cancellation must stop the stream");

        assert_eq!(answer.status, AnswerStatus::Cancelled);
        assert_eq!(answer.text, "so far");
        assert!(!answer.is_cacheable());
    }

    #[test]
    fn test_messages_ground_on_catalogue() {
        let messages = request()
            .with_instructions("Focus on build tooling.")
            .messages();

        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("src/main.rs"));
        assert!(messages[0].content.contains("Focus on build tooling."));
        assert!(messages[1].content.starts_with("How is the project built?"));
    }

    #[test]
    fn test_completion_payload_accepts_plain_string_arguments() {
        let call = ToolCall {
            call_id: "1".to_string(),
            name: COMPLETION_TOOL_NAME.to_string(),
            arguments: serde_json::Value::String("plain".to_string()),
        };
        assert_eq!(completion_payload(&call), Some("plain".to_string()));

        let encoded = ToolCall {
            arguments: serde_json::Value::String(r#"{"answer":"from json"}"#.to_string()),
            ..call.clone()
        };
        assert_eq!(completion_payload(&encoded), Some("from json".to_string()));

        let without_answer = ToolCall {
            arguments: serde_json::Value::String(r#"{"summary":"x"}"#.to_string()),
            ..call.clone()
        };
        assert_eq!(completion_payload(&without_answer), None);

        let other = ToolCall {
            call_id: "2".to_string(),
            name: "read_file".to_string(),
            arguments: json!({"answer": "x"}),
        };
        assert_eq!(completion_payload(&other), None);
    }

    #[test]
    fn test_repository_context_strips_git_suffix() {
        let warehouse = Warehouse {
            id: "w1".to_string(),
            name: "widget".to_string(),
            organization: "acme".to_string(),
            address: "https://example.com/acme/widget.git".to_string(),
            branch: "main".to_string(),
            status: crate::model::WarehouseStatus::Completed,
            classification: None,
            created_at: chrono::Utc::now(),
        };
        let ctx = RepositoryContext::from_warehouse(&warehouse);
        assert_eq!(ctx.address, "https://example.com/acme/widget");
        assert_eq!(ctx.name, "acme/widget");
    }
}
