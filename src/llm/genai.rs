//! GenAI-based LLM client implementation
//!
//! This module provides an LLM client implementation using the `genai` crate,
//! supporting multiple providers (Ollama, OpenAI, Claude, Gemini, Grok, Groq).

use super::client::LLMClient;
use super::types::{
    ChatEventStream, ChatMessage, LLMRequest, LLMResponse, MessageRole, StreamEvent, ToolCall,
    ToolDefinition,
};
use crate::error::BackendError;
use async_trait::async_trait;
use futures_util::StreamExt;
use genai::adapter::AdapterKind;
use genai::chat::{
    ChatMessage as GenAIChatMessage, ChatOptions, ChatRequest as GenAIChatRequest,
    ChatStreamEvent, Tool as GenAITool,
};
use genai::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Reassembles streamed tool calls.
///
/// OpenAI-compatible adapters send arguments as JSON text split across chunks;
/// a call is released as soon as its accumulated text parses as a JSON object.
/// Adapters that send structured arguments release the call on its first chunk.
#[derive(Debug, Default)]
struct ToolCallAssembler {
    pending: Vec<(ToolCall, String)>,
    released: Vec<String>,
}

impl ToolCallAssembler {
    fn push(&mut self, call: ToolCall) -> Option<ToolCall> {
        if !call.call_id.is_empty() && self.released.contains(&call.call_id) {
            return None;
        }

        let fragment = match &call.arguments {
            serde_json::Value::String(text) => Some(text.clone()),
            serde_json::Value::Null => Some(String::new()),
            _ => None,
        };
        let Some(fragment) = fragment else {
            return self.release(call);
        };

        let index = match self
            .pending
            .iter()
            .position(|(p, _)| p.call_id == call.call_id)
        {
            Some(index) => index,
            None if call.call_id.is_empty() && !self.pending.is_empty() => {
                self.pending.len() - 1
            }
            None => {
                self.pending.push((call.clone(), String::new()));
                self.pending.len() - 1
            }
        };

        let (pending, text) = &mut self.pending[index];
        if pending.name.is_empty() {
            pending.name = call.name;
        }
        // With capture enabled some adapters resend the accumulated text
        if !text.is_empty() && fragment.starts_with(text.as_str()) {
            *text = fragment;
        } else {
            text.push_str(&fragment);
        }

        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(arguments) if arguments.is_object() => {
                let (mut done, _) = self.pending.remove(index);
                done.arguments = arguments;
                self.release(done)
            }
            _ => None,
        }
    }

    fn release(&mut self, call: ToolCall) -> Option<ToolCall> {
        self.pending.retain(|(p, _)| p.call_id != call.call_id);
        self.released.push(call.call_id.clone());
        Some(call)
    }

    /// Calls whose arguments never became a complete object, as raw text
    fn finish(self) -> Vec<ToolCall> {
        self.pending
            .into_iter()
            .map(|(mut call, text)| {
                call.arguments = serde_json::Value::String(text);
                call
            })
            .collect()
    }
}

/// GenAI-based LLM client supporting multiple providers
pub struct GenAIClient {
    client: Client,
    model: String,
    provider: AdapterKind,
    /// Applies to the whole non-streaming call and to each streamed chunk
    timeout: Duration,
}

impl GenAIClient {
    pub fn new(provider: AdapterKind, model: String, timeout: Duration) -> Self {
        debug!(
            "Creating GenAI client: provider={}, model={}",
            provider.as_str(),
            model,
        );

        Self {
            client: Client::default(),
            model,
            provider,
            timeout,
        }
    }

    fn convert_message(msg: &ChatMessage) -> GenAIChatMessage {
        match msg.role {
            MessageRole::System => GenAIChatMessage::system(&msg.content),
            MessageRole::User => GenAIChatMessage::user(&msg.content),
            MessageRole::Assistant => GenAIChatMessage::assistant(&msg.content),
        }
    }

    fn convert_tool(tool: &ToolDefinition) -> GenAITool {
        GenAITool::new(&tool.name)
            .with_description(&tool.description)
            .with_schema(tool.parameters.clone())
    }

    fn convert_tool_call(tc: &genai::chat::ToolCall) -> ToolCall {
        ToolCall {
            call_id: tc.call_id.clone(),
            name: tc.fn_name.clone(),
            arguments: tc.fn_arguments.clone(),
        }
    }

    fn build_request(request: &LLMRequest) -> (GenAIChatRequest, ChatOptions) {
        let messages: Vec<GenAIChatMessage> =
            request.messages.iter().map(Self::convert_message).collect();
        let mut genai_request = GenAIChatRequest::new(messages);
        if !request.tools.is_empty() {
            let tools: Vec<GenAITool> = request.tools.iter().map(Self::convert_tool).collect();
            genai_request = genai_request.with_tools(tools);
        }

        let mut options = ChatOptions::default();
        if let Some(temp) = request.temperature {
            options = options.with_temperature(temp as f64);
        }
        if let Some(max_tokens) = request.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }

        (genai_request, options)
    }

    fn api_error(&self, e: impl std::fmt::Display) -> BackendError {
        error!("{} API error: {}", self.provider.as_str(), e);
        BackendError::ApiError {
            message: format!("{} request failed: {}", self.provider.as_str(), e),
            status_code: None,
        }
    }
}

#[async_trait]
impl LLMClient for GenAIClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let start = std::time::Instant::now();
        let (genai_request, options) = Self::build_request(&request);

        let response = match tokio::time::timeout(
            self.timeout,
            self.client
                .exec_chat(&self.model, genai_request, Some(&options)),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(self.api_error(e)),
            Err(_) => {
                error!(
                    "{} request timed out after {}s",
                    self.provider.as_str(),
                    self.timeout.as_secs()
                );
                return Err(BackendError::TimeoutError {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let content = response.first_text().unwrap_or_default().to_string();
        let tool_calls: Vec<ToolCall> = response
            .tool_calls()
            .into_iter()
            .map(Self::convert_tool_call)
            .collect();

        Ok(LLMResponse::with_tool_calls(
            content,
            tool_calls,
            start.elapsed(),
        ))
    }

    async fn chat_stream(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream, BackendError> {
        let (genai_request, options) = Self::build_request(&request);
        let options = options.with_capture_tool_calls(true);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            res = tokio::time::timeout(
                self.timeout,
                self.client.exec_chat_stream(&self.model, genai_request, Some(&options)),
            ) => match res {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => return Err(self.api_error(e)),
                Err(_) => return Err(BackendError::TimeoutError { seconds: self.timeout.as_secs() }),
            },
        };

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let chunk_timeout = self.timeout;
        let provider = self.provider.as_str().to_string();
        let mut upstream = response.stream;

        tokio::spawn(async move {
            let mut assembler = ToolCallAssembler::default();

            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = tx.send(Err(BackendError::Cancelled)).await;
                        return;
                    }
                    next = tokio::time::timeout(chunk_timeout, upstream.next()) => next,
                };

                let event = match next {
                    Err(_) => {
                        let _ = tx
                            .send(Err(BackendError::TimeoutError {
                                seconds: chunk_timeout.as_secs(),
                            }))
                            .await;
                        return;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        warn!(provider = %provider, error = %e, "Stream interrupted");
                        let _ = tx
                            .send(Err(BackendError::StreamError {
                                message: e.to_string(),
                            }))
                            .await;
                        return;
                    }
                    Ok(Some(Ok(event))) => event,
                };

                match event {
                    ChatStreamEvent::Chunk(chunk) => {
                        if chunk.content.is_empty() {
                            continue;
                        }
                        if tx
                            .send(Ok(StreamEvent::TextDelta(chunk.content)))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    ChatStreamEvent::ToolCallChunk(chunk) => {
                        let call = Self::convert_tool_call(&chunk.tool_call);
                        if let Some(complete) = assembler.push(call) {
                            if tx
                                .send(Ok(StreamEvent::ToolInvocation(complete)))
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                    ChatStreamEvent::End(_) => break,
                    _ => {}
                }
            }

            for call in assembler.finish() {
                if tx.send(Ok(StreamEvent::ToolInvocation(call))).await.is_err() {
                    return;
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    fn name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

impl std::fmt::Debug for GenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAIClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}
