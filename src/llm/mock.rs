use super::client::LLMClient;
use super::types::{ChatEventStream, LLMRequest, LLMResponse, StreamEvent, ToolCall};
use crate::error::BackendError;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scripted LLM client for tests.
///
/// `chat` pops [`MockResponse`]s in order; `chat_stream` pops scripts of
/// [`MockStreamItem`]s. Streams are lazy: an item is only produced when the
/// consumer polls for it, so [`MockLLMClient::stream_items_consumed`] tells how
/// far a consumer read before stopping.
pub struct MockLLMClient {
    responses: Mutex<VecDeque<MockResponse>>,
    streams: Mutex<VecDeque<Vec<MockStreamItem>>>,
    requests: Mutex<Vec<LLMRequest>>,
    consumed: Arc<AtomicUsize>,
    name: String,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub error: Option<BackendError>,
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            error: None,
            delay: None,
        }
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            error: None,
            delay: None,
        }
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            content: String::new(),
            tool_calls: Vec::new(),
            error: Some(error),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Clone)]
pub enum MockStreamItem {
    Text(String),
    Tool(ToolCall),
    Error(BackendError),
    Delay(Duration),
    /// Blocks until the stream's cancellation token fires
    Hang,
}

impl MockStreamItem {
    pub fn text(content: impl Into<String>) -> Self {
        MockStreamItem::Text(content.into())
    }
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self::with_name("MockLLM")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            consumed: Arc::new(AtomicUsize::new(0)),
            name: name.into(),
        }
    }

    pub fn add_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(response);
        }
    }

    pub fn add_stream(&self, items: Vec<MockStreamItem>) {
        self.streams.lock().unwrap().push_back(items);
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    pub fn remaining_streams(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    /// Number of requests received through either `chat` or `chat_stream`
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<LLMRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Text and tool items handed to stream consumers so far
    pub fn stream_items_consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }

    pub fn completion_call(call_id: impl Into<String>, answer: impl Into<String>) -> ToolCall {
        ToolCall {
            call_id: call_id.into(),
            name: crate::synthesis::COMPLETION_TOOL_NAME.to_string(),
            arguments: serde_json::json!({ "answer": answer.into() }),
        }
    }
}

impl Default for MockLLMClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn next_scripted(
    mut script: VecDeque<MockStreamItem>,
    cancel: CancellationToken,
    consumed: Arc<AtomicUsize>,
) -> Option<(
    Result<StreamEvent, BackendError>,
    (VecDeque<MockStreamItem>, CancellationToken, Arc<AtomicUsize>),
)> {
    loop {
        if cancel.is_cancelled() && !script.is_empty() {
            script.clear();
            return Some((Err(BackendError::Cancelled), (script, cancel, consumed)));
        }

        let item = script.pop_front()?;
        match item {
            MockStreamItem::Delay(duration) => {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        script.clear();
                        return Some((Err(BackendError::Cancelled), (script, cancel, consumed)));
                    }
                    _ = tokio::time::sleep(duration) => continue,
                }
            }
            MockStreamItem::Hang => {
                cancel.cancelled().await;
                script.clear();
                return Some((Err(BackendError::Cancelled), (script, cancel, consumed)));
            }
            MockStreamItem::Error(error) => {
                script.clear();
                return Some((Err(error), (script, cancel, consumed)));
            }
            MockStreamItem::Text(text) => {
                consumed.fetch_add(1, Ordering::SeqCst);
                return Some((Ok(StreamEvent::TextDelta(text)), (script, cancel, consumed)));
            }
            MockStreamItem::Tool(call) => {
                consumed.fetch_add(1, Ordering::SeqCst);
                return Some((
                    Ok(StreamEvent::ToolInvocation(call)),
                    (script, cancel, consumed),
                ));
            }
        }
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        self.requests.lock().unwrap().push(request);

        let response =
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| BackendError::Other {
                    message: "MockLLMClient: No more responses in queue".to_string(),
                })?;

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = response.error {
            return Err(error);
        }

        Ok(LLMResponse::with_tool_calls(
            response.content,
            response.tool_calls,
            Duration::from_millis(10),
        ))
    }

    async fn chat_stream(
        &self,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream, BackendError> {
        self.requests.lock().unwrap().push(request);

        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::Other {
                message: "MockLLMClient: No more streams in queue".to_string(),
            })?;

        let state = (
            VecDeque::from(script),
            cancel,
            Arc::clone(&self.consumed),
        );
        let stream = futures_util::stream::unfold(state, |(script, cancel, consumed)| {
            next_scripted(script, cancel, consumed)
        });

        Ok(stream.boxed())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_info(&self) -> Option<String> {
        Some("mock-model".to_string())
    }
}

impl std::fmt::Debug for MockLLMClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLLMClient")
            .field("name", &self.name)
            .field("remaining_responses", &self.remaining_responses())
            .field("remaining_streams", &self.remaining_streams())
            .finish()
    }
}
