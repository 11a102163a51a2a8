//! LLM client abstraction layer
//!
//! This module provides a trait-based abstraction for LLM communication,
//! allowing different backends (GenAI, Mock) to be used interchangeably.
//! Streaming answers are exposed as ordered [`StreamEvent`]s.

mod client;
mod genai;
mod mock;
pub mod types;

pub use client::LLMClient;
pub use genai::GenAIClient;
pub use mock::{MockLLMClient, MockResponse, MockStreamItem};
pub use types::{
    ChatEventStream, ChatMessage, LLMRequest, LLMResponse, MessageRole, StreamEvent, ToolCall,
    ToolDefinition,
};
