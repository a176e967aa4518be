//! The chat-completion seam.
//!
//! baton never talks to an LLM provider itself. Every model round-trip goes
//! through a [`ChatModel`] supplied by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::message::{Message, ToolCall, Usage};
use crate::tool::ToolDefinition;

/// Final output of a model turn or of a whole run.
///
/// Structured output is opaque: it is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Output {
    Text(String),
    Structured(Value),
}

impl Output {
    /// The text, if this is a textual output.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Output::Text(text) => Some(text),
            Output::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Output::Text(_) => None,
            Output::Structured(value) => Some(value),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Output::Text(text) if text.is_empty())
    }

    /// Form stored in the conversation history.
    pub(crate) fn to_history_content(&self) -> String {
        match self {
            Output::Text(text) => text.clone(),
            Output::Structured(value) => value.to_string(),
        }
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Output::Text(text)
    }
}

impl From<&str> for Output {
    fn from(text: &str) -> Self {
        Output::Text(text.to_string())
    }
}

/// Everything the adapter needs for one round-trip.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    /// System instructions of the active agent, resolved for this turn
    pub instructions: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    /// When set, the adapter should return [`Output::Structured`]
    pub response_schema: Option<Value>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Per-request timeout the adapter should apply to its transport
    pub timeout: Duration,
    /// Caller-supplied deadline for the whole run
    pub deadline: Option<tokio::time::Instant>,
}

/// What the model answered.
///
/// Text and tool calls may both be present; the run only terminates on a
/// response without tool calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub output: Option<Output>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            output: Some(Output::Text(text.into())),
            ..Default::default()
        }
    }

    pub fn structured(value: Value) -> Self {
        Self {
            output: Some(Output::Structured(value)),
            ..Default::default()
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Failures reported by a chat adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A single LLM round-trip.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_accessors() {
        let text = Output::from("hello");
        assert_eq!(text.as_text(), Some("hello"));
        assert!(text.as_structured().is_none());

        let structured = Output::Structured(json!({"answer": 42}));
        assert!(structured.as_text().is_none());
        assert_eq!(structured.to_history_content(), r#"{"answer":42}"#);
    }

    #[test]
    fn test_empty_output() {
        assert!(Output::from("").is_empty());
        assert!(!Output::Structured(json!("")).is_empty());
    }

    #[test]
    fn test_response_builders() {
        let response = ChatResponse::tool_calls(vec![ToolCall::new("1", "t", json!({}))])
            .with_usage(Usage::new(4, 1));
        assert!(response.has_tool_calls());
        assert!(response.output.is_none());
        assert_eq!(response.usage.total_tokens, 5);
    }
}
