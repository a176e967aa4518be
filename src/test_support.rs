//! Chat model doubles for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::chat::{ChatError, ChatModel, ChatRequest, ChatResponse};
use crate::message::ToolCall;

/// Replays canned responses in order and records every request.
pub(crate) struct ScriptedChat {
    script: Mutex<VecDeque<Result<ChatResponse, ChatError>>>,
    repeat: Option<ChatResponse>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new(responses: impl IntoIterator<Item = ChatResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok))
    }

    pub fn with_results(results: impl IntoIterator<Item = Result<ChatResponse, ChatError>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with the same response.
    pub fn repeating(response: ChatResponse) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        self.requests.lock().unwrap().push(request);
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        self.repeat
            .clone()
            .ok_or_else(|| ChatError::InvalidResponse("script exhausted".into()))
    }
}

/// Computes each response from the request; usable from concurrent runs.
pub(crate) struct FnChat<F>(pub F);

#[async_trait]
impl<F> ChatModel for FnChat<F>
where
    F: Fn(&ChatRequest) -> Result<ChatResponse, ChatError> + Send + Sync,
{
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        (self.0)(&request)
    }
}

pub(crate) fn call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall::new(id, name, args)
}
