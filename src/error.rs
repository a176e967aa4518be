//! Error types for baton.

use thiserror::Error;

use crate::chat::ChatError;

/// Errors that end a run or reject a configuration.
///
/// A run never returns these directly: [`crate::Runner::run`] captures them in
/// the [`crate::RunResult`].
#[derive(Error, Debug)]
pub enum Error {
    /// The chat adapter failed
    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    /// The turn budget was exhausted before the model produced a final answer
    #[error("maximum turns ({max_turns}) exceeded")]
    MaxTurnsExceeded { max_turns: usize },

    /// The caller-supplied deadline passed while waiting for the model
    #[error("run deadline exceeded")]
    DeadlineExceeded,

    /// A panic or broken invariant inside the run loop
    #[error("internal error: {0}")]
    Internal(String),

    /// Context snapshot (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration or wiring
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the run stopped because it hit the turn budget.
    pub fn is_max_turns(&self) -> bool {
        matches!(self, Error::MaxTurnsExceeded { .. })
    }
}

/// Errors raised by a single tool call.
///
/// These are fed back to the model as the tool's result and never abort a run.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    Execution(String),

    #[error("invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// An external tool provider could not list its tools
    #[error("tool provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    #[error("tool '{0}' panicked")]
    Panicked(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Build an execution error from any displayable message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        ToolError::Execution(message.to_string())
    }
}

/// Result type for baton operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_turns_is_distinguishable() {
        assert!(Error::MaxTurnsExceeded { max_turns: 3 }.is_max_turns());
        assert!(!Error::Internal("boom".into()).is_max_turns());
        assert!(!Error::Chat(ChatError::Timeout).is_max_turns());
    }

    #[test]
    fn test_tool_error_messages() {
        assert_eq!(ToolError::msg("no such customer").to_string(), "no such customer");
        let err = ToolError::InvalidArguments {
            tool: "lookup".into(),
            message: "\"id\" is a required property".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid arguments for tool 'lookup': \"id\" is a required property"
        );
    }
}
