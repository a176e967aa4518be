//! Outcome of a run.

use crate::chat::Output;
use crate::context::RunContext;
use crate::error::Error;
use crate::message::Usage;

/// Immutable record of how a run ended.
///
/// Every call to [`crate::Runner::run`] produces exactly one of these, whether
/// the run succeeded or not.
#[derive(Debug)]
pub struct RunResult {
    output: Option<Output>,
    context: RunContext,
    usage: Usage,
    error: Option<Error>,
    turns: usize,
}

impl RunResult {
    pub(crate) fn success(output: Output, context: RunContext, turns: usize) -> Self {
        Self {
            output: Some(output),
            usage: context.usage(),
            context,
            error: None,
            turns,
        }
    }

    pub(crate) fn failure(error: Error, context: RunContext, turns: usize) -> Self {
        Self {
            output: None,
            usage: context.usage(),
            context,
            error: Some(error),
            turns,
        }
    }

    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    /// Final text, if the run succeeded with textual output.
    pub fn output_text(&self) -> Option<&str> {
        self.output.as_ref().and_then(Output::as_text)
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Take the context back, e.g. to persist it or start the next run.
    pub fn into_context(self) -> RunContext {
        self.context
    }

    /// Usage accumulated over the whole conversation, including prior runs
    /// restored into the context.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_max_turns_exceeded(&self) -> bool {
        self.error.as_ref().is_some_and(Error::is_max_turns)
    }

    /// Model round-trips made by this run.
    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Agent that was active when the run ended.
    pub fn current_agent(&self) -> Option<&str> {
        self.context.current_agent()
    }
}
