//! Run events and callbacks for observability.

use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Lifecycle events emitted while a run executes.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// An agent is about to call the model
    AgentThinking { agent: String, input: String },
    /// A regular tool is about to execute
    ToolStart { tool: String, args: Value },
    /// A regular tool finished (errors are reported as their result text)
    ToolComplete { tool: String, result: String },
    /// Control moved to another agent
    AgentHandoff {
        from: String,
        to: String,
        reason: String,
    },
}

/// Type alias for event callbacks
pub type EventCallback = Arc<dyn Fn(&RunEvent) + Send + Sync>;

/// Storage for run callbacks
#[derive(Default, Clone)]
pub struct RunCallbacks {
    pub on_agent_thinking: Option<EventCallback>,
    pub on_tool_start: Option<EventCallback>,
    pub on_tool_complete: Option<EventCallback>,
    pub on_agent_handoff: Option<EventCallback>,
    /// Catch-all callback for any event
    pub on_event: Option<EventCallback>,
}

impl RunCallbacks {
    /// Emit an event to the matching callback(s).
    ///
    /// Callbacks are best-effort: a panicking callback is logged and the run
    /// carries on.
    pub fn emit(&self, event: &RunEvent) {
        let specific = match event {
            RunEvent::AgentThinking { .. } => &self.on_agent_thinking,
            RunEvent::ToolStart { .. } => &self.on_tool_start,
            RunEvent::ToolComplete { .. } => &self.on_tool_complete,
            RunEvent::AgentHandoff { .. } => &self.on_agent_handoff,
        };

        for cb in [specific, &self.on_event].into_iter().flatten() {
            if catch_unwind(AssertUnwindSafe(|| cb(event))).is_err() {
                tracing::warn!(event = ?event, "run callback panicked; ignoring");
            }
        }
    }
}

impl std::fmt::Debug for RunCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCallbacks")
            .field("on_agent_thinking", &self.on_agent_thinking.is_some())
            .field("on_tool_start", &self.on_tool_start.is_some())
            .field("on_tool_complete", &self.on_tool_complete.is_some())
            .field("on_agent_handoff", &self.on_agent_handoff.is_some())
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

fn preview(text: &str, max: usize) -> String {
    let head: String = text.chars().take(max).collect();
    let suffix = if text.chars().count() > max { "..." } else { "" };
    format!("{}{}", head.replace('\n', "\\n"), suffix)
}

/// Callbacks that log every event through `tracing`.
pub fn logging_callbacks() -> RunCallbacks {
    RunCallbacks {
        on_agent_thinking: Some(Arc::new(|e| {
            if let RunEvent::AgentThinking { agent, input } = e {
                tracing::info!(agent = %agent, input = %preview(input, 100), "agent thinking");
            }
        })),
        on_tool_start: Some(Arc::new(|e| {
            if let RunEvent::ToolStart { tool, args } = e {
                tracing::info!(tool = %tool, args = %preview(&args.to_string(), 100), "tool start");
            }
        })),
        on_tool_complete: Some(Arc::new(|e| {
            if let RunEvent::ToolComplete { tool, result } = e {
                tracing::info!(tool = %tool, result = %preview(result, 80), "tool complete");
            }
        })),
        on_agent_handoff: Some(Arc::new(|e| {
            if let RunEvent::AgentHandoff { from, to, reason } = e {
                tracing::info!(from = %from, to = %to, reason = %reason, "agent handoff");
            }
        })),
        ..Default::default()
    }
}
