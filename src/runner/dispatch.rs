//! Tool dispatch for one turn.
//!
//! Calls are split into handoff and regular calls before anything executes.
//! Regular calls may run concurrently; their results are returned in the
//! order the model requested them, each keyed by its call id.

use futures::FutureExt;
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;

use super::events::{RunCallbacks, RunEvent};
use crate::agent::ToolSet;
use crate::context::{RunContext, ToolContext};
use crate::error::ToolError;
use crate::message::{Message, ToolCall};
use crate::tool::{render_result, validate_arguments};

/// How the regular tool calls of a turn are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// Concurrent when the turn has more than one call
    #[default]
    Auto,
    Sequential,
    Concurrent,
}

impl DispatchStrategy {
    pub fn is_concurrent(self, calls: usize) -> bool {
        match self {
            DispatchStrategy::Auto => calls > 1,
            DispatchStrategy::Sequential => false,
            DispatchStrategy::Concurrent => calls > 0,
        }
    }
}

/// The calls of one turn, classified.
#[derive(Debug, Default)]
pub(crate) struct TurnCalls {
    pub regular: Vec<ToolCall>,
    /// The honoured handoff (first in the model's list)
    pub handoff: Option<ToolCall>,
    pub ignored_handoffs: Vec<ToolCall>,
}

/// Give every call a usable, unique id.
pub(crate) fn ensure_call_ids(calls: &mut [ToolCall]) {
    let mut seen = HashSet::new();
    for call in calls.iter_mut() {
        if call.id.trim().is_empty() || !seen.insert(call.id.clone()) {
            let id = format!("call_{}", uuid::Uuid::new_v4().simple());
            tracing::debug!(tool = %call.name, old = %call.id, new = %id, "assigned tool call id");
            seen.insert(id.clone());
            call.id = id;
        }
    }
}

pub(crate) fn classify(calls: Vec<ToolCall>, tools: &ToolSet) -> TurnCalls {
    let mut turn = TurnCalls::default();
    for call in calls {
        if !tools.is_handoff(&call.name) {
            turn.regular.push(call);
        } else if turn.handoff.is_none() {
            turn.handoff = Some(call);
        } else {
            turn.ignored_handoffs.push(call);
        }
    }

    if let Some(chosen) = &turn.handoff
        && !turn.ignored_handoffs.is_empty()
    {
        let ignored: Vec<&str> = turn.ignored_handoffs.iter().map(|c| c.name.as_str()).collect();
        tracing::warn!(
            chosen = %chosen.name,
            ignored = ?ignored,
            "model requested several handoffs in one turn; using the first"
        );
    }
    turn
}

/// Model-supplied arguments in the shape tools expect.
fn normalize_arguments(args: Value) -> Value {
    match args {
        Value::Null => Value::Object(Map::new()),
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed @ Value::Object(_)) => parsed,
            _ => Value::String(raw),
        },
        other => other,
    }
}

async fn invoke(call: &ToolCall, tools: &ToolSet, ctx: &ToolContext) -> Result<Value, ToolError> {
    let tool = tools
        .get(&call.name)
        .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
    let args = normalize_arguments(call.arguments.clone());
    validate_arguments(&call.name, &tool.parameter_schema(), &args)?;

    AssertUnwindSafe(tool.execute(ctx, args))
        .catch_unwind()
        .await
        .map_err(|_| ToolError::Panicked(call.name.clone()))?
}

async fn execute_call(
    call: &ToolCall,
    tools: &ToolSet,
    ctx: &RunContext,
    agent_name: &str,
    callbacks: &RunCallbacks,
) -> Message {
    callbacks.emit(&RunEvent::ToolStart {
        tool: call.name.clone(),
        args: call.arguments.clone(),
    });

    let tool_ctx = ctx.tool_context(&call.id, agent_name);
    let content = match invoke(call, tools, &tool_ctx).await {
        Ok(value) => render_result(&value),
        Err(e) => {
            tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
            format!("Error: {e}")
        }
    };

    callbacks.emit(&RunEvent::ToolComplete {
        tool: call.name.clone(),
        result: content.clone(),
    });
    Message::tool_result(&call.id, content)
}

/// Execute the regular calls of a turn; one result message per call, in
/// request order.
pub(crate) async fn execute_regular(
    calls: &[ToolCall],
    tools: &ToolSet,
    ctx: &RunContext,
    agent_name: &str,
    callbacks: &RunCallbacks,
    strategy: DispatchStrategy,
) -> Vec<Message> {
    if strategy.is_concurrent(calls.len()) {
        tracing::debug!(calls = calls.len(), "dispatching tools concurrently");
        join_all(
            calls
                .iter()
                .map(|call| execute_call(call, tools, ctx, agent_name, callbacks)),
        )
        .await
    } else {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(execute_call(call, tools, ctx, agent_name, callbacks).await);
        }
        results
    }
}

/// Run the chosen handoff tool; returns its acknowledgement text.
pub(crate) async fn execute_handoff(
    call: &ToolCall,
    tools: &ToolSet,
    ctx: &RunContext,
    agent_name: &str,
) -> Result<String, ToolError> {
    let tool = tools
        .get(&call.name)
        .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
    let tool_ctx = ctx.tool_context(&call.id, agent_name);
    let ack = tool
        .execute(&tool_ctx, normalize_arguments(call.arguments.clone()))
        .await?;
    Ok(render_result(&ack))
}
