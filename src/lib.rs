//! Baton - multi-agent orchestration for LLM applications
//!
//! Baton runs conversations across a set of specialised agents. Each agent
//! has its own instructions and tools. An agent can hand the conversation to
//! another agent by calling an automatically generated `transfer_to_<agent>`
//! tool. The handoff is invisible to the end user: history carries over and
//! the next agent simply answers.
//!
//! Baton does not talk to LLM providers itself. Plug any provider in by
//! implementing [`ChatModel`].
//!
//! # Quick Start
//!
//! ```ignore
//! use baton::{Agent, FunctionTool, Param, ParamType, RunContext, Runner};
//! use serde_json::json;
//!
//! let lookup = FunctionTool::sync("lookup_invoice", "Find an invoice", |ctx, args| {
//!     ctx.state().set("invoice", &args["id"])?;
//!     Ok(json!({"status": "paid"}))
//! })
//! .param(Param::new("id", ParamType::String, "Invoice id"));
//!
//! let billing = Agent::builder("Billing")
//!     .instructions("You answer billing questions.")
//!     .tool(lookup)
//!     .build();
//! let triage = Agent::builder("Triage")
//!     .instructions("Route the customer to the right specialist.")
//!     .handoff(billing.clone())
//!     .build();
//! billing.register_handoffs([triage.clone()]);
//!
//! let runner = Runner::new(my_chat_model);
//! let result = runner.run(&triage, "Was invoice 42 paid?", RunContext::new()).await;
//! println!("{:?} answered: {:?}", result.current_agent(), result.output_text());
//! ```

mod agent;
mod chat;
mod config;
mod context;
mod error;
mod handoff;
mod message;
mod registry;
mod runner;
mod tool;

#[cfg(test)]
mod test_support;

pub use agent::{Agent, AgentBuilder, Instructions, ToolSet, ToolSource};
pub use chat::{ChatError, ChatModel, ChatRequest, ChatResponse, Output};
pub use config::Config;
pub use context::{ContextSnapshot, RunContext, State, ToolContext};
pub use error::{Error, Result, ToolError};
pub use handoff::{HandoffRecord, HandoffTool, PendingHandoff, handoff_tool_name};
pub use message::{Message, Role, ToolCall, Usage};
pub use registry::AgentRunner;
pub use runner::{
    DispatchStrategy, EventCallback, RunCallbacks, RunEvent, RunOptions, RunResult, Runner,
    logging_callbacks,
};
pub use tool::{FunctionTool, Param, ParamType, Tool, ToolDefinition, ToolProvider, params_schema};
