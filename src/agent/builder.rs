//! Agent construction.

use serde_json::Value;
use std::sync::Arc;

use super::{Agent, Instructions};
use crate::context::RunContext;
use crate::tool::{Tool, ToolProvider};

/// Builder for an immutable [`Agent`].
#[derive(Clone)]
pub struct AgentBuilder {
    pub(super) name: String,
    pub(super) instructions: Instructions,
    pub(super) model: Option<String>,
    pub(super) tools: Vec<Arc<dyn Tool>>,
    pub(super) handoffs: Vec<Arc<Agent>>,
    pub(super) tool_provider: Option<Arc<dyn ToolProvider>>,
    pub(super) response_schema: Option<Value>,
    pub(super) temperature: Option<f32>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Instructions::Static(String::new()),
            model: None,
            tools: Vec::new(),
            handoffs: Vec::new(),
            tool_provider: None,
            response_schema: None,
            temperature: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set fixed system instructions.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Instructions::Static(instructions.into());
        self
    }

    /// Compute the system instructions from the run context on every turn.
    ///
    /// The function must not have side effects.
    pub fn dynamic_instructions<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunContext) -> String + Send + Sync + 'static,
    {
        self.instructions = Instructions::Dynamic(Arc::new(f));
        self
    }

    /// Set the model (falls back to the runner's default model).
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn handoff(mut self, target: Arc<Agent>) -> Self {
        self.handoffs.push(target);
        self
    }

    pub fn handoffs(mut self, targets: impl IntoIterator<Item = Arc<Agent>>) -> Self {
        self.handoffs.extend(targets);
        self
    }

    /// Attach an external tool source (e.g. an MCP server).
    pub fn tool_provider(mut self, provider: Arc<dyn ToolProvider>) -> Self {
        self.tool_provider = Some(provider);
        self
    }

    /// Ask the model for structured output matching this JSON Schema.
    pub fn response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Freeze the agent. Declared tools are deduplicated by name (first one
    /// wins) and handoff targets by identity.
    pub fn build(self) -> Arc<Agent> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(self.tools.len());
        for tool in self.tools {
            if tools.iter().any(|t| t.name() == tool.name()) {
                tracing::warn!(agent = %self.name, tool = tool.name(), "duplicate tool ignored");
                continue;
            }
            tools.push(tool);
        }

        let agent = Agent {
            name: self.name,
            instructions: self.instructions,
            model: self.model,
            tools,
            handoff_targets: Default::default(),
            tool_provider: self.tool_provider,
            external_tools: Default::default(),
            response_schema: self.response_schema,
            temperature: self.temperature,
        };
        agent.register_handoffs(self.handoffs);
        Arc::new(agent)
    }
}

impl std::fmt::Debug for AgentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentBuilder")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &self.tools.len())
            .field("handoffs", &self.handoffs.len())
            .finish_non_exhaustive()
    }
}
