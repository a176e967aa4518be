//! Agents: named bundles of instructions, tools and handoff targets.
//!
//! An [`Agent`] is immutable once built and is shared (`Arc<Agent>`) by every
//! run that uses it. The only things that change after construction are
//! additive handoff wiring, done at startup, and the per-agent cache of
//! external tools.
//!
//! Handoff targets are held strongly, so agents wired into a cycle
//! (hub-and-spoke or full mesh) live as long as the process. Agents are meant
//! to be built once at startup.

mod builder;
mod toolset;

pub use builder::AgentBuilder;
pub use toolset::{ToolSet, ToolSource};

use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::RunContext;
use crate::handoff::HandoffTool;
use crate::tool::{Tool, ToolProvider};

/// System instructions of an agent.
#[derive(Clone)]
pub enum Instructions {
    Static(String),
    /// Evaluated against the run context on every turn
    Dynamic(Arc<dyn Fn(&RunContext) -> String + Send + Sync>),
}

impl Instructions {
    pub fn resolve(&self, ctx: &RunContext) -> String {
        match self {
            Instructions::Static(text) => text.clone(),
            Instructions::Dynamic(f) => f(ctx),
        }
    }
}

impl std::fmt::Debug for Instructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instructions::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Instructions::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// An LLM persona: instructions, tools and the agents it may hand off to.
pub struct Agent {
    name: String,
    instructions: Instructions,
    model: Option<String>,
    tools: Vec<Arc<dyn Tool>>,
    handoff_targets: Mutex<Vec<Arc<Agent>>>,
    tool_provider: Option<Arc<dyn ToolProvider>>,
    external_tools: tokio::sync::Mutex<Option<Vec<Arc<dyn Tool>>>>,
    response_schema: Option<Value>,
    temperature: Option<f32>,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn instructions(&self) -> &Instructions {
        &self.instructions
    }

    /// System prompt for the current turn.
    pub fn resolve_instructions(&self, ctx: &RunContext) -> String {
        self.instructions.resolve(ctx)
    }

    /// Declared tools, in declaration order.
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn response_schema(&self) -> Option<&Value> {
        self.response_schema.as_ref()
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn handoff_targets(&self) -> Vec<Arc<Agent>> {
        self.handoff_targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Allow handing off to more agents.
    ///
    /// Registration is additive and idempotent: a target that is already
    /// registered is ignored. Safe to call from several threads while agents
    /// are being wired together.
    pub fn register_handoffs(&self, targets: impl IntoIterator<Item = Arc<Agent>>) {
        let mut registered = self
            .handoff_targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for target in targets {
            if registered.iter().any(|t| Arc::ptr_eq(t, &target)) {
                continue;
            }
            tracing::debug!(agent = %self.name, target = %target.name, "handoff registered");
            registered.push(target);
        }
    }

    /// Tools from the external provider, fetched once and then cached.
    ///
    /// A failed fetch is logged and not cached, so the next call retries.
    pub async fn external_tools(&self) -> Vec<Arc<dyn Tool>> {
        let Some(provider) = &self.tool_provider else {
            return Vec::new();
        };

        let mut cache = self.external_tools.lock().await;
        if let Some(tools) = cache.as_ref() {
            return tools.clone();
        }

        match provider.list_tools().await {
            Ok(tools) => {
                tracing::debug!(
                    agent = %self.name,
                    provider = provider.name(),
                    count = tools.len(),
                    "external tools fetched"
                );
                *cache = Some(tools.clone());
                tools
            }
            Err(e) => {
                tracing::warn!(agent = %self.name, error = %e, "failed to fetch external tools");
                Vec::new()
            }
        }
    }

    /// Drop this agent's cached external tools and fetch them again.
    pub async fn refresh_external_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.external_tools.lock().await.take();
        self.external_tools().await
    }

    /// Declared tools, one handoff tool per target and external tools, under
    /// unique names. Recomputed on every call.
    pub async fn all_tools(&self) -> ToolSet {
        let mut set = ToolSet::new();
        for tool in &self.tools {
            set.insert(tool.clone(), ToolSource::Declared);
        }
        for target in self.handoff_targets() {
            let tool: Arc<dyn Tool> = Arc::new(HandoffTool::new(target.clone()));
            set.insert(tool, ToolSource::Handoff(target));
        }
        if let Some(provider) = &self.tool_provider {
            let source = ToolSource::External {
                provider: provider.name().to_string(),
            };
            for tool in self.external_tools().await {
                set.insert(tool, source.clone());
            }
        }
        set
    }

    /// Builder pre-filled with this agent's fields. The external tool cache is
    /// not carried over.
    pub fn to_builder(&self) -> AgentBuilder {
        AgentBuilder {
            name: self.name.clone(),
            instructions: self.instructions.clone(),
            model: self.model.clone(),
            tools: self.tools.clone(),
            handoffs: self.handoff_targets(),
            tool_provider: self.tool_provider.clone(),
            response_schema: self.response_schema.clone(),
            temperature: self.temperature,
        }
    }

    /// A new agent sharing everything but the overridden fields.
    ///
    /// ```ignore
    /// let tenant_support = support.clone_with(|b| b.instructions("Answer in French."));
    /// ```
    pub fn clone_with<F>(&self, f: F) -> Arc<Agent>
    where
        F: FnOnce(AgentBuilder) -> AgentBuilder,
    {
        f(self.to_builder()).build()
    }
}

impl std::fmt::Debug for Agent {
    // Targets are listed by name only: handoff graphs may be cyclic.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tools: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        let targets: Vec<String> = self
            .handoff_targets()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("instructions", &self.instructions)
            .field("tools", &tools)
            .field("handoff_targets", &targets)
            .finish_non_exhaustive()
    }
}
