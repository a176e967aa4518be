//! A fixed set of agents that can pick up a conversation where it left off.
//!
//! ```ignore
//! let agents = AgentRunner::new(runner, vec![triage, billing, support])?;
//!
//! // Later, with a context restored from storage:
//! let ctx = RunContext::from_json(&saved)?;
//! let result = agents.run("It's account 1234", ctx).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::Agent;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::runner::{RunOptions, RunResult, Runner};

/// Routes each run to the agent that owns the conversation.
///
/// The agent list and name table are built once and never change, so one
/// `AgentRunner` can serve many concurrent runs.
pub struct AgentRunner {
    runner: Runner,
    agents: Vec<Arc<Agent>>,
    by_name: HashMap<String, Arc<Agent>>,
}

impl AgentRunner {
    /// The first agent is the default. On duplicate names the agent
    /// registered last wins the name lookup.
    pub fn new(runner: Runner, agents: Vec<Arc<Agent>>) -> Result<Self> {
        if agents.is_empty() {
            return Err(Error::Config("AgentRunner needs at least one agent".into()));
        }

        let mut by_name = HashMap::with_capacity(agents.len());
        for agent in &agents {
            if by_name.insert(agent.name().to_string(), agent.clone()).is_some() {
                tracing::warn!(agent = %agent.name(), "duplicate agent name; last registration wins");
            }
        }
        Ok(Self {
            runner,
            agents,
            by_name,
        })
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn default_agent(&self) -> &Arc<Agent> {
        &self.agents[0]
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<Agent>> {
        self.by_name.get(name)
    }

    /// The agent that spoke last in `ctx`, or the default agent when nobody
    /// has spoken yet or the speaker is no longer registered.
    pub fn determine_conversation_agent(&self, ctx: &RunContext) -> Arc<Agent> {
        let Some(name) = ctx.last_agent_name() else {
            return self.default_agent().clone();
        };
        match self.agent(name) {
            Some(agent) => agent.clone(),
            None => {
                tracing::warn!(agent = %name, default = %self.default_agent().name(), "unknown agent in history; using default");
                self.default_agent().clone()
            }
        }
    }

    pub async fn run(&self, input: &str, ctx: RunContext) -> RunResult {
        self.run_with(input, ctx, RunOptions::default()).await
    }

    pub async fn run_with(&self, input: &str, ctx: RunContext, options: RunOptions) -> RunResult {
        let agent = self.determine_conversation_agent(&ctx);
        tracing::debug!(agent = %agent.name(), "resuming conversation");
        self.runner.run_with(&agent, input, ctx, options).await
    }
}

impl std::fmt::Debug for AgentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.agents.iter().map(|a| a.name()).collect();
        f.debug_struct("AgentRunner")
            .field("runner", &self.runner)
            .field("agents", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatRequest, ChatResponse};
    use crate::message::Message;
    use crate::test_support::{FnChat, ScriptedChat};

    fn agents() -> Vec<Arc<Agent>> {
        vec![
            Agent::builder("Triage").instructions("Route the customer.").build(),
            Agent::builder("Billing").instructions("Handle billing.").build(),
            Agent::builder("Support").instructions("Fix problems.").build(),
        ]
    }

    fn idle_runner() -> Runner {
        Runner::new(Arc::new(ScriptedChat::new(Vec::<ChatResponse>::new())))
    }

    fn history_from(agent_name: &str) -> RunContext {
        let mut ctx = RunContext::new();
        ctx.push_message(Message::user("my invoice is wrong"));
        ctx.push_message(Message::assistant("What's your account number?", agent_name));
        ctx.push_message(Message::user("1234"));
        ctx
    }

    #[test]
    fn test_rejects_empty_agent_list() {
        let runner = idle_runner();
        let err = AgentRunner::new(runner, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_lookup_and_default() {
        let registry = AgentRunner::new(idle_runner(), agents()).unwrap();
        assert_eq!(registry.default_agent().name(), "Triage");
        assert_eq!(registry.agents().len(), 3);
        assert_eq!(registry.agent("Support").unwrap().name(), "Support");
        assert!(registry.agent("Sales").is_none());
    }

    #[test]
    fn test_last_registration_wins_name_lookup() {
        let first = Agent::builder("Billing").instructions("v1").build();
        let second = Agent::builder("Billing").instructions("v2").build();
        let registry = AgentRunner::new(
            idle_runner(),
            vec![first.clone(), second.clone()],
        )
        .unwrap();

        assert!(Arc::ptr_eq(registry.agent("Billing").unwrap(), &second));
        assert!(Arc::ptr_eq(registry.default_agent(), &first));
    }

    #[test]
    fn test_determine_conversation_agent() {
        let registry = AgentRunner::new(idle_runner(), agents()).unwrap();

        assert_eq!(registry.determine_conversation_agent(&RunContext::new()).name(), "Triage");
        assert_eq!(registry.determine_conversation_agent(&history_from("Billing")).name(), "Billing");
        assert_eq!(registry.determine_conversation_agent(&history_from("DeletedAgent")).name(), "Triage");

        let mut untagged = RunContext::new();
        untagged.push_message(Message::user("hello"));
        assert_eq!(registry.determine_conversation_agent(&untagged).name(), "Triage");
    }

    #[tokio::test]
    async fn test_resumed_conversation_routes_to_billing() {
        let chat = Arc::new(ScriptedChat::new([ChatResponse::text("Found account 1234.")]));
        let registry = AgentRunner::new(Runner::new(chat.clone()), agents()).unwrap();

        let saved = history_from("Billing").to_json().unwrap();
        let result = registry.run("", RunContext::from_json(&saved).unwrap()).await;

        assert!(result.is_success());
        assert_eq!(result.current_agent(), Some("Billing"));
        assert_eq!(chat.requests()[0].instructions, "Handle billing.");
        assert_eq!(chat.requests()[0].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_agent_falls_back_to_default() {
        let chat = Arc::new(ScriptedChat::new([ChatResponse::text("How can I help?")]));
        let registry = AgentRunner::new(Runner::new(chat.clone()), agents()).unwrap();

        let result = registry.run("", history_from("DeletedAgent")).await;

        assert!(result.is_success());
        assert_eq!(result.current_agent(), Some("Triage"));
        assert_eq!(chat.requests()[0].instructions, "Route the customer.");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_share_registry() {
        let chat = Arc::new(FnChat(|request: &ChatRequest| {
            Ok::<_, crate::chat::ChatError>(ChatResponse::text(request.instructions.clone()))
        }));
        let registry = Arc::new(AgentRunner::new(Runner::new(chat), agents()).unwrap());

        let handles: Vec<_> = ["Billing", "Support", "DeletedAgent", "Billing"]
            .into_iter()
            .map(|speaker| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.run("", history_from(speaker)).await })
            })
            .collect();

        let mut outputs = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap();
            outputs.push(result.output_text().unwrap().to_string());
        }
        assert_eq!(
            outputs,
            vec!["Handle billing.", "Fix problems.", "Route the customer.", "Handle billing."]
        );
    }
}
