//! Handoff tools.
//!
//! Every handoff target of an agent is exposed to the model as a tool named
//! `transfer_to_<target>`. Calling it does no work: it leaves a
//! [`PendingHandoff`] in the run context, and the runner switches the active
//! agent once the turn's tool calls are done.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, LazyLock};

use crate::agent::Agent;
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::tool::{Param, ParamType, Tool};

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("valid regex"));

/// `"Billing Agent"`, `"BillingAgent"` and `"billing-agent"` all become
/// `"billing_agent"`.
pub fn snake_case(name: &str) -> String {
    let split = CAMEL_BOUNDARY.replace_all(name, "${1}_${2}");
    let joined = NON_WORD.replace_all(&split, "_");
    joined.trim_matches('_').to_lowercase()
}

/// Tool name used to hand off to `agent_name`.
pub fn handoff_tool_name(agent_name: &str) -> String {
    format!("transfer_to_{}", snake_case(agent_name))
}

/// Marker left by a handoff tool for the runner.
#[derive(Debug, Clone)]
pub struct PendingHandoff {
    pub target: Arc<Agent>,
    pub reason: String,
}

/// Audit entry for a handoff that was honoured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub from: String,
    pub to: String,
    pub reason: String,
    /// Text returned by the handoff tool; never shown to the end user
    pub acknowledgement: String,
}

/// The tool that transfers control to one target agent.
#[derive(Debug, Clone)]
pub struct HandoffTool {
    name: String,
    description: String,
    target: Arc<Agent>,
}

impl HandoffTool {
    pub fn new(target: Arc<Agent>) -> Self {
        Self {
            name: handoff_tool_name(target.name()),
            description: format!(
                "Transfer the conversation to {}. Use when the request is better handled by {}.",
                target.name(),
                target.name()
            ),
            target,
        }
    }

    pub fn target(&self) -> &Arc<Agent> {
        &self.target
    }

    pub(crate) fn acknowledgement(&self) -> String {
        format!("Transferring the conversation to {}.", self.target.name())
    }
}

#[async_trait]
impl Tool for HandoffTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<Param> {
        vec![
            Param::new(
                "reason",
                ParamType::String,
                "Why the conversation is being transferred",
            )
            .optional(),
        ]
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let reason = args
            .get("reason")
            .and_then(Value::as_str)
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Handoff requested by {}", ctx.agent_name()));

        ctx.request_handoff(PendingHandoff {
            target: self.target.clone(),
            reason,
        });
        Ok(Value::String(self.acknowledgement()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use serde_json::json;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("Billing"), "billing");
        assert_eq!(snake_case("Billing Agent"), "billing_agent");
        assert_eq!(snake_case("BillingAgent"), "billing_agent");
        assert_eq!(snake_case("tech-support  v2"), "tech_support_v2");
        assert_eq!(snake_case("  ISP Support "), "isp_support");
    }

    #[test]
    fn test_tool_name_derived_from_target() {
        let tool = HandoffTool::new(Agent::builder("Tech Support").build());
        assert_eq!(tool.name(), "transfer_to_tech_support");
        assert!(tool.description().contains("Tech Support"));
        assert_eq!(tool.parameter_schema()["required"], json!([]));
    }

    #[tokio::test]
    async fn test_execute_sets_pending_handoff() {
        let billing = Agent::builder("Billing").build();
        let tool = HandoffTool::new(billing.clone());
        let ctx = RunContext::new();

        let ack = tool
            .execute(&ctx.tool_context("c1", "Triage"), json!({"reason": "refund"}))
            .await
            .unwrap();
        assert_eq!(ack, json!("Transferring the conversation to Billing."));

        let pending = ctx.take_pending_handoff().unwrap();
        assert!(Arc::ptr_eq(&pending.target, &billing));
        assert_eq!(pending.reason, "refund");
    }

    #[tokio::test]
    async fn test_default_reason() {
        let tool = HandoffTool::new(Agent::builder("Billing").build());
        let ctx = RunContext::new();
        tool.execute(&ctx.tool_context("c1", "Triage"), Value::Null)
            .await
            .unwrap();
        assert_eq!(
            ctx.take_pending_handoff().unwrap().reason,
            "Handoff requested by Triage"
        );
    }
}
