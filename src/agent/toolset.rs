//! The resolved tool set an agent exposes for one turn.

use std::sync::Arc;

use super::Agent;
use crate::handoff::snake_case;
use crate::tool::{Tool, ToolDefinition};

/// Where a tool in a [`ToolSet`] came from.
#[derive(Debug, Clone)]
pub enum ToolSource {
    Declared,
    Handoff(Arc<Agent>),
    External { provider: String },
}

impl ToolSource {
    fn collision_prefix(&self) -> String {
        match self {
            ToolSource::Declared => "tool".to_string(),
            ToolSource::Handoff(_) => "handoff".to_string(),
            ToolSource::External { provider } => snake_case(provider),
        }
    }
}

#[derive(Debug)]
struct Entry {
    name: String,
    tool: Arc<dyn Tool>,
    source: ToolSource,
}

/// Declared, handoff and external tools under unique names.
///
/// A name that is already taken becomes `<prefix>_<name>`, then
/// `<prefix>_<name>_2`, `<prefix>_<name>_3`, ... Nothing is ever dropped.
#[derive(Debug, Default)]
pub struct ToolSet {
    entries: Vec<Entry>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_taken(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Add a tool and return the name it is exposed under.
    pub fn insert(&mut self, tool: Arc<dyn Tool>, source: ToolSource) -> String {
        let base = tool.name().to_string();
        let name = if self.is_taken(&base) {
            let prefixed = format!("{}_{}", source.collision_prefix(), base);
            let mut candidate = prefixed.clone();
            let mut n = 2;
            while self.is_taken(&candidate) {
                candidate = format!("{prefixed}_{n}");
                n += 1;
            }
            tracing::debug!(tool = %base, renamed = %candidate, "tool name collision");
            candidate
        } else {
            base
        };

        self.entries.push(Entry {
            name: name.clone(),
            tool,
            source,
        });
        name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.tool)
    }

    pub fn source(&self, name: &str) -> Option<&ToolSource> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.source)
    }

    pub fn is_handoff(&self, name: &str) -> bool {
        matches!(self.source(name), Some(ToolSource::Handoff(_)))
    }

    pub fn handoff_target(&self, name: &str) -> Option<&Arc<Agent>> {
        match self.source(name) {
            Some(ToolSource::Handoff(target)) => Some(target),
            _ => None,
        }
    }

    /// Definitions for the chat adapter, under their resolved names.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .map(|e| ToolDefinition {
                name: e.name.clone(),
                description: e.tool.description().to_string(),
                parameters: e.tool.parameter_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::HandoffTool;
    use crate::tool::FunctionTool;
    use serde_json::json;

    fn named(name: &str) -> Arc<dyn Tool> {
        FunctionTool::sync(name, "test tool", |_, _| Ok(json!(null))).into_tool()
    }

    #[test]
    fn test_unique_names_kept() {
        let mut set = ToolSet::new();
        assert_eq!(set.insert(named("lookup"), ToolSource::Declared), "lookup");
        assert_eq!(set.insert(named("refund"), ToolSource::Declared), "refund");
        assert_eq!(set.names(), vec!["lookup", "refund"]);
    }

    #[test]
    fn test_collisions_are_prefixed_not_dropped() {
        let billing = Agent::builder("Billing").build();
        let mut set = ToolSet::new();
        set.insert(named("transfer_to_billing"), ToolSource::Declared);
        let handoff = set.insert(
            Arc::new(HandoffTool::new(billing.clone())),
            ToolSource::Handoff(billing),
        );
        assert_eq!(handoff, "handoff_transfer_to_billing");

        let external = ToolSource::External {
            provider: "Files Server".into(),
        };
        set.insert(named("search"), ToolSource::Declared);
        assert_eq!(set.insert(named("search"), external.clone()), "files_server_search");
        assert_eq!(set.insert(named("search"), external), "files_server_search_2");
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn test_handoff_classification() {
        let billing = Agent::builder("Billing").build();
        let mut set = ToolSet::new();
        set.insert(named("lookup"), ToolSource::Declared);
        let name = set.insert(
            Arc::new(HandoffTool::new(billing.clone())),
            ToolSource::Handoff(billing.clone()),
        );

        assert!(set.is_handoff(&name));
        assert!(!set.is_handoff("lookup"));
        assert!(!set.is_handoff("missing"));
        assert!(Arc::ptr_eq(set.handoff_target(&name).unwrap(), &billing));
    }

    #[test]
    fn test_definitions_use_resolved_names() {
        let mut set = ToolSet::new();
        set.insert(named("search"), ToolSource::Declared);
        set.insert(
            named("search"),
            ToolSource::External {
                provider: "mcp".into(),
            },
        );
        let names: Vec<String> = set.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["search", "mcp_search"]);
    }
}
