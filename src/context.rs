//! Run context: the mutable state threaded through one orchestrated run.
//!
//! A [`RunContext`] owns the conversation history, the usage counters, the
//! handoff audit log and a shared key-value [`State`] bag. The state bag is
//! the only channel tools use to pass durable data to each other, across
//! turns and across handoffs.
//!
//! # Example
//!
//! ```ignore
//! use baton::RunContext;
//!
//! let ctx = RunContext::new().with_value("customer_id", &"C-42")?;
//! let result = runner.run(&triage, "Where is my refund?", ctx).await;
//!
//! // Persist and resume later, possibly in another process.
//! let saved = result.context().to_json()?;
//! let resumed = RunContext::from_json(&saved)?;
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::handoff::{HandoffRecord, PendingHandoff};
use crate::message::{Message, Role, Usage};

/// Thread-safe key-value store shared by every tool of a run.
///
/// Cloning is cheap (Arc-based); clones see the same data. Values are stored
/// as JSON so any serializable type can be stored and retrieved.
#[derive(Clone, Default, Debug)]
pub struct State {
    data: Arc<Mutex<HashMap<String, Value>>>,
}

impl State {
    /// Create a new empty state bag.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a serializable value.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> serde_json::Result<()> {
        let json = serde_json::to_value(value)?;
        self.insert(key, json);
        Ok(())
    }

    /// Store a raw JSON value.
    pub fn insert(&self, key: &str, value: Value) {
        self.lock().insert(key.to_string(), value);
    }

    /// Retrieve a value.
    ///
    /// Returns `None` if the key doesn't exist or if deserialization fails.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lock()
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get the raw JSON value for a key.
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Read-modify-write a single entry under the lock.
    ///
    /// The closure receives `Value::Null` for a missing key.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&mut Value),
    {
        let mut data = self.lock();
        let entry = data.entry(key.to_string()).or_insert(Value::Null);
        f(entry);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn to_map(&self) -> Map<String, Value> {
        self.lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let state = Self::new();
        state.lock().extend(map);
        state
    }
}

#[derive(Clone, Default, Debug)]
struct UsageTracker(Arc<Mutex<Usage>>);

impl UsageTracker {
    fn add(&self, usage: &Usage) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).add(usage);
    }

    fn get(&self) -> Usage {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) type HandoffSlot = Arc<Mutex<Option<PendingHandoff>>>;

/// Serializable form of a [`RunContext`], used to resume a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    #[serde(default)]
    pub conversation_history: Vec<Message>,
    #[serde(default)]
    pub current_agent: Option<String>,
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub handoff_log: Vec<HandoffRecord>,
}

/// Mutable state of one run. Never shared between runs.
#[derive(Debug, Default)]
pub struct RunContext {
    state: State,
    usage: UsageTracker,
    history: Vec<Message>,
    current_agent: Option<String>,
    handoff_log: Vec<HandoffRecord>,
    pending_handoff: HandoffSlot,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the state bag with a value.
    pub fn with_value<T: Serialize + ?Sized>(self, key: &str, value: &T) -> Result<Self> {
        self.state.set(key, value)?;
        Ok(self)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn push_message(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Name of the agent that was active when the last run ended.
    pub fn current_agent(&self) -> Option<&str> {
        self.current_agent.as_deref()
    }

    pub(crate) fn set_current_agent(&mut self, name: &str) {
        self.current_agent = Some(name.to_string());
    }

    /// Most recent assistant message attributed to an agent.
    pub fn last_agent_name(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| m.agent_name.as_deref())
    }

    pub fn usage(&self) -> Usage {
        self.usage.get()
    }

    pub(crate) fn record_usage(&self, usage: &Usage) {
        self.usage.add(usage);
    }

    pub fn handoff_log(&self) -> &[HandoffRecord] {
        &self.handoff_log
    }

    pub(crate) fn record_handoff(&mut self, record: HandoffRecord) {
        self.handoff_log.push(record);
    }

    pub(crate) fn take_pending_handoff(&self) -> Option<PendingHandoff> {
        self.pending_handoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Build the per-call wrapper handed to a tool.
    pub(crate) fn tool_context(&self, call_id: &str, agent_name: &str) -> ToolContext {
        ToolContext {
            state: self.state.clone(),
            usage: self.usage.clone(),
            handoff: self.pending_handoff.clone(),
            call_id: call_id.to_string(),
            agent_name: agent_name.to_string(),
            retry_count: 0,
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            conversation_history: self.history.clone(),
            current_agent: self.current_agent.clone(),
            state: self.state.to_map(),
            usage: self.usage(),
            handoff_log: self.handoff_log.clone(),
        }
    }

    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        let ctx = Self {
            state: State::from_map(snapshot.state),
            history: snapshot.conversation_history,
            current_agent: snapshot.current_agent,
            handoff_log: snapshot.handoff_log,
            ..Default::default()
        };
        ctx.usage.add(&snapshot.usage);
        ctx
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: ContextSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

impl Serialize for RunContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RunContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        ContextSnapshot::deserialize(deserializer).map(RunContext::from_snapshot)
    }
}

/// What a tool sees of the run while it executes.
///
/// Built fresh for every call. All handles point at the run's shared data, so
/// concurrent calls of the same turn observe each other's writes.
#[derive(Clone, Debug)]
pub struct ToolContext {
    state: State,
    usage: UsageTracker,
    handoff: HandoffSlot,
    call_id: String,
    agent_name: String,
    retry_count: u32,
}

impl ToolContext {
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Usage accumulated by the run so far.
    pub fn usage(&self) -> Usage {
        self.usage.get()
    }

    /// Add usage from a nested model call made by the tool.
    pub fn record_usage(&self, usage: &Usage) {
        self.usage.add(usage);
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Name of the agent whose turn requested this call.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub(crate) fn request_handoff(&self, handoff: PendingHandoff) {
        *self.handoff.lock().unwrap_or_else(PoisonError::into_inner) = Some(handoff);
    }
}
