//! The run loop.
//!
//! A [`Runner`] drives one conversation turn at a time:
//!
//! 1. Resolve the active agent's instructions and tools
//! 2. Ask the chat model, with the whole conversation history
//! 3. Execute requested tool calls; a handoff call swaps the active agent
//! 4. Loop until the model answers without tool calls, or the turn budget
//!    runs out
//!
//! The loop is sequential within a run, but a single `Runner` serves any
//! number of concurrent runs.

mod dispatch;
mod events;
mod result;

pub use dispatch::DispatchStrategy;
pub use events::{EventCallback, RunCallbacks, RunEvent, logging_callbacks};
pub use result::RunResult;

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

use crate::agent::{Agent, ToolSet};
use crate::chat::{ChatModel, ChatRequest, ChatResponse, Output};
use crate::config::Config;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::handoff::{HandoffRecord, PendingHandoff};
use crate::message::Message;

/// Per-run overrides.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides [`Config::max_turns`]
    pub max_turns: Option<usize>,
    /// Give up on the model once this instant passes
    pub deadline: Option<Instant>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_turns(mut self, n: usize) -> Self {
        self.max_turns = Some(n);
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }
}

/// States of the run loop.
enum Phase {
    Starting,
    AwaitingModel,
    DispatchingTools {
        response: ChatResponse,
        tools: ToolSet,
    },
    Continuing,
    HandedOff {
        handoff: PendingHandoff,
        acknowledgement: String,
    },
    Completed(Output),
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Phase::Starting => "starting",
            Phase::AwaitingModel => "awaiting_model",
            Phase::DispatchingTools { .. } => "dispatching_tools",
            Phase::Continuing => "continuing",
            Phase::HandedOff { .. } => "handed_off",
            Phase::Completed(_) => "completed",
        }
    }
}

/// Drives agents through conversations.
pub struct Runner {
    model: Arc<dyn ChatModel>,
    config: Config,
    callbacks: RunCallbacks,
    strategy: DispatchStrategy,
}

impl Runner {
    /// Create a runner with the default configuration.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            config: Config::default(),
            callbacks: RunCallbacks::default(),
            strategy: DispatchStrategy::default(),
        }
    }

    /// Use this configuration. `debug` turns on event logging.
    pub fn with_config(mut self, config: Config) -> Self {
        let debug = config.debug;
        self.config = config;
        self.verbose(debug)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Builder methods for callbacks
    // =========================================================================

    /// Log every lifecycle event through `tracing`.
    ///
    /// Only fills callback slots that are still empty.
    pub fn verbose(mut self, enabled: bool) -> Self {
        if enabled {
            let logging = logging_callbacks();
            let cb = &mut self.callbacks;
            cb.on_agent_thinking = cb.on_agent_thinking.take().or(logging.on_agent_thinking);
            cb.on_tool_start = cb.on_tool_start.take().or(logging.on_tool_start);
            cb.on_tool_complete = cb.on_tool_complete.take().or(logging.on_tool_complete);
            cb.on_agent_handoff = cb.on_agent_handoff.take().or(logging.on_agent_handoff);
        }
        self
    }

    /// Replace all callbacks at once.
    pub fn callbacks(mut self, callbacks: RunCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Set a callback for agent thinking events.
    pub fn on_agent_thinking<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_agent_thinking = Some(Arc::new(f));
        self
    }

    /// Set a callback for tool start events.
    pub fn on_tool_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_tool_start = Some(Arc::new(f));
        self
    }

    /// Set a callback for tool completion events.
    pub fn on_tool_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_tool_complete = Some(Arc::new(f));
        self
    }

    /// Set a callback for handoff events.
    pub fn on_agent_handoff<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_agent_handoff = Some(Arc::new(f));
        self
    }

    /// Set a catch-all callback for any event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_event = Some(Arc::new(f));
        self
    }

    pub fn dispatch_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    // =========================================================================
    // Main run loop
    // =========================================================================

    /// Run a conversation starting with `agent`.
    ///
    /// An empty `input` continues the conversation already in `context`
    /// without adding a user message. Never fails: errors end up in the
    /// returned [`RunResult`].
    pub async fn run(&self, agent: &Arc<Agent>, input: &str, context: RunContext) -> RunResult {
        self.run_with(agent, input, context, RunOptions::default()).await
    }

    pub async fn run_with(
        &self,
        agent: &Arc<Agent>,
        input: &str,
        mut context: RunContext,
        options: RunOptions,
    ) -> RunResult {
        let max_turns = options.max_turns.unwrap_or(self.config.max_turns);
        let mut active = agent.clone();
        let mut turns = 0;

        let span = tracing::info_span!("run", agent = %agent.name(), max_turns);
        let outcome = AssertUnwindSafe(self.drive(
            &mut active,
            input,
            &mut context,
            max_turns,
            options.deadline,
            &mut turns,
        ))
        .catch_unwind()
        .instrument(span)
        .await;

        context.set_current_agent(active.name());
        match outcome {
            Ok(Ok(output)) => {
                tracing::info!(agent = %active.name(), turns, "run completed");
                RunResult::success(output, context, turns)
            }
            Ok(Err(e)) => {
                tracing::warn!(agent = %active.name(), turns, error = %e, "run failed");
                RunResult::failure(e, context, turns)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(agent = %active.name(), turns, panic = %message, "run panicked");
                RunResult::failure(Error::Internal(message), context, turns)
            }
        }
    }

    async fn drive(
        &self,
        active: &mut Arc<Agent>,
        input: &str,
        ctx: &mut RunContext,
        max_turns: usize,
        deadline: Option<Instant>,
        turns: &mut usize,
    ) -> Result<Output> {
        let mut phase = Phase::Starting;
        loop {
            tracing::trace!(phase = phase.label(), agent = %active.name(), turn = *turns, "run phase");
            phase = match phase {
                Phase::Starting => {
                    if input.is_empty() {
                        tracing::debug!("no new input; continuing conversation");
                    } else {
                        ctx.push_message(Message::user(input));
                    }
                    Phase::AwaitingModel
                }

                Phase::AwaitingModel => {
                    if *turns >= max_turns {
                        return Err(Error::MaxTurnsExceeded { max_turns });
                    }
                    *turns += 1;

                    let tools = active.all_tools().await;
                    self.callbacks.emit(&RunEvent::AgentThinking {
                        agent: active.name().to_string(),
                        input: input.to_string(),
                    });

                    let response = self.complete(active, ctx, &tools, deadline).await?;
                    ctx.record_usage(&response.usage);

                    if response.has_tool_calls() {
                        Phase::DispatchingTools { response, tools }
                    } else {
                        let output = response.output.unwrap_or_else(|| {
                            tracing::warn!(agent = %active.name(), "model returned neither text nor tool calls");
                            Output::Text(String::new())
                        });
                        ctx.push_message(Message::assistant(output.to_history_content(), active.name()));
                        Phase::Completed(output)
                    }
                }

                Phase::DispatchingTools { response, tools } => {
                    self.dispatch_turn(active, ctx, response, &tools).await
                }

                Phase::Continuing => Phase::AwaitingModel,

                Phase::HandedOff {
                    handoff,
                    acknowledgement,
                } => {
                    let from = active.name().to_string();
                    let to = handoff.target.name().to_string();
                    tracing::info!(from = %from, to = %to, reason = %handoff.reason, "handing off");

                    self.callbacks.emit(&RunEvent::AgentHandoff {
                        from: from.clone(),
                        to: to.clone(),
                        reason: handoff.reason.clone(),
                    });
                    ctx.record_handoff(HandoffRecord {
                        from,
                        to,
                        reason: handoff.reason,
                        acknowledgement,
                    });
                    *active = handoff.target;
                    ctx.set_current_agent(active.name());
                    Phase::AwaitingModel
                }

                Phase::Completed(output) => return Ok(output),
            };
        }
    }

    /// One model round-trip for the active agent.
    async fn complete(
        &self,
        agent: &Agent,
        ctx: &RunContext,
        tools: &ToolSet,
        deadline: Option<Instant>,
    ) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: agent
                .model()
                .unwrap_or(&self.config.default_model)
                .to_string(),
            instructions: agent.resolve_instructions(ctx),
            messages: ctx.history().to_vec(),
            tools: tools.definitions(),
            response_schema: agent.response_schema().cloned(),
            temperature: agent.temperature().or(self.config.temperature),
            max_tokens: self.config.max_tokens,
            timeout: self.config.request_timeout,
            deadline,
        };

        let call = self.model.complete(request);
        let response = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .map_err(|_| Error::DeadlineExceeded)??,
            None => call.await?,
        };
        Ok(response)
    }

    /// Execute the tool calls of one response and decide where the loop goes.
    ///
    /// Handoff calls never reach the conversation history; an honoured
    /// handoff is recorded in the context's handoff log instead.
    async fn dispatch_turn(
        &self,
        active: &Arc<Agent>,
        ctx: &mut RunContext,
        response: ChatResponse,
        tools: &ToolSet,
    ) -> Phase {
        let ChatResponse {
            output,
            mut tool_calls,
            ..
        } = response;
        dispatch::ensure_call_ids(&mut tool_calls);
        let turn = dispatch::classify(tool_calls, tools);

        // Text next to an honoured handoff is dropped: the target agent speaks next.
        let content = match (&turn.handoff, output) {
            (None, Some(output)) => output.to_history_content(),
            _ => String::new(),
        };
        if !turn.regular.is_empty() || !content.is_empty() {
            ctx.push_message(
                Message::assistant(content, active.name()).with_tool_calls(turn.regular.clone()),
            );
        }

        let results = dispatch::execute_regular(
            &turn.regular,
            tools,
            ctx,
            active.name(),
            &self.callbacks,
            self.strategy,
        )
        .await;
        for message in results {
            ctx.push_message(message);
        }

        let Some(call) = turn.handoff else {
            return Phase::Continuing;
        };
        let acknowledgement = match dispatch::execute_handoff(&call, tools, ctx, active.name()).await {
            Ok(ack) => ack,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "handoff tool failed");
                return Phase::Continuing;
            }
        };
        match ctx.take_pending_handoff() {
            Some(handoff) => Phase::HandedOff {
                handoff,
                acknowledgement,
            },
            None => {
                tracing::warn!(tool = %call.name, "handoff tool left no pending handoff");
                Phase::Continuing
            }
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("callbacks", &self.callbacks)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
