//! StreamingSessionHandler - one inbound request, one ordered event stream
//!
//! For each request the handler:
//! 1. emits `connected`
//! 2. loads (or creates) the session and selects an agent
//! 3. queues the user message once the agent is known
//! 4. runs the agent, relaying its events in production order
//! 5. queues the reply, agent interaction and tool usage
//! 6. emits exactly one terminal `done` or `error`
//!
//! The work runs on its own tokio task. Dropping the returned stream only
//! stops delivery; the agent and the queued writes still complete.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::{AgentContext, Capability, DoneSummary, StreamEvent, Task};
use crate::orchestrator::{DelegationResult, Orchestrator};
use crate::routing::{ForcedRoute, SelectionContext, SelectionResult, FORCED_STRATEGY};
use crate::runtime::{create_event_channel, EventReceiver};
use crate::state::{
    AgentInteraction, MessageEntry, PersistenceJob, PersistenceQueue, SessionState, SessionUpdate,
    StateContext, StateManager, ToolUsageEntry,
};

/// Events for one request
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// A conversational request from the outer (HTTP) layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRequest {
    pub session_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_agent: Option<ForcedRoute>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
}

impl InboundRequest {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            forced_agent: None,
            user_id: user_id.into(),
            task_type: None,
        }
    }

    pub fn with_forced_agent(mut self, forced: ForcedRoute) -> Self {
        self.forced_agent = Some(forced);
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }
}

/// What the relay saw while the agent ran
#[derive(Debug, Default)]
struct RelayOutcome {
    first_token_ms: Option<u64>,
    tools: Vec<ToolUsageEntry>,
}

/// Entry point for streaming requests
#[derive(Clone)]
pub struct StreamingSessionHandler {
    orchestrator: Arc<Orchestrator>,
    state: Arc<StateManager>,
    queue: Arc<PersistenceQueue>,
    history_window: usize,
}

impl StreamingSessionHandler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        state: Arc<StateManager>,
        queue: Arc<PersistenceQueue>,
    ) -> Self {
        Self {
            orchestrator,
            state,
            queue,
            history_window: 10,
        }
    }

    /// How many recent agent history entries selection looks at
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn queue(&self) -> &Arc<PersistenceQueue> {
        &self.queue
    }

    /// Start handling a request and return its event stream
    pub fn handle(&self, request: InboundRequest) -> EventStream {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = self.clone();

        tokio::spawn(async move {
            handler.drive(request, tx).await;
        });

        Box::pin(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    break;
                }
            }
        })
    }

    async fn drive(&self, request: InboundRequest, out: mpsc::UnboundedSender<StreamEvent>) {
        let started = Instant::now();
        let emit = |event: StreamEvent| {
            // The caller may be gone; keep working regardless
            let _ = out.send(event);
        };

        emit(StreamEvent::Connected {
            session_id: request.session_id.clone(),
        });

        let ctx = StateContext::new(&request.user_id).creating();
        let session = match self.state.get_session_state(&request.session_id, &ctx).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(session_id = %request.session_id, error = %e, "[Handler] Failed to load session");
                emit(StreamEvent::error(e.to_string()));
                return;
            }
        };

        let task_type = request.task_type.as_deref().map(Capability::parse);
        let mut selection_ctx = SelectionContext::from_session(&session, self.history_window)
            .with_user_id(&request.user_id);
        if let Some(task_type) = &task_type {
            selection_ctx = selection_ctx.with_task_type(task_type.clone());
        }
        if let Some(forced) = &request.forced_agent {
            selection_ctx = selection_ctx.with_forced(forced.clone());
        }

        let selection = match self.orchestrator.select_agent(&request.message, &selection_ctx) {
            Ok(selection) => selection,
            Err(e) => {
                emit(StreamEvent::error(e.to_string()));
                return;
            }
        };

        if let Some(notice) = forced_route_notice(&selection) {
            emit(StreamEvent::status(notice));
        }

        // The agent is known: the user's message can be written
        self.enqueue(PersistenceJob::update(
            &request.session_id,
            SessionUpdate::new().append_message(MessageEntry::user(&request.message)),
            ctx.clone(),
        ));

        let context = self.agent_context(&request, &session, &selection, &ctx).await;
        let mut task = Task::new(&request.message);
        if let Some(task_type) = task_type {
            task = task.with_type(task_type);
        }

        let (sink, agent_rx) = create_event_channel();
        let (result, relay) = tokio::join!(
            self.orchestrator
                .delegate_task(task, &selection.selected_agent, context, sink),
            relay_events(agent_rx, &out, started),
        );

        self.persist_turn(&request, &session, &selection, &result, relay.tools, &ctx);

        let terminal = if result.success {
            StreamEvent::Done(DoneSummary {
                agent_name: selection.selected_agent.clone(),
                agent_type: selection.agent_type.clone(),
                confidence: selection.confidence,
                fallback_used: selection.fallback_used,
                reason: selection.reason.clone(),
                execution_time_ms: result.execution_time.as_millis() as u64,
                total_time_ms: started.elapsed().as_millis() as u64,
                time_to_first_token_ms: relay.first_token_ms,
            })
        } else {
            StreamEvent::error(
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Agent failed".to_string()),
            )
        };
        emit(terminal);
    }

    async fn agent_context(
        &self,
        request: &InboundRequest,
        session: &SessionState,
        selection: &SelectionResult,
        ctx: &StateContext,
    ) -> AgentContext {
        let limits = self.state.memory_config();
        let mut messages = Vec::new();

        // Other sessions are only visible through the shared snapshot
        if session.user_preferences.cross_session_memory {
            match self
                .state
                .shared_context(
                    &request.message,
                    &request.session_id,
                    &request.user_id,
                    Some(limits.related_messages),
                    ctx,
                )
                .await
            {
                Ok(related) => messages.extend(related),
                Err(e) => tracing::debug!(error = %e, "[Handler] No memory context"),
            }
        }

        messages.extend(session.recent_messages(limits.recent_messages).iter().cloned());

        let mut context = AgentContext::new(&request.session_id)
            .with_user_id(&request.user_id)
            .with_messages(messages)
            .with_previous_agent(session.last_agent().map(str::to_string))
            .with_preferences(session.user_preferences.clone());
        context.set_metadata("selection_reason", selection.reason.clone());
        context.set_metadata("confidence", selection.confidence);
        context
    }

    fn persist_turn(
        &self,
        request: &InboundRequest,
        session: &SessionState,
        selection: &SelectionResult,
        result: &DelegationResult,
        tools: Vec<ToolUsageEntry>,
        ctx: &StateContext,
    ) {
        let mut update = SessionUpdate::new();
        for entry in tools {
            update = update.append_tool(entry);
        }

        if let Some(message) = result.message() {
            let mut interaction =
                AgentInteraction::new(&selection.selected_agent, selection.confidence);
            if let Some(previous) = session.last_agent() {
                if previous != selection.selected_agent {
                    interaction = interaction.with_handoff_from(previous);
                }
            }
            update = update
                .append_message(MessageEntry::assistant(message))
                .append_agent(interaction.into_entry());
        }

        if !update.is_empty() {
            self.enqueue(PersistenceJob::update(&request.session_id, update, ctx.clone()));
        }

        if result.success && session.user_preferences.cross_session_memory {
            self.enqueue(PersistenceJob::share_memory(&request.session_id, ctx.clone()));
        }
    }

    fn enqueue(&self, job: PersistenceJob) {
        let session_id = job.session_id().to_string();
        if let Err(e) = self.queue.enqueue(job) {
            tracing::error!(session_id = %session_id, error = %e, "[Handler] Could not queue write");
        }
    }
}

/// Notice for a forced route that did not resolve
fn forced_route_notice(selection: &SelectionResult) -> Option<String> {
    let requested = selection.requested_override.as_deref()?;
    if selection.strategy == FORCED_STRATEGY {
        return None;
    }
    Some(format!(
        "Requested agent '{}' is not available; routing to {} instead",
        requested, selection.selected_agent
    ))
}

/// Forward agent events to the caller until the agent drops its sink
async fn relay_events(
    mut rx: EventReceiver,
    out: &mpsc::UnboundedSender<StreamEvent>,
    started: Instant,
) -> RelayOutcome {
    let mut outcome = RelayOutcome::default();
    let mut pending: HashMap<String, Value> = HashMap::new();

    while let Some(event) = rx.recv().await {
        match &event {
            StreamEvent::Token { .. } if outcome.first_token_ms.is_none() => {
                outcome.first_token_ms = Some(started.elapsed().as_millis() as u64);
            }
            StreamEvent::ToolStart { id, parameters, .. } => {
                pending.insert(id.clone(), parameters.clone());
            }
            StreamEvent::ToolResult { id, name, result } => {
                let parameters = pending.remove(id).unwrap_or(Value::Null);
                outcome
                    .tools
                    .push(ToolUsageEntry::new(name, parameters, result.clone(), true));
            }
            StreamEvent::ToolError { id, name, error } => {
                let parameters = pending.remove(id).unwrap_or(Value::Null);
                outcome.tools.push(ToolUsageEntry::new(
                    name,
                    parameters,
                    Value::String(error.clone()),
                    false,
                ));
            }
            // Terminal events belong to the handler, not the agent
            StreamEvent::Done(_) | StreamEvent::Error { .. } | StreamEvent::Connected { .. } => {
                continue;
            }
            _ => {}
        }

        let _ = out.send(event);
    }

    outcome
}
