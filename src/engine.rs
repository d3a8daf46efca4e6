//! Runtime execution engine for tutoring sessions.
//!
//! The [`Engine`] drives a [`Workflow`] for many isolated sessions keyed by
//! opaque, caller-supplied ids. Each start/resume call loads the session's
//! checkpoint, executes steps sequentially as the router dictates, persists
//! at every step boundary, and stops when a step suspends (returning a
//! pending descriptor) or the graph ends.
//!
//! # Resume semantics
//!
//! Resumption is an explicit re-entry by step id: the interrupted step is
//! re-invoked with the caller's response available in its context. Prior
//! steps are never replayed, and any update a suspension carried was already
//! persisted, so resumption may happen arbitrarily later, from a different
//! process, against any durable [`SessionStore`].
//!
//! # Failure semantics
//!
//! A collaborator failure inside a step aborts the call without committing
//! that step's update; the store keeps the last successfully persisted
//! checkpoint. Re-issuing the same start/resume call retries: if the
//! outstanding suspension was already consumed by an earlier successful step
//! of the failed call, the engine simply continues driving from the
//! checkpoint and ignores the stale response.
//!
//! # Concurrency
//!
//! One logical thread of control per session: at most one start/resume call
//! may be in flight per session id, enforced with a per-session lock.
//! Concurrent calls for the same id are rejected with
//! [`EngineError::SessionBusy`], never interleaved. Different sessions run
//! concurrently without shared mutable state.

use chrono::Utc;
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::event_bus::{Event, EventBus};
use crate::router::{Next, StepId};
use crate::state::SessionState;
use crate::step::{PendingInterrupt, StepContext, StepError, StepOutcome};
use crate::store::{Checkpoint, SessionStore, StoreError};
use crate::workflow::Workflow;

/// Point-in-time view of a session returned by every engine operation.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    /// The last persisted session state.
    pub state: SessionState,
    /// The suspension currently outstanding, if any.
    pub pending: Option<PendingInterrupt>,
    /// True once the workflow reached the end of the graph.
    pub completed: bool,
}

impl From<Checkpoint> for SessionSnapshot {
    fn from(cp: Checkpoint) -> Self {
        Self {
            state: cp.state,
            pending: cp.pending,
            completed: cp.completed,
        }
    }
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("session not found: {session_id}")]
    #[diagnostic(code(tutorloom::engine::session_not_found))]
    UnknownSession { session_id: String },

    #[error("session busy: {session_id} already has a call in flight")]
    #[diagnostic(
        code(tutorloom::engine::session_busy),
        help("At most one start/resume call may run per session at a time.")
    )]
    SessionBusy { session_id: String },

    /// A routed step is missing from the registry. Workflow validation makes
    /// this unreachable for workflows built through the builder.
    #[error("no step registered for {step}")]
    #[diagnostic(code(tutorloom::engine::missing_step))]
    MissingStep { step: StepId },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Workflow execution engine with session management.
pub struct Engine {
    workflow: Arc<Workflow>,
    store: Arc<dyn SessionStore>,
    event_bus: EventBus,
    locks: Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Engine {
    /// Create an engine with the default event bus, forwarding step events
    /// to `tracing`.
    #[must_use]
    pub fn new(workflow: Workflow, store: Arc<dyn SessionStore>) -> Self {
        let event_bus = EventBus::default();
        event_bus.listen_for_events();
        Self::with_event_bus(workflow, store, event_bus)
    }

    /// Create an engine with a caller-configured event bus. The listener is
    /// not started; subscribe or call `listen_for_events` yourself.
    #[must_use]
    pub fn with_event_bus(
        workflow: Workflow,
        store: Arc<dyn SessionStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            workflow: Arc::new(workflow),
            store,
            event_bus,
            locks: Mutex::new(FxHashMap::default()),
        }
    }

    /// Generate a fresh opaque session id. Convenience for callers; the
    /// engine itself treats ids purely as map keys.
    #[must_use]
    pub fn generate_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Start (or continue) the session, running until suspension or the end
    /// of the graph.
    ///
    /// For an unknown id this creates fresh state for `topic`, seeds the
    /// conversation with the learner's request, and enters the workflow. For
    /// an existing id it never resets: the outstanding suspension is
    /// returned as-is, or an incomplete session is driven onward (this is
    /// what makes re-issuing a failed start call a retry).
    #[instrument(skip(self, topic), err)]
    pub async fn start(
        &self,
        session_id: &str,
        topic: &str,
    ) -> Result<SessionSnapshot, EngineError> {
        let lock = self.session_lock(session_id);
        let _guard = lock
            .try_lock()
            .map_err(|_| EngineError::SessionBusy {
                session_id: session_id.to_string(),
            })?;

        if let Some(checkpoint) = self.store.get(session_id).await? {
            if checkpoint.completed || checkpoint.pending.is_some() {
                return Ok(SessionSnapshot::from(checkpoint));
            }
            tracing::info!(session = %session_id, "existing incomplete session; continuing");
            return self.drive(checkpoint, None).await;
        }

        let checkpoint = Checkpoint::fresh(
            session_id,
            SessionState::for_topic(topic),
            self.workflow.entry(),
        );
        self.store.put(checkpoint.clone()).await?;
        self.drive(checkpoint, None).await
    }

    /// Resume the session with the response for its outstanding suspension,
    /// running until the next suspension or the end of the graph.
    #[instrument(skip(self, response), err)]
    pub async fn resume(
        &self,
        session_id: &str,
        response: Value,
    ) -> Result<SessionSnapshot, EngineError> {
        let lock = self.session_lock(session_id);
        let _guard = lock
            .try_lock()
            .map_err(|_| EngineError::SessionBusy {
                session_id: session_id.to_string(),
            })?;

        let Some(checkpoint) = self.store.get(session_id).await? else {
            return Err(EngineError::UnknownSession {
                session_id: session_id.to_string(),
            });
        };
        if checkpoint.completed {
            return Ok(SessionSnapshot::from(checkpoint));
        }
        if checkpoint.pending.is_none() {
            // A previous call failed after consuming the suspension; the
            // retried call continues from the checkpoint, response ignored.
            tracing::warn!(
                session = %session_id,
                "resume with no outstanding suspension; continuing without response"
            );
            return self.drive(checkpoint, None).await;
        }
        self.drive(checkpoint, Some(response)).await
    }

    /// Read-only view of the session: last persisted state plus whatever
    /// suspension is outstanding. Executes no steps.
    pub async fn inspect(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let Some(checkpoint) = self.store.get(session_id).await? else {
            return Err(EngineError::UnknownSession {
                session_id: session_id.to_string(),
            });
        };
        Ok(SessionSnapshot::from(checkpoint))
    }

    /// Remove the session's stored state.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, session_id: &str) -> Result<(), EngineError> {
        let existed = self.store.delete(session_id).await?;
        self.locks.lock().remove(session_id);
        if existed {
            Ok(())
        } else {
            Err(EngineError::UnknownSession {
                session_id: session_id.to_string(),
            })
        }
    }

    /// Subscribe to the engine's event stream.
    #[must_use]
    pub fn subscribe(&self) -> flume::Receiver<Event> {
        self.event_bus.subscribe()
    }

    fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Execute steps from the checkpoint's position until a suspension or the
    /// end of the graph, persisting at every step boundary. `resume` is
    /// consumed by the first step executed.
    async fn drive(
        &self,
        mut checkpoint: Checkpoint,
        mut resume: Option<Value>,
    ) -> Result<SessionSnapshot, EngineError> {
        loop {
            let step_id = checkpoint.position;
            let step = self
                .workflow
                .step(step_id)
                .cloned()
                .ok_or(EngineError::MissingStep { step: step_id })?;

            let ctx = StepContext::new(
                step_id,
                checkpoint.steps_taken + 1,
                resume.take(),
                self.event_bus.emitter(),
            );
            // Failures propagate before anything is committed: the store
            // still holds the checkpoint from the previous boundary.
            let outcome = step.run(&checkpoint.state, ctx).await?;

            checkpoint.steps_taken += 1;
            checkpoint.updated_at = Utc::now();
            match outcome {
                StepOutcome::Continue(update) => {
                    checkpoint.state.apply(update);
                    checkpoint.pending = None;
                    match self.workflow.router().next(step_id, &checkpoint.state) {
                        Next::Step(next) => {
                            tracing::debug!(
                                session = %checkpoint.session_id,
                                step = %step_id,
                                next = %next,
                                "step completed"
                            );
                            checkpoint.position = next;
                            self.store.put(checkpoint.clone()).await?;
                        }
                        Next::End => {
                            checkpoint.completed = true;
                            self.store.put(checkpoint.clone()).await?;
                            tracing::info!(
                                session = %checkpoint.session_id,
                                steps = checkpoint.steps_taken,
                                "session completed"
                            );
                            return Ok(SessionSnapshot::from(checkpoint));
                        }
                    }
                }
                StepOutcome::Suspend { update, interrupt } => {
                    let kind = interrupt.kind;
                    checkpoint.state.apply(update);
                    checkpoint.pending = Some(PendingInterrupt {
                        step: step_id,
                        interrupt,
                    });
                    self.store.put(checkpoint.clone()).await?;
                    tracing::info!(
                        session = %checkpoint.session_id,
                        step = %step_id,
                        awaiting = %kind,
                        "session suspended"
                    );
                    return Ok(SessionSnapshot::from(checkpoint));
                }
            }
        }
    }
}
