//! Event bus for step-scoped progress events.
//!
//! Steps emit lightweight [`Event`]s through the [`EventEmitter`] on their
//! context; the bus fans them out to subscribers and, when the background
//! listener is running, forwards them to `tracing`. The bus is a runtime
//! concern owned by the engine, not by the workflow definition, so one
//! workflow can serve many engines with isolated event channels.

use miette::Diagnostic;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

/// An event emitted during workflow execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Event emitted by a step, tagged with its id and engine step number.
    Step(StepEvent),
    /// Event emitted by the engine itself.
    Diagnostic(DiagnosticEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    pub step_id: String,
    pub step: u64,
    pub scope: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub scope: String,
    pub message: String,
}

impl Event {
    pub fn step(
        step_id: impl Into<String>,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Step(StepEvent {
            step_id: step_id.into(),
            step,
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        match self {
            Event::Step(event) => &event.scope,
            Event::Diagnostic(event) => &event.scope,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Event::Step(event) => &event.message,
            Event::Diagnostic(event) => &event.message,
        }
    }
}

/// Cloneable producer handle for emitting events into the bus.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    sender: flume::Sender<Event>,
}

impl EventEmitter {
    pub fn emit(&self, event: Event) -> Result<(), EmitterError> {
        self.sender
            .send(event)
            .map_err(|_| EmitterError::BusUnavailable)
    }
}

/// Error emitting an event.
#[derive(Debug, Error, Diagnostic)]
pub enum EmitterError {
    /// The bus receiver has been dropped or the channel is closed.
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(tutorloom::event_bus::unavailable),
        help("The event bus may have been dropped. Check engine lifetime.")
    )]
    BusUnavailable,
}

/// Fan-out hub for workflow events.
///
/// Producers get an [`EventEmitter`] via [`EventBus::emitter`]; consumers
/// either [`subscribe`](EventBus::subscribe) to the underlying channel or
/// start the background listener which forwards every event to `tracing`.
pub struct EventBus {
    sender: flume::Sender<Event>,
    receiver: flume::Receiver<Event>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            listener: Mutex::new(None),
        }
    }
}

impl EventBus {
    #[must_use]
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            sender: self.sender.clone(),
        }
    }

    /// Subscribe to the event stream. Flume receivers are multi-consumer;
    /// each subscriber competes for events, so use either subscribers or the
    /// listener, not both.
    #[must_use]
    pub fn subscribe(&self) -> flume::Receiver<Event> {
        self.receiver.clone()
    }

    /// Spawn a background task forwarding events to `tracing`.
    /// Idempotent: calling multiple times has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock();
        if guard.is_some() {
            return;
        }
        let receiver = self.receiver.clone();
        *guard = Some(tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                match &event {
                    Event::Step(step) => tracing::info!(
                        target: "tutorloom::events",
                        step_id = %step.step_id,
                        step = step.step,
                        scope = %step.scope,
                        "{}",
                        step.message
                    ),
                    Event::Diagnostic(diag) => tracing::info!(
                        target: "tutorloom::events",
                        scope = %diag.scope,
                        "{}",
                        diag.message
                    ),
                }
            }
        }));
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }
}
