//! Step execution framework for the tutoring workflow.
//!
//! A [`Step`] is a single unit of work in the workflow graph. It receives the
//! current [`SessionState`] and a [`StepContext`], performs its work (usually
//! one or two collaborator calls), and returns a [`StepOutcome`]:
//!
//! - [`StepOutcome::Continue`] carries a [`StepUpdate`] to merge into the
//!   state; the engine then routes to the next step.
//! - [`StepOutcome::Suspend`] is a first-class control-flow effect, not an
//!   error: the engine persists state (including any update carried by the
//!   suspension), records the [`Interrupt`], and returns control to the
//!   external caller. A later resume re-enters the same step with the
//!   caller's response in [`StepContext::resume`].
//!
//! Suspending steps follow one protocol: when `ctx.resume` is `None` they
//! return `Suspend`; when it is `Some` they process the response and return
//! `Continue`. Resume is an explicit re-entry by step id; prior steps are
//! never replayed.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::collaborators::ProviderError;
use crate::event_bus::{EmitterError, Event, EventEmitter};
use crate::message::Message;
use crate::router::StepId;
use crate::state::{QaEntry, SessionState, Stage, SummaryData};

/// Core trait for executable workflow steps.
///
/// Steps are stateless with respect to the session: everything they need is
/// in the snapshot they receive, and everything they change goes through the
/// returned [`StepOutcome`]. Collaborator handles live on the step struct,
/// injected at workflow construction.
#[async_trait]
pub trait Step: Send + Sync {
    /// Execute this step against the given state.
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError>;
}

/// Execution context passed to steps.
#[derive(Clone, Debug)]
pub struct StepContext {
    /// Identity of the step being executed.
    pub step_id: StepId,
    /// Engine step counter for this session (1-based).
    pub step: u64,
    /// Response for the outstanding suspension, present only on the first
    /// step executed by a resume call.
    pub resume: Option<Value>,
    emitter: EventEmitter,
}

impl StepContext {
    #[must_use]
    pub fn new(step_id: StepId, step: u64, resume: Option<Value>, emitter: EventEmitter) -> Self {
        Self {
            step_id,
            step,
            resume,
            emitter,
        }
    }

    /// Emit a step-scoped event enriched with this context's metadata.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), EmitterError> {
        self.emitter
            .emit(Event::step(self.step_id.encode(), self.step, scope, message))
    }
}

/// Partial state update returned by step execution.
///
/// All fields are optional; the engine merges set fields into the session
/// state via [`SessionState::apply`]. `messages` is appended to the
/// conversation log; other collections replace wholesale (steps extending
/// `completed` or `qa_log` return old+new).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepUpdate {
    pub prerequisites: Option<Vec<String>>,
    pub known_prerequisites: Option<Vec<String>>,
    pub unknown_prerequisites: Option<Vec<String>>,
    pub roadmap: Option<Vec<String>>,
    pub completed: Option<Vec<String>>,
    pub cursor: Option<usize>,
    /// Messages to append to the conversation log.
    pub messages: Option<Vec<Message>>,
    pub current_research: Option<String>,
    pub current_lesson: Option<String>,
    pub topic_done: Option<bool>,
    pub awaiting_input: Option<bool>,
    pub qa_log: Option<Vec<QaEntry>>,
    pub last_qa_question: Option<String>,
    pub last_qa_answer: Option<String>,
    pub research_retries: Option<u32>,
    pub stage: Option<Stage>,
    pub summary_data: Option<SummaryData>,
}

/// Result of running a step.
#[derive(Clone, Debug)]
pub enum StepOutcome {
    /// Merge the update and let the router pick the next step.
    Continue(StepUpdate),
    /// Pause the session awaiting external input.
    ///
    /// `update` is merged and persisted before the pause so collaborator work
    /// done prior to suspension survives an arbitrarily late resume.
    Suspend {
        update: StepUpdate,
        interrupt: Interrupt,
    },
}

/// Tag identifying what kind of input a suspension awaits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    PrerequisiteSelection,
    TopicReview,
    SessionSummaryDisplay,
    SessionCompletionAcknowledgment,
}

impl InterruptKind {
    /// Stable string tag, as exposed to external transports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InterruptKind::PrerequisiteSelection => "prerequisite_selection",
            InterruptKind::TopicReview => "topic_review",
            InterruptKind::SessionSummaryDisplay => "session_summary_display",
            InterruptKind::SessionCompletionAcknowledgment => {
                "session_completion_acknowledgment"
            }
        }
    }

    /// Parse a stable string tag back into a kind.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prerequisite_selection" => Some(InterruptKind::PrerequisiteSelection),
            "topic_review" => Some(InterruptKind::TopicReview),
            "session_summary_display" => Some(InterruptKind::SessionSummaryDisplay),
            "session_completion_acknowledgment" => {
                Some(InterruptKind::SessionCompletionAcknowledgment)
            }
            _ => None,
        }
    }
}

impl fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of a suspension, handed to the external layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interrupt {
    pub kind: InterruptKind,
    pub payload: Value,
}

impl Interrupt {
    #[must_use]
    pub fn new(kind: InterruptKind, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// The suspension currently outstanding for a session: which step paused and
/// what it is awaiting. At most one exists per session at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInterrupt {
    pub step: StepId,
    pub interrupt: Interrupt,
}

/// Errors that can occur during step execution.
///
/// Step errors abort the enclosing start/resume call without committing the
/// failing step's update; the session stays at its last persisted checkpoint.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// External collaborator call failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Provider(#[from] ProviderError),

    /// Expected input data is missing from the state.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(tutorloom::step::missing_input),
        help("Check that an earlier step produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(tutorloom::step::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Event bus communication error.
    #[error("event bus error: {0}")]
    #[diagnostic(code(tutorloom::step::event_bus))]
    EventBus(#[from] EmitterError),
}
