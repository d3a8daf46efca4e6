//! Session state for the tutoring workflow.
//!
//! [`SessionState`] is the single data record a session carries through the
//! workflow: the learning goal, the discovered prerequisite partition, the
//! ordered roadmap with a cursor, scratch buffers for the current topic, the
//! append-only conversation log, and the coarse [`Stage`] marker the router
//! consults. Steps never mutate state directly; they return a
//! [`StepUpdate`](crate::step::StepUpdate) that the engine merges with
//! [`SessionState::apply`] before persisting.
//!
//! # Invariants
//!
//! - `known_prerequisites` and `unknown_prerequisites` partition
//!   `prerequisites` (no overlap, union equals the whole set).
//! - `roadmap`'s last element equals `topic` whenever the roadmap is
//!   non-empty.
//! - `cursor <= roadmap.len()`; once the cursor exhausts the roadmap the
//!   stage is `SessionSummary` or `Complete`.
//! - `stage` only moves forward through the fixed order; the learning stage
//!   may loop internally without changing it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::message::Message;
use crate::step::StepUpdate;

/// Coarse phase marker for a session, also consulted by the router.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Start,
    Prerequisites,
    HumanSelection,
    Roadmap,
    Learning,
    SessionSummary,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Start => "start",
            Stage::Prerequisites => "prerequisites",
            Stage::HumanSelection => "human_selection",
            Stage::Roadmap => "roadmap",
            Stage::Learning => "learning",
            Stage::SessionSummary => "session_summary",
            Stage::Complete => "complete",
        };
        write!(f, "{label}")
    }
}

/// One question/answer exchange recorded during a topic review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
}

/// Session completion record, populated only by the summary step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryData {
    pub session_complete: bool,
    pub summary_generated: bool,
    pub topic: String,
    pub total_topics_learned: usize,
    pub total_topics_planned: usize,
    pub roadmap: Vec<String>,
    pub completed: Vec<String>,
    pub prerequisites_known: Vec<String>,
    pub prerequisites_learned: Vec<String>,
    pub questions_asked_count: usize,
    pub narrative: String,
}

/// The complete state of one tutoring session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// The main topic the learner wants to learn.
    pub topic: String,
    /// All discovered candidate prerequisites, in discovery order.
    pub prerequisites: Vec<String>,
    /// Prerequisites the learner confirmed knowing (subset of `prerequisites`).
    pub known_prerequisites: Vec<String>,
    /// Prerequisites still to learn, discovery order preserved.
    pub unknown_prerequisites: Vec<String>,
    /// Ordered learning sequence; the last element is `topic`.
    pub roadmap: Vec<String>,
    /// Topics finished, append-only.
    pub completed: Vec<String>,
    /// Index into `roadmap` of the topic currently being taught.
    pub cursor: usize,
    /// Append-only conversation log.
    pub conversation: Vec<Message>,
    /// Research scratch buffer for the current topic.
    pub current_research: String,
    /// Generated lesson text; empty signals "needs (re)generation".
    pub current_lesson: String,
    /// True once the learner approves the current topic's lesson.
    pub topic_done: bool,
    /// True while a step has suspended awaiting external input.
    pub awaiting_input: bool,
    /// All question/answer exchanges across the session.
    pub qa_log: Vec<QaEntry>,
    /// Most recent single-turn question, for display; cleared on continue.
    pub last_qa_question: String,
    /// Most recent single-turn answer, for display; cleared on continue.
    pub last_qa_answer: String,
    /// Research retries for the current topic. Reserved: reset by the
    /// research step but never consulted by routing.
    pub research_retries: u32,
    /// Coarse workflow phase.
    pub stage: Stage,
    /// Populated only at session end.
    pub summary_data: Option<SummaryData>,
}

impl SessionState {
    /// Create the initial state for a learning goal, seeding the conversation
    /// with the learner's request.
    #[must_use]
    pub fn for_topic(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            conversation: vec![Message::user(&format!(
                "I want to learn about {topic}"
            ))],
            ..Self::default()
        }
    }

    /// The topic currently being taught: `roadmap[cursor]`, or the empty
    /// string once the cursor has exhausted the roadmap.
    #[must_use]
    pub fn current_topic(&self) -> &str {
        self.roadmap.get(self.cursor).map_or("", String::as_str)
    }

    /// Merge a step's partial update into this state.
    ///
    /// `Some` fields overwrite; `messages` extends the conversation log.
    /// Steps that grow `completed` or `qa_log` return old+new, so those
    /// fields replace wholesale like every other collection.
    pub fn apply(&mut self, update: StepUpdate) {
        if let Some(prerequisites) = update.prerequisites {
            self.prerequisites = prerequisites;
        }
        if let Some(known) = update.known_prerequisites {
            self.known_prerequisites = known;
        }
        if let Some(unknown) = update.unknown_prerequisites {
            self.unknown_prerequisites = unknown;
        }
        if let Some(roadmap) = update.roadmap {
            self.roadmap = roadmap;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(cursor) = update.cursor {
            self.cursor = cursor;
        }
        if let Some(messages) = update.messages {
            self.conversation.extend(messages);
        }
        if let Some(research) = update.current_research {
            self.current_research = research;
        }
        if let Some(lesson) = update.current_lesson {
            self.current_lesson = lesson;
        }
        if let Some(done) = update.topic_done {
            self.topic_done = done;
        }
        if let Some(awaiting) = update.awaiting_input {
            self.awaiting_input = awaiting;
        }
        if let Some(qa_log) = update.qa_log {
            self.qa_log = qa_log;
        }
        if let Some(question) = update.last_qa_question {
            self.last_qa_question = question;
        }
        if let Some(answer) = update.last_qa_answer {
            self.last_qa_answer = answer;
        }
        if let Some(retries) = update.research_retries {
            self.research_retries = retries;
        }
        if let Some(stage) = update.stage {
            self.stage = stage;
        }
        if let Some(summary) = update.summary_data {
            self.summary_data = Some(summary);
        }
    }
}
