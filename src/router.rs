//! Deterministic routing between workflow steps.
//!
//! Routing is an explicit table: every [`StepId`] maps to a [`RouteRule`]
//! holding a pure decision function plus the declared set of legal
//! successors. The workflow builder validates the table against the step
//! registry at construction time, so a routing decision can never name a
//! step that does not exist. Decision functions read state and return a
//! [`Next`]; they have no side effects.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::{SessionState, Stage};

/// Identifies a step in the tutoring workflow graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepId {
    Prerequisites,
    HumanSelection,
    Roadmap,
    Research,
    Critique,
    Generate,
    TopicReview,
    Progress,
    SessionSummary,
    SessionCompletion,
}

impl StepId {
    /// All step ids, in graph order.
    pub const ALL: [StepId; 10] = [
        StepId::Prerequisites,
        StepId::HumanSelection,
        StepId::Roadmap,
        StepId::Research,
        StepId::Critique,
        StepId::Generate,
        StepId::TopicReview,
        StepId::Progress,
        StepId::SessionSummary,
        StepId::SessionCompletion,
    ];

    /// Stable string form used for persistence and event metadata.
    #[must_use]
    pub fn encode(self) -> &'static str {
        match self {
            StepId::Prerequisites => "prerequisites",
            StepId::HumanSelection => "human_selection",
            StepId::Roadmap => "roadmap",
            StepId::Research => "research",
            StepId::Critique => "critique",
            StepId::Generate => "generate",
            StepId::TopicReview => "topic_review",
            StepId::Progress => "progress",
            StepId::SessionSummary => "session_summary",
            StepId::SessionCompletion => "session_completion",
        }
    }

    /// Decode a persisted string form.
    #[must_use]
    pub fn decode(s: &str) -> Option<Self> {
        StepId::ALL.into_iter().find(|id| id.encode() == s)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

/// Routing target: another step, or the end of the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Next {
    Step(StepId),
    End,
}

impl fmt::Display for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Step(id) => write!(f, "{id}"),
            Next::End => f.write_str("end"),
        }
    }
}

/// One row of the routing table: a decision function plus the set of
/// successors it is allowed to return.
pub struct RouteRule {
    decide: fn(&SessionState) -> Next,
    successors: Vec<Next>,
}

impl RouteRule {
    #[must_use]
    pub fn new(decide: fn(&SessionState) -> Next, successors: Vec<Next>) -> Self {
        Self { decide, successors }
    }

    /// Unconditional edge to a single successor.
    #[must_use]
    pub fn always(next: Next) -> Self {
        // Single-successor rules short-circuit in decide(); the fn pointer
        // here is never consulted.
        Self {
            decide: |_| Next::End,
            successors: vec![next],
        }
    }

    #[must_use]
    pub fn successors(&self) -> &[Next] {
        &self.successors
    }

    fn decide(&self, state: &SessionState) -> Next {
        if self.successors.len() == 1 {
            return self.successors[0];
        }
        (self.decide)(state)
    }
}

/// The routing table for a workflow.
pub struct Router {
    rules: FxHashMap<StepId, RouteRule>,
    entry: StepId,
}

impl Router {
    #[must_use]
    pub fn new(entry: StepId, rules: FxHashMap<StepId, RouteRule>) -> Self {
        Self { rules, entry }
    }

    /// The routing table for the standard tutoring workflow.
    ///
    /// Edges:
    /// - prerequisites -> human_selection -> roadmap -> research (fixed)
    /// - research -> critique -> generate -> topic_review (fixed)
    /// - topic_review -> research (lesson cleared) | progress (approved)
    ///   | topic_review (still in Q&A)
    /// - progress -> session_summary (roadmap exhausted) | research
    /// - session_summary -> session_completion -> end
    #[must_use]
    pub fn tutoring() -> Self {
        let mut rules = FxHashMap::default();
        rules.insert(
            StepId::Prerequisites,
            RouteRule::always(Next::Step(StepId::HumanSelection)),
        );
        rules.insert(
            StepId::HumanSelection,
            RouteRule::always(Next::Step(StepId::Roadmap)),
        );
        rules.insert(
            StepId::Roadmap,
            RouteRule::always(Next::Step(StepId::Research)),
        );
        rules.insert(
            StepId::Research,
            RouteRule::always(Next::Step(StepId::Critique)),
        );
        rules.insert(
            StepId::Critique,
            RouteRule::always(Next::Step(StepId::Generate)),
        );
        rules.insert(
            StepId::Generate,
            RouteRule::always(Next::Step(StepId::TopicReview)),
        );
        rules.insert(
            StepId::TopicReview,
            RouteRule::new(
                route_after_topic_review,
                vec![
                    Next::Step(StepId::Research),
                    Next::Step(StepId::Progress),
                    Next::Step(StepId::TopicReview),
                ],
            ),
        );
        rules.insert(
            StepId::Progress,
            RouteRule::new(
                route_after_progress,
                vec![
                    Next::Step(StepId::SessionSummary),
                    Next::Step(StepId::Research),
                ],
            ),
        );
        rules.insert(
            StepId::SessionSummary,
            RouteRule::always(Next::Step(StepId::SessionCompletion)),
        );
        rules.insert(StepId::SessionCompletion, RouteRule::always(Next::End));
        Self::new(StepId::Prerequisites, rules)
    }

    /// The step a fresh session enters first.
    #[must_use]
    pub fn entry(&self) -> StepId {
        self.entry
    }

    #[must_use]
    pub fn rules(&self) -> &FxHashMap<StepId, RouteRule> {
        &self.rules
    }

    /// Decide the successor of `from` for the given state.
    ///
    /// Steps with no rule terminate the graph. A decision outside the
    /// declared successor set indicates a routing-table bug; it is logged
    /// and honored (validation already proved the target exists).
    #[must_use]
    pub fn next(&self, from: StepId, state: &SessionState) -> Next {
        let Some(rule) = self.rules.get(&from) else {
            return Next::End;
        };
        let next = rule.decide(state);
        if !rule.successors.contains(&next) {
            tracing::error!(%from, %next, "routing decision outside declared successors");
            debug_assert!(rule.successors.contains(&next));
        }
        next
    }
}

/// Route after topic review based on the learner's feedback.
fn route_after_topic_review(state: &SessionState) -> Next {
    if state.current_lesson.is_empty() {
        // Lesson was cleared for regeneration.
        Next::Step(StepId::Research)
    } else if state.topic_done {
        Next::Step(StepId::Progress)
    } else {
        // Still in Q&A; revisit the review.
        Next::Step(StepId::TopicReview)
    }
}

/// Route from the progress tracker to the next topic or the summary.
fn route_after_progress(state: &SessionState) -> Next {
    if state.stage == Stage::SessionSummary || state.cursor >= state.roadmap.len() {
        Next::Step(StepId::SessionSummary)
    } else {
        Next::Step(StepId::Research)
    }
}
