//! Human-in-the-loop prerequisite selection.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::message::Message;
use crate::state::{SessionState, Stage};
use crate::step::{
    Interrupt, InterruptKind, Step, StepContext, StepError, StepOutcome, StepUpdate,
};

/// Suspends until the learner marks which prerequisites they already know,
/// then partitions the prerequisite list.
///
/// The resume response is expected as `{"known_prerequisites": ["..."]}`.
/// Entries not present in the discovered list are discarded; a malformed
/// response means "knows none": defensive defaults, never an error.
pub struct HumanSelectionStep;

#[async_trait]
impl Step for HumanSelectionStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let Some(response) = ctx.resume.clone() else {
            ctx.emit("selection", "awaiting prerequisite selection")?;
            return Ok(StepOutcome::Suspend {
                update: StepUpdate::default(),
                interrupt: Interrupt::new(
                    InterruptKind::PrerequisiteSelection,
                    json!({
                        "message": "Please select which of these prerequisites you already know:",
                        "prerequisites": state.prerequisites.clone(),
                        "instructions": "Provide a list of prerequisites you're already familiar with",
                    }),
                ),
            });
        };

        let (known, unknown) = partition_prerequisites(&state.prerequisites, &response);
        ctx.emit(
            "selection",
            format!("{} known, {} to learn", known.len(), unknown.len()),
        )?;

        let note = if unknown.is_empty() && !state.prerequisites.is_empty() {
            format!(
                "You're already familiar with all the prerequisites. \
                 Let's proceed directly to learning {}.",
                state.topic
            )
        } else {
            format!(
                "Known topics ({}): {}\nTopics to learn ({}): {}\n\
                 Now I'll create your personalized learning roadmap.",
                known.len(),
                join_or_none(&known),
                unknown.len(),
                join_or_none(&unknown),
            )
        };

        Ok(StepOutcome::Continue(StepUpdate {
            known_prerequisites: Some(known),
            unknown_prerequisites: Some(unknown),
            messages: Some(vec![Message::assistant(&note)]),
            stage: Some(Stage::Roadmap),
            awaiting_input: Some(false),
            ..StepUpdate::default()
        }))
    }
}

/// Split the discovered prerequisites into (known, unknown) according to the
/// learner's response, preserving discovery order and discarding entries that
/// were never discovered.
fn partition_prerequisites(
    prerequisites: &[String],
    response: &Value,
) -> (Vec<String>, Vec<String>) {
    let selected: Vec<&str> = response
        .get("known_prerequisites")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let known: Vec<String> = prerequisites
        .iter()
        .filter(|p| selected.contains(&p.as_str()))
        .cloned()
        .collect();
    let unknown: Vec<String> = prerequisites
        .iter()
        .filter(|p| !known.contains(p))
        .cloned()
        .collect();
    (known, unknown)
}

fn join_or_none(topics: &[String]) -> String {
    if topics.is_empty() {
        "none".to_string()
    } else {
        topics.join(", ")
    }
}
