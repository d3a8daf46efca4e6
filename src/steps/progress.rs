//! Progress tracking between topics.

use async_trait::async_trait;

use crate::message::Message;
use crate::state::{SessionState, Stage};
use crate::step::{Step, StepContext, StepError, StepOutcome, StepUpdate};

/// Marks the current topic complete and advances the cursor, switching the
/// stage to `SessionSummary` once the roadmap is exhausted. Pure state work;
/// no collaborators, never suspends.
pub struct ProgressStep;

#[async_trait]
impl Step for ProgressStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let finished = state.current_topic().to_string();
        let mut completed = state.completed.clone();
        completed.push(finished.clone());
        let next_cursor = state.cursor + 1;

        if next_cursor >= state.roadmap.len() {
            ctx.emit("progress", "all topics completed")?;
            return Ok(StepOutcome::Continue(StepUpdate {
                completed: Some(completed),
                cursor: Some(next_cursor),
                stage: Some(Stage::SessionSummary),
                topic_done: Some(false),
                messages: Some(vec![Message::assistant(
                    "All topics completed. Generating your learning session summary...",
                )]),
                ..StepUpdate::default()
            }));
        }

        let next_topic = state.roadmap[next_cursor].clone();
        ctx.emit("progress", format!("advancing to {next_topic}"))?;
        let note = format!(
            "Progress update:\nCompleted: {finished}\nNext topic: {next_topic}\n\
             Progress: {next_cursor}/{} topics",
            state.roadmap.len(),
        );

        Ok(StepOutcome::Continue(StepUpdate {
            completed: Some(completed),
            cursor: Some(next_cursor),
            topic_done: Some(false),
            messages: Some(vec![Message::assistant(&note)]),
            ..StepUpdate::default()
        }))
    }
}
