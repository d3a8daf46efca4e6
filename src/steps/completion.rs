//! Session summary and final completion.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::collaborators::LanguageModel;
use crate::message::Message;
use crate::state::{SessionState, Stage, SummaryData};
use crate::step::{
    Interrupt, InterruptKind, Step, StepContext, StepError, StepOutcome, StepUpdate,
};

const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert learning advisor \
creating a summary of a student's learning journey. Celebrate the \
achievement, highlight key concepts and connections, show the learning \
progression, and suggest meaningful next steps. Be encouraging, specific, \
and educational, using the actual topics and information provided.";

/// Generates the end-of-session narrative and suspends to display it.
///
/// The expensive model call happens before the suspension and its result is
/// carried in the suspension's update, so a resume after arbitrary delay does
/// not replay it. Any resume value is accepted; the post-resume update only
/// advances the stage so the router can take the completion edge.
pub struct SessionSummaryStep {
    model: Arc<dyn LanguageModel>,
}

impl SessionSummaryStep {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for SessionSummaryStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        if ctx.resume.is_some() {
            ctx.emit("summary", "summary acknowledged")?;
            return Ok(StepOutcome::Continue(StepUpdate {
                stage: Some(Stage::Complete),
                ..StepUpdate::default()
            }));
        }

        ctx.emit("summary", "generating session summary")?;

        let questions: Vec<&str> = state
            .qa_log
            .iter()
            .map(|qa| qa.question.as_str())
            .collect();
        let questions_list = if questions.is_empty() {
            "No questions asked".to_string()
        } else {
            questions.join("; ")
        };
        let user_prompt = format!(
            "Create a learning session summary for this student:\n\n\
             LEARNING GOAL:\n- Original topic requested: {}\n\n\
             LEARNING JOURNEY:\n\
             - Prerequisites discovered: {} topics\n\
             - Already knew: {}\n\
             - Learned during session: {}\n\
             - Complete learning roadmap: {}\n\n\
             SESSION STATISTICS:\n\
             - Total topics completed: {}/{}\n\
             - Questions asked: {}\n\
             - Student questions: {questions_list}",
            state.topic,
            state.prerequisites.len(),
            join_or_none(&state.known_prerequisites),
            join_or_none(&state.unknown_prerequisites),
            state.roadmap.join(" -> "),
            state.completed.len(),
            state.roadmap.len(),
            state.qa_log.len(),
        );
        let narrative = self
            .model
            .generate(SUMMARY_SYSTEM_PROMPT, &user_prompt)
            .await?;

        let summary_content = format!(
            "# Learning Session Complete\n\n{narrative}\n\n---\n\n\
             Thank you for learning with the tutor. Your journey has been \
             saved and you can start a new topic anytime."
        );
        let summary_data = SummaryData {
            session_complete: true,
            summary_generated: true,
            topic: state.topic.clone(),
            total_topics_learned: state.completed.len(),
            total_topics_planned: state.roadmap.len(),
            roadmap: state.roadmap.clone(),
            completed: state.completed.clone(),
            prerequisites_known: state.known_prerequisites.clone(),
            prerequisites_learned: state.unknown_prerequisites.clone(),
            questions_asked_count: state.qa_log.len(),
            narrative: narrative.clone(),
        };

        Ok(StepOutcome::Suspend {
            update: StepUpdate {
                messages: Some(vec![Message::assistant(&summary_content)]),
                summary_data: Some(summary_data.clone()),
                current_lesson: Some(summary_content.clone()),
                topic_done: Some(true),
                awaiting_input: Some(true),
                ..StepUpdate::default()
            },
            interrupt: Interrupt::new(
                InterruptKind::SessionSummaryDisplay,
                json!({
                    "session_completion_data": summary_data,
                    "summary_content": summary_content,
                    "summary_message": narrative,
                }),
            ),
        })
    }
}

/// Final acknowledgment gate. Suspends once; any resume value finalizes the
/// session. Terminal.
pub struct SessionCompletionStep;

#[async_trait]
impl Step for SessionCompletionStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        if ctx.resume.is_none() {
            ctx.emit("completion", "awaiting acknowledgment")?;
            return Ok(StepOutcome::Suspend {
                update: StepUpdate::default(),
                interrupt: Interrupt::new(
                    InterruptKind::SessionCompletionAcknowledgment,
                    json!({
                        "message": "Thank you for completing your learning journey! \
                                    Start a new session anytime.",
                        "session_completion_data": state.summary_data.clone(),
                    }),
                ),
            });
        }

        ctx.emit("completion", "session finalized")?;
        Ok(StepOutcome::Continue(StepUpdate {
            messages: Some(vec![Message::assistant(
                "Learning session successfully completed.",
            )]),
            stage: Some(Stage::Complete),
            awaiting_input: Some(false),
            topic_done: Some(true),
            ..StepUpdate::default()
        }))
    }
}

fn join_or_none(topics: &[String]) -> String {
    if topics.is_empty() {
        "None".to_string()
    } else {
        topics.join(", ")
    }
}
