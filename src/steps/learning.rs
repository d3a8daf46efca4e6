//! The per-topic learning loop: research, critique, lesson generation, and
//! the human topic review.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::collaborators::{LanguageModel, SearchProvider};
use crate::config::TutorConfig;
use crate::message::Message;
use crate::state::{QaEntry, SessionState};
use crate::step::{
    Interrupt, InterruptKind, Step, StepContext, StepError, StepOutcome, StepUpdate,
};

use super::truncate_chars;

/// Researches the current topic through web search and compiles the results
/// into the session's research buffer. Never suspends.
pub struct ResearchStep {
    search: Arc<dyn SearchProvider>,
    config: TutorConfig,
}

impl ResearchStep {
    #[must_use]
    pub fn new(search: Arc<dyn SearchProvider>, config: TutorConfig) -> Self {
        Self { search, config }
    }
}

#[async_trait]
impl Step for ResearchStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let topic = state.current_topic().to_string();
        if topic.is_empty() {
            return Ok(StepOutcome::Continue(StepUpdate {
                current_research: Some("No topic to research".to_string()),
                research_retries: Some(0),
                ..StepUpdate::default()
            }));
        }

        ctx.emit("research", format!("researching {topic}"))?;

        let query = format!("{topic} tutorial explanation");
        let results = self
            .search
            .search(&query, self.config.research_search_results)
            .await?;

        let mut buffer = format!("Research for: {topic}\n\n");
        for (i, hit) in results.iter().enumerate() {
            buffer.push_str(&format!(
                "Source {}: {}\nURL: {}\nContent: {}\n\n",
                i + 1,
                hit.title,
                hit.url,
                truncate_chars(&hit.content, self.config.snippet_max_chars),
            ));
        }

        let note = format!(
            "Completed research on {topic}. Found {} relevant sources.",
            results.len()
        );

        Ok(StepOutcome::Continue(StepUpdate {
            current_research: Some(buffer),
            research_retries: Some(0),
            messages: Some(vec![Message::assistant(&note)]),
            ..StepUpdate::default()
        }))
    }
}

const CRITIQUE_SYSTEM_PROMPT: &str = "You are an expert content reviewer for \
educational materials. Assess whether the research content is accurate, \
comprehensive enough for learning, well-structured, and relevant to the \
topic. Respond with 'APPROVED' if the content is good enough, or \
'NEEDS_IMPROVEMENT' followed by specific feedback.";

/// Reviews the research buffer and annotates it with the model's feedback.
///
/// The review always accepts after one pass; `research_retries` stays in the
/// state model for a future retry loop but does not drive routing.
pub struct CritiqueStep {
    model: Arc<dyn LanguageModel>,
}

impl CritiqueStep {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for CritiqueStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        ctx.emit(
            "critique",
            format!("reviewing research for {}", state.current_topic()),
        )?;

        let user_prompt = format!(
            "Please review this research content:\n\n{}",
            state.current_research
        );
        let response = self
            .model
            .generate(CRITIQUE_SYSTEM_PROMPT, &user_prompt)
            .await?;

        let verdict = if response.to_uppercase().contains("APPROVED") {
            "approved"
        } else {
            "needs refinement"
        };
        let note = format!(
            "Research review completed for {}. Quality assessment: {verdict}.",
            state.current_topic()
        );
        let annotated = format!(
            "{}\n\n[REVIEW FEEDBACK: {response}]",
            state.current_research
        );

        Ok(StepOutcome::Continue(StepUpdate {
            current_research: Some(annotated),
            messages: Some(vec![Message::assistant(&note)]),
            ..StepUpdate::default()
        }))
    }
}

const GENERATE_SYSTEM_PROMPT: &str = "You are an expert educator. Create \
clear, engaging educational content from the research material. Structure \
the lesson with a brief introduction, key concepts explained simply, \
practical examples where relevant, a summary of main points, and a \
connection to next learning steps.";

/// Generates lesson text for the current topic from the research buffer and
/// flags the session as awaiting the learner's review.
pub struct GenerateStep {
    model: Arc<dyn LanguageModel>,
}

impl GenerateStep {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for GenerateStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let topic = state.current_topic().to_string();
        ctx.emit("generate", format!("creating lesson for {topic}"))?;

        let user_prompt = format!(
            "Create a comprehensive lesson on: {topic}\n\nBased on this research:\n{}",
            state.current_research
        );
        let response = self
            .model
            .generate(GENERATE_SYSTEM_PROMPT, &user_prompt)
            .await?;

        let lesson = format!(
            "# Lesson: {topic}\n\n{response}\n\nTopic complete. Ready for your review."
        );

        Ok(StepOutcome::Continue(StepUpdate {
            current_lesson: Some(lesson.clone()),
            messages: Some(vec![Message::assistant(&lesson)]),
            awaiting_input: Some(true),
            topic_done: Some(false),
            ..StepUpdate::default()
        }))
    }
}

/// Suspends for the learner's verdict on the generated lesson.
///
/// The resume response is `{"action": "...", "question": "..."}`:
///
/// - `ask_question` with a non-empty question answers it from the lesson
///   context, logs the exchange, and stays in review (the router self-loops
///   back here for another verdict).
/// - `regenerate` clears the lesson, sending the router back to research.
/// - `continue`, or anything malformed or out of vocabulary, completes the
///   topic, so unexpected client input can never deadlock the workflow.
pub struct TopicReviewStep {
    model: Arc<dyn LanguageModel>,
}

impl TopicReviewStep {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn answer_question(
        &self,
        state: &SessionState,
        topic: &str,
        question: &str,
    ) -> Result<StepUpdate, StepError> {
        let system_prompt = format!(
            "You are an expert tutor answering student questions about {topic}. \
             Provide clear, helpful answers based on the lesson content. Keep \
             your answer focused and educational."
        );
        let user_prompt = format!(
            "Student question about {topic}: {question}\n\nLesson context:\n{}",
            state.current_lesson
        );
        let answer = self.model.generate(&system_prompt, &user_prompt).await?;

        let note = format!(
            "Q&A about {topic}\n\nQuestion: {question}\n\nAnswer: {answer}\n\n\
             Review the lesson and answer above, then choose an option to continue."
        );
        let mut qa_log = state.qa_log.clone();
        qa_log.push(QaEntry {
            question: question.to_string(),
            answer: answer.clone(),
        });

        Ok(StepUpdate {
            messages: Some(vec![Message::assistant(&note)]),
            awaiting_input: Some(true),
            topic_done: Some(false),
            qa_log: Some(qa_log),
            last_qa_question: Some(question.to_string()),
            last_qa_answer: Some(answer),
            ..StepUpdate::default()
        })
    }
}

#[async_trait]
impl Step for TopicReviewStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let topic = state.current_topic().to_string();

        let Some(response) = ctx.resume.clone() else {
            ctx.emit("review", format!("awaiting feedback on {topic}"))?;
            return Ok(StepOutcome::Suspend {
                update: StepUpdate::default(),
                interrupt: Interrupt::new(
                    InterruptKind::TopicReview,
                    json!({
                        "topic": topic.clone(),
                        "lesson_content": state.current_lesson.clone(),
                        "message": format!(
                            "Please review the lesson on '{topic}'. Do you understand \
                             the concepts and are ready to continue?"
                        ),
                        "options": [
                            {"value": "continue", "label": "I understand, continue to next topic"},
                            {"value": "ask_question", "label": "I have questions about this topic"},
                            {"value": "regenerate", "label": "Please explain this topic differently"},
                        ],
                        "instructions": "Choose an option or ask specific questions about the topic",
                    }),
                ),
            });
        };

        let action = response
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("continue");
        let question = response
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();

        match action {
            "ask_question" if !question.is_empty() => {
                ctx.emit("review", format!("answering question about {topic}"))?;
                let update = self.answer_question(state, &topic, &question).await?;
                Ok(StepOutcome::Continue(update))
            }
            "regenerate" => {
                ctx.emit("review", format!("regenerating lesson for {topic}"))?;
                let note = format!(
                    "I'll regenerate the lesson on {topic} with a different approach."
                );
                Ok(StepOutcome::Continue(StepUpdate {
                    messages: Some(vec![Message::assistant(&note)]),
                    awaiting_input: Some(false),
                    topic_done: Some(false),
                    // Empty lesson is the regeneration sentinel the router keys on.
                    current_lesson: Some(String::new()),
                    ..StepUpdate::default()
                }))
            }
            _ => {
                ctx.emit("review", format!("{topic} approved"))?;
                let note = format!(
                    "You've completed learning {topic}. Let's move to the next topic."
                );
                Ok(StepOutcome::Continue(StepUpdate {
                    messages: Some(vec![Message::assistant(&note)]),
                    awaiting_input: Some(false),
                    topic_done: Some(true),
                    last_qa_question: Some(String::new()),
                    last_qa_answer: Some(String::new()),
                    ..StepUpdate::default()
                }))
            }
        }
    }
}
