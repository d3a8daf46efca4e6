//! Prerequisite discovery.

use async_trait::async_trait;
use std::sync::Arc;

use crate::collaborators::{LanguageModel, SearchProvider};
use crate::config::TutorConfig;
use crate::message::Message;
use crate::state::{SessionState, Stage};
use crate::step::{Step, StepContext, StepError, StepOutcome, StepUpdate};

use super::digest_results;

const SYSTEM_PROMPT: &str = "You are an expert educator with deep knowledge of \
learning sequences and dependencies. Identify the essential, specific \
prerequisites for learning the given topic: direct conceptual dependencies, \
building-block techniques, and the mathematics or skills actually used. Avoid \
generic topics; prefer concrete ones. Based on the search results and your \
expertise, identify 3-6 specific prerequisite topics. Return only the \
prerequisite names, one per line, no explanations or bullets.";

/// Discovers candidate prerequisites for the session's topic.
///
/// Always proceeds; the suspension for the learner's selection happens in the
/// following step.
pub struct PrerequisitesStep {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    config: TutorConfig,
}

impl PrerequisitesStep {
    #[must_use]
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        config: TutorConfig,
    ) -> Self {
        Self {
            model,
            search,
            config,
        }
    }
}

#[async_trait]
impl Step for PrerequisitesStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        ctx.emit(
            "prerequisites",
            format!("discovering prerequisites for {}", state.topic),
        )?;

        let query = format!("prerequisites for learning {}", state.topic);
        let results = self
            .search
            .search(&query, self.config.prerequisite_search_results)
            .await?;

        let user_prompt = format!(
            "Topic to learn: {}\n\nSearch results:\n{}",
            state.topic,
            digest_results(&results)
        );
        let response = self.model.generate(SYSTEM_PROMPT, &user_prompt).await?;

        let prerequisites: Vec<String> = response
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        let listing = prerequisites
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n");
        let note = format!(
            "I found {} prerequisites for learning {}:\n\n{listing}\n\n\
             Let me know which of these topics you're already familiar with, \
             and I'll build a personalized roadmap for the rest.",
            prerequisites.len(),
            state.topic,
        );

        Ok(StepOutcome::Continue(StepUpdate {
            prerequisites: Some(prerequisites),
            messages: Some(vec![Message::assistant(&note)]),
            stage: Some(Stage::HumanSelection),
            awaiting_input: Some(true),
            ..StepUpdate::default()
        }))
    }
}
