//! Learning roadmap construction.

use async_trait::async_trait;
use std::sync::Arc;

use crate::collaborators::LanguageModel;
use crate::message::Message;
use crate::state::{SessionState, Stage};
use crate::step::{Step, StepContext, StepError, StepOutcome, StepUpdate};

const SYSTEM_PROMPT: &str = "You are an expert curriculum designer. Given a \
list of topics the student needs to learn, arrange them in the optimal \
learning order considering dependencies between topics. The last topic in \
the list is the main learning goal. Return exactly the same topics, one per \
line, without numbering or bullets. Do not add or drop topics.";

/// Orders the unknown prerequisites plus the main topic into a roadmap.
///
/// The model is asked for a strict reordering. The returned list is validated
/// as a permutation of the input; on mismatch the input order is used instead
/// (the model call is advisory, never a control-flow error).
pub struct RoadmapStep {
    model: Arc<dyn LanguageModel>,
}

impl RoadmapStep {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for RoadmapStep {
    async fn run(&self, state: &SessionState, ctx: StepContext) -> Result<StepOutcome, StepError> {
        let mut topics: Vec<String> = state.unknown_prerequisites.clone();
        topics.push(state.topic.clone());

        // An empty learning goal with no unknown prerequisites leaves nothing
        // to order; the roadmap stays empty and no model call is made.
        if topics.iter().all(|topic| topic.is_empty()) {
            ctx.emit("roadmap", "nothing to learn; roadmap is empty")?;
            return Ok(StepOutcome::Continue(StepUpdate {
                roadmap: Some(Vec::new()),
                cursor: Some(0),
                stage: Some(Stage::Learning),
                ..StepUpdate::default()
            }));
        }

        ctx.emit("roadmap", format!("ordering {} topics", topics.len()))?;

        let user_prompt = format!(
            "Create an optimal learning sequence for these topics:\n{}\n\n\
             The main goal is to learn the final topic in this list.",
            topics
                .iter()
                .map(|t| format!("- {t}"))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        let response = self.model.generate(SYSTEM_PROMPT, &user_prompt).await?;

        let ordered: Vec<String> = response
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        let roadmap = validate_reordering(&topics, ordered);

        let listing = roadmap
            .iter()
            .enumerate()
            .map(|(i, topic)| format!("{}. {topic}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        let note = format!(
            "Your personalized learning roadmap:\n\n{listing}\n\n\
             Let's start with the first topic: {}",
            roadmap.first().map_or("", String::as_str),
        );

        Ok(StepOutcome::Continue(StepUpdate {
            roadmap: Some(roadmap),
            cursor: Some(0),
            messages: Some(vec![Message::assistant(&note)]),
            stage: Some(Stage::Learning),
            ..StepUpdate::default()
        }))
    }
}

/// Accept the model's ordering only if it is a permutation of the input;
/// otherwise fall back to the input order.
fn validate_reordering(expected: &[String], ordered: Vec<String>) -> Vec<String> {
    let mut expected_sorted: Vec<&String> = expected.iter().collect();
    let mut ordered_sorted: Vec<&String> = ordered.iter().collect();
    expected_sorted.sort();
    ordered_sorted.sort();
    if expected_sorted == ordered_sorted {
        ordered
    } else {
        tracing::warn!(
            expected = expected.len(),
            returned = ordered.len(),
            "roadmap reordering was not a permutation of its input; using input order"
        );
        expected.to_vec()
    }
}
