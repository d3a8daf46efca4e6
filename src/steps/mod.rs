//! Step implementations for the tutoring workflow.
//!
//! Each module holds one or more [`Step`](crate::step::Step) implementations
//! mirroring a phase of the learning journey: prerequisite discovery, the
//! learner's selection, roadmap construction, the research/critique/generate/
//! review learning loop, progress tracking, and session completion.

pub mod completion;
pub mod learning;
pub mod prerequisites;
pub mod progress;
pub mod roadmap;
pub mod selection;

pub use completion::{SessionCompletionStep, SessionSummaryStep};
pub use learning::{CritiqueStep, GenerateStep, ResearchStep, TopicReviewStep};
pub use prerequisites::PrerequisitesStep;
pub use progress::ProgressStep;
pub use roadmap::RoadmapStep;
pub use selection::HumanSelectionStep;

use crate::collaborators::SearchResult;

/// Render search hits into a text block for a model prompt.
pub(crate) fn digest_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|hit| format!("{} ({}): {}", hit.title, hit.url, hit.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate on a character boundary, appending an ellipsis when cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
