//! Tunable parameters for the tutoring workflow.
//!
//! Model identity and sampling settings belong to the injected
//! [`LanguageModel`](crate::collaborators::LanguageModel) implementation;
//! this config carries only the knobs the workflow steps themselves consume.

/// Configurable parameters for a tutoring workflow.
///
/// Values can be overridden from the environment (a `.env` file is honored
/// via `dotenvy`) with [`TutorConfig::from_env`]:
///
/// - `TUTOR_MAX_RESEARCH_RETRIES`
/// - `TUTOR_RESEARCH_SEARCH_RESULTS`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TutorConfig {
    /// Maximum research retries per topic. Reserved: the critique step
    /// currently approves after a single pass and never consumes this.
    pub max_research_retries: u32,
    /// Search fan-out when discovering prerequisites.
    pub prerequisite_search_results: usize,
    /// Search fan-out when researching a topic.
    pub research_search_results: usize,
    /// Per-source snippet cap (in characters) in the research buffer.
    pub snippet_max_chars: usize,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            max_research_retries: 3,
            prerequisite_search_results: 3,
            research_search_results: 5,
            snippet_max_chars: 300,
        }
    }
}

impl TutorConfig {
    /// Build a config from defaults plus environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("TUTOR_MAX_RESEARCH_RETRIES")
            && let Ok(parsed) = raw.parse()
        {
            config.max_research_retries = parsed;
        }
        if let Ok(raw) = std::env::var("TUTOR_RESEARCH_SEARCH_RESULTS")
            && let Ok(parsed) = raw.parse()
        {
            config.research_search_results = parsed;
        }
        config
    }
}
