//! Scripted collaborator doubles for engine tests.
//!
//! Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tutorloom::collaborators::{LanguageModel, ProviderError, SearchProvider, SearchResult};
use tutorloom::state::SessionState;
use tutorloom::step::{Step, StepContext, StepError, StepOutcome, StepUpdate};

/// Language-model double that dispatches on distinctive system-prompt
/// phrases, so one instance serves every step in a full session drive.
pub struct MockModel {
    pub prerequisites: Vec<String>,
    /// When set, returned verbatim for roadmap calls instead of echoing the
    /// requested topics (used to exercise the reorder-repair fallback).
    roadmap_response: Mutex<Option<String>>,
    /// Fail the next calls whose dispatch tag matches.
    fail_tag: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockModel {
    fn default() -> Self {
        Self {
            prerequisites: vec![
                "Linear Algebra".to_string(),
                "Calculus".to_string(),
                "Probability Theory".to_string(),
            ],
            roadmap_response: Mutex::new(None),
            fail_tag: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prerequisites(prerequisites: &[&str]) -> Self {
        Self {
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn set_roadmap_response(&self, response: Option<&str>) {
        *self.roadmap_response.lock() = response.map(String::from);
    }

    /// Make calls with the given dispatch tag fail until cleared.
    pub fn fail_on(&self, tag: Option<&str>) {
        *self.fail_tag.lock() = tag.map(String::from);
    }

    pub fn count(&self, tag: &str) -> usize {
        self.calls.lock().iter().filter(|t| *t == tag).count()
    }

    fn dispatch_tag(system_prompt: &str) -> &'static str {
        if system_prompt.contains("learning sequences and dependencies") {
            "prerequisites"
        } else if system_prompt.contains("curriculum designer") {
            "roadmap"
        } else if system_prompt.contains("content reviewer") {
            "critique"
        } else if system_prompt.contains("educational content from the research material") {
            "generate"
        } else if system_prompt.contains("answering student questions") {
            "qa"
        } else if system_prompt.contains("learning advisor") {
            "summary"
        } else {
            "unknown"
        }
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        let tag = Self::dispatch_tag(system_prompt);
        self.calls.lock().push(tag.to_string());
        if self.fail_tag.lock().as_deref() == Some(tag) {
            return Err(ProviderError::model("simulated model outage"));
        }
        let response = match tag {
            "prerequisites" => self.prerequisites.join("\n"),
            "roadmap" => {
                if let Some(scripted) = self.roadmap_response.lock().clone() {
                    scripted
                } else {
                    // Echo the requested topics in the order given: a valid
                    // identity permutation.
                    user_prompt
                        .lines()
                        .filter_map(|line| line.strip_prefix("- "))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            "critique" => "APPROVED: coverage and accuracy look solid.".to_string(),
            "generate" => {
                let topic = user_prompt
                    .lines()
                    .find_map(|line| line.strip_prefix("Create a comprehensive lesson on: "))
                    .unwrap_or("the topic");
                format!("An explanation of {topic}.")
            }
            "qa" => "Here's an answer grounded in the lesson.".to_string(),
            "summary" => "You worked through every topic on the roadmap.".to_string(),
            _ => "unrecognized prompt".to_string(),
        };
        Ok(response)
    }
}

/// Search double producing deterministic hits, with snippets long enough to
/// exercise truncation.
#[derive(Default)]
pub struct MockSearch {
    fail: AtomicBool,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::search("simulated search outage"));
        }
        let snippet = format!("Background material on {query}. ").repeat(20);
        Ok((1..=max_results)
            .map(|i| {
                SearchResult::new(
                    &format!("Result {i} for {query}"),
                    &format!("https://example.com/{i}"),
                    &snippet,
                )
            })
            .collect())
    }
}

/// Model double that parks inside `generate` until released, for exercising
/// the per-session in-flight guard.
pub struct GatedModel {
    pub entered: Arc<tokio::sync::Notify>,
    pub release: Arc<tokio::sync::Semaphore>,
    inner: MockModel,
}

impl Default for GatedModel {
    fn default() -> Self {
        Self {
            entered: Arc::new(tokio::sync::Notify::new()),
            release: Arc::new(tokio::sync::Semaphore::new(0)),
            inner: MockModel::new(),
        }
    }
}

impl GatedModel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LanguageModel for GatedModel {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        self.entered.notify_one();
        let _permit = self
            .release
            .acquire()
            .await
            .map_err(|_| ProviderError::model("gate closed"))?;
        self.inner.generate(system_prompt, user_prompt).await
    }
}

/// Minimal step for workflow-validation tests.
pub struct NoopStep;

#[async_trait]
impl Step for NoopStep {
    async fn run(&self, _state: &SessionState, _ctx: StepContext) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::Continue(StepUpdate::default()))
    }
}
