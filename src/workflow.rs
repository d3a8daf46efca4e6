//! Workflow definition: step registry plus routing table, validated at
//! construction.
//!
//! [`WorkflowBuilder`] collects step implementations and a [`Router`];
//! [`build`](WorkflowBuilder::build) checks the two against each other so a
//! compiled [`Workflow`] can never route to an unregistered step. The
//! standard tutoring graph is wired by [`Workflow::tutoring`].

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::collaborators::{LanguageModel, SearchProvider};
use crate::config::TutorConfig;
use crate::router::{Next, Router, StepId};
use crate::step::Step;
use crate::steps::{
    CritiqueStep, GenerateStep, HumanSelectionStep, PrerequisitesStep, ProgressStep, ResearchStep,
    RoadmapStep, SessionCompletionStep, SessionSummaryStep, TopicReviewStep,
};

/// Structural errors detected when building a workflow.
#[derive(Debug, Error, Diagnostic)]
pub enum WorkflowError {
    #[error("no router configured")]
    #[diagnostic(code(tutorloom::workflow::missing_router))]
    MissingRouter,

    #[error("entry step {entry} is not registered")]
    #[diagnostic(
        code(tutorloom::workflow::unregistered_entry),
        help("Register the entry step with add_step before building.")
    )]
    UnregisteredEntry { entry: StepId },

    #[error("routing rule for {from} names unregistered successor {to}")]
    #[diagnostic(
        code(tutorloom::workflow::unknown_successor),
        help("Every successor in the routing table must be a registered step.")
    )]
    UnknownSuccessor { from: StepId, to: StepId },

    #[error("registered step {step} has no routing rule")]
    #[diagnostic(
        code(tutorloom::workflow::missing_rule),
        help("Add a routing rule for every registered step, or drop the step.")
    )]
    MissingRule { step: StepId },
}

/// Builder for workflows.
pub struct WorkflowBuilder {
    steps: FxHashMap<StepId, Arc<dyn Step>>,
    router: Option<Router>,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: FxHashMap::default(),
            router: None,
        }
    }

    /// Register a step implementation under the given id.
    #[must_use]
    pub fn add_step(mut self, id: StepId, step: impl Step + 'static) -> Self {
        self.steps.insert(id, Arc::new(step));
        self
    }

    /// Install the routing table.
    #[must_use]
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Validate and produce an executable workflow.
    ///
    /// Checks that the entry step is registered, every routing successor is a
    /// registered step, and every registered step has a routing rule.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let router = self.router.ok_or(WorkflowError::MissingRouter)?;
        if !self.steps.contains_key(&router.entry()) {
            return Err(WorkflowError::UnregisteredEntry {
                entry: router.entry(),
            });
        }
        for (from, rule) in router.rules() {
            for next in rule.successors() {
                if let Next::Step(to) = next
                    && !self.steps.contains_key(to)
                {
                    return Err(WorkflowError::UnknownSuccessor {
                        from: *from,
                        to: *to,
                    });
                }
            }
        }
        for step in self.steps.keys() {
            if !router.rules().contains_key(step) {
                return Err(WorkflowError::MissingRule { step: *step });
            }
        }
        Ok(Workflow {
            steps: self.steps,
            router,
        })
    }
}

/// A validated workflow: step registry plus routing table.
pub struct Workflow {
    steps: FxHashMap<StepId, Arc<dyn Step>>,
    router: Router,
}

impl Workflow {
    /// The standard ten-step tutoring workflow over the given collaborators.
    pub fn tutoring(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        config: TutorConfig,
    ) -> Result<Self, WorkflowError> {
        WorkflowBuilder::new()
            .add_step(
                StepId::Prerequisites,
                PrerequisitesStep::new(model.clone(), search.clone(), config.clone()),
            )
            .add_step(StepId::HumanSelection, HumanSelectionStep)
            .add_step(StepId::Roadmap, RoadmapStep::new(model.clone()))
            .add_step(StepId::Research, ResearchStep::new(search, config))
            .add_step(StepId::Critique, CritiqueStep::new(model.clone()))
            .add_step(StepId::Generate, GenerateStep::new(model.clone()))
            .add_step(StepId::TopicReview, TopicReviewStep::new(model.clone()))
            .add_step(StepId::Progress, ProgressStep)
            .add_step(StepId::SessionSummary, SessionSummaryStep::new(model))
            .add_step(StepId::SessionCompletion, SessionCompletionStep)
            .with_router(Router::tutoring())
            .build()
    }

    /// Look up a step implementation.
    #[must_use]
    pub fn step(&self, id: StepId) -> Option<&Arc<dyn Step>> {
        self.steps.get(&id)
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The step a fresh session enters first.
    #[must_use]
    pub fn entry(&self) -> StepId {
        self.router.entry()
    }
}
