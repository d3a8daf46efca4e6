//! # Tutorloom: Resumable Tutoring Workflow Engine
//!
//! Tutorloom sequences an interactive learning session through a directed
//! graph of steps: discover prerequisites for a topic, let the learner mark
//! which they already know, build an ordered roadmap, then iteratively
//! research, critique, and teach each topic with human approval before
//! advancing, finally producing a session summary.
//!
//! The heart of the crate is a **workflow state machine with
//! human-in-the-loop suspension**: some steps pause indefinitely awaiting
//! external input, execution is resumable after arbitrary delay (including
//! process restart), and every session's state is isolated and independently
//! resumable by an opaque session id.
//!
//! ## Core concepts
//!
//! - **Steps**: async units of work returning partial state updates or
//!   first-class suspensions ([`step`])
//! - **State**: the per-session record steps read and update ([`state`])
//! - **Router**: a validated table mapping state to the next step ([`router`])
//! - **Engine**: sequential execution with persistence at every step
//!   boundary and explicit resume re-entry ([`engine`])
//! - **Store**: pluggable checkpoint persistence ([`store`])
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tutorloom::config::TutorConfig;
//! use tutorloom::engine::Engine;
//! use tutorloom::store::InMemoryStore;
//! use tutorloom::workflow::Workflow;
//! # use tutorloom::collaborators::{LanguageModel, SearchProvider};
//! # async fn example(
//! #     model: Arc<dyn LanguageModel>,
//! #     search: Arc<dyn SearchProvider>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let workflow = Workflow::tutoring(model, search, TutorConfig::default())?;
//! let engine = Engine::new(workflow, Arc::new(InMemoryStore::new()));
//!
//! let session_id = Engine::generate_session_id();
//! let snapshot = engine.start(&session_id, "Gradient Descent").await?;
//! // snapshot.pending now describes the prerequisite selection the
//! // workflow is awaiting; render it, then resume with the answer:
//! let snapshot = engine
//!     .resume(&session_id, json!({"known_prerequisites": ["Linear Algebra"]}))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! External collaborators (language model, web search) are trait objects the
//! caller injects ([`collaborators`]); the crate ships no network client.

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod event_bus;
pub mod message;
pub mod persistence;
pub mod router;
pub mod state;
pub mod step;
pub mod steps;
pub mod store;
pub mod telemetry;
pub mod workflow;
