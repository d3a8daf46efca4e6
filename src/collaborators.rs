//! External collaborator contracts consumed by step functions.
//!
//! The engine never talks to the network itself. Language-model and web-search
//! access are injected as trait objects so transports, providers, and test
//! doubles are swappable without touching workflow logic. A collaborator
//! failure surfaces as a [`ProviderError`] and aborts the enclosing
//! start/resume call; the session remains at its last persisted checkpoint.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque language-model collaborator: prompt in, text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for the given system and user prompts.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
    -> Result<String, ProviderError>;
}

/// Opaque web-search collaborator: query in, result list out.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a search, returning at most `max_results` hits.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError>;
}

/// A single web-search hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

impl SearchResult {
    #[must_use]
    pub fn new(title: &str, url: &str, content: &str) -> Self {
        Self {
            title: title.to_string(),
            url: url.to_string(),
            content: content.to_string(),
        }
    }
}

/// Failure of an external collaborator call (network, quota, transport).
///
/// Retryable by re-issuing the enclosing start/resume call.
#[derive(Debug, Error, Diagnostic)]
#[error("provider error ({provider}): {message}")]
#[diagnostic(
    code(tutorloom::collaborators::provider),
    help("The collaborator call failed; re-issue the start/resume call to retry.")
)]
pub struct ProviderError {
    pub provider: &'static str,
    pub message: String,
}

impl ProviderError {
    /// Language-model call failure.
    pub fn model(message: impl Into<String>) -> Self {
        Self {
            provider: "language-model",
            message: message.into(),
        }
    }

    /// Web-search call failure.
    pub fn search(message: impl Into<String>) -> Self {
        Self {
            provider: "search",
            message: message.into(),
        }
    }
}
