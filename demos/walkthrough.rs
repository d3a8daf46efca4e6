//! Scripted walkthrough of a full tutoring session against canned
//! collaborators. Run with `cargo run --example walkthrough`.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use tutorloom::collaborators::{LanguageModel, ProviderError, SearchProvider, SearchResult};
use tutorloom::config::TutorConfig;
use tutorloom::engine::{Engine, SessionSnapshot};
use tutorloom::store::InMemoryStore;
use tutorloom::workflow::Workflow;

struct CannedModel;

#[async_trait]
impl LanguageModel for CannedModel {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        let response = if system_prompt.contains("learning sequences and dependencies") {
            "Linear Algebra\nCalculus\nProbability Theory".to_string()
        } else if system_prompt.contains("curriculum designer") {
            user_prompt
                .lines()
                .filter_map(|line| line.strip_prefix("- "))
                .collect::<Vec<_>>()
                .join("\n")
        } else if system_prompt.contains("content reviewer") {
            "APPROVED: the sources cover the topic well.".to_string()
        } else if system_prompt.contains("learning advisor") {
            "You worked from the prerequisites up to the main goal. Well done.".to_string()
        } else {
            "Here is a concise explanation built from the research.".to_string()
        };
        Ok(response)
    }
}

struct CannedSearch;

#[async_trait]
impl SearchProvider for CannedSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        Ok((1..=max_results)
            .map(|i| {
                SearchResult::new(
                    &format!("Reference {i} on {query}"),
                    &format!("https://example.com/{i}"),
                    &format!("Introductory material covering {query} in depth."),
                )
            })
            .collect())
    }
}

fn describe(snapshot: &SessionSnapshot) {
    match &snapshot.pending {
        Some(pending) => println!(
            "-> suspended at {} awaiting {}\n",
            pending.step, pending.interrupt.kind
        ),
        None if snapshot.completed => println!("-> session complete\n"),
        None => println!("-> running\n"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tutorloom::telemetry::init();

    let workflow = Workflow::tutoring(
        Arc::new(CannedModel),
        Arc::new(CannedSearch),
        TutorConfig::default(),
    )?;
    let engine = Engine::new(workflow, Arc::new(InMemoryStore::new()));
    let session_id = Engine::generate_session_id();

    println!("== start(\"Gradient Descent\")");
    let snapshot = engine.start(&session_id, "Gradient Descent").await?;
    describe(&snapshot);

    println!("== resume: learner knows Linear Algebra and Calculus");
    let snapshot = engine
        .resume(
            &session_id,
            json!({"known_prerequisites": ["Linear Algebra", "Calculus"]}),
        )
        .await?;
    describe(&snapshot);
    println!("roadmap: {:?}", snapshot.state.roadmap);

    println!("== resume: ask a question about the first topic");
    let snapshot = engine
        .resume(
            &session_id,
            json!({"action": "ask_question", "question": "Why does this matter?"}),
        )
        .await?;
    describe(&snapshot);

    // Approve every remaining topic, then acknowledge the summary and the
    // completion gate.
    let mut snapshot = snapshot;
    while !snapshot.completed {
        snapshot = engine.resume(&session_id, json!({"action": "continue"})).await?;
        describe(&snapshot);
    }

    println!("completed topics: {:?}", snapshot.state.completed);
    println!(
        "questions asked: {}",
        snapshot.state.qa_log.len()
    );
    if let Some(summary) = &snapshot.state.summary_data {
        println!("summary narrative: {}", summary.narrative);
    }

    Ok(())
}
