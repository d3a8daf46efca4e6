//! End-to-end engine scenarios over mock collaborators.

use serde_json::{Value, json};
use std::sync::Arc;

use tutorloom::config::TutorConfig;
use tutorloom::engine::{Engine, EngineError, SessionSnapshot};
use tutorloom::message::Message;
use tutorloom::state::Stage;
use tutorloom::step::InterruptKind;
use tutorloom::store::InMemoryStore;
use tutorloom::workflow::Workflow;

mod common;
use common::*;

fn known(entries: &[&str]) -> Value {
    json!({ "known_prerequisites": entries })
}

fn assert_partition(snapshot: &SessionSnapshot) {
    let state = &snapshot.state;
    for topic in &state.known_prerequisites {
        assert!(
            !state.unknown_prerequisites.contains(topic),
            "{topic} appears in both partitions"
        );
    }
    let mut union: Vec<&String> = state
        .known_prerequisites
        .iter()
        .chain(&state.unknown_prerequisites)
        .collect();
    union.sort();
    let mut all: Vec<&String> = state.prerequisites.iter().collect();
    all.sort();
    assert_eq!(union, all, "partition does not cover the prerequisite set");
}

#[tokio::test]
async fn start_suspends_for_prerequisite_selection() {
    let (engine, _, _) = mock_engine();
    let snapshot = engine.start("s1", "Gradient Descent").await.expect("start");

    let pending = expect_pending(&snapshot, InterruptKind::PrerequisiteSelection);
    let offered = pending.interrupt.payload["prerequisites"]
        .as_array()
        .expect("prerequisites payload")
        .len();
    assert_eq!(offered, 3);

    assert_eq!(snapshot.state.stage, Stage::HumanSelection);
    assert!(snapshot.state.awaiting_input);
    assert!(!snapshot.completed);
    assert_eq!(snapshot.state.prerequisites.len(), 3);
    assert!(snapshot.state.conversation[0].has_role(Message::USER));
}

#[tokio::test]
async fn full_session_walkthrough() {
    let (engine, model, _) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");

    // Learner knows the first two of three discovered prerequisites.
    let snapshot = engine
        .resume("s1", known(&["Linear Algebra", "Calculus"]))
        .await
        .expect("selection resume");
    assert_partition(&snapshot);
    assert_eq!(
        snapshot.state.unknown_prerequisites,
        vec!["Probability Theory".to_string()]
    );
    assert_eq!(
        snapshot.state.roadmap,
        vec!["Probability Theory".to_string(), "Gradient Descent".to_string()]
    );
    assert_eq!(
        snapshot.state.roadmap.last().map(String::as_str),
        Some("Gradient Descent"),
    );

    // The internal research -> critique -> generate chain ran to the review.
    let pending = expect_pending(&snapshot, InterruptKind::TopicReview);
    assert_eq!(
        pending.interrupt.payload["topic"].as_str(),
        Some("Probability Theory")
    );
    assert!(!snapshot.state.current_lesson.is_empty());
    assert_eq!(snapshot.state.cursor, 0);

    // Approve topic one.
    let snapshot = engine
        .resume("s1", json!({"action": "continue"}))
        .await
        .expect("first approval");
    let pending = expect_pending(&snapshot, InterruptKind::TopicReview);
    assert_eq!(
        pending.interrupt.payload["topic"].as_str(),
        Some("Gradient Descent")
    );
    assert_eq!(snapshot.state.cursor, 1);
    assert_eq!(snapshot.state.completed, vec!["Probability Theory".to_string()]);

    // Approve topic two; the roadmap is exhausted and the summary suspends.
    let snapshot = engine
        .resume("s1", json!({"action": "continue"}))
        .await
        .expect("second approval");
    let pending = expect_pending(&snapshot, InterruptKind::SessionSummaryDisplay);
    assert_eq!(snapshot.state.stage, Stage::SessionSummary);
    assert_eq!(snapshot.state.cursor, snapshot.state.roadmap.len());
    let summary = snapshot.state.summary_data.as_ref().expect("summary data");
    assert_eq!(summary.total_topics_learned, 2);
    assert_eq!(summary.total_topics_planned, 2);
    assert!(pending.interrupt.payload["summary_content"].is_string());

    // Acknowledge the summary, then the final completion gate.
    let snapshot = engine.resume("s1", json!({})).await.expect("summary ack");
    expect_pending(&snapshot, InterruptKind::SessionCompletionAcknowledgment);
    assert_eq!(snapshot.state.stage, Stage::Complete);

    let snapshot = engine.resume("s1", json!({})).await.expect("final ack");
    assert!(snapshot.completed);
    assert!(snapshot.pending.is_none());
    assert!(!snapshot.state.awaiting_input);
    assert_eq!(snapshot.state.stage, Stage::Complete);
    assert_eq!(
        snapshot.state.completed,
        vec!["Probability Theory".to_string(), "Gradient Descent".to_string()]
    );

    // One research cycle per topic, one summary.
    assert_eq!(model.count("generate"), 2);
    assert_eq!(model.count("critique"), 2);
    assert_eq!(model.count("summary"), 1);
}

#[tokio::test]
async fn single_topic_roadmap_runs_exactly_one_learning_cycle() {
    let (engine, model, search) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");

    // Learner knows every prerequisite: the roadmap is just the topic.
    let snapshot = engine
        .resume(
            "s1",
            known(&["Linear Algebra", "Calculus", "Probability Theory"]),
        )
        .await
        .expect("selection resume");
    assert_eq!(snapshot.state.roadmap, vec!["Gradient Descent".to_string()]);
    expect_pending(&snapshot, InterruptKind::TopicReview);

    let snapshot = engine
        .resume("s1", json!({"action": "continue"}))
        .await
        .expect("approval");
    expect_pending(&snapshot, InterruptKind::SessionSummaryDisplay);

    // Exactly one research -> critique -> generate cycle before the summary:
    // one prerequisite search plus one research search, one critique, one
    // generation.
    assert_eq!(search.calls(), 2);
    assert_eq!(model.count("critique"), 1);
    assert_eq!(model.count("generate"), 1);
    let queries = search.queries();
    assert!(queries[0].contains("Gradient Descent"));
    assert!(queries[1].contains("Gradient Descent"));
}

#[tokio::test]
async fn discovered_prerequisites_are_offered_verbatim() {
    let model = Arc::new(MockModel::with_prerequisites(&["Chain Rule"]));
    let search = Arc::new(MockSearch::new());
    let engine = engine_over(model, search, Arc::new(InMemoryStore::new()));

    let snapshot = engine.start("s1", "Backpropagation").await.expect("start");
    let pending = expect_pending(&snapshot, InterruptKind::PrerequisiteSelection);
    assert_eq!(
        pending.interrupt.payload["prerequisites"],
        json!(["Chain Rule"])
    );
    assert_eq!(snapshot.state.prerequisites, vec!["Chain Rule".to_string()]);
}

#[tokio::test]
async fn regeneration_restarts_the_learning_chain_for_the_same_topic() {
    let (engine, model, _) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");
    let snapshot = engine
        .resume("s1", known(&["Linear Algebra", "Calculus"]))
        .await
        .expect("selection resume");
    let first = expect_pending(&snapshot, InterruptKind::TopicReview);

    let snapshot = engine
        .resume("s1", json!({"action": "regenerate"}))
        .await
        .expect("regenerate resume");

    // The next stop is a topic review for the same topic, with a freshly
    // generated (non-empty) lesson.
    let second = expect_pending(&snapshot, InterruptKind::TopicReview);
    assert_eq!(
        first.interrupt.payload["topic"],
        second.interrupt.payload["topic"]
    );
    assert!(!snapshot.state.current_lesson.is_empty());
    assert_eq!(snapshot.state.cursor, 0);
    assert_eq!(model.count("generate"), 2);
    assert_eq!(model.count("critique"), 2);
}

#[tokio::test]
async fn ask_question_self_loops_and_logs_the_exchange() {
    let (engine, model, _) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");
    engine
        .resume("s1", known(&["Linear Algebra", "Calculus"]))
        .await
        .expect("selection resume");

    let snapshot = engine
        .resume(
            "s1",
            json!({"action": "ask_question", "question": "Why does this converge?"}),
        )
        .await
        .expect("question resume");

    // Still reviewing the same topic.
    expect_pending(&snapshot, InterruptKind::TopicReview);
    assert!(snapshot.state.awaiting_input);
    assert!(!snapshot.state.topic_done);
    assert_eq!(snapshot.state.qa_log.len(), 1);
    assert_eq!(snapshot.state.qa_log[0].question, "Why does this converge?");
    assert_eq!(snapshot.state.last_qa_question, "Why does this converge?");
    assert_eq!(model.count("qa"), 1);
    // No regeneration happened.
    assert_eq!(model.count("generate"), 1);

    // Approving afterwards clears the single-turn display fields but keeps
    // the cumulative log.
    let snapshot = engine
        .resume("s1", json!({"action": "continue"}))
        .await
        .expect("approval");
    assert!(snapshot.state.last_qa_question.is_empty());
    assert!(snapshot.state.last_qa_answer.is_empty());
    assert_eq!(snapshot.state.qa_log.len(), 1);
}

#[tokio::test]
async fn empty_question_falls_through_to_continue() {
    let (engine, _, _) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");
    engine
        .resume("s1", known(&["Linear Algebra", "Calculus"]))
        .await
        .expect("selection resume");

    let snapshot = engine
        .resume("s1", json!({"action": "ask_question", "question": "  "}))
        .await
        .expect("blank question resume");

    // A blank question cannot be answered; the review completes the topic.
    expect_pending(&snapshot, InterruptKind::TopicReview);
    assert_eq!(snapshot.state.cursor, 1);
}

#[tokio::test]
async fn malformed_selection_means_knows_none() {
    let (engine, _, _) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");

    let snapshot = engine.resume("s1", json!({})).await.expect("resume");
    assert!(snapshot.state.known_prerequisites.is_empty());
    assert_eq!(
        snapshot.state.unknown_prerequisites,
        snapshot.state.prerequisites
    );
    assert_partition(&snapshot);
}

#[tokio::test]
async fn out_of_vocabulary_review_action_completes_the_topic() {
    let (engine, _, _) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");
    engine
        .resume("s1", known(&["Linear Algebra", "Calculus"]))
        .await
        .expect("selection resume");

    let snapshot = engine
        .resume("s1", json!({"action": "interpretive_dance"}))
        .await
        .expect("weird action resume");

    // Continue semantics: the workflow never deadlocks on unexpected input.
    assert_eq!(snapshot.state.cursor, 1);
    assert_eq!(
        snapshot.state.completed,
        vec!["Probability Theory".to_string()]
    );
}

#[tokio::test]
async fn inspect_is_idempotent_and_runs_no_steps() {
    let (engine, model, search) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");
    let searches_after_start = search.calls();
    let prereq_calls = model.count("prerequisites");

    let first = engine.inspect("s1").await.expect("inspect");
    let second = engine.inspect("s1").await.expect("inspect again");

    assert_eq!(first.state, second.state);
    assert_eq!(first.pending, second.pending);
    assert_eq!(first.completed, second.completed);
    assert_eq!(search.calls(), searches_after_start);
    assert_eq!(model.count("prerequisites"), prereq_calls);
}

#[tokio::test]
async fn unknown_session_is_reported() {
    let (engine, _, _) = mock_engine();

    assert!(matches!(
        engine.resume("ghost", json!({})).await,
        Err(EngineError::UnknownSession { .. })
    ));
    assert!(matches!(
        engine.inspect("ghost").await,
        Err(EngineError::UnknownSession { .. })
    ));
    assert!(matches!(
        engine.delete("ghost").await,
        Err(EngineError::UnknownSession { .. })
    ));
}

#[tokio::test]
async fn delete_removes_the_session() {
    let (engine, _, _) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");

    engine.delete("s1").await.expect("delete");
    assert!(matches!(
        engine.inspect("s1").await,
        Err(EngineError::UnknownSession { .. })
    ));
    assert!(matches!(
        engine.delete("s1").await,
        Err(EngineError::UnknownSession { .. })
    ));
}

#[tokio::test]
async fn start_on_existing_session_returns_the_outstanding_suspension() {
    let (engine, model, _) = mock_engine();
    let first = engine.start("s1", "Gradient Descent").await.expect("start");
    let conversation_len = first.state.conversation.len();

    let second = engine
        .start("s1", "Something Else")
        .await
        .expect("second start");

    // No reset, no re-execution, same suspension.
    expect_pending(&second, InterruptKind::PrerequisiteSelection);
    assert_eq!(second.state.topic, "Gradient Descent");
    assert_eq!(second.state.conversation.len(), conversation_len);
    assert_eq!(model.count("prerequisites"), 1);
}

#[tokio::test]
async fn collaborator_failure_leaves_last_checkpoint_and_is_retryable() {
    let (engine, model, _) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");

    // The roadmap model call fails after the selection step has already
    // committed.
    model.fail_on(Some("roadmap"));
    let err = engine
        .resume("s1", known(&["Linear Algebra", "Calculus"]))
        .await
        .expect_err("roadmap failure should surface");
    assert!(matches!(err, EngineError::Step(_)));

    // The session sits at the last persisted boundary: selection applied,
    // suspension consumed, roadmap not yet built.
    let snapshot = engine.inspect("s1").await.expect("inspect");
    assert!(snapshot.pending.is_none());
    assert_eq!(snapshot.state.stage, Stage::Roadmap);
    assert!(snapshot.state.roadmap.is_empty());
    assert_eq!(
        snapshot.state.unknown_prerequisites,
        vec!["Probability Theory".to_string()]
    );

    // Re-issuing the same call retries from that boundary.
    model.fail_on(None);
    let snapshot = engine
        .resume("s1", known(&["Linear Algebra", "Calculus"]))
        .await
        .expect("retry");
    expect_pending(&snapshot, InterruptKind::TopicReview);
    assert!(!snapshot.state.roadmap.is_empty());
}

#[tokio::test]
async fn failed_start_is_retryable_by_reissuing_start() {
    let (engine, model, _) = mock_engine();

    model.fail_on(Some("prerequisites"));
    let err = engine
        .start("s1", "Gradient Descent")
        .await
        .expect_err("prerequisites failure should surface");
    assert!(matches!(err, EngineError::Step(_)));

    // The fresh checkpoint was persisted before the failing step.
    let snapshot = engine.inspect("s1").await.expect("inspect");
    assert_eq!(snapshot.state.stage, Stage::Start);
    assert!(snapshot.pending.is_none());

    model.fail_on(None);
    let snapshot = engine
        .start("s1", "Gradient Descent")
        .await
        .expect("retried start");
    expect_pending(&snapshot, InterruptKind::PrerequisiteSelection);
}

#[tokio::test]
async fn search_failure_surfaces_as_step_error() {
    let (engine, _, search) = mock_engine();
    search.set_fail(true);
    assert!(matches!(
        engine.start("s1", "Gradient Descent").await,
        Err(EngineError::Step(_))
    ));
}

#[tokio::test]
async fn invalid_roadmap_reordering_falls_back_to_input_order() {
    let (engine, model, _) = mock_engine();
    engine.start("s1", "Gradient Descent").await.expect("start");

    // The model invents topics; the step must repair to the input order.
    model.set_roadmap_response(Some("Quantum Computing\nBasket Weaving"));
    let snapshot = engine
        .resume("s1", known(&["Linear Algebra", "Calculus"]))
        .await
        .expect("selection resume");

    assert_eq!(
        snapshot.state.roadmap,
        vec!["Probability Theory".to_string(), "Gradient Descent".to_string()]
    );
}

#[tokio::test]
async fn concurrent_calls_on_one_session_are_rejected() {
    let model = Arc::new(GatedModel::new());
    let search = Arc::new(MockSearch::new());
    let workflow = Workflow::tutoring(model.clone(), search, TutorConfig::default())
        .expect("valid workflow");
    let engine = Arc::new(Engine::new(workflow, Arc::new(InMemoryStore::new())));

    let entered = model.entered.clone();
    let release = model.release.clone();

    let racing = engine.clone();
    let in_flight =
        tokio::spawn(async move { racing.start("s1", "Gradient Descent").await });

    // Wait until the first call is parked inside the model, then race it.
    entered.notified().await;
    assert!(matches!(
        engine.start("s1", "Gradient Descent").await,
        Err(EngineError::SessionBusy { .. })
    ));
    assert!(matches!(
        engine.resume("s1", json!({})).await,
        Err(EngineError::SessionBusy { .. })
    ));

    release.add_permits(1);
    let snapshot = in_flight.await.expect("join").expect("start");
    expect_pending(&snapshot, InterruptKind::PrerequisiteSelection);
}

#[tokio::test]
async fn step_events_are_emitted_during_a_drive() {
    use tutorloom::event_bus::{Event, EventBus};

    let model = Arc::new(MockModel::new());
    let search = Arc::new(MockSearch::new());
    let workflow = Workflow::tutoring(model, search, TutorConfig::default())
        .expect("valid workflow");
    let bus = EventBus::default();
    let events = bus.subscribe();
    let engine = Engine::with_event_bus(workflow, Arc::new(InMemoryStore::new()), bus);

    engine.start("s1", "Gradient Descent").await.expect("start");

    let mut step_ids = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Step(step) = event {
            step_ids.push(step.step_id);
        }
    }
    assert!(step_ids.iter().any(|id| id == "prerequisites"));
    assert!(step_ids.iter().any(|id| id == "selection" || id == "human_selection"));
}
