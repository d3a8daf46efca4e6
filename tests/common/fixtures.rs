//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use tutorloom::config::TutorConfig;
use tutorloom::engine::{Engine, SessionSnapshot};
use tutorloom::step::{InterruptKind, PendingInterrupt};
use tutorloom::store::{InMemoryStore, SessionStore};
use tutorloom::workflow::Workflow;

use super::mocks::{MockModel, MockSearch};

/// Engine over mock collaborators and an in-memory store, returning the
/// mocks for assertions.
pub fn mock_engine() -> (Engine, Arc<MockModel>, Arc<MockSearch>) {
    let model = Arc::new(MockModel::new());
    let search = Arc::new(MockSearch::new());
    let engine = engine_over(model.clone(), search.clone(), Arc::new(InMemoryStore::new()));
    (engine, model, search)
}

/// Engine over the given collaborators and store.
pub fn engine_over(
    model: Arc<MockModel>,
    search: Arc<MockSearch>,
    store: Arc<dyn SessionStore>,
) -> Engine {
    let workflow =
        Workflow::tutoring(model, search, TutorConfig::default()).expect("valid workflow");
    Engine::new(workflow, store)
}

/// Assert a snapshot is suspended on the given interrupt kind and return the
/// pending descriptor.
pub fn expect_pending(snapshot: &SessionSnapshot, kind: InterruptKind) -> PendingInterrupt {
    let pending = snapshot
        .pending
        .clone()
        .unwrap_or_else(|| panic!("expected pending {kind}, session was not suspended"));
    assert_eq!(pending.interrupt.kind, kind, "unexpected suspension kind");
    pending
}
