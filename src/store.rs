//! Session checkpoint storage.
//!
//! The engine persists a [`Checkpoint`] at every step boundary and loads it
//! back on start/resume/inspect. The backing implementation is behind the
//! [`SessionStore`] trait so it can be swapped (in-memory map, JSON files,
//! an external database) without touching engine logic. Two backends ship:
//! [`InMemoryStore`] for tests and single-process use, and [`JsonFileStore`]
//! for durability across process restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::persistence::{PersistedCheckpoint, PersistenceError};
use crate::router::StepId;
use crate::state::SessionState;
use crate::step::PendingInterrupt;

/// Everything needed to resume a session: its state, its position in the
/// graph, and the suspension currently outstanding (if any).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    pub state: SessionState,
    /// The step the engine will run next (or re-enter on resume).
    pub position: StepId,
    /// The outstanding suspension, at most one per session.
    pub pending: Option<PendingInterrupt>,
    /// Count of steps executed so far.
    pub steps_taken: u64,
    /// True once the terminal step has routed to the end of the graph.
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint for a new session positioned at the entry step.
    #[must_use]
    pub fn fresh(session_id: &str, state: SessionState, entry: StepId) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            state,
            position: entry,
            pending: None,
            steps_taken: 0,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Errors from a checkpoint store backend.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("session id {session_id:?} is not storable")]
    #[diagnostic(
        code(tutorloom::store::invalid_session_id),
        help("Session ids must be non-empty and free of path separators.")
    )]
    InvalidSessionId { session_id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("store backend error: {message}")]
    #[diagnostic(code(tutorloom::store::backend))]
    Backend { message: String },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend {
            message: err.to_string(),
        }
    }
}

/// Pluggable keyed persistence for session checkpoints.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a checkpoint, replacing any previous one for the session.
    async fn put(&self, checkpoint: Checkpoint) -> Result<(), StoreError>;

    /// Load the latest checkpoint for a session, if one exists.
    async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Remove a session's checkpoint. Returns whether one existed.
    async fn delete(&self, session_id: &str) -> Result<bool, StoreError>;
}

/// Volatile store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<FxHashMap<String, Checkpoint>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn put(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.sessions
            .write()
            .insert(checkpoint.session_id.clone(), checkpoint);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().remove(session_id).is_some())
    }
}

/// Durable store writing one JSON document per session under a directory.
///
/// Suitable for resuming sessions from a different process after arbitrary
/// delay. Session ids become file names, so they must be non-empty and free
/// of path separators.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        if session_id.is_empty()
            || session_id.contains(['/', '\\'])
            || session_id.contains("..")
        {
            return Err(StoreError::InvalidSessionId {
                session_id: session_id.to_string(),
            });
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn put(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        let path = self.path_for(&checkpoint.session_id)?;
        let persisted = PersistedCheckpoint::from(&checkpoint);
        let json = persisted.to_json_string()?;
        // Write-then-rename keeps a crash from leaving a torn checkpoint.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let path = self.path_for(session_id)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let persisted = PersistedCheckpoint::from_json_str(&json)?;
        Ok(Some(Checkpoint::try_from(persisted)?))
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        let path = self.path_for(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(id: &str) -> Checkpoint {
        Checkpoint::fresh(id, SessionState::for_topic("Topic"), StepId::Prerequisites)
    }

    #[tokio::test]
    async fn in_memory_put_get_delete() {
        let store = InMemoryStore::new();
        store.put(checkpoint("s1")).await.expect("put");

        let loaded = store.get("s1").await.expect("get").expect("present");
        assert_eq!(loaded.session_id, "s1");
        assert_eq!(loaded.position, StepId::Prerequisites);

        assert!(store.delete("s1").await.expect("delete"));
        assert!(!store.delete("s1").await.expect("second delete"));
        assert!(store.get("s1").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn json_file_store_rejects_path_ids() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::open(tmp.path()).await.expect("open");
        for bad in ["", "a/b", "a\\b", ".."] {
            assert!(matches!(
                store.get(bad).await,
                Err(StoreError::InvalidSessionId { .. })
            ));
        }
    }

    #[tokio::test]
    async fn json_file_store_round_trips() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::open(tmp.path()).await.expect("open");
        store.put(checkpoint("s1")).await.expect("put");

        let loaded = store.get("s1").await.expect("get").expect("present");
        assert_eq!(loaded.state.topic, "Topic");
        assert!(!loaded.completed);

        assert!(store.delete("s1").await.expect("delete"));
        assert!(store.get("s1").await.expect("get").is_none());
    }
}
