/*!
Persistence primitives for serializing session checkpoints (used by the
JSON-file store and any future durable backends).

Design goals:
- Explicit serde-friendly structs decoupled from in-memory representations.
- Conversion logic localized in `From` / `TryFrom` impls so store code stays
  lean and declarative.
- Forward compatibility: step ids and interrupt kinds travel as their stable
  string encodings, timestamps as RFC3339 strings.

This module performs no I/O; it is pure data transformation.
*/

use chrono::Utc;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::router::StepId;
use crate::state::SessionState;
use crate::step::{Interrupt, InterruptKind, PendingInterrupt};
use crate::store::Checkpoint;

/// Persisted shape of an outstanding suspension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedPending {
    /// Step id in its stable string encoding.
    pub step: String,
    /// Interrupt kind tag.
    pub kind: String,
    pub payload: Value,
}

/// Full persisted checkpoint representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub session_id: String,
    pub state: SessionState,
    /// Next step in its stable string encoding.
    pub position: String,
    #[serde(default)]
    pub pending: Option<PersistedPending>,
    pub steps_taken: u64,
    #[serde(default)]
    pub completed: bool,
    /// RFC3339 creation time (keeps chrono types out of the wire shape).
    pub created_at: String,
    pub updated_at: String,
}

/// Conversion and serialization errors for persistence models.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("unknown step id in persisted checkpoint: {0}")]
    #[diagnostic(
        code(tutorloom::persistence::unknown_step),
        help("The checkpoint was written by an incompatible version.")
    )]
    UnknownStepId(String),

    #[error("unknown interrupt kind in persisted checkpoint: {0}")]
    #[diagnostic(code(tutorloom::persistence::unknown_interrupt))]
    UnknownInterruptKind(String),

    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(tutorloom::persistence::serde),
        help("Ensure the JSON structure matches the Persisted* types.")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },
}

impl PersistedCheckpoint {
    pub fn to_json_string(&self) -> Result<String, PersistenceError> {
        serde_json::to_string(self).map_err(|source| PersistenceError::Serde { source })
    }

    pub fn from_json_str(json: &str) -> Result<Self, PersistenceError> {
        serde_json::from_str(json).map_err(|source| PersistenceError::Serde { source })
    }
}

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(cp: &Checkpoint) -> Self {
        PersistedCheckpoint {
            session_id: cp.session_id.clone(),
            state: cp.state.clone(),
            position: cp.position.encode().to_string(),
            pending: cp.pending.as_ref().map(|pending| PersistedPending {
                step: pending.step.encode().to_string(),
                kind: pending.interrupt.kind.as_str().to_string(),
                payload: pending.interrupt.payload.clone(),
            }),
            steps_taken: cp.steps_taken,
            completed: cp.completed,
            created_at: cp.created_at.to_rfc3339(),
            updated_at: cp.updated_at.to_rfc3339(),
        }
    }
}

impl TryFrom<PersistedCheckpoint> for Checkpoint {
    type Error = PersistenceError;

    fn try_from(p: PersistedCheckpoint) -> Result<Self, PersistenceError> {
        let position = decode_step(&p.position)?;
        let pending = p
            .pending
            .map(|pending| {
                Ok::<_, PersistenceError>(PendingInterrupt {
                    step: decode_step(&pending.step)?,
                    interrupt: Interrupt::new(
                        InterruptKind::parse(&pending.kind)
                            .ok_or(PersistenceError::UnknownInterruptKind(pending.kind))?,
                        pending.payload,
                    ),
                })
            })
            .transpose()?;
        let created_at = parse_timestamp(&p.created_at);
        let updated_at = parse_timestamp(&p.updated_at);
        Ok(Checkpoint {
            session_id: p.session_id,
            state: p.state,
            position,
            pending,
            steps_taken: p.steps_taken,
            completed: p.completed,
            created_at,
            updated_at,
        })
    }
}

fn decode_step(encoded: &str) -> Result<StepId, PersistenceError> {
    StepId::decode(encoded).ok_or_else(|| PersistenceError::UnknownStepId(encoded.to_string()))
}

fn parse_timestamp(raw: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
