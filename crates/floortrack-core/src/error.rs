//! Error types for `floortrack-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("client not found: {0}")]
  ClientNotFound(Uuid),

  #[error("goal not found: {0}")]
  GoalNotFound(Uuid),

  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  #[error("goal assignment not found: {0}")]
  AssignmentNotFound(Uuid),

  #[error("goal {0} already has an active assignment on this client")]
  DuplicateActiveAssignment(Uuid),

  #[error("goal assignment list changed underneath us (expected version {expected}, found {found})")]
  VersionConflict { expected: i64, found: i64 },

  #[error("mastery percentage must be between 1 and 100, got {0}")]
  InvalidMasteryPercentage(u8),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
