//! Error type for `floortrack-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] floortrack_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("bad column value: {0}")]
  Decode(String),

  #[error("client not found: {0}")]
  ClientNotFound(Uuid),

  #[error("goal not found: {0}")]
  GoalNotFound(Uuid),

  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  #[error("goal assignment not found: {0}")]
  AssignmentNotFound(Uuid),

  /// The client already carries an in-progress assignment for this goal.
  #[error("goal {0} already has an active assignment on this client")]
  DuplicateActiveAssignment(Uuid),

  /// The assignment list was mutated between the caller's read and this
  /// write. The caller must re-read; there is no automatic retry.
  #[error("assignment list version conflict (expected {expected}, found {found})")]
  VersionConflict { expected: i64, found: i64 },
}

impl floortrack_core::store::StoreFailure for Error {
  fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::ClientNotFound(_)
        | Self::GoalNotFound(_)
        | Self::SessionNotFound(_)
        | Self::AssignmentNotFound(_)
    ) || matches!(
      self,
      Self::Core(
        floortrack_core::Error::ClientNotFound(_)
          | floortrack_core::Error::GoalNotFound(_)
          | floortrack_core::Error::SessionNotFound(_)
          | floortrack_core::Error::AssignmentNotFound(_)
      )
    )
  }

  fn is_conflict(&self) -> bool {
    matches!(
      self,
      Self::DuplicateActiveAssignment(_) | Self::VersionConflict { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
