//! Audit trail types.
//!
//! Every mutating API call, plus the sensitive reads (profile views, log
//! views, exports), appends an event here. Events are append-only and are
//! never interpreted by the engine; they exist for compliance review and
//! CSV export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Event vocabulary ────────────────────────────────────────────────────────

/// What the actor did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
  Create,
  View,
  Update,
  StatusChange,
  Export,
}

impl AuditAction {
  pub fn label(self) -> &'static str {
    match self {
      Self::Create => "create",
      Self::View => "view",
      Self::Update => "update",
      Self::StatusChange => "status_change",
      Self::Export => "export",
    }
  }
}

/// What kind of record the action touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResource {
  Client,
  Goal,
  GoalAssignment,
  Session,
  DataCollection,
  ProgressReport,
  AuditLog,
}

impl AuditResource {
  pub fn label(self) -> &'static str {
    match self {
      Self::Client => "client",
      Self::Goal => "goal",
      Self::GoalAssignment => "goal_assignment",
      Self::Session => "session",
      Self::DataCollection => "data_collection",
      Self::ProgressReport => "progress_report",
      Self::AuditLog => "audit_log",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
  Success,
  Denied,
  Error,
}

impl AuditOutcome {
  pub fn label(self) -> &'static str {
    match self {
      Self::Success => "success",
      Self::Denied => "denied",
      Self::Error => "error",
    }
  }
}

// ─── AuditEvent ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
  pub event_id:        Uuid,
  pub organization_id: Uuid,
  /// The provider the request was attributed to.
  pub actor_id:        Uuid,
  pub action:          AuditAction,
  pub resource:        AuditResource,
  /// Id of the record acted on, when one exists.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource_id:     Option<Uuid>,
  pub outcome:         AuditOutcome,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub detail:          Option<String>,
  pub recorded_at:     DateTime<Utc>,
}

/// Input to [`crate::store::PracticeStore::record_audit_event`].
/// `event_id` and `recorded_at` are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAuditEvent {
  pub organization_id: Uuid,
  pub actor_id:        Uuid,
  pub action:          AuditAction,
  pub resource:        AuditResource,
  #[serde(default)]
  pub resource_id:     Option<Uuid>,
  pub outcome:         AuditOutcome,
  #[serde(default)]
  pub detail:          Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn labels_match_wire_form() {
    let json = serde_json::to_string(&AuditAction::StatusChange).unwrap();
    assert_eq!(json, format!("\"{}\"", AuditAction::StatusChange.label()));

    let json = serde_json::to_string(&AuditResource::GoalAssignment).unwrap();
    assert_eq!(json, format!("\"{}\"", AuditResource::GoalAssignment.label()));
  }
}
