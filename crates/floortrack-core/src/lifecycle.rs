//! The goal lifecycle state machine.
//!
//! `InProgress` is the initial state; `Mastered` and `Discontinued` are
//! terminal. The automatic engine only ever moves a goal *into* a terminal
//! state; the manual override path is the sole way back out. Transitions
//! are expressed as [`StatusChange`] values so the store can persist them
//! with a conditional (versioned) update.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{GoalAssignment, GoalStatus};

// ─── StatusChange ────────────────────────────────────────────────────────────

/// A computed transition, ready to be persisted onto an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
  pub status:       GoalStatus,
  /// Snapshot of computed accuracy; stamped on engine-driven mastery.
  pub success_rate: Option<u8>,
  pub reason:       Option<String>,
  pub at:           DateTime<Utc>,
}

impl GoalAssignment {
  /// Apply a transition in place. The store mirrors this when persisting.
  pub fn apply_change(&mut self, change: &StatusChange) {
    self.goal_status = change.status;
    self.status_date = Some(change.at);
    if let Some(rate) = change.success_rate {
      self.success_rate = Some(rate);
    }
    if let Some(reason) = &change.reason {
      self.reason = Some(reason.clone());
    }
  }
}

// ─── Automatic transitions ───────────────────────────────────────────────────

/// Engine-driven mastery: fires only for assignments still in progress.
/// Terminal states are monotonic — the engine never revisits them.
pub fn auto_master(
  assignment: &GoalAssignment,
  overall: u8,
  now: DateTime<Utc>,
) -> Option<StatusChange> {
  if assignment.goal_status.is_terminal() {
    return None;
  }
  Some(StatusChange {
    status:       GoalStatus::Mastered,
    success_rate: Some(overall),
    reason:       None,
    at:           now,
  })
}

/// Target-date expiry: an in-progress goal whose target date has passed is
/// discontinued. Idempotent — already-terminal assignments are skipped, so
/// the sweep can run lazily on reads and on a timer without double-firing.
pub fn auto_discontinue(
  assignment: &GoalAssignment,
  today: NaiveDate,
  now: DateTime<Utc>,
) -> Option<StatusChange> {
  if assignment.goal_status.is_terminal() {
    return None;
  }
  let target = assignment.target_date?;
  if target > today {
    return None;
  }
  Some(StatusChange {
    status:       GoalStatus::Discontinued,
    success_rate: None,
    reason:       None,
    at:           now,
  })
}

// ─── Manual override ─────────────────────────────────────────────────────────

/// Provider-initiated status change. Bypasses the engine's evidence
/// requirements entirely and is the only transition defined out of a
/// terminal state (re-opening a goal back to `InProgress`).
pub fn manual_override(
  status: GoalStatus,
  reason: Option<String>,
  now: DateTime<Utc>,
) -> StatusChange {
  let reason = reason
    .map(|r| r.trim().to_owned())
    .filter(|r| !r.is_empty());
  StatusChange { status, success_rate: None, reason, at: now }
}
