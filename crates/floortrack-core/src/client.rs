//! Clients and their ITP goal assignments.
//!
//! A client owns an ordered list of goal assignments (the Individual
//! Treatment Plan). Assignments are never deleted — they are transitioned
//! to a terminal status and kept as archived history. The list carries a
//! version counter so concurrent writers cannot silently overwrite each
//! other's status transitions.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── GoalStatus ──────────────────────────────────────────────────────────────

/// Lifecycle status of a goal assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
  InProgress,
  Mastered,
  Discontinued,
}

impl GoalStatus {
  /// Terminal states are never touched by the automatic engine; only the
  /// manual override path can leave them.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Mastered | Self::Discontinued)
  }
}

// ─── GoalAssignment ──────────────────────────────────────────────────────────

/// One ITP goal on a client: the mutable lifecycle record the progress
/// engine acts on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAssignment {
  pub assignment_id:       Uuid,
  pub goal_id:             Uuid,
  pub goal_status:         GoalStatus,
  /// Date after which an in-progress goal auto-discontinues.
  pub target_date:         Option<NaiveDate>,
  /// Starting performance snapshot at assignment time.
  pub baseline_percentage: Option<u8>,
  /// Computed accuracy at the moment of a terminal transition.
  pub success_rate:        Option<u8>,
  /// Timestamp of the last status transition (the "archived date").
  pub status_date:         Option<DateTime<Utc>>,
  /// Free-text justification for a manual status change.
  pub reason:              Option<String>,
  pub assigned_at:         DateTime<Utc>,
}

impl GoalAssignment {
  pub fn is_active(&self) -> bool {
    self.goal_status == GoalStatus::InProgress
  }
}

/// Input to [`crate::store::PracticeStore::assign_goal`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewGoalAssignment {
  pub goal_id:             Uuid,
  #[serde(default)]
  pub target_date:         Option<NaiveDate>,
  #[serde(default)]
  pub baseline_percentage: Option<u8>,
}

// ─── GoalAssignmentList ──────────────────────────────────────────────────────

/// A client's assignments plus the optimistic-concurrency version.
///
/// Every mutation of the list bumps `version`; conditional updates compare
/// it so two simultaneous session submissions cannot lose a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAssignmentList {
  pub version: i64,
  pub entries: Vec<GoalAssignment>,
}

impl GoalAssignmentList {
  pub fn active(&self) -> impl Iterator<Item = &GoalAssignment> {
    self.entries.iter().filter(|a| a.is_active())
  }

  /// The active assignment for a goal, if any. Uniqueness of active
  /// assignments per goal is enforced at write time.
  pub fn active_for_goal(&self, goal_id: Uuid) -> Option<&GoalAssignment> {
    self.active().find(|a| a.goal_id == goal_id)
  }

  pub fn find(&self, assignment_id: Uuid) -> Option<&GoalAssignment> {
    self.entries.iter().find(|a| a.assignment_id == assignment_id)
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Soft-delete status; deleted clients stay on record for audit history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
  Active,
  Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
  pub client_id:          Uuid,
  pub organization_id:    Uuid,
  pub name:               String,
  pub dob:                Option<NaiveDate>,
  pub diagnosis:          Option<String>,
  pub parent_name:        Option<String>,
  pub email:              Option<String>,
  pub phone:              Option<String>,
  pub assigned_providers: Vec<Uuid>,
  /// When the Individual Treatment Plan is next due for review.
  pub review_date:        Option<NaiveDate>,
  pub status:             ClientStatus,
  pub created_at:         DateTime<Utc>,
}

impl Client {
  /// Age in whole years as of `today`, accounting for whether the birthday
  /// has passed this year.
  pub fn age(&self, today: NaiveDate) -> Option<u32> {
    let dob = self.dob?;
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
      age -= 1;
    }
    u32::try_from(age).ok()
  }
}

/// Input to [`crate::store::PracticeStore::add_client`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
  pub organization_id:    Uuid,
  pub name:               String,
  #[serde(default)]
  pub dob:                Option<NaiveDate>,
  #[serde(default)]
  pub diagnosis:          Option<String>,
  #[serde(default)]
  pub parent_name:        Option<String>,
  #[serde(default)]
  pub email:              Option<String>,
  #[serde(default)]
  pub phone:              Option<String>,
  #[serde(default)]
  pub assigned_providers: Vec<Uuid>,
  #[serde(default)]
  pub review_date:        Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client_with_dob(dob: NaiveDate) -> Client {
    Client {
      client_id:          Uuid::new_v4(),
      organization_id:    Uuid::new_v4(),
      name:               "Test Client".into(),
      dob:                Some(dob),
      diagnosis:          None,
      parent_name:        None,
      email:              None,
      phone:              None,
      assigned_providers: vec![],
      review_date:        None,
      status:             ClientStatus::Active,
      created_at:         Utc::now(),
    }
  }

  #[test]
  fn age_respects_birthday_boundary() {
    let dob = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
    let client = client_with_dob(dob);

    let before = NaiveDate::from_ymd_opt(2026, 6, 14).unwrap();
    let on = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
    assert_eq!(client.age(before), Some(5));
    assert_eq!(client.age(on), Some(6));
  }

  #[test]
  fn terminal_statuses() {
    assert!(!GoalStatus::InProgress.is_terminal());
    assert!(GoalStatus::Mastered.is_terminal());
    assert!(GoalStatus::Discontinued.is_terminal());
  }

  #[test]
  fn active_for_goal_skips_archived_entries() {
    let goal_id = Uuid::new_v4();
    let archived = GoalAssignment {
      assignment_id:       Uuid::new_v4(),
      goal_id,
      goal_status:         GoalStatus::Discontinued,
      target_date:         None,
      baseline_percentage: None,
      success_rate:        Some(40),
      status_date:         Some(Utc::now()),
      reason:              None,
      assigned_at:         Utc::now(),
    };
    let active = GoalAssignment {
      assignment_id: Uuid::new_v4(),
      goal_status: GoalStatus::InProgress,
      success_rate: None,
      status_date: None,
      ..archived.clone()
    };

    let list = GoalAssignmentList {
      version: 1,
      entries: vec![archived, active.clone()],
    };
    assert_eq!(
      list.active_for_goal(goal_id).unwrap().assignment_id,
      active.assignment_id
    );
  }
}
