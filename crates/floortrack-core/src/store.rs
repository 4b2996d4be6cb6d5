//! The `PracticeStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `floortrack-store-sqlite`). Higher layers (`floortrack-api`, the server
//! binary) depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  audit::{AuditEvent, NewAuditEvent},
  client::{Client, GoalAssignment, GoalAssignmentList, NewClient, NewGoalAssignment},
  goal::{GoalDefinition, NewGoalDefinition},
  lifecycle::StatusChange,
  org::{NewOrganization, NewProvider, Organization, Provider},
  session::{DataCollection, NewDataCollection, NewSessionRecord, SessionRecord},
  trial::TrialRecord,
};

/// Classification of backend errors, so transport layers can map domain
/// failures onto response statuses without naming the backend's error type.
pub trait StoreFailure {
  /// The error refers to a record that does not exist.
  fn is_not_found(&self) -> bool;
  /// The error is a rejected write (duplicate active assignment, stale
  /// assignment-list version).
  fn is_conflict(&self) -> bool;
}

/// Abstraction over a practice-management storage backend.
///
/// Trial data and audit events are append-only. Goal assignments are never
/// deleted; their lifecycle is mutated through [`StatusChange`] values
/// persisted with a conditional update on the client's assignment-list
/// version, so concurrent writers surface a conflict instead of silently
/// losing a transition.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait PracticeStore: Send + Sync {
  type Error: std::error::Error + StoreFailure + Send + Sync + 'static;

  // ── Organizations & providers ─────────────────────────────────────────

  fn add_organization(
    &self,
    input: NewOrganization,
  ) -> impl Future<Output = Result<Organization, Self::Error>> + Send + '_;

  /// Retrieve an organization by id. Returns `None` if not found.
  fn get_organization(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Organization>, Self::Error>> + Send + '_;

  fn add_provider(
    &self,
    input: NewProvider,
  ) -> impl Future<Output = Result<Provider, Self::Error>> + Send + '_;

  fn get_provider(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Provider>, Self::Error>> + Send + '_;

  fn list_providers(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Provider>, Self::Error>> + Send + '_;

  // ── Goal bank ─────────────────────────────────────────────────────────

  /// Persist a new goal-bank entry. `goal_id` and `created_at` are set by
  /// the store.
  fn add_goal(
    &self,
    input: NewGoalDefinition,
  ) -> impl Future<Output = Result<GoalDefinition, Self::Error>> + Send + '_;

  fn get_goal(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<GoalDefinition>, Self::Error>> + Send + '_;

  /// All goal-bank entries for an organization, newest first.
  fn list_goals(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Vec<GoalDefinition>, Self::Error>> + Send + '_;

  // ── Clients & goal assignments ────────────────────────────────────────

  fn add_client(
    &self,
    input: NewClient,
  ) -> impl Future<Output = Result<Client, Self::Error>> + Send + '_;

  fn get_client(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// Active (non-deleted) clients for an organization.
  fn list_clients(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Client>, Self::Error>> + Send + '_;

  /// Attach a goal to a client's treatment plan.
  ///
  /// Fails with a duplicate-assignment error if the client already has an
  /// active (in-progress) assignment for the same goal. Bumps the client's
  /// assignment-list version.
  fn assign_goal(
    &self,
    client_id: Uuid,
    input: NewGoalAssignment,
  ) -> impl Future<Output = Result<GoalAssignment, Self::Error>> + Send + '_;

  /// The client's full assignment list plus its concurrency version.
  fn goal_assignments(
    &self,
    client_id: Uuid,
  ) -> impl Future<Output = Result<GoalAssignmentList, Self::Error>> + Send + '_;

  /// Persist a status transition onto one assignment, conditionally on the
  /// expected assignment-list version.
  ///
  /// Fails with a version-conflict error when the list changed since the
  /// caller read it. On success returns the updated assignment and the new
  /// list version.
  fn apply_status_change(
    &self,
    client_id: Uuid,
    assignment_id: Uuid,
    change: StatusChange,
    expected_version: i64,
  ) -> impl Future<Output = Result<(GoalAssignment, i64), Self::Error>> + Send + '_;

  // ── Sessions & data collection ────────────────────────────────────────

  /// Create a session envelope. `session_id` and `created_at` are set by
  /// the store.
  fn start_session(
    &self,
    input: NewSessionRecord,
  ) -> impl Future<Output = Result<SessionRecord, Self::Error>> + Send + '_;

  fn get_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SessionRecord>, Self::Error>> + Send + '_;

  fn list_client_sessions(
    &self,
    client_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SessionRecord>, Self::Error>> + Send + '_;

  /// Persist a data-collection batch. The organization id and `recorded_at`
  /// are taken from the referenced session; trial timestamps are stamped
  /// with the collection's.
  fn record_collection(
    &self,
    input: NewDataCollection,
  ) -> impl Future<Output = Result<DataCollection, Self::Error>> + Send + '_;

  /// The most recent data collection recorded for a session, if any.
  fn latest_collection(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<DataCollection>, Self::Error>> + Send + '_;

  // ── Engine reads ──────────────────────────────────────────────────────

  /// The most recent `limit` trial records for one (client, goal) pair,
  /// returned in chronological order.
  fn recent_trials(
    &self,
    client_id: Uuid,
    goal_id: Uuid,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<TrialRecord>, Self::Error>> + Send + '_;

  /// All data collections for a client within a date window, oldest first.
  fn collections_in_window(
    &self,
    client_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<DataCollection>, Self::Error>> + Send + '_;

  /// Clients with at least one in-progress assignment whose target date is
  /// on or before `today`. Feeds the discontinuation sweep.
  fn clients_with_overdue_goals(
    &self,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Audit trail ───────────────────────────────────────────────────────

  fn record_audit_event(
    &self,
    input: NewAuditEvent,
  ) -> impl Future<Output = Result<AuditEvent, Self::Error>> + Send + '_;

  /// Audit events for an organization, newest first, capped at `limit`.
  fn list_audit_events(
    &self,
    organization_id: Uuid,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<AuditEvent>, Self::Error>> + Send + '_;
}
