//! Handlers for `/clients` endpoints: the client profile, the treatment
//! plan (goal assignments), and manual status overrides.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use floortrack_core::{
  audit::{AuditAction, AuditResource},
  client::{
    Client, GoalAssignment, GoalAssignmentList, GoalStatus, NewClient,
    NewGoalAssignment,
  },
  engine::{self, ArchivedGoal},
  goal::GoalDefinition,
  lifecycle::manual_override,
  store::PracticeStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  audit::{self, ActorParams},
  error::ApiError,
};

// ─── Create / list ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateClientBody {
  pub actor_id: Uuid,
  #[serde(flatten)]
  pub input:    NewClient,
}

/// `POST /clients` — returns 201 + the stored record.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateClientBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PracticeStore,
{
  let client = store
    .add_client(body.input)
    .await
    .map_err(ApiError::from_store)?;

  audit::record(
    store.as_ref(),
    audit::event(
      client.organization_id,
      body.actor_id,
      AuditAction::Create,
      AuditResource::Client,
      Some(client.client_id),
    ),
  )
  .await;

  Ok((StatusCode::CREATED, Json(client)))
}

/// `GET /organizations/:id/clients`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(organization_id): Path<Uuid>,
) -> Result<Json<Vec<Client>>, ApiError>
where
  S: PracticeStore,
{
  let clients = store
    .list_clients(organization_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(clients))
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// One entry of the active treatment plan: the assignment joined with its
/// goal-bank definition.
#[derive(Debug, Serialize)]
pub struct ActiveGoal {
  pub assignment: GoalAssignment,
  pub goal:       GoalDefinition,
}

#[derive(Debug, Serialize)]
pub struct ClientProfile {
  pub client:  Client,
  pub age:     Option<u32>,
  /// The in-progress treatment plan only; terminal assignments live in
  /// the archived view.
  pub goals:   Vec<ActiveGoal>,
  /// Assignment-list version for conditional status updates.
  pub version: i64,
}

/// `GET /clients/:id/profile?actor_id=<id>`
///
/// Runs the overdue-goal sweep for this client before responding, so a
/// profile read never shows an in-progress goal whose target date has
/// passed. The view is audited.
pub async fn profile<S>(
  State(store): State<Arc<S>>,
  Path(client_id): Path<Uuid>,
  Query(params): Query<ActorParams>,
) -> Result<Json<ClientProfile>, ApiError>
where
  S: PracticeStore,
{
  let now = Utc::now();
  engine::sweep_client(store.as_ref(), client_id, now.date_naive(), now)
    .await
    .map_err(ApiError::from_store)?;

  let client = store
    .get_client(client_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("client {client_id} not found")))?;
  let assignments = store
    .goal_assignments(client_id)
    .await
    .map_err(ApiError::from_store)?;

  let mut goals = Vec::new();
  for assignment in assignments.active() {
    let Some(goal) = store
      .get_goal(assignment.goal_id)
      .await
      .map_err(ApiError::from_store)?
    else {
      continue;
    };
    goals.push(ActiveGoal { assignment: assignment.clone(), goal });
  }

  audit::record(
    store.as_ref(),
    audit::event(
      client.organization_id,
      params.actor_id,
      AuditAction::View,
      AuditResource::Client,
      Some(client_id),
    ),
  )
  .await;

  let age = client.age(now.date_naive());
  Ok(Json(ClientProfile {
    client,
    age,
    goals,
    version: assignments.version,
  }))
}

// ─── Goal assignment ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub actor_id: Uuid,
  #[serde(flatten)]
  pub input:    NewGoalAssignment,
}

/// `POST /clients/:id/goals` — attach a goal to the treatment plan.
/// A second active assignment for the same goal is a 409.
pub async fn assign<S>(
  State(store): State<Arc<S>>,
  Path(client_id): Path<Uuid>,
  Json(body): Json<AssignBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PracticeStore,
{
  let assignment = store
    .assign_goal(client_id, body.input)
    .await
    .map_err(ApiError::from_store)?;

  let organization_id = store
    .get_client(client_id)
    .await
    .map_err(ApiError::from_store)?
    .map(|c| c.organization_id);
  if let Some(organization_id) = organization_id {
    audit::record(
      store.as_ref(),
      audit::event(
        organization_id,
        body.actor_id,
        AuditAction::Create,
        AuditResource::GoalAssignment,
        Some(assignment.assignment_id),
      ),
    )
    .await;
  }

  Ok((StatusCode::CREATED, Json(assignment)))
}

/// `GET /clients/:id/goals` — the full assignment list with its version.
pub async fn assignments<S>(
  State(store): State<Arc<S>>,
  Path(client_id): Path<Uuid>,
) -> Result<Json<GoalAssignmentList>, ApiError>
where
  S: PracticeStore,
{
  let list = store
    .goal_assignments(client_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(list))
}

// ─── Manual status override ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub actor_id: Uuid,
  pub status:   GoalStatus,
  #[serde(default)]
  pub reason:   Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  pub assignment: GoalAssignment,
  pub version:    i64,
}

/// `POST /clients/:id/goals/:assignment_id/status`
///
/// Forces any status, bypassing the engine's evidence requirements; this is
/// the only path out of a terminal state. Fails with 409 if the assignment
/// list moved underneath the caller.
pub async fn update_status<S>(
  State(store): State<Arc<S>>,
  Path((client_id, assignment_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<StatusBody>,
) -> Result<Json<StatusResponse>, ApiError>
where
  S: PracticeStore,
{
  let list = store
    .goal_assignments(client_id)
    .await
    .map_err(ApiError::from_store)?;
  let change = manual_override(body.status, body.reason, Utc::now());
  let (assignment, version) = store
    .apply_status_change(client_id, assignment_id, change, list.version)
    .await
    .map_err(ApiError::from_store)?;

  let organization_id = store
    .get_client(client_id)
    .await
    .map_err(ApiError::from_store)?
    .map(|c| c.organization_id);
  if let Some(organization_id) = organization_id {
    audit::record(
      store.as_ref(),
      audit::event(
        organization_id,
        body.actor_id,
        AuditAction::StatusChange,
        AuditResource::GoalAssignment,
        Some(assignment_id),
      ),
    )
    .await;
  }

  Ok(Json(StatusResponse { assignment, version }))
}

// ─── Archived goals ──────────────────────────────────────────────────────────

/// `GET /clients/:id/archived-goals` — mastered and discontinued
/// assignments, success rate recomputed over the trailing report window.
pub async fn archived<S>(
  State(store): State<Arc<S>>,
  Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<ArchivedGoal>>, ApiError>
where
  S: PracticeStore,
{
  let archived = engine::archived_goals(store.as_ref(), client_id, Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(archived))
}
