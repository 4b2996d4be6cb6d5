//! Handlers for session and data-collection endpoints. Submitting a
//! collection also runs the mastery check for every goal it touches.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use floortrack_core::{
  audit::{AuditAction, AuditResource},
  engine::{self, MasteryCheckResult},
  notes::NoteRequest,
  progress::MasteryOutcome,
  session::{DataCollection, NewDataCollection, NewSessionRecord, SessionRecord},
  store::PracticeStore,
  trial::NewTrialRecord,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{audit, error::ApiError};

// ─── Sessions ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
  pub actor_id: Uuid,
  #[serde(flatten)]
  pub input:    NewSessionRecord,
}

/// `POST /sessions` — returns 201 + the stored record.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateSessionBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PracticeStore,
{
  let session = store
    .start_session(body.input)
    .await
    .map_err(ApiError::from_store)?;

  audit::record(
    store.as_ref(),
    audit::event(
      session.organization_id,
      body.actor_id,
      AuditAction::Create,
      AuditResource::Session,
      Some(session.session_id),
    ),
  )
  .await;

  Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /sessions/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionRecord>, ApiError>
where
  S: PracticeStore,
{
  let session = store
    .get_session(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))?;
  Ok(Json(session))
}

/// `GET /clients/:id/sessions` — newest first.
pub async fn list_for_client<S>(
  State(store): State<Arc<S>>,
  Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<SessionRecord>>, ApiError>
where
  S: PracticeStore,
{
  let sessions = store
    .list_client_sessions(client_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(sessions))
}

// ─── Data collection ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CollectBody {
  pub actor_id:             Uuid,
  pub trials:               Vec<NewTrialRecord>,
  #[serde(default)]
  pub activities_engaged:   Vec<String>,
  #[serde(default)]
  pub supports_observed:    Vec<String>,
  #[serde(default)]
  pub duration_secs:        Option<u32>,
  #[serde(default)]
  pub provider_observation: Option<String>,
}

/// Mastery-check verdict for one goal in the submitted batch.
#[derive(Debug, Serialize)]
pub struct GoalCheck {
  pub goal_id:      Uuid,
  /// False when the goal has no active assignment on this client.
  pub tracked:      bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub outcome:      Option<MasteryOutcome>,
  pub transitioned: bool,
}

#[derive(Debug, Serialize)]
pub struct CollectResponse {
  pub collection:     DataCollection,
  pub mastery_checks: Vec<GoalCheck>,
}

/// `POST /sessions/:id/collections`
///
/// Persists the batch, then evaluates mastery for each distinct goal in it.
/// The check result rides along in the response so the submitting client
/// sees transitions immediately.
pub async fn collect<S>(
  State(store): State<Arc<S>>,
  Path(session_id): Path<Uuid>,
  Json(body): Json<CollectBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PracticeStore,
{
  let session = store
    .get_session(session_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("session {session_id} not found"))
    })?;

  let collection = store
    .record_collection(NewDataCollection {
      session_id,
      client_id: session.client_id,
      trials: body.trials,
      activities_engaged: body.activities_engaged,
      supports_observed: body.supports_observed,
      duration_secs: body.duration_secs,
      provider_observation: body.provider_observation,
    })
    .await
    .map_err(ApiError::from_store)?;

  let now = Utc::now();
  let checks = engine::check_collection(store.as_ref(), &collection, now)
    .await
    .map_err(ApiError::from_store)?;
  let mastery_checks = checks
    .into_iter()
    .map(|(goal_id, result)| match result {
      MasteryCheckResult::NotTracked => GoalCheck {
        goal_id,
        tracked: false,
        outcome: None,
        transitioned: false,
      },
      MasteryCheckResult::Evaluated { outcome, transitioned } => GoalCheck {
        goal_id,
        tracked: true,
        outcome: Some(outcome),
        transitioned,
      },
    })
    .collect();

  audit::record(
    store.as_ref(),
    audit::event(
      collection.organization_id,
      body.actor_id,
      AuditAction::Create,
      AuditResource::DataCollection,
      Some(collection.collection_id),
    ),
  )
  .await;

  Ok((
    StatusCode::CREATED,
    Json(CollectResponse { collection, mastery_checks }),
  ))
}

// ─── Clinical notes ──────────────────────────────────────────────────────────

/// `GET /sessions/:id/note-request` — the assembled input for a clinical
/// note, built from the session's latest collection. 404 until a collection
/// has been recorded.
pub async fn note_request<S>(
  State(store): State<Arc<S>>,
  Path(session_id): Path<Uuid>,
) -> Result<Json<NoteRequest>, ApiError>
where
  S: PracticeStore,
{
  let request = engine::note_request(store.as_ref(), session_id, Utc::now())
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "session {session_id} has no recorded collection"
      ))
    })?;
  Ok(Json(request))
}
