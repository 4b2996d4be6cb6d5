//! Progress-report endpoint.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::Utc;
use floortrack_core::{
  audit::{AuditAction, AuditResource},
  engine,
  progress::ProgressReport,
  store::PracticeStore,
};
use uuid::Uuid;

use crate::{
  audit::{self, ActorParams},
  error::ApiError,
};

/// `GET /clients/:id/progress-report?actor_id=<id>`
///
/// The trailing 30-day rollup. Read-only: a report never changes goal
/// status. Viewing it is audited.
pub async fn report<S>(
  State(store): State<Arc<S>>,
  Path(client_id): Path<Uuid>,
  Query(params): Query<ActorParams>,
) -> Result<Json<ProgressReport>, ApiError>
where
  S: PracticeStore,
{
  let report = engine::progress_report(store.as_ref(), client_id, Utc::now())
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("client {client_id} not found")))?;

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
        params.actor_id,
        AuditAction::View,
        AuditResource::ProgressReport,
        Some(client_id),
      ),
    )
    .await;
  }

  Ok(Json(report))
}

/// `GET /clients/:id/progress-report/export?actor_id=<id>` — the per-goal
/// rollup rows of the same report rendered as CSV.
pub async fn export<S>(
  State(store): State<Arc<S>>,
  Path(client_id): Path<Uuid>,
  Query(params): Query<ActorParams>,
) -> Result<Response, ApiError>
where
  S: PracticeStore,
{
  let report = engine::progress_report(store.as_ref(), client_id, Utc::now())
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("client {client_id} not found")))?;
  let csv = floortrack_export::goal_progress_csv(&report.goals);

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
        params.actor_id,
        AuditAction::Export,
        AuditResource::ProgressReport,
        Some(client_id),
      ),
    )
    .await;
  }

  Ok(
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/csv")], csv)
      .into_response(),
  )
}
