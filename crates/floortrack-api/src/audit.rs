//! Audit-log endpoints and the event-recording helper used by the other
//! handler modules.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use floortrack_core::{
  audit::{AuditAction, AuditEvent, AuditOutcome, AuditResource, NewAuditEvent},
  store::PracticeStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Default page size for the audit-log listing.
const DEFAULT_LIMIT: u32 = 200;

/// Actor attribution for audited reads, passed as a query parameter.
#[derive(Debug, Deserialize)]
pub struct ActorParams {
  pub actor_id: Uuid,
  pub limit:    Option<u32>,
}

/// Best-effort audit write: a failed audit insert is logged, never allowed
/// to fail the request it describes.
pub(crate) async fn record<S>(store: &S, event: NewAuditEvent)
where
  S: PracticeStore,
{
  if let Err(error) = store.record_audit_event(event).await {
    tracing::warn!(%error, "failed to record audit event");
  }
}

pub(crate) fn event(
  organization_id: Uuid,
  actor_id: Uuid,
  action: AuditAction,
  resource: AuditResource,
  resource_id: Option<Uuid>,
) -> NewAuditEvent {
  NewAuditEvent {
    organization_id,
    actor_id,
    action,
    resource,
    resource_id,
    outcome: AuditOutcome::Success,
    detail: None,
  }
}

/// `GET /organizations/:id/audit-log?actor_id=<id>[&limit=n]` — newest
/// first. Viewing the log is itself an audited action.
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(organization_id): Path<Uuid>,
  Query(params): Query<ActorParams>,
) -> Result<Json<Vec<AuditEvent>>, ApiError>
where
  S: PracticeStore,
{
  let events = store
    .list_audit_events(organization_id, params.limit.unwrap_or(DEFAULT_LIMIT))
    .await
    .map_err(ApiError::from_store)?;

  record(
    store.as_ref(),
    event(
      organization_id,
      params.actor_id,
      AuditAction::View,
      AuditResource::AuditLog,
      None,
    ),
  )
  .await;

  Ok(Json(events))
}

/// `GET /organizations/:id/audit-log/export?actor_id=<id>` — the same
/// listing rendered as CSV.
pub async fn export<S>(
  State(store): State<Arc<S>>,
  Path(organization_id): Path<Uuid>,
  Query(params): Query<ActorParams>,
) -> Result<Response, ApiError>
where
  S: PracticeStore,
{
  let events = store
    .list_audit_events(organization_id, params.limit.unwrap_or(DEFAULT_LIMIT))
    .await
    .map_err(ApiError::from_store)?;
  let csv = floortrack_export::audit_log_csv(&events);

  record(
    store.as_ref(),
    event(
      organization_id,
      params.actor_id,
      AuditAction::Export,
      AuditResource::AuditLog,
      None,
    ),
  )
  .await;

  Ok(
    (
      StatusCode::OK,
      [(header::CONTENT_TYPE, "text/csv")],
      csv,
    )
      .into_response(),
  )
}
