//! Handlers for `/organizations` endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use floortrack_core::{
  org::{NewOrganization, Organization},
  store::PracticeStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /organizations` — returns 201 + the stored record.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewOrganization>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PracticeStore,
{
  let org = store
    .add_organization(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(org)))
}

/// `GET /organizations/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Organization>, ApiError>
where
  S: PracticeStore,
{
  let org = store
    .get_organization(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("organization {id} not found")))?;
  Ok(Json(org))
}
