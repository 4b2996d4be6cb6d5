//! Handlers for `/providers` endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use floortrack_core::{
  org::{NewProvider, Provider},
  store::PracticeStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /providers` — returns 201 + the stored record.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewProvider>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PracticeStore,
{
  let provider = store
    .add_provider(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(provider)))
}

/// `GET /providers/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Provider>, ApiError>
where
  S: PracticeStore,
{
  let provider = store
    .get_provider(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("provider {id} not found")))?;
  Ok(Json(provider))
}

/// `GET /organizations/:id/providers`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(organization_id): Path<Uuid>,
) -> Result<Json<Vec<Provider>>, ApiError>
where
  S: PracticeStore,
{
  let providers = store
    .list_providers(organization_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(providers))
}
