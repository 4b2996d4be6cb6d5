//! Handlers for goal-bank endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use floortrack_core::{
  goal::{GoalDefinition, NewGoalDefinition},
  progress::{FedcDistribution, fedc_distribution},
  store::PracticeStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /goals` — returns 201 + the stored definition. The mastery
/// criteria are validated by their deserialized form; a percentage outside
/// 1–100 is a 400.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewGoalDefinition>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PracticeStore,
{
  if !(1..=100).contains(&body.criteria.mastery_percentage) {
    return Err(ApiError::BadRequest(format!(
      "mastery percentage must be between 1 and 100, got {}",
      body.criteria.mastery_percentage
    )));
  }

  let goal = store.add_goal(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(goal)))
}

/// `GET /goals/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<GoalDefinition>, ApiError>
where
  S: PracticeStore,
{
  let goal = store
    .get_goal(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("goal {id} not found")))?;
  Ok(Json(goal))
}

/// `GET /organizations/:id/goals`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(organization_id): Path<Uuid>,
) -> Result<Json<Vec<GoalDefinition>>, ApiError>
where
  S: PracticeStore,
{
  let goals = store
    .list_goals(organization_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(goals))
}

/// `GET /organizations/:id/fedc-distribution` — band shares across the
/// organization's goal bank. Categories that carry no parseable FEDC level
/// are excluded from the denominator entirely.
pub async fn distribution<S>(
  State(store): State<Arc<S>>,
  Path(organization_id): Path<Uuid>,
) -> Result<Json<FedcDistribution>, ApiError>
where
  S: PracticeStore,
{
  let goals = store
    .list_goals(organization_id)
    .await
    .map_err(ApiError::from_store)?;
  let dist = fedc_distribution(goals.iter().map(|g| g.category.as_str()));
  Ok(Json(dist))
}
