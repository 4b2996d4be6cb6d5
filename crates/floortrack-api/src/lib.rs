//! JSON REST API for Floortrack.
//!
//! Exposes an axum [`Router`] backed by any
//! [`floortrack_core::store::PracticeStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", floortrack_api::api_router(store.clone()))
//! ```

pub mod audit;
pub mod clients;
pub mod error;
pub mod goals;
pub mod organizations;
pub mod progress;
pub mod providers;
pub mod sessions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use floortrack_core::store::PracticeStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: PracticeStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Organizations
    .route("/organizations", post(organizations::create::<S>))
    .route("/organizations/{id}", get(organizations::get_one::<S>))
    .route("/organizations/{id}/providers", get(providers::list::<S>))
    .route("/organizations/{id}/goals", get(goals::list::<S>))
    .route(
      "/organizations/{id}/fedc-distribution",
      get(goals::distribution::<S>),
    )
    .route("/organizations/{id}/audit-log", get(audit::list::<S>))
    .route("/organizations/{id}/audit-log/export", get(audit::export::<S>))
    // Providers
    .route("/providers", post(providers::create::<S>))
    .route("/providers/{id}", get(providers::get_one::<S>))
    // Goal bank
    .route("/goals", post(goals::create::<S>))
    .route("/goals/{id}", get(goals::get_one::<S>))
    // Clients & treatment plans
    .route("/clients", post(clients::create::<S>))
    .route("/organizations/{id}/clients", get(clients::list::<S>))
    .route("/clients/{id}/profile", get(clients::profile::<S>))
    .route(
      "/clients/{id}/goals",
      get(clients::assignments::<S>).post(clients::assign::<S>),
    )
    .route(
      "/clients/{id}/goals/{assignment_id}/status",
      post(clients::update_status::<S>),
    )
    .route("/clients/{id}/archived-goals", get(clients::archived::<S>))
    .route("/clients/{id}/progress-report", get(progress::report::<S>))
    .route(
      "/clients/{id}/progress-report/export",
      get(progress::export::<S>),
    )
    // Sessions & data collection
    .route("/sessions", post(sessions::create::<S>))
    .route("/sessions/{id}", get(sessions::get_one::<S>))
    .route("/clients/{id}/sessions", get(sessions::list_for_client::<S>))
    .route("/sessions/{id}/collections", post(sessions::collect::<S>))
    .route("/sessions/{id}/note-request", get(sessions::note_request::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use floortrack_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  async fn router() -> Router<()> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    api_router(Arc::new(store))
  }

  async fn request(
    router: &Router<()>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    let req = match body {
      Some(v) => builder.body(Body::from(v.to_string())).unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
  }

  /// Create an org, provider, client, and an 80%-independent goal; returns
  /// their ids.
  async fn seed(router: &Router<()>) -> (Uuid, Uuid, Uuid, Uuid) {
    let (status, org) = request(
      router,
      "POST",
      "/organizations",
      Some(json!({"name": "Sunrise DIR Clinic"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let org_id: Uuid =
      serde_json::from_value(org["organization_id"].clone()).unwrap();

    let (status, provider) = request(
      router,
      "POST",
      "/providers",
      Some(json!({"organization_id": org_id, "name": "Dana Reyes"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let provider_id: Uuid =
      serde_json::from_value(provider["provider_id"].clone()).unwrap();

    let (status, client) = request(
      router,
      "POST",
      "/clients",
      Some(json!({
        "actor_id": provider_id,
        "organization_id": org_id,
        "name": "Avery M",
        "dob": "2020-04-02",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let client_id: Uuid =
      serde_json::from_value(client["client_id"].clone()).unwrap();

    let (status, goal) = request(
      router,
      "POST",
      "/goals",
      Some(json!({
        "organization_id": org_id,
        "category": "FEDC_4 - Complex Communication",
        "description": "Initiates two-way play sequences",
        "criteria": {
          "mastery_percentage": 80,
          "across_sessions": 3,
          "support_level": "Independent",
        },
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let goal_id: Uuid = serde_json::from_value(goal["goal_id"].clone()).unwrap();

    (org_id, provider_id, client_id, goal_id)
  }

  async fn submit_session(
    router: &Router<()>,
    org_id: Uuid,
    provider_id: Uuid,
    client_id: Uuid,
    goal_id: Uuid,
    count: u32,
    success: u32,
  ) -> Value {
    let (status, session) = request(
      router,
      "POST",
      "/sessions",
      Some(json!({
        "actor_id": provider_id,
        "client_id": client_id,
        "provider_id": provider_id,
        "organization_id": org_id,
        "session_type": "Progress Monitoring",
        "date_of_session": "2026-08-30",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["session_id"].as_str().unwrap().to_owned();

    let (status, body) = request(
      router,
      "POST",
      &format!("/sessions/{session_id}/collections"),
      Some(json!({
        "actor_id": provider_id,
        "trials": [{
          "goal_id": goal_id,
          "support": {
            "independent": {"count": count, "success": success},
          },
        }],
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
  }

  #[tokio::test]
  async fn unknown_client_profile_is_404() {
    let router = router().await;
    let (status, body) = request(
      &router,
      "GET",
      &format!("/clients/{}/profile?actor_id={}", Uuid::new_v4(), Uuid::new_v4()),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn duplicate_assignment_is_409() {
    let router = router().await;
    let (_, provider_id, client_id, goal_id) = seed(&router).await;

    let body = json!({"actor_id": provider_id, "goal_id": goal_id});
    let (status, _) = request(
      &router,
      "POST",
      &format!("/clients/{client_id}/goals"),
      Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, resp) = request(
      &router,
      "POST",
      &format!("/clients/{client_id}/goals"),
      Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(resp["error"].is_string());
  }

  #[tokio::test]
  async fn three_qualifying_sessions_master_the_goal() {
    let router = router().await;
    let (org_id, provider_id, client_id, goal_id) = seed(&router).await;

    request(
      &router,
      "POST",
      &format!("/clients/{client_id}/goals"),
      Some(json!({"actor_id": provider_id, "goal_id": goal_id})),
    )
    .await;

    // 80, 100, 83 -> mean 88 >= 80 on the third submission.
    submit_session(&router, org_id, provider_id, client_id, goal_id, 5, 4).await;
    submit_session(&router, org_id, provider_id, client_id, goal_id, 4, 4).await;
    let body =
      submit_session(&router, org_id, provider_id, client_id, goal_id, 6, 5)
        .await;

    let check = &body["mastery_checks"][0];
    assert_eq!(check["transitioned"], json!(true));
    assert_eq!(check["outcome"]["outcome"], json!("mastered"));
    assert_eq!(check["outcome"]["overall"], json!(88));

    // The profile now hides the mastered goal from the active plan.
    let (status, profile) = request(
      &router,
      "GET",
      &format!("/clients/{client_id}/profile?actor_id={provider_id}"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["goals"].as_array().unwrap().len(), 0);

    // And the archived view reports it with its success rate.
    let (status, archived) = request(
      &router,
      "GET",
      &format!("/clients/{client_id}/archived-goals"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived.as_array().unwrap().len(), 1);
    assert_eq!(archived[0]["status"], json!("mastered"));
  }

  #[tokio::test]
  async fn progress_report_and_audit_log_roundtrip() {
    let router = router().await;
    let (org_id, provider_id, client_id, goal_id) = seed(&router).await;

    request(
      &router,
      "POST",
      &format!("/clients/{client_id}/goals"),
      Some(json!({"actor_id": provider_id, "goal_id": goal_id})),
    )
    .await;
    submit_session(&router, org_id, provider_id, client_id, goal_id, 5, 4).await;

    let (status, report) = request(
      &router,
      "GET",
      &format!("/clients/{client_id}/progress-report?actor_id={provider_id}"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total_sessions"], json!(1));
    assert_eq!(report["goals"][0]["overall"], json!(80));

    let (status, log) = request(
      &router,
      "GET",
      &format!("/organizations/{org_id}/audit-log?actor_id={provider_id}"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Client create, assignment, session, collection, report view at least.
    assert!(log.as_array().unwrap().len() >= 5);
  }

  #[tokio::test]
  async fn audit_export_returns_csv() {
    let router = router().await;
    let (org_id, provider_id, ..) = seed(&router).await;

    let req = Request::builder()
      .method("GET")
      .uri(format!(
        "/organizations/{org_id}/audit-log/export?actor_id={provider_id}"
      ))
      .body(Body::empty())
      .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      resp.headers().get(header::CONTENT_TYPE).unwrap(),
      "text/csv"
    );
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("event_id,recorded_at"));
  }

  #[tokio::test]
  async fn fedc_distribution_buckets_the_goal_bank() {
    let router = router().await;
    let (org_id, ..) = seed(&router).await;

    for category in ["FEDC_2 - Engagement", "FEDC_8 - Reflective Thinking"] {
      let (status, _) = request(
        &router,
        "POST",
        "/goals",
        Some(json!({
          "organization_id": org_id,
          "category": category,
          "description": "x",
          "criteria": {
            "mastery_percentage": 80,
            "support_level": "Independent",
          },
        })),
      )
      .await;
      assert_eq!(status, StatusCode::CREATED);
    }

    let (status, dist) = request(
      &router,
      "GET",
      &format!("/organizations/{org_id}/fedc-distribution"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dist["total_goals"], json!(3));
    assert_eq!(dist["low"], json!(33));
    assert_eq!(dist["mid"], json!(33));
    assert_eq!(dist["high"], json!(33));
  }
}
