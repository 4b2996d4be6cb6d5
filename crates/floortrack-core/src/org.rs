//! Organizations and providers.
//!
//! These are plain scoping records: every client, goal, session, and audit
//! event hangs off an organization, and mutations are attributed to a
//! provider. Tenancy *mechanics* (isolation, auth) are out of scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Organization ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
  pub organization_id: Uuid,
  pub name:            String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:           Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::PracticeStore::add_organization`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganization {
  pub name:  String,
  #[serde(default)]
  pub email: Option<String>,
}

// ─── Provider ────────────────────────────────────────────────────────────────

/// A clinician within an organization. The `credential` is a free-text
/// designation ("DIR-Expert", "OTR/L", ...), not an access role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
  pub provider_id:     Uuid,
  pub organization_id: Uuid,
  pub name:            String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub credential:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:           Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::PracticeStore::add_provider`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewProvider {
  pub organization_id: Uuid,
  pub name:            String,
  #[serde(default)]
  pub credential:      Option<String>,
  #[serde(default)]
  pub email:           Option<String>,
}
