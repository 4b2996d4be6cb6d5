//! Session envelopes and data-collection batches.
//!
//! A session is one client visit; a data collection is the batch of trial
//! records, tags, and provider observations captured during it. Collections
//! are append-only — corrections happen clinically, not by editing history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trial::{NewTrialRecord, TrialRecord};

// ─── SessionRecord ───────────────────────────────────────────────────────────

/// The purpose of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
  #[serde(rename = "Progress Monitoring")]
  ProgressMonitoring,
  #[serde(rename = "Baseline Data Collection")]
  BaselineDataCollection,
}

/// One scheduled/started client visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
  pub session_id:       Uuid,
  pub client_id:        Uuid,
  pub provider_id:      Uuid,
  pub organization_id:  Uuid,
  pub session_type:     SessionType,
  pub date_of_session:  NaiveDate,
  pub start_time:       Option<DateTime<Utc>>,
  pub end_time:         Option<DateTime<Utc>>,
  /// Free-text situational factors noted at the start of the visit
  /// (illness, sleep, medication changes, ...).
  pub client_variables: Option<String>,
  pub created_at:       DateTime<Utc>,
}

impl SessionRecord {
  /// Visit length in whole minutes, when both timestamps are present.
  pub fn duration_minutes(&self) -> Option<i64> {
    match (self.start_time, self.end_time) {
      (Some(start), Some(end)) => {
        Some((end - start).num_seconds().max(0) / 60)
      }
      _ => None,
    }
  }
}

/// Input to [`crate::store::PracticeStore::start_session`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSessionRecord {
  pub client_id:        Uuid,
  pub provider_id:      Uuid,
  pub organization_id:  Uuid,
  pub session_type:     SessionType,
  pub date_of_session:  NaiveDate,
  #[serde(default)]
  pub start_time:       Option<DateTime<Utc>>,
  #[serde(default)]
  pub end_time:         Option<DateTime<Utc>>,
  #[serde(default)]
  pub client_variables: Option<String>,
}

// ─── DataCollection ──────────────────────────────────────────────────────────

/// The batch of trial data captured during one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCollection {
  pub collection_id:        Uuid,
  pub session_id:           Uuid,
  pub client_id:            Uuid,
  pub organization_id:      Uuid,
  pub trials:               Vec<TrialRecord>,
  pub activities_engaged:   Vec<String>,
  pub supports_observed:    Vec<String>,
  /// Visit length in seconds as reported by the collection UI.
  pub duration_secs:        Option<u32>,
  pub provider_observation: Option<String>,
  pub recorded_at:          DateTime<Utc>,
}

/// Input to [`crate::store::PracticeStore::record_collection`].
/// `collection_id`, `organization_id`, and `recorded_at` are assigned by
/// the store from the referenced session.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDataCollection {
  pub session_id:           Uuid,
  pub client_id:            Uuid,
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

// ─── Observation flags ───────────────────────────────────────────────────────

/// Keywords that mark a session as affected by client variables; used to
/// flag data points in progress charts.
const VARIABLE_KEYWORDS: &[&str] = &[
  "illness",
  "sick",
  "cold",
  "medication",
  "sleep",
  "tired",
  "meltdown",
  "disruption",
  "behavioral",
  "challenge",
];

/// Whether an observation mentions any known client-variable keyword.
pub fn has_client_variables(observation: &str) -> bool {
  if observation.is_empty() {
    return false;
  }
  let lower = observation.to_lowercase();
  VARIABLE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
