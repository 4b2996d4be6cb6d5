//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings and plain dates as ISO 8601
//! (`YYYY-MM-DD`, which compares correctly as text). Structured fields
//! (support breakdowns, provider lists, tag lists) are stored as compact
//! JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use floortrack_core::{
  audit::{AuditAction, AuditEvent, AuditOutcome, AuditResource},
  client::{Client, ClientStatus, GoalAssignment, GoalStatus},
  goal::{GoalDefinition, MasteryCriteria},
  org::{Organization, Provider},
  session::{DataCollection, SessionRecord, SessionType},
  support::{SupportBreakdown, SupportLevel},
  trial::TrialRecord,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_support_level(level: SupportLevel) -> &'static str {
  match level {
    SupportLevel::Independent => "independent",
    SupportLevel::Minimal => "minimal",
    SupportLevel::Moderate => "moderate",
  }
}

pub fn decode_support_level(s: &str) -> Result<SupportLevel> {
  match s {
    "independent" => Ok(SupportLevel::Independent),
    "minimal" => Ok(SupportLevel::Minimal),
    "moderate" => Ok(SupportLevel::Moderate),
    other => Err(Error::Decode(format!("unknown support level: {other:?}"))),
  }
}

pub fn encode_goal_status(status: GoalStatus) -> &'static str {
  match status {
    GoalStatus::InProgress => "in_progress",
    GoalStatus::Mastered => "mastered",
    GoalStatus::Discontinued => "discontinued",
  }
}

pub fn decode_goal_status(s: &str) -> Result<GoalStatus> {
  match s {
    "in_progress" => Ok(GoalStatus::InProgress),
    "mastered" => Ok(GoalStatus::Mastered),
    "discontinued" => Ok(GoalStatus::Discontinued),
    other => Err(Error::Decode(format!("unknown goal status: {other:?}"))),
  }
}

pub fn encode_client_status(status: ClientStatus) -> &'static str {
  match status {
    ClientStatus::Active => "active",
    ClientStatus::Deleted => "deleted",
  }
}

pub fn decode_client_status(s: &str) -> Result<ClientStatus> {
  match s {
    "active" => Ok(ClientStatus::Active),
    "deleted" => Ok(ClientStatus::Deleted),
    other => Err(Error::Decode(format!("unknown client status: {other:?}"))),
  }
}

pub fn encode_session_type(ty: SessionType) -> &'static str {
  match ty {
    SessionType::ProgressMonitoring => "progress_monitoring",
    SessionType::BaselineDataCollection => "baseline_data_collection",
  }
}

pub fn decode_session_type(s: &str) -> Result<SessionType> {
  match s {
    "progress_monitoring" => Ok(SessionType::ProgressMonitoring),
    "baseline_data_collection" => Ok(SessionType::BaselineDataCollection),
    other => Err(Error::Decode(format!("unknown session type: {other:?}"))),
  }
}

pub fn decode_audit_action(s: &str) -> Result<AuditAction> {
  match s {
    "create" => Ok(AuditAction::Create),
    "view" => Ok(AuditAction::View),
    "update" => Ok(AuditAction::Update),
    "status_change" => Ok(AuditAction::StatusChange),
    "export" => Ok(AuditAction::Export),
    other => Err(Error::Decode(format!("unknown audit action: {other:?}"))),
  }
}

pub fn decode_audit_resource(s: &str) -> Result<AuditResource> {
  match s {
    "client" => Ok(AuditResource::Client),
    "goal" => Ok(AuditResource::Goal),
    "goal_assignment" => Ok(AuditResource::GoalAssignment),
    "session" => Ok(AuditResource::Session),
    "data_collection" => Ok(AuditResource::DataCollection),
    "progress_report" => Ok(AuditResource::ProgressReport),
    "audit_log" => Ok(AuditResource::AuditLog),
    other => Err(Error::Decode(format!("unknown audit resource: {other:?}"))),
  }
}

pub fn decode_audit_outcome(s: &str) -> Result<AuditOutcome> {
  match s {
    "success" => Ok(AuditOutcome::Success),
    "denied" => Ok(AuditOutcome::Denied),
    "error" => Ok(AuditOutcome::Error),
    other => Err(Error::Decode(format!("unknown audit outcome: {other:?}"))),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_support(support: &SupportBreakdown) -> Result<String> {
  Ok(serde_json::to_string(support)?)
}

pub fn decode_support(s: &str) -> Result<SupportBreakdown> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_string_list(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_string_list(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_uuid_list(ids: &[Uuid]) -> Result<String> {
  let strings: Vec<String> = ids.iter().copied().map(encode_uuid).collect();
  Ok(serde_json::to_string(&strings)?)
}

pub fn decode_uuid_list(s: &str) -> Result<Vec<Uuid>> {
  let strings: Vec<String> = serde_json::from_str(s)?;
  strings.iter().map(|s| decode_uuid(s)).collect()
}

fn decode_pct(v: Option<i64>) -> Option<u8> {
  v.and_then(|n| u8::try_from(n).ok())
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `organizations` row.
pub struct RawOrganization {
  pub organization_id: String,
  pub name:            String,
  pub email:           Option<String>,
  pub created_at:      String,
}

impl RawOrganization {
  pub fn into_organization(self) -> Result<Organization> {
    Ok(Organization {
      organization_id: decode_uuid(&self.organization_id)?,
      name:            self.name,
      email:           self.email,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawProvider {
  pub provider_id:     String,
  pub organization_id: String,
  pub name:            String,
  pub credential:      Option<String>,
  pub email:           Option<String>,
  pub created_at:      String,
}

impl RawProvider {
  pub fn into_provider(self) -> Result<Provider> {
    Ok(Provider {
      provider_id:     decode_uuid(&self.provider_id)?,
      organization_id: decode_uuid(&self.organization_id)?,
      name:            self.name,
      credential:      self.credential,
      email:           self.email,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `goal_bank` row.
pub struct RawGoal {
  pub goal_id:            String,
  pub organization_id:    String,
  pub category:           String,
  pub description:        String,
  pub mastery_percentage: i64,
  pub across_sessions:    Option<i64>,
  pub support_level:      String,
  pub mastery_baseline:   Option<i64>,
  pub created_at:         String,
}

impl RawGoal {
  pub fn into_goal(self) -> Result<GoalDefinition> {
    let percentage = u8::try_from(self.mastery_percentage).map_err(|_| {
      Error::Decode(format!(
        "mastery percentage out of range: {}",
        self.mastery_percentage
      ))
    })?;
    let criteria = MasteryCriteria::new(
      percentage,
      self.across_sessions.and_then(|n| u32::try_from(n).ok()),
      decode_support_level(&self.support_level)?,
    )?;
    Ok(GoalDefinition {
      goal_id: decode_uuid(&self.goal_id)?,
      organization_id: decode_uuid(&self.organization_id)?,
      category: self.category,
      description: self.description,
      criteria,
      mastery_baseline: decode_pct(self.mastery_baseline),
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawClient {
  pub client_id:          String,
  pub organization_id:    String,
  pub name:               String,
  pub dob:                Option<String>,
  pub diagnosis:          Option<String>,
  pub parent_name:        Option<String>,
  pub email:              Option<String>,
  pub phone:              Option<String>,
  pub assigned_providers: String,
  pub review_date:        Option<String>,
  pub status:             String,
  pub created_at:         String,
}

impl RawClient {
  pub fn into_client(self) -> Result<Client> {
    Ok(Client {
      client_id:          decode_uuid(&self.client_id)?,
      organization_id:    decode_uuid(&self.organization_id)?,
      name:               self.name,
      dob:                self.dob.as_deref().map(decode_date).transpose()?,
      diagnosis:          self.diagnosis,
      parent_name:        self.parent_name,
      email:              self.email,
      phone:              self.phone,
      assigned_providers: decode_uuid_list(&self.assigned_providers)?,
      review_date:        self
        .review_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
      status:             decode_client_status(&self.status)?,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawAssignment {
  pub assignment_id:       String,
  pub goal_id:             String,
  pub goal_status:         String,
  pub target_date:         Option<String>,
  pub baseline_percentage: Option<i64>,
  pub success_rate:        Option<i64>,
  pub status_date:         Option<String>,
  pub reason:              Option<String>,
  pub assigned_at:         String,
}

impl RawAssignment {
  pub fn into_assignment(self) -> Result<GoalAssignment> {
    Ok(GoalAssignment {
      assignment_id:       decode_uuid(&self.assignment_id)?,
      goal_id:             decode_uuid(&self.goal_id)?,
      goal_status:         decode_goal_status(&self.goal_status)?,
      target_date:         self
        .target_date
        .as_deref()
        .map(decode_date)
        .transpose()?,
      baseline_percentage: decode_pct(self.baseline_percentage),
      success_rate:        decode_pct(self.success_rate),
      status_date:         self
        .status_date
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      reason:              self.reason,
      assigned_at:         decode_dt(&self.assigned_at)?,
    })
  }
}

pub struct RawSession {
  pub session_id:       String,
  pub client_id:        String,
  pub provider_id:      String,
  pub organization_id:  String,
  pub session_type:     String,
  pub date_of_session:  String,
  pub start_time:       Option<String>,
  pub end_time:         Option<String>,
  pub client_variables: Option<String>,
  pub created_at:       String,
}

impl RawSession {
  pub fn into_session(self) -> Result<SessionRecord> {
    Ok(SessionRecord {
      session_id:       decode_uuid(&self.session_id)?,
      client_id:        decode_uuid(&self.client_id)?,
      provider_id:      decode_uuid(&self.provider_id)?,
      organization_id:  decode_uuid(&self.organization_id)?,
      session_type:     decode_session_type(&self.session_type)?,
      date_of_session:  decode_date(&self.date_of_session)?,
      start_time:       self.start_time.as_deref().map(decode_dt).transpose()?,
      end_time:         self.end_time.as_deref().map(decode_dt).transpose()?,
      client_variables: self.client_variables,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawTrial {
  pub goal_id:      String,
  pub support_json: String,
  pub total:        i64,
  pub counter:      i64,
  pub recorded_at:  String,
}

impl RawTrial {
  pub fn into_trial(self) -> Result<TrialRecord> {
    Ok(TrialRecord {
      goal_id:     decode_uuid(&self.goal_id)?,
      support:     decode_support(&self.support_json)?,
      total:       u32::try_from(self.total).unwrap_or(0),
      counter:     u32::try_from(self.counter).unwrap_or(0),
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings from a `data_collections` row; trials are joined in by the
/// store before conversion.
pub struct RawCollection {
  pub collection_id:        String,
  pub session_id:           String,
  pub client_id:            String,
  pub organization_id:      String,
  pub activities_engaged:   String,
  pub supports_observed:    String,
  pub duration_secs:        Option<i64>,
  pub provider_observation: Option<String>,
  pub recorded_at:          String,
}

impl RawCollection {
  pub fn into_collection(self, trials: Vec<TrialRecord>) -> Result<DataCollection> {
    Ok(DataCollection {
      collection_id: decode_uuid(&self.collection_id)?,
      session_id: decode_uuid(&self.session_id)?,
      client_id: decode_uuid(&self.client_id)?,
      organization_id: decode_uuid(&self.organization_id)?,
      trials,
      activities_engaged: decode_string_list(&self.activities_engaged)?,
      supports_observed: decode_string_list(&self.supports_observed)?,
      duration_secs: self.duration_secs.and_then(|n| u32::try_from(n).ok()),
      provider_observation: self.provider_observation,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

pub struct RawAuditEvent {
  pub event_id:        String,
  pub organization_id: String,
  pub actor_id:        String,
  pub action:          String,
  pub resource:        String,
  pub resource_id:     Option<String>,
  pub outcome:         String,
  pub detail:          Option<String>,
  pub recorded_at:     String,
}

impl RawAuditEvent {
  pub fn into_event(self) -> Result<AuditEvent> {
    Ok(AuditEvent {
      event_id:        decode_uuid(&self.event_id)?,
      organization_id: decode_uuid(&self.organization_id)?,
      actor_id:        decode_uuid(&self.actor_id)?,
      action:          decode_audit_action(&self.action)?,
      resource:        decode_audit_resource(&self.resource)?,
      resource_id:     self
        .resource_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      outcome:         decode_audit_outcome(&self.outcome)?,
      detail:          self.detail,
      recorded_at:     decode_dt(&self.recorded_at)?,
    })
  }
}
