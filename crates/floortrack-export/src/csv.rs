//! CSV writers.
//!
//! Fields are quoted per RFC 4180 when they contain a comma, quote, or
//! newline; embedded quotes are doubled. Everything else passes through
//! unquoted so the output stays diffable.

use floortrack_core::{
  audit::AuditEvent, client::GoalStatus, progress::GoalProgress,
};

// ─── Field quoting ───────────────────────────────────────────────────────────

fn escape_field(s: &str) -> String {
  if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r')
  {
    format!("\"{}\"", s.replace('"', "\"\""))
  } else {
    s.to_owned()
  }
}

fn write_row(out: &mut String, fields: &[String]) {
  let mut first = true;
  for field in fields {
    if !first {
      out.push(',');
    }
    out.push_str(&escape_field(field));
    first = false;
  }
  out.push_str("\r\n");
}

// ─── Audit log ───────────────────────────────────────────────────────────────

/// Render an audit trail as CSV, one event per row, in the order given.
pub fn audit_log_csv(events: &[AuditEvent]) -> String {
  let mut out = String::new();
  write_row(&mut out, &[
    "event_id".into(),
    "recorded_at".into(),
    "actor_id".into(),
    "action".into(),
    "resource".into(),
    "resource_id".into(),
    "outcome".into(),
    "detail".into(),
  ]);

  for event in events {
    write_row(&mut out, &[
      event.event_id.to_string(),
      event.recorded_at.to_rfc3339(),
      event.actor_id.to_string(),
      event.action.label().to_owned(),
      event.resource.label().to_owned(),
      event
        .resource_id
        .map(|id| id.to_string())
        .unwrap_or_default(),
      event.outcome.label().to_owned(),
      event.detail.clone().unwrap_or_default(),
    ]);
  }
  out
}

// ─── Goal progress ───────────────────────────────────────────────────────────

fn status_field(status: GoalStatus) -> &'static str {
  match status {
    GoalStatus::InProgress => "in_progress",
    GoalStatus::Mastered => "mastered",
    GoalStatus::Discontinued => "discontinued",
  }
}

/// Render per-goal progress rollups as CSV, one goal per row.
pub fn goal_progress_csv(goals: &[GoalProgress]) -> String {
  let mut out = String::new();
  write_row(&mut out, &[
    "goal_id".into(),
    "category".into(),
    "description".into(),
    "status".into(),
    "baseline".into(),
    "target".into(),
    "overall".into(),
    "trend".into(),
    "sessions".into(),
  ]);

  for goal in goals {
    write_row(&mut out, &[
      goal.goal_id.to_string(),
      goal.category.clone(),
      goal.description.clone(),
      status_field(goal.status).to_owned(),
      goal.baseline.to_string(),
      goal.target.to_string(),
      goal.overall.to_string(),
      format!("{:?}", goal.trend).to_lowercase(),
      goal.total_sessions.to_string(),
    ]);
  }
  out
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use floortrack_core::{
    audit::{AuditAction, AuditEvent, AuditOutcome, AuditResource},
    client::GoalStatus,
    progress::{GoalProgress, Trend},
    support::SupportLevel,
  };
  use uuid::Uuid;

  use super::*;

  #[test]
  fn fields_with_commas_and_quotes_are_escaped() {
    assert_eq!(escape_field("plain"), "plain");
    assert_eq!(escape_field("a,b"), "\"a,b\"");
    assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
  }

  #[test]
  fn audit_csv_has_header_and_one_row_per_event() {
    let event = AuditEvent {
      event_id:        Uuid::new_v4(),
      organization_id: Uuid::new_v4(),
      actor_id:        Uuid::new_v4(),
      action:          AuditAction::StatusChange,
      resource:        AuditResource::GoalAssignment,
      resource_id:     None,
      outcome:         AuditOutcome::Success,
      detail:          Some("mastered, 3 sessions".into()),
      recorded_at:     Utc::now(),
    };

    let csv = audit_log_csv(std::slice::from_ref(&event));
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("event_id,recorded_at"));
    assert!(lines[1].contains("status_change"));
    // The comma in the detail forces quoting.
    assert!(lines[1].contains("\"mastered, 3 sessions\""));
  }

  #[test]
  fn goal_progress_csv_renders_rollup_columns() {
    let goal = GoalProgress {
      goal_id:                Uuid::new_v4(),
      category:               "FEDC_4 - Complex Communication".into(),
      description:            "Initiates two-way play".into(),
      baseline:               30,
      target:                 80,
      required_support_level: SupportLevel::Independent,
      sessions:               vec![],
      overall:                88,
      trend:                  Trend::Improving,
      status:                 GoalStatus::Mastered,
      total_sessions:         3,
    };

    let csv = goal_progress_csv(std::slice::from_ref(&goal));
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("mastered"));
    assert!(lines[1].contains("88"));
    assert!(lines[1].contains("improving"));
  }
}
