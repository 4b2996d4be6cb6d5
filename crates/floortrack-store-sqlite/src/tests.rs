//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Days, NaiveDate, Utc};
use floortrack_core::{
  audit::{AuditAction, AuditOutcome, AuditResource, NewAuditEvent},
  client::{GoalStatus, NewClient, NewGoalAssignment},
  engine::{self, MasteryCheckResult},
  goal::{MasteryCriteria, NewGoalDefinition},
  lifecycle::manual_override,
  org::{NewOrganization, NewProvider},
  progress::MasteryOutcome,
  session::{NewDataCollection, NewSessionRecord, SessionType},
  store::PracticeStore,
  support::{LevelCounts, SupportBreakdown, SupportLevel},
  trial::NewTrialRecord,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct Practice {
  organization_id: Uuid,
  provider_id:     Uuid,
  client_id:       Uuid,
  goal_id:         Uuid,
}

/// One organization, one provider, one client, one goal requiring 80%
/// independent over 3 sessions.
async fn seed(s: &SqliteStore) -> Practice {
  let org = s
    .add_organization(NewOrganization {
      name:  "Sunrise DIR Clinic".into(),
      email: None,
    })
    .await
    .unwrap();
  let provider = s
    .add_provider(NewProvider {
      organization_id: org.organization_id,
      name:            "Dana Reyes".into(),
      credential:      Some("DIR-Expert".into()),
      email:           None,
    })
    .await
    .unwrap();
  let client = s
    .add_client(NewClient {
      organization_id:    org.organization_id,
      name:               "Avery M".into(),
      dob:                NaiveDate::from_ymd_opt(2020, 4, 2),
      diagnosis:          Some("ASD level 2".into()),
      parent_name:        None,
      email:              None,
      phone:              None,
      assigned_providers: vec![provider.provider_id],
      review_date:        None,
    })
    .await
    .unwrap();
  let goal = s
    .add_goal(NewGoalDefinition {
      organization_id:  org.organization_id,
      category:         "FEDC_4 - Complex Communication".into(),
      description:      "Initiates two-way play sequences".into(),
      criteria:         MasteryCriteria::new(
        80,
        Some(3),
        SupportLevel::Independent,
      )
      .unwrap(),
      mastery_baseline: Some(30),
    })
    .await
    .unwrap();

  Practice {
    organization_id: org.organization_id,
    provider_id:     provider.provider_id,
    client_id:       client.client_id,
    goal_id:         goal.goal_id,
  }
}

async fn record_session(
  s: &SqliteStore,
  p: &Practice,
  independent: (u32, u32),
) {
  let session = s
    .start_session(NewSessionRecord {
      client_id:        p.client_id,
      provider_id:      p.provider_id,
      organization_id:  p.organization_id,
      session_type:     SessionType::ProgressMonitoring,
      date_of_session:  Utc::now().date_naive(),
      start_time:       None,
      end_time:         None,
      client_variables: None,
    })
    .await
    .unwrap();
  s.record_collection(NewDataCollection {
    session_id:           session.session_id,
    client_id:            p.client_id,
    trials:               vec![NewTrialRecord {
      goal_id: p.goal_id,
      support: SupportBreakdown {
        independent: LevelCounts::new(independent.0, independent.1),
        ..Default::default()
      },
      total:   independent.0,
      counter: independent.0,
    }],
    activities_engaged:   vec![],
    supports_observed:    vec![],
    duration_secs:        None,
    provider_observation: None,
  })
  .await
  .unwrap();
}

// ─── CRUD roundtrips ─────────────────────────────────────────────────────────

#[tokio::test]
async fn organization_and_provider_roundtrip() {
  let s = store().await;
  let p = seed(&s).await;

  let org = s.get_organization(p.organization_id).await.unwrap().unwrap();
  assert_eq!(org.name, "Sunrise DIR Clinic");

  let provider = s.get_provider(p.provider_id).await.unwrap().unwrap();
  assert_eq!(provider.credential.as_deref(), Some("DIR-Expert"));

  let providers = s.list_providers(p.organization_id).await.unwrap();
  assert_eq!(providers.len(), 1);
}

#[tokio::test]
async fn goal_criteria_roundtrip() {
  let s = store().await;
  let p = seed(&s).await;

  let goal = s.get_goal(p.goal_id).await.unwrap().unwrap();
  assert_eq!(goal.criteria.mastery_percentage, 80);
  assert_eq!(goal.criteria.required_sessions(), 3);
  assert_eq!(goal.criteria.support_level, SupportLevel::Independent);
  assert_eq!(goal.fedc_level(), Some(4));
}

#[tokio::test]
async fn client_roundtrip_and_missing_returns_none() {
  let s = store().await;
  let p = seed(&s).await;

  let client = s.get_client(p.client_id).await.unwrap().unwrap();
  assert_eq!(client.name, "Avery M");
  assert_eq!(client.assigned_providers, vec![p.provider_id]);

  assert!(s.get_client(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Assignment invariants ───────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_active_assignment_is_rejected() {
  let s = store().await;
  let p = seed(&s).await;

  s.assign_goal(p.client_id, NewGoalAssignment {
    goal_id:             p.goal_id,
    target_date:         None,
    baseline_percentage: Some(30),
  })
  .await
  .unwrap();

  let err = s
    .assign_goal(p.client_id, NewGoalAssignment {
      goal_id:             p.goal_id,
      target_date:         None,
      baseline_percentage: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::DuplicateActiveAssignment(_)));
}

#[tokio::test]
async fn reassignment_is_allowed_after_discontinuation() {
  let s = store().await;
  let p = seed(&s).await;

  let assignment = s
    .assign_goal(p.client_id, NewGoalAssignment {
      goal_id:             p.goal_id,
      target_date:         None,
      baseline_percentage: None,
    })
    .await
    .unwrap();

  let list = s.goal_assignments(p.client_id).await.unwrap();
  let change =
    manual_override(GoalStatus::Discontinued, Some("plan revised".into()), Utc::now());
  s.apply_status_change(
    p.client_id,
    assignment.assignment_id,
    change,
    list.version,
  )
  .await
  .unwrap();

  // The terminal assignment no longer blocks a fresh one.
  s.assign_goal(p.client_id, NewGoalAssignment {
    goal_id:             p.goal_id,
    target_date:         None,
    baseline_percentage: None,
  })
  .await
  .unwrap();

  let list = s.goal_assignments(p.client_id).await.unwrap();
  assert_eq!(list.entries.len(), 2);
  assert_eq!(list.active().count(), 1);
}

#[tokio::test]
async fn assignment_mutations_bump_the_list_version() {
  let s = store().await;
  let p = seed(&s).await;

  let before = s.goal_assignments(p.client_id).await.unwrap().version;
  s.assign_goal(p.client_id, NewGoalAssignment {
    goal_id:             p.goal_id,
    target_date:         None,
    baseline_percentage: None,
  })
  .await
  .unwrap();
  let after = s.goal_assignments(p.client_id).await.unwrap().version;

  assert_eq!(after, before + 1);
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
  let s = store().await;
  let p = seed(&s).await;

  let assignment = s
    .assign_goal(p.client_id, NewGoalAssignment {
      goal_id:             p.goal_id,
      target_date:         None,
      baseline_percentage: None,
    })
    .await
    .unwrap();
  let list = s.goal_assignments(p.client_id).await.unwrap();

  // First writer wins.
  let change = manual_override(GoalStatus::Mastered, None, Utc::now());
  s.apply_status_change(
    p.client_id,
    assignment.assignment_id,
    change.clone(),
    list.version,
  )
  .await
  .unwrap();

  // Second writer holds the stale version and must fail.
  let err = s
    .apply_status_change(
      p.client_id,
      assignment.assignment_id,
      change,
      list.version,
    )
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::VersionConflict { .. }));
}

#[tokio::test]
async fn status_change_stamps_rate_reason_and_date() {
  let s = store().await;
  let p = seed(&s).await;

  let assignment = s
    .assign_goal(p.client_id, NewGoalAssignment {
      goal_id:             p.goal_id,
      target_date:         None,
      baseline_percentage: None,
    })
    .await
    .unwrap();
  let list = s.goal_assignments(p.client_id).await.unwrap();

  let change = manual_override(
    GoalStatus::Discontinued,
    Some("family moved".into()),
    Utc::now(),
  );
  let (updated, new_version) = s
    .apply_status_change(
      p.client_id,
      assignment.assignment_id,
      change,
      list.version,
    )
    .await
    .unwrap();

  assert_eq!(updated.goal_status, GoalStatus::Discontinued);
  assert_eq!(updated.reason.as_deref(), Some("family moved"));
  assert!(updated.status_date.is_some());
  assert_eq!(new_version, list.version + 1);
}

// ─── Sessions & trials ───────────────────────────────────────────────────────

#[tokio::test]
async fn recent_trials_are_chronological_and_capped() {
  let s = store().await;
  let p = seed(&s).await;

  record_session(&s, &p, (5, 2)).await;
  record_session(&s, &p, (5, 3)).await;
  record_session(&s, &p, (5, 4)).await;
  record_session(&s, &p, (5, 5)).await;

  let trials = s.recent_trials(p.client_id, p.goal_id, 3).await.unwrap();
  assert_eq!(trials.len(), 3);
  // Oldest of the window first; the 2/5 session fell out of it.
  assert_eq!(trials[0].support.independent.success, 3);
  assert_eq!(trials[2].support.independent.success, 5);
  assert!(trials[0].recorded_at <= trials[2].recorded_at);
}

#[tokio::test]
async fn collection_for_unknown_session_errors() {
  let s = store().await;
  let p = seed(&s).await;

  let err = s
    .record_collection(NewDataCollection {
      session_id:           Uuid::new_v4(),
      client_id:            p.client_id,
      trials:               vec![],
      activities_engaged:   vec![],
      supports_observed:    vec![],
      duration_secs:        None,
      provider_observation: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::SessionNotFound(_)));
}

#[tokio::test]
async fn latest_collection_carries_its_trials() {
  let s = store().await;
  let p = seed(&s).await;

  let session = s
    .start_session(NewSessionRecord {
      client_id:        p.client_id,
      provider_id:      p.provider_id,
      organization_id:  p.organization_id,
      session_type:     SessionType::BaselineDataCollection,
      date_of_session:  Utc::now().date_naive(),
      start_time:       None,
      end_time:         None,
      client_variables: None,
    })
    .await
    .unwrap();
  s.record_collection(NewDataCollection {
    session_id:           session.session_id,
    client_id:            p.client_id,
    trials:               vec![NewTrialRecord {
      goal_id: p.goal_id,
      support: SupportBreakdown {
        independent: LevelCounts::new(4, 3),
        ..Default::default()
      },
      total:   4,
      counter: 4,
    }],
    activities_engaged:   vec!["obstacle course".into()],
    supports_observed:    vec![],
    duration_secs:        Some(1800),
    provider_observation: Some("regulated throughout".into()),
  })
  .await
  .unwrap();

  let collection = s
    .latest_collection(session.session_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(collection.trials.len(), 1);
  assert_eq!(collection.trials[0].derived_accuracy(), 75);
  assert_eq!(collection.activities_engaged, vec!["obstacle course"]);

  assert!(s.latest_collection(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Engine against the store ────────────────────────────────────────────────

#[tokio::test]
async fn mastery_transition_is_persisted_once() {
  let s = store().await;
  let p = seed(&s).await;

  s.assign_goal(p.client_id, NewGoalAssignment {
    goal_id:             p.goal_id,
    target_date:         None,
    baseline_percentage: Some(30),
  })
  .await
  .unwrap();

  // 80, 100, 83 -> mean 88 >= 80.
  record_session(&s, &p, (5, 4)).await;
  record_session(&s, &p, (4, 4)).await;
  record_session(&s, &p, (6, 5)).await;

  let result = engine::run_mastery_check(&s, p.client_id, p.goal_id, Utc::now())
    .await
    .unwrap();
  assert_eq!(result, MasteryCheckResult::Evaluated {
    outcome:      MasteryOutcome::Mastered { overall: 88 },
    transitioned: true,
  });

  let list = s.goal_assignments(p.client_id).await.unwrap();
  let assignment = &list.entries[0];
  assert_eq!(assignment.goal_status, GoalStatus::Mastered);
  assert_eq!(assignment.success_rate, Some(88));
  assert!(assignment.status_date.is_some());

  // A repeated check finds no active assignment and changes nothing.
  let again = engine::run_mastery_check(&s, p.client_id, p.goal_id, Utc::now())
    .await
    .unwrap();
  assert_eq!(again, MasteryCheckResult::NotTracked);
}

#[tokio::test]
async fn two_sessions_are_insufficient_evidence() {
  let s = store().await;
  let p = seed(&s).await;

  s.assign_goal(p.client_id, NewGoalAssignment {
    goal_id:             p.goal_id,
    target_date:         None,
    baseline_percentage: None,
  })
  .await
  .unwrap();

  record_session(&s, &p, (5, 5)).await;
  record_session(&s, &p, (5, 5)).await;

  let result = engine::run_mastery_check(&s, p.client_id, p.goal_id, Utc::now())
    .await
    .unwrap();
  assert_eq!(result, MasteryCheckResult::Evaluated {
    outcome:      MasteryOutcome::InsufficientEvidence { valid_sessions: 2 },
    transitioned: false,
  });

  let list = s.goal_assignments(p.client_id).await.unwrap();
  assert_eq!(list.entries[0].goal_status, GoalStatus::InProgress);
}

#[tokio::test]
async fn sweep_discontinues_overdue_goals() {
  let s = store().await;
  let p = seed(&s).await;

  let today = Utc::now().date_naive();
  s.assign_goal(p.client_id, NewGoalAssignment {
    goal_id:             p.goal_id,
    target_date:         today.checked_sub_days(Days::new(1)),
    baseline_percentage: None,
  })
  .await
  .unwrap();

  let overdue = s.clients_with_overdue_goals(today).await.unwrap();
  assert_eq!(overdue, vec![p.client_id]);

  let flipped = engine::sweep_overdue_goals(&s, today, Utc::now())
    .await
    .unwrap();
  assert_eq!(flipped, 1);

  let list = s.goal_assignments(p.client_id).await.unwrap();
  assert_eq!(list.entries[0].goal_status, GoalStatus::Discontinued);

  // Second sweep is a no-op.
  let flipped = engine::sweep_overdue_goals(&s, today, Utc::now())
    .await
    .unwrap();
  assert_eq!(flipped, 0);
}

#[tokio::test]
async fn progress_report_rolls_up_the_window() {
  let s = store().await;
  let p = seed(&s).await;

  s.assign_goal(p.client_id, NewGoalAssignment {
    goal_id:             p.goal_id,
    target_date:         None,
    baseline_percentage: Some(30),
  })
  .await
  .unwrap();
  record_session(&s, &p, (5, 4)).await;
  record_session(&s, &p, (4, 4)).await;

  let report = engine::progress_report(&s, p.client_id, Utc::now())
    .await
    .unwrap()
    .unwrap();

  assert_eq!(report.total_sessions, 2);
  assert_eq!(report.goals.len(), 1);
  let goal = &report.goals[0];
  assert_eq!(goal.baseline, 30);
  assert_eq!(goal.target, 80);
  assert_eq!(goal.overall, 90); // mean of 80, 100
  assert_eq!(goal.sessions.len(), 2);
  assert_eq!(report.summary.goals_in_progress, 1);
  assert_eq!(report.fedc_observations.len(), 1);
  assert_eq!(report.fedc_observations[0].observations, 2);
  assert_eq!(report.fedc_observations[0].percentage, 100);

  // Report assembly never flips status.
  let list = s.goal_assignments(p.client_id).await.unwrap();
  assert_eq!(list.entries[0].goal_status, GoalStatus::InProgress);
}

// ─── Audit trail ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_events_roundtrip_newest_first() {
  let s = store().await;
  let p = seed(&s).await;

  for resource in [AuditResource::Client, AuditResource::Session] {
    s.record_audit_event(NewAuditEvent {
      organization_id: p.organization_id,
      actor_id:        p.provider_id,
      action:          AuditAction::Create,
      resource,
      resource_id:     Some(Uuid::new_v4()),
      outcome:         AuditOutcome::Success,
      detail:          None,
    })
    .await
    .unwrap();
  }

  let events = s.list_audit_events(p.organization_id, 10).await.unwrap();
  assert_eq!(events.len(), 2);
  assert!(events[0].recorded_at >= events[1].recorded_at);

  let capped = s.list_audit_events(p.organization_id, 1).await.unwrap();
  assert_eq!(capped.len(), 1);
}
