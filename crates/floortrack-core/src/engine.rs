//! Engine orchestration: the pieces of the progress engine that need a
//! store.
//!
//! The pure math lives in [`crate::progress`]; this module fetches the
//! inputs, runs it, and persists the resulting lifecycle transitions. All
//! functions are generic over [`PracticeStore`] so they run identically
//! against SQLite and against test doubles.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  client::GoalStatus,
  lifecycle::{auto_discontinue, auto_master},
  notes::{NoteClientProfile, NoteRequest, build_note_request},
  progress::{
    FedcObservation, GoalProgress, MasteryOutcome, ProgressReport,
    ProgressSummary, SessionPoint, classify_trend, evaluate_mastery,
    mean_rounded, overall_at_level, sort_fedc_observations,
  },
  session::{DataCollection, has_client_variables},
  store::PracticeStore,
};

/// Days of history a progress report covers.
pub const REPORT_WINDOW_DAYS: u64 = 30;

// ─── Mastery check ───────────────────────────────────────────────────────────

/// Result of one per-goal mastery check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasteryCheckResult {
  /// The goal has no active assignment on this client (or no longer exists
  /// in the goal bank). Nothing to evaluate, nothing to transition.
  NotTracked,
  Evaluated {
    outcome:      MasteryOutcome,
    /// Whether the check persisted a transition to `Mastered`.
    transitioned: bool,
  },
}

/// Evaluate one goal's mastery contract for a client and persist the
/// transition when it is satisfied.
///
/// The transition is a conditional update on the assignment-list version
/// read here, so a concurrent writer surfaces as a conflict instead of a
/// lost update. Already-terminal assignments are reported as `NotTracked`
/// (the engine only tracks in-progress goals).
pub async fn run_mastery_check<S: PracticeStore>(
  store: &S,
  client_id: Uuid,
  goal_id: Uuid,
  now: DateTime<Utc>,
) -> Result<MasteryCheckResult, S::Error> {
  let assignments = store.goal_assignments(client_id).await?;
  let Some(assignment) = assignments.active_for_goal(goal_id) else {
    return Ok(MasteryCheckResult::NotTracked);
  };
  let Some(goal) = store.get_goal(goal_id).await? else {
    return Ok(MasteryCheckResult::NotTracked);
  };

  let required = goal.criteria.required_sessions();
  let trials = store.recent_trials(client_id, goal_id, required).await?;
  let outcome = evaluate_mastery(&goal.criteria, &trials);

  let mut transitioned = false;
  if let MasteryOutcome::Mastered { overall } = outcome
    && let Some(change) = auto_master(assignment, overall, now)
  {
    store
      .apply_status_change(
        client_id,
        assignment.assignment_id,
        change,
        assignments.version,
      )
      .await?;
    transitioned = true;
    tracing::info!(
      %client_id, %goal_id, overall,
      "goal mastered after {required} qualifying sessions",
    );
  }

  Ok(MasteryCheckResult::Evaluated { outcome, transitioned })
}

/// Run the mastery check for every distinct goal in a data-collection
/// batch. Returns one result per goal, in first-appearance order.
pub async fn check_collection<S: PracticeStore>(
  store: &S,
  collection: &DataCollection,
  now: DateTime<Utc>,
) -> Result<Vec<(Uuid, MasteryCheckResult)>, S::Error> {
  let mut seen = Vec::new();
  let mut results = Vec::new();
  for trial in &collection.trials {
    if seen.contains(&trial.goal_id) {
      continue;
    }
    seen.push(trial.goal_id);
    let result =
      run_mastery_check(store, collection.client_id, trial.goal_id, now)
        .await?;
    results.push((trial.goal_id, result));
  }
  Ok(results)
}

// ─── Discontinuation sweep ───────────────────────────────────────────────────

/// Discontinue a client's in-progress goals whose target date has passed.
/// Returns the number of assignments transitioned. Idempotent: terminal
/// assignments are skipped, so this runs safely on every profile read and
/// on a timer.
pub async fn sweep_client<S: PracticeStore>(
  store: &S,
  client_id: Uuid,
  today: NaiveDate,
  now: DateTime<Utc>,
) -> Result<u32, S::Error> {
  let assignments = store.goal_assignments(client_id).await?;
  let mut version = assignments.version;
  let mut flipped = 0;

  for assignment in &assignments.entries {
    let Some(change) = auto_discontinue(assignment, today, now) else {
      continue;
    };
    let (_, new_version) = store
      .apply_status_change(client_id, assignment.assignment_id, change, version)
      .await?;
    version = new_version;
    flipped += 1;
    tracing::info!(
      %client_id,
      assignment_id = %assignment.assignment_id,
      "goal discontinued: target date passed",
    );
  }

  Ok(flipped)
}

/// The scheduled sweep: discontinue overdue goals across every client that
/// has one. Returns the total number of assignments transitioned.
pub async fn sweep_overdue_goals<S: PracticeStore>(
  store: &S,
  today: NaiveDate,
  now: DateTime<Utc>,
) -> Result<u32, S::Error> {
  let clients = store.clients_with_overdue_goals(today).await?;
  let mut flipped = 0;
  for client_id in clients {
    flipped += sweep_client(store, client_id, today, now).await?;
  }
  if flipped > 0 {
    tracing::info!(flipped, "discontinuation sweep complete");
  }
  Ok(flipped)
}

// ─── Progress report ─────────────────────────────────────────────────────────

/// Assemble the 30-day progress report for a client. Read-only: never
/// mutates goal status. Returns `None` for an unknown client.
pub async fn progress_report<S: PracticeStore>(
  store: &S,
  client_id: Uuid,
  now: DateTime<Utc>,
) -> Result<Option<ProgressReport>, S::Error> {
  let Some(client) = store.get_client(client_id).await? else {
    return Ok(None);
  };

  let window_start = now - Days::new(REPORT_WINDOW_DAYS);
  let collections =
    store.collections_in_window(client_id, window_start, now).await?;
  let assignments = store.goal_assignments(client_id).await?;
  let total_sessions = collections.len() as u32;

  let mut goals = Vec::new();
  let mut observations: Vec<FedcObservation> = Vec::new();

  for assignment in &assignments.entries {
    let Some(goal) = store.get_goal(assignment.goal_id).await? else {
      continue;
    };
    let level = goal.criteria.support_level;

    let mut points = Vec::new();
    let mut level_points = Vec::new();
    let mut trials = Vec::new();
    for collection in &collections {
      let Some(trial) =
        collection.trials.iter().find(|t| t.goal_id == goal.goal_id)
      else {
        continue;
      };
      points.push(SessionPoint {
        date:          collection.recorded_at,
        accuracy:      trial.derived_accuracy(),
        levels:        trial.percentages(),
        total:         trial.total,
        has_variables: collection
          .provider_observation
          .as_deref()
          .is_some_and(has_client_variables),
      });
      if let Some(pct) = trial.level_percentage(level) {
        level_points.push(pct);
      }
      trials.push(trial.clone());
    }

    if !trials.is_empty() {
      match observations.iter_mut().find(|o| o.category == goal.category) {
        Some(existing) => existing.observations += trials.len() as u32,
        None => observations.push(FedcObservation {
          category:     goal.category.clone(),
          observations: trials.len() as u32,
          percentage:   0,
        }),
      }
    }

    let session_count = points.len() as u32;
    goals.push(GoalProgress {
      goal_id: goal.goal_id,
      category: goal.category,
      description: goal.description,
      baseline: assignment
        .baseline_percentage
        .or(goal.mastery_baseline)
        .unwrap_or(0),
      target: goal.criteria.mastery_percentage,
      required_support_level: level,
      sessions: points,
      overall: mean_rounded(&level_points),
      trend: classify_trend(&level_points),
      status: assignment.goal_status,
      total_sessions: session_count,
    });
  }

  for obs in &mut observations {
    obs.percentage = if total_sessions == 0 {
      0
    } else {
      (f64::from(obs.observations) / f64::from(total_sessions) * 100.0).round()
        as u8
    };
  }
  sort_fedc_observations(&mut observations);

  let summary = summarize(&goals);

  Ok(Some(ProgressReport {
    client_id,
    client_name: client.name.clone(),
    client_age: client.age(now.date_naive()),
    diagnosis: client.diagnosis,
    window_start,
    window_end: now,
    total_sessions,
    goals,
    fedc_observations: observations,
    summary,
  }))
}

fn summarize(goals: &[GoalProgress]) -> ProgressSummary {
  let mut summary = ProgressSummary::default();
  let mut overalls = Vec::new();
  for goal in goals {
    match goal.status {
      GoalStatus::InProgress => summary.goals_in_progress += 1,
      GoalStatus::Mastered => summary.goals_mastered += 1,
      GoalStatus::Discontinued => summary.goals_discontinued += 1,
    }
    if goal.total_sessions > 0 {
      overalls.push(goal.overall);
    }
  }
  summary.average_overall_performance = mean_rounded(&overalls);
  summary
}

// ─── Archived goals ──────────────────────────────────────────────────────────

/// A terminal (mastered or discontinued) assignment as shown in the
/// archived-goals view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedGoal {
  pub assignment_id: Uuid,
  pub goal_id:       Uuid,
  pub category:      String,
  pub description:   String,
  pub status:        GoalStatus,
  /// Accuracy at the required level over the trailing report window;
  /// falls back to the rate stamped at transition time.
  pub success_rate:  u8,
  pub status_date:   Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason:        Option<String>,
}

/// The client's terminal assignments, with their success rate recomputed
/// from the trailing report window.
pub async fn archived_goals<S: PracticeStore>(
  store: &S,
  client_id: Uuid,
  now: DateTime<Utc>,
) -> Result<Vec<ArchivedGoal>, S::Error> {
  let assignments = store.goal_assignments(client_id).await?;
  let window_start = now - Days::new(REPORT_WINDOW_DAYS);
  let collections =
    store.collections_in_window(client_id, window_start, now).await?;

  let mut archived = Vec::new();
  for assignment in &assignments.entries {
    if !assignment.goal_status.is_terminal() {
      continue;
    }
    let Some(goal) = store.get_goal(assignment.goal_id).await? else {
      continue;
    };

    let trials: Vec<_> = collections
      .iter()
      .flat_map(|c| c.trials.iter())
      .filter(|t| t.goal_id == goal.goal_id)
      .cloned()
      .collect();
    let recomputed = if trials.is_empty() {
      assignment.success_rate.unwrap_or(0)
    } else {
      overall_at_level(&trials, goal.criteria.support_level)
    };

    archived.push(ArchivedGoal {
      assignment_id: assignment.assignment_id,
      goal_id:       goal.goal_id,
      category:      goal.category,
      description:   goal.description,
      status:        assignment.goal_status,
      success_rate:  recomputed,
      status_date:   assignment.status_date,
      reason:        assignment.reason.clone(),
    });
  }
  Ok(archived)
}

// ─── Clinical notes ──────────────────────────────────────────────────────────

/// Assemble the clinical-note input for a session from its latest data
/// collection. Returns `None` when the session, its client, or its
/// collection does not exist.
pub async fn note_request<S: PracticeStore>(
  store: &S,
  session_id: Uuid,
  now: DateTime<Utc>,
) -> Result<Option<NoteRequest>, S::Error> {
  let Some(session) = store.get_session(session_id).await? else {
    return Ok(None);
  };
  let Some(collection) = store.latest_collection(session_id).await? else {
    return Ok(None);
  };
  let Some(client) = store.get_client(session.client_id).await? else {
    return Ok(None);
  };

  let mut goals = Vec::new();
  for trial in &collection.trials {
    if goals.iter().any(|g: &crate::goal::GoalDefinition| {
      g.goal_id == trial.goal_id
    }) {
      continue;
    }
    if let Some(goal) = store.get_goal(trial.goal_id).await? {
      goals.push(goal);
    }
  }

  let profile = NoteClientProfile {
    client_id: client.client_id,
    name:      client.name.clone(),
    age:       client.age(now.date_naive()),
    diagnosis: client.diagnosis.clone(),
  };

  Ok(Some(build_note_request(&session, &collection, &goals, profile)))
}
