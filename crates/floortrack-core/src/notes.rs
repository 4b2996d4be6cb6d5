//! Clinical-note input assembly.
//!
//! Builds the structured payload handed to the note-generation collaborator:
//! everything a narrative needs (client summary, per-goal performance,
//! session context) with the numbers already computed server-side. Actual
//! text generation is out of scope; this module only assembles inputs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  goal::{GoalDefinition, MasteryCriteria},
  progress::highest_fedc,
  session::{DataCollection, SessionRecord, has_client_variables},
  support::SupportPercentages,
  trial::TrialRecord,
};

// ─── Note inputs ─────────────────────────────────────────────────────────────

/// Client context for the note: identity stripped down to what the
/// narrative needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteClientProfile {
  pub client_id: Uuid,
  pub name:      String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub age:       Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub diagnosis: Option<String>,
}

/// One goal's performance within the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteGoalInput {
  pub goal_id:     Uuid,
  pub category:    String,
  pub description: String,
  pub criteria:    MasteryCriteria,
  /// Session accuracy across all levels, derived from the counts.
  pub accuracy:    u8,
  pub levels:      SupportPercentages,
  pub total:       u32,
}

/// The full structured input for one session's clinical note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRequest {
  pub session_id:           Uuid,
  pub client:               NoteClientProfile,
  pub session_type:         String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration_minutes:     Option<i64>,
  pub goals:                Vec<NoteGoalInput>,
  /// The numerically highest FEDC level among the session's goals.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub highest_fedc:         Option<u8>,
  pub activities_engaged:   Vec<String>,
  pub supports_observed:    Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub provider_observation: Option<String>,
  /// Flagged when observations or session variables mention client
  /// variables (illness, sleep, ...).
  pub has_client_variables: bool,
}

/// Assemble a [`NoteRequest`] from a session, its data collection, and the
/// resolved goal definitions for the trials in the batch. Trials whose goal
/// is missing from `goals` are skipped rather than failing the note.
pub fn build_note_request(
  session: &SessionRecord,
  collection: &DataCollection,
  goals: &[GoalDefinition],
  client: NoteClientProfile,
) -> NoteRequest {
  let goal_inputs: Vec<NoteGoalInput> = collection
    .trials
    .iter()
    .filter_map(|trial| {
      let goal = goals.iter().find(|g| g.goal_id == trial.goal_id)?;
      Some(goal_input(goal, trial))
    })
    .collect();

  let highest = highest_fedc(goal_inputs.iter().map(|g| g.category.as_str()));

  let observation_flags = collection
    .provider_observation
    .as_deref()
    .is_some_and(has_client_variables);
  let session_flags = session
    .client_variables
    .as_deref()
    .is_some_and(has_client_variables);

  NoteRequest {
    session_id: session.session_id,
    client,
    session_type: session_type_label(session),
    duration_minutes: session.duration_minutes().or_else(|| {
      collection.duration_secs.map(|secs| i64::from(secs) / 60)
    }),
    goals: goal_inputs,
    highest_fedc: highest,
    activities_engaged: collection.activities_engaged.clone(),
    supports_observed: collection.supports_observed.clone(),
    provider_observation: collection.provider_observation.clone(),
    has_client_variables: observation_flags || session_flags,
  }
}

fn goal_input(goal: &GoalDefinition, trial: &TrialRecord) -> NoteGoalInput {
  NoteGoalInput {
    goal_id:     goal.goal_id,
    category:    goal.category.clone(),
    description: goal.description.clone(),
    criteria:    goal.criteria,
    accuracy:    trial.derived_accuracy(),
    levels:      trial.percentages(),
    total:       trial.total,
  }
}

fn session_type_label(session: &SessionRecord) -> String {
  match session.session_type {
    crate::session::SessionType::ProgressMonitoring => {
      "Progress Monitoring".to_owned()
    }
    crate::session::SessionType::BaselineDataCollection => {
      "Baseline Data Collection".to_owned()
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{
    session::SessionType,
    support::{LevelCounts, SupportBreakdown, SupportLevel},
  };

  fn goal(category: &str) -> GoalDefinition {
    GoalDefinition {
      goal_id:          Uuid::new_v4(),
      organization_id:  Uuid::new_v4(),
      category:         category.to_owned(),
      description:      "test goal".into(),
      criteria:         MasteryCriteria::new(
        80,
        None,
        SupportLevel::Independent,
      )
      .unwrap(),
      mastery_baseline: None,
      created_at:       Utc::now(),
    }
  }

  fn trial_for(goal_id: Uuid) -> TrialRecord {
    TrialRecord {
      goal_id,
      support: SupportBreakdown {
        independent: LevelCounts::new(5, 4),
        ..Default::default()
      },
      total: 5,
      counter: 5,
      recorded_at: Utc::now(),
    }
  }

  fn fixture(
    goals: Vec<GoalDefinition>,
    observation: Option<&str>,
  ) -> (SessionRecord, DataCollection) {
    let now = Utc::now();
    let session = SessionRecord {
      session_id:       Uuid::new_v4(),
      client_id:        Uuid::new_v4(),
      provider_id:      Uuid::new_v4(),
      organization_id:  Uuid::new_v4(),
      session_type:     SessionType::ProgressMonitoring,
      date_of_session:  now.date_naive(),
      start_time:       None,
      end_time:         None,
      client_variables: None,
      created_at:       now,
    };
    let collection = DataCollection {
      collection_id:        Uuid::new_v4(),
      session_id:           session.session_id,
      client_id:            session.client_id,
      organization_id:      session.organization_id,
      trials:               goals.iter().map(|g| trial_for(g.goal_id)).collect(),
      activities_engaged:   vec!["sensory play".into()],
      supports_observed:    vec!["visual schedule".into()],
      duration_secs:        Some(2700),
      provider_observation: observation.map(str::to_owned),
      recorded_at:          now,
    };
    (session, collection)
  }

  fn profile() -> NoteClientProfile {
    NoteClientProfile {
      client_id: Uuid::new_v4(),
      name:      "Test Client".into(),
      age:       Some(6),
      diagnosis: None,
    }
  }

  #[test]
  fn request_carries_highest_fedc_and_derived_accuracy() {
    let goals = vec![
      goal("FEDC_3 - Two-Way Communication"),
      goal("FEDC_7 - Multi-Causal Thinking"),
    ];
    let (session, collection) = fixture(goals.clone(), None);

    let request = build_note_request(&session, &collection, &goals, profile());
    assert_eq!(request.highest_fedc, Some(7));
    assert_eq!(request.goals.len(), 2);
    assert_eq!(request.goals[0].accuracy, 80);
    // No start/end times; duration falls back to the collection's seconds.
    assert_eq!(request.duration_minutes, Some(45));
  }

  #[test]
  fn trials_without_a_resolved_goal_are_skipped() {
    let goals = vec![goal("FEDC_2 - Engagement & Relating")];
    let (session, mut collection) = fixture(goals.clone(), None);
    collection.trials.push(trial_for(Uuid::new_v4()));

    let request = build_note_request(&session, &collection, &goals, profile());
    assert_eq!(request.goals.len(), 1);
  }

  #[test]
  fn variable_keywords_in_observation_set_the_flag() {
    let goals = vec![goal("FEDC_1 - Shared Attention & Regulation")];
    let (session, collection) =
      fixture(goals.clone(), Some("client was tired after school"));

    let request = build_note_request(&session, &collection, &goals, profile());
    assert!(request.has_client_variables);
  }
}
