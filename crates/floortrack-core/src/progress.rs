//! The goal progress engine: mastery evaluation, rolling accuracy,
//! trend classification, support-level aggregation, and FEDC statistics.
//!
//! Everything here is pure computation over trial records. Orchestration
//! against a store (fetching the last N sessions, persisting transitions)
//! lives in [`crate::engine`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  client::GoalStatus,
  goal::{FedcBand, MasteryCriteria, fedc_level},
  support::{SupportLevel, SupportPercentages},
  trial::TrialRecord,
};

// ─── Mastery evaluation ──────────────────────────────────────────────────────

/// Outcome of evaluating a goal's mastery contract against its most recent
/// sessions. "Not ready yet" is a value here, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MasteryOutcome {
  /// Fewer than the required number of sessions carry data at the required
  /// support level. Judgment is deferred; status must not change.
  InsufficientEvidence { valid_sessions: u32 },
  /// Enough evidence, but the rolling average is below the threshold.
  BelowThreshold { overall: u8 },
  /// The mastery contract is satisfied.
  Mastered { overall: u8 },
}

impl MasteryOutcome {
  /// The computed rolling average, when there was enough evidence to
  /// compute one.
  pub fn overall(&self) -> Option<u8> {
    match *self {
      Self::InsufficientEvidence { .. } => None,
      Self::BelowThreshold { overall } | Self::Mastered { overall } => {
        Some(overall)
      }
    }
  }
}

/// Evaluate a mastery contract against the most recent sessions' trial
/// records for one (client, goal) pair, ordered chronologically.
///
/// Each session contributes its percentage at the *required* support level
/// only. A session whose required level has `count == 0` carries no data
/// point and is excluded from the average — insufficient evidence is not
/// failure, and absence is never treated as 0%.
pub fn evaluate_mastery(
  criteria: &MasteryCriteria,
  sessions: &[TrialRecord],
) -> MasteryOutcome {
  let required = criteria.required_sessions();

  let points: Vec<u8> = sessions
    .iter()
    .filter_map(|trial| trial.level_percentage(criteria.support_level))
    .collect();

  if (points.len() as u32) < required {
    return MasteryOutcome::InsufficientEvidence {
      valid_sessions: points.len() as u32,
    };
  }

  let overall = mean_rounded(&points);
  if overall >= criteria.mastery_percentage {
    MasteryOutcome::Mastered { overall }
  } else {
    MasteryOutcome::BelowThreshold { overall }
  }
}

/// Arithmetic mean rounded to the nearest integer; 0 for an empty slice.
pub fn mean_rounded(values: &[u8]) -> u8 {
  if values.is_empty() {
    return 0;
  }
  let sum: u32 = values.iter().map(|&v| u32::from(v)).sum();
  (f64::from(sum) / values.len() as f64).round() as u8
}

// ─── Trend classification ────────────────────────────────────────────────────

/// Window size for trend comparison.
const TREND_WINDOW: usize = 3;
/// Percentage-point delta beyond which the trend is no longer "stable".
const TREND_DELTA: i32 = 5;

/// Direction of recent performance. Purely informational — trend never
/// affects mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
  Improving,
  Declining,
  Stable,
}

/// Compare the mean of the last 3 points against the mean of an equal-sized
/// earlier window. Too few points to form both windows → stable.
pub fn classify_trend(points: &[u8]) -> Trend {
  if points.len() < 2 {
    return Trend::Stable;
  }

  let recent = &points[points.len().saturating_sub(TREND_WINDOW)..];
  let older_len = TREND_WINDOW.min(points.len() - recent.len());
  if older_len == 0 {
    return Trend::Stable;
  }
  let older = &points[..older_len];

  let delta = i32::from(mean_rounded(recent)) - i32::from(mean_rounded(older));
  if delta > TREND_DELTA {
    Trend::Improving
  } else if delta < -TREND_DELTA {
    Trend::Declining
  } else {
    Trend::Stable
  }
}

// ─── Support-level aggregation ───────────────────────────────────────────────

/// Opportunity totals for one support level across many sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTotals {
  pub total:   u32,
  pub success: u32,
}

/// Aggregated per-level totals across a set of sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTotals {
  pub independent: LevelTotals,
  pub minimal:     LevelTotals,
  pub moderate:    LevelTotals,
}

/// Sum raw counts across sessions, per support level.
pub fn aggregate_support_levels<'a>(
  trials: impl IntoIterator<Item = &'a TrialRecord>,
) -> SupportTotals {
  let mut totals = SupportTotals::default();
  for trial in trials {
    for level in SupportLevel::ALL {
      let counts = trial.support.level(level);
      let slot = match level {
        SupportLevel::Independent => &mut totals.independent,
        SupportLevel::Minimal => &mut totals.minimal,
        SupportLevel::Moderate => &mut totals.moderate,
      };
      slot.total += counts.count;
      slot.success += counts.success;
    }
  }
  totals
}

// ─── FEDC statistics ─────────────────────────────────────────────────────────

/// Organization-wide distribution of active goals across developmental
/// bands, as rounded percentage shares of the parseable total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FedcDistribution {
  /// FEDC 1–3.
  pub low:         u8,
  /// FEDC 4–6.
  pub mid:         u8,
  /// FEDC 7–9.
  pub high:        u8,
  /// Goals whose category parsed to a level. Unparseable categories are
  /// excluded entirely and do not inflate any denominator.
  pub total_goals: u32,
}

/// Bucket FEDC categories into 1-3/4-6/7-9 bands.
pub fn fedc_distribution<'a>(
  categories: impl IntoIterator<Item = &'a str>,
) -> FedcDistribution {
  let mut counts = [0u32; 3];
  for category in categories {
    let Some(level) = fedc_level(category) else { continue };
    let Some(band) = FedcBand::from_level(level) else { continue };
    let idx = match band {
      FedcBand::Low => 0,
      FedcBand::Mid => 1,
      FedcBand::High => 2,
    };
    counts[idx] += 1;
  }

  let total: u32 = counts.iter().sum();
  let share = |n: u32| {
    if total == 0 {
      0
    } else {
      (f64::from(n) / f64::from(total) * 100.0).round() as u8
    }
  };

  FedcDistribution {
    low:         share(counts[0]),
    mid:         share(counts[1]),
    high:        share(counts[2]),
    total_goals: total,
  }
}

/// The numerically highest FEDC level observed across a session's goals;
/// used as session-level metadata for clinical note generation.
pub fn highest_fedc<'a>(
  categories: impl IntoIterator<Item = &'a str>,
) -> Option<u8> {
  categories.into_iter().filter_map(fedc_level).max()
}

/// Per-category observation count for the progress report, sorted by
/// parsed FEDC level (unparseable categories sort last).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FedcObservation {
  pub category:     String,
  pub observations: u32,
  /// Share of total sessions in the window, rounded.
  pub percentage:   u8,
}

pub fn sort_fedc_observations(observations: &mut [FedcObservation]) {
  observations
    .sort_by_key(|o| fedc_level(&o.category).map(u32::from).unwrap_or(u32::MAX));
}

// ─── Progress report types ───────────────────────────────────────────────────

/// One session's data point in a goal's progress chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPoint {
  pub date:          DateTime<Utc>,
  /// Accuracy across all levels, derived server-side from counts.
  pub accuracy:      u8,
  pub levels:        SupportPercentages,
  pub total:         u32,
  /// Flagged when the provider observation mentions client variables.
  pub has_variables: bool,
}

/// Rolled-up progress for one ITP goal over the report window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalProgress {
  pub goal_id:                Uuid,
  pub category:               String,
  pub description:            String,
  pub baseline:               u8,
  pub target:                 u8,
  pub required_support_level: SupportLevel,
  pub sessions:               Vec<SessionPoint>,
  /// Rolling average at the required support level over the window.
  pub overall:                u8,
  pub trend:                  Trend,
  pub status:                 GoalStatus,
  pub total_sessions:         u32,
}

/// Per-status counts plus the average of per-goal overall figures.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProgressSummary {
  pub average_overall_performance: u8,
  pub goals_in_progress:           u32,
  pub goals_mastered:              u32,
  pub goals_discontinued:          u32,
}

/// The read model for the progress-report endpoint. Assembled on demand,
/// never stored, and never mutates goal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
  pub client_id:         Uuid,
  pub client_name:       String,
  pub client_age:        Option<u32>,
  pub diagnosis:         Option<String>,
  pub window_start:      DateTime<Utc>,
  pub window_end:        DateTime<Utc>,
  pub total_sessions:    u32,
  pub goals:             Vec<GoalProgress>,
  pub fedc_observations: Vec<FedcObservation>,
  pub summary:           ProgressSummary,
}

/// Rolling average at one support level over a set of session trials,
/// applying the same exclusion rule as the mastery engine: sessions with no
/// data at that level contribute nothing.
pub fn overall_at_level(trials: &[TrialRecord], level: SupportLevel) -> u8 {
  let points: Vec<u8> = trials
    .iter()
    .filter_map(|t| t.level_percentage(level))
    .collect();
  mean_rounded(&points)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::support::{LevelCounts, SupportBreakdown};

  fn trial(independent: (u32, u32)) -> TrialRecord {
    TrialRecord {
      goal_id:     Uuid::new_v4(),
      support:     SupportBreakdown {
        independent: LevelCounts::new(independent.0, independent.1),
        ..Default::default()
      },
      total:       independent.0,
      counter:     independent.0,
      recorded_at: Utc::now(),
    }
  }

  fn criteria(percentage: u8, sessions: Option<u32>) -> MasteryCriteria {
    MasteryCriteria::new(percentage, sessions, SupportLevel::Independent)
      .unwrap()
  }

  // ── Mastery ───────────────────────────────────────────────────────────────

  #[test]
  fn scenario_a_three_qualifying_sessions_master() {
    // independent 4/5, 4/4, 5/6 → 80, 100, 83 → mean 88 ≥ 80.
    let sessions = vec![trial((5, 4)), trial((4, 4)), trial((6, 5))];
    let outcome = evaluate_mastery(&criteria(80, Some(3)), &sessions);
    assert_eq!(outcome, MasteryOutcome::Mastered { overall: 88 });
  }

  #[test]
  fn scenario_b_two_valid_sessions_defer() {
    // Three sessions, but one has no independent data.
    let sessions = vec![trial((5, 4)), trial((0, 0)), trial((6, 5))];
    let outcome = evaluate_mastery(&criteria(80, Some(3)), &sessions);
    assert_eq!(
      outcome,
      MasteryOutcome::InsufficientEvidence { valid_sessions: 2 }
    );
  }

  #[test]
  fn zero_count_sessions_are_excluded_not_zero() {
    // Four sessions; the empty one must not drag the average down.
    let sessions =
      vec![trial((5, 4)), trial((0, 0)), trial((4, 4)), trial((6, 5))];
    let outcome = evaluate_mastery(&criteria(80, Some(3)), &sessions);
    assert_eq!(outcome, MasteryOutcome::Mastered { overall: 88 });
  }

  #[test]
  fn below_threshold_reports_overall() {
    let sessions = vec![trial((5, 2)), trial((5, 3)), trial((5, 2))];
    // 40, 60, 40 → mean 47.
    let outcome = evaluate_mastery(&criteria(80, Some(3)), &sessions);
    assert_eq!(outcome, MasteryOutcome::BelowThreshold { overall: 47 });
  }

  #[test]
  fn no_sessions_is_insufficient_evidence() {
    let outcome = evaluate_mastery(&criteria(80, None), &[]);
    assert_eq!(
      outcome,
      MasteryOutcome::InsufficientEvidence { valid_sessions: 0 }
    );
  }

  #[test]
  fn required_level_is_the_only_one_that_counts() {
    // Perfect moderate data, no independent data → deferral.
    let mut sessions = vec![];
    for _ in 0..3 {
      sessions.push(TrialRecord {
        goal_id:     Uuid::new_v4(),
        support:     SupportBreakdown {
          moderate: LevelCounts::new(5, 5),
          ..Default::default()
        },
        total:       5,
        counter:     5,
        recorded_at: Utc::now(),
      });
    }
    let outcome = evaluate_mastery(&criteria(80, Some(3)), &sessions);
    assert!(matches!(
      outcome,
      MasteryOutcome::InsufficientEvidence { valid_sessions: 0 }
    ));
  }

  #[test]
  fn evaluation_is_deterministic() {
    // Same inputs twice → same outcome both times.
    let sessions = vec![trial((5, 4)), trial((4, 4)), trial((6, 5))];
    let c = criteria(80, Some(3));
    assert_eq!(evaluate_mastery(&c, &sessions), evaluate_mastery(&c, &sessions));
  }

  // ── Rounding ──────────────────────────────────────────────────────────────

  #[test]
  fn mean_rounds_to_nearest_integer() {
    assert_eq!(mean_rounded(&[66, 67]), 67); // 66.5 rounds away from zero
    assert_eq!(mean_rounded(&[33, 33, 34]), 33);
    assert_eq!(mean_rounded(&[]), 0);
  }

  // ── Trend ─────────────────────────────────────────────────────────────────

  #[test]
  fn trend_improving_when_recent_window_is_higher() {
    assert_eq!(classify_trend(&[50, 52, 51, 70, 72, 74]), Trend::Improving);
  }

  #[test]
  fn trend_declining_when_recent_window_is_lower() {
    assert_eq!(classify_trend(&[80, 82, 81, 60, 58, 62]), Trend::Declining);
  }

  #[test]
  fn trend_stable_within_delta_or_without_history() {
    assert_eq!(classify_trend(&[70, 71, 69, 72, 70, 73]), Trend::Stable);
    assert_eq!(classify_trend(&[70]), Trend::Stable);
    assert_eq!(classify_trend(&[]), Trend::Stable);
    // Two points: no earlier window of equal size exists... but the
    // original compares first-vs-last-3 remainder, yielding a comparison.
    assert_eq!(classify_trend(&[50, 90]), Trend::Stable);
  }

  // ── Aggregation ───────────────────────────────────────────────────────────

  #[test]
  fn aggregate_sums_each_level_independently() {
    let a = TrialRecord {
      goal_id:     Uuid::new_v4(),
      support:     SupportBreakdown {
        independent: LevelCounts::new(5, 4),
        minimal:     LevelCounts::new(2, 1),
        moderate:    LevelCounts::new(1, 0),
      },
      total:       8,
      counter:     8,
      recorded_at: Utc::now(),
    };
    let b = TrialRecord {
      support: SupportBreakdown {
        independent: LevelCounts::new(3, 3),
        minimal:     LevelCounts::new(4, 2),
        moderate:    LevelCounts::default(),
      },
      ..a.clone()
    };

    let totals = aggregate_support_levels([&a, &b]);
    assert_eq!(totals.independent, LevelTotals { total: 8, success: 7 });
    assert_eq!(totals.minimal, LevelTotals { total: 6, success: 3 });
    assert_eq!(totals.moderate, LevelTotals { total: 1, success: 0 });
  }

  // ── FEDC ──────────────────────────────────────────────────────────────────

  #[test]
  fn scenario_d_distribution_excludes_unparseable_categories() {
    let categories = [
      "FEDC_7 - Multi-Causal Thinking",
      "FEDC_2 - Engagement & Relating",
      "FEDC 5 - Emotional Ideas",
      "General", // excluded: no bucket, no denominator
    ];
    let dist = fedc_distribution(categories);
    assert_eq!(dist.total_goals, 3);
    assert_eq!(dist.low, 33);
    assert_eq!(dist.mid, 33);
    assert_eq!(dist.high, 33);
  }

  #[test]
  fn empty_distribution_is_all_zeroes() {
    let dist = fedc_distribution(["General", "Misc"]);
    assert_eq!(dist, FedcDistribution::default());
  }

  #[test]
  fn highest_fedc_picks_the_max_parsed_level() {
    let categories =
      ["FEDC_3 - Two-Way Communication", "FEDC_7 - Multi-Causal Thinking"];
    assert_eq!(highest_fedc(categories), Some(7));
    assert_eq!(highest_fedc(["General"]), None);
    assert_eq!(highest_fedc([]), None);
  }

  #[test]
  fn observations_sort_by_parsed_level() {
    let mut obs = vec![
      FedcObservation {
        category:     "FEDC_7 - Multi-Causal Thinking".into(),
        observations: 2,
        percentage:   40,
      },
      FedcObservation {
        category:     "FEDC_1 - Shared Attention & Regulation".into(),
        observations: 3,
        percentage:   60,
      },
    ];
    sort_fedc_observations(&mut obs);
    assert!(obs[0].category.starts_with("FEDC_1"));
  }

  // ── Window rollup ─────────────────────────────────────────────────────────

  #[test]
  fn overall_at_level_skips_empty_sessions() {
    let trials = vec![trial((5, 4)), trial((0, 0)), trial((4, 4))];
    // 80 and 100; the empty session contributes nothing.
    assert_eq!(overall_at_level(&trials, SupportLevel::Independent), 90);
  }
}
