//! Trial records — the fundamental unit of session data collection.
//!
//! A trial record captures everything observed for one goal during one
//! client visit: the per-support-level count triples, the total
//! opportunities, and the opportunity counter. Records are written once at
//! data-collection time and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::support::{SupportBreakdown, SupportLevel, SupportPercentages};

// ─── TrialRecord ─────────────────────────────────────────────────────────────

/// One goal's observed data for one session. Immutable history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
  pub goal_id:     Uuid,
  pub support:     SupportBreakdown,
  /// Total opportunities attempted this session.
  pub total:       u32,
  /// Raw opportunity counter from the data-collection UI.
  pub counter:     u32,
  /// Server-assigned; copied from the owning data collection.
  pub recorded_at: DateTime<Utc>,
}

impl TrialRecord {
  /// Session accuracy at one support level, or `None` when that level
  /// recorded no opportunities.
  pub fn level_percentage(&self, level: SupportLevel) -> Option<u8> {
    self.support.level(level).percentage()
  }

  /// Session accuracy across all support levels combined.
  ///
  /// Always derived server-side from the counts; the client-submitted
  /// accuracy figure is not stored or trusted.
  pub fn derived_accuracy(&self) -> u8 {
    let count = self.support.independent.count
      + self.support.minimal.count
      + self.support.moderate.count;
    if count == 0 {
      return 0;
    }
    let success = (self.support.independent.success
      + self.support.minimal.success
      + self.support.moderate.success)
      .min(count);
    (f64::from(success) / f64::from(count) * 100.0).round() as u8
  }

  pub fn percentages(&self) -> SupportPercentages { self.support.percentages() }
}

/// One entry in a data-collection submission.
/// `recorded_at` is assigned by the store, not accepted from callers.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrialRecord {
  pub goal_id: Uuid,
  #[serde(default)]
  pub support: SupportBreakdown,
  #[serde(default)]
  pub total:   u32,
  #[serde(default)]
  pub counter: u32,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::support::LevelCounts;

  fn record(support: SupportBreakdown) -> TrialRecord {
    TrialRecord {
      goal_id: Uuid::new_v4(),
      support,
      total: 10,
      counter: 10,
      recorded_at: Utc::now(),
    }
  }

  #[test]
  fn derived_accuracy_spans_all_levels() {
    let trial = record(SupportBreakdown {
      independent: LevelCounts::new(5, 4),
      minimal:     LevelCounts::new(3, 1),
      moderate:    LevelCounts::new(2, 2),
    });
    // 7 successes over 10 opportunities.
    assert_eq!(trial.derived_accuracy(), 70);
  }

  #[test]
  fn derived_accuracy_of_empty_breakdown_is_zero() {
    assert_eq!(record(SupportBreakdown::default()).derived_accuracy(), 0);
  }

  #[test]
  fn level_percentage_is_none_without_data() {
    let trial = record(SupportBreakdown {
      independent: LevelCounts::new(4, 4),
      ..Default::default()
    });
    assert_eq!(trial.level_percentage(SupportLevel::Independent), Some(100));
    assert_eq!(trial.level_percentage(SupportLevel::Minimal), None);
  }
}
