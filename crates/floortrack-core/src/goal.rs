//! Goal-bank definitions and mastery criteria.
//!
//! A goal definition is the mastery contract for a goal: the accuracy
//! threshold, the number of qualifying sessions, and the support level whose
//! accuracy counts. Definitions are immutable once trial data references
//! them; recorded history is never recomputed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, support::SupportLevel};

// ─── MasteryCriteria ─────────────────────────────────────────────────────────

/// The contract a goal must satisfy to be considered mastered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryCriteria {
  /// Accuracy threshold, 1–100.
  pub mastery_percentage: u8,
  /// Minimum qualifying sessions. `None` falls back to
  /// [`MasteryCriteria::DEFAULT_REQUIRED_SESSIONS`].
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub across_sessions:    Option<u32>,
  /// The only support tier whose accuracy counts toward mastery.
  pub support_level:      SupportLevel,
}

impl MasteryCriteria {
  pub const DEFAULT_REQUIRED_SESSIONS: u32 = 3;

  pub fn new(
    mastery_percentage: u8,
    across_sessions: Option<u32>,
    support_level: SupportLevel,
  ) -> Result<Self> {
    if !(1..=100).contains(&mastery_percentage) {
      return Err(Error::InvalidMasteryPercentage(mastery_percentage));
    }
    Ok(Self { mastery_percentage, across_sessions, support_level })
  }

  /// The effective session requirement (default 3 when unset).
  pub fn required_sessions(&self) -> u32 {
    match self.across_sessions {
      Some(0) | None => Self::DEFAULT_REQUIRED_SESSIONS,
      Some(n) => n,
    }
  }
}

// ─── GoalDefinition ──────────────────────────────────────────────────────────

/// A goal-bank entry. The FEDC category is a free-text label such as
/// `"FEDC 7 - Multi-Causal Thinking"`; the numeric level is parsed out of it
/// on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalDefinition {
  pub goal_id:          Uuid,
  pub organization_id:  Uuid,
  pub category:         String,
  pub description:      String,
  pub criteria:         MasteryCriteria,
  /// Organization-wide starting performance snapshot, if recorded.
  pub mastery_baseline: Option<u8>,
  pub created_at:       DateTime<Utc>,
}

impl GoalDefinition {
  /// The numeric FEDC level parsed from this goal's category label.
  pub fn fedc_level(&self) -> Option<u8> { fedc_level(&self.category) }
}

/// Input to [`crate::store::PracticeStore::add_goal`].
/// `goal_id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGoalDefinition {
  pub organization_id:  Uuid,
  pub category:         String,
  pub description:      String,
  pub criteria:         MasteryCriteria,
  #[serde(default)]
  pub mastery_baseline: Option<u8>,
}

// ─── FEDC parsing ────────────────────────────────────────────────────────────

/// Parse the numeric level out of a FEDC category label.
///
/// Accepts `FEDC_7`, `FEDC 7`, any case, anywhere in the string. Labels that
/// do not match carry no level and are excluded from distribution math —
/// never defaulted into a bucket.
pub fn fedc_level(category: &str) -> Option<u8> {
  let upper = category.to_ascii_uppercase();
  let idx = upper.find("FEDC")?;
  let rest = &upper[idx + 4..];

  // Exactly one separator (underscore or space) is tolerated.
  let rest = rest.strip_prefix(['_', ' ']).unwrap_or(rest);

  let digits: String =
    rest.chars().take_while(|c| c.is_ascii_digit()).collect();
  digits.parse().ok()
}

/// Developmental band for organization-wide distribution statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FedcBand {
  /// FEDC 1–3.
  Low,
  /// FEDC 4–6.
  Mid,
  /// FEDC 7–9.
  High,
}

impl FedcBand {
  pub fn from_level(level: u8) -> Option<Self> {
    match level {
      1..=3 => Some(Self::Low),
      4..=6 => Some(Self::Mid),
      7..=9 => Some(Self::High),
      _ => None,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Low => "FEDC 1-3",
      Self::Mid => "FEDC 4-6",
      Self::High => "FEDC 7-9",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn criteria_rejects_out_of_range_percentage() {
    let err = MasteryCriteria::new(0, None, SupportLevel::Independent);
    assert!(matches!(err, Err(Error::InvalidMasteryPercentage(0))));
    assert!(MasteryCriteria::new(100, None, SupportLevel::Moderate).is_ok());
  }

  #[test]
  fn required_sessions_defaults_to_three() {
    let criteria =
      MasteryCriteria::new(80, None, SupportLevel::Independent).unwrap();
    assert_eq!(criteria.required_sessions(), 3);

    let explicit =
      MasteryCriteria::new(80, Some(5), SupportLevel::Independent).unwrap();
    assert_eq!(explicit.required_sessions(), 5);

    // An explicit zero is nonsense; fall back to the default.
    let zero =
      MasteryCriteria::new(80, Some(0), SupportLevel::Independent).unwrap();
    assert_eq!(zero.required_sessions(), 3);
  }

  #[test]
  fn fedc_level_parses_underscore_and_space_forms() {
    // Scenario D.
    assert_eq!(fedc_level("FEDC_7 - Multi-Causal Thinking"), Some(7));
    assert_eq!(fedc_level("FEDC 3 - Two-Way Communication"), Some(3));
    assert_eq!(fedc_level("fedc_9"), Some(9));
  }

  #[test]
  fn fedc_level_rejects_unparseable_labels() {
    assert_eq!(fedc_level("General"), None);
    assert_eq!(fedc_level("FEDC"), None);
    assert_eq!(fedc_level("FEDC_x"), None);
  }

  #[test]
  fn bands_cover_one_through_nine() {
    assert_eq!(FedcBand::from_level(1), Some(FedcBand::Low));
    assert_eq!(FedcBand::from_level(3), Some(FedcBand::Low));
    assert_eq!(FedcBand::from_level(4), Some(FedcBand::Mid));
    assert_eq!(FedcBand::from_level(6), Some(FedcBand::Mid));
    assert_eq!(FedcBand::from_level(7), Some(FedcBand::High));
    assert_eq!(FedcBand::from_level(9), Some(FedcBand::High));
    assert_eq!(FedcBand::from_level(0), None);
    assert_eq!(FedcBand::from_level(10), None);
  }
}
