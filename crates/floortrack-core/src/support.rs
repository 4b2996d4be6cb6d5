//! Support levels and per-level trial counts.
//!
//! Every trial is tagged with the degree of assistance the provider gave:
//! independent, minimal, or moderate. Each level is tracked separately with
//! its own `{count, success, miss}` triple, and mastery is only ever judged
//! at a goal's *required* level.

use serde::{Deserialize, Serialize};

// ─── SupportLevel ────────────────────────────────────────────────────────────

/// The degree of assistance provided during a trial. Wire labels follow the
/// clinic vocabulary ("Minimal Support", not "minimal").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportLevel {
  #[serde(rename = "Independent")]
  Independent,
  #[serde(rename = "Minimal Support")]
  Minimal,
  #[serde(rename = "Moderate Support")]
  Moderate,
}

impl SupportLevel {
  pub const ALL: [SupportLevel; 3] =
    [Self::Independent, Self::Minimal, Self::Moderate];

  /// The display label, identical to the serialized form.
  pub fn label(self) -> &'static str {
    match self {
      Self::Independent => "Independent",
      Self::Minimal => "Minimal Support",
      Self::Moderate => "Moderate Support",
    }
  }
}

// ─── LevelCounts ─────────────────────────────────────────────────────────────

/// Raw opportunity counts for one support level within one session.
///
/// `miss` is optional on the wire; when absent it is derived as
/// `count - success` (clamped to zero). Malformed data — `success > count`
/// — degrades to a 100% session rather than raising.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
  /// Missing counts deserialize as zero: a level object without data is
  /// absence of evidence, not a malformed submission.
  #[serde(default)]
  pub count:   u32,
  #[serde(default)]
  pub success: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub miss:    Option<u32>,
}

impl LevelCounts {
  pub fn new(count: u32, success: u32) -> Self {
    Self { count, success, miss: None }
  }

  /// `miss`, derived from `count - success` when not independently tracked.
  pub fn derived_miss(&self) -> u32 {
    self
      .miss
      .unwrap_or_else(|| self.count.saturating_sub(self.success))
  }

  /// Success percentage rounded to the nearest integer, or `None` when this
  /// level recorded no opportunities. A `count == 0` level is *absence of
  /// evidence*, never a 0% data point.
  pub fn percentage(&self) -> Option<u8> {
    if self.count == 0 {
      return None;
    }
    let success = self.success.min(self.count);
    Some((f64::from(success) / f64::from(self.count) * 100.0).round() as u8)
  }
}

// ─── SupportBreakdown ────────────────────────────────────────────────────────

/// The three per-level count triples recorded for one goal in one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportBreakdown {
  #[serde(default)]
  pub independent: LevelCounts,
  #[serde(default)]
  pub minimal:     LevelCounts,
  #[serde(default)]
  pub moderate:    LevelCounts,
}

impl SupportBreakdown {
  pub fn level(&self, level: SupportLevel) -> &LevelCounts {
    match level {
      SupportLevel::Independent => &self.independent,
      SupportLevel::Minimal => &self.minimal,
      SupportLevel::Moderate => &self.moderate,
    }
  }

  /// Chart-friendly percentages: levels with no data render as 0.
  pub fn percentages(&self) -> SupportPercentages {
    SupportPercentages {
      independent: self.independent.percentage().unwrap_or(0),
      minimal:     self.minimal.percentage().unwrap_or(0),
      moderate:    self.moderate.percentage().unwrap_or(0),
    }
  }
}

/// Per-level percentages for display. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportPercentages {
  pub independent: u8,
  pub minimal:     u8,
  pub moderate:    u8,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn percentage_rounds_to_nearest_integer() {
    // 2/3 → 67, not 66.
    assert_eq!(LevelCounts::new(3, 2).percentage(), Some(67));
    assert_eq!(LevelCounts::new(6, 5).percentage(), Some(83));
    assert_eq!(LevelCounts::new(5, 4).percentage(), Some(80));
  }

  #[test]
  fn zero_count_has_no_percentage() {
    assert_eq!(LevelCounts::new(0, 0).percentage(), None);
  }

  #[test]
  fn missing_miss_is_derived_and_clamped() {
    // Scenario E: count 3, success 3, no miss → miss 0, 100%.
    let counts = LevelCounts::new(3, 3);
    assert_eq!(counts.derived_miss(), 0);
    assert_eq!(counts.percentage(), Some(100));

    // Malformed success > count clamps instead of overflowing.
    let bad = LevelCounts::new(2, 5);
    assert_eq!(bad.derived_miss(), 0);
    assert_eq!(bad.percentage(), Some(100));
  }

  #[test]
  fn explicit_miss_wins_over_derivation() {
    let counts = LevelCounts { count: 5, success: 3, miss: Some(1) };
    assert_eq!(counts.derived_miss(), 1);
  }

  #[test]
  fn support_level_labels_roundtrip_serde() {
    let json = serde_json::to_string(&SupportLevel::Minimal).unwrap();
    assert_eq!(json, "\"Minimal Support\"");
    let back: SupportLevel = serde_json::from_str(&json).unwrap();
    assert_eq!(back, SupportLevel::Minimal);
  }
}
