//! CSV rendering for Floortrack exports.
//!
//! Converts already-computed audit trails and progress aggregates into CSV
//! documents. Pure synchronous; no HTTP or database dependencies, and no
//! mastery math — the engine hands this crate finished numbers.

mod csv;

pub use csv::{audit_log_csv, goal_progress_csv};
