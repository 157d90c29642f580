//! Tower Module
//!
//! Per-validator lockout state:
//! - Lockout arithmetic and tower entries
//! - The stack update rule and its outcomes
//! - A keyed store with per-validator exclusive updates

pub mod entry;
pub mod outcome;
pub mod state;
pub mod tracker;

pub use entry::{expiration, lockout, TowerEntry, MAX_LOCKOUT_HISTORY};
pub use outcome::{RejectReason, UpdateOutcome, Violation};
pub use state::{RecentVote, Tower, TowerSnapshot};
pub use tracker::TowerTracker;
