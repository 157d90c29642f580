//! Vote Module
//!
//! Normalized vote records and their sources:
//! - Decoding of vote and slot notifications
//! - Slot ancestry tracking for fork membership

pub mod ancestry;
pub mod decoder;
pub mod types;

pub use ancestry::{AncestryIndex, Recorded};
pub use decoder::{decode_slot_update, decode_vote, DecodeError, SlotUpdate};
pub use types::{ReportedLockout, Vote};
