//! Violation Detector
//!
//! Classifies violated tower updates and renders their evidence.

pub mod classify;
pub mod report;

pub use classify::{classify, detect, DetectedViolation, ViolationKind};
pub use report::explain;
