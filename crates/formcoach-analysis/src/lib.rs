//! # FormCoach Analysis
//!
//! Real-time form analysis for one exercise session.
//!
//! ## Per-frame pipeline
//!
//! ```text
//! PoseSnapshot ─┬─▶ RepTracker ──phase──▶ ViolationDetector ─▶ FormScorer ─▶ FormFeedback
//!               │        │
//!               │        └─rep completed─▶ RepWindow ─▶ RepAnalysis ─▶ SessionAggregator
//!               └─▶ standing reference (first confident idle pose)
//! ```
//!
//! ## Repetition phases
//!
//! - **Idle**: at the rest extreme; rest-phase rules apply
//! - **MovingToTarget**: past the threshold, hold not yet satisfied
//! - **HoldingTarget**: held at the target extreme; target-phase rules apply
//! - **Returning**: receding from the peak; completion when back under threshold
//!
//! A [`FormSession`] never fails on frame data: missing landmarks make rules
//! unassessable, long occlusion resets the tracker, and unknown exercise
//! names resolve to fallback rules.

pub mod analyzer;
pub mod config;
pub mod cooldown;
pub mod detector;
pub mod scorer;
pub mod session;
pub mod stream;
pub mod tracker;

pub use analyzer::*;
pub use config::*;
pub use cooldown::*;
pub use detector::*;
pub use scorer::*;
pub use session::*;
pub use stream::*;
pub use tracker::*;
