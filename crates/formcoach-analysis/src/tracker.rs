//! Repetition-phase state machine.
//!
//! ## States
//!
//! ```text
//! Idle ──past threshold──▶ MovingToTarget ──held ≥ holdTimeMs──▶ HoldingTarget
//!  ▲                            │                                    │
//!  │◀──────back under threshold─┘                  receded from peak │
//!  │                                                                 ▼
//!  └──────────────back under threshold (rep completed)───────── Returning
//! ```
//!
//! Displacement is measured along the rule's axis relative to a reference
//! position and signed so that positive values point toward the target
//! extreme. While idle, the reference follows the key joint whenever it moves
//! away from the target, so a rep is always counted from the rest extreme.

use formcoach_core::geometry::preferred_side;
use formcoach_core::{PoseSnapshot, Side, Timestamp};
use formcoach_rules::{Phase, RepDetectionRule};
use serde::{Deserialize, Serialize};

/// Tracker configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Key-joint confidence below which a frame is skipped
    pub min_confidence: f32,
    /// Consecutive skipped frames tolerated before the tracker resets
    pub max_skipped_frames: u32,
    /// Fraction of the threshold the joint must recede from its peak to enter `Returning`
    pub return_fraction: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            max_skipped_frames: 15,
            return_fraction: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepState {
    Idle,
    MovingToTarget,
    HoldingTarget,
    Returning,
}

impl RepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepState::Idle => "idle",
            RepState::MovingToTarget => "moving_to_target",
            RepState::HoldingTarget => "holding_target",
            RepState::Returning => "returning",
        }
    }
}

/// Emitted once per completed repetition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepCompleted {
    /// Zero-based index of the repetition within the session
    pub rep_index: u32,
    /// Frame on which the tracker left `Idle`
    pub started_at: Timestamp,
    pub completed_at: Timestamp,
}

pub struct RepTracker {
    rule: RepDetectionRule,
    config: TrackerConfig,
    state: RepState,
    /// Side the key joint is read from, fixed while a reference exists
    side: Option<Side>,
    reference: Option<f64>,
    displacement: Option<f64>,
    peak: f64,
    past_threshold_since: Option<Timestamp>,
    rep_started_at: Option<Timestamp>,
    skipped_frames: u32,
    rep_count: u32,
}

impl RepTracker {
    pub fn new(rule: RepDetectionRule, config: TrackerConfig) -> Self {
        Self {
            rule,
            config,
            state: RepState::Idle,
            side: None,
            reference: None,
            displacement: None,
            peak: 0.0,
            past_threshold_since: None,
            rep_started_at: None,
            skipped_frames: 0,
            rep_count: 0,
        }
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    /// Last measured displacement toward the target extreme
    pub fn displacement(&self) -> Option<f64> {
        self.displacement
    }

    pub fn reference(&self) -> Option<f64> {
        self.reference
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn is_in_rep(&self) -> bool {
        self.state != RepState::Idle
    }

    /// Movement phase for rule scoping. Transitions between the two extremes
    /// have no phase, so only phase-`all` rules apply there.
    pub fn phase(&self) -> Option<Phase> {
        match self.state {
            RepState::Idle => Some(self.rule.direction.rest_phase()),
            RepState::HoldingTarget => Some(self.rule.direction.target_phase()),
            RepState::MovingToTarget | RepState::Returning => None,
        }
    }

    /// Advance the machine by one frame
    pub fn process(&mut self, snapshot: &PoseSnapshot) -> Option<RepCompleted> {
        let Some((side, position)) = self.key_position(snapshot) else {
            self.skip_frame();
            return None;
        };
        self.skipped_frames = 0;

        let Some(reference) = self.reference else {
            self.establish_reference(side, position);
            return None;
        };

        let toward = (position - reference) * self.rule.direction.target_sign();
        self.displacement = Some(toward);
        let now = snapshot.timestamp;
        let threshold = self.rule.threshold;

        match self.state {
            RepState::Idle => {
                if toward >= threshold {
                    self.peak = toward;
                    self.past_threshold_since = Some(now);
                    self.rep_started_at = Some(now);
                    self.transition(RepState::MovingToTarget);
                } else if toward < 0.0 {
                    self.reference = Some(position);
                    self.displacement = Some(0.0);
                }
            }
            RepState::MovingToTarget => {
                if toward < threshold {
                    tracing::debug!("Movement fell back before hold time, no rep");
                    self.clear_rep();
                    self.transition(RepState::Idle);
                } else {
                    self.peak = self.peak.max(toward);
                    let since = self.past_threshold_since.unwrap_or(now);
                    if now.millis_since(since) >= self.rule.hold_time_ms {
                        self.transition(RepState::HoldingTarget);
                    }
                }
            }
            RepState::HoldingTarget => {
                self.peak = self.peak.max(toward);
                if toward < threshold {
                    return Some(self.complete(now, position));
                }
                if self.peak - toward >= self.config.return_fraction * threshold {
                    self.transition(RepState::Returning);
                }
            }
            RepState::Returning => {
                if toward < threshold {
                    return Some(self.complete(now, position));
                }
                if toward > self.peak {
                    self.peak = toward;
                    self.transition(RepState::HoldingTarget);
                }
            }
        }

        None
    }

    /// Drop all motion state; the next confident frame sets a new reference.
    /// The rep count is kept.
    pub fn reset(&mut self) {
        self.state = RepState::Idle;
        self.side = None;
        self.reference = None;
        self.displacement = None;
        self.skipped_frames = 0;
        self.clear_rep();
    }

    fn key_position(&self, snapshot: &PoseSnapshot) -> Option<(Side, f64)> {
        let side = self.side.unwrap_or_else(|| preferred_side(snapshot));
        let landmark = self.rule.key_joint.resolve(side);
        let point = snapshot.visible(landmark, self.config.min_confidence)?;
        Some((side, self.rule.axis.component(point)))
    }

    fn establish_reference(&mut self, side: Side, position: f64) {
        self.side = Some(side);
        self.reference = Some(position);
        self.displacement = Some(0.0);
        tracing::debug!(
            "Rep reference set: {} at {:.3}",
            self.rule.key_joint.resolve(side),
            position
        );
    }

    fn skip_frame(&mut self) {
        self.skipped_frames += 1;
        if self.skipped_frames > self.config.max_skipped_frames {
            if self.reference.is_some() {
                tracing::warn!(
                    "Key joint unseen for {} frames, resetting rep tracker",
                    self.skipped_frames
                );
            }
            self.reset();
        }
    }

    fn complete(&mut self, now: Timestamp, position: f64) -> RepCompleted {
        let event = RepCompleted {
            rep_index: self.rep_count,
            started_at: self.rep_started_at.unwrap_or(now),
            completed_at: now,
        };
        self.rep_count += 1;
        self.reference = Some(position);
        self.displacement = Some(0.0);
        self.clear_rep();
        self.transition(RepState::Idle);
        event
    }

    fn clear_rep(&mut self) {
        self.peak = 0.0;
        self.past_threshold_since = None;
        self.rep_started_at = None;
    }

    fn transition(&mut self, next: RepState) {
        if self.state != next {
            tracing::debug!("Rep state {} -> {}", self.state.as_str(), next.as_str());
            self.state = next;
        }
    }
}
