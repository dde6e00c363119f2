//! Per-violation-type feedback cooldown.
//!
//! The detector reports every violation on every frame. Surfacing the same
//! correction thirty times a second is noise, so a throttle remembers when each
//! violation type was last surfaced and holds it back until the cooldown
//! elapses.

use std::collections::HashMap;

use formcoach_core::{Timestamp, Violation, ViolationType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Minimum gap between two surfacings of the same violation type
    pub cooldown_ms: u64,
    /// Cap on instructions per frame
    pub max_instructions: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 1000,
            max_instructions: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackThrottle {
    cooldown_ms: u64,
    last_surfaced: HashMap<ViolationType, Timestamp>,
}

impl FeedbackThrottle {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last_surfaced: HashMap::new(),
        }
    }

    /// Whether `violation` may be surfaced now; marks it surfaced if so
    pub fn should_surface(&mut self, violation: &Violation) -> bool {
        let ready = match self.last_surfaced.get(&violation.violation_type) {
            Some(&last) => violation.timestamp.millis_since(last) >= self.cooldown_ms,
            None => true,
        };
        if ready {
            self.last_surfaced
                .insert(violation.violation_type, violation.timestamp);
        }
        ready
    }

    /// The violations that clear their cooldown, in input order
    pub fn filter<'a>(&mut self, violations: &'a [Violation]) -> Vec<&'a Violation> {
        violations.iter().filter(|v| self.should_surface(v)).collect()
    }

    pub fn reset(&mut self) {
        self.last_surfaced.clear();
    }
}

impl Default for FeedbackThrottle {
    fn default() -> Self {
        Self::new(FeedbackConfig::default().cooldown_ms)
    }
}
