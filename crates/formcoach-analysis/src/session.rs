//! Session-level aggregation of completed repetitions.
//!
//! The aggregator is owned by the session that feeds it. Collaborators get a
//! [`StatsReader`], which can take snapshots from any thread but has no way to
//! mutate the history.

use std::collections::HashMap;
use std::sync::Arc;

use formcoach_core::ViolationType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::scorer::RepAnalysis;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Completed repetitions in order
    pub history: Vec<RepAnalysis>,
    /// Repetitions in which each violation type was observed
    pub violation_frequency: HashMap<ViolationType, u32>,
    /// Running mean of repetition scores, 0 before the first rep
    pub average_score: f64,
    pub good_reps: u32,
    pub best_score: Option<f64>,
    pub worst_score: Option<f64>,
}

impl SessionStats {
    pub fn rep_count(&self) -> usize {
        self.history.len()
    }

    pub fn last_rep(&self) -> Option<&RepAnalysis> {
        self.history.last()
    }

    /// Violation type seen in the most repetitions; ties go to the type
    /// declared first
    pub fn most_frequent_violation(&self) -> Option<(ViolationType, u32)> {
        self.violation_frequency
            .iter()
            .map(|(&t, &n)| (t, n))
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
    }

    pub fn total_violations(&self) -> u32 {
        self.violation_frequency.values().sum()
    }

    fn record(&mut self, rep: RepAnalysis) {
        for violation in &rep.violations {
            *self
                .violation_frequency
                .entry(violation.violation_type)
                .or_insert(0) += 1;
        }

        let n = (self.history.len() + 1) as f64;
        self.average_score += (rep.form_score - self.average_score) / n;
        if rep.is_good_rep {
            self.good_reps += 1;
        }
        self.best_score = Some(self.best_score.map_or(rep.form_score, |b| b.max(rep.form_score)));
        self.worst_score = Some(self.worst_score.map_or(rep.form_score, |w| w.min(rep.form_score)));

        self.history.push(rep);
    }
}

#[derive(Debug, Default)]
pub struct SessionAggregator {
    stats: Arc<RwLock<SessionStats>>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, rep: RepAnalysis) {
        tracing::debug!(
            "Recording rep {} (score {:.1}, {} violations)",
            rep.rep_index,
            rep.form_score,
            rep.violations.len()
        );
        self.stats.write().record(rep);
    }

    pub fn reader(&self) -> StatsReader {
        StatsReader {
            stats: self.stats.clone(),
        }
    }

    pub fn snapshot(&self) -> SessionStats {
        self.stats.read().clone()
    }

    pub fn rep_count(&self) -> usize {
        self.stats.read().rep_count()
    }

    pub fn average_score(&self) -> f64 {
        self.stats.read().average_score
    }
}

/// Read-only handle onto a session's statistics
#[derive(Debug, Clone)]
pub struct StatsReader {
    stats: Arc<RwLock<SessionStats>>,
}

impl StatsReader {
    pub fn snapshot(&self) -> SessionStats {
        self.stats.read().clone()
    }

    pub fn rep_count(&self) -> usize {
        self.stats.read().rep_count()
    }

    pub fn average_score(&self) -> f64 {
        self.stats.read().average_score
    }

    pub fn history(&self) -> Vec<RepAnalysis> {
        self.stats.read().history.clone()
    }

    pub fn violation_frequency(&self) -> HashMap<ViolationType, u32> {
        self.stats.read().violation_frequency.clone()
    }
}
