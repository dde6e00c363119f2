//! Form scoring and letter grades.
//!
//! ## Frame score
//!
//! Every frame starts at 100 and loses a severity-weighted penalty per active
//! violation, clamped to [0, 100].
//!
//! ## Repetition score
//!
//! The arithmetic mean of the frame scores observed between the frame the
//! tracker leaves `Idle` and the completion frame, rounded to one decimal.
//! Frames on which no rule could be assessed do not contribute. A repetition
//! with no assessable frame scores 100.

use std::collections::HashMap;
use std::fmt;

use formcoach_core::{Severity, Timestamp, Violation, ViolationType};
use serde::{Deserialize, Serialize};

use crate::tracker::RepCompleted;

/// Scoring policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub info_penalty: f64,
    pub warning_penalty: f64,
    pub critical_penalty: f64,
    /// Minimum repetition score for a good rep
    pub good_rep_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            info_penalty: 3.0,
            warning_penalty: 10.0,
            critical_penalty: 25.0,
            good_rep_threshold: 80.0,
        }
    }
}

impl ScoringConfig {
    pub fn penalty(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Info => self.info_penalty,
            Severity::Warning => self.warning_penalty,
            Severity::Critical => self.critical_penalty,
        }
    }

    pub fn is_valid(&self) -> bool {
        let penalties = [self.info_penalty, self.warning_penalty, self.critical_penalty];
        penalties.iter().all(|p| p.is_finite() && *p >= 0.0)
            && self.info_penalty <= self.warning_penalty
            && self.warning_penalty <= self.critical_penalty
            && (0.0..=100.0).contains(&self.good_rep_threshold)
    }
}

/// Letter grade for a percentage score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "F")]
    F,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 95.0 => Grade::APlus,
            s if s >= 90.0 => Grade::A,
            s if s >= 85.0 => Grade::AMinus,
            s if s >= 80.0 => Grade::BPlus,
            s if s >= 75.0 => Grade::B,
            s if s >= 70.0 => Grade::BMinus,
            s if s >= 65.0 => Grade::CPlus,
            s if s >= 60.0 => Grade::C,
            s if s >= 55.0 => Grade::CMinus,
            s if s >= 50.0 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed record of one completed repetition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepAnalysis {
    pub rep_index: u32,
    pub form_score: f64,
    pub grade: Grade,
    /// One entry per violation type seen during the rep, the most severe instance kept
    pub violations: Vec<Violation>,
    pub is_good_rep: bool,
    /// Set by a host-supplied target evaluator, `None` without one
    pub target_achieved: Option<bool>,
    pub started_at: Timestamp,
    pub completed_at: Timestamp,
    /// Frames that contributed to `form_score`
    pub scored_frames: usize,
}

impl RepAnalysis {
    pub fn has_critical(&self) -> bool {
        self.violations.iter().any(Violation::is_critical)
    }

    pub fn duration_ms(&self) -> u64 {
        self.completed_at.millis_since(self.started_at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FormScorer {
    config: ScoringConfig,
}

impl FormScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn frame_score(&self, violations: &[Violation]) -> f64 {
        let penalty: f64 = violations.iter().map(|v| self.config.penalty(v.severity)).sum();
        (100.0 - penalty).clamp(0.0, 100.0)
    }

    /// Mean of `frame_scores`, one decimal; 100 for an empty window
    pub fn rep_score(&self, frame_scores: &[f64]) -> f64 {
        if frame_scores.is_empty() {
            return 100.0;
        }
        let mean = frame_scores.iter().sum::<f64>() / frame_scores.len() as f64;
        (mean * 10.0).round() / 10.0
    }

    pub fn is_good_rep(&self, score: f64, violations: &[Violation]) -> bool {
        score >= self.config.good_rep_threshold && !violations.iter().any(Violation::is_critical)
    }
}

/// Frame scores and violations collected over one repetition window
#[derive(Debug, Default)]
pub struct RepWindow {
    frame_scores: Vec<f64>,
    violations: HashMap<ViolationType, Violation>,
}

impl RepWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_scores.is_empty() && self.violations.is_empty()
    }

    pub fn record(&mut self, score: Option<f64>, violations: &[Violation]) {
        if let Some(score) = score {
            self.frame_scores.push(score);
        }
        for violation in violations {
            match self.violations.get(&violation.violation_type) {
                Some(kept) if kept.severity >= violation.severity => {}
                _ => {
                    self.violations.insert(violation.violation_type, violation.clone());
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.frame_scores.clear();
        self.violations.clear();
    }

    /// Close the window into a [`RepAnalysis`], leaving it empty
    pub fn close(&mut self, scorer: &FormScorer, event: &RepCompleted) -> RepAnalysis {
        let form_score = scorer.rep_score(&self.frame_scores);
        let mut violations: Vec<Violation> = self.violations.drain().map(|(_, v)| v).collect();
        violations.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(a.violation_type.cmp(&b.violation_type))
        });
        let scored_frames = self.frame_scores.len();
        self.frame_scores.clear();

        RepAnalysis {
            rep_index: event.rep_index,
            form_score,
            grade: Grade::from_score(form_score),
            is_good_rep: scorer.is_good_rep(form_score, &violations),
            violations,
            target_achieved: None,
            started_at: event.started_at,
            completed_at: event.completed_at,
            scored_frames,
        }
    }
}
