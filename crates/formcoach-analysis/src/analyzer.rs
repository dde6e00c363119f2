//! Per-session form analysis.
//!
//! A [`FormSession`] owns one tracker, detector, scorer and aggregator for one
//! exercise, and processes frames strictly one at a time. The rule catalog it
//! was started from is shared and never mutated.

use std::sync::Arc;

use formcoach_core::geometry::preferred_side;
use formcoach_core::{Error, Joint, PoseSnapshot, Result, SessionId, Timestamp, Violation};
use formcoach_rules::{
    ExerciseFormRules, MatchSource, Phase, RepDirection, ResolvedExercise, RuleCatalog,
};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::cooldown::FeedbackThrottle;
use crate::detector::ViolationDetector;
use crate::scorer::{FormScorer, Grade, RepAnalysis, RepWindow};
use crate::session::{SessionAggregator, SessionStats, StatsReader};
use crate::tracker::{RepState, RepTracker};

/// Decides whether a closed repetition met a host-defined target, such as a
/// prescribed hold or a minimum score
pub trait TargetEvaluator: Send + Sync {
    fn target_achieved(&self, rep: &RepAnalysis) -> bool;
}

impl<F> TargetEvaluator for F
where
    F: Fn(&RepAnalysis) -> bool + Send + Sync,
{
    fn target_achieved(&self, rep: &RepAnalysis) -> bool {
        self(rep)
    }
}

/// Per-frame feedback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormFeedback {
    pub timestamp: Timestamp,
    pub score: f64,
    pub grade: Grade,
    pub violations: Vec<Violation>,
    /// Corrections to surface now, most severe first, cooldown applied
    pub instructions: Vec<String>,
    pub has_critical_issues: bool,
    /// Rules measured this frame; 0 means nothing could be assessed
    pub assessable_rules: usize,
    pub rep_state: RepState,
    pub phase: Option<Phase>,
    pub rep_count: u32,
}

#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub feedback: FormFeedback,
    pub completed_rep: Option<RepAnalysis>,
}

pub struct FormSession {
    id: SessionId,
    exercise: ResolvedExercise,
    config: EngineConfig,
    tracker: RepTracker,
    detector: ViolationDetector,
    scorer: FormScorer,
    throttle: FeedbackThrottle,
    aggregator: SessionAggregator,
    window: RepWindow,
    standing_reference: Option<PoseSnapshot>,
    target: Option<Box<dyn TargetEvaluator>>,
    frames_processed: u64,
}

impl FormSession {
    /// Resolve `exercise_name` against `catalog` and build a session for it.
    ///
    /// Unknown names fall back to synthesized rules; only an empty name or an
    /// invalid configuration is an error.
    pub fn start(catalog: &RuleCatalog, exercise_name: &str, config: &EngineConfig) -> Result<Self> {
        if exercise_name.trim().is_empty() {
            return Err(Error::InvalidInput("exercise name is empty".to_string()));
        }
        config.validate()?;

        let exercise = catalog.resolve_with(exercise_name, &config.matching)?;
        let session = Self::with_exercise(exercise, config.clone());

        match &session.exercise.source {
            MatchSource::Exact => tracing::info!(
                "Session {} started for '{}'",
                session.id,
                session.exercise.rules.name
            ),
            MatchSource::Fuzzy { confidence, .. } => tracing::info!(
                "Session {} started for '{}' (matched '{}' at {:.1})",
                session.id,
                session.exercise.rules.name,
                exercise_name,
                confidence
            ),
            MatchSource::Fallback { category } => tracing::info!(
                "Session {} started for '{}' with generic {} rules",
                session.id,
                exercise_name,
                category
            ),
        }

        Ok(session)
    }

    /// Build a session from an already-resolved exercise
    pub fn with_exercise(exercise: ResolvedExercise, config: EngineConfig) -> Self {
        let rules = exercise.rules.clone();
        Self {
            id: SessionId::new(),
            tracker: RepTracker::new(rules.rep_detection, config.tracker),
            detector: ViolationDetector::new(rules, config.min_landmark_confidence),
            scorer: FormScorer::new(config.scoring),
            throttle: FeedbackThrottle::new(config.feedback.cooldown_ms),
            aggregator: SessionAggregator::new(),
            window: RepWindow::new(),
            standing_reference: None,
            target: None,
            frames_processed: 0,
            exercise,
            config,
        }
    }

    pub fn with_target(mut self, evaluator: impl TargetEvaluator + 'static) -> Self {
        self.target = Some(Box::new(evaluator));
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn exercise(&self) -> &ResolvedExercise {
        &self.exercise
    }

    pub fn rules(&self) -> &Arc<ExerciseFormRules> {
        &self.exercise.rules
    }

    pub fn rep_state(&self) -> RepState {
        self.tracker.state()
    }

    pub fn rep_count(&self) -> u32 {
        self.tracker.rep_count()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn standing_reference(&self) -> Option<&PoseSnapshot> {
        self.standing_reference.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.aggregator.snapshot()
    }

    pub fn stats_reader(&self) -> StatsReader {
        self.aggregator.reader()
    }

    /// Process one frame: advance the tracker, evaluate rules for the
    /// resulting phase, score the frame and close a repetition if one ended
    pub fn process_frame(&mut self, snapshot: &PoseSnapshot) -> FrameOutcome {
        self.frames_processed += 1;

        let completed = self.tracker.process(snapshot);
        let phase = self.tracker.phase();

        if self.tracker.state() == RepState::Idle {
            self.capture_standing_reference(snapshot);
        }

        let detection = self
            .detector
            .detect(snapshot, phase, self.standing_reference.as_ref());
        let score = self.scorer.frame_score(&detection.violations);
        let scored = (detection.assessable > 0).then_some(score);

        let completed_rep = match completed {
            Some(event) => {
                self.window.record(scored, &detection.violations);
                let mut rep = self.window.close(&self.scorer, &event);
                rep.target_achieved = self.target.as_ref().map(|t| t.target_achieved(&rep));
                tracing::info!(
                    "Rep {} complete: {:.1} ({}), {} violation types",
                    rep.rep_index + 1,
                    rep.form_score,
                    rep.grade,
                    rep.violations.len()
                );
                self.aggregator.record(rep.clone());
                Some(rep)
            }
            None if self.tracker.is_in_rep() => {
                self.window.record(scored, &detection.violations);
                None
            }
            None => {
                // Aborted attempt or tracker reset
                if !self.window.is_empty() {
                    self.window.clear();
                }
                None
            }
        };

        let feedback = FormFeedback {
            timestamp: snapshot.timestamp,
            score,
            grade: Grade::from_score(score),
            instructions: self.instructions(&detection.violations),
            has_critical_issues: detection.has_critical(),
            assessable_rules: detection.assessable,
            violations: detection.violations,
            rep_state: self.tracker.state(),
            phase,
            rep_count: self.tracker.rep_count(),
        };

        FrameOutcome {
            feedback,
            completed_rep,
        }
    }

    /// End the session, returning its final statistics
    pub fn finish(self) -> SessionStats {
        let stats = self.aggregator.snapshot();
        tracing::info!(
            "Session {} finished: {} reps, average {:.1}",
            self.id,
            stats.rep_count(),
            stats.average_score
        );
        stats
    }

    fn instructions(&mut self, violations: &[Violation]) -> Vec<String> {
        let mut ranked: Vec<&Violation> = violations.iter().collect();
        ranked.sort_by(|a, b| b.severity.cmp(&a.severity));

        let mut instructions: Vec<String> = Vec::new();
        for violation in ranked {
            if instructions.len() >= self.config.feedback.max_instructions {
                break;
            }
            if instructions.contains(&violation.message) {
                continue;
            }
            // Only emitted corrections start a cooldown
            if self.throttle.should_surface(violation) {
                instructions.push(violation.message.clone());
            }
        }
        instructions
    }

    /// Only `DownThenUp` exercises rest upright; for the others `Idle` is the
    /// bottom of the lift and no standing reference exists.
    fn capture_standing_reference(&mut self, snapshot: &PoseSnapshot) {
        if self.standing_reference.is_some()
            || self.exercise.rules.rep_detection.direction != RepDirection::DownThenUp
        {
            return;
        }
        let side = preferred_side(snapshot);
        let min = self.config.min_landmark_confidence;
        let confident = [Joint::Hip, Joint::Knee, Joint::Ankle]
            .iter()
            .all(|j| snapshot.visible(j.on_side(side), min).is_some());
        if confident {
            tracing::debug!("Standing reference captured at {:.3}s", snapshot.timestamp.as_secs_f64());
            self.standing_reference = Some(snapshot.clone());
        }
    }
}
