//! Violation detection against an exercise's rule set.
//!
//! Each frame, every rule whose phase matches the tracker's current phase is
//! measured. A rule whose landmarks are missing or below the confidence floor
//! is not assessable and is skipped; it never counts as passing or failing.

use std::sync::Arc;

use formcoach_core::geometry::{
    are_collinear, estimate_squat_depth, horizontal_distance, joint_angle, knee_cave_offset,
    preferred_side, vertical_distance,
};
use formcoach_core::{Joint, JointRef, Landmark, LandmarkPoint, PoseSnapshot, Side, Violation};
use formcoach_rules::{AlignmentCheck, AlignmentRule, AngleRule, ExerciseFormRules, Phase};

/// Result of evaluating one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub violations: Vec<Violation>,
    /// Rules in scope for the current phase
    pub in_scope: usize,
    /// In-scope rules that could be measured
    pub assessable: usize,
}

impl Detection {
    pub fn has_critical(&self) -> bool {
        self.violations.iter().any(Violation::is_critical)
    }
}

/// Outcome of measuring one rule: `None` when not assessable, otherwise
/// whether it passed and the joint to blame if not
type Measurement = Option<(bool, Option<Landmark>)>;

pub struct ViolationDetector {
    rules: Arc<ExerciseFormRules>,
    min_confidence: f32,
}

impl ViolationDetector {
    pub fn new(rules: Arc<ExerciseFormRules>, min_confidence: f32) -> Self {
        Self {
            rules,
            min_confidence,
        }
    }

    pub fn rules(&self) -> &ExerciseFormRules {
        &self.rules
    }

    /// Evaluate all rules in scope for `phase`.
    ///
    /// `reference` is the session's standing pose, used by depth checks.
    pub fn detect(
        &self,
        snapshot: &PoseSnapshot,
        phase: Option<Phase>,
        reference: Option<&PoseSnapshot>,
    ) -> Detection {
        let side = preferred_side(snapshot);
        let mut detection = Detection::default();

        for rule in self.rules.angle_rules.iter().filter(|r| r.phase.applies_to(phase)) {
            detection.in_scope += 1;
            let Some((passed, joint)) = self.measure_angle(rule, snapshot, side) else {
                continue;
            };
            detection.assessable += 1;
            if !passed {
                detection.violations.push(Violation {
                    violation_type: rule.violation_type,
                    severity: rule.severity,
                    joint,
                    message: rule.message.clone(),
                    timestamp: snapshot.timestamp,
                });
            }
        }

        for rule in self.rules.alignment_rules.iter().filter(|r| r.phase.applies_to(phase)) {
            detection.in_scope += 1;
            let Some((passed, joint)) = self.measure_alignment(rule, snapshot, side, reference) else {
                continue;
            };
            detection.assessable += 1;
            if !passed {
                detection.violations.push(Violation {
                    violation_type: rule.violation_type,
                    severity: rule.severity,
                    joint,
                    message: rule.message.clone(),
                    timestamp: snapshot.timestamp,
                });
            }
        }

        if detection.assessable < detection.in_scope {
            tracing::trace!(
                "{} of {} rules assessable at {:?}",
                detection.assessable,
                detection.in_scope,
                phase
            );
        }

        detection
    }

    fn measure_angle(&self, rule: &AngleRule, snapshot: &PoseSnapshot, side: Side) -> Measurement {
        let [first, vertex, second] = rule.joints.map(|j| j.resolve(side));
        let degrees = joint_angle(snapshot, first, vertex, second, rule.use_3d, self.min_confidence)?;
        Some((rule.accepts(degrees), Some(vertex)))
    }

    fn point<'a>(
        &self,
        snapshot: &'a PoseSnapshot,
        joint: JointRef,
        side: Side,
    ) -> Option<(Landmark, &'a LandmarkPoint)> {
        let landmark = joint.resolve(side);
        snapshot
            .visible(landmark, self.min_confidence)
            .map(|p| (landmark, p))
    }

    fn measure_alignment(
        &self,
        rule: &AlignmentRule,
        snapshot: &PoseSnapshot,
        side: Side,
        reference: Option<&PoseSnapshot>,
    ) -> Measurement {
        match &rule.check {
            AlignmentCheck::Collinear {
                joints,
                tolerance_degrees,
            } => {
                let (_, a) = self.point(snapshot, joints[0], side)?;
                let (middle_lm, middle) = self.point(snapshot, joints[1], side)?;
                let (_, b) = self.point(snapshot, joints[2], side)?;
                Some((are_collinear(a, middle, b, *tolerance_degrees), Some(middle_lm)))
            }
            AlignmentCheck::Level { joints, max_offset } => {
                let (first_lm, a) = self.point(snapshot, joints[0], side)?;
                let (_, b) = self.point(snapshot, joints[1], side)?;
                Some((vertical_distance(a, b) <= *max_offset, Some(first_lm)))
            }
            AlignmentCheck::Stacked { joints, max_offset } => {
                let (first_lm, a) = self.point(snapshot, joints[0], side)?;
                let (_, b) = self.point(snapshot, joints[1], side)?;
                Some((horizontal_distance(a, b) <= *max_offset, Some(first_lm)))
            }
            AlignmentCheck::KneeTracking { max_inward_offset } => {
                // Either knee caving fails the check
                let mut assessed = false;
                for s in [side, side.opposite()] {
                    if let Some(offset) = knee_cave_offset(snapshot, s, self.min_confidence) {
                        if offset > *max_inward_offset {
                            return Some((false, Some(Joint::Knee.on_side(s))));
                        }
                        assessed = true;
                    }
                }
                assessed.then_some((true, None))
            }
            AlignmentCheck::MinDepth { min_depth } => {
                let depth = estimate_squat_depth(snapshot, reference, self.min_confidence)?;
                Some((depth >= *min_depth, Some(Joint::Hip.on_side(side))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcoach_core::{Severity, Timestamp, ViolationType};
    use formcoach_rules::{fallback, Axis, ExerciseCategory, ExerciseType, RepDetectionRule, RepDirection};

    fn pt(x: f64, y: f64) -> LandmarkPoint {
        LandmarkPoint::new(x, y, 0.0, 0.9)
    }

    fn squat_rules() -> Arc<ExerciseFormRules> {
        Arc::new(ExerciseFormRules {
            id: "squat".to_string(),
            name: "Squat".to_string(),
            aliases: Vec::new(),
            category: ExerciseCategory::Squat,
            exercise_type: ExerciseType::Squat,
            angle_rules: vec![
                AngleRule {
                    name: "depth".to_string(),
                    joints: [Joint::Hip.into(), Joint::Knee.into(), Joint::Ankle.into()],
                    min_degrees: 40.0,
                    max_degrees: 110.0,
                    phase: Phase::Bottom,
                    violation_type: ViolationType::InsufficientDepth,
                    severity: Severity::Warning,
                    message: "Go deeper".to_string(),
                    use_3d: false,
                },
                AngleRule {
                    name: "torso".to_string(),
                    joints: [Joint::Shoulder.into(), Joint::Hip.into(), Joint::Knee.into()],
                    min_degrees: 50.0,
                    max_degrees: 180.0,
                    phase: Phase::All,
                    violation_type: ViolationType::ForwardLean,
                    severity: Severity::Warning,
                    message: "Chest up".to_string(),
                    use_3d: false,
                },
            ],
            alignment_rules: vec![AlignmentRule {
                name: "knees".to_string(),
                check: AlignmentCheck::KneeTracking {
                    max_inward_offset: 0.05,
                },
                phase: Phase::Bottom,
                violation_type: ViolationType::KneeCave,
                severity: Severity::Critical,
                message: "Knees out".to_string(),
            }],
            rep_detection: RepDetectionRule {
                key_joint: Joint::Hip.into(),
                axis: Axis::Y,
                threshold: 0.08,
                direction: RepDirection::DownThenUp,
                hold_time_ms: 200,
            },
        })
    }

    /// Side-on squat with a straight-legged stance: knee angle 180°
    fn standing() -> PoseSnapshot {
        PoseSnapshot::new(Timestamp::from_millis(100), 0.9)
            .with_landmark(Landmark::LeftShoulder, pt(0.45, 0.25))
            .with_landmark(Landmark::RightShoulder, pt(0.55, 0.25))
            .with_landmark(Landmark::LeftHip, pt(0.45, 0.5))
            .with_landmark(Landmark::RightHip, pt(0.55, 0.5))
            .with_landmark(Landmark::LeftKnee, pt(0.45, 0.7))
            .with_landmark(Landmark::RightKnee, pt(0.55, 0.7))
            .with_landmark(Landmark::LeftAnkle, pt(0.45, 0.9))
            .with_landmark(Landmark::RightAnkle, pt(0.55, 0.9))
    }

    #[test]
    fn test_phase_scoping() {
        let detector = ViolationDetector::new(squat_rules(), 0.5);
        let pose = standing();

        // At the top only the phase-all torso rule applies, and it passes
        let top = detector.detect(&pose, Some(Phase::Top), None);
        assert_eq!(top.in_scope, 1);
        assert_eq!(top.assessable, 1);
        assert!(top.violations.is_empty());

        // The same straight knee at the bottom is too shallow
        let bottom = detector.detect(&pose, Some(Phase::Bottom), None);
        assert_eq!(bottom.in_scope, 3);
        assert_eq!(bottom.violations.len(), 1);
        let v = &bottom.violations[0];
        assert_eq!(v.violation_type, ViolationType::InsufficientDepth);
        assert_eq!(v.joint, Some(Landmark::LeftKnee));
        assert_eq!(v.timestamp, Timestamp::from_millis(100));
        assert_eq!(v.message, "Go deeper");

        let transition = detector.detect(&pose, None, None);
        assert_eq!(transition.in_scope, 1);
    }

    #[test]
    fn test_missing_landmarks_are_not_assessable() {
        let detector = ViolationDetector::new(squat_rules(), 0.5);
        let empty = PoseSnapshot::new(Timestamp::from_millis(0), 0.1);
        let detection = detector.detect(&empty, Some(Phase::Bottom), None);
        assert_eq!(detection.in_scope, 3);
        assert_eq!(detection.assessable, 0);
        assert!(detection.violations.is_empty());

        let mut faint = standing();
        faint.landmarks.get_mut(&Landmark::LeftKnee).unwrap().confidence = 0.2;
        faint.landmarks.get_mut(&Landmark::RightKnee).unwrap().confidence = 0.2;
        let detection = detector.detect(&faint, Some(Phase::Top), None);
        assert_eq!(detection.assessable, 0);
    }

    #[test]
    fn test_knee_cave_is_critical() {
        let detector = ViolationDetector::new(squat_rules(), 0.5);
        // Deep squat, knees bent ~90°, left knee drifting toward the centre line
        let pose = PoseSnapshot::new(Timestamp::from_millis(0), 0.9)
            .with_landmark(Landmark::LeftShoulder, pt(0.40, 0.45))
            .with_landmark(Landmark::LeftHip, pt(0.40, 0.65))
            .with_landmark(Landmark::RightHip, pt(0.60, 0.65))
            .with_landmark(Landmark::LeftKnee, pt(0.52, 0.65))
            .with_landmark(Landmark::RightKnee, pt(0.60, 0.75))
            .with_landmark(Landmark::LeftAnkle, pt(0.40, 0.90))
            .with_landmark(Landmark::RightAnkle, pt(0.60, 0.90));

        let detection = detector.detect(&pose, Some(Phase::Bottom), None);
        let cave = detection
            .violations
            .iter()
            .find(|v| v.violation_type == ViolationType::KneeCave)
            .expect("knee cave detected");
        assert_eq!(cave.severity, Severity::Critical);
        assert_eq!(cave.joint, Some(Landmark::LeftKnee));
        assert!(detection.has_critical());
    }

    #[test]
    fn test_collinear_alignment() {
        let mut rules = (*squat_rules()).clone();
        rules.angle_rules.clear();
        rules.alignment_rules = vec![AlignmentRule {
            name: "body_line".to_string(),
            check: AlignmentCheck::Collinear {
                joints: [Joint::Shoulder.into(), Joint::Hip.into(), Joint::Ankle.into()],
                tolerance_degrees: 15.0,
            },
            phase: Phase::All,
            violation_type: ViolationType::HipSag,
            severity: Severity::Critical,
            message: "Hips up".to_string(),
        }];
        let detector = ViolationDetector::new(Arc::new(rules), 0.5);

        let plank = PoseSnapshot::new(Timestamp::from_millis(0), 0.9)
            .with_landmark(Landmark::LeftShoulder, pt(0.2, 0.5))
            .with_landmark(Landmark::LeftHip, pt(0.5, 0.5))
            .with_landmark(Landmark::LeftAnkle, pt(0.8, 0.5));
        assert!(detector.detect(&plank, None, None).violations.is_empty());

        let sagging = plank.clone().with_landmark(Landmark::LeftHip, pt(0.5, 0.65));
        let detection = detector.detect(&sagging, None, None);
        assert_eq!(detection.violations.len(), 1);
        assert_eq!(detection.violations[0].joint, Some(Landmark::LeftHip));
    }

    #[test]
    fn test_level_and_stacked() {
        let mut rules = (*squat_rules()).clone();
        rules.angle_rules.clear();
        rules.alignment_rules = vec![
            AlignmentRule {
                name: "level".to_string(),
                check: AlignmentCheck::Level {
                    joints: [Landmark::LeftShoulder.into(), Landmark::RightShoulder.into()],
                    max_offset: 0.04,
                },
                phase: Phase::All,
                violation_type: ViolationType::AsymmetricMovement,
                severity: Severity::Info,
                message: "Even out".to_string(),
            },
            AlignmentRule {
                name: "stacked".to_string(),
                check: AlignmentCheck::Stacked {
                    joints: [Joint::Wrist.into(), Joint::Elbow.into()],
                    max_offset: 0.05,
                },
                phase: Phase::All,
                violation_type: ViolationType::WristAlignment,
                severity: Severity::Info,
                message: "Stack wrists".to_string(),
            },
        ];
        let detector = ViolationDetector::new(Arc::new(rules), 0.5);

        let pose = PoseSnapshot::new(Timestamp::from_millis(0), 0.9)
            .with_landmark(Landmark::LeftShoulder, pt(0.4, 0.30))
            .with_landmark(Landmark::RightShoulder, pt(0.6, 0.38))
            .with_landmark(Landmark::LeftElbow, pt(0.35, 0.45))
            .with_landmark(Landmark::LeftWrist, pt(0.36, 0.30));
        let detection = detector.detect(&pose, None, None);
        assert_eq!(detection.assessable, 2);
        let types: Vec<ViolationType> = detection.violations.iter().map(|v| v.violation_type).collect();
        assert_eq!(types, vec![ViolationType::AsymmetricMovement]);
    }

    #[test]
    fn test_min_depth_uses_reference() {
        let mut rules = (*squat_rules()).clone();
        rules.angle_rules.clear();
        rules.alignment_rules = vec![AlignmentRule {
            name: "depth".to_string(),
            check: AlignmentCheck::MinDepth { min_depth: 0.8 },
            phase: Phase::Bottom,
            violation_type: ViolationType::InsufficientDepth,
            severity: Severity::Warning,
            message: "Deeper".to_string(),
        }];
        let detector = ViolationDetector::new(Arc::new(rules), 0.5);

        let reference = standing().with_landmark(Landmark::Nose, pt(0.5, 0.1));
        // Body height 0.8, full depth at a 0.24 hip drop; this is a 0.1 drop
        let shallow = standing()
            .with_landmark(Landmark::LeftHip, pt(0.45, 0.6))
            .with_landmark(Landmark::RightHip, pt(0.55, 0.6));
        let detection = detector.detect(&shallow, Some(Phase::Bottom), Some(&reference));
        assert_eq!(detection.violations.len(), 1);

        let deep = standing()
            .with_landmark(Landmark::LeftHip, pt(0.45, 0.75))
            .with_landmark(Landmark::RightHip, pt(0.55, 0.75));
        let detection = detector.detect(&deep, Some(Phase::Bottom), Some(&reference));
        assert!(detection.violations.is_empty());
    }

    #[test]
    fn test_fallback_rules_are_evaluable() {
        let rules = Arc::new(fallback::synthesize("Zercher Squat"));
        let detector = ViolationDetector::new(rules, 0.5);

        // Between extremes only the torso rule applies, and an upright torso passes
        let moving = detector.detect(&standing(), None, None);
        assert_eq!((moving.in_scope, moving.assessable), (1, 1));
        assert!(moving.violations.is_empty());

        // A straight knee at the bottom is a shallow squat
        let bottom = detector.detect(&standing(), Some(Phase::Bottom), None);
        assert_eq!((bottom.in_scope, bottom.assessable), (2, 2));
        assert_eq!(bottom.violations.len(), 1);
        assert_eq!(bottom.violations[0].violation_type, ViolationType::InsufficientDepth);
        assert_eq!(bottom.violations[0].joint, Some(Landmark::LeftKnee));
    }
}
