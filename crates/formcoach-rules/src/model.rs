//! Validated rule model.
//!
//! Every type here has passed validation: a rule that breaks its own
//! invariants never reaches a catalog or a session.

use std::fmt;

use formcoach_core::{Error, JointRef, LandmarkPoint, Result, Severity, ViolationType};
use serde::{Deserialize, Serialize};

/// Movement phase a rule applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Top,
    Bottom,
    #[default]
    All,
}

impl Phase {
    /// Whether a rule scoped to `self` is evaluated while the movement is in
    /// `current`. `None` is a transition between the two extremes.
    pub fn applies_to(&self, current: Option<Phase>) -> bool {
        match self {
            Phase::All => true,
            scoped => current == Some(*scoped),
        }
    }
}

/// Image axis along which the key joint is tracked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    #[default]
    Y,
    Z,
}

impl Axis {
    pub fn component(&self, point: &LandmarkPoint) -> f64 {
        match self {
            Axis::X => point.x,
            Axis::Y => point.y,
            Axis::Z => point.z,
        }
    }
}

/// Order of the two halves of a repetition. "Down" is the direction of
/// increasing coordinate (image y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepDirection {
    DownThenUp,
    UpThenDown,
}

impl RepDirection {
    /// Sign of the displacement that moves toward the target extreme
    pub fn target_sign(&self) -> f64 {
        match self {
            RepDirection::DownThenUp => 1.0,
            RepDirection::UpThenDown => -1.0,
        }
    }

    /// Phase reached at the target extreme
    pub fn target_phase(&self) -> Phase {
        match self {
            RepDirection::DownThenUp => Phase::Bottom,
            RepDirection::UpThenDown => Phase::Top,
        }
    }

    /// Phase held between repetitions
    pub fn rest_phase(&self) -> Phase {
        match self {
            RepDirection::DownThenUp => Phase::Top,
            RepDirection::UpThenDown => Phase::Bottom,
        }
    }
}

/// Movement-pattern category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Squat,
    Hinge,
    HorizontalPush,
    VerticalPush,
    HorizontalPull,
    VerticalPull,
    Core,
    Accessory,
    Other,
}

impl ExerciseCategory {
    pub const ALL: [ExerciseCategory; 9] = [
        ExerciseCategory::Squat,
        ExerciseCategory::Hinge,
        ExerciseCategory::HorizontalPush,
        ExerciseCategory::VerticalPush,
        ExerciseCategory::HorizontalPull,
        ExerciseCategory::VerticalPull,
        ExerciseCategory::Core,
        ExerciseCategory::Accessory,
        ExerciseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseCategory::Squat => "squat",
            ExerciseCategory::Hinge => "hinge",
            ExerciseCategory::HorizontalPush => "horizontal_push",
            ExerciseCategory::VerticalPush => "vertical_push",
            ExerciseCategory::HorizontalPull => "horizontal_pull",
            ExerciseCategory::VerticalPull => "vertical_pull",
            ExerciseCategory::Core => "core",
            ExerciseCategory::Accessory => "accessory",
            ExerciseCategory::Other => "other",
        }
    }
}

impl fmt::Display for ExerciseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Specific exercise type within a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Squat,
    Lunge,
    Deadlift,
    HipThrust,
    BenchPress,
    Pushup,
    Dip,
    OverheadPress,
    Row,
    Pullup,
    Plank,
    Crunch,
    Curl,
    Extension,
    Raise,
    Other,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Squat => "squat",
            ExerciseType::Lunge => "lunge",
            ExerciseType::Deadlift => "deadlift",
            ExerciseType::HipThrust => "hip_thrust",
            ExerciseType::BenchPress => "bench_press",
            ExerciseType::Pushup => "pushup",
            ExerciseType::Dip => "dip",
            ExerciseType::OverheadPress => "overhead_press",
            ExerciseType::Row => "row",
            ExerciseType::Pullup => "pullup",
            ExerciseType::Plank => "plank",
            ExerciseType::Crunch => "crunch",
            ExerciseType::Curl => "curl",
            ExerciseType::Extension => "extension",
            ExerciseType::Raise => "raise",
            ExerciseType::Other => "other",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Valid angle range for a joint triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleRule {
    pub name: String,
    /// First point, vertex, second point
    pub joints: [JointRef; 3],
    pub min_degrees: f64,
    pub max_degrees: f64,
    pub phase: Phase,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub message: String,
    pub use_3d: bool,
}

impl AngleRule {
    pub fn vertex(&self) -> JointRef {
        self.joints[1]
    }

    pub fn accepts(&self, degrees: f64) -> bool {
        degrees >= self.min_degrees && degrees <= self.max_degrees
    }

    pub fn validate(&self, exercise: &str) -> Result<()> {
        if !self.min_degrees.is_finite() || !self.max_degrees.is_finite() {
            return Err(Error::invalid_rule(
                exercise,
                format!("angle rule '{}' has a non-finite bound", self.name),
            ));
        }
        if self.min_degrees >= self.max_degrees {
            return Err(Error::invalid_rule(
                exercise,
                format!(
                    "angle rule '{}': minDegrees {} must be below maxDegrees {}",
                    self.name, self.min_degrees, self.max_degrees
                ),
            ));
        }
        if self.min_degrees < 0.0 || self.max_degrees > 180.0 {
            return Err(Error::invalid_rule(
                exercise,
                format!("angle rule '{}' must lie within [0, 180] degrees", self.name),
            ));
        }
        Ok(())
    }
}

/// Alignment predicate evaluated by the violation detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentCheck {
    /// Three joints on a line, within `tolerance_degrees` of 180°
    #[serde(rename_all = "camelCase")]
    Collinear {
        joints: [JointRef; 3],
        tolerance_degrees: f64,
    },
    /// Two joints at the same height, within `max_offset` of frame height
    #[serde(rename_all = "camelCase")]
    Level { joints: [JointRef; 2], max_offset: f64 },
    /// One joint vertically above the other, within `max_offset` of frame width
    #[serde(rename_all = "camelCase")]
    Stacked { joints: [JointRef; 2], max_offset: f64 },
    /// Knee stays over the foot; inward drift beyond `max_inward_offset` fails
    #[serde(rename_all = "camelCase")]
    KneeTracking { max_inward_offset: f64 },
    /// Estimated squat depth reaches at least `min_depth` (0..1)
    #[serde(rename_all = "camelCase")]
    MinDepth { min_depth: f64 },
}

impl AlignmentCheck {
    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            AlignmentCheck::Collinear {
                tolerance_degrees, ..
            } => {
                if !(*tolerance_degrees > 0.0 && *tolerance_degrees < 180.0) {
                    return Err(format!(
                        "collinear tolerance {} must lie in (0, 180)",
                        tolerance_degrees
                    ));
                }
            }
            AlignmentCheck::Level { max_offset, .. }
            | AlignmentCheck::Stacked { max_offset, .. }
            | AlignmentCheck::KneeTracking {
                max_inward_offset: max_offset,
            } => {
                if !(*max_offset > 0.0 && *max_offset < 1.0) {
                    return Err(format!("offset {} must lie in (0, 1)", max_offset));
                }
            }
            AlignmentCheck::MinDepth { min_depth } => {
                if !(*min_depth > 0.0 && *min_depth <= 1.0) {
                    return Err(format!("minimum depth {} must lie in (0, 1]", min_depth));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRule {
    pub name: String,
    pub check: AlignmentCheck,
    pub phase: Phase,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub message: String,
}

impl AlignmentRule {
    pub fn validate(&self, exercise: &str) -> Result<()> {
        self.check
            .validate()
            .map_err(|reason| Error::invalid_rule(exercise, format!("alignment rule '{}': {}", self.name, reason)))
    }
}

/// How repetitions are counted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepDetectionRule {
    pub key_joint: JointRef,
    pub axis: Axis,
    /// Displacement from the reference position, as a fraction of the frame
    pub threshold: f64,
    pub direction: RepDirection,
    /// Minimum continuous time past the threshold
    pub hold_time_ms: u64,
}

impl RepDetectionRule {
    pub fn validate(&self, exercise: &str) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(Error::invalid_rule(
                exercise,
                format!("rep detection threshold {} must lie in (0, 1)", self.threshold),
            ));
        }
        if self.hold_time_ms == 0 {
            return Err(Error::invalid_rule(exercise, "rep detection holdTimeMs must be positive"));
        }
        Ok(())
    }
}

/// Complete rule set for one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseFormRules {
    pub id: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub category: ExerciseCategory,
    pub exercise_type: ExerciseType,
    pub angle_rules: Vec<AngleRule>,
    pub alignment_rules: Vec<AlignmentRule>,
    pub rep_detection: RepDetectionRule,
}

impl ExerciseFormRules {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::invalid_rule(&self.name, "exercise id is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::invalid_rule(&self.id, "exercise name is empty"));
        }
        for rule in &self.angle_rules {
            rule.validate(&self.name)?;
        }
        for rule in &self.alignment_rules {
            rule.validate(&self.name)?;
        }
        self.rep_detection.validate(&self.name)
    }

    pub fn rule_count(&self) -> usize {
        self.angle_rules.len() + self.alignment_rules.len()
    }

    /// Canonical name followed by aliases
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Dictionary entry for a violation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationInfo {
    pub display_text: String,
    pub default_severity: Severity,
}
