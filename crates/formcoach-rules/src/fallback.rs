//! Fallback rule synthesis for exercises missing from the catalog.
//!
//! A name is classified into a movement category by ordered keyword checks,
//! then given a small rule set typical for that category. Classification
//! never fails: anything unrecognised lands in [`ExerciseCategory::Other`].

use formcoach_core::{Joint, JointRef, Severity, ViolationType};

use crate::matcher::normalize;
use crate::model::{
    AngleRule, Axis, ExerciseCategory, ExerciseFormRules, ExerciseType, Phase, RepDetectionRule,
    RepDirection,
};

/// Ordered keyword table. The first category with a matching keyword wins,
/// so hinge is checked before squat ("deadlift squat" is a hinge) and the
/// pulls before the pushes ("push pull" is a pull).
const CATEGORY_KEYWORDS: &[(ExerciseCategory, &[&str])] = &[
    (
        ExerciseCategory::Hinge,
        &[
            "deadlift", "rdl", "hinge", "good morning", "hip thrust", "glute bridge", "swing",
            "hyperextension", "back extension",
        ],
    ),
    (
        ExerciseCategory::Squat,
        &[
            "squat", "lunge", "split", "leg press", "step up", "stepup", "pistol", "wall sit",
        ],
    ),
    (
        ExerciseCategory::VerticalPull,
        &["pull up", "pullup", "chin up", "chinup", "pulldown", "pull down", "muscle up"],
    ),
    (
        ExerciseCategory::HorizontalPull,
        &["row", "face pull", "pull apart", "pull", "inverted"],
    ),
    (
        ExerciseCategory::HorizontalPush,
        &["push", "press", "bench", "dip", "chest"],
    ),
    (
        ExerciseCategory::Core,
        &[
            "plank", "crunch", "sit up", "situp", "abs", "ab wheel", "core", "twist", "leg raise",
            "hollow", "dead bug", "mountain climber", "v up",
        ],
    ),
    (
        ExerciseCategory::Accessory,
        &[
            "curl", "extension", "raise", "kickback", "shrug", "calf", "fly", "flye", "skull",
            "pullover",
        ],
    ),
];

/// Push movements that go overhead rather than forward
const VERTICAL_PUSH_KEYWORDS: &[&str] = &[
    "overhead", "shoulder", "military", "arnold", "pike", "handstand", "jerk", "push press",
];

/// Whether `keyword` starts a word in the normalized `name`.
///
/// Matching at word starts lets plurals and suffixes through ("squats",
/// "rows") without matching inside unrelated words ("arrow").
fn has_keyword(name: &str, keyword: &str) -> bool {
    let padded = format!(" {}", name);
    padded.contains(&format!(" {}", keyword))
}

fn has_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| has_keyword(name, kw))
}

/// Movement category for a free-text exercise name
pub fn classify(name: &str) -> ExerciseCategory {
    let normalized = normalize(name);
    for (category, keywords) in CATEGORY_KEYWORDS {
        if has_any(&normalized, keywords) {
            if *category == ExerciseCategory::HorizontalPush
                && has_any(&normalized, VERTICAL_PUSH_KEYWORDS)
            {
                return ExerciseCategory::VerticalPush;
            }
            return *category;
        }
    }
    ExerciseCategory::Other
}

fn exercise_type_for(category: ExerciseCategory, normalized: &str) -> ExerciseType {
    match category {
        ExerciseCategory::Squat if has_any(normalized, &["lunge", "split"]) => ExerciseType::Lunge,
        ExerciseCategory::Squat => ExerciseType::Squat,
        ExerciseCategory::Hinge if has_any(normalized, &["hip thrust", "glute bridge"]) => {
            ExerciseType::HipThrust
        }
        ExerciseCategory::Hinge => ExerciseType::Deadlift,
        ExerciseCategory::HorizontalPush if has_any(normalized, &["push"]) => ExerciseType::Pushup,
        ExerciseCategory::HorizontalPush if has_any(normalized, &["dip"]) => ExerciseType::Dip,
        ExerciseCategory::HorizontalPush => ExerciseType::BenchPress,
        ExerciseCategory::VerticalPush => ExerciseType::OverheadPress,
        ExerciseCategory::HorizontalPull => ExerciseType::Row,
        ExerciseCategory::VerticalPull => ExerciseType::Pullup,
        ExerciseCategory::Core if has_any(normalized, &["plank", "hollow"]) => ExerciseType::Plank,
        ExerciseCategory::Core => ExerciseType::Crunch,
        ExerciseCategory::Accessory if has_any(normalized, &["curl"]) => ExerciseType::Curl,
        ExerciseCategory::Accessory if has_any(normalized, &["extension", "kickback", "skull"]) => {
            ExerciseType::Extension
        }
        ExerciseCategory::Accessory => ExerciseType::Raise,
        ExerciseCategory::Other => ExerciseType::Other,
    }
}

struct AngleTemplate {
    joints: [Joint; 3],
    min: f64,
    max: f64,
    phase: Phase,
    violation_type: ViolationType,
    severity: Severity,
}

struct RepTemplate {
    key_joint: Joint,
    threshold: f64,
    direction: RepDirection,
    hold_time_ms: u64,
}

const TORSO: [Joint; 3] = [Joint::Shoulder, Joint::Hip, Joint::Knee];
const KNEE: [Joint; 3] = [Joint::Hip, Joint::Knee, Joint::Ankle];
const ELBOW: [Joint; 3] = [Joint::Shoulder, Joint::Elbow, Joint::Wrist];
const BODY_LINE: [Joint; 3] = [Joint::Shoulder, Joint::Hip, Joint::Ankle];

fn templates(category: ExerciseCategory) -> (Vec<AngleTemplate>, RepTemplate) {
    use ExerciseCategory::*;
    use Severity::*;

    let angle = |joints, min, max, phase, violation_type, severity| AngleTemplate {
        joints,
        min,
        max,
        phase,
        violation_type,
        severity,
    };
    let rep = |key_joint, threshold, direction, hold_time_ms| RepTemplate {
        key_joint,
        threshold,
        direction,
        hold_time_ms,
    };

    match category {
        Squat => (
            vec![
                angle(KNEE, 40.0, 110.0, Phase::Bottom, ViolationType::InsufficientDepth, Warning),
                angle(TORSO, 50.0, 180.0, Phase::All, ViolationType::ForwardLean, Warning),
            ],
            rep(Joint::Hip, 0.08, RepDirection::DownThenUp, 200),
        ),
        Hinge => (
            vec![
                angle(TORSO, 160.0, 180.0, Phase::Top, ViolationType::IncompleteLockout, Warning),
                angle(KNEE, 120.0, 180.0, Phase::All, ViolationType::ExcessiveKneeBend, Info),
            ],
            rep(Joint::Hip, 0.08, RepDirection::UpThenDown, 150),
        ),
        HorizontalPush => (
            vec![
                angle(ELBOW, 30.0, 100.0, Phase::Bottom, ViolationType::IncompleteRangeOfMotion, Warning),
                angle(ELBOW, 150.0, 180.0, Phase::Top, ViolationType::IncompleteLockout, Info),
            ],
            rep(Joint::Shoulder, 0.05, RepDirection::DownThenUp, 100),
        ),
        VerticalPush => (
            vec![
                angle(ELBOW, 155.0, 180.0, Phase::Top, ViolationType::IncompleteLockout, Warning),
                angle(TORSO, 155.0, 180.0, Phase::All, ViolationType::ExcessiveArch, Warning),
            ],
            rep(Joint::Wrist, 0.12, RepDirection::UpThenDown, 150),
        ),
        HorizontalPull => (
            vec![angle(ELBOW, 30.0, 110.0, Phase::Top, ViolationType::IncompleteRangeOfMotion, Warning)],
            rep(Joint::Wrist, 0.08, RepDirection::UpThenDown, 100),
        ),
        VerticalPull => (
            vec![
                angle(ELBOW, 20.0, 100.0, Phase::Top, ViolationType::IncompleteRangeOfMotion, Warning),
                angle(ELBOW, 145.0, 180.0, Phase::Bottom, ViolationType::IncompleteLockout, Info),
            ],
            rep(Joint::Shoulder, 0.1, RepDirection::UpThenDown, 150),
        ),
        Core => (
            vec![angle(BODY_LINE, 150.0, 180.0, Phase::All, ViolationType::HipSag, Warning)],
            rep(Joint::Shoulder, 0.05, RepDirection::UpThenDown, 500),
        ),
        Accessory => (
            vec![angle(TORSO, 155.0, 180.0, Phase::All, ViolationType::BodySwing, Warning)],
            rep(Joint::Wrist, 0.1, RepDirection::UpThenDown, 100),
        ),
        Other => (
            vec![angle(TORSO, 60.0, 180.0, Phase::All, ViolationType::ForwardLean, Info)],
            rep(Joint::Hip, 0.1, RepDirection::DownThenUp, 200),
        ),
    }
}

fn fallback_id(normalized: &str) -> String {
    if normalized.is_empty() {
        "fallback_unnamed".to_string()
    } else {
        format!("fallback_{}", normalized.replace(' ', "_"))
    }
}

/// Synthesize a minimal rule set for `name`.
///
/// The result is not validated here; the catalog validates it before
/// handing it out.
pub fn synthesize(name: &str) -> ExerciseFormRules {
    let normalized = normalize(name);
    let category = classify(name);
    let exercise_type = exercise_type_for(category, &normalized);
    let (angles, rep) = templates(category);

    let angle_rules = angles
        .into_iter()
        .map(|t| AngleRule {
            name: format!("{}_{}", category, t.violation_type),
            joints: t.joints.map(JointRef::from),
            min_degrees: t.min,
            max_degrees: t.max,
            phase: t.phase,
            violation_type: t.violation_type,
            severity: t.severity,
            message: t.violation_type.description().to_string(),
            use_3d: false,
        })
        .collect();

    let display_name = name.trim();

    ExerciseFormRules {
        id: fallback_id(&normalized),
        name: if display_name.is_empty() {
            "Unnamed exercise".to_string()
        } else {
            display_name.to_string()
        },
        aliases: Vec::new(),
        category,
        exercise_type,
        angle_rules,
        alignment_rules: Vec::new(),
        rep_detection: RepDetectionRule {
            key_joint: rep.key_joint.into(),
            axis: Axis::Y,
            threshold: rep.threshold,
            direction: rep.direction,
            hold_time_ms: rep.hold_time_ms,
        },
    }
}
