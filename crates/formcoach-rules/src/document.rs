//! Rule document parsing.
//!
//! The document is JSON with camelCase keys:
//!
//! ```json
//! {
//!   "exercises": [{
//!     "id": "barbell_squat", "name": "Barbell Squat", "aliases": ["back squat"],
//!     "category": "squat", "type": "squat",
//!     "angleRules": [{ "joints": ["hip", "knee", "ankle"], "minDegrees": 40,
//!                      "maxDegrees": 110, "phase": "bottom",
//!                      "violationType": "insufficient_depth" }],
//!     "alignmentRules": [{ "kind": "knee_tracking", "maxInwardOffset": 0.05,
//!                          "phase": "bottom", "violationType": "knee_cave" }],
//!     "repDetection": { "keyJoint": "hip", "axis": "y", "threshold": 0.08,
//!                       "direction": "downThenUp", "holdTimeMs": 200 }
//!   }],
//!   "violationTypes": {
//!     "knee_cave": { "displayText": "Push your knees out", "defaultSeverity": "critical" }
//!   }
//! }
//! ```
//!
//! String identifiers become closed enums here and nowhere else. Rule
//! severity and message are optional and default from the violation
//! dictionary.

use std::collections::{HashMap, HashSet};

use formcoach_core::{Error, JointRef, Result, Severity, ViolationType};
use serde::Deserialize;

use crate::model::{
    AlignmentCheck, AlignmentRule, AngleRule, Axis, ExerciseCategory, ExerciseFormRules,
    ExerciseType, Phase, RepDetectionRule, RepDirection, ViolationInfo,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDocument {
    #[serde(default)]
    pub version: Option<String>,
    pub exercises: Vec<ExerciseEntry>,
    #[serde(default)]
    pub violation_types: HashMap<ViolationType, ViolationInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub category: ExerciseCategory,
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
    #[serde(default)]
    pub angle_rules: Vec<AngleRuleEntry>,
    #[serde(default)]
    pub alignment_rules: Vec<AlignmentRuleEntry>,
    pub rep_detection: RepDetectionEntry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AngleRuleEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub joints: [JointRef; 3],
    pub min_degrees: f64,
    pub max_degrees: f64,
    #[serde(default)]
    pub phase: Phase,
    pub violation_type: ViolationType,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "use3D")]
    pub use_3d: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentRuleEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub check: AlignmentCheck,
    #[serde(default)]
    pub phase: Phase,
    pub violation_type: ViolationType,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepDetectionEntry {
    pub key_joint: JointRef,
    #[serde(default)]
    pub axis: Axis,
    pub threshold: f64,
    pub direction: RepDirection,
    pub hold_time_ms: u64,
}

impl RuleDocument {
    pub fn parse(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Err(Error::DataFormat("rule document is empty".to_string()));
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve defaults and validate every exercise.
    ///
    /// Fails on the first invalid rule or on a duplicate exercise id.
    pub fn into_rules(self) -> Result<(Vec<ExerciseFormRules>, HashMap<ViolationType, ViolationInfo>)> {
        let dictionary = self.violation_types;
        let mut seen = HashSet::new();
        let mut exercises = Vec::with_capacity(self.exercises.len());

        for entry in self.exercises {
            if !seen.insert(entry.id.clone()) {
                return Err(Error::DataFormat(format!("duplicate exercise id '{}'", entry.id)));
            }
            let rules = entry.into_rules(&dictionary);
            rules.validate()?;
            exercises.push(rules);
        }

        Ok((exercises, dictionary))
    }
}

fn severity_for(
    explicit: Option<Severity>,
    violation_type: ViolationType,
    dictionary: &HashMap<ViolationType, ViolationInfo>,
) -> Severity {
    explicit
        .or_else(|| dictionary.get(&violation_type).map(|info| info.default_severity))
        .unwrap_or(Severity::Warning)
}

fn message_for(
    explicit: Option<String>,
    violation_type: ViolationType,
    dictionary: &HashMap<ViolationType, ViolationInfo>,
) -> String {
    explicit
        .or_else(|| dictionary.get(&violation_type).map(|info| info.display_text.clone()))
        .unwrap_or_else(|| violation_type.description().to_string())
}

impl ExerciseEntry {
    fn into_rules(self, dictionary: &HashMap<ViolationType, ViolationInfo>) -> ExerciseFormRules {
        let angle_rules = self
            .angle_rules
            .into_iter()
            .enumerate()
            .map(|(i, r)| AngleRule {
                name: r.name.unwrap_or_else(|| format!("{}_angle_{}", r.violation_type, i + 1)),
                joints: r.joints,
                min_degrees: r.min_degrees,
                max_degrees: r.max_degrees,
                phase: r.phase,
                severity: severity_for(r.severity, r.violation_type, dictionary),
                message: message_for(r.message, r.violation_type, dictionary),
                violation_type: r.violation_type,
                use_3d: r.use_3d,
            })
            .collect();

        let alignment_rules = self
            .alignment_rules
            .into_iter()
            .enumerate()
            .map(|(i, r)| AlignmentRule {
                name: r.name.unwrap_or_else(|| format!("{}_alignment_{}", r.violation_type, i + 1)),
                check: r.check,
                phase: r.phase,
                severity: severity_for(r.severity, r.violation_type, dictionary),
                message: message_for(r.message, r.violation_type, dictionary),
                violation_type: r.violation_type,
            })
            .collect();

        let rep = self.rep_detection;

        ExerciseFormRules {
            id: self.id,
            name: self.name,
            aliases: self.aliases,
            category: self.category,
            exercise_type: self.exercise_type,
            angle_rules,
            alignment_rules,
            rep_detection: RepDetectionRule {
                key_joint: rep.key_joint,
                axis: rep.axis,
                threshold: rep.threshold,
                direction: rep.direction,
                hold_time_ms: rep.hold_time_ms,
            },
        }
    }
}
