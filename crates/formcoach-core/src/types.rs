//! Fundamental types for the form-analysis engine.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Session identifier for one exercise set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper with nanosecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_nanos_opt().unwrap_or(0))
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0 / 1_000_000
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Milliseconds elapsed since `earlier`, zero if `earlier` is in the future
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        let delta = self.0.saturating_sub(earlier.0);
        if delta <= 0 {
            0
        } else {
            (delta / 1_000_000) as u64
        }
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0)
    }
}

/// Body side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Side-agnostic anatomical joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    EyeInner,
    Eye,
    EyeOuter,
    Ear,
    Mouth,
    Shoulder,
    Elbow,
    Wrist,
    Pinky,
    Index,
    Thumb,
    Hip,
    Knee,
    Ankle,
    Heel,
    FootIndex,
}

impl Joint {
    pub const ALL: [Joint; 17] = [
        Joint::Nose,
        Joint::EyeInner,
        Joint::Eye,
        Joint::EyeOuter,
        Joint::Ear,
        Joint::Mouth,
        Joint::Shoulder,
        Joint::Elbow,
        Joint::Wrist,
        Joint::Pinky,
        Joint::Index,
        Joint::Thumb,
        Joint::Hip,
        Joint::Knee,
        Joint::Ankle,
        Joint::Heel,
        Joint::FootIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Joint::Nose => "nose",
            Joint::EyeInner => "eye_inner",
            Joint::Eye => "eye",
            Joint::EyeOuter => "eye_outer",
            Joint::Ear => "ear",
            Joint::Mouth => "mouth",
            Joint::Shoulder => "shoulder",
            Joint::Elbow => "elbow",
            Joint::Wrist => "wrist",
            Joint::Pinky => "pinky",
            Joint::Index => "index",
            Joint::Thumb => "thumb",
            Joint::Hip => "hip",
            Joint::Knee => "knee",
            Joint::Ankle => "ankle",
            Joint::Heel => "heel",
            Joint::FootIndex => "foot_index",
        }
    }

    /// The landmark for this joint on the given side (the nose has no side)
    pub fn on_side(&self, side: Side) -> Landmark {
        use Landmark::*;
        match (self, side) {
            (Joint::Nose, _) => Nose,
            (Joint::EyeInner, Side::Left) => LeftEyeInner,
            (Joint::EyeInner, Side::Right) => RightEyeInner,
            (Joint::Eye, Side::Left) => LeftEye,
            (Joint::Eye, Side::Right) => RightEye,
            (Joint::EyeOuter, Side::Left) => LeftEyeOuter,
            (Joint::EyeOuter, Side::Right) => RightEyeOuter,
            (Joint::Ear, Side::Left) => LeftEar,
            (Joint::Ear, Side::Right) => RightEar,
            (Joint::Mouth, Side::Left) => MouthLeft,
            (Joint::Mouth, Side::Right) => MouthRight,
            (Joint::Shoulder, Side::Left) => LeftShoulder,
            (Joint::Shoulder, Side::Right) => RightShoulder,
            (Joint::Elbow, Side::Left) => LeftElbow,
            (Joint::Elbow, Side::Right) => RightElbow,
            (Joint::Wrist, Side::Left) => LeftWrist,
            (Joint::Wrist, Side::Right) => RightWrist,
            (Joint::Pinky, Side::Left) => LeftPinky,
            (Joint::Pinky, Side::Right) => RightPinky,
            (Joint::Index, Side::Left) => LeftIndex,
            (Joint::Index, Side::Right) => RightIndex,
            (Joint::Thumb, Side::Left) => LeftThumb,
            (Joint::Thumb, Side::Right) => RightThumb,
            (Joint::Hip, Side::Left) => LeftHip,
            (Joint::Hip, Side::Right) => RightHip,
            (Joint::Knee, Side::Left) => LeftKnee,
            (Joint::Knee, Side::Right) => RightKnee,
            (Joint::Ankle, Side::Left) => LeftAnkle,
            (Joint::Ankle, Side::Right) => RightAnkle,
            (Joint::Heel, Side::Left) => LeftHeel,
            (Joint::Heel, Side::Right) => RightHeel,
            (Joint::FootIndex, Side::Left) => LeftFootIndex,
            (Joint::FootIndex, Side::Right) => RightFootIndex,
        }
    }
}

impl FromStr for Joint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Joint::ALL
            .iter()
            .copied()
            .find(|j| j.as_str() == s)
            .ok_or_else(|| Error::unknown("joint", s))
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 33-point body landmark set (BlazePose topology)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Landmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Landmark {
    pub const COUNT: usize = 33;

    pub const ALL: [Landmark; Landmark::COUNT] = [
        Landmark::Nose,
        Landmark::LeftEyeInner,
        Landmark::LeftEye,
        Landmark::LeftEyeOuter,
        Landmark::RightEyeInner,
        Landmark::RightEye,
        Landmark::RightEyeOuter,
        Landmark::LeftEar,
        Landmark::RightEar,
        Landmark::MouthLeft,
        Landmark::MouthRight,
        Landmark::LeftShoulder,
        Landmark::RightShoulder,
        Landmark::LeftElbow,
        Landmark::RightElbow,
        Landmark::LeftWrist,
        Landmark::RightWrist,
        Landmark::LeftPinky,
        Landmark::RightPinky,
        Landmark::LeftIndex,
        Landmark::RightIndex,
        Landmark::LeftThumb,
        Landmark::RightThumb,
        Landmark::LeftHip,
        Landmark::RightHip,
        Landmark::LeftKnee,
        Landmark::RightKnee,
        Landmark::LeftAnkle,
        Landmark::RightAnkle,
        Landmark::LeftHeel,
        Landmark::RightHeel,
        Landmark::LeftFootIndex,
        Landmark::RightFootIndex,
    ];

    pub fn from_index(idx: u8) -> Option<Self> {
        Landmark::ALL.get(idx as usize).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn side(&self) -> Option<Side> {
        let idx = *self as u8;
        match idx {
            0 => None,
            1..=3 | 7 | 9 => Some(Side::Left),
            4..=6 | 8 | 10 => Some(Side::Right),
            // Body landmarks alternate left/right starting at the left shoulder
            _ if idx % 2 == 1 => Some(Side::Left),
            _ => Some(Side::Right),
        }
    }

    pub fn joint(&self) -> Joint {
        use Landmark::*;
        match self {
            Nose => Joint::Nose,
            LeftEyeInner | RightEyeInner => Joint::EyeInner,
            LeftEye | RightEye => Joint::Eye,
            LeftEyeOuter | RightEyeOuter => Joint::EyeOuter,
            LeftEar | RightEar => Joint::Ear,
            MouthLeft | MouthRight => Joint::Mouth,
            LeftShoulder | RightShoulder => Joint::Shoulder,
            LeftElbow | RightElbow => Joint::Elbow,
            LeftWrist | RightWrist => Joint::Wrist,
            LeftPinky | RightPinky => Joint::Pinky,
            LeftIndex | RightIndex => Joint::Index,
            LeftThumb | RightThumb => Joint::Thumb,
            LeftHip | RightHip => Joint::Hip,
            LeftKnee | RightKnee => Joint::Knee,
            LeftAnkle | RightAnkle => Joint::Ankle,
            LeftHeel | RightHeel => Joint::Heel,
            LeftFootIndex | RightFootIndex => Joint::FootIndex,
        }
    }

    /// The same joint on the other side of the body
    pub fn mirrored(&self) -> Self {
        match self.side() {
            Some(side) => self.joint().on_side(side.opposite()),
            None => *self,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use Landmark::*;
        match self {
            Nose => "nose",
            LeftEyeInner => "left_eye_inner",
            LeftEye => "left_eye",
            LeftEyeOuter => "left_eye_outer",
            RightEyeInner => "right_eye_inner",
            RightEye => "right_eye",
            RightEyeOuter => "right_eye_outer",
            LeftEar => "left_ear",
            RightEar => "right_ear",
            MouthLeft => "mouth_left",
            MouthRight => "mouth_right",
            LeftShoulder => "left_shoulder",
            RightShoulder => "right_shoulder",
            LeftElbow => "left_elbow",
            RightElbow => "right_elbow",
            LeftWrist => "left_wrist",
            RightWrist => "right_wrist",
            LeftPinky => "left_pinky",
            RightPinky => "right_pinky",
            LeftIndex => "left_index",
            RightIndex => "right_index",
            LeftThumb => "left_thumb",
            RightThumb => "right_thumb",
            LeftHip => "left_hip",
            RightHip => "right_hip",
            LeftKnee => "left_knee",
            RightKnee => "right_knee",
            LeftAnkle => "left_ankle",
            RightAnkle => "right_ankle",
            LeftHeel => "left_heel",
            RightHeel => "right_heel",
            LeftFootIndex => "left_foot_index",
            RightFootIndex => "right_foot_index",
        }
    }
}

impl FromStr for Landmark {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Landmark::ALL
            .iter()
            .copied()
            .find(|lm| lm.as_str() == s)
            .ok_or_else(|| Error::unknown("landmark", s))
    }
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joint reference used by rules: either a fixed landmark or a joint whose
/// side is chosen at evaluation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JointRef {
    Landmark(Landmark),
    Joint(Joint),
}

impl JointRef {
    pub fn resolve(&self, side: Side) -> Landmark {
        match self {
            JointRef::Landmark(lm) => *lm,
            JointRef::Joint(joint) => joint.on_side(side),
        }
    }

    pub fn joint(&self) -> Joint {
        match self {
            JointRef::Landmark(lm) => lm.joint(),
            JointRef::Joint(joint) => *joint,
        }
    }

    pub fn is_side_agnostic(&self) -> bool {
        matches!(self, JointRef::Joint(_))
    }
}

impl From<Landmark> for JointRef {
    fn from(lm: Landmark) -> Self {
        JointRef::Landmark(lm)
    }
}

impl From<Joint> for JointRef {
    fn from(joint: Joint) -> Self {
        JointRef::Joint(joint)
    }
}

impl FromStr for JointRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        if let Ok(lm) = key.parse::<Landmark>() {
            return Ok(JointRef::Landmark(lm));
        }
        key.parse::<Joint>()
            .map(JointRef::Joint)
            .map_err(|_| Error::unknown("joint reference", s))
    }
}

impl TryFrom<String> for JointRef {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<JointRef> for String {
    fn from(r: JointRef) -> Self {
        r.to_string()
    }
}

impl fmt::Display for JointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JointRef::Landmark(lm) => f.write_str(lm.as_str()),
            JointRef::Joint(joint) => f.write_str(joint.as_str()),
        }
    }
}

/// One detected landmark in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    /// Horizontal position, 0 = left edge, 1 = right edge
    pub x: f64,
    /// Vertical position, 0 = top edge, 1 = bottom edge
    pub y: f64,
    /// Relative depth, same scale as x
    pub z: f64,
    pub confidence: f32,
}

impl LandmarkPoint {
    pub fn new(x: f64, y: f64, z: f64, confidence: f32) -> Self {
        Self { x, y, z, confidence }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn to_vector_2d(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, 0.0)
    }

    pub fn is_visible(&self, min_confidence: f32) -> bool {
        self.confidence >= min_confidence
    }
}

/// One frame of detected landmarks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseSnapshot {
    pub timestamp: Timestamp,
    pub landmarks: HashMap<Landmark, LandmarkPoint>,
    pub overall_confidence: f32,
}

impl PoseSnapshot {
    pub fn new(timestamp: Timestamp, overall_confidence: f32) -> Self {
        Self {
            timestamp,
            landmarks: HashMap::with_capacity(Landmark::COUNT),
            overall_confidence,
        }
    }

    /// Build a snapshot from detector output keyed by landmark name.
    ///
    /// Names outside the landmark set are dropped.
    pub fn from_named<'a, I>(timestamp: Timestamp, overall_confidence: f32, points: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, LandmarkPoint)>,
    {
        let mut snapshot = Self::new(timestamp, overall_confidence);
        for (name, point) in points {
            match name.parse::<Landmark>() {
                Ok(lm) => {
                    snapshot.landmarks.insert(lm, point);
                }
                Err(_) => tracing::trace!("Ignoring unknown landmark '{}'", name),
            }
        }
        snapshot
    }

    pub fn with_landmark(mut self, landmark: Landmark, point: LandmarkPoint) -> Self {
        self.landmarks.insert(landmark, point);
        self
    }

    pub fn get(&self, landmark: Landmark) -> Option<&LandmarkPoint> {
        self.landmarks.get(&landmark)
    }

    /// The landmark if present and at or above `min_confidence`
    pub fn visible(&self, landmark: Landmark, min_confidence: f32) -> Option<&LandmarkPoint> {
        self.landmarks
            .get(&landmark)
            .filter(|p| p.is_visible(min_confidence))
    }

    pub fn confidence_of(&self, landmark: Landmark) -> f32 {
        self.landmarks.get(&landmark).map_or(0.0, |p| p.confidence)
    }
}

/// Violation severity, ordered info < warning < critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(Error::unknown("severity", s)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of form faults the engine can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    KneeCave,
    InsufficientDepth,
    ExcessiveDepth,
    ForwardLean,
    RoundedBack,
    HipSag,
    HipPike,
    ElbowFlare,
    IncompleteLockout,
    IncompleteRangeOfMotion,
    ExcessiveKneeBend,
    KneesPastToes,
    HeelRise,
    AsymmetricMovement,
    HeadPosition,
    ShoulderShrug,
    BodySwing,
    ExcessiveArch,
    WristAlignment,
    KneeHyperextension,
    TorsoRotation,
}

impl ViolationType {
    pub const ALL: [ViolationType; 21] = [
        ViolationType::KneeCave,
        ViolationType::InsufficientDepth,
        ViolationType::ExcessiveDepth,
        ViolationType::ForwardLean,
        ViolationType::RoundedBack,
        ViolationType::HipSag,
        ViolationType::HipPike,
        ViolationType::ElbowFlare,
        ViolationType::IncompleteLockout,
        ViolationType::IncompleteRangeOfMotion,
        ViolationType::ExcessiveKneeBend,
        ViolationType::KneesPastToes,
        ViolationType::HeelRise,
        ViolationType::AsymmetricMovement,
        ViolationType::HeadPosition,
        ViolationType::ShoulderShrug,
        ViolationType::BodySwing,
        ViolationType::ExcessiveArch,
        ViolationType::WristAlignment,
        ViolationType::KneeHyperextension,
        ViolationType::TorsoRotation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::KneeCave => "knee_cave",
            ViolationType::InsufficientDepth => "insufficient_depth",
            ViolationType::ExcessiveDepth => "excessive_depth",
            ViolationType::ForwardLean => "forward_lean",
            ViolationType::RoundedBack => "rounded_back",
            ViolationType::HipSag => "hip_sag",
            ViolationType::HipPike => "hip_pike",
            ViolationType::ElbowFlare => "elbow_flare",
            ViolationType::IncompleteLockout => "incomplete_lockout",
            ViolationType::IncompleteRangeOfMotion => "incomplete_range_of_motion",
            ViolationType::ExcessiveKneeBend => "excessive_knee_bend",
            ViolationType::KneesPastToes => "knees_past_toes",
            ViolationType::HeelRise => "heel_rise",
            ViolationType::AsymmetricMovement => "asymmetric_movement",
            ViolationType::HeadPosition => "head_position",
            ViolationType::ShoulderShrug => "shoulder_shrug",
            ViolationType::BodySwing => "body_swing",
            ViolationType::ExcessiveArch => "excessive_arch",
            ViolationType::WristAlignment => "wrist_alignment",
            ViolationType::KneeHyperextension => "knee_hyperextension",
            ViolationType::TorsoRotation => "torso_rotation",
        }
    }

    /// Built-in corrective cue, used when neither the rule nor the
    /// violation dictionary supplies one
    pub fn description(&self) -> &'static str {
        match self {
            ViolationType::KneeCave => "Push your knees out over your toes",
            ViolationType::InsufficientDepth => "Go deeper",
            ViolationType::ExcessiveDepth => "Don't drop so low",
            ViolationType::ForwardLean => "Keep your chest up",
            ViolationType::RoundedBack => "Keep your back flat",
            ViolationType::HipSag => "Tighten your core, don't let your hips sag",
            ViolationType::HipPike => "Lower your hips into a straight line",
            ViolationType::ElbowFlare => "Tuck your elbows",
            ViolationType::IncompleteLockout => "Finish the rep at full extension",
            ViolationType::IncompleteRangeOfMotion => "Use the full range of motion",
            ViolationType::ExcessiveKneeBend => "Keep a soft, fixed knee bend",
            ViolationType::KneesPastToes => "Sit back, keep your knees behind your toes",
            ViolationType::HeelRise => "Keep your heels down",
            ViolationType::AsymmetricMovement => "Move both sides evenly",
            ViolationType::HeadPosition => "Keep your head neutral",
            ViolationType::ShoulderShrug => "Relax your shoulders away from your ears",
            ViolationType::BodySwing => "Don't swing, control the weight",
            ViolationType::ExcessiveArch => "Brace and avoid over-arching your lower back",
            ViolationType::WristAlignment => "Stack your wrists over your elbows",
            ViolationType::KneeHyperextension => "Don't lock your knees out hard",
            ViolationType::TorsoRotation => "Keep your torso square",
        }
    }
}

impl FromStr for ViolationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        ViolationType::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == key)
            .ok_or_else(|| Error::unknown("violation type", s))
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule breach observed in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub joint: Option<Landmark>,
    pub message: String,
    pub timestamp: Timestamp,
}

impl Violation {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// The most severe violation in a set, if any
pub fn most_severe(violations: &[Violation]) -> Option<&Violation> {
    violations.iter().max_by_key(|v| v.severity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_roundtrip() {
        for i in 0..Landmark::COUNT as u8 {
            let lm = Landmark::from_index(i).unwrap();
            assert_eq!(lm as u8, i);
            assert_eq!(lm.as_str().parse::<Landmark>().unwrap(), lm);
        }
        assert!(Landmark::from_index(33).is_none());
    }

    #[test]
    fn test_landmark_sides() {
        assert_eq!(Landmark::Nose.side(), None);
        assert_eq!(Landmark::LeftShoulder.side(), Some(Side::Left));
        assert_eq!(Landmark::RightKnee.side(), Some(Side::Right));
        assert_eq!(Landmark::MouthRight.side(), Some(Side::Right));
        assert_eq!(Landmark::LeftFootIndex.side(), Some(Side::Left));
        assert_eq!(Landmark::LeftKnee.mirrored(), Landmark::RightKnee);
        assert_eq!(Landmark::Nose.mirrored(), Landmark::Nose);
    }

    #[test]
    fn test_joint_ref_parsing() {
        assert_eq!(
            "left_knee".parse::<JointRef>().unwrap(),
            JointRef::Landmark(Landmark::LeftKnee)
        );
        let hip = "Hip".parse::<JointRef>().unwrap();
        assert_eq!(hip, JointRef::Joint(Joint::Hip));
        assert_eq!(hip.resolve(Side::Right), Landmark::RightHip);
        assert!("elbow_pit".parse::<JointRef>().is_err());
    }

    #[test]
    fn test_joint_ref_serde() {
        let r: JointRef = serde_json::from_str("\"knee\"").unwrap();
        assert_eq!(r, JointRef::Joint(Joint::Knee));
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"knee\"");
        assert!(serde_json::from_str::<JointRef>("\"tail\"").is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
    }

    #[test]
    fn test_violation_type_parse() {
        for vt in ViolationType::ALL {
            assert_eq!(vt.as_str().parse::<ViolationType>().unwrap(), vt);
        }
        assert!("bad_vibes".parse::<ViolationType>().is_err());
    }

    #[test]
    fn test_most_severe() {
        let mk = |severity| Violation {
            violation_type: ViolationType::ForwardLean,
            severity,
            joint: None,
            message: String::new(),
            timestamp: Timestamp::from_millis(0),
        };
        let set = vec![mk(Severity::Info), mk(Severity::Critical), mk(Severity::Warning)];
        assert_eq!(most_severe(&set).unwrap().severity, Severity::Critical);
        assert!(most_severe(&[]).is_none());
    }

    #[test]
    fn test_snapshot_from_named() {
        let snapshot = PoseSnapshot::from_named(
            Timestamp::from_millis(10),
            0.9,
            vec![
                ("left_hip", LandmarkPoint::new(0.4, 0.5, 0.0, 0.9)),
                ("tail", LandmarkPoint::new(0.0, 0.0, 0.0, 1.0)),
            ],
        );
        assert_eq!(snapshot.landmarks.len(), 1);
        assert!(snapshot.visible(Landmark::LeftHip, 0.5).is_some());
        assert!(snapshot.visible(Landmark::LeftHip, 0.95).is_none());
    }

    #[test]
    fn test_timestamp_millis() {
        let a = Timestamp::from_millis(1_000);
        let b = Timestamp::from_millis(1_250);
        assert_eq!(b.millis_since(a), 250);
        assert_eq!(a.millis_since(b), 0);
    }
}
