//! Geometric feature extraction over pose landmarks.
//!
//! Everything here is a pure function of its inputs. Coordinates are normalized
//! image coordinates: x grows to the right, y grows downward.
//!
//! Measurements that depend on landmarks return `Option`: `None` means the
//! measurement could not be taken (landmark missing or below the confidence
//! floor), which is distinct from a genuine zero-degree angle.

use nalgebra::Vector3;

use crate::types::{Joint, Landmark, LandmarkPoint, PoseSnapshot, Side};

/// Default visibility floor for landmarks used in measurements
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Lateral knee displacement (fraction of frame width) treated as knee cave
pub const KNEE_CAVE_THRESHOLD: f64 = 0.05;

/// Shoulder width (fraction of frame width) above which the subject faces the camera
pub const FACING_SHOULDER_WIDTH: f64 = 0.15;

/// Hip drop at full squat depth as a fraction of standing body height
pub const FULL_DEPTH_DROP_RATIO: f64 = 0.3;

/// Calculate angle between two vectors (radians)
pub fn angle_between(v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    let dot = v1.dot(v2);
    let norms = v1.norm() * v2.norm();
    if norms < 1e-10 {
        0.0
    } else {
        (dot / norms).clamp(-1.0, 1.0).acos()
    }
}

/// Angle at `vertex` formed by `p1` and `p2`, in degrees within [0, 180].
///
/// Returns 0 when either arm has zero length.
pub fn angle_at(p1: &Vector3<f64>, vertex: &Vector3<f64>, p2: &Vector3<f64>) -> f64 {
    angle_between(&(p1 - vertex), &(p2 - vertex)).to_degrees()
}

/// Angle at `vertex` between two landmark points, in degrees
pub fn angle(p1: &LandmarkPoint, vertex: &LandmarkPoint, p2: &LandmarkPoint, use_3d: bool) -> f64 {
    if use_3d {
        angle_at(&p1.to_vector(), &vertex.to_vector(), &p2.to_vector())
    } else {
        angle_at(&p1.to_vector_2d(), &vertex.to_vector_2d(), &p2.to_vector_2d())
    }
}

/// Joint angle looked up by landmark, `None` if any landmark is absent or
/// below `min_confidence`
pub fn joint_angle(
    snapshot: &PoseSnapshot,
    first: Landmark,
    vertex: Landmark,
    second: Landmark,
    use_3d: bool,
    min_confidence: f32,
) -> Option<f64> {
    let a = snapshot.visible(first, min_confidence)?;
    let v = snapshot.visible(vertex, min_confidence)?;
    let b = snapshot.visible(second, min_confidence)?;
    Some(angle(a, v, b, use_3d))
}

pub fn vertical_distance(a: &LandmarkPoint, b: &LandmarkPoint) -> f64 {
    (a.y - b.y).abs()
}

pub fn horizontal_distance(a: &LandmarkPoint, b: &LandmarkPoint) -> f64 {
    (a.x - b.x).abs()
}

pub fn distance_2d(a: &LandmarkPoint, b: &LandmarkPoint) -> f64 {
    (a.to_vector_2d() - b.to_vector_2d()).norm()
}

pub fn distance_3d(a: &LandmarkPoint, b: &LandmarkPoint) -> f64 {
    (a.to_vector() - b.to_vector()).norm()
}

/// Slope dy/dx of the segment a→b, `None` for a vertical segment
pub fn slope(a: &LandmarkPoint, b: &LandmarkPoint) -> Option<f64> {
    let dx = b.x - a.x;
    if dx.abs() < 1e-10 {
        None
    } else {
        Some((b.y - a.y) / dx)
    }
}

pub fn midpoint(a: &LandmarkPoint, b: &LandmarkPoint) -> LandmarkPoint {
    LandmarkPoint::new(
        (a.x + b.x) / 2.0,
        (a.y + b.y) / 2.0,
        (a.z + b.z) / 2.0,
        a.confidence.min(b.confidence),
    )
}

/// Deviation from a straight line through `middle`, in degrees
pub fn collinearity_deviation(a: &LandmarkPoint, middle: &LandmarkPoint, b: &LandmarkPoint) -> f64 {
    180.0 - angle(a, middle, b, false)
}

/// Whether three points lie on a line, within `tolerance_degrees` of 180°
pub fn are_collinear(
    a: &LandmarkPoint,
    middle: &LandmarkPoint,
    b: &LandmarkPoint,
    tolerance_degrees: f64,
) -> bool {
    collinearity_deviation(a, middle, b) <= tolerance_degrees
}

const SIDE_JOINTS: [Joint; 6] = [
    Joint::Shoulder,
    Joint::Elbow,
    Joint::Wrist,
    Joint::Hip,
    Joint::Knee,
    Joint::Ankle,
];

fn side_confidence(snapshot: &PoseSnapshot, side: Side) -> f32 {
    SIDE_JOINTS
        .iter()
        .map(|j| snapshot.confidence_of(j.on_side(side)))
        .sum()
}

/// The body side better seen by the camera, by summed joint confidence.
/// Ties go to the left side.
pub fn preferred_side(snapshot: &PoseSnapshot) -> Side {
    if side_confidence(snapshot, Side::Right) > side_confidence(snapshot, Side::Left) {
        Side::Right
    } else {
        Side::Left
    }
}

/// Whether the subject faces the camera (wide shoulders) rather than standing side-on
pub fn is_facing_camera(snapshot: &PoseSnapshot, min_confidence: f32) -> Option<bool> {
    let left = snapshot.visible(Landmark::LeftShoulder, min_confidence)?;
    let right = snapshot.visible(Landmark::RightShoulder, min_confidence)?;
    Some(horizontal_distance(left, right) > FACING_SHOULDER_WIDTH)
}

/// Inward displacement of the knee from the hip–ankle midline.
///
/// Positive values point toward the body's centre line, located from both
/// hips. `None` when the opposite hip is not visible, as in a side-on view.
pub fn knee_cave_offset(snapshot: &PoseSnapshot, side: Side, min_confidence: f32) -> Option<f64> {
    let hip = snapshot.visible(Joint::Hip.on_side(side), min_confidence)?;
    let knee = snapshot.visible(Joint::Knee.on_side(side), min_confidence)?;
    let ankle = snapshot.visible(Joint::Ankle.on_side(side), min_confidence)?;

    let expected_x = (hip.x + ankle.x) / 2.0;
    let displacement = knee.x - expected_x;

    let other_hip = snapshot.visible(Joint::Hip.on_side(side.opposite()), min_confidence)?;
    let centre_x = (hip.x + other_hip.x) / 2.0;
    let inward = (centre_x - expected_x).signum();
    Some(displacement * inward)
}

/// Knee cave on `side`: inward displacement beyond [`KNEE_CAVE_THRESHOLD`]
pub fn detect_knee_cave(snapshot: &PoseSnapshot, side: Side, min_confidence: f32) -> Option<bool> {
    knee_cave_offset(snapshot, side, min_confidence).map(|offset| offset > KNEE_CAVE_THRESHOLD)
}

/// Estimated squat depth in [0, 1], where 1 is hips at or below parallel.
///
/// With a standing `reference` pose the estimate is the hip drop relative to
/// the drop expected at full depth for the subject's standing height. Without
/// one, it compares the hip and knee heights against the thigh length.
pub fn estimate_squat_depth(
    snapshot: &PoseSnapshot,
    reference: Option<&PoseSnapshot>,
    min_confidence: f32,
) -> Option<f64> {
    let side = preferred_side(snapshot);
    let hip_lm = Joint::Hip.on_side(side);
    let hip = snapshot.visible(hip_lm, min_confidence)?;

    if let Some(reference) = reference {
        if let Some(depth) = depth_from_reference(hip, reference, side, min_confidence) {
            return Some(depth);
        }
    }

    let knee = snapshot.visible(Joint::Knee.on_side(side), min_confidence)?;
    let thigh = distance_2d(hip, knee);
    if thigh < 1e-6 {
        return None;
    }
    // Standing: knee sits a full thigh length below the hip. Parallel: level.
    Some((1.0 - (knee.y - hip.y) / thigh).clamp(0.0, 1.0))
}

fn depth_from_reference(
    hip: &LandmarkPoint,
    reference: &PoseSnapshot,
    side: Side,
    min_confidence: f32,
) -> Option<f64> {
    let ref_hip = reference.visible(Joint::Hip.on_side(side), min_confidence)?;
    let ref_ankle = reference.visible(Joint::Ankle.on_side(side), min_confidence)?;
    let ref_top = reference
        .visible(Landmark::Nose, min_confidence)
        .or_else(|| reference.visible(Joint::Shoulder.on_side(side), min_confidence))?;

    let body_height = ref_ankle.y - ref_top.y;
    let max_drop = body_height * FULL_DEPTH_DROP_RATIO;
    if max_drop < 1e-6 {
        return None;
    }

    let drop = hip.y - ref_hip.y;
    Some((drop / max_drop).clamp(0.0, 1.0))
}
