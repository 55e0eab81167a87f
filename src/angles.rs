//! Joint angles from raw keypoint positions.
//!
//! Every angle is the signed difference of two `atan2` headings taken at a
//! vertex. Dorsiflexion and trunk lean use an artificial point projected onto
//! the vertex's row, so they read against a vertical reference. The right side
//! takes `360 - x` where the left side takes `x` (and vice versa): mirroring
//! reverses the order of the two rays around the joint, and the flip keeps
//! "smaller = more flexed" on both sides.

use serde::Serialize;

use crate::pose::{LegChain, Point, Side};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AngleSample {
    pub knee_flexion: f64,
    pub hip_flexion: f64,
    pub dorsiflexion: f64,
    pub trunk_lean: f64,
}

/// Heading of `a` minus heading of `b`, seen from `vertex`, in degrees.
/// Not normalised: results may be negative or above 180.
pub fn joint_angle(vertex: Point, a: Point, b: Point) -> f64 {
    let ha = (a.y - vertex.y).atan2(a.x - vertex.x);
    let hb = (b.y - vertex.y).atan2(b.x - vertex.x);
    (ha - hb).to_degrees()
}

pub fn compute(chain: &LegChain, side: Side) -> AngleSample {
    let knee = chain.knee.point();
    let hip = chain.hip.point();
    let ankle = chain.ankle.point();
    let shoulder = chain.shoulder.point();

    // knee dropped to ankle height, shoulder dropped to hip height
    let an_knee = Point {
        x: knee.x,
        y: ankle.y,
    };
    let s_hip = Point {
        x: shoulder.x,
        y: hip.y,
    };

    let knee_raw = joint_angle(knee, ankle, hip);
    let hip_raw = joint_angle(hip, knee, shoulder);
    let ankle_raw = joint_angle(ankle, an_knee, knee);
    let trunk_raw = joint_angle(hip, s_hip, shoulder);

    match side {
        Side::Left => AngleSample {
            knee_flexion: knee_raw,
            hip_flexion: 360.0 - hip_raw,
            dorsiflexion: 360.0 - ankle_raw,
            trunk_lean: 360.0 - trunk_raw,
        },
        Side::Right => AngleSample {
            knee_flexion: 360.0 - knee_raw,
            hip_flexion: hip_raw,
            dorsiflexion: ankle_raw,
            trunk_lean: trunk_raw,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    const EPS: f64 = 1e-9;

    // Mid-squat, subject facing towards -x as seen from its left side.
    fn left_chain() -> LegChain {
        LegChain {
            knee: Keypoint::new(300.0, 300.0, 0.9),
            hip: Keypoint::new(380.0, 240.0, 0.9),
            ankle: Keypoint::new(330.0, 400.0, 0.9),
            shoulder: Keypoint::new(340.0, 120.0, 0.9),
        }
    }

    fn mirror(chain: &LegChain, width: f64) -> LegChain {
        let m = |k: Keypoint| Keypoint::new(width - k.x, k.y, k.confidence);
        LegChain {
            knee: m(chain.knee),
            hip: m(chain.hip),
            ankle: m(chain.ankle),
            shoulder: m(chain.shoulder),
        }
    }

    #[test]
    fn left_side_values() {
        let a = compute(&left_chain(), Side::Left);
        assert!((a.knee_flexion - 110.17).abs() < 0.01, "{a:?}");
        assert!((a.hip_flexion - 108.43).abs() < 0.01, "{a:?}");
        assert!((a.dorsiflexion - 73.30).abs() < 0.01, "{a:?}");
        assert!((a.trunk_lean - 71.57).abs() < 0.01, "{a:?}");
    }

    #[test]
    fn identical_input_is_bit_identical() {
        let a = compute(&left_chain(), Side::Left);
        let b = compute(&left_chain(), Side::Left);
        assert_eq!(a.knee_flexion.to_bits(), b.knee_flexion.to_bits());
        assert_eq!(a.hip_flexion.to_bits(), b.hip_flexion.to_bits());
        assert_eq!(a.dorsiflexion.to_bits(), b.dorsiflexion.to_bits());
        assert_eq!(a.trunk_lean.to_bits(), b.trunk_lean.to_bits());
    }

    #[test]
    fn mirrored_right_side_matches_left() {
        let left = compute(&left_chain(), Side::Left);
        let right = compute(&mirror(&left_chain(), 640.0), Side::Right);
        assert!((left.knee_flexion - right.knee_flexion).abs() < EPS);
        assert!((left.hip_flexion - right.hip_flexion).abs() < EPS);
        assert!((left.dorsiflexion - right.dorsiflexion).abs() < EPS);
        assert!((left.trunk_lean - right.trunk_lean).abs() < EPS);
    }

    #[test]
    fn straight_leg_is_180() {
        let chain = LegChain {
            knee: Keypoint::new(300.0, 300.0, 1.0),
            hip: Keypoint::new(300.0, 200.0, 1.0),
            ankle: Keypoint::new(300.0, 400.0, 1.0),
            shoulder: Keypoint::new(300.0, 50.0, 1.0),
        };
        let a = compute(&chain, Side::Left);
        assert!((a.knee_flexion - 180.0).abs() < EPS);
        assert!((a.hip_flexion - 180.0).abs() < EPS);
    }

    #[test]
    fn deeper_knee_reads_smaller() {
        let shallow = compute(&left_chain(), Side::Left).knee_flexion;
        let mut deep = left_chain();
        deep.hip = Keypoint::new(400.0, 290.0, 0.9);
        let deep = compute(&deep, Side::Left).knee_flexion;
        assert!(deep < shallow, "deep={deep} shallow={shallow}");
    }
}
