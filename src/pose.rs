//! Pose frames as delivered by the pose-estimation model, and side selection.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub confidence: f64,
}

impl Keypoint {
    #[cfg(test)]
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    pub fn point(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    pub fn flipped(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Left => "left",
            Side::Right => "right",
        })
    }
}

impl FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Side::Left),
            "right" | "r" => Ok(Side::Right),
            other => Err(anyhow!("unknown side '{other}' (expected left|right)")),
        }
    }
}

/// Landmarks of one detected subject. Missing landmarks decode with zero
/// confidence so the gate drops them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pose {
    pub nose: Keypoint,
    pub left_eye: Keypoint,
    pub right_eye: Keypoint,
    pub left_shoulder: Keypoint,
    pub right_shoulder: Keypoint,
    pub left_hip: Keypoint,
    pub right_hip: Keypoint,
    pub left_knee: Keypoint,
    pub right_knee: Keypoint,
    pub left_ankle: Keypoint,
    pub right_ankle: Keypoint,
}

/// Knee, hip, ankle and shoulder of the tracked side.
#[derive(Debug, Clone, Copy)]
pub struct LegChain {
    pub knee: Keypoint,
    pub hip: Keypoint,
    pub ankle: Keypoint,
    pub shoulder: Keypoint,
}

#[derive(Debug, Clone, Copy)]
pub struct FaceKeypoints {
    pub nose: Keypoint,
    pub left_eye: Keypoint,
    pub right_eye: Keypoint,
}

impl Pose {
    pub fn leg_chain(&self, side: Side) -> LegChain {
        match side {
            Side::Left => LegChain {
                knee: self.left_knee,
                hip: self.left_hip,
                ankle: self.left_ankle,
                shoulder: self.left_shoulder,
            },
            Side::Right => LegChain {
                knee: self.right_knee,
                hip: self.right_hip,
                ankle: self.right_ankle,
                shoulder: self.right_shoulder,
            },
        }
    }

    pub fn face(&self) -> FaceKeypoints {
        FaceKeypoints {
            nose: self.nose,
            left_eye: self.left_eye,
            right_eye: self.right_eye,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subject {
    pub pose: Pose,
    // rendering only
    #[allow(dead_code)]
    #[serde(default)]
    pub skeleton: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoseFrame {
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    #[serde(default)]
    pub poses: Vec<Subject>,
}

impl PoseFrame {
    pub fn from_json_line(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim()).map_err(|e| anyhow!("bad pose frame: {e}"))
    }

    /// Only the first detected subject is ever tracked.
    pub fn primary(&self) -> Option<&Pose> {
        self.poses.first().map(|s| &s.pose)
    }
}
