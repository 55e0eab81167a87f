use serde::Serialize;

use crate::config::{Constraints, HeadConfig};
use crate::pose::FaceKeypoints;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadTilt {
    #[default]
    Neutral,
    Down,
    Up,
}

/// Minima collected while a rep is in progress. Reset after each completion.
#[derive(Debug, Clone, Copy)]
struct RepWindow {
    min_knee: f64,
    min_lean: f64,
    min_shin: f64,
    head_tilt: HeadTilt,
    mid_ms: Option<u64>,
}

impl Default for RepWindow {
    fn default() -> Self {
        Self {
            min_knee: 180.0,
            min_lean: 90.0,
            min_shin: 180.0,
            head_tilt: HeadTilt::Neutral,
            mid_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletedRep {
    pub rep_index: u32,
    pub min_knee: f64,
    pub min_lean: f64,
    pub min_shin: f64,
    pub head_tilt: HeadTilt,
    /// Threshold crossing down to threshold crossing up.
    pub elapsed_ms: u64,
    /// Deepest knee sample to standing.
    pub remaining_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RepEvent {
    Started { at_ms: u64 },
    Completed(CompletedRep),
}

#[derive(Debug, Clone, Default)]
pub struct RepTracker {
    squatting: bool,
    start_ms: u64,
    rep_index: u32,
    window: RepWindow,
}

impl RepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_squatting(&self) -> bool {
        self.squatting
    }

    pub fn rep_index(&self) -> u32 {
        self.rep_index
    }

    /// Milliseconds into the current rep, or `None` while standing.
    pub fn elapsed_ms(&self, now_ms: u64) -> Option<u64> {
        self.is_squatting().then(|| now_ms.saturating_sub(self.start_ms))
    }

    /// Feed an accepted knee sample. Crossing `frame_depth` downwards starts a
    /// rep; crossing back up completes it and clears the window.
    pub fn on_knee(&mut self, knee: f64, now_ms: u64, c: &Constraints) -> Option<RepEvent> {
        if self.window.min_knee > knee {
            self.window.min_knee = knee;
            self.window.mid_ms = Some(now_ms);
        }

        if knee <= c.frame_depth && !self.squatting {
            self.squatting = true;
            self.start_ms = now_ms;
            return Some(RepEvent::Started { at_ms: now_ms });
        }

        if knee > c.frame_depth && self.squatting {
            self.squatting = false;
            self.rep_index += 1;

            let mid_ms = self.window.mid_ms.unwrap_or(self.start_ms);
            let rep = CompletedRep {
                rep_index: self.rep_index,
                min_knee: self.window.min_knee,
                min_lean: self.window.min_lean,
                min_shin: self.window.min_shin,
                head_tilt: self.window.head_tilt,
                elapsed_ms: now_ms.saturating_sub(self.start_ms),
                remaining_ms: now_ms.saturating_sub(mid_ms),
            };
            self.window = RepWindow::default();
            return Some(RepEvent::Completed(rep));
        }

        None
    }

    pub fn on_shin(&mut self, dorsiflexion: f64) {
        if self.window.min_shin > dorsiflexion {
            self.window.min_shin = dorsiflexion;
        }
    }

    pub fn on_lean(&mut self, trunk_lean: f64) {
        if self.window.min_lean > trunk_lean {
            self.window.min_lean = trunk_lean;
        }
    }

    /// First tilt seen during a squat sticks for the rest of the rep.
    pub fn on_face(&mut self, face: &FaceKeypoints, head: &HeadConfig) {
        if !self.squatting || self.window.head_tilt != HeadTilt::Neutral {
            return;
        }
        let confident = [face.nose, face.left_eye, face.right_eye]
            .iter()
            .all(|k| k.confidence > head.min_confidence);
        if !confident {
            return;
        }
        let eye_mid_y = (face.left_eye.y + face.right_eye.y) / 2.0;
        let nose_offset = face.nose.y - eye_mid_y;
        if nose_offset > head.down_offset {
            self.window.head_tilt = HeadTilt::Down;
        } else if nose_offset < head.up_offset {
            self.window.head_tilt = HeadTilt::Up;
        }
    }

    /// Drop any in-flight rep. The rep counter survives.
    pub fn abort(&mut self) {
        self.squatting = false;
        self.start_ms = 0;
        self.window = RepWindow::default();
    }
}
