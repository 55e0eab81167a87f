//! Session state and the per-frame pass.

use log::debug;
use serde::Serialize;

use crate::angles::{self, AngleSample};
use crate::config::Profile;
use crate::gate::{ConfidenceGate, GateOutcome, Metric};
use crate::pose::{PoseFrame, Side};
use crate::reps::{RepEvent, RepTracker};
use crate::verdicts::{self, RepReport};

/// "No flexion yet".
pub const NEUTRAL_ANGLE: f64 = 180.0;

/// Best (smallest) value per metric since the last reset, rounded to whole
/// degrees. Unmeasured metrics hold `NEUTRAL_ANGLE`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionExtrema {
    pub knee: f64,
    pub hip: f64,
    pub dorsiflexion: f64,
    pub trunk: f64,
    #[serde(skip)]
    measured: [bool; 4],
}

impl Default for SessionExtrema {
    fn default() -> Self {
        Self {
            knee: NEUTRAL_ANGLE,
            hip: NEUTRAL_ANGLE,
            dorsiflexion: NEUTRAL_ANGLE,
            trunk: NEUTRAL_ANGLE,
            measured: [false; 4],
        }
    }
}

fn slot_index(metric: Metric) -> usize {
    match metric {
        Metric::Knee => 0,
        Metric::Hip => 1,
        Metric::Ankle => 2,
        Metric::Trunk => 3,
    }
}

impl SessionExtrema {
    /// Returns true when the stored best moved.
    pub fn offer(&mut self, metric: Metric, angle: f64) -> bool {
        let slot = match metric {
            Metric::Knee => &mut self.knee,
            Metric::Hip => &mut self.hip,
            Metric::Ankle => &mut self.dorsiflexion,
            Metric::Trunk => &mut self.trunk,
        };
        if angle < *slot {
            *slot = angle.round();
            self.measured[slot_index(metric)] = true;
            true
        } else {
            false
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Knee => self.knee,
            Metric::Hip => self.hip,
            Metric::Ankle => self.dorsiflexion,
            Metric::Trunk => self.trunk,
        }
    }

    /// The stored best, or `None` when nothing was accepted since the last
    /// reset. A sample that rounds to 180 still counts as measured.
    pub fn measured(&self, metric: Metric) -> Option<f64> {
        self.measured[slot_index(metric)].then(|| self.get(metric))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateReport {
    pub knee: GateOutcome,
    pub hip: GateOutcome,
    pub ankle: GateOutcome,
    pub trunk: GateOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub angles: AngleSample,
    pub gate: GateReport,
    pub best_changed: bool,
    pub rep_event: Option<RepEvent>,
    pub rep_report: Option<RepReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FrameOutcome {
    NoSubject,
    Processed(FrameReport),
}

#[derive(Debug, Clone)]
pub struct SessionState {
    side: Side,
    extrema: SessionExtrema,
    reps: RepTracker,
}

impl SessionState {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            extrema: SessionExtrema::default(),
            reps: RepTracker::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn extrema(&self) -> &SessionExtrema {
        &self.extrema
    }

    pub fn reps(&self) -> &RepTracker {
        &self.reps
    }

    /// Clears extrema and any in-flight rep. The rep counter is kept.
    pub fn reset(&mut self) {
        self.extrema = SessionExtrema::default();
        self.reps.abort();
    }

    pub fn switch_side(&mut self) {
        self.side = self.side.flipped();
        self.reset();
    }

    pub fn process_frame(&mut self, frame: &PoseFrame, now_ms: u64, profile: &Profile) -> FrameOutcome {
        let Some(pose) = frame.primary() else {
            return FrameOutcome::NoSubject;
        };

        let chain = pose.leg_chain(self.side);
        let a = angles::compute(&chain, self.side);
        let gate = ConfidenceGate::new(&profile.gate);
        let c = &profile.constraints;

        let mut best_changed = false;
        let mut rep_event = None;
        let mut rep_report = None;

        let knee = gate.check(Metric::Knee, chain.knee.confidence, a.knee_flexion, self.extrema.hip);
        if knee.accepted() {
            best_changed |= self.extrema.offer(Metric::Knee, a.knee_flexion);
            rep_event = self.reps.on_knee(a.knee_flexion, now_ms, c);
            if let Some(RepEvent::Completed(rep)) = &rep_event {
                rep_report = Some(verdicts::evaluate(rep, c, profile.head.enabled));
            }
        }

        let hip = gate.check(Metric::Hip, chain.hip.confidence, a.hip_flexion, self.extrema.hip);
        if hip.accepted() {
            best_changed |= self.extrema.offer(Metric::Hip, a.hip_flexion);
        }

        let ankle = gate.check(Metric::Ankle, chain.ankle.confidence, a.dorsiflexion, self.extrema.hip);
        if ankle.accepted() {
            self.reps.on_shin(a.dorsiflexion);
            best_changed |= self.extrema.offer(Metric::Ankle, a.dorsiflexion);
        }

        let trunk = gate.check(Metric::Trunk, chain.shoulder.confidence, a.trunk_lean, self.extrema.hip);
        if trunk.accepted() {
            self.reps.on_lean(a.trunk_lean);
            best_changed |= self.extrema.offer(Metric::Trunk, a.trunk_lean);
        }

        if profile.head.enabled {
            self.reps.on_face(&pose.face(), &profile.head);
        }

        debug!(
            "frame t={now_ms} knee={:.1}({knee:?}) hip={:.1}({hip:?}) ankle={:.1}({ankle:?}) trunk={:.1}({trunk:?})",
            a.knee_flexion, a.hip_flexion, a.dorsiflexion, a.trunk_lean
        );

        FrameOutcome::Processed(FrameReport {
            angles: a,
            gate: GateReport {
                knee,
                hip,
                ankle,
                trunk,
            },
            best_changed,
            rep_event,
            rep_report,
        })
    }
}
