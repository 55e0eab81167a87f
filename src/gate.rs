//! Per-metric sample acceptance.
//!
//! A sample passes only if its governing keypoint is confident enough and the
//! angle falls in the metric's plausible band. Rejections are reported, never
//! raised; callers leave their state untouched on anything but `Accepted`.

use serde::Serialize;

use crate::config::GateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Knee,
    Hip,
    Ankle,
    Trunk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Accepted,
    LowConfidence,
    OutOfRange,
}

impl GateOutcome {
    pub fn accepted(self) -> bool {
        self == GateOutcome::Accepted
    }
}

#[derive(Debug, Clone)]
pub struct ConfidenceGate {
    min_confidence: f64,
    min_angle: f64,
    max_knee: f64,
    max_trunk: f64,
}

impl ConfidenceGate {
    pub fn new(cfg: &GateConfig) -> Self {
        Self {
            min_confidence: cfg.min_confidence,
            min_angle: cfg.min_angle,
            max_knee: cfg.max_knee,
            max_trunk: cfg.max_trunk,
        }
    }

    /// `best_hip` is the session's current best hip value; hip samples must
    /// beat it to count.
    pub fn check(&self, metric: Metric, confidence: f64, angle: f64, best_hip: f64) -> GateOutcome {
        if !(confidence > self.min_confidence) {
            return GateOutcome::LowConfidence;
        }
        let in_band = match metric {
            Metric::Knee => angle > self.min_angle && angle <= self.max_knee,
            Metric::Hip => angle > self.min_angle && angle < best_hip,
            Metric::Ankle => angle > self.min_angle,
            Metric::Trunk => angle > self.min_angle && angle <= self.max_trunk,
        };
        if in_band {
            GateOutcome::Accepted
        } else {
            GateOutcome::OutOfRange
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> ConfidenceGate {
        ConfidenceGate::new(&GateConfig {
            min_confidence: 0.5,
            min_angle: 20.0,
            max_knee: 180.0,
            max_trunk: 90.0,
        })
    }

    #[test]
    fn confidence_must_exceed_threshold() {
        let g = gate();
        assert_eq!(g.check(Metric::Knee, 0.5, 120.0, 180.0), GateOutcome::LowConfidence);
        assert_eq!(g.check(Metric::Knee, 0.51, 120.0, 180.0), GateOutcome::Accepted);
        // NaN confidence never passes
        assert_eq!(g.check(Metric::Knee, f64::NAN, 120.0, 180.0), GateOutcome::LowConfidence);
    }

    #[test]
    fn knee_band_is_half_open() {
        let g = gate();
        assert_eq!(g.check(Metric::Knee, 0.9, 20.0, 180.0), GateOutcome::OutOfRange);
        assert_eq!(g.check(Metric::Knee, 0.9, 180.0, 180.0), GateOutcome::Accepted);
        assert_eq!(g.check(Metric::Knee, 0.9, 180.01, 180.0), GateOutcome::OutOfRange);
    }

    #[test]
    fn hip_must_beat_current_best() {
        let g = gate();
        assert_eq!(g.check(Metric::Hip, 0.9, 100.0, 100.0), GateOutcome::OutOfRange);
        assert_eq!(g.check(Metric::Hip, 0.9, 99.5, 100.0), GateOutcome::Accepted);
    }

    #[test]
    fn ankle_has_no_upper_bound() {
        let g = gate();
        assert_eq!(g.check(Metric::Ankle, 0.9, 300.0, 180.0), GateOutcome::Accepted);
        assert_eq!(g.check(Metric::Ankle, 0.9, 15.0, 180.0), GateOutcome::OutOfRange);
    }

    #[test]
    fn trunk_band() {
        let g = gate();
        assert_eq!(g.check(Metric::Trunk, 0.9, 90.0, 180.0), GateOutcome::Accepted);
        assert_eq!(g.check(Metric::Trunk, 0.9, 90.5, 180.0), GateOutcome::OutOfRange);
        assert_eq!(g.check(Metric::Trunk, 0.4, 60.0, 180.0), GateOutcome::LowConfidence);
    }
}
