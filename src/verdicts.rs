//! Per-rep quality verdicts.

use serde::Serialize;

use crate::config::Constraints;
use crate::reps::{CompletedRep, HeadTilt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Poor,
    Fair,
    Good,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    DepthTooShallow,
    DepthCouldGoLower,
    DepthPerfect,
    LeanTooForward,
    LeanTooUpright,
    LeanGreat,
    TempoTooFast,
    TempoBalanced,
    HeadDown,
    HeadUp,
    HeadNeutral,
}

impl Verdict {
    pub fn key(self) -> &'static str {
        match self {
            Verdict::DepthTooShallow => "depth.too_shallow",
            Verdict::DepthCouldGoLower => "depth.could_go_lower",
            Verdict::DepthPerfect => "depth.perfect",
            Verdict::LeanTooForward => "lean.too_forward",
            Verdict::LeanTooUpright => "lean.too_upright",
            Verdict::LeanGreat => "lean.great",
            Verdict::TempoTooFast => "tempo.too_fast",
            Verdict::TempoBalanced => "tempo.balanced",
            Verdict::HeadDown => "head.down",
            Verdict::HeadUp => "head.up",
            Verdict::HeadNeutral => "head.neutral",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Verdict::DepthTooShallow
            | Verdict::LeanTooForward
            | Verdict::TempoTooFast
            | Verdict::HeadDown => Severity::Poor,
            Verdict::DepthCouldGoLower | Verdict::LeanTooUpright | Verdict::HeadUp => {
                Severity::Fair
            }
            Verdict::DepthPerfect
            | Verdict::LeanGreat
            | Verdict::TempoBalanced
            | Verdict::HeadNeutral => Severity::Good,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Verdict::DepthTooShallow => "Your depth is too high, you must go lower!",
            Verdict::DepthCouldGoLower => {
                "Your depth is in a good range, but you might consider going a little lower!"
            }
            Verdict::DepthPerfect => "Perfect depth! Keep it going!",
            Verdict::LeanTooForward => "You lean too forward! Straighten your spine!",
            Verdict::LeanTooUpright => {
                "Your posture seems too straight! This may be affected by your depth."
            }
            Verdict::LeanGreat => "Great posture! Good job!",
            Verdict::TempoTooFast => "You are going down too fast! Try to go down slower!",
            Verdict::TempoBalanced => {
                "Great balance between eccentric and concentric phase! Keep it going!"
            }
            Verdict::HeadDown => "Don't look down! Keep your head forward!",
            Verdict::HeadUp => {
                "Your head tilt had a good positioning, but maybe looking forward instead of up would be more comfortable for you!"
            }
            Verdict::HeadNeutral => "Your head tilt had a good positioning! Nice!",
        }
    }
}

pub fn classify_depth(min_knee: f64, c: &Constraints) -> Verdict {
    if min_knee > c.depth_superior_range {
        Verdict::DepthTooShallow
    } else if min_knee > c.depth_medium_range {
        Verdict::DepthCouldGoLower
    } else {
        Verdict::DepthPerfect
    }
}

pub fn classify_lean(min_lean: f64, min_shin: f64, c: &Constraints) -> Verdict {
    if min_lean < c.minimum_forward_lean_range
        || (min_lean - min_shin).abs() > c.forward_lean_range_difference
    {
        Verdict::LeanTooForward
    } else if min_lean > c.maximum_forward_lean_range {
        Verdict::LeanTooUpright
    } else {
        Verdict::LeanGreat
    }
}

/// `remaining_ms` runs from the deepest point to standing. The comparison is
/// kept exactly as coached: twice that span longer than the rep reads as a
/// rushed descent. Widened so frame timestamps near `u64::MAX` cannot wrap.
pub fn classify_tempo(remaining_ms: u64, elapsed_ms: u64) -> Verdict {
    if 2 * u128::from(remaining_ms) > u128::from(elapsed_ms) {
        Verdict::TempoTooFast
    } else {
        Verdict::TempoBalanced
    }
}

pub fn classify_head(tilt: HeadTilt) -> Verdict {
    match tilt {
        HeadTilt::Down => Verdict::HeadDown,
        HeadTilt::Up => Verdict::HeadUp,
        HeadTilt::Neutral => Verdict::HeadNeutral,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepReport {
    pub rep: CompletedRep,
    pub verdicts: Vec<Verdict>,
}

impl RepReport {
    pub fn worst(&self) -> Option<Severity> {
        self.verdicts.iter().map(|v| v.severity()).min()
    }
}

/// Verdicts in reporting order: depth, lean, tempo, then head when enabled.
pub fn evaluate(rep: &CompletedRep, c: &Constraints, head_check: bool) -> RepReport {
    let mut verdicts = vec![
        classify_depth(rep.min_knee, c),
        classify_lean(rep.min_lean, rep.min_shin, c),
        classify_tempo(rep.remaining_ms, rep.elapsed_ms),
    ];
    if head_check {
        verdicts.push(classify_head(rep.head_tilt));
    }
    RepReport {
        rep: *rep,
        verdicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;

    fn c() -> Constraints {
        Profile::builtin().unwrap().constraints
    }

    fn rep(min_knee: f64, min_lean: f64, min_shin: f64) -> CompletedRep {
        CompletedRep {
            rep_index: 1,
            min_knee,
            min_lean,
            min_shin,
            head_tilt: HeadTilt::Down,
            elapsed_ms: 2000,
            remaining_ms: 800,
        }
    }

    #[test]
    fn depth_boundaries() {
        let c = c();
        assert_eq!(classify_depth(100.0, &c), Verdict::DepthCouldGoLower);
        assert_eq!(classify_depth(100.01, &c), Verdict::DepthTooShallow);
        assert_eq!(classify_depth(85.0, &c), Verdict::DepthPerfect);
        assert_eq!(classify_depth(85.01, &c), Verdict::DepthCouldGoLower);
        assert_eq!(classify_depth(60.0, &c), Verdict::DepthPerfect);
    }

    #[test]
    fn lean_bands() {
        let c = c();
        assert_eq!(classify_lean(44.0, 44.0, &c), Verdict::LeanTooForward);
        // within band but far from shin angle
        assert_eq!(classify_lean(60.0, 40.0, &c), Verdict::LeanTooForward);
        assert_eq!(classify_lean(75.0, 70.0, &c), Verdict::LeanTooUpright);
        assert_eq!(classify_lean(60.0, 55.0, &c), Verdict::LeanGreat);
        assert_eq!(classify_lean(45.0, 60.0, &c), Verdict::LeanGreat);
        assert_eq!(classify_lean(70.0, 70.0, &c), Verdict::LeanGreat);
    }

    #[test]
    fn untouched_windows_read_too_forward() {
        // no trunk or shin samples: lean 90, shin 180
        assert_eq!(classify_lean(90.0, 180.0, &c()), Verdict::LeanTooForward);
    }

    #[test]
    fn tempo_literal_comparison() {
        assert_eq!(classify_tempo(800, 2000), Verdict::TempoBalanced);
        assert_eq!(classify_tempo(1000, 2000), Verdict::TempoBalanced);
        assert_eq!(classify_tempo(1001, 2000), Verdict::TempoTooFast);
        assert_eq!(classify_tempo(0, 0), Verdict::TempoBalanced);
    }

    #[test]
    fn tempo_holds_at_timestamp_extremes() {
        assert_eq!(classify_tempo(u64::MAX, u64::MAX), Verdict::TempoTooFast);
        assert_eq!(classify_tempo(u64::MAX / 2, u64::MAX), Verdict::TempoBalanced);
        assert_eq!(classify_tempo(u64::MAX / 2 + 1, u64::MAX), Verdict::TempoTooFast);
    }

    #[test]
    fn head_verdict_only_when_enabled() {
        let c = c();
        let off = evaluate(&rep(90.0, 60.0, 55.0), &c, false);
        assert_eq!(
            off.verdicts,
            vec![
                Verdict::DepthCouldGoLower,
                Verdict::LeanGreat,
                Verdict::TempoBalanced
            ]
        );
        let on = evaluate(&rep(90.0, 60.0, 55.0), &c, true);
        assert_eq!(on.verdicts.last(), Some(&Verdict::HeadDown));
        assert_eq!(on.worst(), Some(Severity::Poor));
        assert_eq!(off.worst(), Some(Severity::Fair));
    }

    #[test]
    fn keys_are_unique() {
        let all = [
            Verdict::DepthTooShallow,
            Verdict::DepthCouldGoLower,
            Verdict::DepthPerfect,
            Verdict::LeanTooForward,
            Verdict::LeanTooUpright,
            Verdict::LeanGreat,
            Verdict::TempoTooFast,
            Verdict::TempoBalanced,
            Verdict::HeadDown,
            Verdict::HeadUp,
            Verdict::HeadNeutral,
        ];
        let mut keys: Vec<_> = all.iter().map(|v| v.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), all.len());
    }
}
