//! What a client renders: best values, the verdict log, recommendations.

use serde::Serialize;
use std::collections::VecDeque;

use crate::pose::Side;
use crate::gate::Metric;
use crate::session::SessionExtrema;
use crate::verdicts::{RepReport, Severity};

/// `None` renders as "-": nothing measured since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BestValues {
    pub knee: Option<i64>,
    pub hip: Option<i64>,
    pub shin: Option<i64>,
    pub trunk: Option<i64>,
}

impl BestValues {
    fn from_extrema(e: &SessionExtrema) -> Self {
        let shown = |m: Metric| e.measured(m).map(|v| v as i64);
        Self {
            knee: shown(Metric::Knee),
            hip: shown(Metric::Hip),
            shin: shown(Metric::Ankle),
            trunk: shown(Metric::Trunk),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    pub rep: u32,
    pub severity: Option<Severity>,
    pub key: Option<&'static str>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scoreboard {
    pub side: Side,
    pub reps: u32,
    pub best: BestValues,
    /// Newest first.
    log: VecDeque<LogLine>,
    #[serde(skip)]
    capacity: usize,
    pub recommendations: Vec<String>,
    #[serde(skip)]
    epoch: u64,
}

/// Seconds with zero-padded hundredths: 1050 ms reads "1.05", never "1.5".
pub fn format_elapsed(ms: u64) -> String {
    format!("{}.{:02}", ms / 1000, (ms % 1000) / 10)
}

impl Scoreboard {
    pub fn new(side: Side, capacity: usize) -> Self {
        Self {
            side,
            reps: 0,
            best: BestValues::default(),
            log: VecDeque::new(),
            capacity: capacity.max(1),
            recommendations: Vec::new(),
            epoch: 0,
        }
    }

    #[cfg(test)]
    pub fn log(&self) -> impl Iterator<Item = &LogLine> {
        self.log.iter()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.log.truncate(self.capacity);
    }

    pub fn update_best(&mut self, extrema: &SessionExtrema) {
        self.best = BestValues::from_extrema(extrema);
    }

    fn push(&mut self, line: LogLine) {
        self.log.push_front(line);
        self.log.truncate(self.capacity);
    }

    /// Verdicts, then elapsed time, then the rep header, each prepended, so
    /// the header ends up on top. The header carries the rep's worst severity.
    pub fn record_rep(&mut self, report: &RepReport) {
        let rep = report.rep.rep_index;
        self.reps = rep;
        for v in &report.verdicts {
            self.push(LogLine {
                rep,
                severity: Some(v.severity()),
                key: Some(v.key()),
                text: v.message().to_string(),
            });
        }
        self.push(LogLine {
            rep,
            severity: None,
            key: None,
            text: format!("Elapsed time: {} seconds", format_elapsed(report.rep.elapsed_ms)),
        });
        self.push(LogLine {
            rep,
            severity: report.worst(),
            key: None,
            text: format!("Squat number #{rep}"),
        });
    }

    /// Clears everything a reset clears and invalidates pending
    /// recommendation responses. Returns the new epoch.
    pub fn reset(&mut self, side: Side) -> u64 {
        self.side = side;
        self.best = BestValues::default();
        self.log.clear();
        self.recommendations.clear();
        self.epoch += 1;
        self.epoch
    }

    /// Responses for an older epoch are dropped.
    pub fn set_recommendations(&mut self, epoch: u64, items: Vec<String>) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.recommendations = items;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reps::{CompletedRep, HeadTilt};
    use crate::verdicts::Verdict;

    fn report(rep_index: u32, elapsed_ms: u64) -> RepReport {
        RepReport {
            rep: CompletedRep {
                rep_index,
                min_knee: 90.0,
                min_lean: 60.0,
                min_shin: 55.0,
                head_tilt: HeadTilt::Neutral,
                elapsed_ms,
                remaining_ms: 500,
            },
            verdicts: vec![
                Verdict::DepthCouldGoLower,
                Verdict::LeanGreat,
                Verdict::TempoBalanced,
            ],
        }
    }

    #[test]
    fn newest_rep_header_on_top() {
        let mut b = Scoreboard::new(Side::Left, 50);
        b.record_rep(&report(1, 2345));
        b.record_rep(&report(2, 1050));
        let texts: Vec<_> = b.log().map(|l| l.text.as_str()).collect();
        assert_eq!(texts[0], "Squat number #2");
        assert_eq!(texts[1], "Elapsed time: 1.05 seconds");
        assert_eq!(texts[2], Verdict::TempoBalanced.message());
        assert_eq!(texts[4], Verdict::DepthCouldGoLower.message());
        assert_eq!(texts[5], "Squat number #1");
        assert_eq!(b.log().next().and_then(|l| l.severity), Some(Severity::Fair));
        assert_eq!(b.reps, 2);
    }

    #[test]
    fn log_is_bounded() {
        let mut b = Scoreboard::new(Side::Left, 4);
        b.record_rep(&report(1, 1000));
        assert_eq!(b.log().count(), 4);
        assert_eq!(b.log().next().map(|l| l.text.as_str()), Some("Squat number #1"));
    }

    #[test]
    fn best_values_hide_only_unmeasured() {
        let mut b = Scoreboard::new(Side::Left, 10);
        let mut e = SessionExtrema::default();
        e.offer(Metric::Knee, 95.0);
        e.offer(Metric::Trunk, 179.6);
        b.update_best(&e);
        assert_eq!(b.best.knee, Some(95));
        assert_eq!(b.best.trunk, Some(180));
        assert_eq!(b.best.hip, None);
        assert_eq!(b.best.shin, None);
    }

    #[test]
    fn stale_recommendations_are_dropped() {
        let mut b = Scoreboard::new(Side::Left, 10);
        let first = b.reset(Side::Left);
        let second = b.reset(Side::Right);
        assert!(!b.set_recommendations(first, vec!["1. Lunge".into()]));
        assert!(b.recommendations.is_empty());
        assert!(b.set_recommendations(second, vec!["1. Lunge".into()]));
        assert_eq!(b.side, Side::Right);
    }

    #[test]
    fn elapsed_hundredths_are_zero_padded() {
        assert_eq!(format_elapsed(0), "0.00");
        assert_eq!(format_elapsed(2345), "2.34");
        assert_eq!(format_elapsed(1050), "1.05");
        assert_eq!(format_elapsed(61_009), "61.00");
    }
}
