use anyhow::{Result, anyhow};
use log::info;
use std::sync::{Arc, Mutex};

use crate::display::{Scoreboard, format_elapsed};
use crate::session::{FrameOutcome, SessionExtrema};

/// Pushes one frame's results to the scoreboard. Returns a one-line summary
/// when a rep completed.
pub fn dispatch_frame(
    outcome: &FrameOutcome,
    extrema: &SessionExtrema,
    board: &Arc<Mutex<Scoreboard>>,
) -> Result<Option<String>> {
    let FrameOutcome::Processed(report) = outcome else {
        return Ok(None);
    };
    if !report.best_changed && report.rep_report.is_none() {
        return Ok(None);
    }

    let mut b = board
        .lock()
        .map_err(|e| anyhow!("scoreboard lock poisoned: {e}"))?;
    if report.best_changed {
        b.update_best(extrema);
    }

    let Some(rep) = &report.rep_report else {
        return Ok(None);
    };
    b.record_rep(rep);

    let keys: Vec<&str> = rep.verdicts.iter().map(|v| v.key()).collect();
    let summary = format!(
        "rep #{} in {}s: {}",
        rep.rep.rep_index,
        format_elapsed(rep.rep.elapsed_ms),
        keys.join(", ")
    );
    info!("{summary}");
    Ok(Some(summary))
}
