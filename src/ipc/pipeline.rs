use anyhow::{Result, anyhow};
use log::{error, info, warn};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::Instant,
};

use super::dispatch::dispatch_frame;
use super::server::DaemonEvent;
use crate::config::Profile;
use crate::display::Scoreboard;
use crate::pose::PoseFrame;
use crate::recommend;
use crate::session::SessionState;

/// Everything the pipeline thread reacts to. Frames and control commands
/// share one queue, so a reset always lands between two frames.
pub enum PipelineMsg {
    Frame(PoseFrame),
    SwitchSide,
    Reset,
    UpdateProfile(Profile),
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum FrameSource {
    Stdin,
    Path(PathBuf),
}

impl FrameSource {
    pub fn from_arg(arg: Option<String>) -> Self {
        match arg.as_deref() {
            None | Some("-") => FrameSource::Stdin,
            Some(p) => FrameSource::Path(PathBuf::from(p)),
        }
    }
}

pub fn spawn_frame_reader(source: FrameSource, tx: Sender<PipelineMsg>) -> Result<()> {
    thread::Builder::new()
        .name("frames".into())
        .spawn(move || {
            let res = match &source {
                FrameSource::Stdin => read_frames(io::stdin().lock(), &tx),
                FrameSource::Path(p) => File::open(p)
                    .map_err(|e| anyhow!("failed to open {}: {e}", p.display()))
                    .and_then(|f| read_frames(BufReader::new(f), &tx)),
            };
            match res {
                Ok(n) => info!("frame source closed after {n} frames"),
                Err(e) => error!("frame reader failed: {e}"),
            }
        })?;
    Ok(())
}

/// Decodes one frame per line until EOF or until the pipeline hangs up.
/// Undecodable lines are skipped.
pub fn read_frames<R: BufRead>(reader: R, tx: &Sender<PipelineMsg>) -> Result<usize> {
    let mut n = 0;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match PoseFrame::from_json_line(&line) {
            Ok(frame) => {
                if tx.send(PipelineMsg::Frame(frame)).is_err() {
                    break;
                }
                n += 1;
            }
            Err(e) => warn!("line {}: {e}", lineno + 1),
        }
    }
    Ok(n)
}

/// Puts stamped and unstamped frames on one timeline. Once a frame has
/// carried `timestamp_ms`, unstamped frames continue from the last stamp plus
/// wall time since it arrived.
struct FrameClock {
    start: Instant,
    last_stamp: Option<(u64, Instant)>,
    stamped: Option<bool>,
}

impl FrameClock {
    fn new(start: Instant) -> Self {
        Self {
            start,
            last_stamp: None,
            stamped: None,
        }
    }

    fn now_ms(&mut self, timestamp_ms: Option<u64>, now: Instant) -> u64 {
        let stamped = timestamp_ms.is_some();
        if self.stamped.is_some_and(|s| s != stamped) {
            warn!(
                "frame source switched to {} timestamps",
                if stamped { "its own" } else { "pipeline" }
            );
        }
        self.stamped = Some(stamped);

        match (timestamp_ms, self.last_stamp) {
            (Some(t), _) => {
                self.last_stamp = Some((t, now));
                t
            }
            (None, Some((t, at))) => {
                t.saturating_add(now.saturating_duration_since(at).as_millis() as u64)
            }
            (None, None) => now.saturating_duration_since(self.start).as_millis() as u64,
        }
    }
}

pub fn run_pipeline(
    mut profile: Profile,
    rx: Receiver<PipelineMsg>,
    board: Arc<Mutex<Scoreboard>>,
    tx_evt: Sender<DaemonEvent>,
) -> Result<()> {
    let mut clock = FrameClock::new(Instant::now());
    let mut state = SessionState::new(profile.session.side);
    let mut last_ms = 0;

    // model ready
    let epoch = lock(&board)?.reset(state.side());
    recommend::spawn_fetch(profile.recommendations.clone(), epoch, board.clone());

    while let Ok(msg) = rx.recv() {
        match msg {
            PipelineMsg::Frame(frame) => {
                let now_ms = clock.now_ms(frame.timestamp_ms, Instant::now());
                last_ms = now_ms;
                let outcome = state.process_frame(&frame, now_ms, &profile);
                match dispatch_frame(&outcome, state.extrema(), &board) {
                    Ok(Some(summary)) => {
                        let _ = tx_evt.send(DaemonEvent::Log(summary));
                    }
                    Ok(None) => {}
                    Err(e) => error!("dispatch failed: {e}"),
                }
            }
            PipelineMsg::SwitchSide => {
                discard_in_flight(&state, last_ms);
                state.switch_side();
                info!("tracking {} side", state.side());
                restart_session(&state, &profile, &board)?;
            }
            PipelineMsg::Reset => {
                discard_in_flight(&state, last_ms);
                state.reset();
                info!("session reset, rep counter at {}", state.reps().rep_index());
                restart_session(&state, &profile, &board)?;
            }
            PipelineMsg::UpdateProfile(p) => {
                lock(&board)?.set_capacity(p.session.log_capacity);
                profile = p;
                info!(
                    "pipeline using profile '{}'",
                    profile.meta.name.as_deref().unwrap_or("unnamed")
                );
            }
            PipelineMsg::Shutdown => break,
        }
    }
    Ok(())
}

#[derive(Debug)]
pub struct ReplaySummary {
    pub frames: usize,
    pub reps: Vec<String>,
    pub scoreboard: Scoreboard,
}

/// Runs a recorded session through the same pass the daemon uses, without
/// recommendations.
pub fn replay(path: &Path, mut profile: Profile) -> Result<ReplaySummary> {
    profile.recommendations.enabled = false;
    let f = File::open(path).map_err(|e| anyhow!("failed to open {}: {e}", path.display()))?;

    let (tx, rx) = mpsc::channel();
    let (tx_evt, rx_evt) = mpsc::channel();
    let frames = read_frames(BufReader::new(f), &tx)?;
    tx.send(PipelineMsg::Shutdown)
        .map_err(|_| anyhow!("pipeline queue closed"))?;

    let session = &profile.session;
    let board = Arc::new(Mutex::new(Scoreboard::new(session.side, session.log_capacity)));
    run_pipeline(profile, rx, board.clone(), tx_evt)?;

    let reps = rx_evt
        .try_iter()
        .map(|evt| match evt {
            DaemonEvent::Log(s) => s,
        })
        .collect();
    let scoreboard = lock(&board)?.clone();
    Ok(ReplaySummary {
        frames,
        reps,
        scoreboard,
    })
}

fn discard_in_flight(state: &SessionState, now_ms: u64) {
    if let Some(ms) = state.reps().elapsed_ms(now_ms) {
        info!("discarding unfinished rep after {ms}ms");
    }
}

fn restart_session(
    state: &SessionState,
    profile: &Profile,
    board: &Arc<Mutex<Scoreboard>>,
) -> Result<()> {
    let epoch = lock(board)?.reset(state.side());
    recommend::spawn_fetch(profile.recommendations.clone(), epoch, board.clone());
    Ok(())
}

fn lock(board: &Arc<Mutex<Scoreboard>>) -> Result<std::sync::MutexGuard<'_, Scoreboard>> {
    board
        .lock()
        .map_err(|e| anyhow!("scoreboard lock poisoned: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Side;
    use std::time::Duration;

    fn frame_line(knee_deg: f64, t: u64) -> String {
        let heading = (90.0 - knee_deg).to_radians();
        format!(
            r#"{{"timestamp_ms": {t}, "poses": [{{"pose": {{
                "leftKnee": {{"x": 300.0, "y": 300.0, "confidence": 0.9}},
                "leftAnkle": {{"x": 300.0, "y": 400.0, "confidence": 0.2}},
                "leftHip": {{"x": {}, "y": {}, "confidence": 0.2}}
            }}}}]}}"#,
            300.0 + 100.0 * heading.cos(),
            300.0 + 100.0 * heading.sin(),
        )
        .replace('\n', " ")
    }

    fn quiet_profile() -> Profile {
        let mut p = Profile::builtin().unwrap();
        p.recommendations.enabled = false;
        p
    }

    #[test]
    fn reader_skips_bad_lines() {
        let input = format!("{}\n\nnot json\n{}\n", frame_line(170.0, 0), frame_line(120.0, 10));
        let (tx, rx) = mpsc::channel();
        let n = read_frames(io::Cursor::new(input), &tx).unwrap();
        assert_eq!(n, 2);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn pipeline_counts_reps_and_resets_between_frames() {
        let (tx, rx) = mpsc::channel();
        let (tx_evt, rx_evt) = mpsc::channel();
        let board = Arc::new(Mutex::new(Scoreboard::new(Side::Left, 50)));

        let lines = [170.0, 110.0, 90.0, 150.0, 100.0]
            .iter()
            .enumerate()
            .map(|(i, d)| frame_line(*d, i as u64 * 400))
            .collect::<Vec<_>>()
            .join("\n");
        read_frames(io::Cursor::new(lines), &tx).unwrap();
        tx.send(PipelineMsg::SwitchSide).unwrap();
        tx.send(PipelineMsg::Shutdown).unwrap();

        run_pipeline(quiet_profile(), rx, board.clone(), tx_evt).unwrap();

        let events: Vec<_> = rx_evt.try_iter().collect();
        assert_eq!(events.len(), 1);
        let b = board.lock().unwrap();
        assert_eq!(b.side, Side::Right);
        // log and best values cleared by the switch
        assert_eq!(b.log().count(), 0);
        assert_eq!(b.best.knee, None);
        assert_eq!(b.reps, 1);
    }

    #[test]
    fn replay_reports_each_rep() {
        let path = std::env::temp_dir().join(format!("squatctl-replay-{}.jsonl", std::process::id()));
        let lines: Vec<String> = [170.0, 120.0, 80.0, 140.0, 120.0, 105.0, 160.0]
            .iter()
            .enumerate()
            .map(|(i, d)| frame_line(*d, i as u64 * 300))
            .collect();
        std::fs::write(&path, lines.join("\n")).unwrap();

        let summary = replay(&path, Profile::builtin().unwrap()).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(summary.frames, 7);
        assert_eq!(summary.reps.len(), 2);
        assert!(summary.reps[0].contains("depth.perfect"), "{:?}", summary.reps);
        assert!(summary.reps[1].contains("depth.too_shallow"), "{:?}", summary.reps);
        assert_eq!(summary.scoreboard.reps, 2);
        assert_eq!(summary.scoreboard.best.knee, Some(80));
        assert!(summary.scoreboard.recommendations.is_empty());
    }

    #[test]
    fn unstamped_frames_continue_from_last_stamp() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(t0);
        assert_eq!(clock.now_ms(None, t0 + Duration::from_millis(40)), 40);
        assert_eq!(clock.now_ms(Some(1_700_000_000_000), t0 + Duration::from_millis(50)), 1_700_000_000_000);
        assert_eq!(clock.now_ms(None, t0 + Duration::from_millis(250)), 1_700_000_000_200);
        assert_eq!(clock.now_ms(Some(1_700_000_000_300), t0 + Duration::from_millis(260)), 1_700_000_000_300);
    }

    #[test]
    fn mixed_timestamps_keep_rep_timing_sane() {
        let (tx, rx) = mpsc::channel();
        let (tx_evt, rx_evt) = mpsc::channel();
        let board = Arc::new(Mutex::new(Scoreboard::new(Side::Left, 50)));

        let stamped = frame_line(110.0, 1_700_000_000_000);
        let unstamped = frame_line(170.0, 0).replace(r#""timestamp_ms": 0, "#, "");
        read_frames(io::Cursor::new(format!("{stamped}\n{unstamped}")), &tx).unwrap();
        tx.send(PipelineMsg::Shutdown).unwrap();
        run_pipeline(quiet_profile(), rx, board.clone(), tx_evt).unwrap();

        let events: Vec<_> = rx_evt.try_iter().collect();
        assert_eq!(events.len(), 1);
        let DaemonEvent::Log(summary) = &events[0];
        // wall time between the two frames is a few ms, not decades
        assert!(summary.starts_with("rep #1 in 0."), "{summary}");
    }

    #[test]
    fn frame_source_arg() {
        assert!(matches!(FrameSource::from_arg(None), FrameSource::Stdin));
        assert!(matches!(FrameSource::from_arg(Some("-".into())), FrameSource::Stdin));
        assert!(matches!(
            FrameSource::from_arg(Some("/tmp/poses.fifo".into())),
            FrameSource::Path(_)
        ));
    }
}
