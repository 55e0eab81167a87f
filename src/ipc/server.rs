use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::{FrameSource, PipelineMsg, run_pipeline, spawn_frame_reader};
use super::runtime::socket_path;
use crate::config::{DaemonConfigState, Profile};
use crate::display::Scoreboard;

pub fn run_daemon(source: FrameSource) -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // profiles
    let mut cfg = DaemonConfigState::load_or_install_default()?;
    info!("daemon: active profile '{}'", cfg.active_name);
    let session = &cfg.profile.session;
    let board = Arc::new(Mutex::new(Scoreboard::new(session.side, session.log_capacity)));

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let (tx_evt, rx_evt) = mpsc::channel::<DaemonEvent>();

    // pipeline + frame source
    let pipeline = PipelineThread::start(cfg.profile.clone(), board.clone(), tx_evt.clone())?;
    spawn_frame_reader(source, pipeline.sender())?;

    let _watcher = watch_profiles(&cfg.profiles_dir, tx_req.clone())?;
    watch_signals(tx_req.clone())?;

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        if let Ok((stream, _)) = listener.accept() {
            let tx = tx_req.clone();
            let cfg_snapshot = cfg.clone();
            let board = board.clone();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, &cfg_snapshot, &board, tx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(evt) = rx_evt.try_recv() {
            match evt {
                DaemonEvent::Log(s) => info!("[coach] {s}"),
            }
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => {
                    if let Err(e) = cfg.reload() {
                        error!("reload failed: {e}");
                    } else {
                        pipeline.update_profile(cfg.profile.clone());
                        info!("profile reloaded");
                    }
                }
                IpcMsg::ProfileChanged(path) => {
                    let stem = path.file_stem().and_then(|s| s.to_str());
                    if stem == Some(cfg.active_name.as_str()) {
                        info!("{} changed on disk", path.display());
                        match cfg.reload() {
                            Ok(()) => pipeline.update_profile(cfg.profile.clone()),
                            Err(e) => warn!("keeping previous profile: {e}"),
                        }
                    }
                }
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = cfg.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        pipeline.update_profile(cfg.profile.clone());
                        info!("switched active profile to {}", cfg.active_name);
                    }
                }
                IpcMsg::SwitchSide => pipeline.send(PipelineMsg::SwitchSide),
                IpcMsg::Reset => pipeline.send(PipelineMsg::Reset),
                IpcMsg::Shutdown => {
                    pipeline.send(PipelineMsg::Shutdown);
                    let _ = std::fs::remove_file(&sock);
                    info!("daemon: stopped");
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn handle_client(
    mut stream: UnixStream,
    cfg: &DaemonConfigState,
    board: &Arc<Mutex<Scoreboard>>,
    tx_req: Sender<IpcMsg>,
) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => {
            let snapshot = board
                .lock()
                .map_err(|e| anyhow!("scoreboard lock poisoned: {e}"))?
                .clone();
            serde_json::json!({"ok": true, "data": {
                "active_profile": cfg.active_name,
                "socket": socket_path()?,
                "scoreboard": snapshot,
            }})
        }
        "switch_side" => {
            let _ = tx_req.send(IpcMsg::SwitchSide);
            serde_json::json!({"ok": true, "data": "switching side"})
        }
        "reset" => {
            let _ = tx_req.send(IpcMsg::Reset);
            serde_json::json!({"ok": true, "data": "session reset"})
        }
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            if name.is_empty() || !cfg.profile_path(name).exists() {
                serde_json::json!({"ok": false, "error": format!("profile not found: '{name}'")})
            } else {
                let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
                serde_json::json!({"ok": true, "data": {"active_profile": name}})
            }
        }
        "list" => {
            let list = cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": cfg.active_name}})
        }
        "doctor" => {
            let report = cfg.doctor_report(&socket_path()?);
            serde_json::json!({"ok": true, "data": report})
        }
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    writeln!(stream, "{}", resp)?;
    Ok(())
}

enum IpcMsg {
    Reload,
    ProfileChanged(PathBuf),
    UseProfile(String),
    SwitchSide,
    Reset,
    Shutdown,
}

pub enum DaemonEvent {
    Log(String),
}

struct PipelineThread {
    tx: Sender<PipelineMsg>,
    _thread: thread::JoinHandle<()>,
}

impl PipelineThread {
    fn start(
        profile: Profile,
        board: Arc<Mutex<Scoreboard>>,
        tx_evt: Sender<DaemonEvent>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<PipelineMsg>();
        let handle = thread::Builder::new()
            .name("pipeline".into())
            .spawn(move || {
                if let Err(e) = run_pipeline(profile, rx, board, tx_evt) {
                    error!("coaching pipeline failed: {e}");
                }
            })?;
        Ok(Self {
            tx,
            _thread: handle,
        })
    }

    fn sender(&self) -> Sender<PipelineMsg> {
        self.tx.clone()
    }

    fn send(&self, msg: PipelineMsg) {
        if self.tx.send(msg).is_err() {
            error!("coaching pipeline is gone");
        }
    }

    fn update_profile(&self, new_profile: Profile) {
        self.send(PipelineMsg::UpdateProfile(new_profile));
    }
}

fn watch_profiles(dir: &Path, tx_req: Sender<IpcMsg>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
            for path in event.paths {
                if path.extension().is_some_and(|e| e == "toml") {
                    let _ = tx_req.send(IpcMsg::ProfileChanged(path));
                }
            }
        }
        Ok(_) => {}
        Err(e) => warn!("profile watch error: {e}"),
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn watch_signals(tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("daemon: received signal {sig}");
                let _ = tx_req.send(IpcMsg::Shutdown);
            }
        })?;
    Ok(())
}
