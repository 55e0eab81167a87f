use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, path::PathBuf, process::Command};

use crate::config::DaemonConfigState;
use crate::ipc::{self, FrameSource};
use crate::pose::Side;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        let frames: Option<String> = pargs.opt_value_from_str("--frames")?;
        return ipc::run_daemon(FrameSource::from_arg(frames));
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let frames: Option<String> = pargs.opt_value_from_str("--frames")?;
            let exe = std::env::current_exe()?;
            let mut cmd = Command::new(exe);
            cmd.arg("--daemon");
            if let Some(f) = &frames {
                cmd.arg("--frames").arg(f);
            }
            let child = cmd.spawn()?;
            println!(
                "squatctl: started daemon (pid={}, frames from {})",
                child.id(),
                frames.as_deref().unwrap_or("stdin")
            );
            Ok(())
        }

        Some("stop") => request("shutdown"),
        Some("status") => request("status"),
        Some("switch-side") => request("switch_side"),
        Some("reset") => request("reset"),
        Some("reload") => request("reload"),
        Some("list") => request("list"),
        Some("doctor") => request("doctor"),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: squatctl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("replay") => {
            let side: Option<Side> = pargs.opt_value_from_str("--side")?;
            let profile_name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let path: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: squatctl replay <frames.jsonl> [--side left|right] [--profile NAME]"))?;

            let cfg = DaemonConfigState::load_or_install_default()?;
            let mut profile = match &profile_name {
                Some(name) => cfg.load_named(name)?,
                None => cfg.profile.clone(),
            };
            if let Some(side) = side {
                profile.session.side = side;
            }

            let summary = ipc::replay(&path, profile)?;
            println!("{} frames, {} reps", summary.frames, summary.reps.len());
            for line in &summary.reps {
                println!("  {line}");
            }
            println!("{}", serde_json::to_string_pretty(&summary.scoreboard)?);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn request(op: &str) -> Result<()> {
    let r = ipc::client_request(serde_json::json!({ "op": op }))?;
    print_response(&r);
    Ok(())
}

fn print_help() {
    println!(
        r#"squatctl: live squat form coaching from pose keypoints

USAGE:
  squatctl help [command]                 Show general or command-specific help
  squatctl start [--frames PATH]          Start the daemon (frames from PATH or stdin)
  squatctl stop                           Stop the daemon
  squatctl status                         Show side, reps, best angles and feedback
  squatctl switch-side                    Track the other leg (resets the session)
  squatctl reset                          Reset best angles and feedback
  squatctl reload                         Reload active profile
  squatctl use <name>                     Switch active profile
  squatctl list                           List profiles
  squatctl doctor                         Show paths, thresholds and API key state
  squatctl replay <file> [--side S] [--profile NAME]
                                          Run a recorded session offline

FRAMES:
  One JSON object per line, e.g.
  {{"timestamp_ms": 1200, "poses": [{{"pose": {{"leftKnee": {{"x": 310, "y": 300, "confidence": 0.9}}, ...}}}}]}}

TIPS:
  - Profiles: ~/.config/squatctl/profiles (edits to the active one reload live)
  - Active profile pointer: ~/.config/squatctl/active
  - Logging: SQUATCTL_LOG=debug
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!(
            "usage: squatctl start [--frames PATH]\nStarts the background daemon reading pose frames from PATH (file or FIFO) or stdin."
        ),
        "stop" => println!("usage: squatctl stop\nStops the running daemon."),
        "status" => println!(
            "usage: squatctl status\nShows tracked side, rep count, best angles, feedback log and recommendations."
        ),
        "switch-side" => println!(
            "usage: squatctl switch-side\nFlips the tracked side and resets best angles; an unfinished rep is discarded."
        ),
        "reset" => println!(
            "usage: squatctl reset\nResets best angles, feedback and recommendations; the rep counter is kept."
        ),
        "reload" => println!(
            "usage: squatctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: squatctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: squatctl list\nLists available profiles."),
        "doctor" => println!(
            "usage: squatctl doctor\nShows config paths, active constraints and whether the API key is set."
        ),
        "replay" => println!(
            "usage: squatctl replay <frames.jsonl> [--side left|right] [--profile NAME]\nProcesses a recorded session and prints per-rep verdicts and the final scoreboard."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
