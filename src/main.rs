mod angles;
mod cli;
mod config;
mod display;
mod gate;
mod ipc;
mod logging;
mod pose;
mod recommend;
mod reps;
mod session;
mod verdicts;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
