use env_logger::{Builder, Env};

/// Log filter comes from `SQUATCTL_LOG` (e.g. `debug`, `squatctl::gate=debug`).
pub fn init() {
    let env = Env::default()
        .filter_or("SQUATCTL_LOG", "info")
        .write_style_or("SQUATCTL_LOG_STYLE", "auto");
    Builder::from_env(env).format_timestamp_millis().init();
}
