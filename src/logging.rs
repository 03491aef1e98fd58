//! Log file setup.
//!
//! Hooks run with stdout and stderr wired into Claude Code, so all logging
//! goes to `<state_dir>/cctrace.log`. `RUST_LOG` overrides the default
//! filter; otherwise `debug` in the config decides the level.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn build_filter(debug: bool) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }
    EnvFilter::new(if debug { "cctrace=debug" } else { "cctrace=info" })
}

/// Install the global subscriber. If the log file can't be opened, logging
/// stays off for this invocation.
pub fn init(log_file: &Path, debug: bool) {
    if let Some(dir) = log_file.parent() {
        if fs::create_dir_all(dir).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(log_file) else {
        return;
    };

    let _ = tracing_subscriber::registry()
        .with(build_filter(debug))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init();
}
