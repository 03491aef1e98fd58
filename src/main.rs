mod config;
mod export;
mod lock;
mod logging;
mod reader;
mod record;
mod sequence;
mod session;
mod state;
mod tool_events;
mod transcript;
mod truncate;
mod turns;
mod types;
mod usage;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, StatePaths};
use export::{Exporter, JsonlExporter, StdoutExporter};
use session::Session;
use std::env;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use types::HookPayload;

/// Claude Code hook that turns session transcripts into per-turn records.
#[derive(Debug, Default, Parser)]
#[command(name = "cctrace", version, about)]
struct Cli {
    /// Directory for state, buffers, logs and the default export file.
    #[arg(long, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Config file (defaults to <state-dir>/cctrace.toml).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long)]
    debug: bool,

    /// Write records to stdout instead of the export file.
    #[arg(long)]
    stdout: bool,

    /// Character budget for exported text fields.
    #[arg(long, value_name = "N")]
    max_chars: Option<usize>,
}

/// Parse arguments without ever failing the hook: bad flags are ignored,
/// only `--help` and `--version` get clap's usual treatment.
fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => e.exit(),
            _ => Cli::default(),
        },
    }
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("reading hook payload from stdin")?;
    Ok(buffer)
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..len]).trim().to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    env::var("COMPUTERNAME").ok().filter(|s| !s.is_empty())
}

/// Layer the config file, `CCTRACE_*` variables and flags. A config file
/// that fails to load is replaced by defaults; the error comes back so it
/// can be logged once logging is up.
fn load_config(cli: &Cli, paths: &StatePaths) -> (Config, Option<anyhow::Error>) {
    let path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let (mut config, error) = match Config::load(&path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env(|key| env::var(key).ok());
    if cli.debug {
        config.debug = true;
    }
    if let Some(max) = cli.max_chars {
        config.max_chars = max;
    }
    (config, error)
}

fn run(cli: &Cli, paths: StatePaths, config: Config) -> Result<()> {
    let input = read_stdin()?;
    let payload = HookPayload::parse(&input);
    debug!(
        "invocation: event={} session={}",
        payload.event(),
        payload.session_id.as_deref().unwrap_or("-")
    );

    let mut exporter: Box<dyn Exporter> = if cli.stdout {
        Box::new(StdoutExporter::new())
    } else {
        Box::new(JsonlExporter::new(paths.export_file(&config)))
    };

    let hostname = config
        .hostname
        .clone()
        .or_else(system_hostname)
        .unwrap_or_else(|| "unknown".to_string());
    let session = Session::new(paths, config, hostname, dirs::home_dir());
    let outcome = session.handle(&payload, exporter.as_mut())?;
    info!("{outcome}");
    Ok(())
}

fn main() {
    let cli = parse_cli();
    let Some(paths) = StatePaths::resolve(cli.state_dir.clone(), env::var("CCTRACE_STATE_DIR").ok())
    else {
        return;
    };
    let (config, config_error) = load_config(&cli, &paths);
    logging::init(&paths.log_file(), config.debug);
    if let Some(e) = config_error {
        warn!("ignoring config, using defaults: {e:#}");
    }

    // A hook must never break the session it observes: errors are logged
    // and the exit status is always 0.
    if let Err(e) = run(&cli, paths, config) {
        warn!("cctrace: {e:#}");
    }
}
