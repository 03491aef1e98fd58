use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "cctrace.toml";
const STATE_FILENAME: &str = "cctrace_state.json";
const LOCK_FILENAME: &str = "cctrace_state.lock";
const TOOL_BUFFER_FILENAME: &str = "cctrace_tool_buffer.jsonl";
const EXPORT_FILENAME: &str = "cctrace_turns.jsonl";
const LOG_FILENAME: &str = "cctrace.log";

// ===================================================================
// Config
// ===================================================================

/// Runtime settings, optionally stored in `<state_dir>/cctrace.toml`.
///
/// ```toml
/// enabled = true
/// debug = false
/// max_chars = 20000
/// user_id = "claude-user"
/// # hostname = "workstation"
/// lock_timeout_ms = 2000
/// # export_path = "/var/log/cctrace/turns.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Master switch; when off every invocation is a no-op.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub debug: bool,

    /// Character budget for every exported text field.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Overrides the system hostname in exported records.
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Where turn records go. Defaults to `<state_dir>/cctrace_turns.jsonl`.
    #[serde(default)]
    pub export_path: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_max_chars() -> usize {
    20_000
}

fn default_user_id() -> String {
    "claude-user".into()
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            debug: false,
            max_chars: default_max_chars(),
            user_id: default_user_id(),
            hostname: None,
            lock_timeout_ms: default_lock_timeout_ms(),
            export_path: None,
        }
    }
}

/// Accepts the usual spellings; anything else is ignored.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load from a TOML file. A missing file means defaults; missing keys
    /// in an existing file are filled in by serde.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Overlay `CCTRACE_*` variables. `lookup` is `std::env::var(..).ok()`
    /// in production. Unparseable values leave the field as it was.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CCTRACE_ENABLED").as_deref().and_then(parse_bool) {
            self.enabled = v;
        }
        if let Some(v) = lookup("CCTRACE_DEBUG").as_deref().and_then(parse_bool) {
            self.debug = v;
        }
        if let Some(v) = lookup("CCTRACE_MAX_CHARS").and_then(|s| s.trim().parse().ok()) {
            self.max_chars = v;
        }
        if let Some(v) = lookup("CCTRACE_USER_ID").filter(|s| !s.trim().is_empty()) {
            self.user_id = v;
        }
        if let Some(v) = lookup("CCTRACE_HOSTNAME").filter(|s| !s.trim().is_empty()) {
            self.hostname = Some(v);
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

// ===================================================================
// State directory layout
// ===================================================================

/// Every file the hook reads or writes lives in one directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StatePaths {
    pub dir: PathBuf,
}

impl StatePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `--state-dir`, then `CCTRACE_STATE_DIR`, then `~/.claude/state`.
    pub fn resolve(flag: Option<PathBuf>, env: Option<String>) -> Option<Self> {
        flag.or_else(|| env.filter(|s| !s.trim().is_empty()).map(PathBuf::from))
            .or_else(|| dirs::home_dir().map(|h| h.join(".claude").join("state")))
            .map(Self::new)
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILENAME)
    }

    pub fn state_file(&self) -> PathBuf {
        self.dir.join(STATE_FILENAME)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.dir.join(LOCK_FILENAME)
    }

    pub fn tool_buffer(&self) -> PathBuf {
        self.dir.join(TOOL_BUFFER_FILENAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.dir.join(LOG_FILENAME)
    }

    pub fn export_file(&self, config: &Config) -> PathBuf {
        config
            .export_path
            .clone()
            .unwrap_or_else(|| self.dir.join(EXPORT_FILENAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.enabled);
        assert_eq!(config.max_chars, 20_000);
        assert_eq!(config.user_id, "claude-user");
        assert_eq!(config.lock_timeout(), Duration::from_millis(2_000));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "max_chars = 10\nhostname = \"box\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_chars, 10);
        assert_eq!(config.hostname.as_deref(), Some("box"));
        assert!(config.enabled);
        assert_eq!(config.user_id, "claude-user");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "max_chars = \"lots\"").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config {
            max_chars: 10,
            ..Config::default()
        };
        config.apply_env(env(&[
            ("CCTRACE_ENABLED", "false"),
            ("CCTRACE_DEBUG", "1"),
            ("CCTRACE_MAX_CHARS", "500"),
            ("CCTRACE_USER_ID", "alice"),
            ("CCTRACE_HOSTNAME", "ci-runner"),
        ]));
        assert!(!config.enabled);
        assert!(config.debug);
        assert_eq!(config.max_chars, 500);
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.hostname.as_deref(), Some("ci-runner"));
    }

    #[test]
    fn unparseable_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("CCTRACE_ENABLED", "maybe"),
            ("CCTRACE_MAX_CHARS", "-3"),
            ("CCTRACE_USER_ID", "  "),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn state_dir_precedence() {
        let flag = StatePaths::resolve(Some("/flag".into()), Some("/env".into())).unwrap();
        assert_eq!(flag.dir, PathBuf::from("/flag"));

        let env = StatePaths::resolve(None, Some("/env".into())).unwrap();
        assert_eq!(env.dir, PathBuf::from("/env"));
        assert_eq!(env.state_file(), PathBuf::from("/env/cctrace_state.json"));
        assert_eq!(env.lock_file(), PathBuf::from("/env/cctrace_state.lock"));
    }

    #[test]
    fn export_path_override() {
        let paths = StatePaths::new("/state");
        let mut config = Config::default();
        assert_eq!(paths.export_file(&config), PathBuf::from("/state/cctrace_turns.jsonl"));
        config.export_path = Some("/elsewhere/out.jsonl".into());
        assert_eq!(paths.export_file(&config), PathBuf::from("/elsewhere/out.jsonl"));
    }
}
