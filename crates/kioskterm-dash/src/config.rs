//! JSON configuration file.
//!
//! Every section and field is optional; missing values take the defaults
//! below. The file is looked up in this order: `--config=PATH`,
//! `$KIOSKTERM_CONFIG`, `$XDG_CONFIG_HOME/kioskterm/config.json`,
//! `~/.config/kioskterm/config.json`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::input::Command;

pub const CONFIG_ENV: &str = "KIOSKTERM_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shell: ShellConfig,
    pub terminal: TerminalConfig,
    pub refresh: RefreshConfig,
    pub service: ServiceConfig,
    pub tasks: TasksConfig,
    pub ui: UiConfig,
    pub keys: KeysConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Program to run; `$SHELL` (else `/bin/bash`) when unset.
    pub program: Option<String>,
    pub args: Vec<String>,
    /// Working directory; `$HOME` when unset.
    pub cwd: Option<PathBuf>,
    pub term: String,
    /// Typed into the shell once it starts.
    pub auto_command: Option<String>,
    /// Pass the running gateway's token and port to the shell.
    pub inherit_service_env: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: vec!["--login".to_string()],
            cwd: None,
            term: kioskterm_pty::DEFAULT_TERM.to_string(),
            auto_command: None,
            inherit_service_env: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub history_lines: usize,
    pub max_bytes_per_frame: usize,
    pub blink_ms: u64,
    /// A session that lives this long earns back its respawn.
    pub respawn_grace_secs: u64,
    pub quit_grace_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            history_lines: kioskterm_core::DEFAULT_HISTORY_LINES,
            max_bytes_per_frame: 64 * 1024,
            blink_ms: 500,
            respawn_grace_secs: 10,
            quit_grace_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub service_secs: u64,
    pub resources_secs: u64,
    pub tasks_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            service_secs: 10,
            resources_secs: 5,
            tasks_secs: 45,
        }
    }
}

impl RefreshConfig {
    pub fn service(&self) -> Duration {
        Duration::from_secs(self.service_secs.max(1))
    }

    pub fn resources(&self) -> Duration {
        Duration::from_secs(self.resources_secs.max(1))
    }

    pub fn tasks(&self) -> Duration {
        Duration::from_secs(self.tasks_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// `pgrep -f` pattern identifying the service process.
    pub process_pattern: String,
    pub pgrep_timeout_ms: u64,
    /// Log whose mtime is the heartbeat; `~/.openclaw/logs/gateway.log` when unset.
    pub log_file: Option<PathBuf>,
    /// JSON holding `defaultModel`; `~/.openclaw/config.json` when unset.
    pub config_file: Option<PathBuf>,
    pub stale_after_secs: u64,
    pub token_var: String,
    pub port_var: String,
    pub default_port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            process_pattern: "openclaw.*gateway".to_string(),
            pgrep_timeout_ms: 2000,
            log_file: None,
            config_file: None,
            stale_after_secs: 300,
            token_var: "OPENCLAW_GATEWAY_TOKEN".to_string(),
            port_var: "OPENCLAW_GATEWAY_PORT".to_string(),
            default_port: 18789,
        }
    }
}

impl ServiceConfig {
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| home_dir().map(|h| h.join(".openclaw/logs/gateway.log")))
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.config_file
            .clone()
            .or_else(|| home_dir().map(|h| h.join(".openclaw/config.json")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub api_url: String,
    /// Environment variable holding the API token.
    pub token_env: String,
    pub limit: usize,
    pub timeout_secs: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.todoist.com/rest/v2/tasks".to_string(),
            token_env: "TODOIST_API_TOKEN".to_string(),
            limit: 8,
            timeout_secs: 10,
        }
    }
}

/// Screen arrangement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// One view at a time, switched with F1–F3.
    #[default]
    Modes,
    /// Status on top, terminal below, always visible.
    Split,
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "modes" => Ok(Self::Modes),
            "split" => Ok(Self::Split),
            other => Err(format!("unknown layout {other:?} (expected modes|split)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub layout: Layout,
    pub title: String,
    pub active_fps: u32,
    pub idle_fps: u32,
    /// Degrees Celsius at which the temperature turns red.
    pub hot_temperature: f32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            layout: Layout::Modes,
            title: "kioskterm".to_string(),
            active_fps: 30,
            idle_fps: 4,
            hot_temperature: 70.0,
        }
    }
}

/// One reserved key: `{"key": "ctrl+q", "command": "quit"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    pub key: String,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Replaces the default reserved set when present.
    pub reserved: Vec<BindingConfig>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            reserved: crate::input::DEFAULT_BINDINGS
                .iter()
                .map(|(key, command)| BindingConfig {
                    key: (*key).to_string(),
                    command: *command,
                })
                .collect(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, path)
    }

    /// Load from the first existing candidate path.
    ///
    /// No file means defaults. An unreadable or invalid file is logged and
    /// also yields defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> (Self, Option<PathBuf>) {
        let Some(path) = discover(explicit, |k| env::var_os(k).map(PathBuf::from)) else {
            tracing::info!("no config file; using defaults");
            return (Self::default(), None);
        };
        match Self::load(&path) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "config loaded");
                (cfg, Some(path))
            }
            Err(err) => {
                tracing::warn!(error = %err, "config ignored; using defaults");
                (Self::default(), None)
            }
        }
    }
}

/// First config candidate that exists. An explicit path is returned even if
/// missing so that the read error is reported.
pub fn discover(
    explicit: Option<&Path>,
    var: impl Fn(&str) -> Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = var(CONFIG_ENV).filter(|p| !p.as_os_str().is_empty()) {
        return Some(path);
    }
    let xdg = var("XDG_CONFIG_HOME")
        .filter(|p| p.is_absolute())
        .map(|p| p.join("kioskterm/config.json"));
    let home = var("HOME").map(|h| h.join(".config/kioskterm/config.json"));
    [xdg, home].into_iter().flatten().find(|p| p.is_file())
}

pub(crate) fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_all_defaults() {
        let cfg = Config::from_json("{}", Path::new("x.json")).expect("parse");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.refresh.tasks(), Duration::from_secs(45));
        assert_eq!(cfg.terminal.max_bytes_per_frame, 65536);
        assert_eq!(cfg.service.default_port, 18789);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let text = r#"{
            "ui": {"layout": "split", "active_fps": 20},
            "tasks": {"limit": 3},
            "keys": {"reserved": [{"key": "ctrl+x", "command": "quit"}]}
        }"#;
        let cfg = Config::from_json(text, Path::new("x.json")).expect("parse");
        assert_eq!(cfg.ui.layout, Layout::Split);
        assert_eq!(cfg.ui.active_fps, 20);
        assert_eq!(cfg.ui.idle_fps, 4);
        assert_eq!(cfg.tasks.limit, 3);
        assert_eq!(cfg.tasks.token_env, "TODOIST_API_TOKEN");
        assert_eq!(cfg.keys.reserved.len(), 1);
        assert_eq!(cfg.keys.reserved[0].command, Command::Quit);
    }

    #[test]
    fn invalid_json_is_reported_with_path() {
        let err = Config::from_json("{\"ui\": 3}", Path::new("/etc/k.json")).expect_err("bad");
        assert!(err.to_string().contains("/etc/k.json"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"terminal": {"history_lines": 0}}"#).expect("write");
        let cfg = Config::load(&path).expect("load");
        assert_eq!(cfg.terminal.history_lines, 0);
        assert!(matches!(
            Config::load(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn discovery_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let xdg = dir.path().join("xdg");
        fs::create_dir_all(xdg.join("kioskterm")).expect("mkdir");
        fs::write(xdg.join("kioskterm/config.json"), "{}").expect("write");
        let xdg_for_lookup = xdg.clone();
        let lookup = move |k: &str| match k {
            "XDG_CONFIG_HOME" => Some(xdg_for_lookup.clone()),
            _ => None,
        };

        assert_eq!(
            discover(Some(Path::new("/explicit.json")), &lookup),
            Some(PathBuf::from("/explicit.json"))
        );
        assert_eq!(discover(None, &lookup), Some(xdg.join("kioskterm/config.json")));

        let env_first = |k: &str| match k {
            CONFIG_ENV => Some(PathBuf::from("/from/env.json")),
            _ => None,
        };
        assert_eq!(discover(None, env_first), Some(PathBuf::from("/from/env.json")));
        assert_eq!(discover(None, |_| None), None);
    }

    #[test]
    fn layout_from_str() {
        assert_eq!("Split".parse::<Layout>(), Ok(Layout::Split));
        assert!("grid".parse::<Layout>().is_err());
    }
}
