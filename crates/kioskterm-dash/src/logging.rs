//! Tracing subscriber setup. Logs go to a file because stdout is the UI.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "KIOSKTERM_LOG";
const DEFAULT_FILTER: &str = "info";

/// `$XDG_STATE_HOME/kioskterm/kioskterm.log`, else `/tmp/kioskterm.log`.
pub fn default_log_path(var: impl Fn(&str) -> Option<PathBuf>) -> PathBuf {
    var("XDG_STATE_HOME")
        .filter(|p| p.is_absolute())
        .map(|p| p.join("kioskterm/kioskterm.log"))
        .unwrap_or_else(|| PathBuf::from("/tmp/kioskterm.log"))
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Filter from `KIOSKTERM_LOG`, falling back to `info` when unset or invalid.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn build_subscriber(log_file: File, filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_thread_names(true)
        .with_writer(Arc::new(log_file));
    tracing_subscriber::registry().with(fmt_layer).with(filter)
}

/// Install the global subscriber writing to `path` (or the default path).
/// Returns the file actually used.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened. A subscriber that is
/// already installed is left in place.
pub fn init(path: Option<&Path>) -> io::Result<PathBuf> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_log_path(|k| env::var_os(k).map(PathBuf::from)));
    let file = open_log(&path)?;
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = build_subscriber(file, env_filter()).try_init();
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn default_path_prefers_xdg_state() {
        let xdg = |k: &str| (k == "XDG_STATE_HOME").then(|| PathBuf::from("/var/state"));
        assert_eq!(
            default_log_path(xdg),
            PathBuf::from("/var/state/kioskterm/kioskterm.log")
        );
        assert_eq!(default_log_path(|_| None), PathBuf::from("/tmp/kioskterm.log"));
        let relative = |_: &str| Some(PathBuf::from("rel"));
        assert_eq!(default_log_path(relative), PathBuf::from("/tmp/kioskterm.log"));
    }

    #[test]
    fn subscriber_writes_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/k.log");
        let file = open_log(&path).expect("open");
        let subscriber = build_subscriber(file, EnvFilter::new("debug"));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(domain = "tasks", "refresh finished");
        });
        let mut text = String::new();
        File::open(&path)
            .expect("reopen")
            .read_to_string(&mut text)
            .expect("read");
        assert!(text.contains("refresh finished"));
        assert!(text.contains("domain=\"tasks\""));
    }
}
