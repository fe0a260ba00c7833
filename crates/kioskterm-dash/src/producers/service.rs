//! Background service health: process check, log heartbeat, active model.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::ServiceConfig;
use crate::error::RefreshError;
use crate::producers::command::run_with_timeout;
use crate::scheduler::Producer;
use crate::status::{Heartbeat, ServiceHealth, StatusPayload};

const MODEL_LABEL_MAX: usize = 12;

#[derive(Debug, Clone)]
pub struct ServiceProducer {
    pattern: String,
    pgrep_timeout: Duration,
    log_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    stale_after: Duration,
}

impl ServiceProducer {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            pgrep_timeout: Duration::from_secs(2),
            log_path: None,
            config_path: None,
            stale_after: Duration::from_secs(300),
        }
    }

    pub fn from_config(cfg: &ServiceConfig) -> Self {
        Self {
            pattern: cfg.process_pattern.clone(),
            pgrep_timeout: Duration::from_millis(cfg.pgrep_timeout_ms),
            log_path: cfg.log_path(),
            config_path: cfg.config_path(),
            stale_after: Duration::from_secs(cfg.stale_after_secs),
        }
    }

    /// `(running, first pid)` from `pgrep -f`.
    fn probe_process(&self) -> Result<(bool, Option<u32>), RefreshError> {
        let out = run_with_timeout("pgrep", &["-f", &self.pattern], self.pgrep_timeout)?;
        match out.code {
            Some(0) => {
                let own = std::process::id();
                let pid = out
                    .stdout
                    .lines()
                    .filter_map(|l| l.trim().parse::<u32>().ok())
                    .find(|&p| p != own);
                Ok((true, pid))
            }
            // pgrep: 1 means nothing matched.
            Some(1) => Ok((false, None)),
            code => Err(RefreshError::CommandFailed {
                command: "pgrep".to_string(),
                code,
                stderr: out.stderr,
            }),
        }
    }
}

impl Producer for ServiceProducer {
    fn produce(&self) -> Result<StatusPayload, RefreshError> {
        let (running, pid) = self.probe_process()?;
        let heartbeat = match &self.log_path {
            Some(path) => heartbeat_of(path, SystemTime::now(), self.stale_after),
            None => Heartbeat::Unknown,
        };
        let model = self.config_path.as_deref().and_then(read_model);
        Ok(StatusPayload::Service(ServiceHealth {
            running,
            pid,
            heartbeat,
            model,
        }))
    }
}

/// Heartbeat from the log file's modification time.
pub fn heartbeat_of(log: &Path, now: SystemTime, stale_after: Duration) -> Heartbeat {
    let Ok(modified) = fs::metadata(log).and_then(|m| m.modified()) else {
        return Heartbeat::Unknown;
    };
    let age = now.duration_since(modified).unwrap_or_default();
    Heartbeat::from_age(age, stale_after)
}

/// Short label for the service config's `defaultModel`.
pub fn read_model(config: &Path) -> Option<String> {
    let text = fs::read_to_string(config).ok()?;
    let value: serde_json::Value = serde_json::from_str(&text).ok()?;
    let model = value.get("defaultModel")?.as_str()?;
    Some(model_label(model))
}

/// `anthropic/claude-opus-4` → `opus`; otherwise the last path segment,
/// truncated.
pub fn model_label(model: &str) -> String {
    let lower = model.to_ascii_lowercase();
    for family in ["opus", "sonnet", "haiku"] {
        if lower.contains(family) {
            return family.to_string();
        }
    }
    model
        .rsplit('/')
        .next()
        .unwrap_or(model)
        .chars()
        .take(MODEL_LABEL_MAX)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn model_label_shortens() {
        assert_eq!(model_label("anthropic/claude-opus-4-5"), "opus");
        assert_eq!(model_label("Claude-Sonnet"), "sonnet");
        assert_eq!(model_label("openai/gpt-4o-mini-2024-07"), "gpt-4o-mini-");
        assert_eq!(model_label("local"), "local");
    }

    #[test]
    fn reads_default_model_from_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let mut f = fs::File::create(&path).expect("create");
        writeln!(f, r#"{{"defaultModel": "anthropic/claude-sonnet-4", "port": 1}}"#).expect("write");
        assert_eq!(read_model(&path).as_deref(), Some("sonnet"));
        assert_eq!(read_model(&dir.path().join("missing.json")), None);
    }

    #[test]
    fn heartbeat_from_log_mtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("gateway.log");
        fs::write(&log, "tick\n").expect("write");
        let stale = Duration::from_secs(300);
        let now = SystemTime::now();
        assert_eq!(heartbeat_of(&log, now, stale), Heartbeat::JustNow);
        assert_eq!(
            heartbeat_of(&log, now + Duration::from_secs(180), stale),
            Heartbeat::MinutesAgo(3)
        );
        assert_eq!(heartbeat_of(&log, now + Duration::from_secs(900), stale), Heartbeat::Stale);
        assert_eq!(
            heartbeat_of(&dir.path().join("nope.log"), now, stale),
            Heartbeat::Unknown
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn absent_process_reports_not_running() {
        let producer = ServiceProducer::new("kioskterm-test-no-such-process-[x]yz");
        match producer.produce() {
            Ok(StatusPayload::Service(health)) => {
                assert!(!health.running);
                assert_eq!(health.pid, None);
            }
            // Hosts without procps.
            Err(RefreshError::Unavailable(_)) => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
