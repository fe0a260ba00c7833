//! Environment handed to the embedded shell, borrowed from the running
//! gateway process.
//!
//! The gateway is found by matching the configured pattern against every
//! `/proc/<pid>/cmdline`. Its token and port variables are read from
//! `/proc/<pid>/environ`, which is only readable for processes we own.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::config::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEnv {
    /// `(name, value)` of the gateway token, when found.
    pub token: Option<(String, String)>,
    pub port_var: String,
    pub port: u16,
    pub source_pid: Option<u32>,
}

impl LaunchEnv {
    /// Defaults only: no token, the default port.
    pub fn fallback(cfg: &ServiceConfig) -> Self {
        Self {
            token: None,
            port_var: cfg.port_var.clone(),
            port: cfg.default_port,
            source_pid: None,
        }
    }

    /// Scan `proc_root` for the gateway. Never fails; anything missing or
    /// unreadable falls back to defaults.
    pub fn discover(proc_root: &Path, cfg: &ServiceConfig) -> Self {
        let mut env = Self::fallback(cfg);
        let Some(pid) = find_process(proc_root, &cfg.process_pattern, std::process::id()) else {
            tracing::info!(pattern = %cfg.process_pattern, "gateway not running; default launch env");
            return env;
        };
        env.source_pid = Some(pid);

        let vars = match fs::read(proc_root.join(pid.to_string()).join("environ")) {
            Ok(raw) => parse_environ(&raw),
            Err(err) => {
                tracing::warn!(pid, error = %err, "gateway environ unreadable");
                return env;
            }
        };
        for (name, value) in vars {
            if name == cfg.token_var && !value.is_empty() {
                env.token = Some((name, value));
            } else if name == cfg.port_var {
                match value.trim().parse() {
                    Ok(port) => env.port = port,
                    Err(_) => tracing::warn!(pid, value = %value, "bad gateway port; using default"),
                }
            }
        }
        tracing::info!(pid, token = env.token.is_some(), port = env.port, "launch env from gateway");
        env
    }

    /// Variables to export into the shell.
    pub fn shell_env(&self) -> Vec<(String, String)> {
        let mut vars = Vec::with_capacity(2);
        if let Some((name, value)) = &self.token {
            vars.push((name.clone(), value.clone()));
        }
        vars.push((self.port_var.clone(), self.port.to_string()));
        vars
    }
}

/// First pid (ascending, excluding `own_pid`) whose command line matches.
fn find_process(proc_root: &Path, pattern: &str, own_pid: u32) -> Option<u32> {
    let re = Regex::new(pattern)
        .or_else(|_| Regex::new(&regex::escape(pattern)))
        .ok()?;
    let mut pids: Vec<u32> = fs::read_dir(proc_root)
        .ok()?
        .filter_map(Result::ok)
        .filter_map(|e| e.file_name().to_str()?.parse().ok())
        .filter(|&pid| pid != own_pid)
        .collect();
    pids.sort_unstable();
    pids.into_iter().find(|pid| {
        fs::read(proc_root.join(pid.to_string()).join("cmdline"))
            .is_ok_and(|raw| re.is_match(&cmdline_text(&raw)))
    })
}

/// NUL-separated argv as one space-separated line.
fn cmdline_text(raw: &[u8]) -> String {
    raw.split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_environ(raw: &[u8]) -> Vec<(String, String)> {
    raw.split(|&b| b == 0)
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            let (name, value) = entry.split_once('=')?;
            (!name.is_empty()).then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_proc(entries: &[(u32, &[u8], Option<&[u8]>)]) -> TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("self")).expect("self");
        for (pid, cmdline, environ) in entries {
            let p = dir.path().join(pid.to_string());
            fs::create_dir(&p).expect("pid dir");
            fs::write(p.join("cmdline"), cmdline).expect("cmdline");
            if let Some(env) = environ {
                fs::write(p.join("environ"), env).expect("environ");
            }
        }
        dir
    }

    #[test]
    fn token_and_port_from_gateway() {
        let proc = fake_proc(&[
            (10, b"bash\0--login\0", Some(b"X=1\0")),
            (
                42,
                b"node\0/usr/lib/openclaw/gateway.js\0",
                Some(b"PATH=/bin\0OPENCLAW_GATEWAY_TOKEN=abc=def\0OPENCLAW_GATEWAY_PORT=9000\0"),
            ),
        ]);
        let env = LaunchEnv::discover(proc.path(), &ServiceConfig::default());
        assert_eq!(env.source_pid, Some(42));
        assert_eq!(
            env.token,
            Some(("OPENCLAW_GATEWAY_TOKEN".to_string(), "abc=def".to_string()))
        );
        assert_eq!(env.port, 9000);
        assert_eq!(
            env.shell_env(),
            vec![
                ("OPENCLAW_GATEWAY_TOKEN".to_string(), "abc=def".to_string()),
                ("OPENCLAW_GATEWAY_PORT".to_string(), "9000".to_string()),
            ]
        );
    }

    #[test]
    fn missing_process_gives_default_port() {
        let proc = fake_proc(&[(7, b"sleep\x0010\0", None)]);
        let env = LaunchEnv::discover(proc.path(), &ServiceConfig::default());
        assert_eq!(env.token, None);
        assert_eq!(env.port, 18789);
        assert_eq!(env.source_pid, None);
    }

    #[test]
    fn unreadable_environ_gives_default_port() {
        let proc = fake_proc(&[(5, b"openclaw-gateway\0", None)]);
        let env = LaunchEnv::discover(proc.path(), &ServiceConfig::default());
        assert_eq!(env.source_pid, Some(5));
        assert_eq!(env.port, 18789);
        assert!(env.token.is_none());
    }

    #[test]
    fn bad_port_keeps_default() {
        let proc = fake_proc(&[(
            5,
            b"openclaw gateway\0",
            Some(b"OPENCLAW_GATEWAY_PORT=nope\0"),
        )]);
        let env = LaunchEnv::discover(proc.path(), &ServiceConfig::default());
        assert_eq!(env.port, 18789);
    }

    #[test]
    fn invalid_pattern_matches_literally() {
        let proc = fake_proc(&[(3, b"weird(name\0", Some(b"\0"))]);
        assert_eq!(find_process(proc.path(), "weird(name", 0), Some(3));
        assert_eq!(find_process(proc.path(), "weird(name", 3), None);
    }
}
