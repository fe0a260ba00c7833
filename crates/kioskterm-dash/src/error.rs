//! Error types for the dashboard.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// A status producer could not capture its snapshot.
///
/// Never propagated past the scheduler: every variant is turned into an
/// error-tagged snapshot and rendered as "unavailable: ...".
#[derive(Debug)]
pub enum RefreshError {
    /// An external command or request exceeded its time limit.
    Timeout { what: String, after: Duration },
    /// An external command exited unsuccessfully.
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    Io(io::Error),
    Http(String),
    Parse(String),
    /// The source is not configured or not present on this machine.
    Unavailable(String),
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { what, after } => {
                write!(f, "{what} timed out after {}ms", after.as_millis())
            }
            Self::CommandFailed {
                command,
                code,
                stderr,
            } => {
                match code {
                    Some(code) => write!(f, "{command} exited with {code}")?,
                    None => write!(f, "{command} was terminated")?,
                }
                let first = stderr.lines().next().unwrap_or("").trim();
                if !first.is_empty() {
                    write!(f, ": {first}")?;
                }
                Ok(())
            }
            Self::Io(e) => write!(f, "{e}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Parse(msg) => write!(f, "bad data: {msg}"),
            Self::Unavailable(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RefreshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RefreshError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// The configuration file could not be used.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A key binding string did not parse.
    Binding { binding: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Parse { path, source } => write!(f, "invalid config {}: {source}", path.display()),
            Self::Binding { binding, reason } => write!(f, "invalid key binding {binding:?}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Binding { .. } => None,
        }
    }
}

/// Startup failures that stop the dashboard.
#[derive(Debug)]
pub enum DashboardError {
    /// The display surface could not be initialised.
    Surface(io::Error),
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surface(e) => write!(f, "cannot initialise display: {e}"),
        }
    }
}

impl std::error::Error for DashboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Surface(e) => Some(e),
        }
    }
}
