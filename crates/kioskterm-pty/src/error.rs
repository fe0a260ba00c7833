//! Session error types.

use std::fmt;
use std::io;

/// The shell child could not be created.
#[derive(Debug)]
pub enum SpawnError {
    /// The pseudo-terminal pair could not be opened.
    OpenPty(io::Error),
    /// The child process could not be started.
    Spawn { program: String, source: io::Error },
    /// A helper thread could not be started.
    Thread(io::Error),
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenPty(e) => write!(f, "failed to open pty: {e}"),
            Self::Spawn { program, source } => write!(f, "failed to spawn {program}: {source}"),
            Self::Thread(e) => write!(f, "failed to start session thread: {e}"),
        }
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OpenPty(e) | Self::Thread(e) => Some(e),
            Self::Spawn { source, .. } => Some(source),
        }
    }
}

/// A live session's byte channel failed.
#[derive(Debug)]
pub enum ChannelError {
    /// Reading child output failed.
    Read(io::Error),
    /// Delivering input to the child failed.
    Write(io::Error),
    /// Notifying the child of a geometry change failed.
    Resize(io::Error),
    /// The child closed its side (exited) or the session was terminated.
    Closed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(e) => write!(f, "pty read failed: {e}"),
            Self::Write(e) => write!(f, "pty write failed: {e}"),
            Self::Resize(e) => write!(f, "pty resize failed: {e}"),
            Self::Closed => write!(f, "shell session closed"),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) | Self::Write(e) | Self::Resize(e) => Some(e),
            Self::Closed => None,
        }
    }
}

/// Map a `portable-pty` error (an `anyhow::Error`) to `io::Error`.
pub(crate) fn portable_pty_error<E: fmt::Display>(err: E) -> io::Error {
    io::Error::other(err.to_string())
}
