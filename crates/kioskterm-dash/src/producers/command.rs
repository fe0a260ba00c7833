//! External commands with a hard time limit.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::RefreshError;

const POLL_STEP: Duration = Duration::from_millis(10);

/// Result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `program args...` and wait at most `timeout` for it to exit.
///
/// On timeout the child is killed and reaped before returning
/// [`RefreshError::Timeout`]. A non-zero exit is not an error here; callers
/// decide what the code means.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, RefreshError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                RefreshError::Unavailable(format!("{program} not installed"))
            }
            _ => RefreshError::Io(e),
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                reap(&mut child);
                tracing::debug!(program, timeout_ms = timeout.as_millis() as u64, "command timed out");
                return Err(RefreshError::Timeout {
                    what: program.to_string(),
                    after: timeout,
                });
            }
            None => thread::sleep(POLL_STEP),
        }
    };

    Ok(CommandOutput {
        code: status.code(),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Read a pipe to the end on a helper thread so a chatty child cannot fill
/// it and stall.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut out = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut out);
        }
        String::from_utf8_lossy(&out).into_owned()
    })
}
