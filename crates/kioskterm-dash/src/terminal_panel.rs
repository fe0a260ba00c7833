//! The embedded shell: a [`Screen`] fed by a [`ShellSession`].
//!
//! Failure policy: a channel error tears the session down and one respawn is
//! attempted. The respawn is earned back once a session has stayed up for
//! `respawn_grace`. Without budget, or when spawning fails, the panel shows a
//! persistent "terminal unavailable" message instead of the shell.

use std::time::{Duration, Instant};

use kioskterm_core::Screen;
use kioskterm_pty::{ChannelError, ShellCommand, ShellSession, SpawnError};

const READ_CHUNK: usize = 16 * 1024;
const RESPAWN_BUDGET: u8 = 1;

/// Creates shell sessions for the panel.
pub trait SessionSpawner: Send {
    fn spawn(&mut self, rows: u16, cols: u16) -> Result<ShellSession, SpawnError>;
}

/// Spawns a fixed command on a native pty.
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    command: ShellCommand,
}

impl CommandSpawner {
    pub fn new(command: ShellCommand) -> Self {
        Self { command }
    }
}

impl SessionSpawner for CommandSpawner {
    fn spawn(&mut self, rows: u16, cols: u16) -> Result<ShellSession, SpawnError> {
        ShellSession::start(&self.command, rows, cols)
    }
}

impl<F> SessionSpawner for F
where
    F: FnMut(u16, u16) -> Result<ShellSession, SpawnError> + Send,
{
    fn spawn(&mut self, rows: u16, cols: u16) -> Result<ShellSession, SpawnError> {
        self(rows, cols)
    }
}

pub struct TerminalPanel {
    screen: Screen,
    session: Option<ShellSession>,
    spawner: Box<dyn SessionSpawner>,
    respawns_left: u8,
    session_started: Option<Instant>,
    respawn_grace: Duration,
    unavailable: Option<String>,
    spawns: u32,
}

impl std::fmt::Debug for TerminalPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalPanel")
            .field("cols", &self.screen.cols())
            .field("rows", &self.screen.rows())
            .field("session", &self.session)
            .field("respawns_left", &self.respawns_left)
            .field("unavailable", &self.unavailable)
            .field("spawns", &self.spawns)
            .finish()
    }
}

impl TerminalPanel {
    /// Build a panel; no shell is started until [`start`](Self::start).
    pub fn new(
        spawner: Box<dyn SessionSpawner>,
        cols: u16,
        rows: u16,
        history_lines: usize,
        respawn_grace: Duration,
    ) -> Self {
        Self {
            screen: Screen::new(cols, rows, history_lines),
            session: None,
            spawner,
            respawns_left: RESPAWN_BUDGET,
            session_started: None,
            respawn_grace,
            unavailable: None,
            spawns: 0,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn is_live(&self) -> bool {
        self.session.is_some()
    }

    /// Persistent failure message, if the shell is gone for good.
    pub fn unavailable(&self) -> Option<&str> {
        self.unavailable.as_deref()
    }

    /// Sessions spawned so far, including respawns.
    pub fn spawn_count(&self) -> u32 {
        self.spawns
    }

    pub fn start(&mut self, now: Instant) {
        if self.session.is_some() || self.unavailable.is_some() {
            return;
        }
        self.spawn_session(now);
    }

    fn spawn_session(&mut self, now: Instant) -> bool {
        let (rows, cols) = (self.screen.rows(), self.screen.cols());
        match self.spawner.spawn(rows, cols) {
            Ok(session) => {
                self.spawns += 1;
                self.session = Some(session);
                self.session_started = Some(now);
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "shell spawn failed");
                self.unavailable = Some(format!("terminal unavailable: {err}"));
                false
            }
        }
    }

    /// Hand parked keystrokes to the shell, then move up to `max_bytes` of
    /// pending shell output into the screen. Returns the number of bytes fed.
    pub fn pump(&mut self, max_bytes: usize, now: Instant) -> usize {
        if self.respawns_left < RESPAWN_BUDGET
            && self
                .session_started
                .is_some_and(|t| now.saturating_duration_since(t) >= self.respawn_grace)
        {
            tracing::debug!("respawn budget restored");
            self.respawns_left = RESPAWN_BUDGET;
        }

        let flushed = self
            .session
            .as_mut()
            .map_or(Ok(()), ShellSession::flush_pending);
        if let Err(err) = flushed {
            self.on_channel_error(err, now);
        }

        let mut fed = 0;
        while fed < max_bytes {
            let Some(session) = self.session.as_mut() else {
                break;
            };
            match session.try_read((max_bytes - fed).min(READ_CHUNK)) {
                Ok(bytes) if bytes.is_empty() => break,
                Ok(bytes) => {
                    fed += bytes.len();
                    self.screen.feed(&bytes);
                }
                Err(err) => {
                    self.on_channel_error(err, now);
                    break;
                }
            }
        }
        if fed > 0 {
            // New output snaps the view back to the live screen.
            self.screen.scroll_to_bottom();
        }
        fed
    }

    /// Send input bytes to the shell.
    pub fn write(&mut self, bytes: &[u8], now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.write(bytes) {
            Ok(_) => {
                self.screen.reset_blink();
                self.screen.scroll_to_bottom();
            }
            Err(err) => self.on_channel_error(err, now),
        }
    }

    fn on_channel_error(&mut self, err: ChannelError, now: Instant) {
        if let Some(mut session) = self.session.take() {
            session.terminate(Duration::from_millis(200));
        }
        self.session_started = None;
        if self.respawns_left == 0 {
            tracing::error!(error = %err, "shell channel failed; respawn budget exhausted");
            self.unavailable = Some(format!("terminal unavailable: {err}"));
            return;
        }
        self.respawns_left -= 1;
        tracing::warn!(error = %err, "shell channel failed; respawning");
        if self.spawn_session(now) {
            self.screen.feed(b"\r\n[session restarted]\r\n");
        }
    }

    /// Resize the screen and tell the shell. No-op when unchanged.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let (cols, rows) = (cols.max(1), rows.max(1));
        if (cols, rows) == (self.screen.cols(), self.screen.rows()) {
            return;
        }
        self.screen.resize(cols, rows);
        if let Some(session) = self.session.as_mut()
            && let Err(err) = session.resize(rows, cols)
        {
            tracing::debug!(error = %err, "pty resize not delivered");
        }
    }

    /// Terminate the shell, waiting at most `grace`.
    pub fn shutdown(&mut self, grace: Duration) {
        if let Some(mut session) = self.session.take() {
            session.terminate(grace);
        }
    }
}
