//! Live shell session over a pseudo-terminal.
//!
//! A [`ShellSession`] owns one child process and both directions of its pty
//! channel. Reads and writes never stall the caller: output is pumped by a
//! reader thread into an `mpsc` channel that [`ShellSession::try_read`] polls,
//! and input is handed to a writer thread through a bounded channel, with any
//! overflow parked locally until the next call.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{ChildKiller, CommandBuilder, MasterPty, PtySize};

use crate::command::ShellCommand;
use crate::error::{ChannelError, SpawnError, portable_pty_error};

/// Chunks queued towards the writer thread before `write` starts parking
/// bytes locally.
pub const WRITE_QUEUE_DEPTH: usize = 64;
/// Largest single chunk handed to the writer thread.
pub const WRITE_CHUNK: usize = 4096;
/// Parked input beyond this is dropped until the child reads again.
pub const MAX_PENDING_BYTES: usize = WRITE_QUEUE_DEPTH * WRITE_CHUNK;
/// How long `Drop` waits for the child to exit.
pub const DROP_GRACE: Duration = Duration::from_millis(200);

const READ_BUF: usize = 8192;
const POLL_STEP: Duration = Duration::from_millis(10);

/// Child process handle as seen by the session.
pub trait SessionChild: Send {
    /// Deliver a termination signal.
    fn kill(&mut self) -> io::Result<()>;
    /// Exit code if the child has exited.
    fn try_wait(&mut self) -> io::Result<Option<u32>>;
    fn process_id(&self) -> Option<u32>;
}

/// Geometry sink for the pty master.
pub trait PtyResizer: Send {
    fn resize(&self, rows: u16, cols: u16) -> io::Result<()>;
}

/// The raw parts a session runs on.
///
/// [`ShellSession::start`] builds one from a native pty; tests build one from
/// in-memory pipes (see [`crate::mock`]).
pub struct SessionBackend {
    pub child: Box<dyn SessionChild>,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    pub resizer: Box<dyn PtyResizer>,
}

struct NativeChild(Box<dyn portable_pty::Child + Send + Sync>);

impl SessionChild for NativeChild {
    fn kill(&mut self) -> io::Result<()> {
        ChildKiller::kill(&mut *self.0)
    }

    fn try_wait(&mut self) -> io::Result<Option<u32>> {
        Ok(self.0.try_wait()?.map(|status| status.exit_code()))
    }

    fn process_id(&self) -> Option<u32> {
        self.0.process_id()
    }
}

struct NativeResizer(Box<dyn MasterPty + Send>);

impl PtyResizer for NativeResizer {
    fn resize(&self, rows: u16, cols: u16) -> io::Result<()> {
        self.0
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(portable_pty_error)
    }
}

#[derive(Debug)]
enum ReaderMsg {
    Data(Vec<u8>),
    Eof,
    Err(io::Error),
}

/// Why the output side stopped.
#[derive(Debug)]
enum ReadEnd {
    Eof,
    Failed(io::Error),
}

pub struct ShellSession {
    child: Box<dyn SessionChild>,
    resizer: Box<dyn PtyResizer>,
    write_tx: Option<mpsc::SyncSender<Vec<u8>>>,
    write_err_rx: mpsc::Receiver<io::Error>,
    pending: VecDeque<Vec<u8>>,
    pending_len: usize,
    rx: mpsc::Receiver<ReaderMsg>,
    carry: Vec<u8>,
    read_end: Option<ReadEnd>,
    reader_thread: Option<thread::JoinHandle<()>>,
    writer_thread: Option<thread::JoinHandle<()>>,
    started_at: Instant,
    size: (u16, u16),
    terminated: bool,
}

impl fmt::Debug for ShellSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellSession")
            .field("child_pid", &self.child.process_id())
            .field("size", &self.size)
            .field("pending_bytes", &self.pending_len)
            .field("carry_len", &self.carry.len())
            .field("read_end", &self.read_end)
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl ShellSession {
    /// Spawn `command` on a new pty sized `rows`×`cols`.
    pub fn start(command: &ShellCommand, rows: u16, cols: u16) -> Result<Self, SpawnError> {
        let pty_system = portable_pty::native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SpawnError::OpenPty(portable_pty_error(e)))?;

        let mut cmd = CommandBuilder::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.cwd {
            cmd.cwd(dir);
        }
        for (k, v) in command.child_env(rows, cols) {
            cmd.env(k, v);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SpawnError::Spawn {
                program: command.program.clone(),
                source: portable_pty_error(e),
            })?;
        // The child holds the only slave handle from here on, so its exit
        // surfaces as EOF on the master.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SpawnError::OpenPty(portable_pty_error(e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SpawnError::OpenPty(portable_pty_error(e)))?;

        let backend = SessionBackend {
            child: Box::new(NativeChild(child)),
            reader,
            writer,
            resizer: Box::new(NativeResizer(pair.master)),
        };
        let mut session = Self::from_backend(backend, rows, cols)?;

        tracing::info!(
            program = %command.program,
            pid = ?session.process_id(),
            rows,
            cols,
            "shell session started"
        );

        if let Some(line) = &command.auto_command {
            let mut bytes = line.clone().into_bytes();
            bytes.push(b'\r');
            if let Err(err) = session.write(&bytes) {
                tracing::warn!(error = %err, "auto command not delivered");
            }
        }
        Ok(session)
    }

    /// Run a session over pre-built parts.
    pub fn from_backend(backend: SessionBackend, rows: u16, cols: u16) -> Result<Self, SpawnError> {
        let SessionBackend {
            mut child,
            mut reader,
            mut writer,
            resizer,
        } = backend;

        let (tx, rx) = mpsc::channel::<ReaderMsg>();
        let reader_thread = thread::Builder::new()
            .name("kioskterm-pty-reader".into())
            .spawn(move || {
                let mut buf = [0u8; READ_BUF];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => {
                            let _ = tx.send(ReaderMsg::Eof);
                            break;
                        }
                        Ok(n) => {
                            if tx.send(ReaderMsg::Data(buf[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        Err(err) => {
                            let _ = tx.send(ReaderMsg::Err(err));
                            break;
                        }
                    }
                }
            });
        let reader_thread = match reader_thread {
            Ok(handle) => handle,
            Err(err) => {
                let _ = child.kill();
                return Err(SpawnError::Thread(err));
            }
        };

        let (write_tx, write_rx) = mpsc::sync_channel::<Vec<u8>>(WRITE_QUEUE_DEPTH);
        let (err_tx, write_err_rx) = mpsc::channel::<io::Error>();
        let writer_thread = thread::Builder::new()
            .name("kioskterm-pty-writer".into())
            .spawn(move || {
                for chunk in write_rx {
                    if let Err(err) = writer.write_all(&chunk).and_then(|()| writer.flush()) {
                        let _ = err_tx.send(err);
                        break;
                    }
                }
            });
        let writer_thread = match writer_thread {
            Ok(handle) => handle,
            Err(err) => {
                let _ = child.kill();
                return Err(SpawnError::Thread(err));
            }
        };

        Ok(Self {
            child,
            resizer,
            write_tx: Some(write_tx),
            write_err_rx,
            pending: VecDeque::new(),
            pending_len: 0,
            rx,
            carry: Vec::new(),
            read_end: None,
            reader_thread: Some(reader_thread),
            writer_thread: Some(writer_thread),
            started_at: Instant::now(),
            size: (rows, cols),
            terminated: false,
        })
    }

    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Time since the session was started.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// `(rows, cols)` last sent to the pty.
    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Bytes accepted by `write` but not yet handed to the writer thread.
    pub fn pending_bytes(&self) -> usize {
        self.pending_len
    }

    /// Queue `bytes` for the child's input.
    ///
    /// Never blocks: when the writer thread's queue is full the bytes are
    /// parked and flushed, in order, by later calls or by
    /// [`flush_pending`](Self::flush_pending). At most [`MAX_PENDING_BYTES`]
    /// stay parked; the tail past that is dropped. Returns the number of
    /// bytes accepted.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        self.check_writer()?;
        self.flush_pending()?;
        let mut accepted = 0;
        for chunk in bytes.chunks(WRITE_CHUNK) {
            let chunk = if self.pending.is_empty() {
                match self.try_hand_off(chunk.to_vec())? {
                    None => {
                        accepted += chunk.len();
                        continue;
                    }
                    Some(rejected) => rejected,
                }
            } else {
                chunk.to_vec()
            };
            let room = MAX_PENDING_BYTES.saturating_sub(self.pending_len);
            let take = chunk.len().min(room);
            if take > 0 {
                self.park(chunk[..take].to_vec());
                accepted += take;
            }
            if take < chunk.len() {
                break;
            }
        }
        if accepted < bytes.len() {
            tracing::warn!(
                dropped = bytes.len() - accepted,
                parked = self.pending_len,
                "pty input dropped; child is not reading"
            );
        } else if self.pending_len > 0 {
            tracing::trace!(parked = self.pending_len, "pty input parked");
        }
        Ok(accepted)
    }

    /// Move parked input to the writer thread as far as its queue allows.
    pub fn flush_pending(&mut self) -> Result<(), ChannelError> {
        while let Some(chunk) = self.pending.pop_front() {
            self.pending_len -= chunk.len();
            if let Some(rejected) = self.try_hand_off(chunk)? {
                self.pending_len += rejected.len();
                self.pending.push_front(rejected);
                break;
            }
        }
        Ok(())
    }

    /// Give `chunk` to the writer thread, or hand it back when its queue is
    /// full.
    fn try_hand_off(&mut self, chunk: Vec<u8>) -> Result<Option<Vec<u8>>, ChannelError> {
        let tx = self.write_tx.as_ref().ok_or(ChannelError::Closed)?;
        match tx.try_send(chunk) {
            Ok(()) => Ok(None),
            Err(mpsc::TrySendError::Full(chunk)) => Ok(Some(chunk)),
            Err(mpsc::TrySendError::Disconnected(_)) => Err(self.writer_gone()),
        }
    }

    fn park(&mut self, chunk: Vec<u8>) {
        self.pending_len += chunk.len();
        self.pending.push_back(chunk);
    }

    fn check_writer(&mut self) -> Result<(), ChannelError> {
        if self.terminated {
            return Err(ChannelError::Closed);
        }
        match self.write_err_rx.try_recv() {
            Ok(err) => Err(ChannelError::Write(err)),
            Err(_) => Ok(()),
        }
    }

    fn writer_gone(&mut self) -> ChannelError {
        match self.write_err_rx.try_recv() {
            Ok(err) => ChannelError::Write(err),
            Err(_) => ChannelError::Closed,
        }
    }

    /// Return up to `max` bytes of output that are already available.
    ///
    /// Never waits: with nothing ready the result is an empty vector. Bytes
    /// beyond `max` are kept for the next call. Once the child's output has
    /// ended and everything buffered has been returned, further calls report
    /// the end as a [`ChannelError`].
    pub fn try_read(&mut self, max: usize) -> Result<Vec<u8>, ChannelError> {
        let max = max.max(1);
        let mut out = std::mem::take(&mut self.carry);

        while out.len() < max && self.read_end.is_none() {
            match self.rx.try_recv() {
                Ok(ReaderMsg::Data(bytes)) => out.extend_from_slice(&bytes),
                Ok(ReaderMsg::Eof) | Err(mpsc::TryRecvError::Disconnected) => {
                    self.read_end = Some(ReadEnd::Eof);
                }
                Ok(ReaderMsg::Err(err)) => self.read_end = Some(ReadEnd::Failed(err)),
                Err(mpsc::TryRecvError::Empty) => break,
            }
        }

        if out.len() > max {
            self.carry = out.split_off(max);
        }
        if !out.is_empty() {
            return Ok(out);
        }
        match self.read_end.take() {
            None => Ok(out),
            Some(ReadEnd::Eof) => {
                self.read_end = Some(ReadEnd::Eof);
                Err(ChannelError::Closed)
            }
            Some(ReadEnd::Failed(err)) => {
                // Report the error once; later reads see a closed channel.
                self.read_end = Some(ReadEnd::Eof);
                Err(ChannelError::Read(err))
            }
        }
    }

    /// Tell the child its terminal is now `rows`×`cols`.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<(), ChannelError> {
        if self.terminated {
            return Err(ChannelError::Closed);
        }
        if self.size == (rows, cols) {
            return Ok(());
        }
        self.resizer
            .resize(rows, cols)
            .map_err(ChannelError::Resize)?;
        tracing::debug!(rows, cols, "pty resized");
        self.size = (rows, cols);
        Ok(())
    }

    /// Exit code if the child has exited.
    pub fn try_wait(&mut self) -> Option<u32> {
        self.child.try_wait().ok().flatten()
    }

    /// Kill the child and release the channel.
    ///
    /// Waits at most `grace` for the child to exit and for the I/O threads to
    /// wind down; threads still blocked after that are detached. Calling this
    /// again is a no-op.
    pub fn terminate(&mut self, grace: Duration) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let deadline = Instant::now() + grace;

        self.pending.clear();
        self.pending_len = 0;
        self.write_tx = None;

        if let Err(err) = self.child.kill() {
            tracing::debug!(error = %err, "kill failed (child likely already gone)");
        }
        let exit = loop {
            match self.child.try_wait() {
                Ok(Some(code)) => break Some(code),
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_STEP),
                _ => break None,
            }
        };

        let reader_done = join_by(self.reader_thread.take(), deadline);
        let writer_done = join_by(self.writer_thread.take(), deadline);
        tracing::info!(
            pid = ?self.child.process_id(),
            exit = ?exit,
            reader_done,
            writer_done,
            "shell session terminated"
        );
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.terminate(DROP_GRACE);
    }
}

/// Join `handle` if it finishes before `deadline`; otherwise detach it.
fn join_by(handle: Option<thread::JoinHandle<()>>, deadline: Instant) -> bool {
    let Some(handle) = handle else {
        return true;
    };
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(POLL_STEP);
    }
    if handle.is_finished() {
        let _ = handle.join();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPty;

    #[test]
    fn try_read_on_silent_child_is_immediate() {
        let (backend, _handle) = MockPty::new().into_backend();
        let mut session = ShellSession::from_backend(backend, 24, 80).expect("session");
        let started = Instant::now();
        let out = session.try_read(4096).expect("read");
        assert!(out.is_empty());
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn try_read_caps_and_carries_surplus() {
        let (backend, handle) = MockPty::new().into_backend();
        let mut session = ShellSession::from_backend(backend, 24, 80).expect("session");
        handle.emit(b"abcdefgh");
        let first = read_some(&mut session, 3);
        assert_eq!(first, b"abc");
        assert_eq!(session.try_read(3).expect("read"), b"def");
        assert_eq!(session.try_read(3).expect("read"), b"gh");
    }

    #[test]
    fn eof_is_reported_after_buffered_output() {
        let (backend, handle) = MockPty::new().into_backend();
        let mut session = ShellSession::from_backend(backend, 24, 80).expect("session");
        handle.emit(b"bye");
        handle.hang_up();
        let out = read_some(&mut session, 64);
        assert_eq!(out, b"bye");
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            match session.try_read(64) {
                Err(ChannelError::Closed) => break,
                Ok(_) if Instant::now() < deadline => thread::sleep(POLL_STEP),
                other => panic!("expected closed channel, got {other:?}"),
            }
        }
    }

    #[test]
    fn write_reaches_child_input() {
        let (backend, handle) = MockPty::new().into_backend();
        let mut session = ShellSession::from_backend(backend, 24, 80).expect("session");
        assert_eq!(session.write(b"ls\r").expect("write"), 3);
        assert!(handle.wait_for_input(b"ls\r", Duration::from_secs(2)));
    }

    #[test]
    fn write_never_blocks_when_child_stalls() {
        let (backend, handle) = MockPty::new().stall_writes().into_backend();
        let mut session = ShellSession::from_backend(backend, 24, 80).expect("session");
        let payload = vec![b'x'; WRITE_CHUNK * (WRITE_QUEUE_DEPTH + 8)];
        let started = Instant::now();
        assert_eq!(session.write(&payload).expect("write"), payload.len());
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(session.pending_bytes() > 0);

        handle.unstall_writes();
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.pending_bytes() > 0 && Instant::now() < deadline {
            session.flush_pending().expect("flush");
            thread::sleep(POLL_STEP);
        }
        assert_eq!(session.pending_bytes(), 0);
        assert!(handle.wait_for_len(payload.len(), Duration::from_secs(5)));
    }

    #[test]
    fn parked_input_is_capped() {
        let (backend, handle) = MockPty::new().stall_writes().into_backend();
        let mut session = ShellSession::from_backend(backend, 24, 80).expect("session");
        let payload = vec![b'y'; MAX_PENDING_BYTES + WRITE_CHUNK * (WRITE_QUEUE_DEPTH + 4)];

        let accepted = session.write(&payload).expect("write");
        assert!(accepted < payload.len());
        assert_eq!(session.pending_bytes(), MAX_PENDING_BYTES);
        assert_eq!(session.write(b"z").expect("write"), 0);

        handle.unstall_writes();
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.pending_bytes() > 0 && Instant::now() < deadline {
            session.flush_pending().expect("flush");
            thread::sleep(POLL_STEP);
        }
        assert!(handle.wait_for_len(accepted, Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(handle.written().len(), accepted);
    }

    #[test]
    fn resize_is_forwarded_once_per_change() {
        let (backend, handle) = MockPty::new().into_backend();
        let mut session = ShellSession::from_backend(backend, 24, 80).expect("session");
        session.resize(30, 100).expect("resize");
        session.resize(30, 100).expect("resize");
        assert_eq!(handle.resizes(), vec![(30, 100)]);
        assert_eq!(session.size(), (30, 100));
    }

    #[test]
    fn terminate_is_idempotent_and_closes_channel() {
        let (backend, handle) = MockPty::new().into_backend();
        let mut session = ShellSession::from_backend(backend, 24, 80).expect("session");
        session.terminate(Duration::from_secs(1));
        session.terminate(Duration::from_secs(1));
        assert_eq!(handle.kill_count(), 1);
        assert!(session.is_terminated());
        assert!(matches!(session.write(b"x"), Err(ChannelError::Closed)));
        assert!(matches!(session.resize(1, 1), Err(ChannelError::Closed)));
    }

    #[test]
    fn terminate_is_bounded_when_child_ignores_kill() {
        let (backend, _handle) = MockPty::new().ignore_kill().into_backend();
        let mut session = ShellSession::from_backend(backend, 24, 80).expect("session");
        let started = Instant::now();
        session.terminate(Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    fn read_some(session: &mut ShellSession, max: usize) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let out = session.try_read(max).expect("read");
            if !out.is_empty() || Instant::now() >= deadline {
                return out;
            }
            thread::sleep(POLL_STEP);
        }
    }
}
