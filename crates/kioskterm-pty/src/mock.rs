//! In-memory session backend.
//!
//! Lets the dashboard and its tests drive a [`ShellSession`](crate::ShellSession)
//! without a real pty: output is injected through a [`MockHandle`] and
//! everything the session writes is recorded.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::session::{PtyResizer, SessionBackend, SessionChild};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Shared {
    output_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    input: Mutex<Vec<u8>>,
    resizes: Mutex<Vec<(u16, u16)>>,
    stalled: Mutex<bool>,
    unstalled: Condvar,
    kills: AtomicUsize,
    exited: AtomicBool,
    ignore_kill: bool,
}

impl Shared {
    fn hang_up(&self) {
        lock(&self.output_tx).take();
    }
}

/// Builder for a fake child plus its control handle.
#[derive(Debug, Default)]
pub struct MockPty {
    stall_writes: bool,
    ignore_kill: bool,
}

impl MockPty {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with child input blocked until [`MockHandle::unstall_writes`].
    pub fn stall_writes(mut self) -> Self {
        self.stall_writes = true;
        self
    }

    /// Child survives `kill` and never reports an exit.
    pub fn ignore_kill(mut self) -> Self {
        self.ignore_kill = true;
        self
    }

    pub fn into_backend(self) -> (SessionBackend, MockHandle) {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            output_tx: Mutex::new(Some(tx)),
            stalled: Mutex::new(self.stall_writes),
            ignore_kill: self.ignore_kill,
            ..Shared::default()
        });
        let backend = SessionBackend {
            child: Box::new(MockChild(Arc::clone(&shared))),
            reader: Box::new(MockReader {
                rx,
                buf: Vec::new(),
            }),
            writer: Box::new(MockWriter(Arc::clone(&shared))),
            resizer: Box::new(MockResizer(Arc::clone(&shared))),
        };
        (backend, MockHandle { shared })
    }
}

/// Test-side controls for a mock session.
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHandle")
            .field("kills", &self.kill_count())
            .field("input_len", &lock(&self.shared.input).len())
            .finish()
    }
}

impl MockHandle {
    /// Make `bytes` available as child output.
    pub fn emit(&self, bytes: &[u8]) {
        if let Some(tx) = lock(&self.shared.output_tx).as_ref() {
            let _ = tx.send(bytes.to_vec());
        }
    }

    /// Close the child's output, as if it exited.
    pub fn hang_up(&self) {
        self.shared.exited.store(true, Ordering::SeqCst);
        self.shared.hang_up();
    }

    /// Everything written to the child so far.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.shared.input).clone()
    }

    pub fn resizes(&self) -> Vec<(u16, u16)> {
        lock(&self.shared.resizes).clone()
    }

    pub fn kill_count(&self) -> usize {
        self.shared.kills.load(Ordering::SeqCst)
    }

    pub fn unstall_writes(&self) {
        *lock(&self.shared.stalled) = false;
        self.shared.unstalled.notify_all();
    }

    /// Wait until the recorded input contains `needle`.
    pub fn wait_for_input(&self, needle: &[u8], timeout: Duration) -> bool {
        self.wait_until(timeout, |input| {
            needle.is_empty() || input.windows(needle.len()).any(|w| w == needle)
        })
    }

    /// Wait until at least `len` bytes of input were recorded.
    pub fn wait_for_len(&self, len: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |input| input.len() >= len)
    }

    fn wait_until(&self, timeout: Duration, done: impl Fn(&[u8]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done(&lock(&self.shared.input)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

struct MockChild(Arc<Shared>);

impl SessionChild for MockChild {
    fn kill(&mut self) -> io::Result<()> {
        self.0.kills.fetch_add(1, Ordering::SeqCst);
        if !self.0.ignore_kill {
            self.0.exited.store(true, Ordering::SeqCst);
            self.0.hang_up();
        }
        Ok(())
    }

    fn try_wait(&mut self) -> io::Result<Option<u32>> {
        Ok(self.0.exited.load(Ordering::SeqCst).then_some(0))
    }

    fn process_id(&self) -> Option<u32> {
        None
    }
}

struct MockReader {
    rx: mpsc::Receiver<Vec<u8>>,
    buf: Vec<u8>,
}

impl Read for MockReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.buf.is_empty() {
            match self.rx.recv() {
                Ok(bytes) => self.buf = bytes,
                Err(_) => return Ok(0),
            }
        }
        let n = out.len().min(self.buf.len());
        out[..n].copy_from_slice(&self.buf[..n]);
        self.buf.drain(..n);
        Ok(n)
    }
}

struct MockWriter(Arc<Shared>);

impl Write for MockWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut stalled = lock(&self.0.stalled);
        while *stalled {
            stalled = self
                .0
                .unstalled
                .wait(stalled)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(stalled);
        lock(&self.0.input).extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct MockResizer(Arc<Shared>);

impl PtyResizer for MockResizer {
    fn resize(&self, rows: u16, cols: u16) -> io::Result<()> {
        lock(&self.0.resizes).push((rows, cols));
        Ok(())
    }
}
