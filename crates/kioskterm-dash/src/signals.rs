//! Termination signals become a quit request for the render loop.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

/// Sets the quit flag on SIGINT, SIGTERM or SIGHUP while alive.
#[derive(Debug)]
pub struct SignalGuard {
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SignalGuard {
    /// # Errors
    ///
    /// Returns an error if the handlers cannot be registered.
    #[cfg(unix)]
    pub fn install(quit: Arc<AtomicBool>) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("kioskterm-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    tracing::warn!(signal, "termination signal received");
                    quit.store(true, Ordering::Relaxed);
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    #[cfg(not(unix))]
    pub fn install(_quit: Arc<AtomicBool>) -> io::Result<Self> {
        Ok(Self { thread: None })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn sighup_sets_quit_flag() {
        let quit = Arc::new(AtomicBool::new(false));
        let guard = SignalGuard::install(Arc::clone(&quit)).expect("install");
        signal_hook::low_level::raise(SIGHUP).expect("raise");
        let deadline = Instant::now() + Duration::from_secs(2);
        while !quit.load(Ordering::Relaxed) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(quit.load(Ordering::Relaxed));
        drop(guard);
    }
}
