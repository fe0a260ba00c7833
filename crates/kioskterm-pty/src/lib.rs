#![forbid(unsafe_code)]

//! Pseudo-terminal shell sessions for the kiosk dashboard.
//!
//! [`ShellSession`] spawns a shell on a pty and exposes a non-blocking byte
//! channel: [`ShellSession::write`] and [`ShellSession::try_read`] return
//! immediately whatever the child is doing, so a render loop can poll them
//! every frame.
//!
//! ```no_run
//! use kioskterm_pty::{ShellCommand, ShellSession};
//!
//! let mut session = ShellSession::start(&ShellCommand::new("/bin/sh"), 24, 80)?;
//! session.write(b"echo hi\r")?;
//! let output = session.try_read(4096)?;
//! # let _ = output;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod command;
pub mod error;
pub mod mock;
pub mod session;

pub use command::{DEFAULT_TERM, ShellCommand};
pub use error::{ChannelError, SpawnError};
pub use mock::{MockHandle, MockPty};
pub use session::{PtyResizer, SessionBackend, SessionChild, ShellSession};
