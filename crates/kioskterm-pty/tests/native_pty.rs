//! Sessions over a real pseudo-terminal.

#![cfg(unix)]

use std::thread;
use std::time::{Duration, Instant};

use kioskterm_pty::{ChannelError, ShellCommand, ShellSession, SpawnError};

fn read_until(session: &mut ShellSession, needle: &[u8], timeout: Duration) -> Vec<u8> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        match session.try_read(4096) {
            Ok(bytes) => seen.extend_from_slice(&bytes),
            Err(ChannelError::Closed) => break,
            Err(err) => panic!("read failed: {err}"),
        }
        if seen.windows(needle.len()).any(|w| w == needle) {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    seen
}

#[test]
fn child_output_reaches_reader() {
    let cmd = ShellCommand::new("/bin/sh").arg("-c").arg("printf hello");
    let mut session = ShellSession::start(&cmd, 24, 80).expect("spawn sh");
    let out = read_until(&mut session, b"hello", Duration::from_secs(5));
    assert!(
        String::from_utf8_lossy(&out).contains("hello"),
        "output was {out:?}"
    );
}

#[test]
fn echoed_input_comes_back() {
    let cmd = ShellCommand::new("/bin/sh").arg("-c").arg("read line; echo got:$line");
    let mut session = ShellSession::start(&cmd, 24, 80).expect("spawn sh");
    session.write(b"ping\r").expect("write");
    let out = read_until(&mut session, b"got:ping", Duration::from_secs(5));
    assert!(String::from_utf8_lossy(&out).contains("got:ping"));
}

#[test]
fn missing_program_is_a_spawn_error() {
    let cmd = ShellCommand::new("/nonexistent/kioskterm-shell");
    let err = ShellSession::start(&cmd, 24, 80).expect_err("must fail");
    assert!(matches!(err, SpawnError::Spawn { .. }), "got {err:?}");
}

#[test]
fn silent_child_read_returns_immediately() {
    let cmd = ShellCommand::new("/bin/sh").arg("-c").arg("sleep 5");
    let mut session = ShellSession::start(&cmd, 24, 80).expect("spawn sh");
    let started = Instant::now();
    let _ = session.try_read(4096).expect("read");
    assert!(started.elapsed() < Duration::from_millis(100));
    session.terminate(Duration::from_secs(1));
    assert!(session.is_terminated());
}

#[test]
fn geometry_is_exported_to_child() {
    let cmd = ShellCommand::new("/bin/sh")
        .arg("-c")
        .arg("printf 'size=%s' \"$COLUMNS\"");
    let mut session = ShellSession::start(&cmd, 24, 95).expect("spawn sh");
    let out = read_until(&mut session, b"size=95", Duration::from_secs(5));
    assert!(String::from_utf8_lossy(&out).contains("size=95"));
}
