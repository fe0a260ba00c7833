//! Command-line argument parsing.
//!
//! Args are parsed by hand. `KIOSKTERM_*` environment variables override the
//! defaults; explicit flags override both.

use std::env;
use std::path::PathBuf;
use std::process;

use crate::config::Layout;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
kioskterm: status dashboard with an embedded shell

USAGE:
    kioskterm [OPTIONS]

OPTIONS:
    --config=PATH        Config file (JSON)
    --log-file=PATH      Log file (default: $XDG_STATE_HOME/kioskterm/kioskterm.log)
    --layout=LAYOUT      'modes' (default) or 'split'
    --fps=N              Frame rate while the terminal is visible (default: 30)
    --exit-after-ms=N    Quit after N milliseconds (for smoke tests)
    --help, -h           Show this help message
    --version, -V        Show version

KEYBINDINGS:
    F1 / F2 / F3         Overview / Tasks / Terminal
    1 / 2 / 3            Same, outside the terminal
    Ctrl+R               Refresh all status now
    Shift+PgUp/PgDn      Scroll terminal history
    Up / Down            Scroll the task list
    Ctrl+Q, q            Quit (q only outside the terminal)

ENVIRONMENT VARIABLES:
    KIOSKTERM_CONFIG          Config file, when --config is not given
    KIOSKTERM_LOG             Log filter (default: info)
    KIOSKTERM_LOG_FILE        Override --log-file
    KIOSKTERM_LAYOUT          Override --layout
    KIOSKTERM_FPS             Override --fps
    KIOSKTERM_EXIT_AFTER_MS   Override --exit-after-ms";

/// Parsed command-line options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Opts {
    pub config: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    /// Overrides `ui.layout`.
    pub layout: Option<Layout>,
    /// Overrides `ui.active_fps`.
    pub fps: Option<u32>,
    /// Auto-quit after this many milliseconds (0 = disabled).
    pub exit_after_ms: u64,
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(Opts),
    Help,
    Version,
}

impl Opts {
    /// Parse the process arguments and environment. Prints help or version,
    /// or an error, and exits when asked to.
    pub fn parse() -> Self {
        let args: Vec<String> = env::args().skip(1).collect();
        match parse_from(&args, |k| env::var(k).ok()) {
            Ok(Invocation::Run(opts)) => opts,
            Ok(Invocation::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Invocation::Version) => {
                println!("kioskterm {VERSION}");
                process::exit(0);
            }
            Err(msg) => {
                eprintln!("{msg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }
}

/// Parse `args` (without the program name) with `var` as the environment.
pub fn parse_from(args: &[String], var: impl Fn(&str) -> Option<String>) -> Result<Invocation, String> {
    let mut opts = Opts::default();

    if let Some(val) = var("KIOSKTERM_LOG_FILE").filter(|v| !v.is_empty()) {
        opts.log_file = Some(PathBuf::from(val));
    }
    if let Some(val) = var("KIOSKTERM_LAYOUT")
        && let Ok(layout) = val.parse()
    {
        opts.layout = Some(layout);
    }
    if let Some(val) = var("KIOSKTERM_FPS")
        && let Ok(n) = val.parse()
    {
        opts.fps = Some(n);
    }
    if let Some(val) = var("KIOSKTERM_EXIT_AFTER_MS")
        && let Ok(n) = val.parse()
    {
        opts.exit_after_ms = n;
    }

    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Invocation::Help),
            "--version" | "-V" => return Ok(Invocation::Version),
            other => {
                if let Some(val) = other.strip_prefix("--config=") {
                    opts.config = Some(PathBuf::from(val));
                } else if let Some(val) = other.strip_prefix("--log-file=") {
                    opts.log_file = Some(PathBuf::from(val));
                } else if let Some(val) = other.strip_prefix("--layout=") {
                    opts.layout = Some(val.parse()?);
                } else if let Some(val) = other.strip_prefix("--fps=") {
                    match val.parse::<u32>() {
                        Ok(n) if n > 0 => opts.fps = Some(n),
                        _ => return Err(format!("Invalid --fps value: {val}")),
                    }
                } else if let Some(val) = other.strip_prefix("--exit-after-ms=") {
                    opts.exit_after_ms = val
                        .parse()
                        .map_err(|_| format!("Invalid --exit-after-ms value: {val}"))?;
                } else {
                    return Err(format!("Unknown argument: {other}"));
                }
            }
        }
    }
    Ok(Invocation::Run(opts))
}
