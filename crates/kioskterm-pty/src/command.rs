//! Shell command description.

use std::env;
use std::path::PathBuf;

/// Default `TERM` exported to the shell.
pub const DEFAULT_TERM: &str = "xterm-256color";

/// What to run inside the pty and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; `None` inherits the dashboard's.
    pub cwd: Option<PathBuf>,
    /// Extra environment for the child, applied after `TERM`/`COLUMNS`/`LINES`.
    pub env: Vec<(String, String)>,
    pub term: Option<String>,
    /// Line typed into the shell once after it starts.
    pub auto_command: Option<String>,
}

impl Default for ShellCommand {
    /// The user's login shell (`$SHELL`, else `/bin/bash`) started in `$HOME`.
    fn default() -> Self {
        let program = env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "/bin/bash".to_string());
        Self {
            program,
            args: vec!["--login".to_string()],
            cwd: env::var_os("HOME").map(PathBuf::from),
            env: Vec::new(),
            term: Some(DEFAULT_TERM.to_string()),
            auto_command: None,
        }
    }
}

impl ShellCommand {
    /// Run `program` with no arguments and no working directory override.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            term: Some(DEFAULT_TERM.to_string()),
            auto_command: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn auto_command(mut self, line: impl Into<String>) -> Self {
        self.auto_command = Some(line.into());
        self
    }

    /// Full environment for a child sized `rows`×`cols`.
    pub fn child_env(&self, rows: u16, cols: u16) -> Vec<(String, String)> {
        let mut vars = Vec::with_capacity(self.env.len() + 3);
        if let Some(term) = &self.term {
            vars.push(("TERM".to_string(), term.clone()));
        }
        vars.push(("COLUMNS".to_string(), cols.to_string()));
        vars.push(("LINES".to_string(), rows.to_string()));
        vars.extend(self.env.iter().cloned());
        vars
    }
}
