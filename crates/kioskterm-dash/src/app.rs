//! Dashboard state owned by the primary thread.

use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kioskterm_pty::ShellCommand;
use time::UtcOffset;

use crate::config::{Config, Layout, UiConfig, home_dir};
use crate::input::{Action, Command};
use crate::launch_env::LaunchEnv;
use crate::mode::DashboardMode;
use crate::producers::{ResourceProducer, ServiceProducer, TaskProducer};
use crate::scheduler::{DomainSelector, RefreshScheduler};
use crate::status::{StatusBoard, StatusDomain};
use crate::terminal_panel::{CommandSpawner, SessionSpawner, TerminalPanel};

const FALLBACK_SHELL: &str = "/bin/bash";

/// Everything the render loop reads and mutates.
#[derive(Debug)]
pub struct DashboardContext {
    pub panel: TerminalPanel,
    pub board: StatusBoard,
    pub scheduler: RefreshScheduler,
    pub mode: DashboardMode,
    pub layout: Layout,
    pub ui: UiConfig,
    /// First visible row of the task panel.
    pub task_scroll: usize,
    pub quit: bool,
    /// Local offset captured at startup; used for the clock and "today".
    pub utc_offset: UtcOffset,
}

impl DashboardContext {
    pub fn new(panel: TerminalPanel, scheduler: RefreshScheduler, ui: UiConfig, utc_offset: UtcOffset) -> Self {
        Self {
            panel,
            board: StatusBoard::new(),
            scheduler,
            mode: DashboardMode::default(),
            layout: ui.layout,
            ui,
            task_scroll: 0,
            quit: false,
            utc_offset,
        }
    }

    /// Wire up the real shell and the three status producers.
    pub fn from_config(cfg: &Config, launch: &LaunchEnv, utc_offset: UtcOffset) -> Self {
        let command = shell_command(cfg, launch);
        tracing::info!(program = %command.program, "shell configured");
        let panel = terminal_panel(cfg, Box::new(CommandSpawner::new(command)));

        let mut scheduler = RefreshScheduler::new();
        scheduler
            .register(
                StatusDomain::Service,
                Arc::new(ServiceProducer::from_config(&cfg.service)),
                cfg.refresh.service(),
            )
            .register(
                StatusDomain::Resources,
                Arc::new(ResourceProducer::default()),
                cfg.refresh.resources(),
            )
            .register(
                StatusDomain::Tasks,
                Arc::new(TaskProducer::from_config(&cfg.tasks, utc_offset)),
                cfg.refresh.tasks(),
            );

        Self::new(panel, scheduler, cfg.ui.clone(), utc_offset)
    }

    /// Terminal panel on screen this frame.
    pub fn terminal_visible(&self) -> bool {
        self.layout == Layout::Split || self.mode.shows_terminal()
    }

    pub fn apply_action(&mut self, action: Action, now: Instant) {
        match action {
            Action::ForwardToTerminal(bytes) => self.panel.write(&bytes, now),
            Action::DashboardCommand(cmd) => self.apply_command(cmd),
            Action::Ignored => {}
        }
    }

    pub fn apply_command(&mut self, cmd: Command) {
        match cmd {
            Command::Quit => {
                tracing::info!("quit requested");
                self.quit = true;
            }
            Command::RefreshNow => self.scheduler.force_refresh(DomainSelector::All),
            Command::ShowOverview | Command::ShowTaskList | Command::ShowTerminal => {
                let next = self.mode.apply(cmd);
                if next != self.mode {
                    tracing::debug!(from = self.mode.label(), to = next.label(), "mode switch");
                    self.mode = next;
                }
            }
            Command::HistoryUp => {
                let page = i32::from(self.panel.screen().rows().max(2) - 1);
                self.panel.screen_mut().scroll(page);
            }
            Command::HistoryDown => {
                let page = i32::from(self.panel.screen().rows().max(2) - 1);
                self.panel.screen_mut().scroll(-page);
            }
            Command::TaskUp => self.task_scroll = self.task_scroll.saturating_sub(1),
            Command::TaskDown => {
                let len = self.board.tasks().map_or(0, |t| t.items.len());
                self.task_scroll = (self.task_scroll + 1).min(len.saturating_sub(1));
            }
        }
    }

    /// Fold finished refreshes into the board. Returns how many arrived.
    pub fn merge_published(&mut self) -> usize {
        let published = self.scheduler.take_published();
        let n = published.len();
        for snapshot in published {
            self.board.merge(snapshot);
        }
        if let Some(tasks) = self.board.tasks() {
            self.task_scroll = self.task_scroll.min(tasks.items.len().saturating_sub(1));
        }
        n
    }

    pub fn shutdown(&mut self, grace: Duration) {
        self.panel.shutdown(grace);
        let in_flight = self.scheduler.in_flight_count();
        if in_flight > 0 {
            tracing::debug!(in_flight, "abandoning refresh workers");
        }
    }
}

pub fn terminal_panel(cfg: &Config, spawner: Box<dyn SessionSpawner>) -> TerminalPanel {
    TerminalPanel::new(
        spawner,
        80,
        24,
        cfg.terminal.history_lines,
        Duration::from_secs(cfg.terminal.respawn_grace_secs),
    )
}

/// The shell to run: configured program, else `$SHELL`, else bash.
pub fn shell_command(cfg: &Config, launch: &LaunchEnv) -> ShellCommand {
    let shell = &cfg.shell;
    let program = shell
        .program
        .clone()
        .or_else(|| env::var("SHELL").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| FALLBACK_SHELL.to_string());

    let mut command = ShellCommand::new(program)
        .args(shell.args.iter().cloned())
        .term(shell.term.clone());
    if let Some(dir) = shell.cwd.clone().or_else(home_dir) {
        command = command.cwd(dir);
    }
    if let Some(line) = &shell.auto_command {
        command = command.auto_command(line.clone());
    }
    if shell.inherit_service_env {
        for (key, value) in launch.shell_env() {
            command = command.env(key, value);
        }
    }
    command
}
