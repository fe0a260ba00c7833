//! The frame loop.
//!
//! Each frame, in order: drain shell output (capped), advance the cursor
//! blink, tick the refresh scheduler and merge results, apply one pending
//! input event, draw, present. The wait between frames is cut short by
//! input.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use crate::app::DashboardContext;
use crate::config::Config;
use crate::draw::{DrawTarget, InputEvent, KeySource};
use crate::input::InputRouter;
use crate::panels::{draw_frame, terminal_size};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Frame rate while the terminal panel is visible.
    pub active_fps: u32,
    pub idle_fps: u32,
    pub blink_interval: Duration,
    pub max_bytes_per_frame: usize,
    pub quit_grace: Duration,
    /// Quit on its own after this long.
    pub exit_after: Option<Duration>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RenderConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            active_fps: cfg.ui.active_fps,
            idle_fps: cfg.ui.idle_fps,
            blink_interval: Duration::from_millis(cfg.terminal.blink_ms.max(1)),
            max_bytes_per_frame: cfg.terminal.max_bytes_per_frame.max(1),
            quit_grace: Duration::from_millis(cfg.terminal.quit_grace_ms),
            exit_after: None,
        }
    }

    pub fn frame_interval(&self, terminal_visible: bool) -> Duration {
        let fps = if terminal_visible { self.active_fps } else { self.idle_fps };
        Duration::from_secs(1) / fps.max(1)
    }
}

pub struct RenderLoop {
    config: RenderConfig,
    router: InputRouter,
    quit_flag: Option<Arc<AtomicBool>>,
    pending: VecDeque<InputEvent>,
    frames: u64,
}

impl RenderLoop {
    pub fn new(config: RenderConfig, router: InputRouter) -> Self {
        Self {
            config,
            router,
            quit_flag: None,
            pending: VecDeque::new(),
            frames: 0,
        }
    }

    /// Quit when `flag` becomes true (set from a signal handler).
    pub fn quit_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.quit_flag = Some(flag);
        self
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run until quit, then terminate the shell within the quit grace.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface or key source fails. The shell is
    /// shut down either way.
    pub fn run(
        &mut self,
        ctx: &mut DashboardContext,
        target: &mut dyn DrawTarget,
        keys: &mut dyn KeySource,
    ) -> io::Result<()> {
        let result = self.frames_until_quit(ctx, target, keys);
        tracing::info!(frames = self.frames, "render loop stopped");
        ctx.shutdown(self.config.quit_grace);
        result
    }

    fn frames_until_quit(
        &mut self,
        ctx: &mut DashboardContext,
        target: &mut dyn DrawTarget,
        keys: &mut dyn KeySource,
    ) -> io::Result<()> {
        let started = Instant::now();
        let mut last_blink = started;
        fit_terminal(ctx, target);
        ctx.panel.start(started);
        tracing::info!(layout = ?ctx.layout, "render loop started");

        loop {
            let now = Instant::now();
            if self.should_quit(now.saturating_duration_since(started)) {
                ctx.quit = true;
            }
            if ctx.quit {
                return Ok(());
            }
            let _span = tracing::trace_span!("frame", n = self.frames).entered();

            ctx.panel.pump(self.config.max_bytes_per_frame, now);

            if now.saturating_duration_since(last_blink) >= self.config.blink_interval {
                ctx.panel.screen_mut().toggle_blink();
                last_blink = now;
            }

            ctx.scheduler.tick(now);
            ctx.merge_published();

            if let Some(event) = self.pending.pop_front() {
                self.apply_event(ctx, target, event, now);
                if ctx.quit {
                    return Ok(());
                }
            }

            draw_frame(ctx, target, SystemTime::now());
            target.present()?;
            self.frames += 1;

            let budget = self.config.frame_interval(ctx.terminal_visible());
            let timeout = if self.pending.is_empty() {
                budget.saturating_sub(now.elapsed())
            } else {
                Duration::ZERO
            };
            if let Some(event) = keys.poll(timeout)? {
                self.pending.push_back(event);
            }
        }
    }

    fn should_quit(&self, elapsed: Duration) -> bool {
        if let Some(flag) = &self.quit_flag
            && flag.load(Ordering::Relaxed)
        {
            tracing::info!("quit signal received");
            return true;
        }
        if let Some(limit) = self.config.exit_after
            && elapsed >= limit
        {
            tracing::info!(?limit, "exit-after reached");
            return true;
        }
        false
    }

    fn apply_event(
        &mut self,
        ctx: &mut DashboardContext,
        target: &mut dyn DrawTarget,
        event: InputEvent,
        now: Instant,
    ) {
        match event {
            InputEvent::Key(key) => {
                let action = self.router.dispatch(&key, ctx.mode);
                tracing::trace!(?key, ?action, "key");
                ctx.apply_action(action, now);
            }
            InputEvent::Resize(cols, rows) => {
                target.resize(cols, rows);
                fit_terminal(ctx, target);
            }
        }
    }
}

/// Size the shell to the terminal panel's area for the current surface.
fn fit_terminal(ctx: &mut DashboardContext, target: &dyn DrawTarget) {
    let (cols, rows) = target.size();
    let (tcols, trows) = terminal_size(cols, rows, ctx.layout);
    ctx.panel.resize(tcols, trows);
}
