#![forbid(unsafe_code)]

//! Kiosk dashboard: live status panels around an embedded login shell.
//!
//! One thread owns a [`DashboardContext`](app::DashboardContext) and runs
//! the [`RenderLoop`](render::RenderLoop). Everything slow happens on other
//! threads. Shell I/O goes through `kioskterm-pty` reader and writer threads,
//! and status refreshes run on per-domain workers started by the
//! [`RefreshScheduler`](scheduler::RefreshScheduler).
//!
//! # Pieces
//!
//! - [`input`]: key events, xterm encoding, reserved bindings, routing.
//! - [`scheduler`]: interval/forced refresh with one run per domain in flight.
//! - [`producers`]: gateway health, system resources, the task list.
//! - [`terminal_panel`]: screen plus shell session with a respawn policy.
//! - [`panels`] and [`render`]: layout, drawing and the frame loop.
//! - [`draw`] and [`surface`]: the draw-target seam and its crossterm backend.
//!
//! Headless use (as in the integration tests) swaps the crossterm surface
//! for a [`FrameBuffer`](draw::FrameBuffer) and scripted keys.

pub mod app;
pub mod cli;
pub mod config;
pub mod draw;
pub mod error;
pub mod input;
pub mod launch_env;
pub mod logging;
pub mod mode;
pub mod panels;
pub mod producers;
pub mod render;
pub mod scheduler;
pub mod signals;
pub mod status;
pub mod surface;
pub mod terminal_panel;

pub use app::DashboardContext;
pub use config::{Config, Layout};
pub use draw::{DrawTarget, FrameBuffer, InputEvent, KeySource, ScriptedKeys};
pub use error::{ConfigError, DashboardError, RefreshError};
pub use input::{Action, Command, InputRouter, KeyBindings, KeyCode, KeyEvent, Modifiers};
pub use mode::DashboardMode;
pub use render::{RenderConfig, RenderLoop};
pub use scheduler::{DomainSelector, Producer, RefreshScheduler};
pub use status::{StatusBoard, StatusDomain, StatusSnapshot};
pub use terminal_panel::{SessionSpawner, TerminalPanel};
