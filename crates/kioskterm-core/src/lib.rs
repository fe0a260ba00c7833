#![forbid(unsafe_code)]

//! Terminal model for the kioskterm shell panel.
//!
//! `kioskterm-core` turns the raw byte stream of an interactive shell into a
//! grid of styled cells. It owns no I/O: the pty adapter supplies bytes and
//! the render loop reads rows back.
//!
//! # Pieces
//!
//! - **Parser**: byte-at-a-time VT/ANSI state machine, resumable across chunks.
//! - **Grid**: fixed rows×cols cell matrix with erase/scroll/insert/delete.
//! - **Cursor**: position, pending wrap, scroll region, pen, blink phase.
//! - **LineHistory**: bounded ring of rows scrolled off the top.
//! - **Screen**: ties the above together and exposes a scrollback view.
//!
//! Only the escape sequences an interactive shell and line editor need are
//! interpreted. Everything else is swallowed and counted.

pub mod cell;
pub mod cursor;
pub mod grid;
pub mod history;
pub mod parser;
pub mod screen;

pub use cell::{Cell, CellFlags, Color, SgrAttrs, SgrFlags};
pub use cursor::{Cursor, SavedCursor};
pub use grid::Grid;
pub use history::{HistoryLine, LineHistory, row_text};
pub use parser::{Action, Parser};
pub use screen::{DEFAULT_HISTORY_LINES, Screen, ScreenStats, ViewRow};
