//! Crossterm-backed display surface and key source.
//!
//! [`CrosstermSurface`] puts the controlling terminal into raw mode on the
//! alternate screen and restores it on drop. Frames are drawn into a back
//! buffer and only the cells that changed since the last present are
//! written.

use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event};
use crossterm::style::{
    Attribute, Color as CtColor, Print, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{
    self, BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate,
    EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use kioskterm_core::{Cell, Color, SgrAttrs, SgrFlags};

use crate::draw::{DrawTarget, FrameBuffer, InputEvent, KeySource, Style};
use crate::input::from_crossterm;

pub struct CrosstermSurface {
    back: FrameBuffer,
    front: Option<FrameBuffer>,
    scratch: Vec<u8>,
    raw_enabled: bool,
    alt_enabled: bool,
}

impl CrosstermSurface {
    /// Enter raw mode and the alternate screen.
    ///
    /// # Errors
    ///
    /// Returns an error if stdout is not a usable terminal.
    pub fn new() -> io::Result<Self> {
        install_panic_hook();
        let (cols, rows) = terminal::size()?;

        terminal::enable_raw_mode()?;
        let mut surface = Self {
            back: FrameBuffer::new(cols, rows),
            front: None,
            scratch: Vec::with_capacity(16 * 1024),
            raw_enabled: true,
            alt_enabled: false,
        };
        tracing::info!(cols, rows, "terminal raw mode enabled");

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        surface.alt_enabled = true;
        Ok(surface)
    }

    fn cleanup(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, SetAttribute(Attribute::Reset), Show);
        if self.alt_enabled {
            let _ = execute!(stdout, LeaveAlternateScreen);
            self.alt_enabled = false;
        }
        if self.raw_enabled {
            let _ = terminal::disable_raw_mode();
            self.raw_enabled = false;
            tracing::info!("terminal restored");
        }
        let _ = stdout.flush();
    }

    fn encode_frame(&mut self) -> io::Result<()> {
        let out = &mut self.scratch;
        out.clear();
        queue!(out, BeginSynchronizedUpdate, Hide)?;

        let full = self.front.is_none();
        if full {
            queue!(out, SetAttribute(Attribute::Reset), Clear(ClearType::All))?;
        }

        let (cols, rows) = self.back.size();
        let mut pen: Option<SgrAttrs> = None;
        for row in 0..rows {
            let next = self.back.row(row);
            let prev = self.front.as_ref().map(|f| f.row(row));
            let mut expect_col: Option<u16> = None;
            for (col, cell) in (0..cols).zip(next) {
                if cell.is_wide_continuation() {
                    continue;
                }
                if let Some(prev) = prev
                    && prev.get(usize::from(col)) == Some(cell)
                    && (!cell.is_wide() || prev.get(usize::from(col) + 1) == next.get(usize::from(col) + 1))
                {
                    continue;
                }
                if expect_col != Some(col) {
                    queue!(out, MoveTo(col, row))?;
                }
                if pen != Some(cell.attrs) {
                    write_attrs(out, &cell.attrs)?;
                    pen = Some(cell.attrs);
                }
                queue!(out, Print(printable(cell)))?;
                expect_col = Some(col + u16::from(cell.width().max(1)));
            }
        }

        queue!(out, SetAttribute(Attribute::Reset))?;
        if let Some((col, row)) = self.back.cursor() {
            queue!(out, MoveTo(col, row), Show)?;
        }
        queue!(out, EndSynchronizedUpdate)?;
        Ok(())
    }
}

impl DrawTarget for CrosstermSurface {
    fn size(&self) -> (u16, u16) {
        self.back.size()
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) != self.back.size() {
            tracing::debug!(cols, rows, "surface resized");
            self.back.resize(cols, rows);
            self.front = None;
        }
    }

    fn clear(&mut self) {
        self.back.clear();
    }

    fn draw_text(&mut self, col: u16, row: u16, text: &str, style: Style) -> u16 {
        self.back.draw_text(col, row, text, style)
    }

    fn draw_cells(&mut self, col: u16, row: u16, cells: &[Cell]) {
        self.back.draw_cells(col, row, cells);
    }

    fn set_cursor(&mut self, pos: Option<(u16, u16)>) {
        self.back.set_cursor(pos);
    }

    fn present(&mut self) -> io::Result<()> {
        self.encode_frame()?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(&self.scratch)?;
        stdout.flush()?;
        self.front = Some(self.back.clone());
        Ok(())
    }
}

impl Drop for CrosstermSurface {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn printable(cell: &Cell) -> char {
    match cell.content() {
        c if c.is_control() => ' ',
        c => c,
    }
}

fn write_attrs(out: &mut Vec<u8>, attrs: &SgrAttrs) -> io::Result<()> {
    queue!(
        out,
        SetAttribute(Attribute::Reset),
        SetForegroundColor(to_crossterm(attrs.fg)),
        SetBackgroundColor(to_crossterm(attrs.bg))
    )?;
    const MAP: [(SgrFlags, Attribute); 6] = [
        (SgrFlags::BOLD, Attribute::Bold),
        (SgrFlags::DIM, Attribute::Dim),
        (SgrFlags::ITALIC, Attribute::Italic),
        (SgrFlags::UNDERLINE, Attribute::Underlined),
        (SgrFlags::INVERSE, Attribute::Reverse),
        (SgrFlags::HIDDEN, Attribute::Hidden),
    ];
    for (flag, attr) in MAP {
        if attrs.flags.contains(flag) {
            queue!(out, SetAttribute(attr))?;
        }
    }
    Ok(())
}

pub fn to_crossterm(color: Color) -> CtColor {
    match color {
        Color::Default => CtColor::Reset,
        Color::Named(n) | Color::Indexed(n) => CtColor::AnsiValue(n),
        Color::Rgb(r, g, b) => CtColor::Rgb { r, g, b },
    }
}

/// Restores the terminal if the main thread panics. Worker panics are caught
/// by the scheduler and must not tear the screen down.
fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if std::thread::current().name() == Some("main") {
                best_effort_cleanup();
            }
            previous(info);
        }));
    });
}

fn best_effort_cleanup() {
    let mut stdout = io::stdout();
    let _ = execute!(stdout, SetAttribute(Attribute::Reset), Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
    let _ = stdout.flush();
}

/// Keys and resizes from the controlling terminal.
#[derive(Debug, Default)]
pub struct CrosstermKeys;

impl KeySource for CrosstermKeys {
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(match event::read()? {
            Event::Key(key) => from_crossterm(key).map(InputEvent::Key),
            Event::Resize(cols, rows) => Some(InputEvent::Resize(cols, rows)),
            _ => None,
        })
    }
}
