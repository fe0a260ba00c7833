//! Draw-target abstraction and the in-memory frame buffer behind it.

use std::io;
use std::time::Duration;

use kioskterm_core::{Cell, Color, SgrAttrs, SgrFlags};
use unicode_width::UnicodeWidthChar;

use crate::input::KeyEvent;

/// Named palette entries used by the dashboard chrome.
pub mod palette {
    use kioskterm_core::Color;

    pub const RED: Color = Color::Named(1);
    pub const GREEN: Color = Color::Named(2);
    pub const YELLOW: Color = Color::Named(3);
    pub const BLUE: Color = Color::Named(4);
    pub const CYAN: Color = Color::Named(6);
    pub const GREY: Color = Color::Named(8);
    pub const BRIGHT_RED: Color = Color::Named(9);
    pub const WHITE: Color = Color::Named(15);
    pub const HEADER_BG: Color = Color::Indexed(236);
}

/// Text style for chrome drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub flags: SgrFlags,
}

impl Style {
    pub const fn new() -> Self {
        Self {
            fg: Color::Default,
            bg: Color::Default,
            flags: SgrFlags::empty(),
        }
    }

    pub const fn fg(mut self, color: Color) -> Self {
        self.fg = color;
        self
    }

    pub const fn bg(mut self, color: Color) -> Self {
        self.bg = color;
        self
    }

    pub fn bold(mut self) -> Self {
        self.flags |= SgrFlags::BOLD;
        self
    }

    pub fn dim(mut self) -> Self {
        self.flags |= SgrFlags::DIM;
        self
    }

    pub fn inverse(mut self) -> Self {
        self.flags |= SgrFlags::INVERSE;
        self
    }

    fn attrs(self) -> SgrAttrs {
        SgrAttrs {
            flags: self.flags,
            fg: self.fg,
            bg: self.bg,
        }
    }
}

/// Where frames are drawn.
pub trait DrawTarget {
    /// `(cols, rows)`.
    fn size(&self) -> (u16, u16);
    /// Adopt a new size; the next frame is drawn from scratch.
    fn resize(&mut self, cols: u16, rows: u16);
    fn clear(&mut self);
    /// Draw `text` at `(col, row)`, clipped at the right edge. Returns the
    /// columns used.
    fn draw_text(&mut self, col: u16, row: u16, text: &str, style: Style) -> u16;
    /// Copy terminal cells verbatim, clipped at the right edge.
    fn draw_cells(&mut self, col: u16, row: u16, cells: &[Cell]);
    /// Hardware cursor position, or hidden.
    fn set_cursor(&mut self, pos: Option<(u16, u16)>);
    /// Show the drawn frame.
    fn present(&mut self) -> io::Result<()>;
}

/// A row-major grid of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    cols: u16,
    rows: u16,
    cells: Vec<Cell>,
    cursor: Option<(u16, u16)>,
}

impl FrameBuffer {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::default(); usize::from(cols) * usize::from(rows)],
            cursor: None,
        }
    }

    pub fn cell(&self, col: u16, row: u16) -> Option<&Cell> {
        (col < self.cols && row < self.rows)
            .then(|| &self.cells[usize::from(row) * usize::from(self.cols) + usize::from(col)])
    }

    pub fn row(&self, row: u16) -> &[Cell] {
        if row >= self.rows {
            return &[];
        }
        let start = usize::from(row) * usize::from(self.cols);
        &self.cells[start..start + usize::from(self.cols)]
    }

    /// Row contents as text, trailing blanks trimmed.
    pub fn row_text(&self, row: u16) -> String {
        kioskterm_core::row_text(self.row(row))
    }

    pub fn cursor(&self) -> Option<(u16, u16)> {
        self.cursor
    }

    /// Fill `width` cells of `row` starting at `col` with blanks in `style`.
    pub fn fill(&mut self, col: u16, row: u16, width: u16, style: Style) {
        let attrs = style.attrs();
        let end = col.saturating_add(width).min(self.cols);
        for c in col..end {
            if let Some(cell) = self.cell_mut(c, row) {
                *cell = Cell::with_attrs(' ', attrs);
            }
        }
    }

    fn cell_mut(&mut self, col: u16, row: u16) -> Option<&mut Cell> {
        if col < self.cols && row < self.rows {
            let idx = usize::from(row) * usize::from(self.cols) + usize::from(col);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }
}

impl DrawTarget for FrameBuffer {
    fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) != (self.cols, self.rows) {
            *self = Self::new(cols, rows);
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::default());
        self.cursor = None;
    }

    fn draw_text(&mut self, col: u16, row: u16, text: &str, style: Style) -> u16 {
        if row >= self.rows {
            return 0;
        }
        let attrs = style.attrs();
        let mut x = col;
        for ch in text.chars() {
            let width = UnicodeWidthChar::width(ch).unwrap_or(0).min(2) as u16;
            if width == 0 {
                continue;
            }
            if x.saturating_add(width) > self.cols {
                break;
            }
            if width == 2 {
                let (lead, cont) = Cell::wide(ch, attrs);
                if let Some(c) = self.cell_mut(x, row) {
                    *c = lead;
                }
                if let Some(c) = self.cell_mut(x + 1, row) {
                    *c = cont;
                }
            } else if let Some(c) = self.cell_mut(x, row) {
                *c = Cell::with_attrs(ch, attrs);
            }
            x += width;
        }
        x - col
    }

    fn draw_cells(&mut self, col: u16, row: u16, cells: &[Cell]) {
        for (i, cell) in cells.iter().enumerate() {
            let Ok(offset) = u16::try_from(i) else {
                break;
            };
            let x = col.saturating_add(offset);
            // A wide character that would straddle the edge is dropped.
            if cell.is_wide() && x.saturating_add(1) >= self.cols {
                if let Some(c) = self.cell_mut(x, row) {
                    *c = Cell::with_attrs(' ', cell.attrs);
                }
                break;
            }
            match self.cell_mut(x, row) {
                Some(c) => *c = *cell,
                None => break,
            }
        }
    }

    fn set_cursor(&mut self, pos: Option<(u16, u16)>) {
        self.cursor = pos.filter(|&(c, r)| c < self.cols && r < self.rows);
    }

    fn present(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Input as seen by the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// New surface size `(cols, rows)`.
    Resize(u16, u16),
}

/// Source of input events.
pub trait KeySource {
    /// Wait up to `timeout` for the next event.
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>>;
}

/// Replays a fixed list of events, then reports nothing.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    events: std::collections::VecDeque<InputEvent>,
}

impl ScriptedKeys {
    pub fn new(events: impl IntoIterator<Item = InputEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>> {
        match self.events.pop_front() {
            Some(ev) => Ok(Some(ev)),
            None => {
                std::thread::sleep(timeout.min(Duration::from_millis(1)));
                Ok(None)
            }
        }
    }
}
