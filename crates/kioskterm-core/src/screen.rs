//! Screen: the shell panel's terminal model.
//!
//! [`Screen`] owns the parser, the visible [`Grid`], the [`Cursor`], and the
//! [`LineHistory`]. Raw pty output goes in through [`Screen::feed`]; the render
//! loop reads rows back through [`Screen::view_row`], which honours the
//! scrollback offset set by [`Screen::scroll`].

use crate::cell::Cell;
use crate::cursor::{Cursor, SavedCursor};
use crate::grid::Grid;
use crate::history::{LineHistory, row_text};
use crate::parser::{Action, Parser};

/// Default number of rows retained in line history.
pub const DEFAULT_HISTORY_LINES: usize = 1000;

/// Counters for observable screen activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenStats {
    /// Soft wraps taken because a printable followed a pending wrap.
    pub line_wraps: u64,
    /// Rows scrolled off the top of the scroll region.
    pub lines_scrolled: u64,
    /// Sequences consumed without effect.
    pub anomalies: u64,
}

/// A row as seen through the scrollback view.
#[derive(Debug, Clone, Copy)]
pub enum ViewRow<'a> {
    History(&'a [Cell]),
    Live(&'a [Cell]),
}

impl<'a> ViewRow<'a> {
    pub fn cells(&self) -> &'a [Cell] {
        match *self {
            ViewRow::History(cells) | ViewRow::Live(cells) => cells,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Screen {
    parser: Parser,
    grid: Grid,
    cursor: Cursor,
    history: LineHistory,
    saved: Option<SavedCursor>,
    title: String,
    view_offset: usize,
    stats: ScreenStats,
}

impl Screen {
    pub fn new(cols: u16, rows: u16, history_capacity: usize) -> Self {
        let grid = Grid::new(cols, rows);
        let cursor = Cursor::new(grid.rows());
        Self {
            parser: Parser::new(),
            grid,
            cursor,
            history: LineHistory::new(history_capacity),
            saved: None,
            title: String::new(),
            view_offset: 0,
            stats: ScreenStats::default(),
        }
    }

    pub fn cols(&self) -> u16 {
        self.grid.cols()
    }

    pub fn rows(&self) -> u16 {
        self.grid.rows()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn history(&self) -> &LineHistory {
        &self.history
    }

    /// Window title last set through OSC 0/2.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn stats(&self) -> ScreenStats {
        self.stats
    }

    /// Consume a chunk of pty output.
    ///
    /// Sequences split across chunks are completed on a later call, so
    /// feeding a stream in pieces gives the same result as feeding it whole.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if let Some(action) = self.parser.advance(b) {
                self.apply(action);
            }
        }
    }

    /// Apply one parsed action to grid, cursor, and history.
    pub fn apply(&mut self, action: Action) {
        let rows = self.grid.rows();
        let cols = self.grid.cols();
        match action {
            Action::Print(ch) => self.print(ch),
            Action::Newline | Action::Index => self.line_feed(),
            Action::NextLine => {
                self.cursor.carriage_return();
                self.line_feed();
            }
            Action::CarriageReturn => self.cursor.carriage_return(),
            Action::Tab => {
                self.cursor.col = self.cursor.next_tab_stop(cols);
                self.cursor.pending_wrap = false;
            }
            Action::Backspace => self.cursor.move_left(1),
            Action::Bell => {}
            Action::CursorUp(n) => self.cursor.move_up(n),
            Action::CursorDown(n) => self.cursor.move_down(n, rows),
            Action::CursorRight(n) => self.cursor.move_right(n, cols),
            Action::CursorLeft(n) => self.cursor.move_left(n),
            Action::CursorNextLine(n) => {
                self.cursor.move_down(n, rows);
                self.cursor.carriage_return();
            }
            Action::CursorPrevLine(n) => {
                self.cursor.move_up(n);
                self.cursor.carriage_return();
            }
            Action::CursorColumn(col) => self.cursor.move_to(self.cursor.row, col, rows, cols),
            Action::CursorRow(row) => self.cursor.move_to(row, self.cursor.col, rows, cols),
            Action::CursorPosition { row, col } => self.cursor.move_to(row, col, rows, cols),
            Action::SetScrollRegion { top, bottom } => {
                let bottom = if bottom == 0 { rows } else { bottom };
                self.cursor.set_scroll_region(top, bottom, rows);
                self.cursor.move_to(0, 0, rows, cols);
            }
            Action::ScrollUp(n) => {
                self.scroll_region_up(n);
                self.cursor.pending_wrap = false;
            }
            Action::ScrollDown(n) => {
                let bg = self.cursor.attrs.bg;
                self.grid
                    .scroll_down(self.cursor.scroll_top(), self.cursor.scroll_bottom(), n, bg);
                self.cursor.pending_wrap = false;
            }
            Action::InsertLines(n) => {
                let bg = self.cursor.attrs.bg;
                let (top, bottom) = (self.cursor.scroll_top(), self.cursor.scroll_bottom());
                self.grid.insert_lines(self.cursor.row, n, top, bottom, bg);
                self.cursor.carriage_return();
            }
            Action::DeleteLines(n) => {
                let bg = self.cursor.attrs.bg;
                let (top, bottom) = (self.cursor.scroll_top(), self.cursor.scroll_bottom());
                self.grid.delete_lines(self.cursor.row, n, top, bottom, bg);
                self.cursor.carriage_return();
            }
            Action::InsertChars(n) => {
                let bg = self.cursor.attrs.bg;
                self.grid.insert_chars(self.cursor.row, self.cursor.col, n, bg);
                self.cursor.pending_wrap = false;
            }
            Action::DeleteChars(n) => {
                let bg = self.cursor.attrs.bg;
                self.grid.delete_chars(self.cursor.row, self.cursor.col, n, bg);
                self.cursor.pending_wrap = false;
            }
            Action::EraseChars(n) => {
                let bg = self.cursor.attrs.bg;
                self.grid.erase_chars(self.cursor.row, self.cursor.col, n, bg);
                self.cursor.pending_wrap = false;
            }
            Action::EraseInDisplay(mode) => {
                let bg = self.cursor.attrs.bg;
                let (row, col) = (self.cursor.row, self.cursor.col);
                match mode {
                    0 => self.grid.erase_below(row, col, bg),
                    1 => self.grid.erase_above(row, col, bg),
                    2 => self.grid.erase_all(bg),
                    _ => {
                        self.history.clear();
                        self.view_offset = 0;
                    }
                }
            }
            Action::EraseInLine(mode) => {
                let bg = self.cursor.attrs.bg;
                let (row, col) = (self.cursor.row, self.cursor.col);
                match mode {
                    0 => self.grid.erase_line_right(row, col, bg),
                    1 => self.grid.erase_line_left(row, col, bg),
                    _ => self.grid.erase_line(row, bg),
                }
            }
            Action::Sgr(params) => self.cursor.attrs.apply_sgr_params(&params),
            Action::DecSet(modes) => self.set_dec_modes(&modes, true),
            Action::DecRst(modes) => self.set_dec_modes(&modes, false),
            Action::SaveCursor => self.saved = Some(self.cursor.save()),
            Action::RestoreCursor => {
                let saved = self.saved.unwrap_or_default();
                self.cursor.restore(&saved, rows, cols);
            }
            Action::ReverseIndex => {
                if self.cursor.row == self.cursor.scroll_top() {
                    let bg = self.cursor.attrs.bg;
                    let (top, bottom) = (self.cursor.scroll_top(), self.cursor.scroll_bottom());
                    self.grid.scroll_down(top, bottom, 1, bg);
                } else {
                    self.cursor.move_up(1);
                }
            }
            Action::FullReset => self.reset(),
            Action::SetTitle(title) => self.title = title,
            Action::Unsupported(seq) => {
                self.stats.anomalies += 1;
                tracing::trace!(len = seq.len(), "discarded unsupported sequence");
            }
        }
    }

    fn print(&mut self, ch: char) {
        let width = Cell::display_width(ch);
        if width == 0 {
            return;
        }
        let cols = self.grid.cols();
        if self.cursor.pending_wrap {
            self.wrap();
        }
        if width == 2 && self.cursor.col + 1 >= cols {
            // No room for both halves; wrap early.
            self.wrap();
        }
        let written = self
            .grid
            .write_printable(self.cursor.row, self.cursor.col, ch, self.cursor.attrs);
        if written == 0 {
            return;
        }
        if self.cursor.col + u16::from(written) >= cols {
            self.cursor.pending_wrap = true;
        } else {
            self.cursor.col += u16::from(written);
        }
    }

    fn wrap(&mut self) {
        self.stats.line_wraps += 1;
        self.cursor.col = 0;
        self.line_feed();
    }

    /// Move down one row, scrolling when leaving the bottom margin.
    fn line_feed(&mut self) {
        if self.cursor.row + 1 == self.cursor.scroll_bottom() {
            self.scroll_region_up(1);
        } else if self.cursor.row + 1 < self.grid.rows() {
            self.cursor.row += 1;
        }
        self.cursor.pending_wrap = false;
    }

    fn scroll_region_up(&mut self, n: u16) {
        let bg = self.cursor.attrs.bg;
        let (top, bottom) = (self.cursor.scroll_top(), self.cursor.scroll_bottom());
        let before = self.history.total_pushed();
        let scrolled = self
            .grid
            .scroll_up_into(top, bottom, n, &mut self.history, bg);
        self.stats.lines_scrolled += u64::from(scrolled);
        // Keep a scrolled-back view anchored on the same history rows. Each
        // push moves them one further from the newest end, evicting or not.
        if self.view_offset > 0 {
            let pushed = (self.history.total_pushed() - before) as usize;
            self.view_offset = (self.view_offset + pushed).min(self.history.len());
        }
    }

    fn set_dec_modes(&mut self, modes: &[u16], on: bool) {
        for &mode in modes {
            match mode {
                25 => self.cursor.visible = on,
                _ => self.stats.anomalies += 1,
            }
        }
    }

    fn reset(&mut self) {
        let (cols, rows) = (self.grid.cols(), self.grid.rows());
        self.grid = Grid::new(cols, rows);
        let blink_on = self.cursor.blink_on;
        self.cursor = Cursor::new(rows);
        self.cursor.blink_on = blink_on;
        self.history.clear();
        self.saved = None;
        self.title.clear();
        self.view_offset = 0;
    }

    // ── Scrollback view ─────────────────────────────────────────────

    /// Shift the visible window by `lines` (positive = back into history).
    ///
    /// The offset is clamped to the history length. Live grid and cursor
    /// are untouched. Returns the new offset.
    pub fn scroll(&mut self, lines: i32) -> usize {
        let max = self.history.len() as i64;
        let next = (self.view_offset as i64 + i64::from(lines)).clamp(0, max);
        self.view_offset = next as usize;
        self.view_offset
    }

    pub fn scroll_to_bottom(&mut self) {
        self.view_offset = 0;
    }

    /// Rows currently scrolled back into history.
    pub fn view_offset(&self) -> usize {
        self.view_offset
    }

    pub fn is_scrolled_back(&self) -> bool {
        self.view_offset > 0
    }

    /// Visible row `row` of the panel, taking the scrollback offset into
    /// account.
    pub fn view_row(&self, row: u16) -> Option<ViewRow<'_>> {
        if row >= self.grid.rows() {
            return None;
        }
        let row = row as usize;
        if row < self.view_offset {
            let index = self.history.len() - self.view_offset + row;
            return self
                .history
                .get(index)
                .map(|line| ViewRow::History(&line.cells));
        }
        let live = (row - self.view_offset) as u16;
        self.grid.row_cells(live).map(ViewRow::Live)
    }

    /// Text of a visible row (trailing blanks trimmed).
    pub fn view_text(&self, row: u16) -> String {
        self.view_row(row)
            .map(|r| row_text(r.cells()))
            .unwrap_or_default()
    }

    // ── Cursor blink ────────────────────────────────────────────────

    /// Flip the blink phase. Driven by the render loop's timer.
    pub fn toggle_blink(&mut self) {
        self.cursor.blink_on = !self.cursor.blink_on;
    }

    /// Force the cursor on (e.g. after a keystroke).
    pub fn reset_blink(&mut self) {
        self.cursor.blink_on = true;
    }

    /// Cursor cell to draw this frame, if any.
    ///
    /// Hidden while scrolled back, while DECTCEM is off, or during the off
    /// half of the blink cycle.
    pub fn cursor_visible_now(&self) -> Option<(u16, u16)> {
        let c = &self.cursor;
        (c.visible && c.blink_on && self.view_offset == 0).then_some((c.row, c.col))
    }

    // ── Geometry ────────────────────────────────────────────────────

    /// Resize to a new panel size. Shrinking pushes rows above the cursor
    /// into history.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let row = self
            .grid
            .resize(cols, rows, self.cursor.row, &mut self.history);
        self.cursor.row = row;
        self.cursor.clamp(self.grid.rows(), self.grid.cols());
        self.view_offset = self.view_offset.min(self.history.len());
    }
}
