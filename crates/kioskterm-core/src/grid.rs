//! Screen grid: the visible rows×cols matrix of the shell panel.
//!
//! Cells are stored row-major in one flat `Vec<Cell>`. The grid carries no
//! cursor; callers pass positions explicitly and decide wrap policy.

use crate::cell::{Cell, Color, SgrAttrs};
use crate::history::{LineHistory, row_text};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<Cell>,
    cols: u16,
    rows: u16,
}

impl Grid {
    /// Create a blank grid. Zero dimensions are raised to 1.
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cells: vec![Cell::default(); cols as usize * rows as usize],
            cols,
            rows,
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// `None` when out of bounds.
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        (row < self.rows && col < self.cols).then(|| &self.cells[self.index(row, col)])
    }

    pub fn cell_mut(&mut self, row: u16, col: u16) -> Option<&mut Cell> {
        if row < self.rows && col < self.cols {
            let idx = self.index(row, col);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    pub fn row_cells(&self, row: u16) -> Option<&[Cell]> {
        if row < self.rows {
            let start = self.index(row, 0);
            Some(&self.cells[start..start + self.cols as usize])
        } else {
            None
        }
    }

    /// Row content as text (trailing blanks trimmed).
    pub fn row_text(&self, row: u16) -> String {
        self.row_cells(row).map(row_text).unwrap_or_default()
    }

    // ── Erase ───────────────────────────────────────────────────────

    /// ED 0: cursor to end of display.
    pub fn erase_below(&mut self, row: u16, col: u16, bg: Color) {
        if row >= self.rows {
            return;
        }
        self.erase_span(row, col, self.cols, bg);
        for r in row + 1..self.rows {
            self.erase_span(r, 0, self.cols, bg);
        }
    }

    /// ED 1: start of display through the cursor, inclusive.
    pub fn erase_above(&mut self, row: u16, col: u16, bg: Color) {
        if row >= self.rows {
            return;
        }
        for r in 0..row {
            self.erase_span(r, 0, self.cols, bg);
        }
        self.erase_span(row, 0, col.saturating_add(1), bg);
    }

    /// ED 2.
    pub fn erase_all(&mut self, bg: Color) {
        for cell in &mut self.cells {
            cell.erase(bg);
        }
    }

    /// EL 0.
    pub fn erase_line_right(&mut self, row: u16, col: u16, bg: Color) {
        self.erase_span(row, col, self.cols, bg);
    }

    /// EL 1.
    pub fn erase_line_left(&mut self, row: u16, col: u16, bg: Color) {
        self.erase_span(row, 0, col.saturating_add(1), bg);
    }

    /// EL 2.
    pub fn erase_line(&mut self, row: u16, bg: Color) {
        self.erase_span(row, 0, self.cols, bg);
    }

    /// ECH.
    pub fn erase_chars(&mut self, row: u16, col: u16, count: u16, bg: Color) {
        self.erase_span(row, col, col.saturating_add(count), bg);
    }

    /// Erase `[start, end)` on one row, repairing wide characters that the
    /// span cuts in half.
    fn erase_span(&mut self, row: u16, start: u16, end: u16, bg: Color) {
        if row >= self.rows {
            return;
        }
        let start = start.min(self.cols);
        let end = end.min(self.cols);
        if start >= end {
            return;
        }
        if start > 0 {
            let idx = self.index(row, start);
            if self.cells[idx].is_wide_continuation() {
                self.cells[idx - 1].erase(bg);
            }
        }
        if end < self.cols {
            let idx = self.index(row, end);
            if self.cells[idx].is_wide_continuation() {
                self.cells[idx].erase(bg);
            }
        }
        let base = self.index(row, 0);
        for cell in &mut self.cells[base + start as usize..base + end as usize] {
            cell.erase(bg);
        }
    }

    // ── Insert / delete characters ──────────────────────────────────

    /// ICH: shift cells right from `col`, losing those past the margin.
    pub fn insert_chars(&mut self, row: u16, col: u16, count: u16, bg: Color) {
        if row >= self.rows || col >= self.cols || count == 0 {
            return;
        }
        let cols = self.cols as usize;
        let c = col as usize;
        let n = (count as usize).min(cols - c);
        let start = self.index(row, 0);
        let line = &mut self.cells[start..start + cols];

        if line[c].is_wide_continuation() && c > 0 {
            line[c - 1].erase(bg);
            line[c].erase(bg);
        }
        line.copy_within(c..cols - n, c + n);
        for cell in &mut line[c..c + n] {
            cell.erase(bg);
        }
        if line[cols - 1].is_wide() {
            line[cols - 1].erase(bg);
        }
    }

    /// DCH: shift cells left into `col`, blanking the right margin.
    pub fn delete_chars(&mut self, row: u16, col: u16, count: u16, bg: Color) {
        if row >= self.rows || col >= self.cols || count == 0 {
            return;
        }
        let cols = self.cols as usize;
        let c = col as usize;
        let n = (count as usize).min(cols - c);
        let start = self.index(row, 0);
        let line = &mut self.cells[start..start + cols];

        if line[c].is_wide_continuation() && c > 0 {
            line[c - 1].erase(bg);
        }
        line.copy_within(c + n..cols, c);
        for cell in &mut line[cols - n..] {
            cell.erase(bg);
        }
        if line[c].is_wide_continuation() {
            line[c].erase(bg);
        }
    }

    // ── Scroll ──────────────────────────────────────────────────────

    /// Scroll `[top, bottom)` up by `count` rows, blanking the bottom.
    pub fn scroll_up(&mut self, top: u16, bottom: u16, count: u16, bg: Color) {
        let Some((top, bottom, count)) = self.clamp_region(top, bottom, count) else {
            return;
        };
        let cols = self.cols as usize;
        let src = (top + count) as usize * cols;
        let len = (bottom - top - count) as usize * cols;
        self.cells.copy_within(src..src + len, top as usize * cols);
        for cell in &mut self.cells[(bottom - count) as usize * cols..bottom as usize * cols] {
            cell.erase(bg);
        }
    }

    /// Scroll `[top, bottom)` down by `count` rows, blanking the top.
    pub fn scroll_down(&mut self, top: u16, bottom: u16, count: u16, bg: Color) {
        let Some((top, bottom, count)) = self.clamp_region(top, bottom, count) else {
            return;
        };
        let cols = self.cols as usize;
        let src = top as usize * cols;
        let len = (bottom - top - count) as usize * cols;
        self.cells.copy_within(src..src + len, (top + count) as usize * cols);
        for cell in &mut self.cells[src..(top + count) as usize * cols] {
            cell.erase(bg);
        }
    }

    /// Scroll up, moving the evicted rows into `history` when the region
    /// starts at the top of the screen.
    ///
    /// Returns the number of rows that scrolled.
    pub fn scroll_up_into(
        &mut self,
        top: u16,
        bottom: u16,
        count: u16,
        history: &mut LineHistory,
        bg: Color,
    ) -> u16 {
        let Some((top, bottom, count)) = self.clamp_region(top, bottom, count) else {
            return 0;
        };
        if top == 0 {
            for r in 0..count {
                let start = self.index(r, 0);
                history.push_row(&self.cells[start..start + self.cols as usize]);
            }
        }
        self.scroll_up(top, bottom, count, bg);
        count
    }

    /// IL within `[top, bottom)`; no-op when `row` is outside the region.
    pub fn insert_lines(&mut self, row: u16, count: u16, top: u16, bottom: u16, bg: Color) {
        if row >= top && row < bottom {
            self.scroll_down(row, bottom, count, bg);
        }
    }

    /// DL within `[top, bottom)`; no-op when `row` is outside the region.
    pub fn delete_lines(&mut self, row: u16, count: u16, top: u16, bottom: u16, bg: Color) {
        if row >= top && row < bottom {
            self.scroll_up(row, bottom, count, bg);
        }
    }

    fn clamp_region(&self, top: u16, bottom: u16, count: u16) -> Option<(u16, u16, u16)> {
        let top = top.min(self.rows);
        let bottom = bottom.min(self.rows);
        if top >= bottom || count == 0 {
            return None;
        }
        Some((top, bottom, count.min(bottom - top)))
    }

    // ── Printing ────────────────────────────────────────────────────

    /// Write one printable scalar at `(row, col)`.
    ///
    /// Returns the columns consumed: `0` for zero-width characters or a wide
    /// character that does not fit before the margin, otherwise 1 or 2.
    pub fn write_printable(&mut self, row: u16, col: u16, ch: char, attrs: SgrAttrs) -> u8 {
        if row >= self.rows || col >= self.cols {
            return 0;
        }
        let width = Cell::display_width(ch);
        match width {
            0 => 0,
            1 => {
                self.unpair_at(row, col);
                let idx = self.index(row, col);
                self.cells[idx] = Cell::with_attrs(ch, attrs);
                1
            }
            _ => {
                if col + 1 >= self.cols {
                    return 0;
                }
                self.unpair_at(row, col);
                self.unpair_at(row, col + 1);
                let (lead, cont) = Cell::wide(ch, attrs);
                let idx = self.index(row, col);
                self.cells[idx] = lead;
                self.cells[idx + 1] = cont;
                2
            }
        }
    }

    /// Clear the other half of any wide character occupying `(row, col)`.
    fn unpair_at(&mut self, row: u16, col: u16) {
        let idx = self.index(row, col);
        if self.cells[idx].is_wide_continuation() && col > 0 {
            self.cells[idx - 1].clear();
        }
        if self.cells[idx].is_wide() && col + 1 < self.cols {
            self.cells[idx + 1].clear();
        }
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Resize without reflow.
    ///
    /// When the height shrinks, rows above the cursor are pushed into
    /// `history` first so the cursor row stays visible. Columns are
    /// truncated or blank-extended. Returns the adjusted cursor row.
    pub fn resize(
        &mut self,
        new_cols: u16,
        new_rows: u16,
        cursor_row: u16,
        history: &mut LineHistory,
    ) -> u16 {
        let new_cols = new_cols.max(1);
        let new_rows = new_rows.max(1);
        if new_cols == self.cols && new_rows == self.rows {
            return cursor_row;
        }

        let mut first_kept = 0u16;
        if new_rows < self.rows {
            let excess = self.rows - new_rows;
            first_kept = excess.min(cursor_row);
            for r in 0..first_kept {
                let start = self.index(r, 0);
                history.push_row(&self.cells[start..start + self.cols as usize]);
            }
        }

        let mut cells = vec![Cell::default(); new_cols as usize * new_rows as usize];
        let copy_cols = self.cols.min(new_cols) as usize;
        let copy_rows = (self.rows - first_kept).min(new_rows);
        for r in 0..copy_rows {
            let src = self.index(first_kept + r, 0);
            let dst = r as usize * new_cols as usize;
            cells[dst..dst + copy_cols].copy_from_slice(&self.cells[src..src + copy_cols]);
            if copy_cols < self.cols as usize && cells[dst + copy_cols - 1].is_wide() {
                cells[dst + copy_cols - 1].clear();
            }
        }

        self.cells = cells;
        self.cols = new_cols;
        self.rows = new_rows;
        (cursor_row - first_kept).min(new_rows - 1)
    }

    #[inline]
    fn index(&self, row: u16, col: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }
}
