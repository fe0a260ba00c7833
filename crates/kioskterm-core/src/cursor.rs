//! Cursor state: position, pending wrap, scroll region, pen, and blink phase.

use crate::cell::SgrAttrs;

/// Fixed tab stop spacing.
pub const TAB_WIDTH: u16 = 8;

/// State saved by DECSC / `CSI s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SavedCursor {
    pub row: u16,
    pub col: u16,
    pub attrs: SgrAttrs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
    /// Set after printing into the last column; the next printable wraps.
    pub pending_wrap: bool,
    /// Pen applied to newly printed cells.
    pub attrs: SgrAttrs,
    /// DECTCEM visibility requested by the application.
    pub visible: bool,
    /// Blink phase driven by the render loop, not by output.
    pub blink_on: bool,
    scroll_top: u16,
    scroll_bottom: u16,
}

impl Cursor {
    pub fn new(rows: u16) -> Self {
        Self {
            row: 0,
            col: 0,
            pending_wrap: false,
            attrs: SgrAttrs::default(),
            visible: true,
            blink_on: true,
            scroll_top: 0,
            scroll_bottom: rows.max(1),
        }
    }

    /// Top of the scroll region (inclusive).
    pub fn scroll_top(&self) -> u16 {
        self.scroll_top
    }

    /// Bottom of the scroll region (exclusive).
    pub fn scroll_bottom(&self) -> u16 {
        self.scroll_bottom
    }

    /// DECSTBM. Invalid regions reset to the full screen.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16, rows: u16) {
        let bottom = bottom.min(rows);
        if top + 1 < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        } else {
            self.reset_scroll_region(rows);
        }
    }

    pub fn reset_scroll_region(&mut self, rows: u16) {
        self.scroll_top = 0;
        self.scroll_bottom = rows.max(1);
    }

    pub fn move_to(&mut self, row: u16, col: u16, rows: u16, cols: u16) {
        self.row = row.min(rows.saturating_sub(1));
        self.col = col.min(cols.saturating_sub(1));
        self.pending_wrap = false;
    }

    pub fn move_up(&mut self, n: u16) {
        let floor = if self.row >= self.scroll_top {
            self.scroll_top
        } else {
            0
        };
        self.row = self.row.saturating_sub(n).max(floor);
        self.pending_wrap = false;
    }

    pub fn move_down(&mut self, n: u16, rows: u16) {
        let ceiling = if self.row < self.scroll_bottom {
            self.scroll_bottom
        } else {
            rows
        };
        self.row = self.row.saturating_add(n).min(ceiling.saturating_sub(1));
        self.pending_wrap = false;
    }

    pub fn move_left(&mut self, n: u16) {
        self.col = self.col.saturating_sub(n);
        self.pending_wrap = false;
    }

    pub fn move_right(&mut self, n: u16, cols: u16) {
        self.col = self.col.saturating_add(n).min(cols.saturating_sub(1));
        self.pending_wrap = false;
    }

    pub fn carriage_return(&mut self) {
        self.col = 0;
        self.pending_wrap = false;
    }

    /// Column of the next tab stop, clamped to the last column.
    pub fn next_tab_stop(&self, cols: u16) -> u16 {
        let next = (self.col / TAB_WIDTH + 1) * TAB_WIDTH;
        next.min(cols.saturating_sub(1))
    }

    pub fn save(&self) -> SavedCursor {
        SavedCursor {
            row: self.row,
            col: self.col,
            attrs: self.attrs,
        }
    }

    pub fn restore(&mut self, saved: &SavedCursor, rows: u16, cols: u16) {
        self.move_to(saved.row, saved.col, rows, cols);
        self.attrs = saved.attrs;
    }

    /// Clamp position and region after a grid resize.
    pub fn clamp(&mut self, rows: u16, cols: u16) {
        self.row = self.row.min(rows.saturating_sub(1));
        self.col = self.col.min(cols.saturating_sub(1));
        self.pending_wrap = false;
        self.reset_scroll_region(rows);
    }
}
