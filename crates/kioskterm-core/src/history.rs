//! Line history: rows that have scrolled off the top of the grid.
//!
//! Rows keep their cells so colors survive into scrollback. Storage is a
//! `VecDeque` ring; pushing past capacity evicts the oldest row.

use std::collections::VecDeque;

use crate::cell::Cell;

/// A row that left the visible grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLine {
    pub cells: Vec<Cell>,
}

impl HistoryLine {
    pub fn new(cells: &[Cell]) -> Self {
        Self {
            cells: cells.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Text content with trailing blanks removed.
    pub fn text(&self) -> String {
        row_text(&self.cells)
    }
}

/// Bounded ring of scrolled-off rows.
#[derive(Debug, Clone)]
pub struct LineHistory {
    lines: VecDeque<HistoryLine>,
    capacity: usize,
    pushed: u64,
}

impl LineHistory {
    /// A capacity of `0` disables history (all pushes are dropped).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            pushed: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Rows ever stored, evicted ones included. Keeps growing once the ring
    /// is full, unlike [`len`](Self::len).
    #[must_use]
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    /// Append a row at the newest end, returning the evicted oldest row
    /// when the ring was full.
    pub fn push_row(&mut self, cells: &[Cell]) -> Option<HistoryLine> {
        if self.capacity == 0 {
            return None;
        }
        let evicted = if self.lines.len() == self.capacity {
            self.lines.pop_front()
        } else {
            None
        };
        self.lines.push_back(HistoryLine::new(cells));
        self.pushed += 1;
        evicted
    }

    /// Remove and return the newest row.
    pub fn pop_newest(&mut self) -> Option<HistoryLine> {
        self.lines.pop_back()
    }

    /// Line by index, `0` being the oldest.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HistoryLine> {
        self.lines.get(index)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryLine> {
        self.lines.iter()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Render a row of cells as text, skipping wide continuations and trailing
/// blanks.
pub fn row_text(cells: &[Cell]) -> String {
    let mut out: String = cells
        .iter()
        .filter(|c| !c.is_wide_continuation())
        .map(Cell::content)
        .collect();
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    out
}
