//! Screen cell: one character position in the shell panel grid.
//!
//! A cell stores a single Unicode scalar plus the SGR state that was active
//! when it was printed. Wide characters occupy two cells: a leading cell that
//! carries the character and a continuation cell that renders nothing.

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

bitflags! {
    /// SGR text attribute flags understood by the shell panel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SgrFlags: u8 {
        const BOLD      = 1 << 0;
        const DIM       = 1 << 1;
        const ITALIC    = 1 << 2;
        const UNDERLINE = 1 << 3;
        const INVERSE   = 1 << 4;
        const HIDDEN    = 1 << 5;
    }
}

bitflags! {
    /// Cell-level flags that are orthogonal to SGR attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        /// Leading (left) cell of a 2-column character.
        const WIDE_CHAR = 1 << 0;
        /// Trailing cell of a 2-column character. Content is meaningless.
        const WIDE_CONTINUATION = 1 << 1;
    }
}

/// Terminal color: default, 16 named, 256 indexed, or 24-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default (SGR 39 / SGR 49).
    #[default]
    Default,
    /// Named color index (0-15): standard 8 + bright 8.
    Named(u8),
    /// 256-color palette index.
    Indexed(u8),
    /// True color.
    Rgb(u8, u8, u8),
}

/// SGR state applied to printed cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SgrAttrs {
    pub flags: SgrFlags,
    pub fg: Color,
    pub bg: Color,
}

impl SgrAttrs {
    /// Reset all attributes to default (SGR 0).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply a parameter list from `CSI ... m`.
    ///
    /// Extended colors (`38;5;n`, `38;2;r;g;b` and the `48` forms) consume
    /// their trailing parameters. Unknown parameters are skipped. An empty
    /// list is equivalent to `0`.
    pub fn apply_sgr_params(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.reset();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            let p = params[i];
            match p {
                0 => self.reset(),
                1 => self.flags.insert(SgrFlags::BOLD),
                2 => self.flags.insert(SgrFlags::DIM),
                3 => self.flags.insert(SgrFlags::ITALIC),
                4 => self.flags.insert(SgrFlags::UNDERLINE),
                7 => self.flags.insert(SgrFlags::INVERSE),
                8 => self.flags.insert(SgrFlags::HIDDEN),
                21 | 22 => self.flags.remove(SgrFlags::BOLD | SgrFlags::DIM),
                23 => self.flags.remove(SgrFlags::ITALIC),
                24 => self.flags.remove(SgrFlags::UNDERLINE),
                27 => self.flags.remove(SgrFlags::INVERSE),
                28 => self.flags.remove(SgrFlags::HIDDEN),
                30..=37 => self.fg = Color::Named((p - 30) as u8),
                39 => self.fg = Color::Default,
                40..=47 => self.bg = Color::Named((p - 40) as u8),
                49 => self.bg = Color::Default,
                90..=97 => self.fg = Color::Named((p - 90 + 8) as u8),
                100..=107 => self.bg = Color::Named((p - 100 + 8) as u8),
                38 | 48 => {
                    let (color, consumed) = parse_extended_color(&params[i + 1..]);
                    if let Some(color) = color {
                        if p == 38 {
                            self.fg = color;
                        } else {
                            self.bg = color;
                        }
                    }
                    i += consumed;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Decode the tail of an extended color parameter (`5;n` or `2;r;g;b`).
///
/// Returns the color (if well-formed) and the number of parameters consumed.
fn parse_extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    match rest.first() {
        Some(5) => match rest.get(1) {
            Some(&n) => (Some(Color::Indexed(n.min(255) as u8)), 2),
            None => (None, 1),
        },
        Some(2) => {
            if rest.len() >= 4 {
                let c = |v: u16| v.min(255) as u8;
                (Some(Color::Rgb(c(rest[1]), c(rest[2]), c(rest[3]))), 4)
            } else {
                (None, rest.len())
            }
        }
        Some(_) => (None, 1),
        None => (None, 0),
    }
}

/// A single cell in the terminal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    content: char,
    width: u8,
    pub flags: CellFlags,
    pub attrs: SgrAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            content: ' ',
            width: 1,
            flags: CellFlags::empty(),
            attrs: SgrAttrs::default(),
        }
    }
}

impl Cell {
    /// Create a new cell with the given character and default attributes.
    pub fn new(ch: char) -> Self {
        Self {
            content: ch,
            ..Self::default()
        }
    }

    /// Create a narrow cell with the given attributes.
    pub fn with_attrs(ch: char, attrs: SgrAttrs) -> Self {
        Self {
            content: ch,
            width: 1,
            flags: CellFlags::empty(),
            attrs,
        }
    }

    /// Create a `(leading, continuation)` pair for a 2-column character.
    pub fn wide(ch: char, attrs: SgrAttrs) -> (Self, Self) {
        let leading = Self {
            content: ch,
            width: 2,
            flags: CellFlags::WIDE_CHAR,
            attrs,
        };
        let continuation = Self {
            content: ' ',
            width: 0,
            flags: CellFlags::WIDE_CONTINUATION,
            attrs,
        };
        (leading, continuation)
    }

    /// Display width of `ch` in columns (0, 1 or 2).
    ///
    /// Control characters and combining marks report 0.
    pub fn display_width(ch: char) -> u8 {
        match UnicodeWidthChar::width(ch) {
            Some(w) => w.min(2) as u8,
            None => 0,
        }
    }

    pub fn content(&self) -> char {
        self.content
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn is_wide(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CHAR)
    }

    pub fn is_wide_continuation(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CONTINUATION)
    }

    /// Replace the content and width, dropping any wide-char pairing.
    pub fn set_content(&mut self, ch: char, width: u8) {
        self.content = ch;
        self.width = width;
        self.flags
            .remove(CellFlags::WIDE_CHAR | CellFlags::WIDE_CONTINUATION);
    }

    /// Blank this cell, keeping only the given background (BCE).
    pub fn erase(&mut self, bg: Color) {
        self.content = ' ';
        self.width = 1;
        self.flags = CellFlags::empty();
        self.attrs = SgrAttrs {
            bg,
            ..SgrAttrs::default()
        };
    }

    /// Reset this cell to a blank space with default attributes.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cell_is_space() {
        let cell = Cell::default();
        assert_eq!(cell.content(), ' ');
        assert_eq!(cell.width(), 1);
        assert_eq!(cell.attrs, SgrAttrs::default());
        assert!(!cell.is_wide());
    }

    #[test]
    fn erase_keeps_only_background() {
        let mut cell = Cell::with_attrs(
            'X',
            SgrAttrs {
                flags: SgrFlags::BOLD,
                fg: Color::Named(1),
                bg: Color::Named(4),
            },
        );
        cell.erase(Color::Named(2));
        assert_eq!(cell.content(), ' ');
        assert_eq!(cell.attrs.flags, SgrFlags::empty());
        assert_eq!(cell.attrs.fg, Color::Default);
        assert_eq!(cell.attrs.bg, Color::Named(2));
    }

    #[test]
    fn wide_pair_flags() {
        let (lead, cont) = Cell::wide('中', SgrAttrs::default());
        assert!(lead.is_wide());
        assert_eq!(lead.width(), 2);
        assert!(cont.is_wide_continuation());
        assert_eq!(cont.width(), 0);
    }

    #[test]
    fn display_width_classes() {
        assert_eq!(Cell::display_width('a'), 1);
        assert_eq!(Cell::display_width('中'), 2);
        assert_eq!(Cell::display_width('\u{0301}'), 0);
    }

    #[test]
    fn sgr_basic_colors_and_bold() {
        let mut attrs = SgrAttrs::default();
        attrs.apply_sgr_params(&[1, 31, 44]);
        assert!(attrs.flags.contains(SgrFlags::BOLD));
        assert_eq!(attrs.fg, Color::Named(1));
        assert_eq!(attrs.bg, Color::Named(4));

        attrs.apply_sgr_params(&[22, 39]);
        assert!(!attrs.flags.contains(SgrFlags::BOLD));
        assert_eq!(attrs.fg, Color::Default);
        assert_eq!(attrs.bg, Color::Named(4));
    }

    #[test]
    fn sgr_bright_colors() {
        let mut attrs = SgrAttrs::default();
        attrs.apply_sgr_params(&[92, 103]);
        assert_eq!(attrs.fg, Color::Named(10));
        assert_eq!(attrs.bg, Color::Named(11));
    }

    #[test]
    fn sgr_extended_colors_consume_parameters() {
        let mut attrs = SgrAttrs::default();
        attrs.apply_sgr_params(&[38, 5, 208, 48, 2, 10, 20, 30, 1]);
        assert_eq!(attrs.fg, Color::Indexed(208));
        assert_eq!(attrs.bg, Color::Rgb(10, 20, 30));
        assert!(attrs.flags.contains(SgrFlags::BOLD));
    }

    #[test]
    fn sgr_truncated_extended_color_is_ignored() {
        let mut attrs = SgrAttrs::default();
        attrs.apply_sgr_params(&[38, 2, 1]);
        assert_eq!(attrs.fg, Color::Default);
    }

    #[test]
    fn sgr_empty_is_reset() {
        let mut attrs = SgrAttrs {
            flags: SgrFlags::UNDERLINE,
            fg: Color::Named(3),
            bg: Color::Named(5),
        };
        attrs.apply_sgr_params(&[]);
        assert_eq!(attrs, SgrAttrs::default());
    }
}
