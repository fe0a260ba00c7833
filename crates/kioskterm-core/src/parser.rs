//! VT/ANSI output parser.
//!
//! A byte-at-a-time state machine that turns the shell's output stream into
//! [`Action`]s. State survives between [`Parser::feed`] calls, so a chunk that
//! ends halfway through a UTF-8 scalar or an escape sequence resumes cleanly
//! on the next chunk.
//!
//! Coverage is the subset an interactive shell and line editor need:
//!
//! - printable characters (ASCII + UTF-8) -> `Action::Print`
//! - C0 controls (CR, LF/VT/FF, BS, HT, BEL)
//! - CSI cursor movement, erase, insert/delete, scroll, SGR, DECSTBM, DECTCEM
//! - ESC-level save/restore, index, reverse index, next line, reset
//! - OSC 0/2 window title
//!
//! Anything else (unknown finals, private CSI markers, charset designations,
//! DCS/APC/PM/SOS strings, oversized sequences) is swallowed whole and
//! reported as `Action::Unsupported` so the screen can count it without ever
//! printing its bytes.

/// Longest CSI sequence that is buffered before it is treated as garbage.
pub const MAX_CSI_LEN: usize = 256;
/// Longest OSC payload that is buffered before it is treated as garbage.
pub const MAX_OSC_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Print(char),
    /// LF, VT, and FF.
    Newline,
    CarriageReturn,
    Tab,
    Backspace,
    Bell,
    /// CUU (`CSI Ps A`).
    CursorUp(u16),
    /// CUD (`CSI Ps B`).
    CursorDown(u16),
    /// CUF (`CSI Ps C`).
    CursorRight(u16),
    /// CUB (`CSI Ps D`).
    CursorLeft(u16),
    /// CNL (`CSI Ps E`).
    CursorNextLine(u16),
    /// CPL (`CSI Ps F`).
    CursorPrevLine(u16),
    /// CHA (`CSI Ps G`), 0-indexed.
    CursorColumn(u16),
    /// VPA (`CSI Ps d`), 0-indexed.
    CursorRow(u16),
    /// CUP/HVP, 0-indexed.
    CursorPosition { row: u16, col: u16 },
    /// DECSTBM. `top` is 0-indexed inclusive; `bottom` is exclusive, and 0
    /// means the full height.
    SetScrollRegion { top: u16, bottom: u16 },
    /// SU (`CSI Ps S`).
    ScrollUp(u16),
    /// SD (`CSI Ps T`).
    ScrollDown(u16),
    /// IL (`CSI Ps L`).
    InsertLines(u16),
    /// DL (`CSI Ps M`).
    DeleteLines(u16),
    /// ICH (`CSI Ps @`).
    InsertChars(u16),
    /// DCH (`CSI Ps P`).
    DeleteChars(u16),
    /// ECH (`CSI Ps X`).
    EraseChars(u16),
    /// ED (`CSI Ps J`): 0, 1, 2, or 3 (also clears history).
    EraseInDisplay(u8),
    /// EL (`CSI Ps K`): 0, 1, or 2.
    EraseInLine(u8),
    /// SGR parameters, interpreted by [`SgrAttrs`](crate::SgrAttrs).
    Sgr(Vec<u16>),
    /// `CSI ? Pm h`.
    DecSet(Vec<u16>),
    /// `CSI ? Pm l`.
    DecRst(Vec<u16>),
    /// DECSC (`ESC 7`) or SCOSC (`CSI s`).
    SaveCursor,
    /// DECRC (`ESC 8`) or SCORC (`CSI u`).
    RestoreCursor,
    /// IND (`ESC D`).
    Index,
    /// RI (`ESC M`).
    ReverseIndex,
    /// NEL (`ESC E`).
    NextLine,
    /// RIS (`ESC c`).
    FullReset,
    /// OSC 0 / OSC 2.
    SetTitle(String),
    /// A sequence that was consumed without effect. Holds the bytes that
    /// were buffered (possibly truncated), for diagnostics only.
    Unsupported(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Esc,
    /// `ESC` followed by intermediate bytes (e.g. `ESC ( B`).
    EscIntermediate,
    Csi,
    Osc,
    OscEsc,
    /// DCS / SOS / PM / APC body, ignored until ST.
    Str,
    StrEsc,
    Utf8 {
        bytes_remaining: u8,
    },
}

#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    buf: Vec<u8>,
    /// Set when the current sequence outgrew its buffer limit.
    overflow: bool,
    utf8_buf: [u8; 4],
    utf8_len: u8,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            buf: Vec::new(),
            overflow: false,
            utf8_buf: [0; 4],
            utf8_len: 0,
        }
    }

    /// Whether the parser is between tokens.
    pub fn is_ground(&self) -> bool {
        self.state == State::Ground
    }

    /// Feed a chunk of bytes and return parsed actions.
    #[must_use]
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Action> {
        let mut out = Vec::new();
        for &b in bytes {
            if let Some(action) = self.advance(b) {
                out.push(action);
            }
        }
        out
    }

    /// Advance by one byte, returning an action once a token completes.
    pub fn advance(&mut self, b: u8) -> Option<Action> {
        match self.state {
            State::Ground => self.advance_ground(b),
            State::Esc => self.advance_esc(b),
            State::EscIntermediate => self.advance_esc_intermediate(b),
            State::Csi => self.advance_csi(b),
            State::Osc => self.advance_osc(b),
            State::OscEsc => self.advance_osc_esc(b),
            State::Str => self.advance_str(b),
            State::StrEsc => self.advance_str_esc(b),
            State::Utf8 { bytes_remaining } => self.advance_utf8(b, bytes_remaining),
        }
    }

    fn advance_ground(&mut self, b: u8) -> Option<Action> {
        match b {
            b'\n' | 0x0B | 0x0C => Some(Action::Newline),
            b'\r' => Some(Action::CarriageReturn),
            b'\t' => Some(Action::Tab),
            0x08 => Some(Action::Backspace),
            0x07 => Some(Action::Bell),
            0x1b => {
                self.begin(State::Esc);
                None
            }
            0x20..=0x7E => Some(Action::Print(b as char)),
            0xC2..=0xDF => self.begin_utf8(b, 1),
            0xE0..=0xEF => self.begin_utf8(b, 2),
            0xF0..=0xF4 => self.begin_utf8(b, 3),
            // Remaining C0 controls, DEL, and invalid UTF-8 lead bytes.
            _ => None,
        }
    }

    fn begin_utf8(&mut self, b: u8, remaining: u8) -> Option<Action> {
        self.utf8_buf[0] = b;
        self.utf8_len = 1;
        self.state = State::Utf8 {
            bytes_remaining: remaining,
        };
        None
    }

    fn advance_utf8(&mut self, b: u8, bytes_remaining: u8) -> Option<Action> {
        if !(0x80..=0xBF).contains(&b) {
            // Malformed: drop the partial scalar and reprocess this byte.
            self.state = State::Ground;
            self.utf8_len = 0;
            return self.advance_ground(b);
        }
        let idx = self.utf8_len as usize;
        if idx < self.utf8_buf.len() {
            self.utf8_buf[idx] = b;
            self.utf8_len += 1;
        }
        if bytes_remaining > 1 {
            self.state = State::Utf8 {
                bytes_remaining: bytes_remaining - 1,
            };
            return None;
        }
        self.state = State::Ground;
        let len = self.utf8_len as usize;
        self.utf8_len = 0;
        core::str::from_utf8(&self.utf8_buf[..len])
            .ok()
            .and_then(|s| s.chars().next())
            .map(Action::Print)
    }

    fn advance_esc(&mut self, b: u8) -> Option<Action> {
        self.push(b, MAX_CSI_LEN);
        let action = match b {
            b'[' => {
                self.state = State::Csi;
                return None;
            }
            b']' => {
                self.state = State::Osc;
                return None;
            }
            b'P' | b'X' | b'^' | b'_' => {
                self.state = State::Str;
                return None;
            }
            0x20..=0x2F => {
                self.state = State::EscIntermediate;
                return None;
            }
            0x18 | 0x1A => Action::Unsupported(self.take_buf()),
            0x1b => {
                // ESC ESC: drop the first, restart on the second.
                let dropped = self.take_buf();
                self.begin(State::Esc);
                return Some(Action::Unsupported(dropped));
            }
            b'7' => Action::SaveCursor,
            b'8' => Action::RestoreCursor,
            b'D' => Action::Index,
            b'M' => Action::ReverseIndex,
            b'E' => Action::NextLine,
            b'c' => Action::FullReset,
            _ => Action::Unsupported(self.take_buf()),
        };
        self.finish();
        Some(action)
    }

    fn advance_esc_intermediate(&mut self, b: u8) -> Option<Action> {
        self.push(b, MAX_CSI_LEN);
        match b {
            0x20..=0x2F => None,
            _ => {
                let seq = self.take_buf();
                self.finish();
                Some(Action::Unsupported(seq))
            }
        }
    }

    fn advance_csi(&mut self, b: u8) -> Option<Action> {
        match b {
            0x18 | 0x1A => {
                let seq = self.take_buf();
                self.finish();
                Some(Action::Unsupported(seq))
            }
            0x1b => {
                let seq = self.take_buf();
                self.begin(State::Esc);
                Some(Action::Unsupported(seq))
            }
            0x40..=0x7E => {
                self.push(b, MAX_CSI_LEN);
                let overflow = self.overflow;
                let seq = self.take_buf();
                self.finish();
                if overflow {
                    return Some(Action::Unsupported(seq));
                }
                Some(Self::decode_csi(&seq).unwrap_or(Action::Unsupported(seq)))
            }
            _ => {
                self.push(b, MAX_CSI_LEN);
                None
            }
        }
    }

    fn advance_osc(&mut self, b: u8) -> Option<Action> {
        match b {
            0x07 => Some(self.finish_osc()),
            0x1b => {
                self.state = State::OscEsc;
                None
            }
            0x18 | 0x1A => {
                let seq = self.take_buf();
                self.finish();
                Some(Action::Unsupported(seq))
            }
            _ => {
                self.push(b, MAX_OSC_LEN);
                None
            }
        }
    }

    fn advance_osc_esc(&mut self, b: u8) -> Option<Action> {
        if b == b'\\' {
            return Some(self.finish_osc());
        }
        // Not ST; keep collecting.
        self.push(0x1b, MAX_OSC_LEN);
        self.state = State::Osc;
        self.advance_osc(b)
    }

    fn finish_osc(&mut self) -> Action {
        let overflow = self.overflow;
        let seq = self.take_buf();
        self.finish();
        if overflow {
            return Action::Unsupported(seq);
        }
        Self::decode_osc(&seq).unwrap_or(Action::Unsupported(seq))
    }

    fn advance_str(&mut self, b: u8) -> Option<Action> {
        match b {
            0x1b => {
                self.state = State::StrEsc;
                None
            }
            0x07 | 0x18 | 0x1A => {
                let seq = self.take_buf();
                self.finish();
                Some(Action::Unsupported(seq))
            }
            _ => {
                self.push(b, MAX_CSI_LEN);
                None
            }
        }
    }

    fn advance_str_esc(&mut self, b: u8) -> Option<Action> {
        if b == b'\\' {
            let seq = self.take_buf();
            self.finish();
            return Some(Action::Unsupported(seq));
        }
        self.state = State::Str;
        self.advance_str(b)
    }

    fn begin(&mut self, state: State) {
        self.state = state;
        self.buf.clear();
        self.buf.push(0x1b);
        self.overflow = false;
    }

    fn finish(&mut self) {
        self.state = State::Ground;
        self.overflow = false;
    }

    fn push(&mut self, b: u8, limit: usize) {
        if self.buf.len() < limit {
            self.buf.push(b);
        } else {
            self.overflow = true;
        }
    }

    fn take_buf(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.buf)
    }

    fn decode_csi(seq: &[u8]) -> Option<Action> {
        if seq.len() < 3 || seq[0] != 0x1b || seq[1] != b'[' {
            return None;
        }
        let final_byte = *seq.last()?;
        let param_bytes = &seq[2..seq.len() - 1];

        if let Some(private) = param_bytes.strip_prefix(b"?") {
            let params = Self::parse_csi_params(private)?;
            return match final_byte {
                b'h' => Some(Action::DecSet(params)),
                b'l' => Some(Action::DecRst(params)),
                _ => None,
            };
        }

        let params = Self::parse_csi_params(param_bytes)?;
        let first = params.first().copied();
        let count = Self::csi_count_or_one(first);

        let action = match final_byte {
            b'A' => Action::CursorUp(count),
            b'B' | b'e' => Action::CursorDown(count),
            b'C' | b'a' => Action::CursorRight(count),
            b'D' => Action::CursorLeft(count),
            b'E' => Action::CursorNextLine(count),
            b'F' => Action::CursorPrevLine(count),
            b'G' | b'`' => Action::CursorColumn(count - 1),
            b'd' => Action::CursorRow(count - 1),
            b'H' | b'f' => Action::CursorPosition {
                row: Self::csi_count_or_one(first) - 1,
                col: Self::csi_count_or_one(params.get(1).copied()) - 1,
            },
            b'J' => match first.unwrap_or(0) {
                mode @ 0..=3 => Action::EraseInDisplay(mode as u8),
                _ => return None,
            },
            b'K' => match first.unwrap_or(0) {
                mode @ 0..=2 => Action::EraseInLine(mode as u8),
                _ => return None,
            },
            b'L' => Action::InsertLines(count),
            b'M' => Action::DeleteLines(count),
            b'@' => Action::InsertChars(count),
            b'P' => Action::DeleteChars(count),
            b'X' => Action::EraseChars(count),
            b'S' => Action::ScrollUp(count),
            b'T' => Action::ScrollDown(count),
            b'r' => Action::SetScrollRegion {
                top: first.unwrap_or(0).max(1) - 1,
                bottom: params.get(1).copied().unwrap_or(0),
            },
            b'm' => Action::Sgr(params),
            b's' if params.is_empty() => Action::SaveCursor,
            b'u' if params.is_empty() => Action::RestoreCursor,
            _ => return None,
        };
        Some(action)
    }

    fn decode_osc(seq: &[u8]) -> Option<Action> {
        let content = seq.strip_prefix(b"\x1b]")?;
        let semi = content.iter().position(|&b| b == b';')?;
        let cmd: u16 = core::str::from_utf8(&content[..semi]).ok()?.parse().ok()?;
        match cmd {
            0 | 2 => Some(Action::SetTitle(
                String::from_utf8_lossy(&content[semi + 1..]).into_owned(),
            )),
            _ => None,
        }
    }

    /// Split on `;`; empty fields are 0 and values clamp to `u16::MAX`.
    /// Any other byte (sub-parameters, private markers) rejects the list.
    fn parse_csi_params(params: &[u8]) -> Option<Vec<u16>> {
        if params.is_empty() {
            return Some(Vec::new());
        }
        let s = core::str::from_utf8(params).ok()?;
        s.split(';')
            .map(|part| {
                if part.is_empty() {
                    Some(0)
                } else {
                    part.parse::<u32>()
                        .ok()
                        .map(|v| v.min(u16::MAX as u32) as u16)
                }
            })
            .collect()
    }

    fn csi_count_or_one(value: Option<u16>) -> u16 {
        value.unwrap_or(1).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsupported(actions: &[Action]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, Action::Unsupported(_)))
            .count()
    }

    // ── Ground ──────────────────────────────────────────────────────

    #[test]
    fn printable_ascii_emits_print() {
        let mut p = Parser::new();
        assert_eq!(p.feed(b"hi"), vec![Action::Print('h'), Action::Print('i')]);
    }

    #[test]
    fn c0_controls_emit_actions() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\t\r\n\x08\x07"),
            vec![
                Action::Tab,
                Action::CarriageReturn,
                Action::Newline,
                Action::Backspace,
                Action::Bell
            ]
        );
    }

    #[test]
    fn other_c0_and_del_are_dropped() {
        let mut p = Parser::new();
        assert!(p.feed(b"\x00\x0e\x0f\x7f").is_empty());
    }

    // ── UTF-8 ───────────────────────────────────────────────────────

    #[test]
    fn utf8_mixed_with_ascii() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed("aé中🎉".as_bytes()),
            vec![
                Action::Print('a'),
                Action::Print('é'),
                Action::Print('中'),
                Action::Print('🎉'),
            ]
        );
    }

    #[test]
    fn utf8_split_across_feeds() {
        let mut p = Parser::new();
        assert!(p.feed(&[0xF0, 0x9F]).is_empty());
        assert!(p.feed(&[0x8E]).is_empty());
        assert_eq!(p.feed(&[0x89]), vec![Action::Print('🎉')]);
    }

    #[test]
    fn utf8_invalid_continuation_reprocesses_byte() {
        let mut p = Parser::new();
        assert_eq!(p.feed(&[0xC3, b'a']), vec![Action::Print('a')]);
    }

    // ── CSI ─────────────────────────────────────────────────────────

    #[test]
    fn cursor_moves_default_to_one() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\x1b[A\x1b[3B\x1b[0C\x1b[2D"),
            vec![
                Action::CursorUp(1),
                Action::CursorDown(3),
                Action::CursorRight(1),
                Action::CursorLeft(2),
            ]
        );
    }

    #[test]
    fn cup_is_one_indexed_on_the_wire() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\x1b[5;10H\x1b[H\x1b[;4f"),
            vec![
                Action::CursorPosition { row: 4, col: 9 },
                Action::CursorPosition { row: 0, col: 0 },
                Action::CursorPosition { row: 0, col: 3 },
            ]
        );
    }

    #[test]
    fn erase_modes() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\x1b[J\x1b[2J\x1b[3J\x1b[K\x1b[1K"),
            vec![
                Action::EraseInDisplay(0),
                Action::EraseInDisplay(2),
                Action::EraseInDisplay(3),
                Action::EraseInLine(0),
                Action::EraseInLine(1),
            ]
        );
    }

    #[test]
    fn sgr_params_are_kept_raw() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\x1b[1;31m\x1b[m"),
            vec![Action::Sgr(vec![1, 31]), Action::Sgr(vec![])]
        );
    }

    #[test]
    fn dectcem_is_decoded() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\x1b[?25l\x1b[?25h"),
            vec![Action::DecRst(vec![25]), Action::DecSet(vec![25])]
        );
    }

    #[test]
    fn scroll_region_and_line_edits() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\x1b[2;10r\x1b[L\x1b[2M\x1b[3@\x1b[P\x1b[4X"),
            vec![
                Action::SetScrollRegion { top: 1, bottom: 10 },
                Action::InsertLines(1),
                Action::DeleteLines(2),
                Action::InsertChars(3),
                Action::DeleteChars(1),
                Action::EraseChars(4),
            ]
        );
    }

    #[test]
    fn csi_save_restore() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\x1b[s\x1b[u"),
            vec![Action::SaveCursor, Action::RestoreCursor]
        );
    }

    #[test]
    fn private_markers_are_swallowed() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1b[>0c\x1b[=5u\x1b[?1049hX");
        assert_eq!(unsupported(&actions), 2);
        assert_eq!(actions[2], Action::DecSet(vec![1049]));
        assert_eq!(actions[3], Action::Print('X'));
    }

    #[test]
    fn unknown_final_is_swallowed() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1b[5nok");
        assert_eq!(unsupported(&actions), 1);
        assert_eq!(&actions[1..], &[Action::Print('o'), Action::Print('k')]);
    }

    #[test]
    fn subparameters_are_swallowed() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1b[4:3m");
        assert_eq!(unsupported(&actions), 1);
    }

    #[test]
    fn csi_split_across_feeds() {
        let mut p = Parser::new();
        assert!(p.feed(b"\x1b").is_empty());
        assert!(p.feed(b"[1").is_empty());
        assert!(p.feed(b";3").is_empty());
        assert_eq!(p.feed(b"2m"), vec![Action::Sgr(vec![1, 32])]);
        assert!(p.is_ground());
    }

    #[test]
    fn oversized_csi_is_discarded() {
        let mut p = Parser::new();
        let mut seq = b"\x1b[".to_vec();
        seq.extend(std::iter::repeat_n(b'1', MAX_CSI_LEN * 2));
        seq.push(b'A');
        let actions = p.feed(&seq);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::Unsupported(_)));
        assert!(p.is_ground());
    }

    #[test]
    fn cancel_aborts_csi() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1b[12\x18Z");
        assert_eq!(unsupported(&actions), 1);
        assert_eq!(actions[1], Action::Print('Z'));
    }

    #[test]
    fn escape_inside_csi_restarts() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1b[12\x1b[2J");
        assert_eq!(unsupported(&actions), 1);
        assert_eq!(actions[1], Action::EraseInDisplay(2));
    }

    // ── ESC ─────────────────────────────────────────────────────────

    #[test]
    fn esc_level_sequences() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\x1b7\x1b8\x1bD\x1bM\x1bE\x1bc"),
            vec![
                Action::SaveCursor,
                Action::RestoreCursor,
                Action::Index,
                Action::ReverseIndex,
                Action::NextLine,
                Action::FullReset,
            ]
        );
    }

    #[test]
    fn charset_designation_does_not_leak_text() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1b(B\x1b[mx");
        assert_eq!(
            actions,
            vec![
                Action::Unsupported(b"\x1b(B".to_vec()),
                Action::Sgr(vec![]),
                Action::Print('x'),
            ]
        );
    }

    #[test]
    fn unknown_esc_final_is_swallowed() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1b=a");
        assert_eq!(
            actions,
            vec![Action::Unsupported(b"\x1b=".to_vec()), Action::Print('a')]
        );
    }

    #[test]
    fn dcs_string_is_swallowed_until_st() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1bP1$r0m\x1b\\ok");
        assert_eq!(unsupported(&actions), 1);
        assert_eq!(&actions[1..], &[Action::Print('o'), Action::Print('k')]);
    }

    // ── OSC ─────────────────────────────────────────────────────────

    #[test]
    fn osc_title_with_bel_and_st() {
        let mut p = Parser::new();
        assert_eq!(
            p.feed(b"\x1b]0;user@host: ~\x07\x1b]2;second\x1b\\"),
            vec![
                Action::SetTitle("user@host: ~".to_string()),
                Action::SetTitle("second".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_osc_is_swallowed() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1b]7;file:///home\x07$");
        assert_eq!(unsupported(&actions), 1);
        assert_eq!(actions[1], Action::Print('$'));
    }

    #[test]
    fn oversized_osc_is_discarded() {
        let mut p = Parser::new();
        let mut seq = b"\x1b]0;".to_vec();
        seq.extend(std::iter::repeat_n(b'x', MAX_OSC_LEN + 10));
        seq.push(0x07);
        let actions = p.feed(&seq);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::Unsupported(_)));
    }

    #[test]
    fn typical_prompt_sequence() {
        let mut p = Parser::new();
        let actions = p.feed(b"\x1b]0;pi@kiosk\x07\x1b[01;32mpi\x1b[00m:$ ");
        assert_eq!(actions[0], Action::SetTitle("pi@kiosk".to_string()));
        assert_eq!(actions[1], Action::Sgr(vec![1, 32]));
        assert_eq!(actions[2], Action::Print('p'));
        assert_eq!(actions[4], Action::Sgr(vec![0]));
        assert_eq!(unsupported(&actions), 0);
    }
}
