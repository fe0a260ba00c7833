//! Keyboard input: canonical key events, terminal encoding and routing.
//!
//! Every key first meets the reserved allow-list ([`KeyBindings`]). A hit
//! becomes a [`Command`] whatever the mode, so a reserved chord never reaches
//! the shell even when it collides with a shell binding. Everything else is
//! encoded to xterm bytes for the shell (Terminal mode, split layout) or
//! handled as dashboard navigation (Overview, TaskList).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::{BindingConfig, Layout};
use crate::error::ConfigError;
use crate::mode::DashboardMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    BackTab,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    F(u8),
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const SUPER = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::empty(),
        }
    }

    pub const fn with(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    pub fn ctrl(c: char) -> Self {
        Self::with(KeyCode::Char(c), Modifiers::CTRL)
    }

    /// Case-fold letters, keeping their case as SHIFT, so `shift+q` matches
    /// `Q` but not `q`. SHIFT is dropped from other characters, and from
    /// letters chorded with Ctrl or Alt so that `ctrl+q` also matches
    /// Ctrl+Shift+Q.
    fn normalized(self) -> Self {
        let KeyCode::Char(c) = self.code else {
            return self;
        };
        let mut modifiers = self.modifiers;
        if c.is_ascii_alphabetic() && !modifiers.intersects(Modifiers::CTRL | Modifiers::ALT) {
            if c.is_ascii_uppercase() {
                modifiers |= Modifiers::SHIFT;
            }
        } else {
            modifiers -= Modifiers::SHIFT;
        }
        Self {
            code: KeyCode::Char(c.to_ascii_lowercase()),
            modifiers,
        }
    }
}

/// Convert a crossterm key event. Releases and unmapped keys yield `None`.
pub fn from_crossterm(event: crossterm::event::KeyEvent) -> Option<KeyEvent> {
    use crossterm::event::{KeyCode as Ct, KeyEventKind, KeyModifiers};

    if event.kind == KeyEventKind::Release {
        return None;
    }
    let code = match event.code {
        Ct::Char(c) => KeyCode::Char(c),
        Ct::Enter => KeyCode::Enter,
        Ct::Esc => KeyCode::Escape,
        Ct::Backspace => KeyCode::Backspace,
        Ct::Tab => KeyCode::Tab,
        Ct::BackTab => KeyCode::BackTab,
        Ct::Delete => KeyCode::Delete,
        Ct::Insert => KeyCode::Insert,
        Ct::Home => KeyCode::Home,
        Ct::End => KeyCode::End,
        Ct::PageUp => KeyCode::PageUp,
        Ct::PageDown => KeyCode::PageDown,
        Ct::Up => KeyCode::Up,
        Ct::Down => KeyCode::Down,
        Ct::Left => KeyCode::Left,
        Ct::Right => KeyCode::Right,
        Ct::F(n) => KeyCode::F(n),
        _ => return None,
    };
    let mut modifiers = Modifiers::empty();
    if event.modifiers.contains(KeyModifiers::SHIFT) {
        modifiers |= Modifiers::SHIFT;
    }
    if event.modifiers.contains(KeyModifiers::ALT) {
        modifiers |= Modifiers::ALT;
    }
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        modifiers |= Modifiers::CTRL;
    }
    if event.modifiers.intersects(KeyModifiers::SUPER | KeyModifiers::META | KeyModifiers::HYPER) {
        modifiers |= Modifiers::SUPER;
    }
    // BackTab already implies shift.
    if code == KeyCode::BackTab {
        modifiers -= Modifiers::SHIFT;
    }
    Some(KeyEvent { code, modifiers })
}

// ── Terminal encoding ───────────────────────────────────────────────────

/// xterm byte sequence for `key`, or `None` if it has no encoding.
pub fn encode_key(key: &KeyEvent) -> Option<Vec<u8>> {
    let mods = key.modifiers - Modifiers::SUPER;
    let bytes = match key.code {
        KeyCode::Char(c) => encode_char(c, mods),
        KeyCode::Enter => alt_prefixed(mods, b"\r"),
        KeyCode::Escape => alt_prefixed(mods, b"\x1b"),
        KeyCode::Backspace => alt_prefixed(mods, &[0x7f]),
        KeyCode::Tab => alt_prefixed(mods, b"\t"),
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Up => csi_letter('A', mods),
        KeyCode::Down => csi_letter('B', mods),
        KeyCode::Right => csi_letter('C', mods),
        KeyCode::Left => csi_letter('D', mods),
        KeyCode::Home => csi_letter('H', mods),
        KeyCode::End => csi_letter('F', mods),
        KeyCode::Insert => csi_tilde(2, mods),
        KeyCode::Delete => csi_tilde(3, mods),
        KeyCode::PageUp => csi_tilde(5, mods),
        KeyCode::PageDown => csi_tilde(6, mods),
        KeyCode::F(n) => encode_function_key(n, mods),
    };
    (!bytes.is_empty()).then_some(bytes)
}

fn encode_char(c: char, mods: Modifiers) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    if mods.contains(Modifiers::ALT) {
        out.push(0x1b);
    }
    if mods.contains(Modifiers::CTRL) {
        match ctrl_byte(c) {
            Some(b) => out.push(b),
            None => return Vec::new(),
        }
        return out;
    }
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    out
}

fn ctrl_byte(c: char) -> Option<u8> {
    match c {
        '@' | ' ' | '2' => Some(0x00),
        'a'..='z' => Some(c as u8 - b'a' + 1),
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '7' | '/' => Some(0x1f),
        '?' | '8' => Some(0x7f),
        _ => None,
    }
}

fn alt_prefixed(mods: Modifiers, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    if mods.contains(Modifiers::ALT) {
        out.push(0x1b);
    }
    out.extend_from_slice(bytes);
    out
}

/// xterm modifier parameter: 1 + shift/alt/ctrl bits.
fn modifier_param(mods: Modifiers) -> u8 {
    1 + mods.bits()
}

fn csi_letter(letter: char, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        format!("\x1b[{letter}").into_bytes()
    } else {
        format!("\x1b[1;{}{letter}", modifier_param(mods)).into_bytes()
    }
}

fn csi_tilde(code: u8, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        format!("\x1b[{code}~").into_bytes()
    } else {
        format!("\x1b[{code};{}~", modifier_param(mods)).into_bytes()
    }
}

fn encode_function_key(n: u8, mods: Modifiers) -> Vec<u8> {
    match n {
        1..=4 => {
            let last = [b'P', b'Q', b'R', b'S'][usize::from(n - 1)];
            if mods.is_empty() {
                vec![0x1b, b'O', last]
            } else {
                format!("\x1b[1;{}{}", modifier_param(mods), last as char).into_bytes()
            }
        }
        5 => csi_tilde(15, mods),
        6 => csi_tilde(17, mods),
        7 => csi_tilde(18, mods),
        8 => csi_tilde(19, mods),
        9 => csi_tilde(20, mods),
        10 => csi_tilde(21, mods),
        11 => csi_tilde(23, mods),
        12 => csi_tilde(24, mods),
        _ => Vec::new(),
    }
}

// ── Reserved keys ───────────────────────────────────────────────────────

/// Dashboard-level commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Quit,
    RefreshNow,
    ShowOverview,
    ShowTaskList,
    ShowTerminal,
    /// Scroll the terminal view a page back into history.
    HistoryUp,
    HistoryDown,
    TaskUp,
    TaskDown,
}

impl Command {
    pub fn is_mode_switch(self) -> bool {
        matches!(
            self,
            Self::ShowOverview | Self::ShowTaskList | Self::ShowTerminal
        )
    }
}

/// Reserved chords when the config does not override them.
pub const DEFAULT_BINDINGS: &[(&str, Command)] = &[
    ("ctrl+q", Command::Quit),
    ("ctrl+r", Command::RefreshNow),
    ("f1", Command::ShowOverview),
    ("f2", Command::ShowTaskList),
    ("f3", Command::ShowTerminal),
    ("shift+pageup", Command::HistoryUp),
    ("shift+pagedown", Command::HistoryDown),
];

/// Parse a chord such as `ctrl+q`, `shift+pageup` or `f2`.
pub fn parse_chord(spec: &str) -> Result<KeyEvent, ConfigError> {
    let bad = |reason: &str| ConfigError::Binding {
        binding: spec.to_string(),
        reason: reason.to_string(),
    };
    let parts: Vec<&str> = spec.split('+').map(str::trim).collect();
    let Some((key, mods)) = parts.split_last() else {
        return Err(bad("empty"));
    };

    let mut modifiers = Modifiers::empty();
    for m in mods {
        modifiers |= match m.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Modifiers::CTRL,
            "alt" | "meta" => Modifiers::ALT,
            "shift" => Modifiers::SHIFT,
            "super" => Modifiers::SUPER,
            _ => return Err(bad("unknown modifier")),
        };
    }

    let lower = key.to_ascii_lowercase();
    let code = match lower.as_str() {
        "" => return Err(bad("missing key")),
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Escape,
        "backspace" => KeyCode::Backspace,
        "tab" => KeyCode::Tab,
        "backtab" => KeyCode::BackTab,
        "delete" | "del" => KeyCode::Delete,
        "insert" | "ins" => KeyCode::Insert,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" | "pgup" => KeyCode::PageUp,
        "pagedown" | "pgdn" => KeyCode::PageDown,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "space" => KeyCode::Char(' '),
        f if f.len() > 1 && f.starts_with('f') => match f[1..].parse::<u8>() {
            Ok(n @ 1..=12) => KeyCode::F(n),
            _ => return Err(bad("unknown key")),
        },
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return Err(bad("unknown key")),
            }
        }
    };
    Ok(KeyEvent { code, modifiers }.normalized())
}

/// The reserved allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    entries: Vec<(KeyEvent, Command)>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let entries = DEFAULT_BINDINGS
            .iter()
            .filter_map(|(spec, cmd)| parse_chord(spec).ok().map(|k| (k, *cmd)))
            .collect();
        Self { entries }
    }
}

impl KeyBindings {
    pub fn from_config(bindings: &[BindingConfig]) -> Result<Self, ConfigError> {
        let entries = bindings
            .iter()
            .map(|b| parse_chord(&b.key).map(|k| (k, b.command)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn lookup(&self, key: &KeyEvent) -> Option<Command> {
        let key = key.normalized();
        self.entries
            .iter()
            .find(|(chord, _)| *chord == key)
            .map(|(_, cmd)| *cmd)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Routing ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ForwardToTerminal(Vec<u8>),
    DashboardCommand(Command),
    Ignored,
}

#[derive(Debug, Clone)]
pub struct InputRouter {
    bindings: KeyBindings,
    layout: Layout,
}

impl InputRouter {
    pub fn new(bindings: KeyBindings, layout: Layout) -> Self {
        Self { bindings, layout }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn dispatch(&self, key: &KeyEvent, mode: DashboardMode) -> Action {
        if let Some(cmd) = self.bindings.lookup(key)
            && !(self.layout == Layout::Split && cmd.is_mode_switch())
        {
            return Action::DashboardCommand(cmd);
        }

        if self.layout == Layout::Split || mode == DashboardMode::Terminal {
            return match encode_key(key) {
                Some(bytes) => Action::ForwardToTerminal(bytes),
                None => Action::Ignored,
            };
        }

        let plain = (key.modifiers - Modifiers::SHIFT).is_empty();
        let cmd = match key.code {
            KeyCode::Char('1') if plain => Command::ShowOverview,
            KeyCode::Char('2') if plain => Command::ShowTaskList,
            KeyCode::Char('3') if plain => Command::ShowTerminal,
            KeyCode::Char('q') if plain => Command::Quit,
            KeyCode::Up if plain => Command::TaskUp,
            KeyCode::Down if plain => Command::TaskDown,
            _ => return Action::Ignored,
        };
        Action::DashboardCommand(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code)
    }

    fn router() -> InputRouter {
        InputRouter::new(KeyBindings::default(), Layout::Modes)
    }

    #[test]
    fn up_arrow_forwards_csi_a_in_terminal_mode() {
        assert_eq!(
            router().dispatch(&key(KeyCode::Up), DashboardMode::Terminal),
            Action::ForwardToTerminal(b"\x1b[A".to_vec())
        );
    }

    #[test]
    fn reserved_keys_win_in_every_mode() {
        let r = router();
        for mode in DashboardMode::ALL {
            assert_eq!(
                r.dispatch(&KeyEvent::ctrl('q'), mode),
                Action::DashboardCommand(Command::Quit)
            );
            assert_eq!(
                r.dispatch(&key(KeyCode::F(2)), mode),
                Action::DashboardCommand(Command::ShowTaskList)
            );
        }
        assert_eq!(
            r.dispatch(
                &KeyEvent::with(KeyCode::Char('Q'), Modifiers::CTRL | Modifiers::SHIFT),
                DashboardMode::Terminal
            ),
            Action::DashboardCommand(Command::Quit)
        );
    }

    #[test]
    fn overview_navigation_keys() {
        let r = router();
        let m = DashboardMode::Overview;
        assert_eq!(
            r.dispatch(&key(KeyCode::Char('3')), m),
            Action::DashboardCommand(Command::ShowTerminal)
        );
        assert_eq!(
            r.dispatch(&key(KeyCode::Down), DashboardMode::TaskList),
            Action::DashboardCommand(Command::TaskDown)
        );
        assert_eq!(
            r.dispatch(&key(KeyCode::Char('q')), m),
            Action::DashboardCommand(Command::Quit)
        );
        assert_eq!(r.dispatch(&key(KeyCode::Char('x')), m), Action::Ignored);
        assert_eq!(r.dispatch(&KeyEvent::ctrl('c'), m), Action::Ignored);
    }

    #[test]
    fn terminal_mode_sends_q_to_the_shell() {
        assert_eq!(
            router().dispatch(&key(KeyCode::Char('q')), DashboardMode::Terminal),
            Action::ForwardToTerminal(b"q".to_vec())
        );
    }

    #[test]
    fn split_layout_forwards_mode_keys() {
        let r = InputRouter::new(KeyBindings::default(), Layout::Split);
        assert_eq!(
            r.dispatch(&key(KeyCode::F(1)), DashboardMode::Overview),
            Action::ForwardToTerminal(b"\x1bOP".to_vec())
        );
        assert_eq!(
            r.dispatch(&key(KeyCode::Char('1')), DashboardMode::Overview),
            Action::ForwardToTerminal(b"1".to_vec())
        );
        assert_eq!(
            r.dispatch(&KeyEvent::ctrl('r'), DashboardMode::Overview),
            Action::DashboardCommand(Command::RefreshNow)
        );
    }

    #[test]
    fn encodings() {
        let enc = |k: KeyEvent| encode_key(&k);
        assert_eq!(enc(key(KeyCode::Enter)), Some(b"\r".to_vec()));
        assert_eq!(enc(key(KeyCode::Backspace)), Some(vec![0x7f]));
        assert_eq!(enc(key(KeyCode::BackTab)), Some(b"\x1b[Z".to_vec()));
        assert_eq!(enc(key(KeyCode::Home)), Some(b"\x1b[H".to_vec()));
        assert_eq!(enc(key(KeyCode::End)), Some(b"\x1b[F".to_vec()));
        assert_eq!(enc(key(KeyCode::Delete)), Some(b"\x1b[3~".to_vec()));
        assert_eq!(enc(key(KeyCode::PageDown)), Some(b"\x1b[6~".to_vec()));
        assert_eq!(enc(key(KeyCode::F(5))), Some(b"\x1b[15~".to_vec()));
        assert_eq!(enc(key(KeyCode::F(12))), Some(b"\x1b[24~".to_vec()));
        assert_eq!(enc(key(KeyCode::F(13))), None);
        assert_eq!(enc(KeyEvent::ctrl('c')), Some(vec![0x03]));
        assert_eq!(
            enc(KeyEvent::with(KeyCode::Char('x'), Modifiers::ALT)),
            Some(b"\x1bx".to_vec())
        );
        assert_eq!(
            enc(KeyEvent::with(KeyCode::Right, Modifiers::CTRL)),
            Some(b"\x1b[1;5C".to_vec())
        );
        assert_eq!(enc(key(KeyCode::Char('é'))), Some("é".as_bytes().to_vec()));
        assert_eq!(enc(KeyEvent::ctrl('é')), None);
    }

    #[test]
    fn chord_parsing() {
        assert_eq!(parse_chord("ctrl+q").ok(), Some(KeyEvent::ctrl('q')));
        assert_eq!(
            parse_chord("Shift+PageUp").ok(),
            Some(KeyEvent::with(KeyCode::PageUp, Modifiers::SHIFT))
        );
        assert_eq!(parse_chord("f10").ok(), Some(key(KeyCode::F(10))));
        assert!(parse_chord("hyper+q").is_err());
        assert!(parse_chord("ctrl+").is_err());
        assert!(parse_chord("f99").is_err());
    }

    #[test]
    fn configured_bindings_replace_defaults() {
        let cfg = [BindingConfig {
            key: "ctrl+x".into(),
            command: Command::Quit,
        }];
        let bindings = KeyBindings::from_config(&cfg).expect("valid");
        let r = InputRouter::new(bindings, Layout::Modes);
        assert_eq!(
            r.dispatch(&KeyEvent::ctrl('x'), DashboardMode::Terminal),
            Action::DashboardCommand(Command::Quit)
        );
        assert_eq!(
            r.dispatch(&KeyEvent::ctrl('q'), DashboardMode::Terminal),
            Action::ForwardToTerminal(vec![0x11])
        );
    }

    #[test]
    fn shift_letter_binding_leaves_plain_letter_to_the_shell() {
        let cfg = [BindingConfig {
            key: "shift+q".into(),
            command: Command::Quit,
        }];
        let r = InputRouter::new(KeyBindings::from_config(&cfg).expect("valid"), Layout::Modes);
        assert_eq!(
            r.dispatch(&key(KeyCode::Char('q')), DashboardMode::Terminal),
            Action::ForwardToTerminal(b"q".to_vec())
        );
        assert_eq!(
            r.dispatch(
                &KeyEvent::with(KeyCode::Char('Q'), Modifiers::SHIFT),
                DashboardMode::Terminal
            ),
            Action::DashboardCommand(Command::Quit)
        );
        assert_eq!(
            r.dispatch(&key(KeyCode::Char('Q')), DashboardMode::Terminal),
            Action::DashboardCommand(Command::Quit)
        );
    }

    #[test]
    fn crossterm_release_is_dropped() {
        use crossterm::event::{KeyCode as Ct, KeyEvent as CtEvent, KeyEventKind, KeyModifiers};
        let mut ev = CtEvent::new(Ct::Char('a'), KeyModifiers::CONTROL);
        assert_eq!(from_crossterm(ev), Some(KeyEvent::ctrl('a')));
        ev.kind = KeyEventKind::Release;
        assert_eq!(from_crossterm(ev), None);
    }
}
