//! Frame composition: header, status panels, task panel, terminal panel,
//! footer. Drawn in that order every frame.

use std::time::SystemTime;

use time::OffsetDateTime;
use time::macros::format_description;
use unicode_width::UnicodeWidthStr;

use crate::app::DashboardContext;
use crate::config::Layout;
use crate::draw::{DrawTarget, Style, palette};
use crate::mode::DashboardMode;
use crate::status::{Outcome, StatusDomain, StatusPayload, TaskItem, format_age};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub col: u16,
    pub row: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(col: u16, row: u16, width: u16, height: u16) -> Self {
        Self { col, row, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Everything below the first row.
    pub fn below_title(&self) -> Rect {
        Rect::new(self.col, self.row + 1, self.width, self.height.saturating_sub(1))
    }

    fn split_cols(&self, parts: u16) -> Vec<Rect> {
        let parts = parts.max(1);
        let base = self.width / parts;
        (0..parts)
            .map(|i| {
                let width = if i + 1 == parts { self.width - base * i } else { base };
                Rect::new(self.col + base * i, self.row, width, self.height)
            })
            .collect()
    }
}

/// Where each panel goes this frame. Hidden panels are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLayout {
    pub header: Rect,
    pub service: Option<Rect>,
    pub resources: Option<Rect>,
    pub tasks: Option<Rect>,
    /// Includes the title row.
    pub terminal: Option<Rect>,
    pub footer: Rect,
}

const STATUS_HEIGHT: u16 = 5;
const SPLIT_STATUS_MAX: u16 = 7;

pub fn compute_layout(cols: u16, rows: u16, layout: Layout, mode: DashboardMode) -> FrameLayout {
    let header = Rect::new(0, 0, cols, rows.min(1));
    let footer = Rect::new(0, rows.saturating_sub(1), cols, u16::from(rows >= 2));
    let body = Rect::new(0, 1, cols, rows.saturating_sub(2));

    let mut frame = FrameLayout {
        header,
        footer,
        ..FrameLayout::default()
    };
    match layout {
        Layout::Split => {
            let top = SPLIT_STATUS_MAX.min(body.height / 2);
            let strip = Rect::new(0, body.row, cols, top);
            let cols3 = strip.split_cols(3);
            frame.service = Some(cols3[0]);
            frame.resources = Some(cols3[1]);
            frame.tasks = Some(cols3[2]);
            frame.terminal = Some(Rect::new(0, body.row + top, cols, body.height - top));
        }
        Layout::Modes => match mode {
            DashboardMode::Overview => {
                let top = STATUS_HEIGHT.min(body.height);
                let halves = Rect::new(0, body.row, cols, top).split_cols(2);
                frame.service = Some(halves[0]);
                frame.resources = Some(halves[1]);
                frame.tasks = Some(Rect::new(0, body.row + top, cols, body.height - top));
            }
            DashboardMode::TaskList => frame.tasks = Some(body),
            DashboardMode::Terminal => frame.terminal = Some(body),
        },
    }
    frame
}

/// Inner terminal size for `layout`, whether or not the panel is on screen,
/// so the shell keeps one size across mode switches.
pub fn terminal_size(cols: u16, rows: u16, layout: Layout) -> (u16, u16) {
    let rect = compute_layout(cols, rows, layout, DashboardMode::Terminal)
        .terminal
        .unwrap_or_default()
        .below_title();
    (rect.width.max(1), rect.height.max(1))
}

pub fn draw_frame(ctx: &DashboardContext, target: &mut dyn DrawTarget, wall: SystemTime) {
    let (cols, rows) = target.size();
    target.clear();
    let frame = compute_layout(cols, rows, ctx.layout, ctx.mode);

    draw_header(ctx, target, frame.header, wall);
    if let Some(rect) = frame.service {
        draw_service(ctx, target, rect);
    }
    if let Some(rect) = frame.resources {
        draw_resources(ctx, target, rect);
    }
    if let Some(rect) = frame.tasks {
        draw_tasks(ctx, target, rect);
    }
    if let Some(rect) = frame.terminal {
        draw_terminal(ctx, target, rect);
    } else {
        target.set_cursor(None);
    }
    draw_footer(ctx, target, frame.footer, wall);
}

fn fill_row(target: &mut dyn DrawTarget, rect: Rect, row: u16, style: Style) {
    let blank = " ".repeat(usize::from(rect.width));
    target.draw_text(rect.col, row, &blank, style);
}

/// Text clipped to the rect's width.
fn put(target: &mut dyn DrawTarget, rect: Rect, line: u16, col: u16, text: &str, style: Style) -> u16 {
    if line >= rect.height || col >= rect.width {
        return 0;
    }
    let room = usize::from(rect.width - col);
    let clipped = clip(text, room);
    target.draw_text(rect.col + col, rect.row + line, &clipped, style)
}

fn clip(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

fn panel_title(target: &mut dyn DrawTarget, rect: Rect, title: &str) {
    let style = Style::new().fg(palette::CYAN).bold();
    let line = format!("─ {title} ");
    let used = put(target, rect, 0, 0, &line, style);
    let rest = usize::from(rect.width.saturating_sub(used));
    put(target, rect, 0, used, &"─".repeat(rest), Style::new().fg(palette::GREY));
}

fn error_style() -> Style {
    Style::new().fg(palette::BRIGHT_RED)
}

fn waiting(target: &mut dyn DrawTarget, rect: Rect) {
    put(target, rect, 1, 1, "waiting for first update", Style::new().fg(palette::GREY));
}

/// Draw the "unavailable" line for an error snapshot. Returns true if drawn.
fn draw_error(ctx: &DashboardContext, target: &mut dyn DrawTarget, rect: Rect, domain: StatusDomain) -> bool {
    match ctx.board.get(domain).map(|s| &s.outcome) {
        Some(Outcome::Error(msg)) => {
            put(target, rect, 1, 1, &format!("unavailable: {msg}"), error_style());
            true
        }
        _ => false,
    }
}

// ── Header ──────────────────────────────────────────────────────────────

fn draw_header(ctx: &DashboardContext, target: &mut dyn DrawTarget, rect: Rect, wall: SystemTime) {
    if rect.is_empty() {
        return;
    }
    let base = Style::new().bg(palette::HEADER_BG).fg(palette::WHITE);
    fill_row(target, rect, rect.row, base);

    let (dot_color, blinking) = match ctx.board.get(StatusDomain::Service).map(|s| &s.outcome) {
        Some(Outcome::Ok(StatusPayload::Service(h))) if h.running => (palette::GREEN, true),
        Some(_) => (palette::RED, false),
        None => (palette::GREY, false),
    };
    let dot = if blinking && !ctx.panel.screen().cursor().blink_on { " " } else { "●" };
    let mut col = 1;
    col += put(target, rect, 0, col, dot, base.fg(dot_color));
    col += 1;
    col += put(target, rect, 0, col, &ctx.ui.title, base.bold());
    col += 2;

    if ctx.layout == Layout::Modes {
        for mode in DashboardMode::ALL {
            let tab = format!(" {} {} ", mode.key_hint(), mode.label());
            let style = if mode == ctx.mode { base.inverse().bold() } else { base.dim() };
            col += put(target, rect, 0, col, &tab, style);
            col += 1;
        }
    }

    let clock = clock_label(wall, ctx.utc_offset);
    let width = clock.width() as u16;
    if rect.width > width + 1 && rect.width - width - 1 >= col {
        put(target, rect, 0, rect.width - width - 1, &clock, base.bold());
    }
}

/// `HH:MM AM/PM` in the given offset.
pub fn clock_label(wall: SystemTime, offset: time::UtcOffset) -> String {
    OffsetDateTime::from(wall)
        .to_offset(offset)
        .format(format_description!("[hour repr:12]:[minute] [period]"))
        .unwrap_or_default()
}

// ── Status panels ───────────────────────────────────────────────────────

fn draw_service(ctx: &DashboardContext, target: &mut dyn DrawTarget, rect: Rect) {
    panel_title(target, rect, "Gateway");
    if draw_error(ctx, target, rect, StatusDomain::Service) {
        return;
    }
    let Some(health) = ctx.board.service() else {
        waiting(target, rect);
        return;
    };
    let (state, color) = if health.running {
        ("running", palette::GREEN)
    } else {
        ("stopped", palette::RED)
    };
    let col = 1 + put(target, rect, 1, 1, "State  ", Style::new());
    let col = col + put(target, rect, 1, col, state, Style::new().fg(color).bold());
    if let Some(pid) = health.pid {
        put(target, rect, 1, col, &format!(" (pid {pid})"), Style::new().fg(palette::GREY));
    }
    put(target, rect, 2, 1, &format!("Beat   {}", health.heartbeat.label()), Style::new());
    let model = health.model.as_deref().unwrap_or("-");
    put(target, rect, 3, 1, &format!("Model  {model}"), Style::new());
}

fn draw_resources(ctx: &DashboardContext, target: &mut dyn DrawTarget, rect: Rect) {
    panel_title(target, rect, "System");
    if draw_error(ctx, target, rect, StatusDomain::Resources) {
        return;
    }
    let Some(m) = ctx.board.resources() else {
        waiting(target, rect);
        return;
    };
    let cpu = m.cpu_percent.map_or_else(|| "--".to_string(), |c| format!("{c:.1}%"));
    put(target, rect, 1, 1, &format!("CPU    {cpu}"), Style::new());
    put(
        target,
        rect,
        2,
        1,
        &format!(
            "Mem    {}/{} MiB ({:.0}%)",
            m.mem_used_mib,
            m.mem_total_mib,
            m.mem_percent()
        ),
        Style::new(),
    );
    let col = 1 + put(target, rect, 3, 1, "Temp   ", Style::new());
    match m.temperature {
        Some(t) => {
            let style = if t > ctx.ui.hot_temperature {
                error_style().bold()
            } else {
                Style::new()
            };
            put(target, rect, 3, col, &format!("{t:.1}°C"), style);
        }
        None => {
            put(target, rect, 3, col, "--", Style::new());
        }
    }
}

// ── Tasks ───────────────────────────────────────────────────────────────

fn priority_marker(priority: u8) -> (&'static str, Style) {
    match priority {
        4 => ("!!!", Style::new().fg(palette::RED).bold()),
        3 => ("!! ", Style::new().fg(palette::YELLOW)),
        2 => ("!  ", Style::new().fg(palette::BLUE)),
        _ => ("   ", Style::new()),
    }
}

fn draw_tasks(ctx: &DashboardContext, target: &mut dyn DrawTarget, rect: Rect) {
    if rect.is_empty() {
        return;
    }
    let title = match ctx.board.tasks() {
        Some(list) => format!("Tasks {}/{}", list.items.len(), list.total),
        None => "Tasks".to_string(),
    };
    panel_title(target, rect, &title);
    if draw_error(ctx, target, rect, StatusDomain::Tasks) {
        return;
    }
    let Some(list) = ctx.board.tasks() else {
        waiting(target, rect);
        return;
    };
    if list.items.is_empty() {
        put(target, rect, 1, 1, "nothing due", Style::new().fg(palette::GREY));
        return;
    }

    let selecting = ctx.layout == Layout::Modes && ctx.mode == DashboardMode::TaskList;
    let visible = usize::from(rect.height.saturating_sub(1));
    // Keep the selected row on screen.
    let first = ctx.task_scroll.saturating_sub(visible.saturating_sub(1));
    for (line, (idx, task)) in list.items.iter().enumerate().skip(first).take(visible).enumerate() {
        let line = line as u16 + 1;
        draw_task_row(target, rect, line, task, selecting && idx == ctx.task_scroll);
    }
}

fn draw_task_row(target: &mut dyn DrawTarget, rect: Rect, line: u16, task: &TaskItem, selected: bool) {
    let (marker, marker_style) = priority_marker(task.priority);
    let text_style = if selected { Style::new().inverse() } else { Style::new() };
    let mut col = 1;
    col += put(target, rect, line, col, marker, marker_style);
    col += 1;
    col += put(target, rect, line, col, &task.content, text_style);
    if let Some(due) = &task.due {
        let (label, style) = if task.overdue {
            (format!("  {due} overdue"), error_style())
        } else {
            (format!("  {due}"), Style::new().fg(palette::GREY))
        };
        put(target, rect, line, col, &label, style);
    }
}

// ── Terminal ────────────────────────────────────────────────────────────

fn draw_terminal(ctx: &DashboardContext, target: &mut dyn DrawTarget, rect: Rect) {
    if rect.is_empty() {
        target.set_cursor(None);
        return;
    }
    let screen = ctx.panel.screen();
    let mut title = "Terminal".to_string();
    if !screen.title().is_empty() {
        title.push_str(": ");
        title.push_str(screen.title());
    }
    if screen.is_scrolled_back() {
        title.push_str(&format!(" [history -{}]", screen.view_offset()));
    }
    panel_title(target, rect, &title);

    let inner = rect.below_title();
    if let Some(msg) = ctx.panel.unavailable() {
        put(target, inner, 0, 0, msg, error_style().bold());
        target.set_cursor(None);
        return;
    }
    for r in 0..inner.height.min(screen.rows()) {
        if let Some(view) = screen.view_row(r) {
            let cells = view.cells();
            let n = cells.len().min(usize::from(inner.width));
            target.draw_cells(inner.col, inner.row + r, &cells[..n]);
        }
    }
    let cursor = screen
        .cursor_visible_now()
        .filter(|&(r, c)| r < inner.height && c < inner.width)
        .map(|(r, c)| (inner.col + c, inner.row + r));
    target.set_cursor(cursor);
}

// ── Footer ──────────────────────────────────────────────────────────────

fn draw_footer(ctx: &DashboardContext, target: &mut dyn DrawTarget, rect: Rect, wall: SystemTime) {
    if rect.is_empty() {
        return;
    }
    let base = Style::new().bg(palette::HEADER_BG).fg(palette::GREY);
    fill_row(target, rect, rect.row, base);

    let hints = match (ctx.layout, ctx.mode) {
        (Layout::Split, _) => "^R refresh  S-PgUp/PgDn history  ^Q quit",
        (Layout::Modes, DashboardMode::Terminal) => "F1/F2 views  S-PgUp/PgDn history  ^R refresh  ^Q quit",
        (Layout::Modes, DashboardMode::TaskList) => "1-3 views  Up/Down scroll  ^R refresh  q quit",
        (Layout::Modes, DashboardMode::Overview) => "1-3 views  ^R refresh  q quit",
    };
    let used = put(target, rect, 0, 1, hints, base);

    let ages = StatusDomain::ALL
        .iter()
        .map(|&d| {
            let age = ctx
                .board
                .get(d)
                .map_or_else(|| "--".to_string(), |s| format_age(s.age(wall)));
            format!("{} {age}", short_name(d))
        })
        .collect::<Vec<_>>()
        .join(" · ");
    let label = format!("updated {ages}");
    let width = label.width() as u16;
    if rect.width > width + 1 && rect.width - width - 1 > used + 2 {
        put(target, rect, 0, rect.width - width - 1, &label, base);
    }
}

fn short_name(domain: StatusDomain) -> &'static str {
    match domain {
        StatusDomain::Service => "svc",
        StatusDomain::Resources => "res",
        StatusDomain::Tasks => "tasks",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_overview_layout() {
        let f = compute_layout(80, 24, Layout::Modes, DashboardMode::Overview);
        assert_eq!(f.header, Rect::new(0, 0, 80, 1));
        assert_eq!(f.footer, Rect::new(0, 23, 80, 1));
        assert_eq!(f.service, Some(Rect::new(0, 1, 40, 5)));
        assert_eq!(f.resources, Some(Rect::new(40, 1, 40, 5)));
        assert_eq!(f.tasks, Some(Rect::new(0, 6, 80, 17)));
        assert_eq!(f.terminal, None);
    }

    #[test]
    fn terminal_mode_uses_whole_body() {
        let f = compute_layout(80, 24, Layout::Modes, DashboardMode::Terminal);
        assert_eq!(f.terminal, Some(Rect::new(0, 1, 80, 22)));
        assert_eq!(terminal_size(80, 24, Layout::Modes), (80, 21));
    }

    #[test]
    fn split_layout_shows_everything() {
        let f = compute_layout(90, 30, Layout::Split, DashboardMode::Overview);
        assert_eq!(f.service, Some(Rect::new(0, 1, 30, 7)));
        assert_eq!(f.tasks, Some(Rect::new(60, 1, 30, 7)));
        assert_eq!(f.terminal, Some(Rect::new(0, 8, 90, 21)));
        assert_eq!(terminal_size(90, 30, Layout::Split), (90, 20));
    }

    #[test]
    fn tiny_surface_does_not_underflow() {
        for (c, r) in [(0, 0), (1, 1), (2, 2), (5, 3)] {
            for mode in DashboardMode::ALL {
                let _ = compute_layout(c, r, Layout::Modes, mode);
            }
            let _ = compute_layout(c, r, Layout::Split, DashboardMode::Overview);
            let (w, h) = terminal_size(c, r, Layout::Split);
            assert!(w >= 1 && h >= 1);
        }
    }

    #[test]
    fn clock_is_twelve_hour() {
        let wall = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(13 * 3600 + 5 * 60);
        assert_eq!(clock_label(wall, time::UtcOffset::UTC), "01:05 PM");
    }

    #[test]
    fn clip_respects_wide_chars() {
        assert_eq!(clip("中文字", 5), "中文");
        assert_eq!(clip("abc", 5), "abc");
    }
}
