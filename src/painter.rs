//! Painter glue (C8): turns one `EngineView` into a `ratatui` frame. Layout
//! is three vertical regions: process list, output pane, help row.

use crate::keymap::{KeyCode, KeyEvent, Modifiers};
use crate::proc::{Proc, State};
use crate::ui::{Action, Focus, Keymap, UiState};
use crate::vterm::color::{Attrs, Color as VColor};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color as RColor, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Frame;

/// Draws one frame of `procs`/`ui` state. Called from the run loop only
/// after the render scheduler wakes, so every call here corresponds to a
/// coalesced batch of upstream damage (§4.5).
pub fn draw(frame: &mut Frame, procs: &[Proc], ui: &UiState, keymap_procs: &Keymap, keymap_term: &Keymap) {
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(24), Constraint::Min(10)])
        .split(chunks[0]);

    draw_proc_list(frame, body[0], procs, ui);
    draw_output_pane(frame, body[1], procs, ui);
    let active_keymap = match ui.focus {
        Focus::Procs => keymap_procs,
        Focus::Term => keymap_term,
    };
    draw_help_row(frame, chunks[1], ui, active_keymap);
}

fn badge_for(proc: &Proc) -> (&'static str, Style) {
    match proc.state() {
        State::Running => ("UP", Style::default().fg(RColor::Green)),
        State::Stopping => ("..", Style::default().fg(RColor::Yellow)),
        State::Stopped => ("DOWN", Style::default().fg(RColor::Red).add_modifier(Modifier::DIM)),
    }
}

fn draw_proc_list(frame: &mut Frame, area: Rect, procs: &[Proc], ui: &UiState) {
    let items: Vec<ListItem> = procs
        .iter()
        .enumerate()
        .map(|(i, proc)| {
            let (badge, badge_style) = badge_for(proc);
            let mut spans = vec![
                Span::styled(format!("{badge:>4} "), badge_style),
                Span::raw(proc.name.clone()),
            ];
            if proc.state() == State::Stopped {
                if let Some(status) = proc.exit_status() {
                    spans.push(Span::styled(
                        format!(" ({})", exit_code_display(status)),
                        Style::default().add_modifier(Modifier::DIM),
                    ));
                }
            }
            let mut style = Style::default();
            if i == ui.selected {
                style = style.add_modifier(Modifier::REVERSED);
            }
            ListItem::new(Line::from(spans)).style(style)
        })
        .collect();

    let border_style = if ui.focus == Focus::Procs {
        Style::default().fg(RColor::Cyan)
    } else {
        Style::default()
    };
    let list = List::new(items).block(
        Block::default()
            .title("procs")
            .borders(Borders::ALL)
            .border_style(border_style),
    );
    frame.render_widget(list, area);
}

#[cfg(unix)]
fn exit_code_display(status: std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => format!("exit {code}"),
        None => match status.signal() {
            Some(sig) => format!("signal {sig}"),
            None => "exited".to_string(),
        },
    }
}

#[cfg(not(unix))]
fn exit_code_display(status: std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit {code}"),
        None => "exited".to_string(),
    }
}

fn draw_output_pane(frame: &mut Frame, area: Rect, procs: &[Proc], ui: &UiState) {
    let border_style = if ui.focus == Focus::Term {
        Style::default().fg(RColor::Cyan)
    } else {
        Style::default()
    };
    let Some(proc) = procs.get(ui.selected) else {
        frame.render_widget(
            Block::default().title("output").borders(Borders::ALL).border_style(border_style),
            area,
        );
        return;
    };

    let inner = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    };
    frame.render_widget(
        Block::default()
            .title(proc.name.clone())
            .borders(Borders::ALL)
            .border_style(border_style),
        area,
    );

    if let Some(vterm) = proc.vterm() {
        draw_grid(frame, inner, vterm, ui.scroll_offset);
    } else if let Some(simple) = proc.simple() {
        let lines: Vec<Line> = simple
            .tail(inner.height as usize, ui.scroll_offset)
            .into_iter()
            .map(|l| Line::from(l.to_string()))
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);
    }
}

/// Paints the live grid, or, when `scroll_offset > 0`, a window into the
/// combined scrollback+grid history ending that many lines back from the
/// live bottom (§3's scrollback, §4.6's `ScrollUp`/`ScrollDown`). The
/// cursor is only shown at the live position (`scroll_offset == 0`).
fn draw_grid(frame: &mut Frame, area: Rect, vterm: &crate::proc::vterm_kind::VtermKind, scroll_offset: usize) {
    let term = &vterm.term;
    let height = area.height as usize;
    let cols = term.cols().min(area.width as usize);
    let total = term.total_lines();
    let offset = scroll_offset.min(total.saturating_sub(height));
    let start = total.saturating_sub(height + offset);
    let visible = height.min(total.saturating_sub(start));
    let buf = frame.buffer_mut();

    for display_row in 0..visible {
        let Some(row_cells) = term.history_row(start + display_row) else { continue };
        for (col, cell) in row_cells.iter().enumerate().take(cols) {
            if cell.width == 0 {
                // Trailing half of a wide glyph; already painted by its leader.
                continue;
            }
            let x = area.x + col as u16;
            let y = area.y + display_row as u16;
            if x >= area.x + area.width || y >= area.y + area.height {
                continue;
            }
            let style = style_from_attrs(&cell.attrs);
            buf.set_string(x, y, cell.ch.to_string(), style);
        }
    }

    if scroll_offset == 0 {
        let cursor = term.cursor();
        if cursor.visible && cursor.row < area.height as usize && cursor.col < area.width as usize {
            frame.set_cursor_position((area.x + cursor.col as u16, area.y + cursor.row as u16));
        }
    }
}

fn style_from_attrs(attrs: &Attrs) -> Style {
    let mut style = Style::default();
    style = style.fg(to_ratatui_color(attrs.fg));
    style = style.bg(to_ratatui_color(attrs.bg));
    if attrs.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if attrs.dim {
        style = style.add_modifier(Modifier::DIM);
    }
    if attrs.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if attrs.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if attrs.blink {
        style = style.add_modifier(Modifier::SLOW_BLINK);
    }
    if attrs.inverse {
        style = style.add_modifier(Modifier::REVERSED);
    }
    if attrs.hidden {
        style = style.add_modifier(Modifier::HIDDEN);
    }
    if attrs.strikethrough {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    style
}

fn to_ratatui_color(color: VColor) -> RColor {
    match color {
        VColor::Default => RColor::Reset,
        VColor::Indexed(i) => RColor::Indexed(i),
        VColor::Rgb(r, g, b) => RColor::Rgb(r, g, b),
    }
}

fn key_label(ev: KeyEvent) -> String {
    let base = match ev.code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Escape => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => "S-Tab".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Del".to_string(),
        KeyCode::Insert => "Ins".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PgUp".to_string(),
        KeyCode::PageDown => "PgDn".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        KeyCode::Null => "Null".to_string(),
    };
    let Modifiers { ctrl, shift, alt } = ev.mods;
    let mut prefix = String::new();
    if ctrl {
        prefix.push_str("C-");
    }
    if alt {
        prefix.push_str("M-");
    }
    if shift && !matches!(ev.code, KeyCode::Char(_)) {
        prefix.push_str("S-");
    }
    format!("{prefix}{base}")
}

fn action_label(action: Action) -> &'static str {
    match action {
        Action::Quit => "quit",
        Action::SelectNext => "next",
        Action::SelectPrev => "prev",
        Action::SelectIndex(_) => "jump",
        Action::KillProc => "stop",
        Action::StartProc => "start",
        Action::RestartProc => "restart",
        Action::ForceRestartProc => "force restart",
        Action::FocusTerm => "focus term",
        Action::FocusProcs => "focus procs",
        Action::ScrollUp(_) => "scroll up",
        Action::ScrollDown(_) => "scroll down",
    }
}

/// Built straight from the active keymap's bindings (§4.6 supplement), so
/// the footer can never drift from what a keypress actually does.
fn draw_help_row(frame: &mut Frame, area: Rect, _ui: &UiState, keymap: &Keymap) {
    let mut seen_actions = std::collections::HashSet::new();
    let mut parts = Vec::new();
    for (ev, action) in keymap.describe() {
        if matches!(action, Action::SelectIndex(n) if n != 0) {
            continue;
        }
        if !seen_actions.insert(action_label(action)) {
            continue;
        }
        let label = if matches!(action, Action::SelectIndex(_)) { "1-9 jump".to_string() } else { action_label(action).to_string() };
        parts.push(format!("{} {}", key_label(ev), label));
    }
    let text = parts.join("  ");
    frame.render_widget(Paragraph::new(text).style(Style::default().add_modifier(Modifier::DIM)), area);
}
