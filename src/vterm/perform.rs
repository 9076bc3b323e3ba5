//! `vte::Perform` wiring: turns parsed control sequences into `Grid`
//! mutations. Unknown sequences fall through to `trace!` and are otherwise
//! ignored, matching the "never raises ParseError" policy.

use super::color::Color;
use super::grid::{Grid, MouseReporting};
use vte::{Params, Perform};

/// Flatten a `vte::Params` iterator into a stack buffer, avoiding a heap
/// allocation on the hot SGR/CSI path. 32 is far beyond any sequence emitted
/// by real terminal programs.
fn flatten_params(params: &Params) -> ([u16; 32], usize) {
    let mut buf = [0u16; 32];
    let mut n = 0;
    for group in params.iter() {
        if let Some(&first) = group.first() {
            if n < buf.len() {
                buf[n] = first;
                n += 1;
            }
        }
    }
    (buf, n)
}

fn param(buf: &[u16], idx: usize, default: u16) -> u16 {
    match buf.get(idx) {
        Some(&0) | None => default,
        Some(&v) => v,
    }
}

impl Perform for Grid {
    fn print(&mut self, c: char) {
        self.put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x08 => self.backspace(),          // BS
            0x09 => self.tab(),                // HT
            0x0a | 0x0b | 0x0c => self.line_feed(), // LF/VT/FF
            0x0d => self.carriage_return(),    // CR
            0x07 => {}                          // BEL — no audible bell to ring
            _ => tracing::trace!(byte, "vterm: unhandled C0 control"),
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let (buf, n) = flatten_params(params);
        let p = |i: usize| param(&buf[..n], i, 0) as usize;
        let p1 = |i: usize| param(&buf[..n], i, 1) as usize;

        if intermediates.first() == Some(&b'?') {
            self.dec_private_mode(&buf[..n], action);
            return;
        }

        match action {
            'A' => self.move_cursor_relative(-(p1(0) as i32), 0),
            'B' | 'e' => self.move_cursor_relative(p1(0) as i32, 0),
            'C' | 'a' => self.move_cursor_relative(0, p1(0) as i32),
            'D' => self.move_cursor_relative(0, -(p1(0) as i32)),
            'E' => {
                self.move_cursor_relative(p1(0) as i32, 0);
                self.carriage_return();
            }
            'F' => {
                self.move_cursor_relative(-(p1(0) as i32), 0);
                self.carriage_return();
            }
            'G' | '`' => {
                let row = self.cursor.row;
                self.move_cursor(row, p1(0).saturating_sub(1));
            }
            'd' => self.move_cursor(p1(0).saturating_sub(1), self.cursor.col),
            'H' | 'f' => self.move_cursor(p1(0).saturating_sub(1), p1(1).saturating_sub(1)),
            'J' => self.erase_in_display(p(0) as u16),
            'K' => self.erase_in_line(p(0) as u16),
            'X' => self.erase_chars(p1(0)),
            'L' => self.insert_lines(p1(0)),
            'M' => self.delete_lines(p1(0)),
            'P' => self.delete_chars(p1(0)),
            '@' => self.insert_blank_chars(p1(0)),
            'S' => self.scroll_up(p1(0)),
            'T' => self.scroll_down(p1(0)),
            'g' => match p(0) {
                0 => self.clear_tab_stop(false),
                3 => self.clear_tab_stop(true),
                _ => {}
            },
            'm' => self.handle_sgr(&buf[..n]),
            'r' => {
                let top = p1(0).saturating_sub(1);
                let bottom = if n > 1 { p1(1).saturating_sub(1) } else { self.rows() - 1 };
                self.set_scroll_region(top, bottom);
            }
            's' => self.save_cursor(),
            'u' => self.restore_cursor(),
            'n' => {
                if p(0) == 6 {
                    let report = format!("\x1b[{};{}R", self.cursor.row + 1, self.cursor.col + 1);
                    self.push_writeback(report.as_bytes());
                }
            }
            'c' => {
                if p(0) == 0 {
                    self.push_writeback(b"\x1b[?6c");
                }
            }
            't' => {} // window manipulation: ignored, matches spec "not a GUI terminal"
            _ => tracing::trace!(action, "vterm: unhandled CSI"),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        match (intermediates.first(), byte) {
            (None, b'7') => self.save_cursor(),
            (None, b'8') => self.restore_cursor(),
            (None, b'M') => self.reverse_index(),
            (None, b'D') => self.line_feed(),
            (None, b'E') => self.next_line(),
            (None, b'c') => self.reset(),
            (None, b'H') => self.set_tab_stop(),
            _ => tracing::trace!(byte, "vterm: unhandled ESC"),
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some(&cmd) = params.first() else { return };
        let cmd = std::str::from_utf8(cmd).unwrap_or("").parse::<u32>().unwrap_or(u32::MAX);
        match cmd {
            0 | 2 => {
                if let Some(text) = params.get(1).and_then(|b| std::str::from_utf8(b).ok()) {
                    self.title = text.to_string();
                    if cmd == 0 {
                        self.icon_name = text.to_string();
                    }
                    self.mark_prop_changed();
                }
            }
            1 => {
                if let Some(text) = params.get(1).and_then(|b| std::str::from_utf8(b).ok()) {
                    self.icon_name = text.to_string();
                    self.mark_prop_changed();
                }
            }
            _ => tracing::trace!(cmd, "vterm: unhandled OSC"),
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}
    fn put(&mut self, _byte: u8) {}
    fn unhook(&mut self) {}
}

impl Grid {
    fn push_writeback(&mut self, bytes: &[u8]) {
        self.writeback.extend_from_slice(bytes);
    }

    fn dec_private_mode(&mut self, buf: &[u16], action: char) {
        let set = action == 'h';
        for &code in buf {
            match code {
                1049 | 47 | 1047 => {
                    if set {
                        self.enter_alternate_screen();
                    } else {
                        self.exit_alternate_screen();
                    }
                    self.mark_prop_changed();
                }
                25 => {
                    self.cursor.visible = set;
                    self.mark_prop_changed();
                }
                7 => self.auto_wrap = set,
                6 => {
                    self.origin_mode = set;
                    self.move_cursor(0, 0);
                }
                2004 => {
                    self.bracketed_paste = set;
                    self.mark_prop_changed();
                }
                9 => {
                    self.mouse_reporting = if set { MouseReporting::X10 } else { MouseReporting::None };
                    self.mark_prop_changed();
                }
                1000 => {
                    self.mouse_reporting = if set { MouseReporting::Normal } else { MouseReporting::None };
                    self.mark_prop_changed();
                }
                1002 => {
                    self.mouse_reporting = if set { MouseReporting::ButtonEvent } else { MouseReporting::None };
                    self.mark_prop_changed();
                }
                1003 => {
                    self.mouse_reporting = if set { MouseReporting::AnyEvent } else { MouseReporting::None };
                    self.mark_prop_changed();
                }
                1006 => {} // SGR mouse encoding: encoding detail, not a distinct reporting mode here
                _ => tracing::trace!(code, set, "vterm: unhandled DEC private mode"),
            }
        }
    }

    fn handle_sgr(&mut self, buf: &[u16]) {
        if buf.is_empty() {
            self.attrs_mut().reset();
            return;
        }
        let mut i = 0;
        while i < buf.len() {
            let code = buf[i];
            match code {
                0 => self.attrs_mut().reset(),
                1 => self.attrs_mut().bold = true,
                2 => self.attrs_mut().dim = true,
                3 => self.attrs_mut().italic = true,
                4 => self.attrs_mut().underline = true,
                5 | 6 => self.attrs_mut().blink = true,
                7 => self.attrs_mut().inverse = true,
                8 => self.attrs_mut().hidden = true,
                9 => self.attrs_mut().strikethrough = true,
                22 => {
                    self.attrs_mut().bold = false;
                    self.attrs_mut().dim = false;
                }
                23 => self.attrs_mut().italic = false,
                24 => self.attrs_mut().underline = false,
                25 => self.attrs_mut().blink = false,
                27 => self.attrs_mut().inverse = false,
                28 => self.attrs_mut().hidden = false,
                29 => self.attrs_mut().strikethrough = false,
                30..=37 => self.attrs_mut().fg = Color::Indexed((code - 30) as u8),
                38 => i += self.parse_extended_color(&buf[i + 1..], true),
                39 => self.attrs_mut().fg = Color::Default,
                40..=47 => self.attrs_mut().bg = Color::Indexed((code - 40) as u8),
                48 => i += self.parse_extended_color(&buf[i + 1..], false),
                49 => self.attrs_mut().bg = Color::Default,
                90..=97 => self.attrs_mut().fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => self.attrs_mut().bg = Color::Indexed((code - 100 + 8) as u8),
                _ => tracing::trace!(code, "vterm: unhandled SGR"),
            }
            i += 1;
        }
    }

    /// Parses `38;5;n` / `38;2;r;g;b` (and the `48;...` bg equivalents)
    /// starting just after the `38`/`48` code. Returns how many extra params
    /// were consumed so the caller's index can skip past them.
    fn parse_extended_color(&mut self, rest: &[u16], is_fg: bool) -> usize {
        match rest.first() {
            Some(&5) => {
                if let Some(&idx) = rest.get(1) {
                    let color = Color::Indexed(idx as u8);
                    if is_fg {
                        self.attrs_mut().fg = color;
                    } else {
                        self.attrs_mut().bg = color;
                    }
                    return 2;
                }
                1
            }
            Some(&2) => {
                if let (Some(&r), Some(&g), Some(&b)) = (rest.get(1), rest.get(2), rest.get(3)) {
                    let color = Color::Rgb(r as u8, g as u8, b as u8);
                    if is_fg {
                        self.attrs_mut().fg = color;
                    } else {
                        self.attrs_mut().bg = color;
                    }
                    return 4;
                }
                1
            }
            _ => 0,
        }
    }
}
