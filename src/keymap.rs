//! Key/event codec (C4): the abstract `KeyEvent` model, encoding to the byte
//! sequences a vterm- or pipe-backed child expects, and the inverse parser
//! that recovers events from a raw byte stream.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Backspace,
    Enter,
    Tab,
    BackTab,
    Escape,
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
    Null,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { ctrl: false, shift: false, alt: false };
    pub const CTRL: Modifiers = Modifiers { ctrl: true, shift: false, alt: false };
    pub const ALT: Modifiers = Modifiers { ctrl: false, shift: false, alt: true };
    pub const SHIFT: Modifiers = Modifiers { ctrl: false, shift: true, alt: false };

    fn is_none(&self) -> bool {
        !self.ctrl && !self.shift && !self.alt
    }

    /// xterm modifier parameter: 1 + (shift?1) + (alt?2) + (ctrl?4).
    fn xterm_param(&self) -> u8 {
        1 + (self.shift as u8) + (self.alt as u8 * 2) + (self.ctrl as u8 * 4)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: Modifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode, mods: Modifiers) -> Self {
        KeyEvent { code, mods }
    }

    pub fn plain(code: KeyCode) -> Self {
        KeyEvent { code, mods: Modifiers::NONE }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseEventKind {
    Down,
    Up,
    Drag,
    Moved,
    ScrollUp,
    ScrollDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    pub col: u16,
    pub row: u16,
    pub kind: MouseEventKind,
    pub mods: Modifiers,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
}

/// Encode a key for a PTY-backed ("vterm") child: the canonical xterm
/// sequences, with a CSI modifier parameter appended whenever a modifier is
/// set on a named key.
pub fn encode_vterm(ev: KeyEvent) -> Vec<u8> {
    use KeyCode::*;

    let named = |letter: char| -> Vec<u8> {
        if ev.mods.is_none() {
            format!("\x1b[{letter}").into_bytes()
        } else {
            format!("\x1b[1;{}{letter}", ev.mods.xterm_param()).into_bytes()
        }
    };
    let tilde = |code: u8| -> Vec<u8> {
        if ev.mods.is_none() {
            format!("\x1b[{code}~").into_bytes()
        } else {
            format!("\x1b[{code};{}~", ev.mods.xterm_param()).into_bytes()
        }
    };

    match ev.code {
        Up => named('A'),
        Down => named('B'),
        Right => named('C'),
        Left => named('D'),
        Home => named('H'),
        End => named('F'),
        PageUp => tilde(5),
        PageDown => tilde(6),
        Insert => tilde(2),
        Delete => tilde(3),
        BackTab => b"\x1b[Z".to_vec(),
        Enter => b"\r".to_vec(),
        Tab => b"\t".to_vec(),
        Backspace => b"\x7f".to_vec(),
        Escape => b"\x1b".to_vec(),
        Null => vec![0],
        F(n) if (1..=4).contains(&n) && ev.mods.is_none() => {
            let letter = (b'P' + (n - 1)) as char;
            format!("\x1bO{letter}").into_bytes()
        }
        F(n) => {
            let code = match n {
                1 => 11,
                2 => 12,
                3 => 13,
                4 => 14,
                5 => 15,
                6 => 17,
                7 => 18,
                8 => 19,
                9 => 20,
                10 => 21,
                11 => 23,
                12 => 24,
                _ => return Vec::new(),
            };
            tilde(code)
        }
        Char(c) => encode_char(c, ev.mods),
    }
}

fn encode_char(c: char, mods: Modifiers) -> Vec<u8> {
    if mods.ctrl && c.is_ascii_alphabetic() {
        let mut bytes = vec![(c.to_ascii_uppercase() as u8) & 0x1f];
        if mods.alt {
            bytes.insert(0, 0x1b);
        }
        return bytes;
    }
    let mut bytes = Vec::new();
    if mods.alt {
        bytes.push(0x1b);
    }
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    bytes
}

/// Encode a key for a pipe-backed ("simple") child: only `Char`, `Enter`,
/// `Tab`, `Backspace`, `Escape` are ever delivered.
pub fn encode_simple(ev: KeyEvent) -> Option<Vec<u8>> {
    use KeyCode::*;
    match ev.code {
        Char(c) => Some(encode_char(c, ev.mods)),
        Enter => Some(b"\n".to_vec()),
        Tab => Some(b"\t".to_vec()),
        Backspace => Some(b"\x7f".to_vec()),
        Escape => Some(b"\x1b".to_vec()),
        _ => None,
    }
}

fn modifiers_from_param(param: u8) -> Modifiers {
    if param == 0 {
        return Modifiers::NONE;
    }
    let bits = param.saturating_sub(1);
    Modifiers {
        shift: bits & 1 != 0,
        alt: bits & 2 != 0,
        ctrl: bits & 4 != 0,
    }
}

/// Parse one input event from the front of `bytes`, returning the event and
/// how many bytes it consumed. Unrecognised sequences return `None` (no
/// event), consuming nothing so the caller can resynchronise byte-by-byte.
pub fn parse_one(bytes: &[u8]) -> Option<(InputEvent, usize)> {
    if bytes.is_empty() {
        return None;
    }

    if bytes[0] == 0x1b {
        if bytes.len() == 1 {
            return Some((InputEvent::Key(KeyEvent::plain(KeyCode::Escape)), 1));
        }
        if bytes[1] == b'[' {
            return parse_csi(bytes);
        }
        if bytes[1] == b'O' && bytes.len() >= 3 {
            let code = match bytes[2] {
                b'P' => Some(KeyCode::F(1)),
                b'Q' => Some(KeyCode::F(2)),
                b'R' => Some(KeyCode::F(3)),
                b'S' => Some(KeyCode::F(4)),
                _ => None,
            };
            return code.map(|c| (InputEvent::Key(KeyEvent::plain(c)), 3));
        }
        return Some((InputEvent::Key(KeyEvent::plain(KeyCode::Escape)), 1));
    }

    match bytes[0] {
        b'\r' => Some((InputEvent::Key(KeyEvent::plain(KeyCode::Enter)), 1)),
        b'\t' => Some((InputEvent::Key(KeyEvent::plain(KeyCode::Tab)), 1)),
        0x7f => Some((InputEvent::Key(KeyEvent::plain(KeyCode::Backspace)), 1)),
        0x00 => Some((InputEvent::Key(KeyEvent::plain(KeyCode::Null)), 1)),
        b if b < 0x20 => {
            let letter = (b | 0x40) as char;
            Some((InputEvent::Key(KeyEvent::new(KeyCode::Char(letter.to_ascii_lowercase()), Modifiers::CTRL)), 1))
        }
        _ => {
            let s = std::str::from_utf8(bytes).ok()?;
            let c = s.chars().next()?;
            Some((InputEvent::Key(KeyEvent::plain(KeyCode::Char(c))), c.len_utf8()))
        }
    }
}

fn parse_csi(bytes: &[u8]) -> Option<(InputEvent, usize)> {
    if bytes.get(2) == Some(&b'<') {
        return parse_sgr_mouse(bytes);
    }

    // Collect the numeric/`;`-separated parameter block, then the final letter.
    let mut i = 2;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b';') {
        i += 1;
    }
    let final_byte = *bytes.get(i)?;
    let params: Vec<u8> = bytes[2..i]
        .split(|&b| b == b';')
        .map(|p| std::str::from_utf8(p).ok().and_then(|s| s.parse().ok()).unwrap_or(0))
        .collect();
    let consumed = i + 1;

    let mods = modifiers_from_param(*params.get(1).unwrap_or(&0));

    let named = |code: KeyCode| Some((InputEvent::Key(KeyEvent::new(code, mods)), consumed));

    match final_byte {
        b'A' => named(KeyCode::Up),
        b'B' => named(KeyCode::Down),
        b'C' => named(KeyCode::Right),
        b'D' => named(KeyCode::Left),
        b'H' => named(KeyCode::Home),
        b'F' => named(KeyCode::End),
        b'Z' => named(KeyCode::BackTab),
        b'~' => {
            let code = match params.first().copied().unwrap_or(0) {
                2 => KeyCode::Insert,
                3 => KeyCode::Delete,
                5 => KeyCode::PageUp,
                6 => KeyCode::PageDown,
                11 => KeyCode::F(1),
                12 => KeyCode::F(2),
                13 => KeyCode::F(3),
                14 => KeyCode::F(4),
                15 => KeyCode::F(5),
                17 => KeyCode::F(6),
                18 => KeyCode::F(7),
                19 => KeyCode::F(8),
                20 => KeyCode::F(9),
                21 => KeyCode::F(10),
                23 => KeyCode::F(11),
                24 => KeyCode::F(12),
                _ => return None,
            };
            named(code)
        }
        _ => None,
    }
}

/// SGR mouse: `ESC [ < Cb ; Cx ; Cy M`/`m`.
fn parse_sgr_mouse(bytes: &[u8]) -> Option<(InputEvent, usize)> {
    let mut i = 3;
    let end = bytes[i..].iter().position(|&b| b == b'M' || b == b'm')? + i;
    let body = std::str::from_utf8(&bytes[i..end]).ok()?;
    let mut parts = body.split(';');
    let cb: u8 = parts.next()?.parse().ok()?;
    let cx: u16 = parts.next()?.parse().ok()?;
    let cy: u16 = parts.next()?.parse().ok()?;
    let is_release = bytes[end] == b'm';
    i = end + 1;

    let mods = Modifiers {
        shift: cb & 0x04 != 0,
        alt: cb & 0x08 != 0,
        ctrl: cb & 0x10 != 0,
    };
    let kind = if cb & 0x40 != 0 {
        if cb & 0x01 != 0 { MouseEventKind::ScrollDown } else { MouseEventKind::ScrollUp }
    } else if cb & 0x20 != 0 {
        MouseEventKind::Drag
    } else if is_release {
        MouseEventKind::Up
    } else {
        MouseEventKind::Down
    };

    Some((
        InputEvent::Mouse(MouseEvent { col: cx.saturating_sub(1), row: cy.saturating_sub(1), kind, mods }),
        i,
    ))
}

/// Parse a human-written key spec such as `"C-c"`, `"Enter"`, `"x"`, used by
/// the `send-keys` stop mode in the config collaborator.
pub fn parse_key_spec(spec: &str) -> Option<KeyEvent> {
    let mut mods = Modifiers::NONE;
    let mut rest = spec;
    loop {
        if let Some(stripped) = rest.strip_prefix("C-") {
            mods.ctrl = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("A-") {
            mods.alt = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("S-") {
            mods.shift = true;
            rest = stripped;
        } else {
            break;
        }
    }

    let code = match rest {
        "Enter" | "Return" => KeyCode::Enter,
        "Tab" => KeyCode::Tab,
        "BackTab" => KeyCode::BackTab,
        "Escape" | "Esc" => KeyCode::Escape,
        "Backspace" => KeyCode::Backspace,
        "Delete" | "Del" => KeyCode::Delete,
        "Insert" => KeyCode::Insert,
        "Home" => KeyCode::Home,
        "End" => KeyCode::End,
        "PageUp" => KeyCode::PageUp,
        "PageDown" => KeyCode::PageDown,
        "Up" => KeyCode::Up,
        "Down" => KeyCode::Down,
        "Left" => KeyCode::Left,
        "Right" => KeyCode::Right,
        other if other.len() == 1 => KeyCode::Char(other.chars().next()?),
        other if other.starts_with('F') && other[1..].parse::<u8>().is_ok() => {
            KeyCode::F(other[1..].parse().ok()?)
        }
        _ => return None,
    };
    Some(KeyEvent::new(code, mods))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Round-trips a named key under every modifier combination the CSI
    /// parameter encoding supports (`1 + shift + 2*alt + 4*ctrl`), one case
    /// per combination rather than looping inside a single test so a
    /// failing combination is reported by name.
    #[rstest]
    #[case(Modifiers::NONE)]
    #[case(Modifiers::SHIFT)]
    #[case(Modifiers::ALT)]
    #[case(Modifiers::CTRL)]
    #[case(Modifiers { ctrl: true, shift: true, alt: false })]
    #[case(Modifiers { ctrl: true, shift: false, alt: true })]
    #[case(Modifiers { ctrl: false, shift: true, alt: true })]
    #[case(Modifiers { ctrl: true, shift: true, alt: true })]
    fn encode_then_parse_round_trips_named_key_under_modifiers(#[case] mods: Modifiers) {
        let ev = KeyEvent::new(KeyCode::Up, mods);
        let bytes = encode_vterm(ev);
        let (parsed, consumed) = parse_one(&bytes).unwrap_or_else(|| panic!("no parse for {mods:?}"));
        assert_eq!(consumed, bytes.len(), "not prefix-free for {mods:?}");
        assert_eq!(parsed, InputEvent::Key(ev), "round-trip mismatch for {mods:?}");
    }

    fn named_keys() -> Vec<KeyCode> {
        vec![
            KeyCode::Up,
            KeyCode::Down,
            KeyCode::Left,
            KeyCode::Right,
            KeyCode::Home,
            KeyCode::End,
            KeyCode::PageUp,
            KeyCode::PageDown,
            KeyCode::Insert,
            KeyCode::Delete,
            KeyCode::Enter,
            KeyCode::Tab,
            KeyCode::BackTab,
            KeyCode::Escape,
            KeyCode::Backspace,
            KeyCode::F(1),
            KeyCode::F(2),
            KeyCode::F(3),
            KeyCode::F(4),
        ]
    }

    #[test]
    fn encode_then_parse_round_trips_named_keys() {
        for code in named_keys() {
            let ev = KeyEvent::plain(code);
            let bytes = encode_vterm(ev);
            let (parsed, consumed) = parse_one(&bytes).unwrap_or_else(|| panic!("no parse for {code:?}"));
            assert_eq!(consumed, bytes.len(), "not prefix-free for {code:?}");
            assert_eq!(parsed, InputEvent::Key(ev), "round-trip mismatch for {code:?}");
        }
    }

    #[test]
    fn ctrl_letter_maps_to_control_code() {
        let ev = KeyEvent::new(KeyCode::Char('c'), Modifiers::CTRL);
        assert_eq!(encode_vterm(ev), vec![0x03]);
    }

    #[test]
    fn alt_prepends_escape() {
        let ev = KeyEvent::new(KeyCode::Char('x'), Modifiers::ALT);
        assert_eq!(encode_vterm(ev), vec![0x1b, b'x']);
    }

    #[test]
    fn simple_target_drops_named_keys() {
        assert_eq!(encode_simple(KeyEvent::plain(KeyCode::Up)), None);
        assert_eq!(encode_simple(KeyEvent::plain(KeyCode::Enter)), Some(b"\n".to_vec()));
        assert_eq!(
            encode_simple(KeyEvent::plain(KeyCode::Char('y'))),
            Some(b"y".to_vec())
        );
    }

    #[test]
    fn sgr_mouse_click_is_parsed() {
        let bytes = b"\x1b[<0;10;5M";
        let (ev, consumed) = parse_one(bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(
            ev,
            InputEvent::Mouse(MouseEvent { col: 9, row: 4, kind: MouseEventKind::Down, mods: Modifiers::NONE })
        );
    }

    #[test]
    fn unrecognised_sequence_yields_no_event() {
        assert_eq!(parse_one(b"\x1b[999z"), None);
    }

    #[test]
    fn key_spec_parses_modifiers() {
        assert_eq!(
            parse_key_spec("C-c"),
            Some(KeyEvent::new(KeyCode::Char('c'), Modifiers::CTRL))
        );
        assert_eq!(parse_key_spec("Enter"), Some(KeyEvent::plain(KeyCode::Enter)));
        assert_eq!(parse_key_spec("F5"), Some(KeyEvent::plain(KeyCode::F(5))));
    }
}
