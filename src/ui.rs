//! UI state & input dispatcher (C6): focus model, selected index, keymap
//! lookup, and the routing decision between global actions and forwarding a
//! key to the focused process.

use crate::keymap::{InputEvent, KeyCode, KeyEvent, Modifiers};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Procs,
    Term,
}

/// `focus`, `selected`, and the cached terminal size, per §4.6. Selection
/// wraps: `next()` on `N-1` yields `0`, `prev()` on `0` yields `N-1`.
pub struct UiState {
    pub focus: Focus,
    pub selected: usize,
    pub term_size: (u16, u16),
    /// Lines paged back into the selected process's scrollback from the
    /// live bottom (0 = live). Reset whenever the selection changes, since
    /// a different process's viewport always starts at its own live view.
    pub scroll_offset: usize,
    n: usize,
}

impl UiState {
    pub fn new(n: usize, term_size: (u16, u16)) -> Self {
        UiState { focus: Focus::Procs, selected: 0, term_size, scroll_offset: 0, n }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn next(&mut self) {
        if self.n == 0 {
            return;
        }
        self.selected = (self.selected + 1) % self.n;
        self.scroll_offset = 0;
    }

    pub fn prev(&mut self) {
        if self.n == 0 {
            return;
        }
        self.selected = (self.selected + self.n - 1) % self.n;
        self.scroll_offset = 0;
    }

    pub fn select(&mut self, index: usize) {
        if index < self.n {
            self.selected = index;
            self.scroll_offset = 0;
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Procs => Focus::Term,
            Focus::Term => Focus::Procs,
        };
    }

    /// Pages `n` lines further back into scrollback, clamped to `max` (the
    /// selected process's available history).
    pub fn scroll_up(&mut self, n: usize, max: usize) {
        self.scroll_offset = (self.scroll_offset + n).min(max);
    }

    /// Pages `n` lines back toward the live view, floored at 0.
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }
}

/// The finite set of global actions a keymap can resolve to (§4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    SelectNext,
    SelectPrev,
    SelectIndex(usize),
    KillProc,
    StartProc,
    RestartProc,
    ForceRestartProc,
    FocusTerm,
    FocusProcs,
    ScrollUp(usize),
    ScrollDown(usize),
}

/// A finite function from `KeyEvent` to `Action`, as used by both
/// `keymap_procs` and `keymap_term`.
#[derive(Default)]
pub struct Keymap {
    bindings: HashMap<KeyEvent, Action>,
}

impl Keymap {
    pub fn new() -> Self {
        Keymap::default()
    }

    pub fn bind(&mut self, ev: KeyEvent, action: Action) {
        self.bindings.insert(ev, action);
    }

    pub fn lookup(&self, ev: KeyEvent) -> Option<Action> {
        self.bindings.get(&ev).copied()
    }

    /// Human-readable bindings for a help footer, derived from the same
    /// table dispatch uses so the displayed hints never drift from behavior.
    pub fn describe(&self) -> Vec<(KeyEvent, Action)> {
        let mut out: Vec<_> = self.bindings.iter().map(|(k, v)| (*k, *v)).collect();
        out.sort_by_key(|(k, _)| format!("{k:?}"));
        out
    }
}

/// Default bindings: `q -> Quit`, `C-a -> toggle focus`, `j/k ->
/// SelectNext/SelectPrev`, `x -> KillProc`, `s -> StartProc`, plus the
/// supplemental bindings (`r`estart, digits for direct selection, paging)
/// named in §4.6 without an exhaustive table.
pub fn default_keymap_procs() -> Keymap {
    let mut km = Keymap::new();
    km.bind(KeyEvent::plain(KeyCode::Char('q')), Action::Quit);
    km.bind(KeyEvent::new(KeyCode::Char('a'), Modifiers::CTRL), Action::FocusTerm);
    km.bind(KeyEvent::plain(KeyCode::Char('j')), Action::SelectNext);
    km.bind(KeyEvent::plain(KeyCode::Down), Action::SelectNext);
    km.bind(KeyEvent::plain(KeyCode::Char('k')), Action::SelectPrev);
    km.bind(KeyEvent::plain(KeyCode::Up), Action::SelectPrev);
    km.bind(KeyEvent::plain(KeyCode::Char('x')), Action::KillProc);
    km.bind(KeyEvent::plain(KeyCode::Char('s')), Action::StartProc);
    km.bind(KeyEvent::plain(KeyCode::Char('r')), Action::RestartProc);
    km.bind(KeyEvent::new(KeyCode::Char('r'), Modifiers::SHIFT), Action::ForceRestartProc);
    km.bind(KeyEvent::plain(KeyCode::Enter), Action::FocusTerm);
    for digit in 1..=9u8 {
        km.bind(
            KeyEvent::plain(KeyCode::Char((b'0' + digit) as char)),
            Action::SelectIndex((digit - 1) as usize),
        );
    }
    km
}

/// `keymap_term`: only the focus toggle and paging are intercepted; every
/// other key falls through to `dispatch`'s forwarding branch.
pub fn default_keymap_term() -> Keymap {
    let mut km = Keymap::new();
    km.bind(KeyEvent::new(KeyCode::Char('a'), Modifiers::CTRL), Action::FocusProcs);
    km.bind(KeyEvent::plain(KeyCode::PageUp), Action::ScrollUp(10));
    km.bind(KeyEvent::plain(KeyCode::PageDown), Action::ScrollDown(10));
    km
}

/// The result of dispatching one input event: either a global action to
/// execute, or a key event to forward to the currently focused process.
pub enum Dispatch {
    Action(Action),
    Forward(KeyEvent),
    Resize(u16, u16),
    None,
}

/// §4.6's dispatch algorithm: look up the event in the active map; if
/// found, return the action; otherwise, if focus is Term, forward the key;
/// otherwise drop it. Mouse events and resize events are passed through
/// untouched (resize always routes to the engine regardless of focus).
pub fn dispatch(ui: &UiState, event: InputEvent, keymap_procs: &Keymap, keymap_term: &Keymap) -> Dispatch {
    match event {
        InputEvent::Resize(rows, cols) => Dispatch::Resize(rows, cols),
        InputEvent::Mouse(_) => Dispatch::None,
        InputEvent::Key(ev) => {
            let active = match ui.focus {
                Focus::Procs => keymap_procs,
                Focus::Term => keymap_term,
            };
            if let Some(action) = active.lookup(ev) {
                return Dispatch::Action(action);
            }
            if ui.focus == Focus::Term && !ui.is_empty() {
                return Dispatch::Forward(ev);
            }
            Dispatch::None
        }
    }
}
