//! Pipe-buffered kind for `tty: false` processes: no PTY, no VT emulation,
//! just a last-line buffer and an ordered deque of completed lines.

use std::collections::VecDeque;
use tokio::process::ChildStdin;

/// Caps memory use for processes that never stop producing output; the
/// distilled spec leaves this unbounded, but an actual deque without a
/// ceiling is a leak waiting to happen.
pub const MAX_LINES: usize = 1000;

pub struct SimpleKind {
    /// The child's pid, captured before the `Child` itself was moved into
    /// the waiter task that owns it (see `Proc::spawn_simple`); used only
    /// for `stop()`/`force_stop()` signal delivery.
    pub pid: Option<u32>,
    pub stdin: Option<ChildStdin>,
    last_line: String,
    lines: VecDeque<String>,
}

impl SimpleKind {
    pub fn new(pid: Option<u32>, stdin: Option<ChildStdin>) -> Self {
        SimpleKind { pid, stdin, last_line: String::new(), lines: VecDeque::new() }
    }

    /// Append raw bytes from stdout/stderr. `\r` is dropped; `\n` closes the
    /// last-line buffer and pushes it. Invalid UTF-8 bytes are replaced,
    /// never panicking the supervisor over a child's malformed output.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> bool {
        let mut pushed_line = false;
        for ch in String::from_utf8_lossy(bytes).chars() {
            match ch {
                '\r' => {}
                '\n' => {
                    let line = std::mem::take(&mut self.last_line);
                    if self.lines.len() >= MAX_LINES {
                        self.lines.pop_front();
                    }
                    self.lines.push_back(line);
                    pushed_line = true;
                }
                c => self.last_line.push(c),
            }
        }
        pushed_line
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn last_line(&self) -> &str {
        &self.last_line
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The `n` lines ending `offset` lines back from the newest (0 = the
    /// most recent `n` lines; a positive offset pages back through history).
    pub fn tail(&self, n: usize, offset: usize) -> Vec<&str> {
        let total = self.lines.len();
        let end = total.saturating_sub(offset);
        let start = end.saturating_sub(n);
        self.lines.iter().skip(start).take(end - start).map(String::as_str).collect()
    }
}
