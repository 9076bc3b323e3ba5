//! PTY + VT100-emulator kind: one live `VtermKind` per `Proc` while it is
//! Running or Stopping with `tty: true`.

use crate::pty::PtyHandle;
use crate::vterm::Term;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct VtermKind {
    pub handle: Arc<PtyHandle>,
    pub term: Term,
    damaged: Arc<AtomicBool>,
}

impl VtermKind {
    pub fn new(handle: PtyHandle, rows: usize, cols: usize) -> Self {
        let handle = Arc::new(handle);
        let mut term = Term::new(rows, cols);
        // Wire the VTerm's output callback (DSR/DA query responses) straight
        // back to the PTY master, breaking the Proc<->VTerm<->PTY ownership
        // cycle the source had: the closure only carries the handle it needs.
        let write_handle = handle.clone();
        term.set_output_callback(move |bytes| {
            let _ = write_handle.write(bytes);
        });
        let damaged = Arc::new(AtomicBool::new(false));
        let damaged_cb = damaged.clone();
        term.set_damage_callback(move |_rect| damaged_cb.store(true, Ordering::Relaxed));
        VtermKind { handle, term, damaged }
    }

    /// Feed output bytes through the VT parser, recording whether the
    /// mutation produced damage so the caller (Proc) knows whether to
    /// fan out `on_rerender`.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.term.write(bytes);
    }

    /// Drain the damage flag accumulated since the last call. `write()`
    /// already drains `Grid`'s own dirty-row bitmap into a `Damage` before
    /// this is read, so this is the only reliable way to tell whether the
    /// last `feed()` actually changed visible cells.
    pub fn take_damaged(&self) -> bool {
        self.damaged.swap(false, Ordering::Relaxed)
    }
}
