//! VT100/xterm-compatible terminal emulator (C2): a byte-stream parser
//! (`vte`) driving a screen `Grid`, with scrollback and callback slots for
//! damage, cursor movement, property changes, and scrollback push/pop.

pub mod color;
pub mod grid;
mod perform;
pub mod scrollback;

pub use color::{Attrs, Color};
pub use grid::{Cell, Cursor, CursorShape, Damage, Grid, MouseReporting};
pub use scrollback::Scrollback;

/// One VT100 emulator instance. Owned exclusively by a single `Proc`;
/// never shared, per the concurrency model's "VTerm instances are never
/// shared" policy.
pub struct Term {
    grid: Grid,
    parser: vte::Parser,
    output_cb: Option<Box<dyn FnMut(&[u8]) + Send>>,
    damage_cb: Option<Box<dyn FnMut(Damage) + Send>>,
    cursor_moved_cb: Option<Box<dyn FnMut(Cursor) + Send>>,
    /// Fired when a scroll moves a rectangular region by a line delta
    /// (negative = up, positive = down), so a host that can blit-scroll
    /// need not repaint the whole region from damage alone.
    rect_moved_cb: Option<Box<dyn FnMut(Damage, isize) + Send>>,
    prop_changed_cb: Option<Box<dyn FnMut() + Send>>,
    sb_push_cb: Option<Box<dyn FnMut(&[Cell]) + Send>>,
    /// Fired once per scroll-down reclaim attempt with the line that was
    /// spliced back in, or `None` when scrollback had nothing to give.
    sb_pop_cb: Option<Box<dyn FnMut(Option<&[Cell]>) + Send>>,
}

impl Term {
    pub fn new(rows: usize, cols: usize) -> Self {
        Term {
            grid: Grid::new(rows, cols),
            parser: vte::Parser::new(),
            output_cb: None,
            damage_cb: None,
            cursor_moved_cb: None,
            rect_moved_cb: None,
            prop_changed_cb: None,
            sb_push_cb: None,
            sb_pop_cb: None,
        }
    }

    pub fn with_scrollback_bound(rows: usize, cols: usize, max_lines: usize) -> Self {
        let mut term = Term::new(rows, cols);
        term.grid.set_scrollback_bound(max_lines);
        term
    }

    pub fn set_output_callback(&mut self, f: impl FnMut(&[u8]) + Send + 'static) {
        self.output_cb = Some(Box::new(f));
    }

    pub fn set_damage_callback(&mut self, f: impl FnMut(Damage) + Send + 'static) {
        self.damage_cb = Some(Box::new(f));
    }

    pub fn set_cursor_moved_callback(&mut self, f: impl FnMut(Cursor) + Send + 'static) {
        self.cursor_moved_cb = Some(Box::new(f));
    }

    pub fn set_rect_moved_callback(&mut self, f: impl FnMut(Damage, isize) + Send + 'static) {
        self.rect_moved_cb = Some(Box::new(f));
    }

    pub fn set_prop_changed_callback(&mut self, f: impl FnMut() + Send + 'static) {
        self.prop_changed_cb = Some(Box::new(f));
    }

    pub fn set_sb_push_callback(&mut self, f: impl FnMut(&[Cell]) + Send + 'static) {
        self.sb_push_cb = Some(Box::new(f));
    }

    pub fn set_sb_pop_callback(&mut self, f: impl FnMut(Option<&[Cell]>) + Send + 'static) {
        self.sb_pop_cb = Some(Box::new(f));
    }

    /// Feed bytes through the parser. Always consumes the whole slice.
    /// Fires damage/cursor/prop/sb_push callbacks after the mutation is
    /// committed, and flushes any writeback bytes the parser queued (DSR/DA
    /// query responses) to the output callback.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let cursor_before = self.grid.cursor;

        // `parser` and `grid` are disjoint fields, so the borrow checker
        // accepts this split without needing `&mut self` as a whole.
        self.parser.advance(&mut self.grid, bytes);

        for line in std::mem::take(&mut self.grid.evicted) {
            if let Some(cb) = self.sb_push_cb.as_mut() {
                cb(&line);
            }
        }

        for popped in std::mem::take(&mut self.grid.popped) {
            if let Some(cb) = self.sb_pop_cb.as_mut() {
                cb(popped.as_deref());
            }
        }

        if let Some((rect, delta)) = self.grid.moved_rect.take() {
            if let Some(cb) = self.rect_moved_cb.as_mut() {
                cb(rect, delta);
            }
        }

        let writeback = std::mem::take(&mut self.grid.writeback);
        if !writeback.is_empty() {
            if let Some(cb) = self.output_cb.as_mut() {
                cb(&writeback);
            }
        }

        if self.grid.cursor != cursor_before {
            if let Some(cb) = self.cursor_moved_cb.as_mut() {
                cb(self.grid.cursor);
            }
        }

        if self.grid.take_prop_changed() {
            if let Some(cb) = self.prop_changed_cb.as_mut() {
                cb();
            }
        }

        if let Some(damage) = self.grid.take_dirty_rect() {
            if let Some(cb) = self.damage_cb.as_mut() {
                cb(damage);
            }
        }

        bytes.len()
    }

    pub fn set_size(&mut self, rows: usize, cols: usize) {
        self.grid.resize(rows, cols);
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.grid.cell(row, col)
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    pub fn cursor(&self) -> Cursor {
        self.grid.cursor
    }

    pub fn title(&self) -> &str {
        &self.grid.title
    }

    pub fn is_alternate_screen(&self) -> bool {
        self.grid.is_alternate_screen()
    }

    pub fn scrollback(&self) -> &Scrollback {
        self.grid.scrollback()
    }

    /// Scrollback lines plus the live grid's rows, the combined history a
    /// scrollback viewport can page over.
    pub fn total_lines(&self) -> usize {
        self.scrollback().len() + self.grid.rows()
    }

    /// Row `index` of the combined history (0 = oldest scrollback line),
    /// sourced from scrollback first and the live grid beyond that.
    pub fn history_row(&self, index: usize) -> Option<&[Cell]> {
        let sb_len = self.scrollback().len();
        if index < sb_len {
            self.scrollback().get(index).map(Vec::as_slice)
        } else {
            self.grid.row(index - sb_len)
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_is_associative_over_chunk_boundaries() {
        let mut a = Term::new(5, 20);
        a.write(b"hello ");
        a.write(b"world\r\n");
        a.write(b"second line");

        let mut b = Term::new(5, 20);
        b.write(b"hello world\r\nsecond line");

        assert_eq!(a.grid().content_to_string(), b.grid().content_to_string());
    }

    #[test]
    fn get_cell_is_total_for_every_coordinate() {
        let term = Term::new(4, 6);
        for r in 0..4 {
            for c in 0..6 {
                assert!(term.get_cell(r, c).is_some());
            }
        }
    }

    #[test]
    fn scrollback_receives_evicted_lines() {
        let mut term = Term::with_scrollback_bound(2, 5, 10);
        term.write(b"a\r\nb\r\nc");
        assert_eq!(term.scrollback().len(), 1);
        assert_eq!(term.scrollback().line_to_string(0).trim_end(), "a");
    }

    #[test]
    fn output_callback_receives_dsr_response() {
        use std::sync::{Arc, Mutex};
        let captured: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let captured2 = captured.clone();
        let mut term = Term::new(5, 5);
        term.set_output_callback(move |bytes| {
            captured2.lock().unwrap().extend_from_slice(bytes);
        });
        term.write(b"\x1b[6n");
        assert_eq!(*captured.lock().unwrap(), b"\x1b[1;1R");
    }

    #[test]
    fn sb_pop_callback_fires_with_the_reclaimed_line() {
        use std::sync::{Arc, Mutex};
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let mut term = Term::with_scrollback_bound(2, 5, 10);
        term.set_sb_pop_callback(move |line| {
            seen2.lock().unwrap().push(line.map(|cells| cells.iter().map(|c| c.ch).collect()));
        });
        term.write(b"a\r\nb\r\nc");
        term.write(b"\x1b[T"); // CSI T: scroll down, reclaims "a"
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_deref().unwrap().trim_end(), "a");
    }

    #[test]
    fn rect_moved_callback_fires_on_scroll() {
        use std::sync::{Arc, Mutex};
        let deltas: Arc<Mutex<Vec<isize>>> = Arc::new(Mutex::new(Vec::new()));
        let deltas2 = deltas.clone();
        let mut term = Term::new(3, 5);
        term.set_rect_moved_callback(move |_rect, delta| deltas2.lock().unwrap().push(delta));
        term.write(b"a\r\nb\r\nc\r\nd");
        assert_eq!(*deltas.lock().unwrap(), vec![-1]);
    }

    #[test]
    fn history_row_reads_scrollback_then_the_live_grid() {
        let mut term = Term::with_scrollback_bound(2, 5, 10);
        term.write(b"a\r\nb\r\nc");
        assert_eq!(term.total_lines(), 3);
        assert_eq!(
            term.history_row(0).unwrap().iter().map(|c| c.ch).collect::<String>().trim_end(),
            "a"
        );
        assert_eq!(
            term.history_row(1).unwrap().iter().map(|c| c.ch).collect::<String>().trim_end(),
            "b"
        );
    }

    #[test]
    fn resize_idempotence() {
        let mut a = Term::new(10, 10);
        a.write(b"hi");
        a.set_size(6, 40);
        a.set_size(6, 40);
        let mut b = Term::new(10, 10);
        b.write(b"hi");
        b.set_size(6, 40);
        assert_eq!(a.grid().content_to_string(), b.grid().content_to_string());
    }
}
