//! Screen grid: the cell matrix, cursor, and the mutating operations the
//! VT parser drives. Damage is tracked per-row and drained by the render
//! scheduler once per cooperative tick.

use super::color::Attrs;
use super::scrollback::Scrollback;
use unicode_width::UnicodeWidthChar;

/// One screen cell. `width` distinguishes a normal cell (1), the leading
/// column of a wide (CJK/emoji) glyph (2), and the trailing continuation
/// column of a wide glyph (0, never painted directly).
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub attrs: Attrs,
    pub width: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Cell { ch: ' ', attrs: Attrs::default(), width: 1 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorShape {
    Block,
    Underline,
    Bar,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
    pub visible: bool,
    pub shape: CursorShape,
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor { row: 0, col: 0, visible: true, shape: CursorShape::Block }
    }
}

/// A rectangular damage region, end-exclusive, already clipped to the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Damage {
    pub row_start: usize,
    pub col_start: usize,
    pub row_end: usize,
    pub col_end: usize,
}

/// The mutable screen state the VT parser drives. One instance per
/// `vterm::Term`; owned exclusively by its `Proc`.
pub struct Grid {
    cols: usize,
    rows: usize,
    cells: Vec<Vec<Cell>>,
    pub cursor: Cursor,
    saved_cursor: Option<Cursor>,
    attrs: Attrs,
    scroll_top: usize,
    scroll_bottom: usize,
    tab_stops: Vec<bool>,
    pub origin_mode: bool,
    pub auto_wrap: bool,
    wrap_pending: bool,
    alternate: Option<AlternateState>,
    pub title: String,
    pub icon_name: String,
    dirty_rows: Vec<bool>,
    /// Completed lines evicted from the top of the main screen by scroll-up,
    /// pushed into `scrollback` immediately and also queued here so the
    /// owning `Term` can fire its `sb_push` callback once per write().
    pub(super) evicted: Vec<Vec<Cell>>,
    /// Bytes the emulator wants written back to the child (DSR/DA query
    /// responses), drained by the owning `Term` after each write().
    pub(super) writeback: Vec<u8>,
    /// The scrollback ring lines scroll off into (scroll-up) and can be
    /// reclaimed from (scroll-down). Owned here, not by `Term`: the `vte`
    /// driver only ever hands scrolling methods a `&mut Grid`, so the
    /// reclaim in `scroll_down` has to be resolved synchronously against
    /// data `Grid` itself holds.
    scrollback: Scrollback,
    /// One entry per line scroll-down reclaimed this write() (`Some`) or
    /// left blank because nothing was available (`None`); drained by `Term`
    /// to fire `sb_pop` once per reclaim attempt.
    pub(super) popped: Vec<Option<Vec<Cell>>>,
    /// The region and line delta of the last scroll, drained by `Term` to
    /// fire `rect_moved` once per write() (coalesced like damage).
    pub(super) moved_rect: Option<(Damage, isize)>,
    pub mouse_reporting: MouseReporting,
    pub bracketed_paste: bool,
    /// Set whenever title/icon/mouse-mode/alt-screen flag changes, cleared by
    /// `take_prop_changed`.
    prop_changed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MouseReporting {
    #[default]
    None,
    X10,
    Normal,
    ButtonEvent,
    AnyEvent,
}

struct AlternateState {
    cells: Vec<Vec<Cell>>,
    cursor: Cursor,
    saved_cursor: Option<Cursor>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Grid {
            cols,
            rows,
            cells: Self::blank_screen(rows, cols),
            cursor: Cursor::default(),
            saved_cursor: None,
            attrs: Attrs::default(),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            tab_stops: Self::default_tab_stops(cols),
            origin_mode: false,
            auto_wrap: true,
            wrap_pending: false,
            alternate: None,
            title: String::new(),
            icon_name: String::new(),
            dirty_rows: vec![false; rows],
            evicted: Vec::new(),
            writeback: Vec::new(),
            scrollback: Scrollback::default(),
            popped: Vec::new(),
            moved_rect: None,
            mouse_reporting: MouseReporting::None,
            bracketed_paste: false,
            prop_changed: false,
        }
    }

    pub(super) fn mark_prop_changed(&mut self) {
        self.prop_changed = true;
    }

    pub(super) fn take_prop_changed(&mut self) -> bool {
        std::mem::take(&mut self.prop_changed)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    /// Replaces the scrollback bound; only meaningful right after
    /// construction, before any line has scrolled off.
    pub fn set_scrollback_bound(&mut self, max_lines: usize) {
        self.scrollback = Scrollback::new(max_lines);
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.cells.get(row).map(Vec::as_slice)
    }

    fn blank_screen(rows: usize, cols: usize) -> Vec<Vec<Cell>> {
        (0..rows).map(|_| Self::blank_row(cols)).collect()
    }

    fn blank_row(cols: usize) -> Vec<Cell> {
        vec![Cell::default(); cols]
    }

    fn default_tab_stops(cols: usize) -> Vec<bool> {
        (0..cols).map(|c| c % 8 == 0).collect()
    }

    // -- damage -----------------------------------------------------------

    pub fn mark_dirty(&mut self, row: usize) {
        if row < self.dirty_rows.len() {
            self.dirty_rows[row] = true;
        }
    }

    fn mark_range_dirty(&mut self, row_start: usize, row_end: usize) {
        let end = row_end.min(self.rows);
        for r in row_start.min(end)..end {
            self.mark_dirty(r);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty_rows.iter_mut().for_each(|d| *d = true);
    }

    /// Drain accumulated per-row damage flags, returning the set of dirty
    /// rows as a single clipped rectangle covering all of them (the parser's
    /// contract fires one damage callback per mutation; the scheduler only
    /// needs the union once per tick, so callers that want per-row damage
    /// should call `take_dirty_rows` instead).
    pub fn take_dirty_rect(&mut self) -> Option<Damage> {
        let mut row_start = None;
        let mut row_end = 0;
        for (i, dirty) in self.dirty_rows.iter().enumerate() {
            if *dirty {
                if row_start.is_none() {
                    row_start = Some(i);
                }
                row_end = i + 1;
            }
        }
        self.dirty_rows.iter_mut().for_each(|d| *d = false);
        row_start.map(|row_start| Damage {
            row_start,
            col_start: 0,
            row_end,
            col_end: self.cols,
        })
    }

    pub fn any_dirty(&self) -> bool {
        self.dirty_rows.iter().any(|d| *d)
    }

    // -- cell access --------------------------------------------------------

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(row).and_then(|r| r.get(col))
    }

    fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        self.cells.get_mut(row).and_then(|r| r.get_mut(col))
    }

    // -- writing ------------------------------------------------------------

    pub fn put_char(&mut self, c: char) {
        let width = UnicodeWidthChar::width(c).unwrap_or(1).max(1) as u8;

        if self.wrap_pending {
            self.wrap_pending = false;
            self.carriage_return();
            self.line_feed();
        }

        if self.cursor.col + (width as usize) > self.cols {
            if self.auto_wrap {
                self.wrap_pending = true;
            } else {
                return;
            }
        }

        if self.wrap_pending && self.cursor.col + (width as usize) > self.cols {
            self.wrap_pending = false;
            self.carriage_return();
            self.line_feed();
        }

        let row = self.cursor.row;
        let col = self.cursor.col;
        let attrs = self.attrs;
        if let Some(cell) = self.cell_mut(row, col) {
            cell.ch = c;
            cell.attrs = attrs;
            cell.width = width;
        }
        if width == 2 {
            if let Some(cell) = self.cell_mut(row, col + 1) {
                cell.ch = '\0';
                cell.attrs = attrs;
                cell.width = 0;
            }
        }
        self.mark_dirty(row);

        if self.cursor.col + (width as usize) >= self.cols {
            self.wrap_pending = true;
            self.cursor.col = self.cols - 1;
        } else {
            self.cursor.col += width as usize;
        }
    }

    pub fn newline(&mut self) {
        self.carriage_return();
        self.line_feed();
    }

    pub fn line_feed(&mut self) {
        self.wrap_pending = false;
        if self.cursor.row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows {
            self.cursor.row += 1;
        }
    }

    pub fn reverse_index(&mut self) {
        self.wrap_pending = false;
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    pub fn next_line(&mut self) {
        self.carriage_return();
        self.line_feed();
    }

    pub fn carriage_return(&mut self) {
        self.wrap_pending = false;
        self.cursor.col = 0;
    }

    pub fn backspace(&mut self) {
        self.wrap_pending = false;
        if self.cursor.col > 0 {
            self.cursor.col -= 1;
        }
    }

    pub fn tab(&mut self) {
        let mut col = self.cursor.col + 1;
        while col < self.cols && !self.tab_stops.get(col).copied().unwrap_or(false) {
            col += 1;
        }
        self.cursor.col = col.min(self.cols - 1);
    }

    pub fn set_tab_stop(&mut self) {
        if self.cursor.col < self.tab_stops.len() {
            self.tab_stops[self.cursor.col] = true;
        }
    }

    pub fn clear_tab_stop(&mut self, all: bool) {
        if all {
            self.tab_stops.iter_mut().for_each(|t| *t = false);
        } else if self.cursor.col < self.tab_stops.len() {
            self.tab_stops[self.cursor.col] = false;
        }
    }

    // -- scrolling ------------------------------------------------------------

    /// Scroll the scroll region up by `n` lines, evicting lines that fall off
    /// the top of the *main screen's full scroll region* into `self.evicted`
    /// when the region spans the whole screen (matches real terminals: only
    /// full-screen scroll feeds scrollback).
    pub fn scroll_up(&mut self, n: usize) {
        let top = self.scroll_top;
        let bottom = self.scroll_bottom.min(self.rows.saturating_sub(1));
        if top > bottom {
            return;
        }
        let region_is_full_screen = top == 0 && bottom == self.rows - 1;
        for _ in 0..n {
            if top >= self.cells.len() || bottom >= self.cells.len() {
                break;
            }
            let evicted = self.cells.remove(top);
            if region_is_full_screen && self.alternate.is_none() {
                self.scrollback.push(evicted.clone());
                self.evicted.push(evicted);
            }
            self.cells.insert(bottom, Self::blank_row(self.cols));
        }
        self.mark_range_dirty(top, bottom + 1);
        self.moved_rect = Some((
            Damage { row_start: top, col_start: 0, row_end: bottom + 1, col_end: self.cols },
            -(n as isize),
        ));
    }

    /// Scrolls the region down by `n` lines. When the region spans the
    /// whole screen, each line entering at `top` is reclaimed from
    /// scrollback (`sb_pop`) if one is available there; otherwise the row
    /// is left blank, matching real terminals (scroll-down only reclaims
    /// what scroll-up evicted).
    pub fn scroll_down(&mut self, n: usize) {
        let top = self.scroll_top;
        let bottom = self.scroll_bottom.min(self.rows.saturating_sub(1));
        if top > bottom {
            return;
        }
        let region_is_full_screen = top == 0 && bottom == self.rows - 1;
        for _ in 0..n {
            if bottom >= self.cells.len() {
                break;
            }
            self.cells.remove(bottom);
            let reclaimed = if region_is_full_screen && self.alternate.is_none() {
                self.scrollback.pop()
            } else {
                None
            };
            self.popped.push(reclaimed.clone());
            let row = reclaimed.unwrap_or_else(|| Self::blank_row(self.cols));
            self.cells.insert(top, row);
        }
        self.mark_range_dirty(top, bottom + 1);
        self.moved_rect = Some((
            Damage { row_start: top, col_start: 0, row_end: bottom + 1, col_end: self.cols },
            n as isize,
        ));
    }

    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let top = top.min(self.rows - 1);
        let bottom = bottom.min(self.rows - 1);
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        } else {
            self.scroll_top = 0;
            self.scroll_bottom = self.rows - 1;
        }
        self.move_cursor(0, 0);
    }

    // -- erasure ------------------------------------------------------------

    pub fn erase_in_display(&mut self, mode: u16) {
        match mode {
            0 => {
                self.erase_in_line(0);
                self.mark_range_dirty(self.cursor.row + 1, self.rows);
                for row in self.cells.iter_mut().skip(self.cursor.row + 1) {
                    row.fill(Cell::default());
                }
            }
            1 => {
                self.erase_in_line(1);
                self.mark_range_dirty(0, self.cursor.row);
                for row in self.cells.iter_mut().take(self.cursor.row) {
                    row.fill(Cell::default());
                }
            }
            2 | 3 => {
                self.cells = Self::blank_screen(self.rows, self.cols);
                self.mark_all_dirty();
            }
            _ => {}
        }
    }

    pub fn erase_in_line(&mut self, mode: u16) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let cols = self.cols;
        if let Some(r) = self.cells.get_mut(row) {
            match mode {
                0 => r[col.min(cols)..].fill(Cell::default()),
                1 => r[..=col.min(cols - 1)].fill(Cell::default()),
                2 => r.fill(Cell::default()),
                _ => {}
            }
        }
        self.mark_dirty(row);
    }

    pub fn erase_chars(&mut self, n: usize) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let end = (col + n).min(self.cols);
        if let Some(r) = self.cells.get_mut(row) {
            for cell in &mut r[col..end] {
                *cell = Cell::default();
            }
        }
        self.mark_dirty(row);
    }

    pub fn insert_blank_chars(&mut self, n: usize) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let cols = self.cols;
        if let Some(r) = self.cells.get_mut(row) {
            for _ in 0..n.min(cols - col) {
                r.insert(col, Cell::default());
                r.pop();
            }
        }
        self.mark_dirty(row);
    }

    pub fn delete_chars(&mut self, n: usize) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let cols = self.cols;
        if let Some(r) = self.cells.get_mut(row) {
            for _ in 0..n.min(cols - col) {
                r.remove(col);
                r.push(Cell::default());
            }
        }
        self.mark_dirty(row);
    }

    pub fn insert_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let bottom = self.scroll_bottom;
        for _ in 0..n {
            if bottom >= self.cells.len() {
                break;
            }
            self.cells.remove(bottom);
            self.cells.insert(row, Self::blank_row(self.cols));
        }
        self.mark_range_dirty(row, bottom + 1);
    }

    pub fn delete_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let bottom = self.scroll_bottom;
        for _ in 0..n {
            if row >= self.cells.len() || bottom >= self.cells.len() {
                break;
            }
            self.cells.remove(row);
            self.cells.insert(bottom, Self::blank_row(self.cols));
        }
        self.mark_range_dirty(row, bottom + 1);
    }

    // -- cursor ------------------------------------------------------------

    pub fn move_cursor(&mut self, row: usize, col: usize) {
        self.wrap_pending = false;
        let row_limit = if self.origin_mode { self.scroll_bottom } else { self.rows - 1 };
        let row_base = if self.origin_mode { self.scroll_top } else { 0 };
        self.cursor.row = (row_base + row).min(row_limit);
        self.cursor.col = col.min(self.cols - 1);
        self.mark_dirty(self.cursor.row);
    }

    pub fn move_cursor_relative(&mut self, d_row: i32, d_col: i32) {
        self.wrap_pending = false;
        let new_row = (self.cursor.row as i32 + d_row).clamp(0, self.rows as i32 - 1) as usize;
        let new_col = (self.cursor.col as i32 + d_col).clamp(0, self.cols as i32 - 1) as usize;
        self.cursor.row = new_row;
        self.cursor.col = new_col;
        self.mark_dirty(new_row);
    }

    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(self.cursor);
    }

    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved_cursor {
            self.cursor = saved;
            self.mark_dirty(self.cursor.row);
        }
    }

    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.attrs
    }

    // -- modes ------------------------------------------------------------

    pub fn enter_alternate_screen(&mut self) {
        if self.alternate.is_some() {
            return;
        }
        let cells = std::mem::replace(&mut self.cells, Self::blank_screen(self.rows, self.cols));
        self.alternate = Some(AlternateState {
            cells,
            cursor: self.cursor,
            saved_cursor: self.saved_cursor,
        });
        self.cursor = Cursor::default();
        self.mark_all_dirty();
    }

    pub fn exit_alternate_screen(&mut self) {
        if let Some(alt) = self.alternate.take() {
            self.cells = alt.cells;
            self.cursor = alt.cursor;
            self.saved_cursor = alt.saved_cursor;
            self.mark_all_dirty();
        }
    }

    pub fn is_alternate_screen(&self) -> bool {
        self.alternate.is_some()
    }

    pub fn reset(&mut self) {
        let rows = self.rows;
        let cols = self.cols;
        *self = Grid::new(rows, cols);
    }

    // -- resize ------------------------------------------------------------

    /// Resize in place, preserving content anchored to the top-left and
    /// truncating lines/rows that no longer fit. Returns nothing: unlike
    /// `scroll_up`, a resize never feeds scrollback (xterm does not either).
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let rows = rows.max(1);
        let cols = cols.max(1);
        if rows == self.rows && cols == self.cols {
            return;
        }

        for row in &mut self.cells {
            row.resize(cols, Cell::default());
        }
        if rows > self.cells.len() {
            for _ in self.cells.len()..rows {
                self.cells.push(Self::blank_row(cols));
            }
        } else {
            self.cells.truncate(rows);
        }

        self.tab_stops = Self::default_tab_stops(cols);
        self.dirty_rows = vec![true; rows];
        self.rows = rows;
        self.cols = cols;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.cursor.row = self.cursor.row.min(rows - 1);
        self.cursor.col = self.cursor.col.min(cols - 1);
        self.wrap_pending = false;
    }

    // -- text extraction (debugging / tests) ---------------------------------

    pub fn row_to_string(&self, row: usize) -> String {
        self.cells
            .get(row)
            .map(|cells| {
                cells
                    .iter()
                    .filter(|c| c.width != 0)
                    .map(|c| c.ch)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    pub fn content_to_string(&self) -> String {
        (0..self.rows)
            .map(|r| self.row_to_string(r))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_char_advances_cursor() {
        let mut g = Grid::new(5, 10);
        g.put_char('a');
        g.put_char('b');
        assert_eq!(g.cursor.col, 2);
        assert_eq!(g.row_to_string(0), "ab");
    }

    #[test]
    fn put_char_wraps_at_right_edge() {
        let mut g = Grid::new(5, 3);
        g.put_char('a');
        g.put_char('b');
        g.put_char('c');
        g.put_char('d');
        assert_eq!(g.cursor.row, 1);
        assert_eq!(g.row_to_string(0), "abc");
        assert_eq!(g.row_to_string(1), "d");
    }

    #[test]
    fn wide_char_occupies_two_columns() {
        let mut g = Grid::new(3, 10);
        g.put_char('\u{4e2d}'); // wide CJK char
        assert_eq!(g.cursor.col, 2);
        assert_eq!(g.cell(0, 0).unwrap().width, 2);
        assert_eq!(g.cell(0, 1).unwrap().width, 0);
    }

    #[test]
    fn newline_scrolls_at_bottom_of_region() {
        let mut g = Grid::new(2, 3);
        g.put_char('a');
        g.newline();
        g.put_char('b');
        g.newline();
        g.put_char('c');
        assert_eq!(g.row_to_string(0), "b");
        assert_eq!(g.row_to_string(1), "c");
    }

    #[test]
    fn scroll_up_evicts_into_buffer() {
        let mut g = Grid::new(2, 3);
        g.put_char('a');
        g.newline();
        g.put_char('b');
        g.newline();
        g.put_char('c');
        assert_eq!(g.evicted.len(), 1);
        assert_eq!(
            g.evicted[0].iter().map(|c| c.ch).collect::<String>().trim(),
            "a"
        );
    }

    #[test]
    fn scroll_down_reclaims_the_line_scroll_up_evicted() {
        let mut g = Grid::new(2, 3);
        g.put_char('a');
        g.newline();
        g.put_char('b');
        g.newline();
        g.put_char('c');
        // "a" scrolled off the top into scrollback; row 0 now holds "b".
        assert_eq!(g.row_to_string(0), "b");
        g.scroll_down(1);
        assert_eq!(g.row_to_string(0).trim_end(), "a");
        assert_eq!(g.popped.last().unwrap().as_ref().unwrap()[0].ch, 'a');
        assert!(g.scrollback().is_empty());
    }

    #[test]
    fn scroll_down_with_empty_scrollback_inserts_a_blank_row() {
        let mut g = Grid::new(3, 3);
        g.put_char('x');
        g.scroll_down(1);
        assert_eq!(g.row_to_string(0).trim_end(), "");
        assert_eq!(g.popped.last().unwrap(), &None);
    }

    #[test]
    fn cursor_always_in_bounds_after_relative_move() {
        let mut g = Grid::new(5, 5);
        g.move_cursor_relative(-100, -100);
        assert_eq!((g.cursor.row, g.cursor.col), (0, 0));
        g.move_cursor_relative(100, 100);
        assert_eq!((g.cursor.row, g.cursor.col), (4, 4));
    }

    #[test]
    fn erase_in_display_mode_2_clears_everything() {
        let mut g = Grid::new(3, 3);
        g.put_char('x');
        g.erase_in_display(2);
        assert_eq!(g.content_to_string(), "\n\n");
    }

    #[test]
    fn resize_truncates_and_clamps_cursor() {
        let mut g = Grid::new(5, 5);
        g.move_cursor(4, 4);
        g.resize(2, 2);
        assert_eq!(g.rows(), 2);
        assert_eq!(g.cols(), 2);
        assert_eq!((g.cursor.row, g.cursor.col), (1, 1));
    }

    #[test]
    fn resize_is_idempotent() {
        let mut g1 = Grid::new(10, 10);
        g1.put_char('x');
        g1.resize(6, 20);
        g1.resize(6, 20);
        let mut g2 = Grid::new(10, 10);
        g2.put_char('x');
        g2.resize(6, 20);
        assert_eq!(g1.content_to_string(), g2.content_to_string());
    }

    #[test]
    fn alternate_screen_round_trips_main_buffer() {
        let mut g = Grid::new(3, 3);
        g.put_char('x');
        g.enter_alternate_screen();
        assert_eq!(g.row_to_string(0), "");
        g.put_char('y');
        g.exit_alternate_screen();
        assert_eq!(g.row_to_string(0), "x");
    }

    #[test]
    fn tab_stops_every_eight_by_default() {
        let mut g = Grid::new(3, 20);
        g.tab();
        assert_eq!(g.cursor.col, 8);
        g.tab();
        assert_eq!(g.cursor.col, 16);
    }

    #[test]
    fn save_restore_cursor() {
        let mut g = Grid::new(5, 5);
        g.move_cursor(2, 2);
        g.save_cursor();
        g.move_cursor(0, 0);
        g.restore_cursor();
        assert_eq!((g.cursor.row, g.cursor.col), (2, 2));
    }

    #[test]
    fn get_cell_is_total_over_grid() {
        let g = Grid::new(4, 4);
        for r in 0..4 {
            for c in 0..4 {
                assert!(g.cell(r, c).is_some());
            }
        }
        assert!(g.cell(4, 0).is_none());
        assert!(g.cell(0, 4).is_none());
    }
}
