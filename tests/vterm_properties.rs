//! Property tests for the VT100 emulator's core invariants: chunk
//! associativity, cell-access totality, resize idempotence, and
//! cursor-in-bounds. These are the `proptest`-backed counterparts to the
//! example-based assertions colocated in `src/vterm/mod.rs` and
//! `src/vterm/grid.rs` — randomized over the input space those fixed
//! examples only sample a few points of.

use devterm::vterm::Term;
use proptest::prelude::*;

/// Printable ASCII plus the handful of control bytes the parser treats
/// specially (CR, LF, TAB, BS, ESC, BEL) — a byte space rich enough to
/// exercise cursor movement, wrapping, and scroll eviction without
/// spending most of the input budget on arbitrary CSI garbage that the
/// parser trivially rejects as a no-op either way.
fn byte_strategy() -> impl Strategy<Value = u8> {
    prop_oneof![
        3 => 0x20u8..=0x7e,
        1 => Just(b'\r'),
        1 => Just(b'\n'),
        1 => Just(b'\t'),
        1 => Just(0x08u8),
    ]
}

fn bytes_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(byte_strategy(), 0..max_len)
}

proptest! {
    /// `write(vt, A); write(vt, B)` yields the same grid as
    /// `write(vt, A ++ B)` for any split of a byte sequence into two chunks.
    #[test]
    fn write_is_associative_over_arbitrary_splits(
        bytes in bytes_strategy(200),
        split in 0usize..200,
    ) {
        let split = split.min(bytes.len());

        let mut chunked = Term::new(8, 24);
        chunked.write(&bytes[..split]);
        chunked.write(&bytes[split..]);

        let mut whole = Term::new(8, 24);
        whole.write(&bytes);

        prop_assert_eq!(chunked.grid().content_to_string(), whole.grid().content_to_string());
        prop_assert_eq!(chunked.cursor(), whole.cursor());
    }

    /// `get_cell` is total over `0..rows x 0..cols` and `None` outside it,
    /// regardless of what has been written to the grid.
    #[test]
    fn get_cell_is_total_and_bounds_exact(
        bytes in bytes_strategy(200),
        rows in 1usize..20,
        cols in 1usize..40,
    ) {
        let mut term = Term::new(rows, cols);
        term.write(&bytes);

        for r in 0..rows {
            for c in 0..cols {
                prop_assert!(term.get_cell(r, c).is_some());
            }
        }
        prop_assert!(term.get_cell(rows, 0).is_none());
        prop_assert!(term.get_cell(0, cols).is_none());
    }

    /// Resizing to the same target twice is equivalent to resizing once.
    #[test]
    fn resize_is_idempotent(
        bytes in bytes_strategy(150),
        new_rows in 1usize..20,
        new_cols in 1usize..40,
    ) {
        let mut once = Term::new(10, 30);
        once.write(&bytes);
        once.set_size(new_rows, new_cols);

        let mut twice = Term::new(10, 30);
        twice.write(&bytes);
        twice.set_size(new_rows, new_cols);
        twice.set_size(new_rows, new_cols);

        prop_assert_eq!(once.grid().content_to_string(), twice.grid().content_to_string());
        prop_assert_eq!(once.cursor(), twice.cursor());
    }

    /// The cursor never escapes the visible grid, no matter what byte
    /// stream drove it there.
    #[test]
    fn cursor_stays_in_bounds(
        bytes in bytes_strategy(300),
        rows in 1usize..20,
        cols in 1usize..40,
    ) {
        let mut term = Term::new(rows, cols);
        term.write(&bytes);
        let cursor = term.cursor();
        prop_assert!(cursor.row < rows);
        prop_assert!(cursor.col < cols);
    }
}
