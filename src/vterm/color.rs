//! Cell color model: default terminal color, 8-bit indexed, or 24-bit RGB.

/// A single foreground or background color as carried by a terminal cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Color {
    /// The terminal's default fg/bg, reset by SGR 39/49.
    #[default]
    Default,
    /// An indexed color from the 256-color palette (SGR `38;5;n` / `48;5;n`,
    /// and the basic 30-37/40-47 and bright 90-97/100-107 ranges folded in).
    Indexed(u8),
    /// A 24-bit truecolor value (SGR `38;2;r;g;b` / `48;2;r;g;b`).
    Rgb(u8, u8, u8),
}

/// Style bits set by SGR, independent of color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Attrs {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub inverse: bool,
    pub hidden: bool,
    pub strikethrough: bool,
}

impl Attrs {
    /// Reset to the terminal's default attributes (SGR 0), as used by `ED`/`EL`
    /// fill cells and by `Grid::reset`.
    pub fn reset(&mut self) {
        *self = Attrs::default();
    }
}
