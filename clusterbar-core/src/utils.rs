/// Eighth-block glyphs used for the partially filled cell of a bar
const PARTIAL_BLOCKS: [char; 7] = ['▏', '▎', '▍', '▌', '▋', '▊', '▉'];

/// How a fraction maps onto a fixed-width bar of block characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarSegments {
    pub full: usize,
    pub partial: Option<char>,
    pub empty: usize,
}

/// Splits `width` cells into full, partial and empty cells for `fraction` (clamped to 0..=1)
///
/// Each cell has eight sub-steps, rounded to the closest one.
pub fn bar_segments(width: usize, fraction: f64) -> BarSegments {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let filled_eighths = (width as f64 * 8.0 * fraction).round() as usize;

    let full = filled_eighths / 8;
    let remainder = filled_eighths % 8;
    let partial = (remainder > 0).then(|| PARTIAL_BLOCKS[remainder - 1]);
    let empty = width.saturating_sub(full + usize::from(partial.is_some()));

    BarSegments {
        full,
        partial,
        empty,
    }
}
