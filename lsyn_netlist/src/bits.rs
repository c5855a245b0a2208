use contracts::*;

/// Widest signal the IR can carry; values are stored in a `u64`.
pub const MAX_WIDTH: u32 = 64;

/// All-ones mask for a signal of `width` bits.
#[requires((1..=MAX_WIDTH).contains(&width))]
#[must_use]
pub fn mask(width: u32) -> u64 {
    if width >= MAX_WIDTH {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}
