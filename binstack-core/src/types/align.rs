//! Integer rounding to power-of-two alignments.

/// Alignment of every allocation payload, in bytes.
///
/// Part of the wire format: buffers produced on one device are re-walked on
/// another by re-deriving aligned positions.
pub const MEMORY_ALIGNMENT: usize = 16;

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[must_use]
pub const fn round_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Round `value` down to the previous multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[must_use]
pub const fn round_down(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

/// Check whether `value` is a multiple of `alignment`.
#[must_use]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    round_down(value, alignment) == value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_to_alignment() {
        assert_eq!(round_up(0, 16), 0);
        assert_eq!(round_up(1, 16), 16);
        assert_eq!(round_up(16, 16), 16);
        assert_eq!(round_up(17, 16), 32);
        assert_eq!(round_up(5, 4), 8);
    }

    #[test]
    fn round_down_to_alignment() {
        assert_eq!(round_down(0, 16), 0);
        assert_eq!(round_down(15, 16), 0);
        assert_eq!(round_down(16, 16), 16);
        assert_eq!(round_down(47, 16), 32);
    }

    #[test]
    fn aligned_check() {
        assert!(is_aligned(0, MEMORY_ALIGNMENT));
        assert!(is_aligned(48, MEMORY_ALIGNMENT));
        assert!(!is_aligned(50, MEMORY_ALIGNMENT));
    }
}
