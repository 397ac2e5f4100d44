//! Wraparound-safe sequence number arithmetic.
//!
//! Sequence numbers live in a 32-bit circular space: `u32::MAX` is
//! followed by `0`. Acceptance is exact-match against the expected
//! sequence, so the only arithmetic needed is the wrapping increment.

/// The sequence number following `seq`.
pub fn seq_next(seq: u32) -> u32 {
    seq.wrapping_add(1)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_next_advances_by_one() {
        assert_eq!(seq_next(0), 1);
        assert_eq!(seq_next(41), 42);
    }

    #[test]
    fn test_seq_next_wraps() {
        assert_eq!(seq_next(u32::MAX), 0);
    }
}
