//! Per-chunk tag record and its out-of-band encoding.
//!
//! On-flash layout (start of the tag region):
//!
//! ```text
//! offset  size  field
//! 0       4     sequence number (little-endian)
//! 4       1     flags, active-low: bit 0 clear = chunk used,
//!                                  bit 1 clear = block bad
//! 5       3     padding (0xFF)
//! ```
//!
//! Flags are active-low so an erased tag reads as unused and good, and
//! marking a block bad only ever clears bits.

/// Flag bit cleared when the chunk holds live data
const FLAG_USED: u8 = 1 << 0;
/// Flag bit cleared when the block is bad
const FLAG_BAD: u8 = 1 << 1;

/// Decoded tag of a single chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TagRecord {
    /// Sequence number assigned by the filesystem
    pub sequence_number: u32,
    /// Chunk holds data
    pub chunk_used: bool,
    /// Block has been retired
    pub block_bad: bool,
}

impl TagRecord {
    /// Encoded size in bytes
    pub const SIZE: usize = 8;

    /// Tag as read from an erased chunk
    pub const ERASED: Self = Self {
        sequence_number: u32::MAX,
        chunk_used: false,
        block_bad: false,
    };

    /// Tag for a freshly written chunk
    pub const fn used(sequence_number: u32) -> Self {
        Self {
            sequence_number,
            chunk_used: true,
            block_bad: false,
        }
    }

    /// Pack into the on-flash representation.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut raw = [0xFF; Self::SIZE];
        raw[..4].copy_from_slice(&self.sequence_number.to_le_bytes());
        if self.chunk_used {
            raw[4] &= !FLAG_USED;
        }
        if self.block_bad {
            raw[4] &= !FLAG_BAD;
        }
        raw
    }

    /// Unpack from the on-flash representation.
    pub fn decode(raw: &[u8; Self::SIZE]) -> Self {
        Self {
            sequence_number: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            chunk_used: raw[4] & FLAG_USED == 0,
            block_bad: raw[4] & FLAG_BAD == 0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_flags() {
        for seq in [0, 1, 0x1234_5678, u32::MAX] {
            for used in [false, true] {
                for bad in [false, true] {
                    let tag = TagRecord { sequence_number: seq, chunk_used: used, block_bad: bad };
                    assert_eq!(TagRecord::decode(&tag.encode()), tag);
                }
            }
        }
    }

    #[test]
    fn test_erased_decodes_unused() {
        let tag = TagRecord::decode(&[0xFF; TagRecord::SIZE]);
        assert_eq!(tag, TagRecord::ERASED);
        assert_eq!(TagRecord::ERASED.encode(), [0xFF; TagRecord::SIZE]);
    }

    #[test]
    fn test_encoding_layout() {
        let raw = TagRecord::used(0x0102_0304).encode();
        assert_eq!(&raw[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(raw[4], 0xFE);
        assert_eq!(&raw[5..], &[0xFF; 3]);
    }

    #[test]
    fn test_marking_bad_only_clears_bits() {
        let good = TagRecord::used(42);
        let bad = TagRecord { block_bad: true, ..good };
        for (before, after) in good.encode().iter().zip(bad.encode().iter()) {
            assert_eq!(before & after, *after);
        }
    }
}
