//! Mode S parity: CRC-24 checksum and 1-2 bit error correction.
//!
//! The checksum is the XOR of a fixed per-bit parity table over every set
//! bit of the data field. The last 24 table entries are zero, so the parity
//! field itself never contributes.
//!
//! For DF11/17: the trailing 24 bits are the checksum itself.
//! For DF0/4/5/16/20/21: the trailing 24 bits are checksum XOR ICAO address.

use crate::types::{LONG_MSG_BITS, LONG_MSG_BYTES};

// ---------------------------------------------------------------------------
// Parity table
// ---------------------------------------------------------------------------

/// One entry per bit of a 112-bit message. 56-bit messages use the final
/// 56 entries.
pub const CHECKSUM_TABLE: [u32; LONG_MSG_BITS] = [
    0x3935ea, 0x1c9af5, 0xf1b77e, 0x78dbbf, 0xc397db, 0x9e31e9, 0xb0e2f0, 0x587178,
    0x2c38bc, 0x161c5e, 0x0b0e2f, 0xfa7d13, 0x82c48d, 0xbe9842, 0x5f4c21, 0xd05c14,
    0x682e0a, 0x341705, 0xe5f186, 0x72f8c3, 0xc68665, 0x9cb936, 0x4e5c9b, 0xd8d449,
    0x939020, 0x49c810, 0x24e408, 0x127204, 0x093902, 0x049c81, 0xfdb444, 0x7eda22,
    0x3f6d11, 0xe04c8c, 0x702646, 0x381323, 0xe3f395, 0x8e03ce, 0x4701e7, 0xdc7af7,
    0x91c77f, 0xb719bb, 0xa476d9, 0xadc168, 0x56e0b4, 0x2b705a, 0x15b82d, 0xf52612,
    0x7a9309, 0xc2b380, 0x6159c0, 0x30ace0, 0x185670, 0x0c2b38, 0x06159c, 0x030ace,
    0x018567, 0xff38b7, 0x80665f, 0xbfc92b, 0xa01e91, 0xaff54c, 0x57faa6, 0x2bfd53,
    0xea04ad, 0x8af852, 0x457c29, 0xdd4410, 0x6ea208, 0x375104, 0x1ba882, 0x0dd441,
    0xf91024, 0x7c8812, 0x3e4409, 0xe0d800, 0x706c00, 0x383600, 0x1c1b00, 0x0e0d80,
    0x0706c0, 0x038360, 0x01c1b0, 0x00e0d8, 0x00706c, 0x003836, 0x001c1b, 0xfff409,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
];

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

#[inline]
fn bit_is_set(msg: &[u8], bit: usize) -> bool {
    msg[bit / 8] & (1 << (7 - (bit % 8))) != 0
}

#[inline]
fn flip_bit(msg: &mut [u8], bit: usize) {
    msg[bit / 8] ^= 1 << (7 - (bit % 8));
}

/// Compute the 24-bit checksum of the first `bits` bits of `msg`.
///
/// `bits` is 56 or 112 and `msg` must hold at least `bits / 8` bytes.
pub fn checksum(msg: &[u8], bits: usize) -> u32 {
    let offset = LONG_MSG_BITS - bits;
    (0..bits)
        .filter(|&j| bit_is_set(msg, j))
        .fold(0, |crc, j| crc ^ CHECKSUM_TABLE[j + offset])
}

/// The trailing 24-bit parity field of a `bits`-long message.
pub fn parity_field(msg: &[u8], bits: usize) -> u32 {
    let n = bits / 8;
    (msg[n - 3] as u32) << 16 | (msg[n - 2] as u32) << 8 | msg[n - 1] as u32
}

/// True when the parity field matches the computed checksum.
pub fn is_valid(msg: &[u8], bits: usize) -> bool {
    parity_field(msg, bits) == checksum(msg, bits)
}

// ---------------------------------------------------------------------------
// Error correction
// ---------------------------------------------------------------------------

fn scratch(msg: &[u8], bits: usize) -> [u8; LONG_MSG_BYTES] {
    let mut buf = [0u8; LONG_MSG_BYTES];
    let n = bits / 8;
    buf[..n].copy_from_slice(&msg[..n]);
    buf
}

/// Try every single-bit flip, lowest index first.
///
/// Returns the flipped bit index and the corrected copy. `msg` is never
/// modified; on `None` nothing was found.
pub fn fix_single_bit(msg: &[u8], bits: usize) -> Option<(usize, [u8; LONG_MSG_BYTES])> {
    let original = scratch(msg, bits);
    for j in 0..bits {
        let mut aux = original;
        flip_bit(&mut aux, j);
        if is_valid(&aux, bits) {
            return Some((j, aux));
        }
    }
    None
}

/// Try every unordered pair of bit flips `i < j`.
///
/// O(bits²): 6216 trials for a 112-bit message, so callers gate it behind
/// aggressive mode.
pub fn fix_two_bits(
    msg: &[u8],
    bits: usize,
) -> Option<((usize, usize), [u8; LONG_MSG_BYTES])> {
    let original = scratch(msg, bits);
    for i in 0..bits {
        let mut first = original;
        flip_bit(&mut first, i);
        for j in (i + 1)..bits {
            let mut aux = first;
            flip_bit(&mut aux, j);
            if is_valid(&aux, bits) {
                return Some(((i, j), aux));
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hex_decode;

    const VALID_FRAMES: &[&str] = &[
        "8D4840D6202CC371C32CE0576098",
        "8D40621D58C382D690C8AC2863A7",
        "8D485020994409940838175B284F",
        "8D406B902015A678D4D220AA4BDA",
    ];

    /// Bytewise polynomial division with generator 0xFFF409.
    fn crc24_reference(data: &[u8]) -> u32 {
        let mut crc = 0u32;
        for &byte in data {
            crc ^= (byte as u32) << 16;
            for _ in 0..8 {
                crc <<= 1;
                if crc & 0x1000000 != 0 {
                    crc ^= 0x1FFF409;
                }
            }
        }
        crc & 0xFFFFFF
    }

    fn frame(hex: &str) -> Vec<u8> {
        hex_decode(hex).unwrap()
    }

    #[test]
    fn test_valid_df17_checksum_matches_field() {
        for hex in VALID_FRAMES {
            let data = frame(hex);
            assert!(is_valid(&data, 112), "checksum mismatch for {hex}");
        }
    }

    #[test]
    fn test_checksum_deterministic() {
        let data = frame(VALID_FRAMES[0]);
        assert_eq!(checksum(&data, 112), checksum(&data, 112));
    }

    #[test]
    fn test_table_matches_polynomial_division() {
        for hex in VALID_FRAMES {
            let data = frame(hex);
            assert_eq!(checksum(&data, 112), crc24_reference(&data[..11]));
        }
        let short = [0x5D, 0x48, 0x40, 0xD6, 0, 0, 0];
        assert_eq!(checksum(&short, 56), crc24_reference(&short[..4]));
    }

    #[test]
    fn test_parity_field_ignored_by_checksum() {
        let mut data = frame(VALID_FRAMES[1]);
        let before = checksum(&data, 112);
        data[13] ^= 0xFF;
        data[11] ^= 0x0F;
        assert_eq!(checksum(&data, 112), before);
    }

    #[test]
    fn test_short_frame_uses_table_tail() {
        // Bit 0 of a 56-bit frame maps to entry 56.
        let msg = [0x80, 0, 0, 0, 0, 0, 0];
        assert_eq!(checksum(&msg, 56), CHECKSUM_TABLE[56]);
    }

    #[test]
    fn test_single_bit_roundtrip_every_position() {
        let original = frame(VALID_FRAMES[0]);
        for bit in 0..112 {
            let mut corrupted = original.clone();
            flip_bit(&mut corrupted, bit);
            let (found, fixed) = fix_single_bit(&corrupted, 112).expect("fixable");
            assert_eq!(found, bit);
            assert_eq!(&fixed[..], &original[..]);
        }
    }

    #[test]
    fn test_single_bit_leaves_input_untouched() {
        let mut corrupted = frame(VALID_FRAMES[2]);
        corrupted[5] ^= 0x01;
        let copy = corrupted.clone();
        let _ = fix_single_bit(&corrupted, 112);
        assert_eq!(corrupted, copy);
    }

    #[test]
    fn test_single_bit_not_found_for_three_errors() {
        let mut corrupted = frame(VALID_FRAMES[0]);
        corrupted[4] ^= 0x80;
        corrupted[6] ^= 0x10;
        corrupted[9] ^= 0x02;
        assert!(fix_single_bit(&corrupted, 112).is_none());
    }

    #[test]
    fn test_two_bit_roundtrip() {
        let original = frame(VALID_FRAMES[1]);
        for &(i, j) in &[(0, 1), (5, 40), (33, 87), (60, 111), (100, 110)] {
            let mut corrupted = original.clone();
            flip_bit(&mut corrupted, i);
            flip_bit(&mut corrupted, j);
            let (pair, fixed) = fix_two_bits(&corrupted, 112).expect("fixable");
            assert_eq!(pair, (i, j));
            assert_eq!(&fixed[..], &original[..]);
        }
    }

    #[test]
    fn test_two_bit_on_short_frame() {
        let mut msg = [0x5D, 0xAA, 0xBB, 0xCC, 0, 0, 0];
        let crc = checksum(&msg, 56);
        msg[4] = (crc >> 16) as u8;
        msg[5] = (crc >> 8) as u8;
        msg[6] = crc as u8;
        let original = msg;
        flip_bit(&mut msg, 9);
        flip_bit(&mut msg, 30);
        let (pair, fixed) = fix_two_bits(&msg, 56).expect("fixable");
        assert_eq!(pair, (9, 30));
        assert_eq!(&fixed[..7], &original[..]);
    }
}
