//! High-compression block encoder.
//!
//! Trades compression speed for ratio. Instead of one candidate per hash
//! slot it keeps a chain of earlier positions with the same hash and walks
//! it for the longest match, up to a level-dependent number of attempts.
//! Output uses the same block format as the fast encoder, so
//! [`decompress_block`](crate::decompress_block) reads both.

use crate::sequence::{
    LAST_LITERALS, MAX_OFFSET, MF_LIMIT, MIN_INPUT_LENGTH, MIN_MATCH, compress_block_bound,
    count_match, read_u32, write_last_literals, write_sequence,
};
use hdrlz_core::check_input_size;
use hdrlz_core::error::Result;

/// HC compression level (1-12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub struct HcLevel(u8);

impl HcLevel {
    /// Minimum HC compression level.
    pub const MIN: Self = Self(1);
    /// Default HC compression level.
    pub const DEFAULT: Self = Self(9);
    /// Maximum HC compression level.
    pub const MAX: Self = Self(12);

    /// Create a new compression level.
    ///
    /// Returns None if level is outside 1-12 range.
    pub fn new(level: u8) -> Option<Self> {
        (1..=12).contains(&level).then_some(Self(level))
    }

    /// Get the level value.
    pub fn level(self) -> u8 {
        self.0
    }

    /// Maximum number of chain entries examined per position.
    fn max_attempts(self) -> usize {
        match self.0 {
            1..=3 => 16,
            4..=6 => 64,
            7..=9 => 256,
            10..=11 => 1024,
            _ => 4096,
        }
    }
}

impl Default for HcLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for HcLevel {
    type Error = String;

    fn try_from(level: u8) -> std::result::Result<Self, Self::Error> {
        Self::new(level).ok_or_else(|| format!("HC level {level} outside 1-12"))
    }
}

impl From<HcLevel> for u8 {
    fn from(level: HcLevel) -> Self {
        level.0
    }
}

/// Hash table size (must be power of 2).
const HASH_SIZE: usize = 1 << 15;

/// Chain table size; covers the whole 64K window.
const CHAIN_SIZE: usize = 1 << 16;

/// Marks an unused slot.
const EMPTY: u32 = u32::MAX;

/// Stop searching once a match is this long.
const GOOD_ENOUGH: usize = 1024;

/// HC encoder.
///
/// Tables are reset at the start of every [`compress`](Self::compress) call,
/// so an encoder can be reused but carries nothing between inputs.
pub struct HcEncoder {
    level: HcLevel,
    hash_table: Vec<u32>,
    chain_table: Vec<u32>,
}

impl HcEncoder {
    /// Create a new HC encoder with default compression level.
    pub fn new() -> Self {
        Self::with_level(HcLevel::default())
    }

    /// Create a new HC encoder with specific compression level.
    pub fn with_level(level: HcLevel) -> Self {
        Self {
            level,
            hash_table: vec![EMPTY; HASH_SIZE],
            chain_table: vec![EMPTY; CHAIN_SIZE],
        }
    }

    /// The configured level.
    pub fn level(&self) -> HcLevel {
        self.level
    }

    #[inline]
    fn hash4(data: &[u8], pos: usize) -> usize {
        (read_u32(data, pos).wrapping_mul(2654435761) >> 17) as usize & (HASH_SIZE - 1)
    }

    /// Insert position into hash table and chain.
    #[inline]
    fn insert_position(&mut self, input: &[u8], pos: usize) {
        let h = Self::hash4(input, pos);
        self.chain_table[pos & (CHAIN_SIZE - 1)] = self.hash_table[h];
        self.hash_table[h] = pos as u32;
    }

    /// Longest match for `pos` among earlier positions, as (offset, length).
    fn find_best_match(
        &self,
        input: &[u8],
        pos: usize,
        match_limit: usize,
    ) -> Option<(usize, usize)> {
        let mut candidate = self.hash_table[Self::hash4(input, pos)];
        let mut best_len = MIN_MATCH - 1;
        let mut best_offset = 0;

        for _ in 0..self.level.max_attempts() {
            if candidate == EMPTY {
                break;
            }
            let match_pos = candidate as usize;
            if match_pos >= pos || pos - match_pos > MAX_OFFSET {
                break;
            }

            // Quick reject on the byte that would extend the best match;
            // pos + best_len never passes match_limit.
            if input[match_pos + best_len] == input[pos + best_len] {
                let len = count_match(input, match_pos, pos, match_limit);
                if len > best_len {
                    best_len = len;
                    best_offset = pos - match_pos;
                    if len >= GOOD_ENOUGH {
                        break;
                    }
                }
            }

            candidate = self.chain_table[match_pos & (CHAIN_SIZE - 1)];
        }

        (best_len >= MIN_MATCH).then_some((best_offset, best_len))
    }

    /// Compress `input` into a block appended to `output`.
    pub fn compress_into(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        check_input_size(input.len())?;

        let start = output.len();
        output.reserve(compress_block_bound(input.len()));

        let len = input.len();
        if len < MIN_INPUT_LENGTH {
            write_last_literals(output, input);
            return Ok(output.len() - start);
        }

        self.hash_table.fill(EMPTY);
        self.chain_table.fill(EMPTY);

        let match_limit = len - LAST_LITERALS;
        let search_end = len - MF_LIMIT + 1;
        let mut pos = 0;
        let mut anchor = 0;

        while pos < search_end {
            match self.find_best_match(input, pos, match_limit) {
                Some((offset, match_len)) => {
                    write_sequence(output, &input[anchor..pos], offset, match_len);

                    let end = pos + match_len;
                    for p in pos..end.min(search_end) {
                        self.insert_position(input, p);
                    }
                    pos = end;
                    anchor = pos;
                }
                None => {
                    self.insert_position(input, pos);
                    pos += 1;
                }
            }
        }

        write_last_literals(output, &input[anchor..]);
        Ok(output.len() - start)
    }

    /// Compress `input` into a new block.
    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.compress_into(input, &mut output)?;
        Ok(output)
    }
}

impl Default for HcEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compress data into a block using HC with the default level.
pub fn compress_hc_block(input: &[u8]) -> Result<Vec<u8>> {
    HcEncoder::new().compress(input)
}

/// Compress data into a block using HC with a specific level.
pub fn compress_hc_block_level(input: &[u8], level: HcLevel) -> Result<Vec<u8>> {
    HcEncoder::with_level(level).compress(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::tests::{matches, pseudo_random};
    use crate::{compress_block, decompress_block};

    #[test]
    fn test_hc_level() {
        assert!(HcLevel::new(0).is_none());
        assert!(HcLevel::new(1).is_some());
        assert!(HcLevel::new(12).is_some());
        assert!(HcLevel::new(13).is_none());
        assert_eq!(HcLevel::default(), HcLevel::DEFAULT);
    }

    #[test]
    fn test_hc_roundtrip_simple() {
        let data = b"Hello, World! Hello, World!";
        let compressed = compress_hc_block(data).expect("compress failed");
        let decompressed =
            decompress_block(&compressed, Some(data.len())).expect("decompress failed");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_hc_roundtrip_repeated() {
        let data = [b'A'; 64];
        let compressed = compress_hc_block(&data).expect("compress failed");
        assert!(
            compressed.len() < data.len(),
            "compressed: {}, original: {}",
            compressed.len(),
            data.len()
        );
        let decompressed =
            decompress_block(&compressed, Some(data.len())).expect("decompress failed");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_hc_empty() {
        let compressed = compress_hc_block(b"").expect("compress failed");
        assert_eq!(compressed, [0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_hc_levels() {
        let data = b"The quick brown fox jumps over the lazy dog. ".repeat(100);

        for level in [1, 6, 9, 12] {
            let hc_level = HcLevel::new(level).expect("valid level");
            let compressed = compress_hc_block_level(&data, hc_level)
                .unwrap_or_else(|_| panic!("level {} failed", level));
            let decompressed =
                decompress_block(&compressed, Some(data.len())).expect("decompress failed");
            assert_eq!(decompressed, data);
        }
    }

    #[test]
    fn test_hc_vs_fast() {
        // HC should achieve compression at least as good as fast mode
        let data = b"The quick brown fox jumps over the lazy dog repeatedly. ".repeat(50);

        let fast = compress_block(&data).expect("fast compress failed");
        let hc = compress_hc_block_level(&data, HcLevel::MAX).expect("hc compress failed");

        assert_eq!(decompress_block(&fast, Some(data.len())).unwrap(), data);
        assert_eq!(decompress_block(&hc, Some(data.len())).unwrap(), data);
        assert!(hc.len() <= fast.len(), "HC: {}, Fast: {}", hc.len(), fast.len());
    }

    #[test]
    fn test_hc_match_invariants() {
        let mut data = b"The quick brown fox jumps over the lazy dog. ".repeat(2000);
        data.extend(pseudo_random(3_000, 99));
        data.extend(b"The quick brown fox jumps over the lazy".iter());

        for level in [HcLevel::MIN, HcLevel::MAX] {
            let compressed = compress_hc_block_level(&data, level).unwrap();
            let (found, produced) = matches(&compressed);
            assert_eq!(produced, data.len());
            assert!(!found.is_empty());
            for (at, offset, len) in found {
                assert!(offset >= 1 && offset <= MAX_OFFSET.min(at));
                assert!(len >= MIN_MATCH);
                assert!(at <= data.len() - MF_LIMIT);
                assert!(at + len <= data.len() - LAST_LITERALS);
            }
        }
    }

    #[test]
    fn test_hc_encoder_reuse() {
        let mut encoder = HcEncoder::with_level(HcLevel::MIN);
        let first: Vec<u8> = (0..10000).map(|i| ((i * 17 + 13) % 256) as u8).collect();
        let second = b"completely different input, completely different".to_vec();

        let a = encoder.compress(&first).unwrap();
        let b = encoder.compress(&second).unwrap();
        assert_eq!(decompress_block(&a, Some(first.len())).unwrap(), first);
        assert_eq!(decompress_block(&b, Some(second.len())).unwrap(), second);
        assert_eq!(b, HcEncoder::with_level(HcLevel::MIN).compress(&second).unwrap());
    }
}
