//! Block compression/decompression.
//!
//! Block format (see [`sequence`](crate::sequence) for the byte layout):
//! - Sequences of (token, [literal_length_ext], literals, offset, [match_length_ext])
//! - Token: 4-bit literal length + 4-bit match length
//! - If a nibble is 15, additional bytes follow (add 255 until byte < 255)
//! - Offset: 2 bytes little-endian (match offset, 1-65535)
//! - Match length is +4 (minimum match = 4)
//! - The final sequence is literals only, closed by offset 0
//!
//! Every block is independent: offsets never reach outside the output the
//! block itself produced.

use crate::sequence::{
    END_MARKER, LAST_LITERALS, MAX_OFFSET, MF_LIMIT, MIN_INPUT_LENGTH, MIN_MATCH, RUN_MASK,
    compress_block_bound, count_match, read_u32, write_last_literals, write_sequence,
};
use hdrlz_core::error::{HdrLzError, Result};
use hdrlz_core::{MAX_INPUT_SIZE, check_input_size};

/// Hash table size log2.
const HASH_LOG: u32 = 14;

/// Hash table size (16K entries).
const HASH_SIZE: usize = 1 << HASH_LOG;

/// Marks an unused hash slot.
const EMPTY: u32 = u32::MAX;

/// Consecutive misses before the search step starts growing.
const SKIP_TRIGGER: usize = 6;

/// Upper bound on how much output a block may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLimit {
    /// The output must end up exactly this long; overshooting is a
    /// [`HdrLzError::LengthMismatch`].
    Declared(usize),
    /// The output may not grow past this size; overshooting is a
    /// [`HdrLzError::LengthOverflow`].
    Max(usize),
}

impl OutputLimit {
    /// Fail if the output would grow to `total` bytes.
    fn check(self, total: usize) -> Result<()> {
        match self {
            OutputLimit::Declared(expected) if total > expected => {
                Err(HdrLzError::length_mismatch(expected, total))
            }
            OutputLimit::Max(max) if total > max => {
                Err(HdrLzError::length_overflow(total as u64, max as u64))
            }
            _ => Ok(()),
        }
    }

    fn bound(self) -> usize {
        match self {
            OutputLimit::Declared(n) | OutputLimit::Max(n) => n,
        }
    }
}

/// Compress data into a single block.
pub fn compress_block(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(compress_block_bound(input.len()));
    compress_block_into(input, &mut output)?;
    Ok(output)
}

/// Compress data into a single block appended to `output`.
///
/// Returns the number of bytes written.
pub fn compress_block_into(input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
    check_input_size(input.len())?;

    let start = output.len();
    output.reserve(compress_block_bound(input.len()));
    BlockEncoder::new(input).encode(output);
    Ok(output.len() - start)
}

/// Decompress a block.
///
/// With `expected` set, the block must produce exactly that many bytes.
pub fn decompress_block(input: &[u8], expected: Option<usize>) -> Result<Vec<u8>> {
    let limit = match expected {
        Some(n) => OutputLimit::Declared(n),
        None => OutputLimit::Max(MAX_INPUT_SIZE),
    };

    let mut output = Vec::with_capacity(initial_capacity(input.len(), limit));
    decompress_block_into(input, &mut output, limit)?;

    if let Some(n) = expected {
        if output.len() != n {
            return Err(HdrLzError::length_mismatch(n, output.len()));
        }
    }
    Ok(output)
}

/// Decompress a block, appending to `output`.
///
/// `limit` applies to the total length of `output`, including bytes that
/// were already present. Returns the number of bytes appended.
pub fn decompress_block_into(
    input: &[u8],
    output: &mut Vec<u8>,
    limit: OutputLimit,
) -> Result<usize> {
    let start = output.len();
    BlockDecoder::new(input).decode(output, limit)?;
    Ok(output.len() - start)
}

/// Pre-allocation for a block, trusting a declared length only as far as the
/// input could plausibly expand.
pub(crate) fn initial_capacity(input_len: usize, limit: OutputLimit) -> usize {
    limit.bound().min(input_len.saturating_mul(4))
}

/// Fast block encoder.
///
/// Single-candidate hash table: each slot holds the newest position whose
/// 4-byte prefix hashed there.
struct BlockEncoder<'a> {
    input: &'a [u8],
    hash_table: Vec<u32>,
}

impl<'a> BlockEncoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            hash_table: vec![EMPTY; HASH_SIZE],
        }
    }

    /// Compute hash for 4 bytes.
    fn hash(sequence: u32) -> usize {
        (sequence.wrapping_mul(2654435761) >> (32 - HASH_LOG)) as usize
    }

    fn insert(&mut self, pos: usize) {
        let h = Self::hash(read_u32(self.input, pos));
        self.hash_table[h] = pos as u32;
    }

    /// Record `pos` and return the previous position if its 4 bytes match.
    fn find_candidate(&mut self, pos: usize) -> Option<usize> {
        let sequence = read_u32(self.input, pos);
        let slot = &mut self.hash_table[Self::hash(sequence)];
        let candidate = *slot;
        *slot = pos as u32;

        if candidate == EMPTY {
            return None;
        }
        let candidate = candidate as usize;
        (pos - candidate <= MAX_OFFSET && read_u32(self.input, candidate) == sequence)
            .then_some(candidate)
    }

    /// Encode the input data.
    fn encode(&mut self, output: &mut Vec<u8>) {
        let input = self.input;
        let len = input.len();

        if len < MIN_INPUT_LENGTH {
            write_last_literals(output, input);
            return;
        }

        let match_limit = len - LAST_LITERALS;
        let search_end = len - MF_LIMIT + 1;

        let mut pos = 0;
        let mut anchor = 0; // Start of current literal run
        let mut misses = 0usize;

        while pos < search_end {
            let Some(candidate) = self.find_candidate(pos) else {
                misses += 1;
                pos += 1 + (misses >> SKIP_TRIGGER);
                continue;
            };
            misses = 0;

            let (mut start, mut candidate) =
                self.lazy_match(pos, candidate, match_limit, search_end);

            // Extend backwards over pending literals
            while start > anchor && candidate > 0 && input[start - 1] == input[candidate - 1] {
                start -= 1;
                candidate -= 1;
            }

            let match_len = count_match(input, candidate, start, match_limit);
            write_sequence(output, &input[anchor..start], start - candidate, match_len);

            pos = start + match_len;
            anchor = pos;

            if pos < search_end {
                self.insert(pos - 2);
            }
        }

        write_last_literals(output, &input[anchor..]);
    }

    /// Prefer the match starting one byte later unless the current one is
    /// strictly longer; on a tie the current byte goes to the literal run.
    fn lazy_match(
        &mut self,
        pos: usize,
        candidate: usize,
        match_limit: usize,
        search_end: usize,
    ) -> (usize, usize) {
        let next = pos + 1;
        if next >= search_end {
            return (pos, candidate);
        }
        let Some(next_candidate) = self.find_candidate(next) else {
            return (pos, candidate);
        };

        let current = count_match(self.input, candidate, pos, match_limit);
        let deferred = count_match(self.input, next_candidate, next, match_limit);
        if deferred >= current {
            (next, next_candidate)
        } else {
            (pos, candidate)
        }
    }
}

/// Block decoder.
struct BlockDecoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> BlockDecoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Decode the block into output.
    fn decode(&mut self, output: &mut Vec<u8>, limit: OutputLimit) -> Result<()> {
        let base = output.len();

        loop {
            let token = self.read_byte()?;
            let literal_len = self.read_length((token >> 4) as usize)?;
            let match_code = (token & 0x0F) as usize;

            let literals = self.take(literal_len)?;
            limit.check(output.len() + literal_len)?;
            output.extend_from_slice(literals);

            let offset = self.read_u16_le()?;
            if offset == END_MARKER {
                if match_code != 0 {
                    return Err(self.corrupted("end marker carries a match length"));
                }
                if self.pos != self.input.len() {
                    return Err(self.corrupted("trailing bytes after end marker"));
                }
                return Ok(());
            }

            let offset = offset as usize;
            let match_len = self.read_length(match_code)? + MIN_MATCH;

            if offset > output.len() - base {
                return Err(self.corrupted("offset exceeds output"));
            }
            let end = output.len() + match_len;
            limit.check(end)?;

            // Byte-by-byte so an overlapping source sees bytes written by
            // this same copy.
            output.reserve(match_len);
            let start = output.len() - offset;
            for i in 0..match_len {
                let byte = output[start + i];
                output.push(byte);
            }
        }
    }

    fn corrupted(&self, message: &str) -> HdrLzError {
        HdrLzError::corrupted(self.pos as u64, message)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = *self
            .input
            .get(self.pos)
            .ok_or_else(|| self.corrupted("block ends before end marker"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let input = self.input;
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= input.len())
            .ok_or_else(|| self.corrupted("sequence runs past end of block"))?;
        let bytes = &input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_length(&mut self, base: usize) -> Result<usize> {
        let mut len = base;
        if base == RUN_MASK {
            loop {
                let b = self.read_byte()? as usize;
                len = len.saturating_add(b);
                if b != 255 {
                    break;
                }
            }
        }
        Ok(len)
    }
}
