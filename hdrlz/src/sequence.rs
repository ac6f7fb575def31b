//! Token layout shared by the fast and HC encoders.
//!
//! A block is a run of sequences:
//!
//! ```text
//! ┌───────┬─────────────┬──────────┬────────┬───────────┐
//! │ token │ lit len ext │ literals │ offset │ match ext │
//! │ 1 B   │ 0-n B       │ n B      │ 2 B LE │ 0-n B     │
//! └───────┴─────────────┴──────────┴────────┴───────────┘
//! ```
//!
//! The token's high nibble is the literal length, the low nibble the match
//! length minus [`MIN_MATCH`]. A nibble of 15 is followed by bytes of 255
//! until a byte below 255 ends the count. The last sequence of every block
//! carries offset 0 (the end marker) and no match length.

/// Minimum match length.
pub(crate) const MIN_MATCH: usize = 4;

/// Maximum back-reference distance (16-bit offset).
pub(crate) const MAX_OFFSET: usize = 65535;

/// The last bytes of a block that are always literals.
pub(crate) const LAST_LITERALS: usize = 5;

/// No match may start within this many bytes of the block end.
pub(crate) const MF_LIMIT: usize = 12;

/// Blocks shorter than this are emitted as a single literal run.
pub(crate) const MIN_INPUT_LENGTH: usize = MF_LIMIT + 1;

/// Nibble value signalling that extension bytes follow.
pub(crate) const RUN_MASK: usize = 15;

/// Offset value closing a block.
pub(crate) const END_MARKER: u16 = 0;

/// Worst-case compressed size of a block holding `len` bytes.
pub fn compress_block_bound(len: usize) -> usize {
    // token + one spare extension byte + end marker
    len + len / 255 + 4
}

/// Append a literal run followed by a match.
pub(crate) fn write_sequence(
    output: &mut Vec<u8>,
    literals: &[u8],
    offset: usize,
    match_len: usize,
) {
    debug_assert!((1..=MAX_OFFSET).contains(&offset));
    debug_assert!(match_len >= MIN_MATCH);

    let match_code = match_len - MIN_MATCH;
    output.push(token(literals.len(), match_code));
    write_literals(output, literals);

    output.extend_from_slice(&(offset as u16).to_le_bytes());
    if match_code >= RUN_MASK {
        write_length_ext(output, match_code - RUN_MASK);
    }
}

/// Append the closing literal run and the end marker.
pub(crate) fn write_last_literals(output: &mut Vec<u8>, literals: &[u8]) {
    output.push(token(literals.len(), 0));
    write_literals(output, literals);
    output.extend_from_slice(&END_MARKER.to_le_bytes());
}

fn token(literal_len: usize, match_code: usize) -> u8 {
    ((literal_len.min(RUN_MASK) << 4) | match_code.min(RUN_MASK)) as u8
}

fn write_literals(output: &mut Vec<u8>, literals: &[u8]) {
    if literals.len() >= RUN_MASK {
        write_length_ext(output, literals.len() - RUN_MASK);
    }
    output.extend_from_slice(literals);
}

fn write_length_ext(output: &mut Vec<u8>, mut remaining: usize) {
    while remaining >= 255 {
        output.push(255);
        remaining -= 255;
    }
    output.push(remaining as u8);
}

/// Read 4 bytes as u32 (little-endian). Caller guarantees `pos + 4 <= data.len()`.
#[inline]
pub(crate) fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// Count equal bytes at `candidate` and `pos`, stopping before `limit`.
#[inline]
pub(crate) fn count_match(data: &[u8], candidate: usize, pos: usize, limit: usize) -> usize {
    data[pos..limit]
        .iter()
        .zip(&data[candidate..])
        .take_while(|(a, b)| a == b)
        .count()
}
