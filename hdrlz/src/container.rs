//! One-shot container format.
//!
//! A container is a length header followed by a body:
//!
//! ```text
//! single block (input <= block max size):
//!   [header][block]
//!
//! chunked (larger inputs):
//!   [header][0x0F]{[u32 LE compressed size][block]}*[u32 LE 0]
//! ```
//!
//! The chunk marker `0x0F` can never begin a valid block: it would be a
//! zero-literal token whose match has no output to reference. The decoder
//! therefore tells the two layouts apart without knowing the block size the
//! compressor used, even when the header records no length.
//!
//! Decompressing with a different header type than the data was compressed
//! with is unsupported. Common cases are rejected, but a header of one type
//! can occasionally parse as another. In particular, reading a headed
//! container as [`HeaderType::None`] treats the header bytes as the start of
//! a block and may succeed with wrong output.

use crate::block::{OutputLimit, compress_block_into, decompress_block_into, initial_capacity};
use crate::hc::{HcEncoder, HcLevel};
use crate::header::{HeaderType, decode_header, header_size, write_header};
use crate::sequence::compress_block_bound;
use hdrlz_core::error::{HdrLzError, Result};
use hdrlz_core::{MAX_INPUT_SIZE, check_input_size};
use tracing::{debug, trace};

/// First body byte of a chunked container.
pub const CHUNKED_MARKER: u8 = 0x0F;

/// Size of the per-chunk compressed-size prefix.
const CHUNK_PREFIX_SIZE: usize = 4;

/// Block maximum sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockMaxSize {
    /// 64 KB maximum block size.
    Size64KB,
    /// 256 KB maximum block size.
    Size256KB,
    /// 1 MB maximum block size (default).
    #[default]
    Size1MB,
    /// 4 MB maximum block size.
    Size4MB,
}

impl BlockMaxSize {
    /// Get the actual byte size for this block max setting.
    pub fn size_bytes(self) -> usize {
        match self {
            BlockMaxSize::Size64KB => 64 * 1024,
            BlockMaxSize::Size256KB => 256 * 1024,
            BlockMaxSize::Size1MB => 1024 * 1024,
            BlockMaxSize::Size4MB => 4 * 1024 * 1024,
        }
    }
}

/// Compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompressionLevel {
    /// Fast compression (default).
    #[default]
    Fast,
    /// High compression (slower but better ratio).
    High(HcLevel),
}

/// Options for [`compress_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CompressOptions {
    /// Length header framing.
    pub header_type: HeaderType,
    /// Inputs above this size are split into independent chunks.
    pub block_max_size: BlockMaxSize,
    /// Encoder selection.
    pub level: CompressionLevel,
}

impl CompressOptions {
    /// Default options with the given header type.
    pub fn new(header_type: HeaderType) -> Self {
        Self {
            header_type,
            ..Self::default()
        }
    }

    /// Set the header type.
    pub fn with_header_type(mut self, header_type: HeaderType) -> Self {
        self.header_type = header_type;
        self
    }

    /// Set block max size.
    pub fn with_block_max_size(mut self, size: BlockMaxSize) -> Self {
        self.block_max_size = size;
        self
    }

    /// Set the compression level.
    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }
}

/// Options for [`decompress_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecompressOptions {
    /// Length header framing the data was compressed with.
    pub header_type: HeaderType,
    /// Largest output accepted. Applies to declared lengths too; `None`
    /// means [`MAX_INPUT_SIZE`].
    pub max_output: Option<usize>,
}

impl DecompressOptions {
    /// Default options with the given header type.
    pub fn new(header_type: HeaderType) -> Self {
        Self {
            header_type,
            max_output: None,
        }
    }

    /// Set the header type.
    pub fn with_header_type(mut self, header_type: HeaderType) -> Self {
        self.header_type = header_type;
        self
    }

    /// Cap the decompressed size.
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = Some(max_output);
        self
    }

    fn output_cap(&self) -> usize {
        self.max_output.unwrap_or(MAX_INPUT_SIZE).min(MAX_INPUT_SIZE)
    }
}

/// Compress `data` with the fast encoder.
pub fn compress(data: &[u8], header_type: HeaderType) -> Result<Vec<u8>> {
    compress_with_options(data, &CompressOptions::new(header_type))
}

/// Compress `data` with the high-compression encoder.
pub fn compress_hc(data: &[u8], header_type: HeaderType, level: HcLevel) -> Result<Vec<u8>> {
    compress_with_options(
        data,
        &CompressOptions::new(header_type).with_level(CompressionLevel::High(level)),
    )
}

/// Decompress a container produced with `header_type`.
pub fn decompress(data: &[u8], header_type: HeaderType) -> Result<Vec<u8>> {
    decompress_with_options(data, &DecompressOptions::new(header_type))
}

/// Worst-case container size for `len` input bytes.
pub fn compress_bound(len: usize, header_type: HeaderType, block_max_size: BlockMaxSize) -> usize {
    let block_size = block_max_size.size_bytes();
    let body = if len <= block_size {
        compress_block_bound(len)
    } else {
        let full = len / block_size;
        let rest = len % block_size;
        let mut body = 1
            + CHUNK_PREFIX_SIZE
            + full * (CHUNK_PREFIX_SIZE + compress_block_bound(block_size));
        if rest > 0 {
            body += CHUNK_PREFIX_SIZE + compress_block_bound(rest);
        }
        body
    };
    header_size(len, header_type) + body
}

/// Selected block encoder, reused across chunks.
enum BlockWriter {
    Fast,
    High(Box<HcEncoder>),
}

impl BlockWriter {
    fn new(level: CompressionLevel) -> Self {
        match level {
            CompressionLevel::Fast => BlockWriter::Fast,
            CompressionLevel::High(level) => {
                BlockWriter::High(Box::new(HcEncoder::with_level(level)))
            }
        }
    }

    fn write(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        match self {
            BlockWriter::Fast => compress_block_into(input, output),
            BlockWriter::High(encoder) => encoder.compress_into(input, output),
        }
    }
}

/// Compress `data` with explicit options.
pub fn compress_with_options(data: &[u8], options: &CompressOptions) -> Result<Vec<u8>> {
    check_input_size(data.len())?;

    let block_size = options.block_max_size.size_bytes();
    let mut output = Vec::with_capacity(compress_bound(
        data.len(),
        options.header_type,
        options.block_max_size,
    ));
    write_header(&mut output, data.len(), options.header_type)?;

    let mut writer = BlockWriter::new(options.level);

    if data.len() <= block_size {
        writer.write(data, &mut output)?;
        debug!(
            header = %options.header_type,
            input = data.len(),
            output = output.len(),
            "compressed single block"
        );
        return Ok(output);
    }

    output.push(CHUNKED_MARKER);
    let mut chunks = 0usize;
    for chunk in data.chunks(block_size) {
        let prefix_at = output.len();
        output.extend_from_slice(&[0; CHUNK_PREFIX_SIZE]);
        let written = writer.write(chunk, &mut output)?;
        // Blocks are at most 4 MB, so their compressed size fits in u32.
        output[prefix_at..prefix_at + CHUNK_PREFIX_SIZE]
            .copy_from_slice(&(written as u32).to_le_bytes());
        trace!(chunk = chunks, input = chunk.len(), compressed = written, "compressed chunk");
        chunks += 1;
    }
    output.extend_from_slice(&0u32.to_le_bytes());

    debug!(
        header = %options.header_type,
        input = data.len(),
        output = output.len(),
        chunks,
        "compressed chunked container"
    );
    Ok(output)
}

/// Decompress `data` with explicit options.
pub fn decompress_with_options(data: &[u8], options: &DecompressOptions) -> Result<Vec<u8>> {
    decompress_container(data, options).inspect_err(|err| {
        debug!(
            header = %options.header_type,
            input = data.len(),
            header_error = err.is_header_error(),
            error = %err,
            "decompression failed"
        );
    })
}

fn decompress_container(data: &[u8], options: &DecompressOptions) -> Result<Vec<u8>> {
    let (declared, consumed) = decode_header(data, options.header_type)?;
    let cap = options.output_cap();

    let limit = match declared {
        Some(n) if n > cap => return Err(HdrLzError::length_overflow(n as u64, cap as u64)),
        Some(n) => OutputLimit::Declared(n),
        None => OutputLimit::Max(cap),
    };

    let body = &data[consumed..];
    let mut output = Vec::with_capacity(initial_capacity(body.len(), limit));

    let chunks = if body.first() == Some(&CHUNKED_MARKER) {
        decompress_chunks(&body[1..], consumed + 1, &mut output, limit)?
    } else {
        decompress_block_into(body, &mut output, limit).map_err(|e| e.offset_by(consumed as u64))?;
        1
    };

    if let Some(n) = declared {
        if output.len() != n {
            return Err(HdrLzError::length_mismatch(n, output.len()));
        }
    }

    debug!(
        header = %options.header_type,
        input = data.len(),
        output = output.len(),
        chunks,
        "decompressed container"
    );
    Ok(output)
}

/// Decode size-prefixed chunks until the zero terminator.
///
/// `base` is the position of `body` within the whole container, for error
/// offsets. Returns the number of chunks decoded.
fn decompress_chunks(
    body: &[u8],
    base: usize,
    output: &mut Vec<u8>,
    limit: OutputLimit,
) -> Result<usize> {
    let mut pos = 0;
    let mut chunks = 0;

    loop {
        let prefix = body
            .get(pos..pos + CHUNK_PREFIX_SIZE)
            .ok_or_else(|| {
                HdrLzError::corrupted((base + pos) as u64, "chunk size prefix truncated")
            })?;
        let size = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        pos += CHUNK_PREFIX_SIZE;

        if size == 0 {
            break;
        }

        let block = pos
            .checked_add(size)
            .and_then(|end| body.get(pos..end))
            .ok_or_else(|| {
                HdrLzError::corrupted((base + pos) as u64, "chunk runs past end of input")
            })?;

        let produced = decompress_block_into(block, output, limit)
            .map_err(|e| e.offset_by((base + pos) as u64))?;
        trace!(chunk = chunks, compressed = size, output = produced, "decompressed chunk");

        pos += size;
        chunks += 1;
    }

    if pos != body.len() {
        return Err(HdrLzError::corrupted(
            (base + pos) as u64,
            "trailing bytes after chunk terminator",
        ));
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(size: usize) -> Vec<u8> {
        let text = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";
        text.iter().copied().cycle().take(size).collect()
    }

    #[test]
    fn test_roundtrip_all_headers() {
        let data = text(10_000);
        for header_type in HeaderType::ALL {
            let compressed = compress(&data, header_type).unwrap();
            assert!(compressed.len() < data.len());
            assert_eq!(decompress(&compressed, header_type).unwrap(), data);
        }
    }

    #[test]
    fn test_single_block_layout() {
        let compressed = compress(b"hello", HeaderType::Le32).unwrap();
        assert_eq!(&compressed[..4], &[5, 0, 0, 0]);
        assert_eq!(&compressed[4..], &[0x50, b'h', b'e', b'l', b'l', b'o', 0, 0]);

        let compressed = compress(b"hello", HeaderType::Be32).unwrap();
        assert_eq!(&compressed[..4], &[0, 0, 0, 5]);

        let compressed = compress(b"hello", HeaderType::None).unwrap();
        assert_eq!(compressed[0], 0x50);
    }

    #[test]
    fn test_chunked_layout() {
        let data = text(150_000);
        let options =
            CompressOptions::new(HeaderType::Varint).with_block_max_size(BlockMaxSize::Size64KB);
        let compressed = compress_with_options(&data, &options).unwrap();

        let header_len = header_size(data.len(), HeaderType::Varint);
        assert_eq!(compressed[header_len], CHUNKED_MARKER);
        assert_eq!(&compressed[compressed.len() - 4..], &[0, 0, 0, 0]);

        // Walk the chunk prefixes: 64K + 64K + remainder.
        let mut pos = header_len + 1;
        let mut chunks = 0;
        loop {
            let size = u32::from_le_bytes(compressed[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            if size == 0 {
                break;
            }
            pos += size;
            chunks += 1;
        }
        assert_eq!(chunks, 3);
        assert_eq!(pos, compressed.len());

        assert_eq!(decompress(&compressed, HeaderType::Varint).unwrap(), data);
    }

    #[test]
    fn test_chunk_boundary_sizes() {
        let block = BlockMaxSize::Size64KB.size_bytes();
        for len in [block - 1, block, block + 1, 2 * block] {
            let data = text(len);
            let options =
                CompressOptions::new(HeaderType::None).with_block_max_size(BlockMaxSize::Size64KB);
            let compressed = compress_with_options(&data, &options).unwrap();
            assert_eq!(compressed[0] == CHUNKED_MARKER, len > block, "len {len}");
            assert_eq!(decompress(&compressed, HeaderType::None).unwrap(), data);
        }
    }

    #[test]
    fn test_hc_container() {
        let data = text(50_000);
        let compressed = compress_hc(&data, HeaderType::Be32, HcLevel::DEFAULT).unwrap();
        assert_eq!(decompress(&compressed, HeaderType::Be32).unwrap(), data);
    }

    #[test]
    fn test_declared_length_mismatch() {
        let mut compressed = compress(&text(1000), HeaderType::Le32).unwrap();
        compressed[..4].copy_from_slice(&999u32.to_le_bytes());
        assert!(matches!(
            decompress(&compressed, HeaderType::Le32),
            Err(HdrLzError::LengthMismatch { expected: 999, .. })
        ));

        compressed[..4].copy_from_slice(&1001u32.to_le_bytes());
        assert_eq!(
            decompress(&compressed, HeaderType::Le32).unwrap_err(),
            HdrLzError::length_mismatch(1001, 1000)
        );
    }

    #[test]
    fn test_max_output() {
        let data = text(5000);
        let compressed = compress(&data, HeaderType::Le32).unwrap();
        let options = DecompressOptions::new(HeaderType::Le32).with_max_output(4999);
        assert!(matches!(
            decompress_with_options(&compressed, &options),
            Err(HdrLzError::LengthOverflow { length: 5000, max: 4999 })
        ));

        let compressed = compress(&data, HeaderType::None).unwrap();
        let options = DecompressOptions::new(HeaderType::None).with_max_output(100);
        assert!(matches!(
            decompress_with_options(&compressed, &options),
            Err(HdrLzError::LengthOverflow { .. })
        ));

        let options = options.with_max_output(5000);
        assert_eq!(decompress_with_options(&compressed, &options).unwrap(), data);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        for header_type in HeaderType::ALL {
            let mut compressed = compress(b"some payload bytes", header_type).unwrap();
            compressed.push(0);
            assert!(decompress(&compressed, header_type).is_err(), "{header_type}");
        }
    }

    #[test]
    fn test_error_offsets_are_container_relative() {
        let mut compressed = compress(b"abc", HeaderType::Le32).unwrap();
        // Replace the end marker with a back-reference past the output.
        let len = compressed.len();
        compressed[len - 2] = 9;
        match decompress(&compressed, HeaderType::Le32).unwrap_err() {
            HdrLzError::CorruptedStream { offset, .. } => assert!(offset as usize >= 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failure_classification() {
        let err = decompress(&[5, 0], HeaderType::Le32).unwrap_err();
        assert!(err.is_header_error());

        let err = decompress(&[0x80], HeaderType::Varint).unwrap_err();
        assert!(err.is_header_error());

        let mut compressed = compress(b"abc", HeaderType::Le32).unwrap();
        compressed.pop();
        let err = decompress(&compressed, HeaderType::Le32).unwrap_err();
        assert!(matches!(err, HdrLzError::CorruptedStream { .. }));
        assert!(!err.is_header_error());
    }

    #[test]
    fn test_compress_bound() {
        let block = BlockMaxSize::Size64KB;
        assert_eq!(compress_bound(0, HeaderType::None, block), 4);
        assert_eq!(compress_bound(10, HeaderType::Le32, block), 4 + 14);
        let two_chunks = compress_bound(2 * 65536, HeaderType::None, block);
        assert_eq!(two_chunks, 1 + 4 + 2 * (4 + compress_block_bound(65536)));
    }
}
