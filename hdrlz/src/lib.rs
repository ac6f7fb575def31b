//! Pure Rust LZ4-style compression with selectable length headers.
//!
//! Buffers are compressed into a self-describing container: a header that
//! records the original length in one of four framings, followed by one or
//! more LZ77 blocks. The framing is chosen per call and must be the same when
//! decompressing.
//!
//! # Features
//!
//! - Length headers: none, little-endian u32, big-endian u32, varint
//! - Fast block encoder (single-candidate hash table, lazy matching)
//! - High-compression block encoder (hash chains, levels 1-12)
//! - Chunking of large inputs into independent blocks
//! - Truncated input and malformed token streams are reported as errors
//!
//! # Example
//!
//! ```
//! use hdrlz::{HeaderType, compress, decompress};
//!
//! let data = b"Hello, World! Hello, World!";
//! let compressed = compress(data, HeaderType::Varint).unwrap();
//! let decompressed = decompress(&compressed, HeaderType::Varint).unwrap();
//! assert_eq!(decompressed, data);
//! ```
//!
//! Host bindings usually receive the header type as an integer:
//!
//! ```
//! use hdrlz::{HeaderType, compress};
//!
//! let header = HeaderType::try_from(2i32).unwrap(); // BE32
//! let compressed = compress(b"payload", header).unwrap();
//! assert_eq!(&compressed[..4], &[0, 0, 0, 7]);
//! assert!(HeaderType::try_from(4i32).is_err());
//! ```

#![warn(missing_docs)]

mod block;
mod container;
pub mod hc;
pub mod header;
mod sequence;

pub use block::{
    OutputLimit, compress_block, compress_block_into, decompress_block, decompress_block_into,
};
pub use container::{
    BlockMaxSize, CHUNKED_MARKER, CompressOptions, CompressionLevel, DecompressOptions, compress,
    compress_bound, compress_hc, compress_with_options, decompress, decompress_with_options,
};
pub use hc::{HcEncoder, HcLevel, compress_hc_block, compress_hc_block_level};
pub use hdrlz_core::{HdrLzError, MAX_INPUT_SIZE, Result};
pub use header::{Header, HeaderType, decode_header, encode_header, header_size};
pub use sequence::compress_block_bound;
