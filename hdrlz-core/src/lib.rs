//! # hdrlz Core
//!
//! Core components shared by the hdrlz crates:
//!
//! - [`error`]: the [`HdrLzError`] type and [`Result`] alias
//! - [`MAX_INPUT_SIZE`]: the largest buffer the codec accepts
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Container                                           │
//! │     compress/decompress, chunking, options              │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     Length headers (NONE/LE32/BE32/VARINT), LZ blocks   │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Core (this crate)                                   │
//! │     Errors, limits                                      │
//! └─────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;

pub use error::{HdrLzError, Result};

/// Largest buffer (compressed input or decompressed output) the codec handles.
///
/// Equal to `i32::MAX`, the largest length a signed 32-bit size field can
/// carry, so every container produced here can be read by hosts whose buffer
/// sizes are C `int`s.
pub const MAX_INPUT_SIZE: usize = i32::MAX as usize;

/// Check a length against [`MAX_INPUT_SIZE`].
pub fn check_input_size(length: usize) -> Result<()> {
    if length > MAX_INPUT_SIZE {
        return Err(HdrLzError::length_overflow(
            length as u64,
            MAX_INPUT_SIZE as u64,
        ));
    }
    Ok(())
}
