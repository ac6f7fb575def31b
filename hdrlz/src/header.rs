//! Length headers.
//!
//! Every container starts with the decompressed length framed in one of four
//! ways, selected by the caller:
//!
//! | Selector | Type     | Size      | Encoding                                  |
//! |----------|----------|-----------|-------------------------------------------|
//! | 0        | `None`   | 0 bytes   | no length recorded                        |
//! | 1        | `Le32`   | 4 bytes   | unsigned 32-bit little-endian             |
//! | 2        | `Be32`   | 4 bytes   | unsigned 32-bit big-endian                |
//! | 3        | `Varint` | 1-5 bytes | base-128, low group first, MSB continues  |
//!
//! Lengths above [`MAX_INPUT_SIZE`] are rejected on both sides.

use hdrlz_core::MAX_INPUT_SIZE;
use hdrlz_core::error::{HdrLzError, Result};
use std::fmt;

/// Maximum encoded size of a VARINT header (a 32-bit value).
pub const VARINT_MAX_BYTES: usize = 5;

/// Size of the fixed 32-bit headers.
const FIXED_HEADER_SIZE: usize = 4;

/// How the decompressed length is framed at the start of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum HeaderType {
    /// No header; the block structure alone marks the end of the data.
    None = 0,
    /// 4-byte little-endian length (default).
    #[default]
    Le32 = 1,
    /// 4-byte big-endian length.
    Be32 = 2,
    /// Variable-length base-128 length.
    Varint = 3,
}

impl HeaderType {
    /// All header types in selector order.
    pub const ALL: [HeaderType; 4] = [
        HeaderType::None,
        HeaderType::Le32,
        HeaderType::Be32,
        HeaderType::Varint,
    ];

    /// Map a caller-supplied selector (0-3) to a header type.
    pub fn from_selector(selector: i32) -> Result<Self> {
        match selector {
            0 => Ok(HeaderType::None),
            1 => Ok(HeaderType::Le32),
            2 => Ok(HeaderType::Be32),
            3 => Ok(HeaderType::Varint),
            other => Err(HdrLzError::invalid_header_type(other)),
        }
    }

    /// The stable selector value.
    pub fn selector(self) -> u8 {
        self as u8
    }

    /// Short name used in error messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            HeaderType::None => "NONE",
            HeaderType::Le32 => "LE32",
            HeaderType::Be32 => "BE32",
            HeaderType::Varint => "VARINT",
        }
    }

    /// Whether this framing records the decompressed length.
    pub fn has_length(self) -> bool {
        self != HeaderType::None
    }
}

impl TryFrom<i32> for HeaderType {
    type Error = HdrLzError;

    fn try_from(selector: i32) -> Result<Self> {
        Self::from_selector(selector)
    }
}

impl TryFrom<u8> for HeaderType {
    type Error = HdrLzError;

    fn try_from(selector: u8) -> Result<Self> {
        Self::from_selector(i32::from(selector))
    }
}

impl fmt::Display for HeaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded (or to-be-encoded) length header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Framing of the length field.
    pub header_type: HeaderType,
    /// Declared decompressed length; always `None` for [`HeaderType::None`].
    pub declared_length: Option<usize>,
}

impl Header {
    /// Create a header declaring `length` bytes.
    pub fn new(header_type: HeaderType, length: usize) -> Self {
        Self {
            header_type,
            declared_length: header_type.has_length().then_some(length),
        }
    }

    /// Encode the header.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_header(self.declared_length.unwrap_or(0), self.header_type)
    }

    /// Decode a header from the start of `input`.
    ///
    /// Returns the header and the number of bytes it occupied.
    pub fn decode(input: &[u8], header_type: HeaderType) -> Result<(Self, usize)> {
        let (declared_length, consumed) = decode_header(input, header_type)?;
        Ok((
            Self {
                header_type,
                declared_length,
            },
            consumed,
        ))
    }
}

/// Number of bytes the header for `length` occupies.
pub fn header_size(length: usize, header_type: HeaderType) -> usize {
    match header_type {
        HeaderType::None => 0,
        HeaderType::Le32 | HeaderType::Be32 => FIXED_HEADER_SIZE,
        HeaderType::Varint => {
            let mut size = 1;
            let mut value = length >> 7;
            while value != 0 {
                size += 1;
                value >>= 7;
            }
            size
        }
    }
}

/// Append the header for `length` to `output`, returning the bytes written.
pub fn write_header(output: &mut Vec<u8>, length: usize, header_type: HeaderType) -> Result<usize> {
    let value = checked_u32(length)?;
    let start = output.len();

    match header_type {
        HeaderType::None => {}
        HeaderType::Le32 => output.extend_from_slice(&value.to_le_bytes()),
        HeaderType::Be32 => output.extend_from_slice(&value.to_be_bytes()),
        HeaderType::Varint => write_varint(output, value),
    }

    Ok(output.len() - start)
}

/// Encode the header for `length`.
pub fn encode_header(length: usize, header_type: HeaderType) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(header_size(length, header_type));
    write_header(&mut output, length, header_type)?;
    Ok(output)
}

/// Decode a header from the start of `input`.
///
/// Returns the declared length (`None` for [`HeaderType::None`]) and the
/// number of header bytes consumed. Bytes after the header are ignored.
pub fn decode_header(input: &[u8], header_type: HeaderType) -> Result<(Option<usize>, usize)> {
    match header_type {
        HeaderType::None => Ok((None, 0)),
        HeaderType::Le32 => {
            let bytes = read_fixed(input, header_type)?;
            let length = checked_length(u64::from(u32::from_le_bytes(bytes)))?;
            Ok((Some(length), FIXED_HEADER_SIZE))
        }
        HeaderType::Be32 => {
            let bytes = read_fixed(input, header_type)?;
            let length = checked_length(u64::from(u32::from_be_bytes(bytes)))?;
            Ok((Some(length), FIXED_HEADER_SIZE))
        }
        HeaderType::Varint => {
            let (value, consumed) = read_varint(input)?;
            Ok((Some(checked_length(value)?), consumed))
        }
    }
}

fn checked_u32(length: usize) -> Result<u32> {
    checked_length(length as u64)?;
    // MAX_INPUT_SIZE is below u32::MAX, so this cannot truncate.
    Ok(length as u32)
}

fn checked_length(value: u64) -> Result<usize> {
    if value > MAX_INPUT_SIZE as u64 {
        return Err(HdrLzError::length_overflow(value, MAX_INPUT_SIZE as u64));
    }
    Ok(value as usize)
}

fn read_fixed(input: &[u8], header_type: HeaderType) -> Result<[u8; FIXED_HEADER_SIZE]> {
    input
        .get(..FIXED_HEADER_SIZE)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            HdrLzError::truncated_header(header_type.name(), FIXED_HEADER_SIZE, input.len())
        })
}

fn write_varint(output: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        output.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    output.push(value as u8);
}

/// Read a base-128 value of at most [`VARINT_MAX_BYTES`] bytes.
fn read_varint(input: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;

    for (i, &byte) in input.iter().take(VARINT_MAX_BYTES).enumerate() {
        // The fifth group only has four bits left in a 32-bit value.
        if i == VARINT_MAX_BYTES - 1 && byte >= 0x10 {
            break;
        }
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if input.len() >= VARINT_MAX_BYTES {
        // Still continuing after the widest 32-bit encoding.
        Err(HdrLzError::truncated_header(
            HeaderType::Varint.name(),
            VARINT_MAX_BYTES + 1,
            VARINT_MAX_BYTES,
        ))
    } else {
        Err(HdrLzError::truncated_header(
            HeaderType::Varint.name(),
            input.len() + 1,
            input.len(),
        ))
    }
}
