//! Base-128 variable-length integers.
//!
//! Groups of seven bits, least significant first; every byte but the last
//! has its high bit set. Each continuation group is stored minus one, so
//! every integer has exactly one encoding and there are no overlong forms:
//!
//! ```text
//! 0x00..=0x7f        -> [v]
//! 0x80               -> [0x80, 0x00]
//! 0x407f             -> [0xff, 0x7f]
//! ```
//!
//! Signed integers in schema-guided payloads are zigzag-mapped first.

use plankton_buffers::{Reader, Writer};

use crate::error::{Error, Result};

/// Longest encoding of a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Maximum number of bytes a varint of `bits` width may occupy.
#[inline]
pub fn max_len(bits: u32) -> usize {
    bits.div_ceil(7) as usize
}

pub fn write_varint(writer: &mut Writer, mut value: u64) {
    while value >= 0x80 {
        writer.u8((value & 0x7f) as u8 | 0x80);
        value = (value >> 7) - 1;
    }
    writer.u8(value as u8);
}

/// Reads a varint that must fit in `bits` bits.
///
/// Running out of input is [`Error::TruncatedInput`]; a continuation run
/// longer than the width allows, or a value above the width's maximum, is
/// [`Error::MalformedVarint`].
pub fn read_varint_bits(reader: &mut Reader<'_>, bits: u32) -> Result<u64> {
    let start = reader.position();
    let limit = max_len(bits);
    let mut value: u128 = 0;
    let mut shift = 0u32;
    for i in 0..limit {
        let byte = reader.try_u8()?;
        let group = (byte & 0x7f) as u128;
        value += if i == 0 { group } else { (group + 1) << shift };
        shift += 7;
        if byte < 0x80 {
            let max = if bits >= 64 { u64::MAX as u128 } else { (1u128 << bits) - 1 };
            if value > max {
                return Err(Error::MalformedVarint { offset: start });
            }
            return Ok(value as u64);
        }
    }
    Err(Error::MalformedVarint { offset: start })
}

#[inline]
pub fn read_varint(reader: &mut Reader<'_>) -> Result<u64> {
    read_varint_bits(reader, 64)
}

/// Reads a varint used as a length or count.
pub fn read_len(reader: &mut Reader<'_>) -> Result<usize> {
    let start = reader.position();
    let n = read_varint(reader)?;
    usize::try_from(n).map_err(|_| Error::MalformedVarint { offset: start })
}

#[inline]
pub fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub fn unzigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}
