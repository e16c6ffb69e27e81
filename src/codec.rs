//! Little-endian byte codec for the wire layouts.
//!
//! Both consensus layouts (transaction and block header) are fixed-width
//! little-endian records with no length prefixes. Field order is
//! consensus-relevant; changing it changes every id on the chain.

use crate::error::{ChainError, Result};

/// Split `n` bytes off the front of `input`, advancing it.
pub fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if input.len() < n {
        return Err(ChainError::Serialization(format!(
            "unexpected end of input: wanted {n} bytes, have {}",
            input.len()
        )));
    }
    let (head, tail) = input.split_at(n);
    *input = tail;
    Ok(head)
}

pub fn read_u8(input: &mut &[u8]) -> Result<u8> {
    Ok(take(input, 1)?[0])
}

pub fn read_u32_le(input: &mut &[u8]) -> Result<u32> {
    let b = take(input, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn read_i32_le(input: &mut &[u8]) -> Result<i32> {
    let b = take(input, 4)?;
    Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn read_32(input: &mut &[u8]) -> Result<[u8; 32]> {
    let b = take(input, 32)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(b);
    Ok(out)
}

/// Read 32 bytes and reverse them, mapping wire order back to id order.
pub fn read_32_reversed(input: &mut &[u8]) -> Result<[u8; 32]> {
    Ok(reversed_32(&read_32(input)?))
}

pub fn write_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn write_u32_le(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_i32_le(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Write 32 bytes in reverse, mapping id order to wire order.
pub fn write_32_reversed(out: &mut Vec<u8>, v: &[u8; 32]) {
    out.extend(v.iter().rev());
}

/// Copy of `bytes` with the byte order flipped.
pub fn reversed_32(bytes: &[u8; 32]) -> [u8; 32] {
    let mut out = *bytes;
    out.reverse();
    out
}

/// Fail unless the whole input was consumed.
pub fn expect_eof(input: &[u8]) -> Result<()> {
    if input.is_empty() {
        Ok(())
    } else {
        Err(ChainError::Serialization(format!(
            "{} trailing bytes after record",
            input.len()
        )))
    }
}
