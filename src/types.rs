//! Core types shared across the pixel chain engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};

/// 256-bit identifier in display byte order.
///
/// Block and transaction ids are the double-SHA-256 of their canonical bytes
/// with the byte order reversed; every `Hash` in this crate carries that
/// reversed order, so `hex::encode` renders the id directly.
pub type Hash = [u8; 32];

/// Sentinel hash: parent of the genesis block and `previous` of coinbases.
pub const NULL_HASH: Hash = [0u8; 32];

/// 32-bit color packed RGBA from the most significant byte down, so
/// `0xaabbccff` is r = `0xaa`, g = `0xbb`, b = `0xcc`, a = `0xff`.
pub type Color = u32;

/// Integer grid coordinate; the identity of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    /// The four 4-neighbors of this coordinate.
    pub fn neighbors(&self) -> [Position; 4] {
        [
            Position::new(self.x, self.y.wrapping_add(1)),
            Position::new(self.x, self.y.wrapping_sub(1)),
            Position::new(self.x.wrapping_add(1), self.y),
            Position::new(self.x.wrapping_sub(1), self.y),
        ]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Render a hash as lowercase hex.
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parse a 64-character hex string into a hash.
pub fn hash_from_hex(s: &str) -> Result<Hash> {
    let bytes = hex::decode(s)
        .map_err(|e| ChainError::InvalidArgument(format!("invalid hash hex: {e}")))?;
    bytes.try_into().map_err(|_| {
        ChainError::InvalidArgument(format!("hash must be 32 bytes, got {}", s.len() / 2))
    })
}
