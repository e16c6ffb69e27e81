//! Consensus constants for the pixel chain.

/// Current transaction version.
pub const TX_VERSION: u8 = 1;

/// Serialized size of a transaction without its signature:
/// version + previous + position + color + owner.
pub const TX_UNSIGNED_SIZE: usize = 1 + 32 + 4 + 4 + 4 + 33;

/// Serialized size of an ECDSA signature: `r` and `s`, 32 bytes each.
pub const SIGNATURE_SIZE: usize = 64;

/// Serialized size of a compressed secp256k1 public key.
pub const PUBLIC_KEY_SIZE: usize = 33;

/// Serialized block header size:
/// version + height + prevHash + merkleRoot + time + bits + nonce.
pub const HEADER_SIZE: usize = 4 + 4 + 32 + 32 + 4 + 4 + 4;

/// Current block header version.
pub const BLOCK_VERSION: u32 = 1;

/// Maximum accepted skew between a header timestamp and local time: 2 hours.
pub const MAX_TIME_OFFSET: u32 = 2 * 60 * 60;

/// Compact difficulty used when none is supplied; roughly every other
/// header hash satisfies it.
pub const DEFAULT_BITS: u32 = 0x207fffff;
