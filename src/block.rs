//! Blocks and block headers.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::constants::{BLOCK_VERSION, HEADER_SIZE, MAX_TIME_OFFSET};
use crate::crypto;
use crate::error::Result;
use crate::pow;
use crate::transaction::Transaction;
use crate::types::{hash_to_hex, Hash, NULL_HASH};

/// Fixed 84-byte header; the only part of a block the nonce search touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub height: u32,
    pub prev_hash: Hash,
    pub merkle_root: Hash,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Canonical little-endian layout; hashes written in natural order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        codec::write_u32_le(&mut out, self.version);
        codec::write_u32_le(&mut out, self.height);
        codec::write_32_reversed(&mut out, &self.prev_hash);
        codec::write_32_reversed(&mut out, &self.merkle_root);
        codec::write_u32_le(&mut out, self.time);
        codec::write_u32_le(&mut out, self.bits);
        codec::write_u32_le(&mut out, self.nonce);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<BlockHeader> {
        let mut input = bytes;
        let header = BlockHeader {
            version: codec::read_u32_le(&mut input)?,
            height: codec::read_u32_le(&mut input)?,
            prev_hash: codec::read_32_reversed(&mut input)?,
            merkle_root: codec::read_32_reversed(&mut input)?,
            time: codec::read_u32_le(&mut input)?,
            bits: codec::read_u32_le(&mut input)?,
            nonce: codec::read_u32_le(&mut input)?,
        };
        codec::expect_eof(input)?;
        Ok(header)
    }

    /// Reversed double-SHA-256 of the serialized header.
    pub fn id(&self) -> Hash {
        codec::reversed_32(&crypto::hash256(&self.serialize()))
    }

    pub fn id_hex(&self) -> String {
        hash_to_hex(&self.id())
    }

    /// True iff the id meets the target claimed by `bits`.
    pub fn valid_proof_of_work(&self) -> Result<bool> {
        pow::check_proof_of_work(self)
    }

    /// True iff `time` is within the accepted skew of `now`.
    pub fn valid_timestamp(&self, now: u32) -> bool {
        self.time.abs_diff(now) <= MAX_TIME_OFFSET
    }

    /// Advance the nonce search space. When the nonce wraps, the timestamp
    /// moves forward one second so the search never revisits a header.
    pub fn increase_nonce(&mut self) {
        self.nonce = self.nonce.wrapping_add(1);
        if self.nonce == 0 {
            self.time = self.time.wrapping_add(1);
        }
    }
}

/// A header plus its ordered transactions; `transactions[0]` is the coinbase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build a single-transaction block; the merkle root of one id is that id.
    pub fn from_coinbase(
        coinbase: Transaction,
        prev_hash: Hash,
        height: u32,
        time: u32,
        bits: u32,
    ) -> Block {
        let header = BlockHeader {
            version: BLOCK_VERSION,
            height,
            prev_hash,
            merkle_root: coinbase.id(),
            time,
            bits,
            nonce: 0,
        };
        Block {
            header,
            transactions: vec![coinbase],
        }
    }

    /// Append a transaction and recommit the header to the new id set.
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
        self.header.merkle_root = merkle_root(&self.ids());
    }

    pub fn id(&self) -> Hash {
        self.header.id()
    }

    pub fn id_hex(&self) -> String {
        self.header.id_hex()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    pub fn ids(&self) -> Vec<Hash> {
        self.transactions.iter().map(|tx| tx.id()).collect()
    }

    pub fn valid_merkle_root(&self) -> bool {
        self.header.merkle_root == merkle_root(&self.ids())
    }
}

/// Merkle root over transaction ids.
///
/// Pairs are combined with double-SHA-256; an odd level duplicates its last
/// id. The empty list commits to `NULL_HASH`. All hashes stay in id order.
pub fn merkle_root(ids: &[Hash]) -> Hash {
    if ids.is_empty() {
        return NULL_HASH;
    }
    let mut level = ids.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            let mut combined = Vec::with_capacity(64);
            combined.extend_from_slice(left);
            combined.extend_from_slice(right);
            next.push(codec::reversed_32(&crypto::hash256(&combined)));
        }
        level = next;
    }
    level[0]
}
