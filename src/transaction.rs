//! Pixel transactions: coinbase mints and signed ownership transfers.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::constants::{SIGNATURE_SIZE, TX_UNSIGNED_SIZE, TX_VERSION};
use crate::crypto::{self, PrivateKey, PublicKey, Signature};
use crate::error::{ChainError, Result};
use crate::sighash;
use crate::types::{hash_to_hex, Color, Hash, Position, NULL_HASH};

/// A single pixel operation.
///
/// A coinbase (`previous == NULL_HASH`) mints the pixel at `position` and
/// assigns it `color` and `owner`. A transfer spends the transaction named
/// by `previous` and must carry a signature by the previous owner.
///
/// The id commits to every field except the signature, so the id is a
/// commitment to transfer intent and the signature certifies that id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    /// Id of the transaction being spent; `NULL_HASH` for a coinbase.
    pub previous: Hash,
    pub position: Position,
    pub color: Color,
    /// The new owner of the pixel.
    pub owner: PublicKey,
    /// Absent for a coinbase, required for a transfer.
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Start building a transaction. The owner is the only required field.
    pub fn builder() -> TransactionBuilder {
        TransactionBuilder::new()
    }

    pub fn is_coinbase(&self) -> bool {
        self.previous == NULL_HASH
    }

    /// Reversed double-SHA-256 over the canonical bytes, signature excluded.
    pub fn id(&self) -> Hash {
        codec::reversed_32(&crypto::hash256(&self.serialize_unsigned()))
    }

    pub fn id_hex(&self) -> String {
        hash_to_hex(&self.id())
    }

    /// Sign the transaction as the owner of the output named by `previous`.
    ///
    /// Fails with [`ChainError::NoPreviousTxInfo`] on a coinbase; there is
    /// nothing being spent, so there is nothing to certify.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<()> {
        if self.previous == NULL_HASH {
            return Err(ChainError::NoPreviousTxInfo);
        }
        self.signature = Some(sighash::sign(self, key)?);
        Ok(())
    }

    /// Canonical bytes without the signature; the sighash pre-image.
    pub fn serialize_unsigned(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TX_UNSIGNED_SIZE);
        codec::write_u8(&mut out, self.version);
        codec::write_32_reversed(&mut out, &self.previous);
        codec::write_i32_le(&mut out, self.position.x);
        codec::write_i32_le(&mut out, self.position.y);
        codec::write_u32_le(&mut out, self.color);
        out.extend_from_slice(&self.owner.serialize());
        out
    }

    /// Full wire form: unsigned bytes, then the raw signature if present.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.serialize_unsigned();
        if let Some(sig) = &self.signature {
            out.extend_from_slice(&sig.serialize());
        }
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        let mut input = bytes;
        let version = codec::read_u8(&mut input)?;
        if version != TX_VERSION {
            return Err(ChainError::Serialization(format!(
                "unknown transaction version {version}"
            )));
        }
        let previous = codec::read_32_reversed(&mut input)?;
        let x = codec::read_i32_le(&mut input)?;
        let y = codec::read_i32_le(&mut input)?;
        let color = codec::read_u32_le(&mut input)?;
        let owner = PublicKey::from_slice(codec::take(&mut input, 33)?)?;
        let signature = if input.is_empty() {
            None
        } else {
            Some(Signature::from_slice(codec::take(&mut input, SIGNATURE_SIZE)?)?)
        };
        codec::expect_eof(input)?;
        Ok(Transaction {
            version,
            previous,
            position: Position::new(x, y),
            color,
            owner,
            signature,
        })
    }
}

/// Fluent construction of a [`Transaction`].
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    version: u8,
    previous: Hash,
    position: Position,
    color: Color,
    owner: Option<PublicKey>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        TransactionBuilder {
            version: TX_VERSION,
            previous: NULL_HASH,
            position: Position::new(0, 0),
            color: 0,
            owner: None,
        }
    }

    /// Spend the transaction with the given id. Skipping this leaves the
    /// builder producing a coinbase.
    pub fn from(mut self, previous: Hash) -> Self {
        self.previous = previous;
        self
    }

    /// Assign the new owner.
    pub fn to(mut self, owner: PublicKey) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn colored(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn build(self) -> Result<Transaction> {
        let owner = self.owner.ok_or_else(|| {
            ChainError::InvalidArgument("transaction has no owner".to_string())
        })?;
        Ok(Transaction {
            version: self.version,
            previous: self.previous,
            position: self.position,
            color: self.color,
            owner,
            signature: None,
        })
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TX_UNSIGNED_SIZE;

    fn key(seed: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[seed; 32]).unwrap()
    }

    fn coinbase_at(x: i32, y: i32, seed: u8) -> Transaction {
        Transaction::builder()
            .to(key(seed).public_key())
            .colored(0xff0000ff)
            .at(x, y)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults_make_a_coinbase() {
        let tx = coinbase_at(0, 1, 1);
        assert!(tx.is_coinbase());
        assert_eq!(tx.version, TX_VERSION);
        assert!(tx.signature.is_none());
    }

    #[test]
    fn test_builder_without_owner_fails() {
        assert!(Transaction::builder().colored(1).at(0, 0).build().is_err());
    }

    #[test]
    fn test_unsigned_layout_size_and_color_order() {
        let tx = Transaction::builder()
            .to(key(1).public_key())
            .colored(0xaabbccff)
            .at(3, -4)
            .build()
            .unwrap();
        let bytes = tx.serialize_unsigned();
        assert_eq!(bytes.len(), TX_UNSIGNED_SIZE);
        assert_eq!(bytes[0], TX_VERSION);
        // color 0xaabbccff on the wire: ff cc bb aa
        assert_eq!(&bytes[41..45], &[0xff, 0xcc, 0xbb, 0xaa]);
    }

    #[test]
    fn test_previous_serialized_in_natural_order() {
        let mut prev = [0u8; 32];
        prev[0] = 0xaa; // most significant end of the displayed id
        let tx = Transaction::builder()
            .from(prev)
            .to(key(1).public_key())
            .build()
            .unwrap();
        let bytes = tx.serialize_unsigned();
        assert_eq!(bytes[1], 0x00);
        assert_eq!(bytes[32], 0xaa);
    }

    #[test]
    fn test_sign_requires_previous() {
        let mut tx = coinbase_at(0, 0, 1);
        assert!(matches!(
            tx.sign(&key(1)),
            Err(ChainError::NoPreviousTxInfo)
        ));
    }

    #[test]
    fn test_signature_does_not_change_id() {
        let owner = key(1);
        let coinbase = coinbase_at(0, 1, 1);
        let mut tx = Transaction::builder()
            .from(coinbase.id())
            .to(key(2).public_key())
            .colored(0x00fff0ff)
            .at(0, 1)
            .build()
            .unwrap();
        let before = tx.id();
        tx.sign(&owner).unwrap();
        assert_eq!(tx.id(), before);
        assert_eq!(sighash::sighash(&tx), before);
    }

    #[test]
    fn test_serialize_roundtrip_unsigned() {
        let tx = coinbase_at(-1, 7, 3);
        let decoded = Transaction::deserialize(&tx.serialize()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_serialize_roundtrip_signed() {
        let owner = key(4);
        let coinbase = coinbase_at(2, 2, 4);
        let mut tx = Transaction::builder()
            .from(coinbase.id())
            .to(key(5).public_key())
            .colored(0x00ff00ff)
            .at(2, 2)
            .build()
            .unwrap();
        tx.sign(&owner).unwrap();
        let decoded = Transaction::deserialize(&tx.serialize()).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.signature.is_some());
    }

    #[test]
    fn test_deserialize_rejects_bad_version() {
        let mut bytes = coinbase_at(0, 0, 1).serialize();
        bytes[0] = 9;
        assert!(Transaction::deserialize(&bytes).is_err());
    }

    #[test]
    fn test_deserialize_rejects_truncated_and_trailing() {
        let bytes = coinbase_at(0, 0, 1).serialize();
        assert!(Transaction::deserialize(&bytes[..bytes.len() - 1]).is_err());
        let mut long = bytes.clone();
        long.push(0);
        assert!(Transaction::deserialize(&long).is_err());
    }

    #[test]
    fn test_ids_differ_by_field() {
        let a = coinbase_at(0, 0, 1);
        let b = coinbase_at(0, 1, 1);
        assert_ne!(a.id(), b.id());
    }
}
