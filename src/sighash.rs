//! Signature hash: the digest a transfer's signer commits to.
//!
//! The pre-image is the transaction's canonical serialization with the
//! signature field cleared, double-SHA-256'd and reversed into id order.
//! That makes the sighash identical to the transaction id: the signer
//! certifies the id, and since the id covers `previous`, the signature
//! binds the transfer to the exact output being spent.

use crate::crypto::{PrivateKey, PublicKey, Signature};
use crate::error::Result;
use crate::transaction::Transaction;
use crate::types::Hash;

/// The 32-byte digest signed by the previous owner.
pub fn sighash(tx: &Transaction) -> Hash {
    tx.id()
}

/// Sign a transaction's sighash with the previous owner's key.
pub fn sign(tx: &Transaction, key: &PrivateKey) -> Result<Signature> {
    key.sign_digest(&sighash(tx))
}

/// Verify a signature over a transaction's sighash against the previous
/// owner's public key.
pub fn verify(tx: &Transaction, signature: &Signature, owner: &PublicKey) -> bool {
    owner.verify_digest(&sighash(tx), signature)
}
