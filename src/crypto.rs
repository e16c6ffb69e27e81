//! Hashing and ECDSA primitives over secp256k1.
//!
//! One curve, one hash family. Public keys are accepted in 33-byte
//! compressed form only; signatures travel as raw `(r, s)` halves in
//! little-endian byte order, exactly as the signer produced them.

use bitcoin_hashes::{sha256d, Hash as BitcoinHash};
use ripemd::Ripemd160;
use secp256k1::{ecdsa, Message, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use crate::error::{ChainError, Result};

/// SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Double SHA-256, the id hash of headers and transactions.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}

/// RIPEMD-160 of SHA-256, used for compact key fingerprints.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(Sha256::digest(data)));
    out
}

/// A secp256k1 signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    /// Build a key from 32 raw bytes. Fails on zero or out-of-range scalars.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        SecretKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|e| ChainError::InvalidArgument(format!("invalid private key: {e}")))
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::new();
        PublicKey(secp256k1::PublicKey::from_secret_key(&secp, &self.0))
    }

    /// Sign a 32-byte digest. Nonce derivation is deterministic (RFC 6979),
    /// so signing the same digest twice yields the same signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(digest)
            .map_err(|e| ChainError::InvalidArgument(format!("invalid digest: {e}")))?;
        Ok(Signature::from_secp(&secp.sign_ecdsa(&message, &self.0)))
    }
}

/// A secp256k1 point; the owner identity of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(secp256k1::PublicKey);

impl PublicKey {
    /// Parse a compressed public key. Uncompressed encodings are rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE || !matches!(bytes[0], 0x02 | 0x03) {
            return Err(ChainError::InvalidArgument(
                "public key must be 33 bytes in compressed form".to_string(),
            ));
        }
        secp256k1::PublicKey::from_slice(bytes)
            .map(PublicKey)
            .map_err(|e| ChainError::InvalidArgument(format!("invalid public key: {e}")))
    }

    /// Compressed 33-byte serialization: parity prefix then big-endian X.
    pub fn serialize(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.serialize()
    }

    /// HASH-160 of the compressed key; a short stable label for logs.
    pub fn fingerprint(&self) -> [u8; 20] {
        hash160(&self.serialize())
    }

    /// Verify a signature over a 32-byte digest.
    pub fn verify_digest(&self, digest: &[u8; 32], signature: &Signature) -> bool {
        let secp = Secp256k1::new();
        let message = match Message::from_digest_slice(digest) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let mut sig = match signature.to_secp() {
            Ok(s) => s,
            Err(_) => return false,
        };
        // Accept any canonical encoding, high-S included.
        sig.normalize_s();
        secp.verify_ecdsa(&message, &sig, &self.0).is_ok()
    }
}

/// ECDSA signature as little-endian `r` and `s` halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl Signature {
    fn from_secp(sig: &ecdsa::Signature) -> Self {
        let compact = sig.serialize_compact();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);
        r.reverse();
        s.reverse();
        Signature { r, s }
    }

    fn to_secp(&self) -> Result<ecdsa::Signature> {
        let mut compact = [0u8; SIGNATURE_SIZE];
        compact[..32].copy_from_slice(&self.r);
        compact[32..].copy_from_slice(&self.s);
        compact[..32].reverse();
        compact[32..].reverse();
        ecdsa::Signature::from_compact(&compact)
            .map_err(|e| ChainError::InvalidArgument(format!("corrupt signature: {e}")))
    }

    /// Raw wire form: `r` then `s`, both little-endian.
    pub fn serialize(&self) -> [u8; SIGNATURE_SIZE] {
        let mut out = [0u8; SIGNATURE_SIZE];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(ChainError::InvalidArgument(format!(
                "signature must be {SIGNATURE_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Signature { r, s })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn test_key(seed: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[seed; 32]).unwrap()
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash256_is_double_sha256() {
        let data = b"pixel";
        assert_eq!(hash256(data), sha256(&sha256(data)));
    }

    #[test]
    fn test_hash160_len() {
        assert_eq!(hash160(b"pixel").len(), 20);
    }

    #[test]
    fn test_fingerprint_hashes_compressed_key() {
        let pk = test_key(7).public_key();
        assert_eq!(pk.fingerprint(), hash160(&pk.serialize()));
        assert_ne!(pk.fingerprint(), test_key(8).public_key().fingerprint());
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let key = test_key(1);
        let digest = sha256(b"message");
        let sig = key.sign_digest(&digest).unwrap();
        assert!(key.public_key().verify_digest(&digest, &sig));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = test_key(2);
        let digest = sha256(b"message");
        assert_eq!(
            key.sign_digest(&digest).unwrap(),
            key.sign_digest(&digest).unwrap()
        );
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let digest = sha256(b"message");
        let sig = test_key(3).sign_digest(&digest).unwrap();
        assert!(!test_key(4).public_key().verify_digest(&digest, &sig));
    }

    #[test]
    fn test_verify_rejects_flipped_bit() {
        let key = test_key(5);
        let digest = sha256(b"message");
        let mut sig = key.sign_digest(&digest).unwrap();
        sig.r[0] ^= 0x01;
        assert!(!key.public_key().verify_digest(&digest, &sig));
    }

    #[test]
    fn test_pubkey_compressed_roundtrip() {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        seed[0] |= 1; // never all zero
        let pk = PrivateKey::from_bytes(&seed).unwrap().public_key();
        let bytes = pk.serialize();
        assert!(matches!(bytes[0], 0x02 | 0x03));
        assert_eq!(PublicKey::from_slice(&bytes).unwrap(), pk);
    }

    #[test]
    fn test_pubkey_rejects_uncompressed_prefix() {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x04;
        assert!(PublicKey::from_slice(&bytes).is_err());
        assert!(PublicKey::from_slice(&[0u8; 65]).is_err());
    }

    #[test]
    fn test_signature_wire_roundtrip() {
        let key = test_key(6);
        let sig = key.sign_digest(&sha256(b"wire")).unwrap();
        let bytes = sig.serialize();
        assert_eq!(Signature::from_slice(&bytes).unwrap(), sig);
        assert!(Signature::from_slice(&bytes[..63]).is_err());
    }

    #[test]
    fn test_private_key_rejects_zero() {
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
    }
}
