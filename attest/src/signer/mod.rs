//! Manufacturer signing capability.
//!
//! This module defines the [`AttestationSigner`] trait that abstracts over
//! whatever holds the manufacturer's authorization key, plus the address
//! recovery used by verifiers and by the in-memory ledger. Key material
//! never crosses this boundary: callers hand in an [`AttestationHash`] and
//! get back a detached [`Signature`], nothing else.
//!
//! Signing sits behind the trait so deployments can back it with a
//! server-side key loaded from the environment
//! ([`local::LocalKeySigner`]) or an external key service, one key per
//! manufacturer identity; a key is never embedded in client-observable
//! code.

use std::fmt;

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};

use crate::codec::{keccak256, personal_message_hash};
use crate::types::{ADDRESS_LEN, Address, AttestationHash, SIGNATURE_LEN, Signature};

pub mod local;

pub use local::LocalKeySigner;

/// Errors raised by signing and recovery.
#[derive(Clone, Debug)]
pub enum SigningError {
    /// The configured key is absent or not a valid secp256k1 scalar.
    InvalidKey(String),
    /// The signing operation itself failed.
    Signing(String),
    /// A signature to recover from is not 65 bytes or has a bad v byte.
    MalformedSignature(String),
    /// Recovery produced no valid public key for the digest.
    Recovery(String),
}

impl fmt::Display for SigningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningError::InvalidKey(msg) => write!(f, "invalid signing key: {msg}"),
            SigningError::Signing(msg) => write!(f, "signing failed: {msg}"),
            SigningError::MalformedSignature(msg) => write!(f, "malformed signature: {msg}"),
            SigningError::Recovery(msg) => write!(f, "signer recovery failed: {msg}"),
        }
    }
}

impl std::error::Error for SigningError {}

/// Abstract signing capability for attestation hashes.
///
/// `sign` is a suspension point: implementations may hop to another
/// service or an HSM. The key itself must never leave the implementation.
#[async_trait::async_trait]
pub trait AttestationSigner: Send + Sync {
    /// Signs an attestation hash (after personal-message prefixing),
    /// returning a 65-byte recoverable signature.
    async fn sign(&self, hash: &AttestationHash) -> Result<Signature, SigningError>;

    /// The address signatures from this signer recover to.
    fn address(&self) -> Address;
}

/// Derives the EVM address of a public key: last 20 bytes of
/// keccak256 over the uncompressed point without its 0x04 tag.
pub(crate) fn address_of_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; ADDRESS_LEN];
    addr.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
    Address(addr)
}

/// Recovers the signer address of a recoverable signature over an
/// attestation hash.
///
/// The prefix step here must mirror the signing side exactly; see
/// [`crate::codec::personal_message_hash`].
pub fn recover_signer(hash: &AttestationHash, sig: &Signature) -> Result<Address, SigningError> {
    let bytes = sig.as_bytes();
    if bytes.len() != SIGNATURE_LEN {
        return Err(SigningError::MalformedSignature(format!(
            "expected {SIGNATURE_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    let v = bytes[64];
    // Accept both the Ethereum convention (27/28) and a raw recovery id.
    let recid_byte = if v >= 27 { v - 27 } else { v };
    let recid = RecoveryId::from_byte(recid_byte).ok_or_else(|| {
        SigningError::MalformedSignature(format!("recovery byte {v} out of range"))
    })?;

    let ecdsa_sig = EcdsaSignature::from_slice(&bytes[..64])
        .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;

    let digest = personal_message_hash(hash);
    let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &ecdsa_sig, recid)
        .map_err(|e| SigningError::Recovery(e.to_string()))?;

    Ok(address_of_key(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::attestation_hash;

    const TEST_KEY: [u8; 32] = [0x42; 32];

    fn test_hash(product_id: &str) -> AttestationHash {
        attestation_hash(product_id, "data:application/json;base64,e30=", &Address::default())
            .expect("valid triple")
    }

    #[tokio::test]
    async fn sign_then_recover_yields_signer_address() {
        let signer = LocalKeySigner::from_secret_bytes(&TEST_KEY).unwrap();
        let hash = test_hash("RLX-001");

        let sig = signer.sign(&hash).await.unwrap();
        assert_eq!(sig.as_bytes().len(), SIGNATURE_LEN);

        let recovered = recover_signer(&hash, &sig).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[tokio::test]
    async fn recovery_against_a_different_hash_gives_a_different_address() {
        let signer = LocalKeySigner::from_secret_bytes(&TEST_KEY).unwrap();
        let sig = signer.sign(&test_hash("RLX-001")).await.unwrap();

        // Same signature checked against a tampered product id must not
        // recover to the signer.
        let recovered = recover_signer(&test_hash("RLX-002"), &sig);
        match recovered {
            Ok(addr) => assert_ne!(addr, signer.address()),
            Err(SigningError::Recovery(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn recover_rejects_short_signatures() {
        let err = recover_signer(&test_hash("RLX-001"), &Signature(vec![0u8; 10])).unwrap_err();
        assert!(matches!(err, SigningError::MalformedSignature(_)));
    }

    #[test]
    fn recover_rejects_out_of_range_recovery_byte() {
        let mut bytes = vec![0x01; SIGNATURE_LEN];
        bytes[64] = 99; // neither a raw recovery id nor 27/28

        let err = recover_signer(&test_hash("RLX-001"), &Signature(bytes)).unwrap_err();
        assert!(matches!(err, SigningError::MalformedSignature(_)));
    }
}
