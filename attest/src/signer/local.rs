//! In-process signer backed by a locally held secp256k1 key.
//!
//! Intended for server-side deployments where the key arrives from the
//! environment or a secrets manager at startup. The raw scalar is wrapped
//! in k256's `SigningKey` (which zeroizes on drop); intermediate byte
//! buffers are wiped here before returning.

use k256::ecdsa::SigningKey;
use zeroize::Zeroize;

use crate::codec::personal_message_hash;
use crate::types::{Address, AttestationHash, Signature};

use super::{AttestationSigner, SigningError, address_of_key};

/// Signer holding one manufacturer authorization key in process memory.
pub struct LocalKeySigner {
    key: SigningKey,
    address: Address,
}

impl LocalKeySigner {
    /// Constructs a signer from a raw 32-byte secret scalar.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, SigningError> {
        let key =
            SigningKey::from_slice(secret).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let address = address_of_key(key.verifying_key());
        Ok(Self { key, address })
    }

    /// Constructs a signer from a `0x`-prefixed hex secret, wiping the
    /// decoded buffer afterwards.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, SigningError> {
        let body = secret_hex.strip_prefix("0x").unwrap_or(secret_hex);
        let mut bytes =
            hex::decode(body).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let result = Self::from_secret_bytes(&bytes);
        bytes.zeroize();
        result
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("LocalKeySigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl AttestationSigner for LocalKeySigner {
    async fn sign(&self, hash: &AttestationHash) -> Result<Signature, SigningError> {
        let digest = personal_message_hash(hash);
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| SigningError::Signing(e.to_string()))?;

        // r ‖ s ‖ v with the Ethereum 27/28 convention for v.
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(27 + recid.to_byte());
        Ok(Signature(bytes))
    }

    fn address(&self) -> Address {
        self.address
    }
}
