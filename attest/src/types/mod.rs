//! Core domain types for the attestation protocol.
//!
//! This module defines strongly-typed addresses, digests, signatures, and
//! ledger records shared across the crate. The goal is to avoid "naked"
//! strings and byte buffers in public APIs and instead use domain-specific
//! newtypes, so that a product id can never be passed where a metadata URI
//! is expected and a raw hash can never stand in for a signed digest.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata document types and data-URI handling.
pub mod metadata;

pub use metadata::{Attribute, MetadataError, ProductMetadata};

/// Length in bytes of an EVM account address.
pub const ADDRESS_LEN: usize = 20;

/// Length in bytes of all 256-bit digests used in this crate (Keccak-256).
pub const HASH_LEN: usize = 32;

/// Length in bytes of a recoverable secp256k1 signature (r ‖ s ‖ v).
pub const SIGNATURE_LEN: usize = 65;

/// Error produced when parsing a textual address or signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AddressParseError {
    /// The string is not `0x` followed by exactly 40 hex characters.
    BadLength(usize),
    /// The string contains non-hexadecimal characters.
    BadHex,
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressParseError::BadLength(n) => {
                write!(f, "expected 0x followed by 40 hex chars, got {n} chars")
            }
            AddressParseError::BadHex => write!(f, "input contains non-hex characters"),
        }
    }
}

impl std::error::Error for AddressParseError {}

/// A 20-byte EVM account address.
///
/// Addresses enter the system as `0x`-prefixed hex strings (wallet input,
/// config, deep links) and are parsed exactly once at the boundary; all
/// internal code works with the fixed-size byte form. The packed
/// attestation encoding appends these 20 bytes verbatim, so the length
/// check here is load-bearing for signature interoperability.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Parses a `0x`-prefixed, 40-hex-char address string.
    pub fn parse(s: &str) -> Result<Self, AddressParseError> {
        let body = s
            .strip_prefix("0x")
            .ok_or(AddressParseError::BadLength(s.len()))?;
        if body.len() != ADDRESS_LEN * 2 {
            return Err(AddressParseError::BadLength(s.len()));
        }
        let bytes = hex::decode(body).map_err(|_| AddressParseError::BadHex)?;
        let mut arr = [0u8; ADDRESS_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Address(arr))
    }

    /// Returns the underlying 20 bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A 32-byte Keccak-256 digest of the canonical packed attestation encoding.
///
/// This is the artifact a manufacturer signs and a verifier independently
/// re-derives from ledger state. Two `AttestationHash` values are equal
/// exactly when the underlying (productId, metadataURI, recipient) triples
/// encode to the same bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AttestationHash(pub [u8; HASH_LEN]);

impl AttestationHash {
    /// Returns the underlying 32-byte digest as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// Recoverable secp256k1 signature bytes (r ‖ s ‖ v, 65 bytes).
///
/// Produced once by the signer service and then immutably attached to the
/// on-chain product record. The bytes are carried opaquely here; recovery
/// and validation live in [`crate::signer`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Parses a `0x`-prefixed hex signature, checking the 65-byte length.
    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let body = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(body).map_err(|_| AddressParseError::BadHex)?;
        if bytes.len() != SIGNATURE_LEN {
            return Err(AddressParseError::BadLength(bytes.len()));
        }
        Ok(Signature(bytes))
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

/// Ledger-assigned integer identifying one minted attestation.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The claim a manufacturer signs: a product bound to its metadata and a
/// recipient. Immutable once hashed; any field change produces a different
/// [`AttestationHash`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProductAttestation {
    /// Manufacturer-chosen product identifier; uniqueness is enforced by
    /// the ledger, not by this core.
    pub product_id: String,
    /// Opaque metadata URI, typically `data:application/json;base64,...`
    /// or a plain HTTP(S) URL. Never validated against a storage backend.
    pub metadata_uri: String,
    /// Address the minted token is delivered to.
    pub recipient: Address,
}

/// Ledger-owned record for one minted product, read-only to this core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    pub manufacturer: Address,
    pub signature: Signature,
    /// Unix timestamp assigned by the ledger at mint time.
    pub mint_timestamp: u64,
    /// Set by the ledger during mint-time signature validation; the only
    /// field that may change after creation.
    pub is_verified: bool,
    pub token_id: TokenId,
}

/// One entry of the ledger's manufacturer registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManufacturerEntry {
    pub address: Address,
    pub brand_name: String,
}

/// Return tuple of the ledger's `verifyAuthenticity` read.
///
/// Field order matches the contract ABI positionally; do not reorder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthenticityReport {
    pub is_authentic: bool,
    pub product_id: String,
    pub manufacturer: Address,
    pub brand_name: String,
}

/// Terminal and transient states of one verification attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Verified,
    Unverified,
    Pending,
    Error,
}

/// Decoded product information attached to a terminal verification result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductDisplay {
    pub token_id: TokenId,
    pub product_id: String,
    pub manufacturer: Address,
    pub brand_name: String,
    /// Display name, e.g. "Rolex Product #RLX-001".
    pub name: String,
    /// Image reference decoded from the token URI, or the placeholder.
    pub image: String,
    pub attributes: Vec<Attribute>,
}

/// Outcome of one `verify(tokenId)` invocation. Created fresh per attempt
/// and never persisted by this core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    /// Present on VERIFIED (full display info) and UNVERIFIED (product id
    /// and manufacturer only, for operator context).
    pub product: Option<ProductDisplay>,
    /// Human-readable classification on UNVERIFIED and ERROR.
    pub error: Option<String>,
}

impl VerificationResult {
    /// Constructs an ERROR result with the given message.
    pub fn error(msg: impl Into<String>) -> Self {
        VerificationResult {
            status: VerificationStatus::Error,
            product: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_accepts_canonical_forms() {
        let addr = Address::parse("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef").unwrap();
        assert_eq!(addr.to_hex(), "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef");

        // Mixed case is fine; we normalise to lowercase on output.
        let addr = Address::parse("0xAbCdEf0123456789AbCdEf0123456789AbCdEf01").unwrap();
        assert_eq!(addr.as_bytes()[0], 0xAB);
    }

    #[test]
    fn address_parse_rejects_malformed_input() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("0x").is_err());
        assert!(Address::parse("0x123").is_err());
        assert!(Address::parse("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef").is_err());
        assert!(matches!(
            Address::parse("0xGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG"),
            Err(AddressParseError::BadHex)
        ));
    }

    #[test]
    fn address_serde_round_trips_as_hex_string() {
        let addr = Address::parse("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn signature_hex_round_trip_enforces_length() {
        let sig = Signature(vec![0x11; SIGNATURE_LEN]);
        let parsed = Signature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(parsed, sig);

        assert!(Signature::from_hex("0x1234").is_err());
    }

    #[test]
    fn verification_status_serialises_uppercase() {
        let json = serde_json::to_string(&VerificationStatus::Verified).unwrap();
        assert_eq!(json, "\"VERIFIED\"");
        let json = serde_json::to_string(&VerificationStatus::Unverified).unwrap();
        assert_eq!(json, "\"UNVERIFIED\"");
    }
}
