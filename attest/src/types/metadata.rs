//! ERC-721-style product metadata and its inline data-URI form.
//!
//! Token metadata reaches verifiers as an opaque `tokenURI` string in one
//! of two shapes:
//!
//! - `data:application/json;base64,<b64>` embedding the JSON document
//!   inline, as the minting flow produces, or
//! - a plain HTTP(S) URL pointing at externally hosted metadata.
//!
//! Decoding is best-effort by design: a malformed document never fails a
//! verification, it only degrades the displayed image to a placeholder.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Prefix of the inline metadata form.
pub const DATA_URI_PREFIX: &str = "data:application/json;base64,";

/// Image reference used when a token's metadata cannot be decoded.
pub const PLACEHOLDER_IMAGE: &str =
    "https://images.unsplash.com/photo-1549298916-b41d501d3772?w=400&h=400&fit=crop&crop=center";

/// Errors raised while decoding a token URI.
///
/// These are cosmetic by policy: callers absorb them and fall back to
/// [`PLACEHOLDER_IMAGE`] rather than failing the verification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MetadataError {
    /// The base64 payload of a data URI did not decode.
    Base64(String),
    /// The decoded payload was not a valid metadata JSON document.
    Json(String),
    /// The URI is neither a data URI nor an HTTP(S) URL.
    UnsupportedScheme,
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Base64(msg) => write!(f, "invalid base64 payload: {msg}"),
            MetadataError::Json(msg) => write!(f, "invalid metadata JSON: {msg}"),
            MetadataError::UnsupportedScheme => write!(f, "unsupported token URI scheme"),
        }
    }
}

impl std::error::Error for MetadataError {}

/// One `{trait_type, value}` pair of the metadata attributes array.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

impl Attribute {
    pub fn new(trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }
}

/// The metadata JSON document embedded in (or referenced by) a token URI.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl ProductMetadata {
    /// Serialises this document and wraps it as an inline data URI.
    pub fn to_data_uri(&self) -> String {
        // Serialisation of a plain struct with string fields cannot fail.
        let json = serde_json::to_string(self).expect("metadata document serialises");
        format!("{DATA_URI_PREFIX}{}", BASE64.encode(json.as_bytes()))
    }

    /// Decodes the inline data-URI form back into a document.
    pub fn from_data_uri(uri: &str) -> Result<Self, MetadataError> {
        let payload = uri
            .strip_prefix(DATA_URI_PREFIX)
            .ok_or(MetadataError::UnsupportedScheme)?;
        let bytes = BASE64
            .decode(payload)
            .map_err(|e| MetadataError::Base64(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| MetadataError::Json(e.to_string()))
    }
}

/// A decoded token URI: either an inline document or an external URL.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenUri {
    /// Metadata embedded directly in the URI.
    Inline(ProductMetadata),
    /// Plain HTTP(S) URL; used as the image reference directly.
    External(String),
}

/// Classifies and decodes a raw token URI string.
pub fn decode_token_uri(uri: &str) -> Result<TokenUri, MetadataError> {
    if uri.starts_with(DATA_URI_PREFIX) {
        ProductMetadata::from_data_uri(uri).map(TokenUri::Inline)
    } else if uri.starts_with("http://") || uri.starts_with("https://") {
        Ok(TokenUri::External(uri.to_string()))
    } else {
        Err(MetadataError::UnsupportedScheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProductMetadata {
        ProductMetadata {
            name: "Submariner Date".to_string(),
            description: "Authentic Rolex luxury product".to_string(),
            image: "https://img.example/submariner.png".to_string(),
            attributes: vec![
                Attribute::new("Brand", "Rolex"),
                Attribute::new("Category", "Watch"),
                Attribute::new("Product ID", "RLX-126610"),
                Attribute::new("Authenticity", "Verified"),
            ],
        }
    }

    #[test]
    fn data_uri_round_trip_preserves_document() {
        let meta = sample();
        let uri = meta.to_data_uri();
        assert!(uri.starts_with(DATA_URI_PREFIX));

        let decoded = ProductMetadata::from_data_uri(&uri).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn decode_classifies_external_urls() {
        let uri = "https://metadata.example/token/7.json";
        match decode_token_uri(uri).unwrap() {
            TokenUri::External(url) => assert_eq!(url, uri),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_garbage_base64() {
        let err = decode_token_uri("data:application/json;base64,!!!not-base64!!!").unwrap_err();
        assert!(matches!(err, MetadataError::Base64(_)));
    }

    #[test]
    fn decode_rejects_non_json_payload() {
        let uri = format!("{DATA_URI_PREFIX}{}", BASE64.encode(b"just some text"));
        let err = decode_token_uri(&uri).unwrap_err();
        assert!(matches!(err, MetadataError::Json(_)));
    }

    #[test]
    fn decode_rejects_unknown_schemes() {
        assert_eq!(
            decode_token_uri("ipfs://QmHash").unwrap_err(),
            MetadataError::UnsupportedScheme
        );
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{"name":"Bag"}"#;
        let uri = format!("{DATA_URI_PREFIX}{}", BASE64.encode(json.as_bytes()));
        let decoded = ProductMetadata::from_data_uri(&uri).unwrap();
        assert_eq!(decoded.name, "Bag");
        assert!(decoded.image.is_empty());
        assert!(decoded.attributes.is_empty());
    }
}
