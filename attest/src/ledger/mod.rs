//! The ledger gateway: the external collaborator interface this core
//! consumes.
//!
//! The ledger (an ERC-721-style contract) is treated as ground truth and
//! is never reimplemented here. This module defines the generic
//! [`LedgerGateway`] trait plus the error taxonomy its callers classify
//! against; concrete implementations live in [`rpc`] (JSON-RPC against a
//! real chain) and [`mock`] (in-process, for tests and devnets).
//!
//! Method names, argument order, and return tuples are a bit-exact
//! contract with the deployed ABI: the attestation hash is positionally
//! derived from the mint arguments, so reordering anything here breaks
//! signature recovery on the other side.

use std::fmt;

use crate::types::{
    Address, AuthenticityReport, ManufacturerEntry, ProductRecord, Signature, TokenId,
};

pub mod abi;
pub mod mock;
pub mod rpc;

pub use mock::InMemoryLedger;
pub use rpc::JsonRpcLedger;

/// Errors surfaced by ledger reads and writes.
///
/// The transport only ever yields a string; the three kinds below must
/// stay distinguishable in caller-facing reporting, because "token does
/// not exist" is a different answer than "the contract rejected this"
/// which is different again from "the network is down".
#[derive(Clone, Debug)]
pub enum LedgerError {
    /// The queried token or product does not exist on this contract.
    NotFound(String),
    /// Contract-level rejection: bad signature, duplicate productId,
    /// unregistered signer, and friends. Authoritative; never retried.
    Reverted(String),
    /// Connectivity or protocol failure between us and the RPC endpoint.
    Transport(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NotFound(msg) => write!(f, "not found: {msg}"),
            LedgerError::Reverted(msg) => write!(f, "execution reverted: {msg}"),
            LedgerError::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Classifies a raw RPC error string into a [`LedgerError`].
///
/// The markers match what EVM nodes and OpenZeppelin-style contracts
/// actually emit; anything unrecognised is treated as a revert since it
/// came back from the contract side of the transport.
pub fn classify_rpc_error(msg: &str) -> LedgerError {
    let lower = msg.to_ascii_lowercase();
    if msg.contains("ERC721NonexistentToken")
        || lower.contains("nonexistent token")
        || lower.contains("does not exist")
    {
        LedgerError::NotFound(msg.to_string())
    } else if lower.contains("revert") {
        LedgerError::Reverted(msg.to_string())
    } else if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("network")
    {
        LedgerError::Transport(msg.to_string())
    } else {
        LedgerError::Reverted(msg.to_string())
    }
}

/// Read/write surface of the product attestation contract.
///
/// Reads are idempotent and side-effect free and may be issued
/// concurrently by any number of callers. Writes are state-changing
/// transactions with eventual confirmation; implementations must report
/// success only once confirmation is observed, and must treat a ledger
/// rejection as authoritative.
#[async_trait::async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Chain id of the network this gateway is connected to.
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Whether `address` is a registered manufacturer.
    async fn is_manufacturer(&self, address: &Address) -> Result<bool, LedgerError>;

    /// Brand name registered for a manufacturer address.
    async fn manufacturer_brand(&self, address: &Address) -> Result<String, LedgerError>;

    /// The contract's own authenticity check for a token. Return field
    /// order is (isAuthentic, productId, manufacturer, brandName).
    async fn verify_authenticity(
        &self,
        token_id: TokenId,
    ) -> Result<AuthenticityReport, LedgerError>;

    /// Full stored record for a minted token.
    async fn product_details(&self, token_id: TokenId) -> Result<ProductRecord, LedgerError>;

    /// Raw metadata URI for a token.
    async fn token_uri(&self, token_id: TokenId) -> Result<String, LedgerError>;

    /// Number of tokens held by an address.
    async fn balance_of(&self, address: &Address) -> Result<u64, LedgerError>;

    /// Current owner of a token.
    async fn owner_of(&self, token_id: TokenId) -> Result<Address, LedgerError>;

    /// Whether a product id has already been minted.
    async fn product_exists(&self, product_id: &str) -> Result<bool, LedgerError>;

    /// The id the next successful mint will be assigned.
    async fn next_token_id(&self) -> Result<TokenId, LedgerError>;

    /// Registers a manufacturer (owner-privileged on the real contract).
    async fn register_manufacturer(&self, entry: &ManufacturerEntry) -> Result<(), LedgerError>;

    /// Submits a mint. Argument order (to, productId, metadataURI,
    /// signature) is the positional basis of the attestation hash the
    /// ledger re-derives; it rejects the mint if signature recovery does
    /// not match a registered manufacturer.
    async fn mint_product(
        &self,
        to: &Address,
        product_id: &str,
        metadata_uri: &str,
        signature: &Signature,
    ) -> Result<TokenId, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_separates_the_three_kinds() {
        assert!(matches!(
            classify_rpc_error("execution reverted: ERC721NonexistentToken(7)"),
            LedgerError::NotFound(_)
        ));
        assert!(matches!(
            classify_rpc_error("execution reverted: Product ID already exists"),
            LedgerError::Reverted(_)
        ));
        assert!(matches!(
            classify_rpc_error("request timed out"),
            LedgerError::Transport(_)
        ));
        assert!(matches!(
            classify_rpc_error("network unreachable"),
            LedgerError::Transport(_)
        ));
    }

    #[test]
    fn unknown_contract_side_errors_default_to_reverted() {
        assert!(matches!(
            classify_rpc_error("something odd happened"),
            LedgerError::Reverted(_)
        ));
    }
}
