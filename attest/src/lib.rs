//! Attestation library crate.
//!
//! This crate provides the core building blocks for a product
//! authenticity attestation protocol over an ERC-721-style ledger:
//!
//! - strongly-typed domain types (`types`),
//! - the canonical packed encoding and hash (`codec`),
//! - manufacturer signing (`signer`),
//! - ledger gateways, JSON-RPC and in-memory (`ledger`),
//! - the verification state machine (`verify`),
//! - the minting pipeline (`mint`),
//! - chain-id gating (`network`),
//! - verification deep links (`link`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level configuration (`config`).
//!
//! Higher-level binaries can compose these pieces to build verification
//! services, minting backends, and test harnesses.

pub mod codec;
pub mod config;
pub mod ledger;
pub mod link;
pub mod metrics;
pub mod mint;
pub mod network;
pub mod signer;
pub mod types;
pub mod verify;

// Re-export top-level configuration types.
pub use config::{AttestConfig, LedgerConfig, MetricsConfig, MintConfig, SignerConfig};

// Re-export the codec surface.
pub use codec::{EncodingError, attestation_hash, personal_message_hash};

// Re-export signing interfaces and the local key signer.
pub use signer::{AttestationSigner, LocalKeySigner, SigningError, recover_signer};

// Re-export ledger gateways.
pub use ledger::{InMemoryLedger, JsonRpcLedger, LedgerError, LedgerGateway};

// Re-export the verification and minting services.
pub use mint::{MintError, MintService};
pub use verify::{VerificationEngine, VerifyOutcome};

// Re-export network gating.
pub use network::{NetworkError, NetworkGuard, NetworkProbe, NetworkStatus};

// Re-export deep-link parsing.
pub use link::{LinkError, VerifyLink, parse_verify_link};

// Re-export metrics registry.
pub use metrics::{MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;
