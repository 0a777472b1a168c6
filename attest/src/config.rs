//! Top-level configuration for the attestation core.
//!
//! This module aggregates configuration for:
//!
//! - the ledger gateway (RPC URL, contract address, designated chain id),
//! - the signer (where the authorization key comes from),
//! - minting limits,
//! - the metrics exporter (enable flag + listen address).
//!
//! The goal is a single `AttestConfig` struct that higher-level binaries
//! can construct from defaults, config files, or environment variables as
//! needed.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the JSON-RPC ledger gateway.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL, e.g. `"https://sepolia.base.org"`.
    pub rpc_url: String,
    /// Deployed attestation contract address (`0x` + 40 hex chars).
    pub contract_address: String,
    /// Sender address for write transactions; signing is delegated to the
    /// RPC provider's key management, this core holds no transaction keys.
    pub from_address: String,
    /// The single designated chain id all operations are gated to.
    pub chain_id: u64,
    /// Request timeout for RPC calls.
    pub timeout: Duration,
    /// How long to poll for a write transaction's receipt before giving up.
    pub confirmation_timeout: Duration,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            // Base Sepolia, where the production contract is deployed.
            rpc_url: "https://sepolia.base.org".to_string(),
            contract_address: "0x74dba1EE38Db3f03491D6Ccd3dA4Bf7D525FD2D7".to_string(),
            from_address: "0x0000000000000000000000000000000000000000".to_string(),
            chain_id: 84532,
            timeout: Duration::from_secs(10),
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Configuration for the local signer.
#[derive(Clone, Debug, Default)]
pub struct SignerConfig {
    /// Hex-encoded secp256k1 secret, typically injected via environment.
    /// Empty means no signing capability (verification-only deployment).
    pub secret_hex: String,
}

/// Limits applied on the minting path.
#[derive(Clone, Debug)]
pub struct MintConfig {
    /// Upper bound on the inline `data:` metadata URI, in bytes. Larger
    /// documents must be hosted externally and passed as a plain URL;
    /// unbounded inline base64 images cannot survive contract storage
    /// gas limits.
    pub max_inline_metadata_bytes: usize,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            max_inline_metadata_bytes: 48 * 1024,
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration aggregating all the sub-configs needed to wire
/// up a typical deployment.
#[derive(Clone, Debug, Default)]
pub struct AttestConfig {
    pub ledger: LedgerConfig,
    pub signer: SignerConfig,
    pub mint: MintConfig,
    pub metrics: MetricsConfig,
}
