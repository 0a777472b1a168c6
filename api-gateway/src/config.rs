//! API gateway configuration.
//!
//! The HTTP listen address plus environment overrides for the underlying
//! attestation configuration. The signer key is only ever read from the
//! environment here, server-side; it is never accepted over the API.

use std::net::SocketAddr;

use attest::AttestConfig;

/// Configuration for the API gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal.
        // Bind to all interfaces so the container port mapping (8081→8081) is reachable
        // from the host when running under docker-compose.
        let addr: SocketAddr = "0.0.0.0:8081"
            .parse()
            .expect("hard-coded API listen address should parse");
        Self { listen_addr: addr }
    }
}

impl ApiConfig {
    /// Loads the listen address, honouring `API_LISTEN_ADDR`.
    pub fn load() -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Ok(addr) = std::env::var("API_LISTEN_ADDR") {
            cfg.listen_addr = addr
                .parse()
                .map_err(|e| format!("bad API_LISTEN_ADDR '{addr}': {e}"))?;
        }
        Ok(cfg)
    }
}

/// Builds the attestation config from defaults plus environment overrides.
///
/// Recognised variables:
///
/// - `ATTEST_RPC_URL`: JSON-RPC endpoint,
/// - `ATTEST_CONTRACT`: deployed contract address,
/// - `ATTEST_FROM`: sender address for write transactions,
/// - `ATTEST_CHAIN_ID`: designated chain id,
/// - `ATTEST_SIGNER_KEY`: hex secp256k1 secret for the manufacturer
///   signer; absent means the gateway runs verification-only.
pub fn load_attest_config() -> Result<AttestConfig, String> {
    let mut cfg = AttestConfig::default();

    if let Ok(url) = std::env::var("ATTEST_RPC_URL") {
        cfg.ledger.rpc_url = url;
    }
    if let Ok(contract) = std::env::var("ATTEST_CONTRACT") {
        cfg.ledger.contract_address = contract;
    }
    if let Ok(from) = std::env::var("ATTEST_FROM") {
        cfg.ledger.from_address = from;
    }
    if let Ok(chain) = std::env::var("ATTEST_CHAIN_ID") {
        cfg.ledger.chain_id = chain
            .parse()
            .map_err(|e| format!("bad ATTEST_CHAIN_ID '{chain}': {e}"))?;
    }
    if let Ok(key) = std::env::var("ATTEST_SIGNER_KEY") {
        cfg.signer.secret_hex = key;
    }

    Ok(cfg)
}
