//! Shared application state and the RPC chain probe.

use std::sync::Arc;

use attest::{
    JsonRpcLedger, LedgerGateway, LocalKeySigner, MintService, NetworkError, NetworkProbe,
    VerificationEngine,
};

/// Network probe over the gateway's own RPC connection.
///
/// A server endpoint is pinned to whatever chain it serves, so a switch
/// request can never succeed; a misconfigured endpoint therefore surfaces
/// as a persistent `SwitchRequired` instead of silently serving wrong
/// "token does not exist" answers.
pub struct RpcChainProbe {
    ledger: Arc<JsonRpcLedger>,
}

impl RpcChainProbe {
    pub fn new(ledger: Arc<JsonRpcLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait::async_trait]
impl NetworkProbe for RpcChainProbe {
    async fn chain_id(&self) -> Result<u64, NetworkError> {
        self.ledger
            .chain_id()
            .await
            .map_err(|e| NetworkError::Probe(e.to_string()))
    }

    async fn switch_to(&self, _chain_id: u64) -> Result<(), NetworkError> {
        Err(NetworkError::SwitchRejected(
            "rpc endpoint is pinned to one chain".to_string(),
        ))
    }
}

/// Shared state held by the API handlers.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// Verification state machine over the shared RPC ledger.
    ///
    /// Invocations are globally ordered: a newer `verify` call supersedes
    /// any in-flight one regardless of which client issued it, and the
    /// superseded caller gets a 409 with retry guidance. Stale-result
    /// suppression is keyed by invocation recency, not by caller.
    pub engine: VerificationEngine<JsonRpcLedger>,
    /// Minting pipeline; `None` when no signer key is configured, in
    /// which case the gateway runs verification-only.
    pub minter: Option<MintService<JsonRpcLedger, LocalKeySigner>>,
    /// Shared ledger gateway for direct reads (manufacturer lookups).
    pub ledger: Arc<JsonRpcLedger>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
