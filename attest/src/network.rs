//! Chain-id gating for ledger access.
//!
//! Token ids and contract addresses are not portable across networks, so
//! a read against the wrong chain would come back as "token does not
//! exist" rather than a meaningful error. Every ledger call is therefore
//! gated behind a [`NetworkGuard`] check against the single designated
//! chain. On a mismatch the guard requests exactly one switch; if that
//! fails or is rejected it keeps reporting `SwitchRequired` instead of
//! retrying.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

/// Errors raised by a [`NetworkProbe`].
#[derive(Clone, Debug)]
pub enum NetworkError {
    /// Could not determine the connected chain at all.
    Probe(String),
    /// The switch request was refused or failed.
    SwitchRejected(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Probe(msg) => write!(f, "network probe failed: {msg}"),
            NetworkError::SwitchRejected(msg) => write!(f, "network switch rejected: {msg}"),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Outcome of a guard check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to the designated chain; ledger calls may proceed.
    Ok,
    /// Connected elsewhere and not correctable; ledger calls must not
    /// proceed. `connected` is the chain id actually observed.
    SwitchRequired { connected: u64 },
}

/// Access to the connection's current chain and switch capability.
///
/// Implemented over whatever session layer holds the connection; the
/// guard only needs these two operations.
#[async_trait::async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Chain id currently connected.
    async fn chain_id(&self) -> Result<u64, NetworkError>;

    /// Asks the connection to move to `chain_id`.
    async fn switch_to(&self, chain_id: u64) -> Result<(), NetworkError>;
}

#[async_trait::async_trait]
impl<P: NetworkProbe + ?Sized> NetworkProbe for Box<P> {
    async fn chain_id(&self) -> Result<u64, NetworkError> {
        (**self).chain_id().await
    }

    async fn switch_to(&self, chain_id: u64) -> Result<(), NetworkError> {
        (**self).switch_to(chain_id).await
    }
}

#[async_trait::async_trait]
impl<P: NetworkProbe + ?Sized> NetworkProbe for std::sync::Arc<P> {
    async fn chain_id(&self) -> Result<u64, NetworkError> {
        (**self).chain_id().await
    }

    async fn switch_to(&self, chain_id: u64) -> Result<(), NetworkError> {
        (**self).switch_to(chain_id).await
    }
}

/// Gate enforcing that operations run against one designated chain.
pub struct NetworkGuard<P> {
    target: u64,
    probe: P,
    switch_attempted: AtomicBool,
}

impl<P: NetworkProbe> NetworkGuard<P> {
    pub fn new(target: u64, probe: P) -> Self {
        Self {
            target,
            probe,
            switch_attempted: AtomicBool::new(false),
        }
    }

    /// The designated chain id.
    pub fn target(&self) -> u64 {
        self.target
    }

    /// Checks the connected chain, attempting a single corrective switch
    /// on first mismatch.
    ///
    /// Once the one switch attempt has been spent, further mismatches
    /// report `SwitchRequired` without asking again; the caller decides
    /// when to re-arm via [`reset`](Self::reset) (e.g. after the user
    /// reconnects).
    pub async fn check(&self) -> Result<NetworkStatus, NetworkError> {
        let connected = self.probe.chain_id().await?;
        if connected == self.target {
            return Ok(NetworkStatus::Ok);
        }

        if self.switch_attempted.swap(true, Ordering::SeqCst) {
            return Ok(NetworkStatus::SwitchRequired { connected });
        }

        warn!(connected, target = self.target, "wrong chain, requesting switch");
        match self.probe.switch_to(self.target).await {
            Ok(()) => {
                let after = self.probe.chain_id().await?;
                if after == self.target {
                    Ok(NetworkStatus::Ok)
                } else {
                    Ok(NetworkStatus::SwitchRequired { connected: after })
                }
            }
            Err(NetworkError::SwitchRejected(_)) => {
                Ok(NetworkStatus::SwitchRequired { connected })
            }
            Err(e) => Err(e),
        }
    }

    /// Re-arms the single switch attempt.
    pub fn reset(&self) {
        self.switch_attempted.store(false, Ordering::SeqCst);
    }
}
