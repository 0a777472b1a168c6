//! The minting pipeline: metadata, hash, signature, ledger write.
//!
//! A mint runs strictly in this order: build (or accept) the metadata
//! URI, derive the attestation hash, obtain the manufacturer signature,
//! then submit the write and wait for confirmation. The signature always
//! exists before the transaction is submitted, and "minted" is only
//! reported once the ledger confirms.
//!
//! Mints for the same product id are never allowed in flight twice at
//! once: the ledger enforces product id uniqueness, so a racing duplicate
//! would just burn a transaction. The second caller gets an error rather
//! than a silent dedup.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::info;

use crate::codec::{EncodingError, attestation_hash};
use crate::config::MintConfig;
use crate::ledger::{LedgerError, LedgerGateway};
use crate::metrics::MetricsRegistry;
use crate::network::{NetworkGuard, NetworkProbe, NetworkStatus};
use crate::signer::{AttestationSigner, SigningError};
use crate::types::{Address, ManufacturerEntry, ProductMetadata, TokenId};

/// Errors surfaced by the minting pipeline.
#[derive(Debug)]
pub enum MintError {
    /// Product id or metadata URI was empty.
    Encoding(EncodingError),
    /// The inline metadata document exceeds the configured byte cap;
    /// host it externally and mint with the URL instead.
    MetadataTooLarge { size: usize, limit: usize },
    /// This product id has already been minted on the ledger.
    ProductExists(String),
    /// Another mint for the same product id is currently in flight.
    DuplicateInFlight(String),
    /// The connected chain is not the contract's chain and could not be
    /// switched; nothing was submitted.
    WrongNetwork { connected: u64, target: u64 },
    /// The chain-id probe itself failed, so the network could not be
    /// confirmed before writing.
    Network(String),
    /// The signer could not produce a signature.
    Signing(SigningError),
    /// The ledger rejected the write or could not be reached.
    Ledger(LedgerError),
}

impl fmt::Display for MintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintError::Encoding(e) => write!(f, "{e}"),
            MintError::MetadataTooLarge { size, limit } => write!(
                f,
                "inline metadata is {size} bytes, over the {limit} byte limit; \
                 host it externally and mint with the URL"
            ),
            MintError::ProductExists(id) => {
                write!(f, "product id '{id}' has already been minted")
            }
            MintError::DuplicateInFlight(id) => {
                write!(f, "a mint for product id '{id}' is already in flight")
            }
            MintError::WrongNetwork { connected, target } => write!(
                f,
                "connected to chain {connected}, but this contract lives on \
                 chain {target}; switch networks and retry"
            ),
            MintError::Network(msg) => {
                write!(f, "could not confirm the connected network: {msg}")
            }
            MintError::Signing(e) => write!(f, "{e}"),
            MintError::Ledger(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MintError {}

impl From<EncodingError> for MintError {
    fn from(e: EncodingError) -> Self {
        MintError::Encoding(e)
    }
}

impl From<SigningError> for MintError {
    fn from(e: SigningError) -> Self {
        MintError::Signing(e)
    }
}

impl From<LedgerError> for MintError {
    fn from(e: LedgerError) -> Self {
        MintError::Ledger(e)
    }
}

/// Signs and submits product attestations.
pub struct MintService<L, S> {
    ledger: Arc<L>,
    signer: Arc<S>,
    config: MintConfig,
    guard: Option<NetworkGuard<Box<dyn NetworkProbe>>>,
    metrics: Option<Arc<MetricsRegistry>>,
    in_flight: Mutex<HashSet<String>>,
}

/// Releases the in-flight reservation for a product id on drop, so every
/// exit path of a mint (including errors) frees the id.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    product_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .expect("in-flight set lock")
            .remove(&self.product_id);
    }
}

impl<L: LedgerGateway, S: AttestationSigner> MintService<L, S> {
    pub fn new(ledger: Arc<L>, signer: Arc<S>, config: MintConfig) -> Self {
        Self {
            ledger,
            signer,
            config,
            guard: None,
            metrics: None,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Gates every ledger call behind a chain-id check; a mismatched or
    /// unreachable network fails the mint before anything is submitted.
    pub fn with_guard(mut self, guard: NetworkGuard<Box<dyn NetworkProbe>>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Mints with an inline metadata document, encoded as a base64 data
    /// URI and bounded by the configured size cap.
    pub async fn mint(
        &self,
        recipient: &Address,
        product_id: &str,
        metadata: &ProductMetadata,
    ) -> Result<TokenId, MintError> {
        let uri = metadata.to_data_uri();
        if uri.len() > self.config.max_inline_metadata_bytes {
            return Err(MintError::MetadataTooLarge {
                size: uri.len(),
                limit: self.config.max_inline_metadata_bytes,
            });
        }
        self.mint_with_uri(recipient, product_id, &uri).await
    }

    /// Mints with an already-prepared metadata URI (inline or external).
    pub async fn mint_with_uri(
        &self,
        recipient: &Address,
        product_id: &str,
        metadata_uri: &str,
    ) -> Result<TokenId, MintError> {
        self.check_network().await?;
        let _guard = self.reserve(product_id)?;

        if self.ledger.product_exists(product_id).await? {
            return Err(MintError::ProductExists(product_id.to_string()));
        }

        let hash = attestation_hash(product_id, metadata_uri, recipient)?;
        let signature = self.signer.sign(&hash).await?;

        let started = Instant::now();
        let outcome = self
            .ledger
            .mint_product(recipient, product_id, metadata_uri, &signature)
            .await;

        if let Some(m) = &self.metrics {
            m.mint.mint_seconds.observe(started.elapsed().as_secs_f64());
            match &outcome {
                Ok(_) => m.mint.confirmed_total.inc(),
                Err(_) => m.mint.failed_total.inc(),
            }
        }

        let token_id = outcome?;
        info!(%token_id, product_id, "mint confirmed");
        Ok(token_id)
    }

    /// Registers a manufacturer on the ledger (owner-privileged there).
    pub async fn register_manufacturer(
        &self,
        entry: &ManufacturerEntry,
    ) -> Result<(), MintError> {
        self.check_network().await?;
        self.ledger.register_manufacturer(entry).await?;
        info!(address = %entry.address, brand = entry.brand_name, "manufacturer registered");
        Ok(())
    }

    async fn check_network(&self) -> Result<(), MintError> {
        let Some(guard) = &self.guard else {
            return Ok(());
        };
        match guard.check().await {
            Ok(NetworkStatus::Ok) => Ok(()),
            Ok(NetworkStatus::SwitchRequired { connected }) => Err(MintError::WrongNetwork {
                connected,
                target: guard.target(),
            }),
            Err(e) => Err(MintError::Network(e.to_string())),
        }
    }

    fn reserve(&self, product_id: &str) -> Result<InFlightGuard<'_>, MintError> {
        let mut set = self.in_flight.lock().expect("in-flight set lock");
        if !set.insert(product_id.to_string()) {
            return Err(MintError::DuplicateInFlight(product_id.to_string()));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            product_id: product_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::signer::LocalKeySigner;
    use crate::types::{ADDRESS_LEN, Attribute};

    const CHAIN: u64 = 84532;

    fn recipient() -> Address {
        Address([0xB2; ADDRESS_LEN])
    }

    fn sample_metadata() -> ProductMetadata {
        ProductMetadata {
            name: "Rolex Product #RLX-001".to_string(),
            description: "Authentic Rolex product".to_string(),
            image: "https://cdn.example/rlx-001.png".to_string(),
            attributes: vec![
                Attribute::new("Product ID", "RLX-001"),
                Attribute::new("Brand", "Rolex"),
            ],
        }
    }

    async fn service() -> (Arc<InMemoryLedger>, MintService<InMemoryLedger, LocalKeySigner>) {
        let ledger = Arc::new(InMemoryLedger::new(CHAIN));
        let signer = Arc::new(LocalKeySigner::from_secret_bytes(&[0x51; 32]).unwrap());
        ledger
            .register_manufacturer(&ManufacturerEntry {
                address: signer.address(),
                brand_name: "Rolex".to_string(),
            })
            .await
            .unwrap();
        let svc = MintService::new(ledger.clone(), signer, MintConfig::default());
        (ledger, svc)
    }

    #[tokio::test]
    async fn mint_signs_then_submits_and_confirms() {
        let (ledger, svc) = service().await;

        let token_id = svc
            .mint(&recipient(), "RLX-001", &sample_metadata())
            .await
            .unwrap();
        assert_eq!(token_id, TokenId(1));

        // The record the ledger stored round-trips to the inline document.
        let uri = ledger.token_uri(token_id).await.unwrap();
        let meta = ProductMetadata::from_data_uri(&uri).unwrap();
        assert_eq!(meta.name, "Rolex Product #RLX-001");
    }

    #[tokio::test]
    async fn duplicate_product_id_is_rejected_before_signing() {
        let (_ledger, svc) = service().await;
        svc.mint(&recipient(), "RLX-001", &sample_metadata())
            .await
            .unwrap();

        let err = svc
            .mint(&recipient(), "RLX-001", &sample_metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::ProductExists(_)));
    }

    #[tokio::test]
    async fn oversized_inline_metadata_is_rejected() {
        let (_ledger, svc) = service().await;
        let mut metadata = sample_metadata();
        metadata.image = format!("data:image/png;base64,{}", "A".repeat(64 * 1024));

        let err = svc
            .mint(&recipient(), "RLX-002", &metadata)
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::MetadataTooLarge { .. }));
    }

    #[tokio::test]
    async fn unregistered_signer_is_an_authoritative_rejection() {
        let ledger = Arc::new(InMemoryLedger::new(CHAIN));
        let signer = Arc::new(LocalKeySigner::from_secret_bytes(&[0x66; 32]).unwrap());
        let svc = MintService::new(ledger, signer, MintConfig::default());

        let err = svc
            .mint(&recipient(), "FAKE-001", &sample_metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::Ledger(LedgerError::Reverted(_))));
    }

    #[tokio::test]
    async fn wrong_chain_blocks_every_write_before_the_ledger() {
        use crate::network::NetworkError;

        struct PinnedWrongChain;

        #[async_trait::async_trait]
        impl NetworkProbe for PinnedWrongChain {
            async fn chain_id(&self) -> Result<u64, NetworkError> {
                Ok(1)
            }

            async fn switch_to(&self, _chain_id: u64) -> Result<(), NetworkError> {
                Err(NetworkError::SwitchRejected("pinned".to_string()))
            }
        }

        let ledger = Arc::new(InMemoryLedger::new(CHAIN));
        let signer = Arc::new(LocalKeySigner::from_secret_bytes(&[0x51; 32]).unwrap());
        ledger
            .register_manufacturer(&ManufacturerEntry {
                address: signer.address(),
                brand_name: "Rolex".to_string(),
            })
            .await
            .unwrap();

        let probe: Box<dyn NetworkProbe> = Box::new(PinnedWrongChain);
        let svc = MintService::new(ledger.clone(), signer, MintConfig::default())
            .with_guard(NetworkGuard::new(CHAIN, probe));

        let err = svc
            .mint(&recipient(), "RLX-020", &sample_metadata())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MintError::WrongNetwork { connected: 1, target: CHAIN }
        ));

        let err = svc
            .register_manufacturer(&ManufacturerEntry {
                address: recipient(),
                brand_name: "Omega".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::WrongNetwork { .. }));

        // Nothing was submitted while on the wrong chain.
        assert!(!ledger.product_exists("RLX-020").await.unwrap());
        assert!(!ledger.is_manufacturer(&recipient()).await.unwrap());
    }

    #[tokio::test]
    async fn in_flight_reservation_is_released_after_failure() {
        let (_ledger, svc) = service().await;
        let mut metadata = sample_metadata();
        metadata.image = format!("data:image/png;base64,{}", "A".repeat(64 * 1024));

        // First attempt fails on the size cap before reserving completes
        // the mint; the id must be mintable afterwards.
        assert!(svc.mint(&recipient(), "RLX-003", &metadata).await.is_err());
        svc.mint(&recipient(), "RLX-003", &sample_metadata())
            .await
            .unwrap();
    }
}
