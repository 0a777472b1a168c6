//! End-to-end tests of the attestation pipeline against the in-memory
//! ledger: mint, verify, classification, network gating, and stale-result
//! suppression.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use attest::codec::attestation_hash;
use attest::ledger::{LedgerError, LedgerGateway};
use attest::network::{NetworkError, NetworkGuard, NetworkProbe};
use attest::signer::{AttestationSigner, LocalKeySigner};
use attest::types::metadata::PLACEHOLDER_IMAGE;
use attest::types::{
    ADDRESS_LEN, Address, Attribute, AuthenticityReport, ManufacturerEntry, ProductMetadata,
    ProductRecord, Signature, TokenId, VerificationStatus,
};
use attest::{
    InMemoryLedger, MintConfig, MintError, MintService, VerificationEngine, VerifyOutcome,
};

const CHAIN: u64 = 84532;

fn recipient() -> Address {
    Address([0xC3; ADDRESS_LEN])
}

fn sample_metadata(product_id: &str) -> ProductMetadata {
    ProductMetadata {
        name: format!("Rolex Product #{product_id}"),
        description: "Authentic Rolex product".to_string(),
        image: "https://cdn.example/watch.png".to_string(),
        attributes: vec![
            Attribute::new("Product ID", product_id),
            Attribute::new("Brand", "Rolex"),
        ],
    }
}

/// Ledger wrapper that counts reads and can delay them per token id, for
/// exercising ordering and gating behaviour.
struct InstrumentedLedger {
    inner: InMemoryLedger,
    reads: AtomicUsize,
    delays: HashMap<TokenId, Duration>,
    mint_delay: Option<Duration>,
}

impl InstrumentedLedger {
    fn new(inner: InMemoryLedger) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            delays: HashMap::new(),
            mint_delay: None,
        }
    }

    fn delay(mut self, token_id: TokenId, delay: Duration) -> Self {
        self.delays.insert(token_id, delay);
        self
    }

    fn delay_mints(mut self, delay: Duration) -> Self {
        self.mint_delay = Some(delay);
        self
    }

    fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn note_read(&self, token_id: TokenId) {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&token_id) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait::async_trait]
impl LedgerGateway for InstrumentedLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.inner.chain_id().await
    }

    async fn is_manufacturer(&self, address: &Address) -> Result<bool, LedgerError> {
        self.inner.is_manufacturer(address).await
    }

    async fn manufacturer_brand(&self, address: &Address) -> Result<String, LedgerError> {
        self.inner.manufacturer_brand(address).await
    }

    async fn verify_authenticity(
        &self,
        token_id: TokenId,
    ) -> Result<AuthenticityReport, LedgerError> {
        self.note_read(token_id).await;
        self.inner.verify_authenticity(token_id).await
    }

    async fn product_details(&self, token_id: TokenId) -> Result<ProductRecord, LedgerError> {
        self.inner.product_details(token_id).await
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String, LedgerError> {
        self.note_read(token_id).await;
        self.inner.token_uri(token_id).await
    }

    async fn balance_of(&self, address: &Address) -> Result<u64, LedgerError> {
        self.inner.balance_of(address).await
    }

    async fn owner_of(&self, token_id: TokenId) -> Result<Address, LedgerError> {
        self.inner.owner_of(token_id).await
    }

    async fn product_exists(&self, product_id: &str) -> Result<bool, LedgerError> {
        self.inner.product_exists(product_id).await
    }

    async fn next_token_id(&self) -> Result<TokenId, LedgerError> {
        self.inner.next_token_id().await
    }

    async fn register_manufacturer(&self, entry: &ManufacturerEntry) -> Result<(), LedgerError> {
        self.inner.register_manufacturer(entry).await
    }

    async fn mint_product(
        &self,
        to: &Address,
        product_id: &str,
        metadata_uri: &str,
        signature: &Signature,
    ) -> Result<TokenId, LedgerError> {
        if let Some(delay) = self.mint_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner
            .mint_product(to, product_id, metadata_uri, signature)
            .await
    }
}

/// Probe reporting a fixed chain with no switch capability.
struct PinnedProbe(u64);

#[async_trait::async_trait]
impl NetworkProbe for PinnedProbe {
    async fn chain_id(&self) -> Result<u64, NetworkError> {
        Ok(self.0)
    }

    async fn switch_to(&self, _chain_id: u64) -> Result<(), NetworkError> {
        Err(NetworkError::SwitchRejected("pinned".to_string()))
    }
}

async fn minted_ledger(product_id: &str) -> (InMemoryLedger, TokenId) {
    let ledger = InMemoryLedger::new(CHAIN);
    let signer = Arc::new(LocalKeySigner::from_secret_bytes(&[0x51; 32]).unwrap());
    ledger
        .register_manufacturer(&ManufacturerEntry {
            address: signer.address(),
            brand_name: "Rolex".to_string(),
        })
        .await
        .unwrap();

    let ledger = Arc::new(ledger);
    let svc = MintService::new(ledger.clone(), signer, MintConfig::default());
    let token_id = svc
        .mint(&recipient(), product_id, &sample_metadata(product_id))
        .await
        .unwrap();
    drop(svc);
    let ledger = Arc::try_unwrap(ledger).unwrap_or_else(|_| panic!("ledger still shared"));
    (ledger, token_id)
}

fn completed(outcome: VerifyOutcome) -> attest::VerificationResult {
    match outcome {
        VerifyOutcome::Completed(result) => result,
        VerifyOutcome::Superseded => panic!("invocation unexpectedly superseded"),
    }
}

#[tokio::test]
async fn minted_token_verifies_with_decoded_metadata() {
    let (ledger, token_id) = minted_ledger("RLX-001").await;
    let engine = VerificationEngine::new(Arc::new(ledger));

    let result = completed(engine.verify(&token_id.to_string()).await);
    assert_eq!(result.status, VerificationStatus::Verified);

    let display = result.product.unwrap();
    assert_eq!(display.name, "Rolex Product #RLX-001");
    assert_eq!(display.brand_name, "Rolex");
    assert_eq!(display.image, "https://cdn.example/watch.png");
    assert_eq!(display.attributes.len(), 2);
}

#[tokio::test]
async fn missing_token_is_an_error_not_unverified() {
    let (ledger, _) = minted_ledger("RLX-001").await;
    let engine = VerificationEngine::new(Arc::new(ledger));

    let result = completed(engine.verify("99").await);
    assert_eq!(result.status, VerificationStatus::Error);
    assert!(
        result
            .error
            .as_deref()
            .unwrap()
            .contains("token id 99 does not exist")
    );
}

#[tokio::test]
async fn revoked_manufacturer_yields_unverified_with_context() {
    let (ledger, token_id) = minted_ledger("RLX-001").await;
    let manufacturer = LocalKeySigner::from_secret_bytes(&[0x51; 32]).unwrap().address();
    ledger.revoke_manufacturer(&manufacturer);

    let engine = VerificationEngine::new(Arc::new(ledger));
    let result = completed(engine.verify(&token_id.to_string()).await);
    assert_eq!(result.status, VerificationStatus::Unverified);

    let display = result.product.unwrap();
    assert_eq!(display.product_id, "RLX-001");
    assert_eq!(display.manufacturer, manufacturer);
}

#[tokio::test]
async fn malformed_input_never_reaches_the_ledger() {
    let (ledger, _) = minted_ledger("RLX-001").await;
    let ledger = Arc::new(InstrumentedLedger::new(ledger));
    let engine = VerificationEngine::new(ledger.clone());

    for input in ["0xabc", "https://evil.test", "", "not-a-number"] {
        let result = completed(engine.verify(input).await);
        assert_eq!(result.status, VerificationStatus::Error, "input {input:?}");
    }
    assert_eq!(ledger.read_count(), 0);
}

#[tokio::test]
async fn verification_is_idempotent_with_unchanged_ledger_state() {
    let (ledger, token_id) = minted_ledger("RLX-001").await;
    let engine = VerificationEngine::new(Arc::new(ledger));

    let first = completed(engine.verify(&token_id.to_string()).await);
    let second = completed(engine.verify(&token_id.to_string()).await);

    assert_eq!(first.status, second.status);
    let (a, b) = (first.product.unwrap(), second.product.unwrap());
    assert_eq!(a.name, b.name);
    assert_eq!(a.image, b.image);
    assert_eq!(a.attributes.len(), b.attributes.len());
}

#[tokio::test]
async fn superseded_invocation_never_overwrites_the_newer_result() {
    let (ledger, first) = minted_ledger("RLX-001").await;

    // Mint a second token the slow path will race against.
    let signer = Arc::new(LocalKeySigner::from_secret_bytes(&[0x51; 32]).unwrap());
    let ledger = Arc::new(ledger);
    let svc = MintService::new(ledger.clone(), signer, MintConfig::default());
    let second = svc
        .mint(&recipient(), "RLX-002", &sample_metadata("RLX-002"))
        .await
        .unwrap();

    drop(svc);
    let ledger = Arc::try_unwrap(ledger).unwrap_or_else(|_| panic!("ledger still shared"));
    let ledger = InstrumentedLedger::new(ledger).delay(first, Duration::from_millis(300));
    let engine = Arc::new(VerificationEngine::new(Arc::new(ledger)));

    // Issue the slow invocation, then supersede it before it resolves.
    let slow_engine = engine.clone();
    let slow_id = first.to_string();
    let slow = tokio::spawn(async move { slow_engine.verify(&slow_id).await });
    tokio::task::yield_now().await;

    let fast = completed(engine.verify(&second.to_string()).await);
    assert_eq!(fast.status, VerificationStatus::Verified);

    assert!(matches!(slow.await.unwrap(), VerifyOutcome::Superseded));

    // The published snapshot reflects the newest input only.
    let snapshot = engine.snapshot().unwrap();
    assert_eq!(
        snapshot.product.unwrap().product_id,
        "RLX-002",
        "stale result must not overwrite the newer one"
    );
}

#[tokio::test]
async fn concurrent_mints_for_one_product_id_error_instead_of_deduplicating() {
    let ledger = InMemoryLedger::new(CHAIN);
    let signer = Arc::new(LocalKeySigner::from_secret_bytes(&[0x51; 32]).unwrap());
    ledger
        .register_manufacturer(&ManufacturerEntry {
            address: signer.address(),
            brand_name: "Rolex".to_string(),
        })
        .await
        .unwrap();

    // Hold the first mint's submit long enough for the second to arrive.
    let ledger = Arc::new(InstrumentedLedger::new(ledger).delay_mints(Duration::from_millis(250)));
    let svc = Arc::new(MintService::new(ledger, signer, MintConfig::default()));

    let first_svc = svc.clone();
    let first = tokio::spawn(async move {
        first_svc
            .mint(&recipient(), "RLX-010", &sample_metadata("RLX-010"))
            .await
    });
    tokio::task::yield_now().await;

    // The racing duplicate fails loudly; it is not collapsed into the
    // in-flight mint's result.
    let err = svc
        .mint(&recipient(), "RLX-010", &sample_metadata("RLX-010"))
        .await
        .unwrap_err();
    assert!(matches!(err, MintError::DuplicateInFlight(_)));

    assert_eq!(first.await.unwrap().unwrap(), TokenId(1));
}

#[tokio::test]
async fn wrong_chain_is_intercepted_before_any_ledger_read() {
    let (ledger, token_id) = minted_ledger("RLX-001").await;
    let ledger = Arc::new(InstrumentedLedger::new(ledger));

    // Probe reports mainnet while the contract lives on the designated
    // test chain; the switch attempt is refused.
    let probe: Box<dyn NetworkProbe> = Box::new(PinnedProbe(1));
    let guard = NetworkGuard::new(CHAIN, probe);
    let engine = VerificationEngine::new(ledger.clone()).with_guard(guard);

    let result = completed(engine.verify(&token_id.to_string()).await);
    assert_eq!(result.status, VerificationStatus::Error);
    let msg = result.error.unwrap();
    assert!(msg.contains("chain 1"));
    assert!(!msg.contains("does not exist"));
    assert_eq!(ledger.read_count(), 0);
}

#[tokio::test]
async fn undecodable_token_uri_still_verifies_with_placeholder() {
    let ledger = InMemoryLedger::new(CHAIN);
    let signer = LocalKeySigner::from_secret_bytes(&[0x51; 32]).unwrap();
    ledger
        .register_manufacturer(&ManufacturerEntry {
            address: signer.address(),
            brand_name: "Rolex".to_string(),
        })
        .await
        .unwrap();

    // Mint directly with a corrupt inline document.
    let uri = "data:application/json;base64,%%%not-base64%%%";
    let hash = attestation_hash("RLX-009", uri, &recipient()).unwrap();
    let sig = signer.sign(&hash).await.unwrap();
    let token_id = ledger
        .mint_product(&recipient(), "RLX-009", uri, &sig)
        .await
        .unwrap();

    let engine = VerificationEngine::new(Arc::new(ledger));
    let result = completed(engine.verify(&token_id.to_string()).await);

    assert_eq!(result.status, VerificationStatus::Verified);
    let display = result.product.unwrap();
    assert_eq!(display.image, PLACEHOLDER_IMAGE);
    assert_eq!(display.name, "Rolex Product #RLX-009");
}
