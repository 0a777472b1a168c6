//! In-memory ledger gateway.
//!
//! This implementation is useful for unit tests, integration tests, and
//! local demos. It keeps all state in `HashMap`s behind one mutex and
//! reproduces the contract's authoritative mint-time checks: the
//! attestation hash is re-derived from the submitted arguments and the
//! signature must recover to a registered manufacturer, otherwise the
//! mint is rejected exactly like an on-chain revert.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::attestation_hash;
use crate::signer::recover_signer;
use crate::types::{
    Address, AuthenticityReport, ManufacturerEntry, ProductRecord, Signature, TokenId,
};

use super::{LedgerError, LedgerGateway};

#[derive(Default)]
struct LedgerState {
    manufacturers: HashMap<Address, String>,
    records: HashMap<TokenId, ProductRecord>,
    uris: HashMap<TokenId, String>,
    owners: HashMap<TokenId, Address>,
    next_id: u64,
}

/// In-memory implementation of [`LedgerGateway`].
pub struct InMemoryLedger {
    chain_id: u64,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Creates an empty ledger reporting the given chain id.
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(LedgerState {
                next_id: 1,
                ..LedgerState::default()
            }),
        }
    }

    /// Removes a manufacturer from the registry.
    ///
    /// Test seam: lets a previously authentic token turn UNVERIFIED, the
    /// way a brand revocation would on a live contract.
    pub fn revoke_manufacturer(&self, address: &Address) {
        self.state
            .lock()
            .expect("ledger state lock")
            .manufacturers
            .remove(address);
    }

    fn not_found(token_id: TokenId) -> LedgerError {
        LedgerError::NotFound(format!("ERC721NonexistentToken: token {token_id} does not exist"))
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(self.chain_id)
    }

    async fn is_manufacturer(&self, address: &Address) -> Result<bool, LedgerError> {
        let state = self.state.lock().expect("ledger state lock");
        Ok(state.manufacturers.contains_key(address))
    }

    async fn manufacturer_brand(&self, address: &Address) -> Result<String, LedgerError> {
        let state = self.state.lock().expect("ledger state lock");
        Ok(state
            .manufacturers
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn verify_authenticity(
        &self,
        token_id: TokenId,
    ) -> Result<AuthenticityReport, LedgerError> {
        let state = self.state.lock().expect("ledger state lock");
        let record = state
            .records
            .get(&token_id)
            .ok_or_else(|| Self::not_found(token_id))?;

        // Authentic means: validated at mint time AND the manufacturer is
        // still registered.
        let brand = state.manufacturers.get(&record.manufacturer).cloned();
        Ok(AuthenticityReport {
            is_authentic: record.is_verified && brand.is_some(),
            product_id: record.product_id.clone(),
            manufacturer: record.manufacturer,
            brand_name: brand.unwrap_or_default(),
        })
    }

    async fn product_details(&self, token_id: TokenId) -> Result<ProductRecord, LedgerError> {
        let state = self.state.lock().expect("ledger state lock");
        state
            .records
            .get(&token_id)
            .cloned()
            .ok_or_else(|| Self::not_found(token_id))
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String, LedgerError> {
        let state = self.state.lock().expect("ledger state lock");
        state
            .uris
            .get(&token_id)
            .cloned()
            .ok_or_else(|| Self::not_found(token_id))
    }

    async fn balance_of(&self, address: &Address) -> Result<u64, LedgerError> {
        let state = self.state.lock().expect("ledger state lock");
        Ok(state.owners.values().filter(|o| *o == address).count() as u64)
    }

    async fn owner_of(&self, token_id: TokenId) -> Result<Address, LedgerError> {
        let state = self.state.lock().expect("ledger state lock");
        state
            .owners
            .get(&token_id)
            .copied()
            .ok_or_else(|| Self::not_found(token_id))
    }

    async fn product_exists(&self, product_id: &str) -> Result<bool, LedgerError> {
        let state = self.state.lock().expect("ledger state lock");
        Ok(state.records.values().any(|r| r.product_id == product_id))
    }

    async fn next_token_id(&self) -> Result<TokenId, LedgerError> {
        let state = self.state.lock().expect("ledger state lock");
        Ok(TokenId(state.next_id))
    }

    async fn register_manufacturer(&self, entry: &ManufacturerEntry) -> Result<(), LedgerError> {
        let mut state = self.state.lock().expect("ledger state lock");
        state
            .manufacturers
            .insert(entry.address, entry.brand_name.clone());
        Ok(())
    }

    async fn mint_product(
        &self,
        to: &Address,
        product_id: &str,
        metadata_uri: &str,
        signature: &Signature,
    ) -> Result<TokenId, LedgerError> {
        let mut state = self.state.lock().expect("ledger state lock");

        if state.records.values().any(|r| r.product_id == product_id) {
            return Err(LedgerError::Reverted(
                "execution reverted: Product ID already exists".to_string(),
            ));
        }

        // Re-derive the attestation hash from the submitted arguments and
        // recover the signer, exactly as the contract does.
        let hash = attestation_hash(product_id, metadata_uri, to)
            .map_err(|e| LedgerError::Reverted(format!("execution reverted: {e}")))?;
        let signer = recover_signer(&hash, signature)
            .map_err(|e| LedgerError::Reverted(format!("execution reverted: {e}")))?;

        if !state.manufacturers.contains_key(&signer) {
            return Err(LedgerError::Reverted(
                "execution reverted: signer is not a registered manufacturer".to_string(),
            ));
        }

        let token_id = TokenId(state.next_id);
        state.next_id += 1;

        state.records.insert(
            token_id,
            ProductRecord {
                product_id: product_id.to_string(),
                manufacturer: signer,
                signature: signature.clone(),
                mint_timestamp: Self::now(),
                is_verified: true,
                token_id,
            },
        );
        state.uris.insert(token_id, metadata_uri.to_string());
        state.owners.insert(token_id, *to);

        Ok(token_id)
    }
}
