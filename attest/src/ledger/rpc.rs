//! JSON-RPC implementation of the ledger gateway.
//!
//! Talks to an EVM-compatible node over plain JSON-RPC: reads go through
//! `eth_call`, writes through `eth_sendTransaction` with the receipt
//! polled via `eth_getTransactionReceipt`. The RPC endpoint handles
//! transaction signing; this client holds no transaction keys.
//!
//! A write is reported successful only once its receipt is observed with
//! status `0x1` — never at submission time. A rejected transaction
//! (status `0x0`, or a revert surfaced at submission) is authoritative
//! and is never retried here.

use serde_json::{Value, json};

use crate::config::LedgerConfig;
use crate::types::{
    Address, AuthenticityReport, ManufacturerEntry, ProductRecord, Signature, TokenId,
};

use super::abi::{self, Token};
use super::{LedgerError, LedgerGateway, classify_rpc_error};

/// Ledger gateway speaking JSON-RPC to a real chain.
///
/// Thread-safe and cheaply cloneable through `Arc`; reads may be issued
/// concurrently from any number of verification calls.
#[derive(Debug)]
pub struct JsonRpcLedger {
    client: reqwest::Client,
    config: LedgerConfig,
    contract: Address,
}

impl JsonRpcLedger {
    /// Constructs a gateway from configuration, validating the contract
    /// and sender addresses up front.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let contract = Address::parse(&config.contract_address)
            .map_err(|e| LedgerError::Transport(format!("invalid contract address: {e}")))?;
        Address::parse(&config.from_address)
            .map_err(|e| LedgerError::Transport(format!("invalid from address: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            contract,
        })
    }

    /// The contract address this gateway operates against.
    pub fn contract(&self) -> &Address {
        &self.contract
    }

    /// Sends one JSON-RPC request and returns the `result` field.
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let resp = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Transport(format!("{method}: request timed out"))
                } else {
                    LedgerError::Transport(format!("{method}: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "{method}: HTTP {}",
                resp.status()
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| LedgerError::Transport(format!("{method}: invalid JSON response: {e}")))?;

        if let Some(error) = json.get("error") {
            let msg = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error");
            return Err(classify_rpc_error(msg));
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| {
                LedgerError::Transport(format!("{method}: response missing 'result' field"))
            })
    }

    /// Read-only contract call; returns the raw ABI return data.
    async fn eth_call(&self, calldata_hex: String) -> Result<Vec<u8>, LedgerError> {
        let tx = json!({
            "to": self.config.contract_address,
            "data": calldata_hex,
        });
        let result = self.rpc_call("eth_call", json!([tx, "latest"])).await?;

        let hex_str = result
            .as_str()
            .ok_or_else(|| LedgerError::Transport("eth_call returned non-string".to_string()))?;
        let body = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        hex::decode(body)
            .map_err(|e| LedgerError::Transport(format!("eth_call returned bad hex: {e}")))
    }

    /// Submits a write transaction and waits for its receipt.
    async fn send_and_confirm(&self, calldata_hex: String) -> Result<(), LedgerError> {
        let tx = json!({
            "from": self.config.from_address,
            "to": self.config.contract_address,
            "data": calldata_hex,
        });
        let result = self
            .rpc_call("eth_sendTransaction", json!([tx]))
            .await?;
        let tx_hash = result
            .as_str()
            .ok_or_else(|| {
                LedgerError::Transport("eth_sendTransaction returned non-string".to_string())
            })?
            .to_string();

        let deadline = tokio::time::Instant::now() + self.config.confirmation_timeout;
        loop {
            let receipt = self
                .rpc_call("eth_getTransactionReceipt", json!([&tx_hash]))
                .await?;

            if !receipt.is_null() {
                let status = receipt
                    .get("status")
                    .and_then(|s| s.as_str())
                    .unwrap_or("0x0");
                if status == "0x1" {
                    return Ok(());
                }
                return Err(LedgerError::Reverted(format!(
                    "transaction {tx_hash} reverted on-chain"
                )));
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(LedgerError::Transport(format!(
                    "transaction {tx_hash} unconfirmed after {:?}",
                    self.config.confirmation_timeout
                )));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn decode_err(e: abi::AbiError) -> LedgerError {
        LedgerError::Transport(format!("malformed RPC response: {e}"))
    }
}

fn parse_quantity(value: &Value, what: &str) -> Result<u64, LedgerError> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::Transport(format!("{what}: expected hex quantity")))?;
    let body = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(body, 16)
        .map_err(|e| LedgerError::Transport(format!("{what}: bad hex quantity: {e}")))
}

#[async_trait::async_trait]
impl LedgerGateway for JsonRpcLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        let result = self.rpc_call("eth_chainId", json!([])).await?;
        parse_quantity(&result, "eth_chainId")
    }

    async fn is_manufacturer(&self, address: &Address) -> Result<bool, LedgerError> {
        let data = abi::encode_call_hex("isManufacturer(address)", &[Token::Address(*address)]);
        let ret = self.eth_call(data).await?;
        abi::decode_bool(&ret, 0, 0).map_err(Self::decode_err)
    }

    async fn manufacturer_brand(&self, address: &Address) -> Result<String, LedgerError> {
        let data =
            abi::encode_call_hex("getManufacturerBrand(address)", &[Token::Address(*address)]);
        let ret = self.eth_call(data).await?;
        abi::decode_string(&ret, 0, 0).map_err(Self::decode_err)
    }

    async fn verify_authenticity(
        &self,
        token_id: TokenId,
    ) -> Result<AuthenticityReport, LedgerError> {
        let data = abi::encode_call_hex("verifyAuthenticity(uint256)", &[Token::Uint(token_id.0)]);
        let ret = self.eth_call(data).await?;

        // Return tuple order is part of the ABI contract:
        // (isAuthentic, productId, manufacturer, brandName).
        Ok(AuthenticityReport {
            is_authentic: abi::decode_bool(&ret, 0, 0).map_err(Self::decode_err)?,
            product_id: abi::decode_string(&ret, 0, 1).map_err(Self::decode_err)?,
            manufacturer: abi::decode_address(&ret, 0, 2).map_err(Self::decode_err)?,
            brand_name: abi::decode_string(&ret, 0, 3).map_err(Self::decode_err)?,
        })
    }

    async fn product_details(&self, token_id: TokenId) -> Result<ProductRecord, LedgerError> {
        let data = abi::encode_call_hex("getProductDetails(uint256)", &[Token::Uint(token_id.0)]);
        let ret = self.eth_call(data).await?;

        // The contract returns a dynamic struct; its fields are laid out
        // relative to the tuple base.
        let base = abi::tuple_base(&ret, 0).map_err(Self::decode_err)?;
        Ok(ProductRecord {
            product_id: abi::decode_string(&ret, base, 0).map_err(Self::decode_err)?,
            manufacturer: abi::decode_address(&ret, base, 1).map_err(Self::decode_err)?,
            signature: Signature(abi::decode_bytes(&ret, base, 2).map_err(Self::decode_err)?),
            mint_timestamp: abi::decode_u64(&ret, base, 3).map_err(Self::decode_err)?,
            is_verified: abi::decode_bool(&ret, base, 4).map_err(Self::decode_err)?,
            token_id,
        })
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String, LedgerError> {
        let data = abi::encode_call_hex("tokenURI(uint256)", &[Token::Uint(token_id.0)]);
        let ret = self.eth_call(data).await?;
        abi::decode_string(&ret, 0, 0).map_err(Self::decode_err)
    }

    async fn balance_of(&self, address: &Address) -> Result<u64, LedgerError> {
        let data = abi::encode_call_hex("balanceOf(address)", &[Token::Address(*address)]);
        let ret = self.eth_call(data).await?;
        abi::decode_u64(&ret, 0, 0).map_err(Self::decode_err)
    }

    async fn owner_of(&self, token_id: TokenId) -> Result<Address, LedgerError> {
        let data = abi::encode_call_hex("ownerOf(uint256)", &[Token::Uint(token_id.0)]);
        let ret = self.eth_call(data).await?;
        abi::decode_address(&ret, 0, 0).map_err(Self::decode_err)
    }

    async fn product_exists(&self, product_id: &str) -> Result<bool, LedgerError> {
        let data = abi::encode_call_hex(
            "checkProductExists(string)",
            &[Token::Str(product_id.to_string())],
        );
        let ret = self.eth_call(data).await?;
        abi::decode_bool(&ret, 0, 0).map_err(Self::decode_err)
    }

    async fn next_token_id(&self) -> Result<TokenId, LedgerError> {
        let data = abi::encode_call_hex("getNextTokenId()", &[]);
        let ret = self.eth_call(data).await?;
        abi::decode_u64(&ret, 0, 0)
            .map(TokenId)
            .map_err(Self::decode_err)
    }

    async fn register_manufacturer(&self, entry: &ManufacturerEntry) -> Result<(), LedgerError> {
        let data = abi::encode_call_hex(
            "registerManufacturer(address,string)",
            &[
                Token::Address(entry.address),
                Token::Str(entry.brand_name.clone()),
            ],
        );
        self.send_and_confirm(data).await
    }

    async fn mint_product(
        &self,
        to: &Address,
        product_id: &str,
        metadata_uri: &str,
        signature: &Signature,
    ) -> Result<TokenId, LedgerError> {
        // Capture the id this mint will receive before submitting. Safe
        // under the per-product serialization the mint service enforces;
        // a competing external writer would shift it, in which case the
        // caller should confirm via product_details.
        let token_id = self.next_token_id().await?;

        let data = abi::encode_call_hex(
            "mintProductNFT(address,string,string,bytes)",
            &[
                Token::Address(*to),
                Token::Str(product_id.to_string()),
                Token::Str(metadata_uri.to_string()),
                Token::Bytes(signature.as_bytes().to_vec()),
            ],
        );
        self.send_and_confirm(data).await?;
        Ok(token_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LedgerConfig {
        LedgerConfig {
            contract_address: "0x0000000000000000000000000000000000000001".to_string(),
            from_address: "0x0000000000000000000000000000000000000002".to_string(),
            ..LedgerConfig::default()
        }
    }

    #[test]
    fn constructor_validates_addresses() {
        assert!(JsonRpcLedger::new(config()).is_ok());

        let mut bad = config();
        bad.contract_address = "not-an-address".to_string();
        assert!(JsonRpcLedger::new(bad).is_err());

        let mut bad = config();
        bad.from_address = "0x123".to_string();
        assert!(JsonRpcLedger::new(bad).is_err());
    }

    #[test]
    fn quantity_parsing_handles_prefixed_hex() {
        assert_eq!(parse_quantity(&json!("0x14a34"), "chain").unwrap(), 84532);
        assert_eq!(parse_quantity(&json!("0x0"), "chain").unwrap(), 0);
        assert!(parse_quantity(&json!(12), "chain").is_err());
        assert!(parse_quantity(&json!("0xzz"), "chain").is_err());
    }
}
