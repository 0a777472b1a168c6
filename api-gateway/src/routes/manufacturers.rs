use axum::{Json, extract::Path, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use attest::{Address, LedgerGateway, ManufacturerEntry, MintError};

use crate::state::SharedState;

/// Request body for `POST /manufacturers/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Manufacturer wallet address (`0x` + 40 hex chars).
    pub address: String,
    /// Brand name shown on verification results.
    pub brand_name: String,
}

/// Response body for `POST /manufacturers/register`.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    pub address: Address,
}

/// `POST /manufacturers/register`
///
/// Submits an owner-privileged registration transaction. The contract
/// itself rejects callers that are not the registry owner. The write goes
/// through the mint service so it is gated by the same chain-id check as
/// minting.
pub async fn register(
    State(state): State<SharedState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, String)> {
    let Some(minter) = &state.minter else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "this gateway runs verification-only: no signer key configured".to_string(),
        ));
    };

    let address = Address::parse(&body.address)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("bad address: {e}")))?;
    if body.brand_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "brand_name is empty".to_string()));
    }

    let entry = ManufacturerEntry {
        address,
        brand_name: body.brand_name,
    };
    minter
        .register_manufacturer(&entry)
        .await
        .map_err(|e| {
            let status = match &e {
                MintError::WrongNetwork { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, e.to_string())
        })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            status: "confirmed",
            address,
        }),
    ))
}

/// Response body for `GET /manufacturers/{address}`.
#[derive(Debug, Serialize)]
pub struct ManufacturerResponse {
    pub address: Address,
    pub registered: bool,
    /// Empty when not registered.
    pub brand_name: String,
}

/// `GET /manufacturers/{address}`
///
/// Looks up registration status and brand name for an address.
pub async fn lookup(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> Result<Json<ManufacturerResponse>, (StatusCode, String)> {
    let address = Address::parse(&address)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("bad address: {e}")))?;

    let registered = state
        .ledger
        .is_manufacturer(&address)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    let brand_name = if registered {
        state
            .ledger
            .manufacturer_brand(&address)
            .await
            .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?
    } else {
        String::new()
    };

    Ok(Json(ManufacturerResponse {
        address,
        registered,
        brand_name,
    }))
}
