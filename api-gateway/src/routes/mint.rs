use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use attest::{Address, Attribute, MintError, ProductMetadata, TokenId, VerifyLink};

use crate::state::SharedState;

/// Request body for `POST /products/mint`.
#[derive(Debug, Deserialize)]
pub struct MintRequest {
    /// Recipient wallet address (`0x` + 40 hex chars).
    pub recipient: String,
    /// Manufacturer-chosen product identifier, unique per contract.
    pub product_id: String,
    /// Display name, e.g. "Rolex Submariner".
    pub name: String,
    pub description: String,
    /// Image reference stored in the metadata document. Large images
    /// should be hosted externally; inline data URIs count against the
    /// metadata size cap.
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
}

/// DTO version of [`Attribute`] used in the API.
#[derive(Debug, Deserialize)]
pub struct AttributeDto {
    pub trait_type: String,
    pub value: String,
}

impl From<AttributeDto> for Attribute {
    fn from(dto: AttributeDto) -> Self {
        Attribute {
            trait_type: dto.trait_type,
            value: dto.value,
        }
    }
}

/// Response body for `POST /products/mint`.
#[derive(Debug, Serialize)]
pub struct MintResponse {
    pub status: &'static str,
    pub token_id: TokenId,
    /// Deep link to embed in the product's QR code.
    pub verify_link: String,
}

/// `POST /products/mint`
///
/// Builds the metadata document, signs the attestation server-side, and
/// submits the mint, returning only after ledger confirmation.
pub async fn mint_product(
    State(state): State<SharedState>,
    Json(body): Json<MintRequest>,
) -> Result<(StatusCode, Json<MintResponse>), (StatusCode, String)> {
    let Some(minter) = &state.minter else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "this gateway runs verification-only: no signer key configured".to_string(),
        ));
    };

    let recipient = Address::parse(&body.recipient)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("bad recipient: {e}")))?;

    let metadata = ProductMetadata {
        name: body.name,
        description: body.description,
        image: body.image,
        attributes: body.attributes.into_iter().map(Into::into).collect(),
    };

    let token_id = minter
        .mint(&recipient, &body.product_id, &metadata)
        .await
        .map_err(as_mint_response)?;

    let link = VerifyLink::new(*state.ledger.contract(), token_id);
    Ok((
        StatusCode::CREATED,
        Json(MintResponse {
            status: "confirmed",
            token_id,
            verify_link: link.to_query(""),
        }),
    ))
}

fn as_mint_response(err: MintError) -> (StatusCode, String) {
    let status = match &err {
        MintError::Encoding(_) | MintError::MetadataTooLarge { .. } => StatusCode::BAD_REQUEST,
        MintError::ProductExists(_) | MintError::DuplicateInFlight(_) => StatusCode::CONFLICT,
        MintError::WrongNetwork { .. } => StatusCode::SERVICE_UNAVAILABLE,
        MintError::Network(_) => StatusCode::BAD_GATEWAY,
        MintError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        MintError::Ledger(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}
