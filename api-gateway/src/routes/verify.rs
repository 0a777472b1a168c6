use axum::{Json, extract::Path, extract::State, http::StatusCode};

use attest::{VerificationResult, VerificationStatus, VerifyOutcome, parse_verify_link};
use serde::Deserialize;

use crate::state::SharedState;

/// `GET /verify/{token_id}`
///
/// Runs one verification invocation for the given token id string. The
/// path segment is passed through raw: the engine owns input validation,
/// so a pasted address or URL yields its rejection message rather than a
/// routing error.
pub async fn verify_token(
    State(state): State<SharedState>,
    Path(token_id): Path<String>,
) -> (StatusCode, Json<VerificationResult>) {
    match state.engine.verify(&token_id).await {
        VerifyOutcome::Completed(result) => (status_code(&result), Json(result)),
        // Another request superseded this one between issue and resolve.
        // The result was discarded; the client should simply retry.
        VerifyOutcome::Superseded => (
            StatusCode::CONFLICT,
            Json(VerificationResult::error(
                "verification superseded by a newer request; retry",
            )),
        ),
    }
}

/// Request body for `POST /verify/link`.
#[derive(Debug, Deserialize)]
pub struct VerifyLinkRequest {
    /// Full scanned URL or bare query string from a product QR code.
    pub url: String,
}

/// `POST /verify/link`
///
/// Accepts a scanned deep link (`?verify=<contract>&token=<tokenId>`),
/// extracts the token, and runs the same verification flow.
pub async fn verify_link(
    State(state): State<SharedState>,
    Json(body): Json<VerifyLinkRequest>,
) -> (StatusCode, Json<VerificationResult>) {
    let link = match parse_verify_link(&body.url) {
        Ok(link) => link,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(VerificationResult::error(e.to_string())),
            );
        }
    };
    verify_token(State(state), Path(link.token)).await
}

fn status_code(result: &VerificationResult) -> StatusCode {
    match result.status {
        VerificationStatus::Verified | VerificationStatus::Unverified => StatusCode::OK,
        // Input rejections and missing tokens both land here; the body
        // carries the distinguishing message.
        VerificationStatus::Error => StatusCode::UNPROCESSABLE_ENTITY,
        VerificationStatus::Pending => StatusCode::ACCEPTED,
    }
}
