//! The verification engine.
//!
//! One `verify(input)` invocation runs the full classification pipeline
//! for a candidate token id: input validation, network gating, the two
//! independent ledger reads, and metadata decoding, resolving to exactly
//! one of VERIFIED, UNVERIFIED, or ERROR. The engine holds no ledger
//! state of its own; re-invoking with unchanged ledger state yields the
//! same result, and nothing is retried automatically.
//!
//! Invocations are keyed by a monotonically increasing epoch. A newer
//! invocation supersedes any still in flight: the stale one still runs to
//! completion but its result is discarded instead of being published, so
//! the last snapshot always reflects the most recent input.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::debug;

use crate::ledger::{LedgerError, LedgerGateway};
use crate::metrics::MetricsRegistry;
use crate::network::{NetworkGuard, NetworkProbe, NetworkStatus};
use crate::types::metadata::{PLACEHOLDER_IMAGE, TokenUri, decode_token_uri};
use crate::types::{
    AuthenticityReport, ProductDisplay, TokenId, VerificationResult, VerificationStatus,
};

/// Outcome of one `verify` invocation from the caller's point of view.
#[derive(Clone, Debug)]
pub enum VerifyOutcome {
    /// This invocation was still the most recent when it resolved; the
    /// result was published and is returned here.
    Completed(VerificationResult),
    /// A newer invocation started before this one resolved. The result
    /// was discarded and must not be displayed.
    Superseded,
}

/// Orchestrates ledger reads for a token id and classifies the outcome.
pub struct VerificationEngine<L> {
    ledger: Arc<L>,
    guard: Option<NetworkGuard<Box<dyn NetworkProbe>>>,
    metrics: Option<Arc<MetricsRegistry>>,
    epoch: AtomicU64,
    latest: Mutex<Option<VerificationResult>>,
}

impl<L: LedgerGateway> VerificationEngine<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self {
            ledger,
            guard: None,
            metrics: None,
            epoch: AtomicU64::new(0),
            latest: Mutex::new(None),
        }
    }

    /// Gates every ledger read behind a chain-id check.
    pub fn with_guard(mut self, guard: NetworkGuard<Box<dyn NetworkProbe>>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Most recently published state: `None` before the first invocation,
    /// PENDING while the current invocation is in flight, then its
    /// terminal result.
    pub fn snapshot(&self) -> Option<VerificationResult> {
        self.latest.lock().expect("verification state lock").clone()
    }

    /// Runs one verification invocation for a candidate token id string.
    pub async fn verify(&self, input: &str) -> VerifyOutcome {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish(
            epoch,
            VerificationResult {
                status: VerificationStatus::Pending,
                product: None,
                error: None,
            },
        );

        let started = Instant::now();
        let result = self.run(input).await;
        if let Some(m) = &self.metrics {
            m.verification
                .verification_seconds
                .observe(started.elapsed().as_secs_f64());
        }

        // Publish only if no newer invocation has started meanwhile.
        if self.epoch.load(Ordering::SeqCst) != epoch {
            if let Some(m) = &self.metrics {
                m.verification.superseded_total.inc();
            }
            return VerifyOutcome::Superseded;
        }
        if let Some(m) = &self.metrics {
            match result.status {
                VerificationStatus::Verified => m.verification.verified_total.inc(),
                VerificationStatus::Unverified => m.verification.unverified_total.inc(),
                VerificationStatus::Error => m.verification.errors_total.inc(),
                VerificationStatus::Pending => {}
            }
        }
        self.publish(epoch, result.clone());
        VerifyOutcome::Completed(result)
    }

    fn publish(&self, epoch: u64, result: VerificationResult) {
        let mut latest = self.latest.lock().expect("verification state lock");
        // A racing newer invocation may already have published PENDING.
        if self.epoch.load(Ordering::SeqCst) == epoch {
            *latest = Some(result);
        }
    }

    async fn run(&self, input: &str) -> VerificationResult {
        let token_id = match validate_token_id(input) {
            Ok(id) => id,
            Err(msg) => return VerificationResult::error(msg),
        };

        // Wrong-chain reads would return "token does not exist" for real
        // tokens, so the gate runs strictly before any ledger call.
        if let Some(guard) = &self.guard {
            match guard.check().await {
                Ok(NetworkStatus::Ok) => {}
                Ok(NetworkStatus::SwitchRequired { connected }) => {
                    return VerificationResult::error(format!(
                        "connected to chain {connected}, but this contract lives on chain {}; \
                         switch networks and retry",
                        guard.target()
                    ));
                }
                Err(e) => return VerificationResult::error(e.to_string()),
            }
        }

        debug!(%token_id, "issuing ledger reads");
        let (report, uri) = tokio::join!(
            self.ledger.verify_authenticity(token_id),
            self.ledger.token_uri(token_id),
        );

        match (report, uri) {
            (Err(e), _) | (_, Err(e)) => classify_read_failure(token_id, e),
            (Ok(report), Ok(uri)) => classify_success(token_id, report, &uri),
        }
    }
}

/// Validates a candidate token id string.
///
/// Scanned QR payloads and pasted clipboard content routinely deliver an
/// address or a URL where a token id belongs; those must be rejected here,
/// before any network call, rather than surfacing as a confusing ledger
/// error.
fn validate_token_id(input: &str) -> Result<TokenId, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("enter a token id".to_string());
    }
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return Err(format!(
            "'{trimmed}' looks like an address, not a token id; expected a plain number"
        ));
    }
    if trimmed.contains("://") {
        return Err(format!(
            "'{trimmed}' looks like a URL, not a token id; expected a plain number"
        ));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{trimmed}' is not a numeric token id"));
    }
    trimmed
        .parse::<u64>()
        .map(TokenId)
        .map_err(|_| format!("'{trimmed}' is out of range for a token id"))
}

fn classify_read_failure(token_id: TokenId, err: LedgerError) -> VerificationResult {
    match err {
        // Existence failure is a distinct answer from authenticity=false.
        LedgerError::NotFound(_) => VerificationResult::error(format!(
            "token id {token_id} does not exist on this contract"
        )),
        LedgerError::Reverted(msg) => {
            VerificationResult::error(format!("ledger rejected the query: {msg}"))
        }
        LedgerError::Transport(msg) => {
            VerificationResult::error(format!("could not reach the ledger: {msg}"))
        }
    }
}

fn classify_success(
    token_id: TokenId,
    report: AuthenticityReport,
    uri: &str,
) -> VerificationResult {
    let display = build_display(token_id, &report, uri);
    if report.is_authentic {
        VerificationResult {
            status: VerificationStatus::Verified,
            product: Some(display),
            error: None,
        }
    } else {
        VerificationResult {
            status: VerificationStatus::Unverified,
            product: Some(display),
            error: Some("the ledger reports this token as not authentic".to_string()),
        }
    }
}

/// Builds display info from the authenticity report plus whatever the
/// token URI yields. Metadata malformation is cosmetic: it falls back to
/// a synthesised name and the placeholder image, never to a downgraded
/// verification status.
fn build_display(token_id: TokenId, report: &AuthenticityReport, uri: &str) -> ProductDisplay {
    let fallback_name = if report.brand_name.is_empty() {
        format!("Product #{}", report.product_id)
    } else {
        format!("{} Product #{}", report.brand_name, report.product_id)
    };

    match decode_token_uri(uri) {
        Ok(TokenUri::Inline(meta)) => ProductDisplay {
            token_id,
            product_id: report.product_id.clone(),
            manufacturer: report.manufacturer,
            brand_name: report.brand_name.clone(),
            name: if meta.name.is_empty() {
                fallback_name
            } else {
                meta.name
            },
            image: if meta.image.is_empty() {
                PLACEHOLDER_IMAGE.to_string()
            } else {
                meta.image
            },
            attributes: meta.attributes,
        },
        Ok(TokenUri::External(url)) => ProductDisplay {
            token_id,
            product_id: report.product_id.clone(),
            manufacturer: report.manufacturer,
            brand_name: report.brand_name.clone(),
            name: fallback_name,
            image: url,
            attributes: Vec::new(),
        },
        Err(e) => {
            debug!(%token_id, error = %e, "token URI did not decode, using placeholder");
            ProductDisplay {
                token_id,
                product_id: report.product_id.clone(),
                manufacturer: report.manufacturer,
                brand_name: report.brand_name.clone(),
                name: fallback_name,
                image: PLACEHOLDER_IMAGE.to_string(),
                attributes: Vec::new(),
            }
        }
    }
}
