//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and strongly-typed verification and mint metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// Verification-path Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated by the
/// verification engine as invocations resolve.
#[derive(Clone)]
pub struct VerificationMetrics {
    /// End-to-end latency of one verification invocation, in seconds.
    pub verification_seconds: Histogram,
    /// Invocations that resolved VERIFIED.
    pub verified_total: IntCounter,
    /// Invocations that resolved UNVERIFIED.
    pub unverified_total: IntCounter,
    /// Invocations that resolved ERROR (including rejected input).
    pub errors_total: IntCounter,
    /// Invocations whose result was discarded because a newer invocation
    /// superseded them before they resolved.
    pub superseded_total: IntCounter,
}

impl VerificationMetrics {
    /// Registers verification metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let verification_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "verification_seconds",
                "End-to-end latency of one verification invocation in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )?;
        registry.register(Box::new(verification_seconds.clone()))?;

        let verified_total = IntCounter::with_opts(Opts::new(
            "verifications_verified_total",
            "Verification invocations that resolved VERIFIED",
        ))?;
        registry.register(Box::new(verified_total.clone()))?;

        let unverified_total = IntCounter::with_opts(Opts::new(
            "verifications_unverified_total",
            "Verification invocations that resolved UNVERIFIED",
        ))?;
        registry.register(Box::new(unverified_total.clone()))?;

        let errors_total = IntCounter::with_opts(Opts::new(
            "verifications_error_total",
            "Verification invocations that resolved ERROR",
        ))?;
        registry.register(Box::new(errors_total.clone()))?;

        let superseded_total = IntCounter::with_opts(Opts::new(
            "verifications_superseded_total",
            "Verification invocations discarded as stale",
        ))?;
        registry.register(Box::new(superseded_total.clone()))?;

        Ok(Self {
            verification_seconds,
            verified_total,
            unverified_total,
            errors_total,
            superseded_total,
        })
    }
}

/// Mint-path Prometheus metrics.
#[derive(Clone)]
pub struct MintMetrics {
    /// Latency from signing to observed confirmation, in seconds.
    pub mint_seconds: Histogram,
    /// Mints confirmed on the ledger.
    pub confirmed_total: IntCounter,
    /// Mints rejected by the ledger or failed in transport.
    pub failed_total: IntCounter,
}

impl MintMetrics {
    /// Registers mint metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let mint_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "mint_seconds",
                "Latency from signing to observed mint confirmation in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        registry.register(Box::new(mint_seconds.clone()))?;

        let confirmed_total = IntCounter::with_opts(Opts::new(
            "mints_confirmed_total",
            "Mint transactions confirmed on the ledger",
        ))?;
        registry.register(Box::new(confirmed_total.clone()))?;

        let failed_total = IntCounter::with_opts(Opts::new(
            "mints_failed_total",
            "Mint transactions rejected or failed",
        ))?;
        registry.register(Box::new(failed_total.clone()))?;

        Ok(Self {
            mint_seconds,
            confirmed_total,
            failed_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the attestation metrics.
///
/// This is the main handle you pass around in a service. It can be
/// wrapped in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub verification: VerificationMetrics,
    pub mint: MintMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the verification and mint metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("attest".to_string()), None)?;
        let verification = VerificationMetrics::register(&registry)?;
        let mint = MintMetrics::register(&registry)?;
        Ok(Self {
            registry,
            verification,
            mint,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn verification_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = VerificationMetrics::register(&registry).expect("register metrics");

        metrics.verification_seconds.observe(0.123);
        metrics.verified_total.inc();
        metrics.unverified_total.inc();
        metrics.errors_total.inc();
        metrics.superseded_total.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn mint_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = MintMetrics::register(&registry).expect("register metrics");

        metrics.mint_seconds.observe(4.2);
        metrics.confirmed_total.inc();
        metrics.failed_total.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn gather_text_includes_registered_families() {
        let registry = MetricsRegistry::new().expect("metrics registry");
        registry.verification.verified_total.inc();
        let text = registry.gather_text();
        assert!(text.contains("attest_verifications_verified_total"));
    }
}
