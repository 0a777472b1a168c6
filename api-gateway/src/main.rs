// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `attest` crate:
//!
//! - `GET /health`
//! - `GET /verify/{token_id}`
//! - `POST /verify/link`
//! - `POST /products/mint`
//! - `POST /manufacturers/register`
//! - `GET /manufacturers/{address}`
//!
//! It embeds a JSON-RPC ledger gateway, the verification engine gated by
//! a chain-id guard, an optional server-side mint service, and a
//! Prometheus metrics exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use attest::{
    AttestationSigner, JsonRpcLedger, LocalKeySigner, MetricsRegistry, MintService, NetworkGuard,
    NetworkProbe, VerificationEngine, run_prometheus_http_server,
};
use config::ApiConfig;
use routes::{health, manufacturers, mint, verify};
use state::{AppState, RpcChainProbe, SharedState};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "api_gateway=info,attest=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::load()?;
    let attest_cfg = config::load_attest_config()?;

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    // Metrics exporter.
    if attest_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = attest_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Ledger + verification engine
    // ---------------------------

    let ledger = Arc::new(
        JsonRpcLedger::new(attest_cfg.ledger.clone())
            .map_err(|e| format!("failed to create JSON-RPC ledger gateway: {e}"))?,
    );

    let probe: Box<dyn NetworkProbe> = Box::new(RpcChainProbe::new(ledger.clone()));
    let guard = NetworkGuard::new(attest_cfg.ledger.chain_id, probe);

    let engine = VerificationEngine::new(ledger.clone())
        .with_guard(guard)
        .with_metrics(metrics.clone());

    // ---------------------------
    // Mint service (signer key permitting)
    // ---------------------------

    let minter = if attest_cfg.signer.secret_hex.is_empty() {
        tracing::info!("no signer key configured, running verification-only");
        None
    } else {
        let signer = LocalKeySigner::from_secret_hex(&attest_cfg.signer.secret_hex)
            .map_err(|e| format!("failed to load signer key: {e}"))?;
        tracing::info!(signer = %signer.address(), "mint service enabled");
        // The write path gets its own guard so a misconfigured endpoint
        // blocks mints as well as verifications.
        let mint_probe: Box<dyn NetworkProbe> = Box::new(RpcChainProbe::new(ledger.clone()));
        let mint_guard = NetworkGuard::new(attest_cfg.ledger.chain_id, mint_probe);
        Some(
            MintService::new(ledger.clone(), Arc::new(signer), attest_cfg.mint.clone())
                .with_guard(mint_guard)
                .with_metrics(metrics.clone()),
        )
    };

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        engine,
        minter,
        ledger,
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/verify/{token_id}", get(verify::verify_token))
        .route("/verify/link", post(verify::verify_link))
        .route("/products/mint", post(mint::mint_product))
        .route("/manufacturers/register", post(manufacturers::register))
        .route("/manufacturers/{address}", get(manufacturers::lookup))
        .with_state(app_state);

    // ---------------------------
    // axum 0.8 server (hyper 1 / tokio 1 style)
    // ---------------------------

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
