//! # Prometheus Metrics
//!
//! Exposes operational metrics for the ledger node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of vouches created.
    pub vouches_created_total: IntCounter,
    /// Total number of vouches withdrawn (archived).
    pub vouches_archived_total: IntCounter,
    /// Total number of vouches flagged unhealthy.
    pub vouches_unhealthy_total: IntCounter,
    /// Total number of slashes applied.
    pub slashes_total: IntCounter,
    /// Asset units currently held across all stake vaults.
    pub staked_assets: IntGauge,
    /// Asset units currently held across all escrow balances.
    pub escrowed_assets: IntGauge,
}

impl LedgerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("aval".into()), None)
            .expect("failed to create prometheus registry");

        let vouches_created_total =
            IntCounter::new("vouches_created_total", "Total number of vouches created")
                .expect("metric creation");
        registry
            .register(Box::new(vouches_created_total.clone()))
            .expect("metric registration");

        let vouches_archived_total = IntCounter::new(
            "vouches_archived_total",
            "Total number of vouches withdrawn and archived",
        )
        .expect("metric creation");
        registry
            .register(Box::new(vouches_archived_total.clone()))
            .expect("metric registration");

        let vouches_unhealthy_total = IntCounter::new(
            "vouches_unhealthy_total",
            "Total number of vouches flagged unhealthy",
        )
        .expect("metric creation");
        registry
            .register(Box::new(vouches_unhealthy_total.clone()))
            .expect("metric registration");

        let slashes_total = IntCounter::new("slashes_total", "Total number of slashes applied")
            .expect("metric creation");
        registry
            .register(Box::new(slashes_total.clone()))
            .expect("metric registration");

        let staked_assets = IntGauge::new(
            "staked_assets",
            "Asset units currently held across all stake vaults",
        )
        .expect("metric creation");
        registry
            .register(Box::new(staked_assets.clone()))
            .expect("metric registration");

        let escrowed_assets = IntGauge::new(
            "escrowed_assets",
            "Asset units currently held across all escrow balances",
        )
        .expect("metric creation");
        registry
            .register(Box::new(escrowed_assets.clone()))
            .expect("metric registration");

        Self {
            registry,
            vouches_created_total,
            vouches_archived_total,
            vouches_unhealthy_total,
            slashes_total,
            staked_assets,
            escrowed_assets,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<LedgerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
