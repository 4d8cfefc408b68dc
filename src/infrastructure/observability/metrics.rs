//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::cache::CacheNamespace;

/// Prometheus metrics handle for rendering the exposition text
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Get the metrics in Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global Prometheus recorder
///
/// Without a recorder every metric call below is a no-op.
pub fn init_metrics() -> Option<PrometheusMetrics> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("news_rag_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Result of a cache probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    Error,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Error => "error",
        }
    }
}

/// Record a cache lookup, `count` keys at once for batched reads
pub fn record_cache_lookup(namespace: CacheNamespace, outcome: CacheOutcome, count: u64) {
    if count == 0 {
        return;
    }

    counter!(
        "rag_cache_lookups_total",
        "namespace" => namespace.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(count);
}

/// Record a call to a remote provider
pub fn record_provider_call(provider: &str, success: bool, duration: Duration) {
    let labels = [
        ("provider", provider.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    counter!("rag_provider_calls_total", &labels).increment(1);
    histogram!("rag_provider_call_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record the end-to-end duration of one query
pub fn record_query(outcome: &'static str, duration: Duration) {
    histogram!("rag_query_duration_seconds", "outcome" => outcome).record(duration.as_secs_f64());
}
