//! Observability infrastructure - Metrics

mod metrics;

pub use metrics::{
    CacheOutcome, PrometheusMetrics, init_metrics, record_cache_lookup, record_provider_call,
    record_query,
};
