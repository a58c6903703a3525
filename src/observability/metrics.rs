//! Prometheus metrics for the reclaimer.
//!
//! Provides metrics for:
//! - Rows deleted per object kind
//! - Container and volume state transitions
//! - Reclaimer failures and run durations

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a tokio runtime.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let addr = config
        .listen_addr()
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &config.duration_buckets_secs,
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?
        .install()?;

    tracing::info!(listen = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        tracing::warn!(
            "Metrics are enabled in config but the 'prometheus' feature is not compiled. \
            Rebuild with: cargo build --features prometheus"
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record rows removed by a reclaimer.
///
/// # Arguments
/// * `kind` - What was deleted (e.g., "containers", "volumes", "resource_caches", "build_events")
/// * `count` - The number of rows deleted
pub fn record_gc_deletion(kind: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "gc_deletions_total",
            "kind" => kind.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (kind, count);
    }
}

/// Record a state transition applied by a reclaimer.
pub fn record_gc_transition(kind: &str, to: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "gc_transitions_total",
            "kind" => kind.to_string(),
            "to" => to.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (kind, to);
    }
}

/// Record a failed reclaimer phase.
///
/// Tracks errors for alerting; the next scheduled pass retries.
pub fn record_gc_error(reclaimer: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "gc_errors_total",
            "reclaimer" => reclaimer.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = reclaimer;
    }
}

/// Record how long a reclaimer pass took.
pub fn record_gc_run_duration(reclaimer: &str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        histogram!(
            "gc_run_duration_seconds",
            "reclaimer" => reclaimer.to_string()
        )
        .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (reclaimer, duration_secs);
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
