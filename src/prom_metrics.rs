//! # Prometheus Metrics — Exposition for Container Orchestration
//!
//! Exposes kemp operational metrics in the Prometheus text exposition format
//! for scraping by Prometheus, Grafana Agent, or any OpenMetrics-compatible
//! collector.
//!
//! ## Metrics Exposed
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `kemp_activities_logged_total` | Counter | `reward_type` | Ledger entries appended |
//! | `kemp_totems_granted_total` | Counter | `totem_type` | Totem grant rows created |
//! | `kemp_recompute_runs_total` | Counter | — | Full recompute sweeps executed |
//! | `kemp_participants_registered` | Gauge | — | Participants in the current stream |
//! | `kemp_http_request_duration_seconds` | Histogram | `method`, `path` | Portal request latency |
//!
//! Gauges are refreshed from the portal's 30-second background loop; counters
//! are incremented inline by the ledger and recompute pipeline.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Label set for per-category activity counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct RewardLabel {
    pub reward_type: String,
}

/// Label set for per-totem grant counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct TotemLabel {
    pub totem_type: String,
}

/// Label set for HTTP request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub path: String,
}

/// Thread-safe metrics registry for the kemp portal.
///
/// All fields use atomic types and are safe to update from any thread or
/// async task. The `Family` type creates per-label-set instances on first use.
pub struct Metrics {
    pub registry: Registry,
    pub activities_logged: Family<RewardLabel, Counter>,
    pub totems_granted: Family<TotemLabel, Counter>,
    pub recompute_runs: Counter,
    pub participants_registered: Gauge,
    pub http_request_duration: Family<HttpLabel, Histogram>,
}

impl Metrics {
    /// Create a new metrics registry with all kemp metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let activities_logged = Family::<RewardLabel, Counter>::default();
        registry.register(
            "kemp_activities_logged",
            "Ledger entries appended by reward type",
            activities_logged.clone(),
        );

        let totems_granted = Family::<TotemLabel, Counter>::default();
        registry.register(
            "kemp_totems_granted",
            "Totem grant rows created by totem type",
            totems_granted.clone(),
        );

        let recompute_runs = Counter::default();
        registry.register(
            "kemp_recompute_runs",
            "Full recompute sweeps executed",
            recompute_runs.clone(),
        );

        let participants_registered = Gauge::default();
        registry.register(
            "kemp_participants_registered",
            "Participants registered in the current stream",
            participants_registered.clone(),
        );

        let http_request_duration = Family::<HttpLabel, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.005, 2.0, 12))
        });
        registry.register(
            "kemp_http_request_duration_seconds",
            "Portal HTTP request latency",
            http_request_duration.clone(),
        );

        Self {
            registry,
            activities_logged,
            totems_granted,
            recompute_runs,
            participants_registered,
            http_request_duration,
        }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        encode(&mut buf, &self.registry).expect("encoding metrics should not fail");
        buf
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_encode_returns_valid_text() {
        let m = Metrics::new();
        m.participants_registered.set(12);
        m.activities_logged
            .get_or_create(&RewardLabel {
                reward_type: "zakal".to_string(),
            })
            .inc();

        let output = m.encode();
        assert!(output.contains("kemp_participants_registered"));
        assert!(output.contains("kemp_activities_logged"));
        assert!(output.contains("zakal"));
    }

    #[test]
    fn per_totem_counters_independent() {
        let m = Metrics::new();
        m.totems_granted
            .get_or_create(&TotemLabel {
                totem_type: "snake".to_string(),
            })
            .inc_by(2);
        m.totems_granted
            .get_or_create(&TotemLabel {
                totem_type: "blade".to_string(),
            })
            .inc();

        let output = m.encode();
        assert!(output.contains("snake"));
        assert!(output.contains("blade"));
    }
}
