//! Counter and timer emission
//!
//! Metrics are fire-and-forget: a sink never reports failure back to the
//! caller, so emitting a metric can not change the outcome of a request.
//!
//! Metric names are dotted (`routes.auth.yahoo.return.get`). The Prometheus
//! sink keeps them intact as the `name` label of two families, one counter and
//! one duration histogram, exposed on `GET /metrics`.

use crate::settings::MetricsSettings;
use log::debug;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::Registry,
};
use std::sync::Arc;

/// Destination for counters and timings keyed by fixed names
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &str);

    /// Record a duration in milliseconds
    fn timing(&self, name: &str, millis: u64);

    /// Text exposition of everything recorded, for sinks that are scraped
    fn render(&self) -> Option<String> {
        None
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MetricLabels {
    pub name: String,
}

/// Prometheus registry holding the reconciler's counters and timers
pub struct PrometheusSink {
    registry: Registry,
    events: Family<MetricLabels, Counter>,
    durations: Family<MetricLabels, Histogram>,
}

impl PrometheusSink {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        let mut registry = if prefix.is_empty() {
            Registry::default()
        } else {
            Registry::with_prefix(prefix)
        };
        let events = Family::<MetricLabels, Counter>::default();
        // Buckets in seconds, sized for a request that includes two provider round trips
        let durations = Family::<MetricLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(
                [0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0].into_iter(),
            )
        });

        registry.register(
            "events",
            "Reconciliation events by metric name",
            events.clone(),
        );
        registry.register(
            "duration_seconds",
            "Reconciliation duration in seconds by metric name",
            durations.clone(),
        );

        Self {
            registry,
            events,
            durations,
        }
    }

    fn labels(name: &str) -> MetricLabels {
        MetricLabels {
            name: name.to_string(),
        }
    }
}

impl MetricsSink for PrometheusSink {
    fn increment(&self, name: &str) {
        self.events.get_or_create(&Self::labels(name)).inc();
    }

    #[allow(clippy::cast_precision_loss)]
    fn timing(&self, name: &str, millis: u64) {
        self.durations
            .get_or_create(&Self::labels(name))
            .observe(millis as f64 / 1000.0);
    }

    fn render(&self) -> Option<String> {
        let mut buf = String::new();
        match prometheus_client::encoding::text::encode(&mut buf, &self.registry) {
            Ok(()) => Some(buf),
            Err(e) => {
                log::error!("Failed to encode metrics: {e}");
                None
            }
        }
    }
}

/// Writes metrics to the debug log; used when metrics are disabled
pub struct LogSink;

impl MetricsSink for LogSink {
    fn increment(&self, name: &str) {
        debug!("metric {name} +1");
    }

    fn timing(&self, name: &str, millis: u64) {
        debug!("metric {name} {millis}ms");
    }
}

/// Build the configured sink, falling back to [`LogSink`]
#[must_use]
pub fn sink_from_settings(settings: &MetricsSettings) -> Arc<dyn MetricsSink> {
    if settings.enabled {
        Arc::new(PrometheusSink::new(&settings.prefix))
    } else {
        Arc::new(LogSink)
    }
}
