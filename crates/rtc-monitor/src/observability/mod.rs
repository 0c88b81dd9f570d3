//! Observability: the metrics registry and its Prometheus exporter route.

pub mod metrics;

pub use metrics::{metrics_router, prometheus_recorder, MetricsRegistry, StreamSeries};
