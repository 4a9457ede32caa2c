//! Request and conversion metrics.
//!
//! Every event is recorded twice: in process-local atomics (so handlers and
//! tests can read them back) and through the `metrics` facade, which the
//! Prometheus recorder installed in `main` exports on `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};

/// Conversion endpoint label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Metadata,
    Data,
    GridChunks,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Metadata => "metadata",
            Endpoint::Data => "data",
            Endpoint::GridChunks => "cerv2-data-chunks",
        }
    }
}

/// Metrics collector for the conversion service.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    pub requests: AtomicU64,
    pub failures: AtomicU64,
    pub records_streamed: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, endpoint: Endpoint) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("netcdf_api_requests_total", "endpoint" => endpoint.as_str()).increment(1);
    }

    pub fn record_failure(&self, endpoint: Endpoint) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        counter!("netcdf_api_failures_total", "endpoint" => endpoint.as_str()).increment(1);
    }

    pub fn record_streamed(&self, records: u64) {
        self.records_streamed.fetch_add(records, Ordering::Relaxed);
        counter!("netcdf_api_records_streamed_total").increment(records);
    }

    pub fn record_duration(&self, endpoint: Endpoint, elapsed: Duration) {
        histogram!("netcdf_api_conversion_duration_ms", "endpoint" => endpoint.as_str())
            .record(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn records_streamed(&self) -> u64 {
        self.records_streamed.load(Ordering::Relaxed)
    }
}
