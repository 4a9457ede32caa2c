//! Application state for the conversion service.

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::ApiConfig;
use crate::metrics::MetricsCollector;

/// Shared application state.
pub struct AppState {
    pub config: ApiConfig,

    pub metrics: MetricsCollector,

    /// Renders `/metrics`; `None` when no recorder is installed (tests).
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            metrics: MetricsCollector::new(),
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
