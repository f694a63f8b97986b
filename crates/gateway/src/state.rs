use crate::config::{GatewayConfig, SERVICE_NAME};
use crate::metrics::GatewayMetrics;
use growth::DetectionProcessor;
use inference::DetectorLifecycle;
use std::sync::Arc;

/// Shared by every handler. The lifecycle is the only mutable piece.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: DetectorLifecycle,
    pub processor: DetectionProcessor,
    pub config: Arc<GatewayConfig>,
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    pub fn new(config: GatewayConfig, lifecycle: DetectorLifecycle) -> Self {
        Self {
            lifecycle,
            processor: DetectionProcessor::default(),
            config: Arc::new(config),
            metrics: Arc::new(GatewayMetrics::new(SERVICE_NAME)),
        }
    }
}
