use growth::Summary;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

/// Which entry point served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Detect,
    Upload,
    Stream,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Detect => "detect",
            Surface::Upload => "upload",
            Surface::Stream => "stream",
        }
    }
}

/// OpenTelemetry instruments for the detection surfaces. No-ops unless a
/// meter provider was installed by `TelemetryGuard`.
pub struct GatewayMetrics {
    requests: Counter<u64>,
    inference_duration: Histogram<f64>,
    detections: Counter<u64>,
}

impl GatewayMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];

        Self {
            requests: meter
                .u64_counter("detection_requests_total")
                .with_description("Detection requests by surface and outcome")
                .build(),
            inference_duration: meter
                .f64_histogram("inference_duration_seconds")
                .with_description("Time to run the detector on one image (preprocess + infer + postprocess)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            detections: meter
                .u64_counter("detections_total")
                .with_description("Detections produced, by growth stage")
                .build(),
        }
    }

    pub fn record_request(&self, surface: Surface, outcome: &'static str) {
        self.requests.add(
            1,
            &[
                KeyValue::new("surface", surface.as_str()),
                KeyValue::new("outcome", outcome),
            ],
        );
    }

    pub fn record_inference(&self, seconds: f64) {
        self.inference_duration.record(seconds, &[]);
    }

    pub fn record_detections(&self, summary: &Summary) {
        for (stage, count) in summary.stages() {
            if count > 0 {
                self.detections
                    .add(count as u64, &[KeyValue::new("stage", stage.as_str())]);
            }
        }
        // Raw labels would be unbounded attribute values.
        let unrecognized: u32 = summary.extra().values().sum();
        if unrecognized > 0 {
            self.detections
                .add(unrecognized as u64, &[KeyValue::new("stage", "unrecognized")]);
        }
    }
}
