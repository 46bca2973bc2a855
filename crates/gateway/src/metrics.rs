use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

const METER_NAME: &str = "gateway";

/// Prediction counters. Recorded through the global meter, which is a no-op
/// unless telemetry export is configured.
#[derive(Clone)]
pub struct PredictionMetrics {
    duration_histogram: Histogram<f64>,
    predictions_counter: Counter<u64>,
    detections_counter: Counter<u64>,
}

impl PredictionMetrics {
    pub fn new() -> Self {
        let meter = global::meter(METER_NAME);
        let latency_buckets = [
            0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ];

        let duration_histogram = meter
            .f64_histogram("prediction_duration_seconds")
            .with_description("Time from upload to annotated result, including model load")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build();
        let predictions_counter = meter
            .u64_counter("predictions_total")
            .with_description("Prediction requests by model and outcome")
            .build();
        let detections_counter = meter
            .u64_counter("prediction_detections_total")
            .with_description("Total detections produced")
            .build();

        Self {
            duration_histogram,
            predictions_counter,
            detections_counter,
        }
    }

    pub fn record_success(&self, model: &str, detections: usize, elapsed: Duration) {
        let attributes = [
            KeyValue::new("model", model.to_string()),
            KeyValue::new("outcome", "success"),
        ];
        self.predictions_counter.add(1, &attributes);
        self.detections_counter
            .add(detections as u64, &attributes[..1]);
        self.duration_histogram
            .record(elapsed.as_secs_f64(), &attributes);
    }

    pub fn record_failure(&self, model: &str, elapsed: Duration) {
        let attributes = [
            KeyValue::new("model", model.to_string()),
            KeyValue::new("outcome", "error"),
        ];
        self.predictions_counter.add(1, &attributes);
        self.duration_histogram
            .record(elapsed.as_secs_f64(), &attributes);
    }
}

impl Default for PredictionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
