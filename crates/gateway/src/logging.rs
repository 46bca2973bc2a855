use crate::config::Config;
use common::{TelemetryConfig, TelemetryGuard};

const SERVICE_NAME: &str = "gateway";

/// Install the subscriber. With an OTLP endpoint configured, the returned
/// guard must be held for the lifetime of the process.
pub fn setup_logging(config: &Config) -> anyhow::Result<Option<TelemetryGuard>> {
    match telemetry_config(config) {
        Some(telemetry) => TelemetryGuard::init(&telemetry).map(Some),
        None => {
            common::setup_logging(config.environment);
            Ok(None)
        }
    }
}

fn telemetry_config(config: &Config) -> Option<TelemetryConfig> {
    let endpoint = config.otel_endpoint.as_deref()?;
    Some(
        TelemetryConfig::new(
            SERVICE_NAME,
            env!("CARGO_PKG_VERSION"),
            endpoint,
            config.environment,
        )
        .with_sample_ratio(config.otel_sample_ratio),
    )
}
