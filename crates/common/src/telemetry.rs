use crate::Environment;
use crate::logging::install_subscriber;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};
use std::time::Duration;

const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment.name";
const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// OTLP export settings supplied by the service binary.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Version of the binary, not of this crate.
    pub service_version: String,
    pub endpoint: String,
    /// Fraction of root traces kept, in `[0, 1]`.
    pub sample_ratio: f64,
    pub metrics_interval: Duration,
    pub environment: Environment,
}

impl TelemetryConfig {
    pub fn new(
        service_name: impl Into<String>,
        service_version: impl Into<String>,
        endpoint: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
            endpoint: endpoint.into(),
            sample_ratio: 1.0,
            metrics_interval: DEFAULT_METRICS_INTERVAL,
            environment,
        }
    }

    pub fn with_sample_ratio(mut self, ratio: f64) -> Self {
        self.sample_ratio = ratio;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder()
            .with_attributes([
                KeyValue::new(SERVICE_NAME, self.service_name.clone()),
                KeyValue::new(SERVICE_VERSION, self.service_version.clone()),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT, self.environment.as_str()),
            ])
            .build()
    }

    fn sampler(&self) -> Sampler {
        let root = if self.sample_ratio >= 1.0 {
            Sampler::AlwaysOn
        } else {
            Sampler::TraceIdRatioBased(self.sample_ratio.max(0.0))
        };
        Sampler::ParentBased(Box::new(root))
    }
}

/// Owns the OTLP trace and metric providers for the process and flushes them
/// on drop. Also installs the `tracing` subscriber, so `setup_logging` must
/// not be called alongside it.
///
/// ```ignore
/// let config = TelemetryConfig::new("gateway", env!("CARGO_PKG_VERSION"), endpoint, env);
/// let _telemetry = TelemetryGuard::init(&config)?;
/// ```
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    pub fn init(config: &TelemetryConfig) -> anyhow::Result<Self> {
        global::set_text_map_propagator(TraceContextPropagator::new());
        let resource = config.resource();

        let span_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.endpoint)
            .build()?;

        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_sampler(config.sampler())
            .with_batch_exporter(span_exporter)
            .build();
        global::set_tracer_provider(tracer_provider.clone());

        let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(&config.endpoint)
            .build()?;

        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(
                PeriodicReader::builder(metric_exporter)
                    .with_interval(config.metrics_interval)
                    .build(),
            )
            .build();
        global::set_meter_provider(meter_provider.clone());

        let otel_layer = tracing_opentelemetry::layer()
            .with_tracer(global::tracer(config.service_name.clone()));
        install_subscriber(otel_layer, config.environment);

        tracing::info!(
            service = %config.service_name,
            endpoint = %config.endpoint,
            sample_ratio = config.sample_ratio,
            "OTLP export enabled"
        );

        Ok(Self {
            tracer_provider,
            meter_provider,
        })
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("Failed to shutdown tracer provider: {e:?}");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("Failed to shutdown meter provider: {e:?}");
        }
    }
}

/// Creates an info-level span and enters it.
#[macro_export]
macro_rules! span {
    ($name:literal) => {
        tracing::info_span!($name).entered()
    };
}
