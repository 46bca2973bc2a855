use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing subscriber: pretty output for development,
/// JSON for production.
///
/// `RUST_LOG` overrides the default `info` filter. An OpenTelemetry layer is
/// always attached; without a global tracer provider it is a no-op.
pub fn setup_logging(environment: Environment) {
    install_subscriber(tracing_opentelemetry::layer(), environment);
}

pub(crate) fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub(crate) fn install_subscriber<L>(otel_layer: L, environment: Environment)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry()
        .with(default_env_filter())
        .with(otel_layer);

    let installed = match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init(),
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init(),
    };

    if let Err(e) = installed {
        eprintln!("Tracing subscriber already installed: {e}");
    }
}
