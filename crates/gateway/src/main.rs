use detector::OnnxModelLoader;
use gateway::{AppState, get_configuration, logging::setup_logging, server::run_server};
use std::sync::Arc;

#[cfg(not(feature = "ort-backend"))]
compile_error!("The gateway binary needs the 'ort-backend' feature to load models");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;

    let _telemetry = setup_logging(&config)?;

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    let loader = Arc::new(OnnxModelLoader::new(config.detector_config()));
    let state = AppState::build(config, loader).await?;

    run_server(state).await
}
