use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::metrics::PredictionMetrics;
use crate::upload::UploadStore;
use anyhow::Context;
use detector::{Annotator, ModelLoader, ModelRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ModelRegistry>,
    pub uploads: UploadStore,
    pub artifacts: ArtifactStore,
    pub annotator: Arc<Annotator>,
    pub metrics: PredictionMetrics,
}

impl AppState {
    /// Create the working directories and the model registry. Models are
    /// constructed here only when `preload` is set.
    pub async fn build(config: Config, loader: Arc<dyn ModelLoader>) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;
        tokio::fs::create_dir_all(&config.result_dir)
            .await
            .with_context(|| format!("Failed to create {}", config.result_dir.display()))?;

        let registry = ModelRegistry::new(loader, config.model_specs(), &config.default_model)?;

        if config.preload {
            tracing::info!("Preloading models");
            registry.preload().await?;
        }

        let annotator = match &config.font_path {
            Some(path) => Annotator::from_font_file(path)
                .with_context(|| format!("Failed to load label font {}", path.display()))?,
            None => {
                tracing::info!("No label font configured; results show boxes only");
                Annotator::default()
            }
        };

        Ok(Self {
            uploads: UploadStore::new(&config.upload_dir),
            artifacts: ArtifactStore::new(&config.result_dir),
            registry: Arc::new(registry),
            annotator: Arc::new(annotator),
            metrics: PredictionMetrics::new(),
            config: Arc::new(config),
        })
    }

    pub fn model_names(&self) -> Vec<String> {
        self.registry.model_names().map(str::to_string).collect()
    }
}
