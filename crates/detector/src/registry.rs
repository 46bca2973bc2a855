use crate::detection::Detection;
use crate::error::DetectorError;
use crate::labels::LabelTable;
use crate::model::Detector;
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

#[cfg(feature = "ort-backend")]
use crate::{backend::ort::OrtBackend, config::DetectorConfig, model::YoloDetector};

/// Builds a detector from a weights file.
pub trait ModelLoader: Send + Sync {
    fn load(&self, name: &str, weights: &Path) -> anyhow::Result<Box<dyn Detector>>;
}

/// Loads YOLO ONNX exports through ONNX Runtime.
#[cfg(feature = "ort-backend")]
pub struct OnnxModelLoader {
    config: DetectorConfig,
}

#[cfg(feature = "ort-backend")]
impl OnnxModelLoader {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "ort-backend")]
impl ModelLoader for OnnxModelLoader {
    fn load(&self, name: &str, weights: &Path) -> anyhow::Result<Box<dyn Detector>> {
        tracing::info!(model = name, weights = %weights.display(), "Loading model");
        let backend = OrtBackend::load_model(weights, self.config.execution_provider)?;
        Ok(Box::new(YoloDetector::new(backend, &self.config)))
    }
}

/// Shared handle to one loaded detector.
///
/// Cloning is cheap; clones refer to the same detector instance.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    name: String,
    labels: LabelTable,
    detector: Mutex<Box<dyn Detector>>,
}

impl ModelHandle {
    pub fn new(name: impl Into<String>, detector: Box<dyn Detector>) -> Self {
        let labels = detector.labels();
        Self {
            inner: Arc::new(HandleInner {
                name: name.into(),
                labels,
                detector: Mutex::new(detector),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn labels(&self) -> &LabelTable {
        &self.inner.labels
    }

    /// Run the detector. Concurrent callers on one handle are serialized.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        let mut detector = self
            .inner
            .detector
            .lock()
            .map_err(|_| DetectorError::Inference("detector lock poisoned".to_string()))?;
        detector.detect(image).map_err(DetectorError::inference)
    }

    pub fn ptr_eq(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.inner.name)
            .field("classes", &self.inner.labels.len())
            .finish()
    }
}

/// A model identifier and the weights it is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub weights: PathBuf,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, weights: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            weights: weights.into(),
        }
    }
}

struct ModelSlot {
    spec: ModelSpec,
    cell: OnceCell<ModelHandle>,
}

/// Lazily constructed detectors, one per configured model identifier.
///
/// Each identifier is constructed at most once even under concurrent first
/// access. A failed construction is not cached.
pub struct ModelRegistry {
    loader: Arc<dyn ModelLoader>,
    slots: Vec<ModelSlot>,
    default_index: usize,
}

impl ModelRegistry {
    pub fn new(
        loader: Arc<dyn ModelLoader>,
        specs: Vec<ModelSpec>,
        default_model: &str,
    ) -> Result<Self, DetectorError> {
        if specs.is_empty() {
            return Err(DetectorError::InvalidRegistry(
                "at least one model must be configured".to_string(),
            ));
        }

        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.name == spec.name) {
                return Err(DetectorError::InvalidRegistry(format!(
                    "model `{}` configured twice",
                    spec.name
                )));
            }
        }

        let default_index = specs
            .iter()
            .position(|s| s.name == default_model)
            .ok_or_else(|| {
                DetectorError::InvalidRegistry(format!(
                    "default model `{default_model}` is not among the configured models"
                ))
            })?;

        let slots = specs
            .into_iter()
            .map(|spec| ModelSlot {
                spec,
                cell: OnceCell::new(),
            })
            .collect();

        Ok(Self {
            loader,
            slots,
            default_index,
        })
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.spec.name.as_str())
    }

    pub fn default_model(&self) -> &str {
        &self.slots[self.default_index].spec.name
    }

    /// The configured identifier `requested` refers to; anything unknown or
    /// missing selects the default model.
    pub fn resolve_name(&self, requested: Option<&str>) -> &str {
        &self.slot(requested).spec.name
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.slots
            .iter()
            .any(|s| s.spec.name == name && s.cell.initialized())
    }

    /// Return the handle for `requested`, constructing it on first use.
    pub async fn load(&self, requested: Option<&str>) -> Result<ModelHandle, DetectorError> {
        let slot = self.slot(requested);

        let handle = slot
            .cell
            .get_or_try_init(|| self.construct(&slot.spec))
            .await?;

        Ok(handle.clone())
    }

    /// Construct every configured model up front.
    pub async fn preload(&self) -> Result<(), DetectorError> {
        for name in self.model_names() {
            self.load(Some(name)).await?;
        }
        Ok(())
    }

    fn slot(&self, requested: Option<&str>) -> &ModelSlot {
        requested
            .and_then(|name| self.slots.iter().find(|s| s.spec.name == name))
            .unwrap_or_else(|| {
                if let Some(name) = requested {
                    tracing::warn!(
                        requested = name,
                        default = self.default_model(),
                        "Unknown model requested; using default"
                    );
                }
                &self.slots[self.default_index]
            })
    }

    async fn construct(&self, spec: &ModelSpec) -> Result<ModelHandle, DetectorError> {
        let loader = Arc::clone(&self.loader);
        let spec = spec.clone();
        let name = spec.name.clone();

        let loaded = tokio::task::spawn_blocking(move || {
            loader
                .load(&spec.name, &spec.weights)
                .map(|detector| ModelHandle::new(spec.name, detector))
        })
        .await
        .map_err(|e| DetectorError::ModelLoad {
            model: name.clone(),
            reason: format!("loader task failed: {e}"),
        })?;

        match loaded {
            Ok(handle) => {
                tracing::info!(model = %name, "Model ready");
                Ok(handle)
            }
            Err(e) => {
                tracing::error!(model = %name, error = %format!("{e:#}"), "Model load failed");
                Err(DetectorError::ModelLoad {
                    model: name,
                    reason: format!("{e:#}"),
                })
            }
        }
    }
}
