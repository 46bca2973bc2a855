use super::{InferenceBackend, InferenceOutput};
use crate::config::ExecutionProvider;
use crate::labels::LabelTable;
use ndarray::{Array, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";
const NAMES_METADATA_KEY: &str = "names";

pub struct OrtBackend {
    session: Session,
    labels: LabelTable,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model(path: &Path, provider: ExecutionProvider) -> anyhow::Result<Self> {
        if !path.is_file() {
            anyhow::bail!("weights file not found: {}", path.display());
        }

        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        match provider {
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;
        let labels = read_labels(&session);

        tracing::info!(
            path = %path.display(),
            classes = labels.len(),
            "Model loaded"
        );

        Ok(Self { session, labels })
    }
}

fn read_labels(session: &Session) -> LabelTable {
    let raw = match session.metadata() {
        Ok(metadata) => match metadata.custom(NAMES_METADATA_KEY) {
            Ok(Some(raw)) => raw,
            _ => {
                tracing::warn!("Model metadata has no class names; using class indices");
                return LabelTable::default();
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read model metadata");
            return LabelTable::default();
        }
    };

    LabelTable::parse_metadata(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to parse class names from model metadata");
        LabelTable::default()
    })
}

impl InferenceBackend for OrtBackend {
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
        let outputs = self.session.run(ort::inputs![
            INPUT_NAME => TensorRef::from_array_view(images.view())?
        ])?;

        let predictions = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;

        Ok(InferenceOutput {
            predictions: predictions.into_owned(),
        })
    }

    fn labels(&self) -> LabelTable {
        self.labels.clone()
    }
}
