//! Object detection for uploaded images.
//!
//! A [`Detector`] turns a decoded image into [`Detection`]s. The production
//! detector runs a YOLO-family ONNX export through ONNX Runtime; the
//! [`ModelRegistry`] loads one detector per model identifier on first use and
//! [`predict`] writes an annotated copy of the input next to its detections.

pub mod annotate;
pub mod backend;
pub mod config;
pub mod detection;
pub mod error;
pub mod labels;
pub mod model;
pub mod predict;
pub mod processing;
pub mod registry;

// Re-export commonly used types for convenience
pub use annotate::Annotator;
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::{DetectorConfig, ExecutionProvider};
pub use detection::{BoundingBox, Detection};
pub use error::DetectorError;
pub use labels::LabelTable;
pub use model::{Detector, YoloDetector};
pub use predict::{Prediction, detected_labels, predict};
pub use registry::{ModelHandle, ModelLoader, ModelRegistry, ModelSpec};

#[cfg(feature = "ort-backend")]
pub use registry::OnnxModelLoader;
