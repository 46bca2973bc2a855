use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write annotated image {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to load model `{model}`: {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid model registry: {0}")]
    InvalidRegistry(String),
}

impl DetectorError {
    pub(crate) fn inference(err: anyhow::Error) -> Self {
        DetectorError::Inference(format!("{err:#}"))
    }
}
