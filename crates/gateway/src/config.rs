use common::Environment;
use detector::{DetectorConfig, ExecutionProvider, ModelSpec};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
const DEFAULT_RESULT_DIR: &str = "static/results";
const DEFAULT_WEIGHTS_DIR: &str = "weights";
const DEFAULT_MODELS: &str = "best,last";
const DEFAULT_MODEL: &str = "last";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Weights files are looked up as `<weights_dir>/<model>.<ext>`.
pub const WEIGHTS_EXTENSION: &str = "onnx";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub result_dir: PathBuf,
    pub weights_dir: PathBuf,
    /// Comma-separated model identifiers.
    pub models: String,
    pub default_model: String,
    pub preload: bool,
    pub execution_provider: ExecutionProvider,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub font_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub otel_endpoint: Option<String>,
    /// Fraction of root traces exported when `otel_endpoint` is set.
    pub otel_sample_ratio: f64,
    #[serde(default = "Environment::from_env")]
    pub environment: Environment,
}

impl Default for Config {
    fn default() -> Self {
        let detector = DetectorConfig::default();
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            result_dir: PathBuf::from(DEFAULT_RESULT_DIR),
            weights_dir: PathBuf::from(DEFAULT_WEIGHTS_DIR),
            models: DEFAULT_MODELS.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            preload: false,
            execution_provider: ExecutionProvider::default(),
            input_size: detector.input_size.0,
            confidence_threshold: detector.confidence_threshold,
            iou_threshold: detector.iou_threshold,
            font_path: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            otel_endpoint: None,
            otel_sample_ratio: 1.0,
            environment: Environment::Development,
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured model identifiers in declaration order.
    pub fn model_names(&self) -> Vec<String> {
        self.models
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn model_specs(&self) -> Vec<ModelSpec> {
        self.model_names()
            .into_iter()
            .map(|name| {
                let weights = self
                    .weights_dir
                    .join(format!("{name}.{WEIGHTS_EXTENSION}"));
                ModelSpec::new(name, weights)
            })
            .collect()
    }

    /// Reject values the detector cannot run with.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.input_size == 0 {
            return Err(invalid("input_size must be at least 1"));
        }
        for (key, value) in [
            ("confidence_threshold", f64::from(self.confidence_threshold)),
            ("iou_threshold", f64::from(self.iou_threshold)),
            ("otel_sample_ratio", self.otel_sample_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{key} must be within [0, 1], got {value}")));
            }
        }
        if self.model_names().is_empty() {
            return Err(invalid("models must name at least one model"));
        }
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            input_size: (self.input_size, self.input_size),
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            execution_provider: self.execution_provider,
            ..DetectorConfig::default()
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let defaults = Config::default();

    let config = config::Config::builder()
        .set_default("host", defaults.host)?
        .set_default("port", i64::from(defaults.port))?
        .set_default("upload_dir", DEFAULT_UPLOAD_DIR)?
        .set_default("result_dir", DEFAULT_RESULT_DIR)?
        .set_default("weights_dir", DEFAULT_WEIGHTS_DIR)?
        .set_default("models", defaults.models)?
        .set_default("default_model", defaults.default_model)?
        .set_default("preload", defaults.preload)?
        .set_default("execution_provider", "cpu")?
        .set_default("input_size", i64::from(defaults.input_size))?
        .set_default("confidence_threshold", f64::from(defaults.confidence_threshold))?
        .set_default("iou_threshold", f64::from(defaults.iou_threshold))?
        .set_default("max_upload_bytes", defaults.max_upload_bytes as i64)?
        .set_default("otel_sample_ratio", defaults.otel_sample_ratio)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

fn invalid(message: impl Into<String>) -> config::ConfigError {
    config::ConfigError::Message(message.into())
}
