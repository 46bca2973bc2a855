use crate::{
    backend::{InferenceBackend, InferenceOutput},
    config::DetectorConfig,
    detection::Detection,
    labels::LabelTable,
    processing::{post::PostProcessor, pre::PreProcessor},
};
use image::DynamicImage;

/// The detection capability: image in, boxes out.
pub trait Detector: Send {
    fn detect(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>>;

    fn labels(&self) -> LabelTable;
}

/// Letterbox preprocessing, a YOLO backend and NMS postprocessing.
pub struct YoloDetector<B: InferenceBackend> {
    backend: B,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
}

impl<B: InferenceBackend> YoloDetector<B> {
    pub fn new(backend: B, config: &DetectorConfig) -> Self {
        Self {
            backend,
            preprocessor: PreProcessor::new(config.input_size),
            postprocessor: PostProcessor::new(
                config.confidence_threshold,
                config.iou_threshold,
                config.max_detections,
            ),
        }
    }
}

impl<B: InferenceBackend> Detector for YoloDetector<B> {
    fn detect(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
        let rgb = image.to_rgb8();

        let (input, transform) = self.preprocessor.preprocess(&rgb)?;

        let InferenceOutput { predictions } = {
            let _infer_span = tracing::info_span!("model_inference").entered();
            self.backend.infer(&input)?
        };

        let detections = self
            .postprocessor
            .parse_detections(&predictions.view(), &transform)?;

        tracing::debug!(
            width = transform.orig_width,
            height = transform.orig_height,
            detections = detections.len(),
            "Image processed"
        );

        Ok(detections)
    }

    fn labels(&self) -> LabelTable {
        self.backend.labels()
    }
}
