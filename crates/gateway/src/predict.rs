use crate::error::AppError;
use crate::resolve::resolve_result;
use crate::state::AppState;
use crate::views::ResultView;
use axum::body::Bytes;
use axum::extract::Multipart;
use detector::{DetectorError, detected_labels};
use std::time::Instant;

const FILE_FIELD: &str = "file";
const MODEL_FIELD: &str = "model_choice";

/// The fields of a prediction request.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<FilePart>,
    pub model_choice: Option<String>,
}

#[derive(Debug)]
pub struct FilePart {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some(FILE_FIELD) => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    form.file = Some(FilePart { file_name, bytes });
                }
                Some(MODEL_FIELD) => {
                    let choice = field.text().await?;
                    let choice = choice.trim();
                    if !choice.is_empty() {
                        form.model_choice = Some(choice.to_string());
                    }
                }
                other => {
                    tracing::debug!(field = ?other, "Ignoring unexpected form field");
                }
            }
        }

        Ok(form)
    }
}

#[derive(Debug)]
pub enum PredictOutcome {
    /// No file was chosen.
    NoFile,
    Rendered(ResultView),
}

/// Load the chosen model, store the upload, annotate it and describe the
/// result.
#[tracing::instrument(skip_all, fields(model = tracing::field::Empty))]
pub async fn run(state: &AppState, form: UploadForm) -> Result<PredictOutcome, AppError> {
    let Some(file) = form.file.filter(|f| !f.file_name.is_empty()) else {
        tracing::debug!("No file chosen; redirecting to the upload form");
        return Ok(PredictOutcome::NoFile);
    };

    let model = state
        .registry
        .resolve_name(form.model_choice.as_deref())
        .to_string();
    tracing::Span::current().record("model", model.as_str());

    let started = Instant::now();
    let result = predict_upload(state, &model, &file).await;

    match &result {
        Ok((_, detections)) => state
            .metrics
            .record_success(&model, *detections, started.elapsed()),
        Err(_) => state.metrics.record_failure(&model, started.elapsed()),
    }

    result.map(|(view, _)| PredictOutcome::Rendered(view))
}

async fn predict_upload(
    state: &AppState,
    model: &str,
    file: &FilePart,
) -> Result<(ResultView, usize), AppError> {
    let handle = state.registry.load(Some(model)).await?;

    let upload = state.uploads.save(&file.file_name, &file.bytes).await?;

    let save_dir = state.artifacts.root().to_path_buf();
    let prediction = {
        let handle = handle.clone();
        let annotator = state.annotator.clone();
        let source = upload.path.clone();
        tokio::task::spawn_blocking(move || {
            detector::predict(&handle, &annotator, &source, &save_dir)
        })
        .await
        .map_err(|e| {
            AppError::Inference(DetectorError::Inference(format!(
                "prediction task failed: {e}"
            )))
        })??
    };

    let result_path = if prediction.save_path.is_file() {
        prediction.save_path.clone()
    } else {
        resolve_result(&prediction.save_dir, &upload.file_name())
    };

    let artifact = state.artifacts.id_for(&result_path).ok_or_else(|| {
        AppError::Inference(DetectorError::Inference(format!(
            "annotated image {} is outside the results directory",
            result_path.display()
        )))
    })?;

    let labels = detected_labels(handle.labels(), &prediction.detections);

    tracing::info!(
        upload = %upload.path.display(),
        artifact = %artifact,
        detections = prediction.detections.len(),
        labels = ?labels,
        "Prediction complete"
    );

    let view = ResultView {
        image_url: format!("/results/{artifact}"),
        download_url: format!("/download/{artifact}"),
        labels,
        model_used: handle.name().to_string(),
    };

    Ok((view, prediction.detections.len()))
}
