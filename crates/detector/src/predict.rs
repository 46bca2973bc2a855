use crate::annotate::Annotator;
use crate::detection::Detection;
use crate::error::DetectorError;
use crate::labels::LabelTable;
use crate::registry::ModelHandle;
use image::{DynamicImage, ImageFormat, ImageReader, ImageResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const FALLBACK_EXTENSION: &str = "jpg";

/// Outcome of one prediction call.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Directory the annotated image was written to.
    pub save_dir: PathBuf,
    /// Exact path of the annotated image.
    pub save_path: PathBuf,
    pub detections: Vec<Detection>,
}

/// Run `handle` on the image at `source` and write an annotated copy into
/// `save_dir`.
///
/// The copy keeps the source file name. Sources that are not JPEG, PNG, BMP,
/// TIFF or WebP are saved as `.jpg`. An existing file with the same name is
/// overwritten.
pub fn predict(
    handle: &ModelHandle,
    annotator: &Annotator,
    source: &Path,
    save_dir: &Path,
) -> Result<Prediction, DetectorError> {
    let _span = tracing::info_span!(
        "predict",
        model = handle.name(),
        source = %source.display()
    )
    .entered();

    let image = decode(source).map_err(|source_err| DetectorError::Decode {
        path: source.to_path_buf(),
        source: source_err,
    })?;

    let detections = handle.detect(&image)?;

    let mut annotated = image.to_rgb8();
    annotator.draw(&mut annotated, &detections, handle.labels());

    std::fs::create_dir_all(save_dir)?;
    let save_path = save_dir.join(output_file_name(source));

    annotated
        .save(&save_path)
        .map_err(|e| DetectorError::Encode {
            path: save_path.clone(),
            source: e,
        })?;

    tracing::info!(
        detections = detections.len(),
        save_path = %save_path.display(),
        "Prediction saved"
    );

    Ok(Prediction {
        save_dir: save_dir.to_path_buf(),
        save_path,
        detections,
    })
}

/// Decode by content; the extension is only a hint.
fn decode(source: &Path) -> ImageResult<DynamicImage> {
    Ok(ImageReader::open(source)?.with_guessed_format()?.decode()?)
}

/// File name the annotated copy of `source` is written under.
pub fn output_file_name(source: &Path) -> PathBuf {
    let file_name = PathBuf::from(source.file_name().unwrap_or(source.as_os_str()));

    let writable = matches!(
        ImageFormat::from_path(&file_name),
        Ok(ImageFormat::Jpeg
            | ImageFormat::Png
            | ImageFormat::Bmp
            | ImageFormat::Tiff
            | ImageFormat::WebP)
    );

    if writable {
        file_name
    } else {
        file_name.with_extension(FALLBACK_EXTENSION)
    }
}

/// Unique labels of `detections`, in order of first appearance.
pub fn detected_labels(labels: &LabelTable, detections: &[Detection]) -> Vec<String> {
    let mut seen = HashSet::new();
    detections
        .iter()
        .map(|d| labels.name(d.class_id))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
