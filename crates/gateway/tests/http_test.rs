use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use detector::{BoundingBox, Detection, Detector, LabelTable, ModelLoader};
use gateway::{AppState, Config, router};
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "gateway-test-boundary";

struct StubDetector {
    detections: Vec<Detection>,
}

impl Detector for StubDetector {
    fn detect(&mut self, _image: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }

    fn labels(&self) -> LabelTable {
        LabelTable::from_names(["person", "car"])
    }
}

/// Loader that hands out stub detectors and counts constructions
struct StubLoader {
    detections: Vec<Detection>,
    failing_model: Option<&'static str>,
    constructed: AtomicUsize,
}

impl StubLoader {
    fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            failing_model: None,
            constructed: AtomicUsize::new(0),
        }
    }

    fn failing(model: &'static str) -> Self {
        Self {
            failing_model: Some(model),
            ..Self::new(Vec::new())
        }
    }
}

impl ModelLoader for StubLoader {
    fn load(&self, name: &str, weights: &Path) -> anyhow::Result<Box<dyn Detector>> {
        if self.failing_model == Some(name) {
            anyhow::bail!("Model file not found: {}", weights.display());
        }
        self.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubDetector {
            detections: self.detections.clone(),
        }))
    }
}

fn detection(class_id: usize) -> Detection {
    Detection {
        class_id,
        confidence: 0.9,
        bbox: BoundingBox::new(2.0, 2.0, 12.0, 12.0),
    }
}

fn person_car_person() -> Vec<Detection> {
    vec![detection(0), detection(1), detection(0)]
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        upload_dir: dir.path().join("uploads"),
        result_dir: dir.path().join("results"),
        weights_dir: dir.path().join("weights"),
        ..Config::default()
    }
}

async fn test_state(dir: &TempDir, loader: Arc<StubLoader>) -> AppState {
    AppState::build(test_config(dir), loader).await.unwrap()
}

fn png_bytes() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(16, 16, image::Rgb([40, 40, 40]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

enum Part<'a> {
    File { filename: &'a str, bytes: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File { filename, bytes } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Pull the artifact identifier out of the download link on a result page
fn artifact_from_page(html: &str) -> String {
    let start = html.find("/download/").expect("download link") + "/download/".len();
    let end = start + html[start..].find('"').expect("closing quote");
    html[start..end].to_string()
}

#[tokio::test]
async fn test_index_renders_upload_form() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::new(Vec::new()))).await;

    let response = router(state).oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"name="file""#));
    assert!(html.contains(r#"<option value="best">best</option>"#));
    assert!(html.contains(r#"<option value="last" selected>last</option>"#));
}

#[tokio::test]
async fn test_startup_creates_working_directories() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(StubLoader::new(Vec::new()));
    let _state = test_state(&dir, loader.clone()).await;

    assert!(dir.path().join("uploads").is_dir());
    assert!(dir.path().join("results").is_dir());
    assert_eq!(
        loader.constructed.load(Ordering::SeqCst),
        0,
        "Models load lazily by default"
    );
}

#[tokio::test]
async fn test_predict_renders_result_page() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::new(person_car_person()))).await;
    let png = png_bytes();

    let response = router(state)
        .oneshot(multipart_request(&[
            Part::File {
                filename: "street.png",
                bytes: &png,
            },
            Part::Text {
                name: "model_choice",
                value: "best",
            },
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;

    assert_eq!(html.matches("<li>person</li>").count(), 1);
    assert_eq!(html.matches("<li>car</li>").count(), 1);
    assert!(html.contains("<strong>best</strong>"));

    let artifact = artifact_from_page(&html);
    assert!(artifact.ends_with(".png"), "artifact: {artifact}");
    assert!(html.contains(&format!(r#"src="/results/{artifact}""#)));
    assert!(dir.path().join("results").join(&artifact).is_file());
    assert!(dir.path().join("uploads").join(&artifact).is_file());
}

#[tokio::test]
async fn test_predict_without_detections_renders_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::new(Vec::new()))).await;
    let png = png_bytes();

    let response = router(state)
        .oneshot(multipart_request(&[Part::File {
            filename: "empty.png",
            bytes: &png,
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(!html.contains("<li>"));
    assert!(html.contains("No objects detected."));
}

#[tokio::test]
async fn test_unknown_model_choice_uses_default() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::new(Vec::new()))).await;
    let png = png_bytes();

    let response = router(state)
        .oneshot(multipart_request(&[
            Part::File {
                filename: "a.png",
                bytes: &png,
            },
            Part::Text {
                name: "model_choice",
                value: "newest",
            },
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<strong>last</strong>"));
}

#[tokio::test]
async fn test_model_is_constructed_once_across_requests() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(StubLoader::new(person_car_person()));
    let state = test_state(&dir, loader.clone()).await;
    let app = router(state);
    let png = png_bytes();

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(multipart_request(&[
                Part::File {
                    filename: "same.png",
                    bytes: &png,
                },
                Part::Text {
                    name: "model_choice",
                    value: "best",
                },
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(loader.constructed.load(Ordering::SeqCst), 1);
    assert_eq!(
        std::fs::read_dir(dir.path().join("uploads")).unwrap().count(),
        3,
        "Identically named uploads must not overwrite each other"
    );
}

#[tokio::test]
async fn test_missing_file_field_redirects_home() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::new(Vec::new()))).await;

    let response = router(state)
        .oneshot(multipart_request(&[Part::Text {
            name: "model_choice",
            value: "best",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
}

#[tokio::test]
async fn test_empty_filename_redirects_home() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(StubLoader::new(Vec::new()));
    let state = test_state(&dir, loader.clone()).await;

    let response = router(state)
        .oneshot(multipart_request(&[Part::File {
            filename: "",
            bytes: b"",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    assert_eq!(loader.constructed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_model_load_failure_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::failing("best"))).await;
    let png = png_bytes();

    let response = router(state)
        .oneshot(multipart_request(&[
            Part::File {
                filename: "a.png",
                bytes: &png,
            },
            Part::Text {
                name: "model_choice",
                value: "best",
            },
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body_text(response).await.contains("weights"));
}

#[tokio::test]
async fn test_undecodable_upload_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::new(Vec::new()))).await;

    let response = router(state)
        .oneshot(multipart_request(&[Part::File {
            filename: "notes.png",
            bytes: b"not an image",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_upload_without_extension_is_detected_by_content() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::new(person_car_person()))).await;
    let png = png_bytes();

    let response = router(state)
        .oneshot(multipart_request(&[Part::File {
            filename: "snapshot",
            bytes: &png,
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    let artifact = artifact_from_page(&html);
    assert!(artifact.ends_with(".jpg"), "artifact {artifact}");
    assert!(dir.path().join("results").join(&artifact).is_file());
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        max_upload_bytes: 64,
        ..test_config(&dir)
    };
    let state = AppState::build(config, Arc::new(StubLoader::new(Vec::new())))
        .await
        .unwrap();
    let large = vec![0u8; 4096];

    let response = router(state)
        .oneshot(multipart_request(&[Part::File {
            filename: "large.png",
            bytes: &large,
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_text(response).await, "Upload too large.");
    assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);
}

#[tokio::test]
async fn test_download_serves_attachment() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::new(person_car_person()))).await;
    let app = router(state);
    let png = png_bytes();

    let page = app
        .clone()
        .oneshot(multipart_request(&[Part::File {
            filename: "street.png",
            bytes: &png,
        }]))
        .await
        .unwrap();
    let artifact = artifact_from_page(&body_text(page).await);

    let response = app
        .clone()
        .oneshot(get(&format!("/download/{artifact}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{artifact}\"").as_str()
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let inline = app
        .oneshot(get(&format!("/results/{artifact}")))
        .await
        .unwrap();
    assert_eq!(inline.status(), StatusCode::OK);
    assert!(inline.headers().get(header::CONTENT_DISPOSITION).is_none());
}

#[tokio::test]
async fn test_download_outside_results_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("secret.txt"), b"do not serve").unwrap();
    let state = test_state(&dir, Arc::new(StubLoader::new(Vec::new()))).await;
    let app = router(state);

    for uri in [
        "/download/..%2Fsecret.txt",
        "/download/%2E%2E",
        "/download/..%5Csecret.txt",
        "/download/missing.jpg",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {uri}");
    }
}

#[tokio::test]
async fn test_preload_constructs_every_model() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(StubLoader::new(Vec::new()));
    let config = Config {
        preload: true,
        ..test_config(&dir)
    };

    AppState::build(config, loader.clone()).await.unwrap();

    assert_eq!(loader.constructed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_preload_failure_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        preload: true,
        ..test_config(&dir)
    };

    let result = AppState::build(config, Arc::new(StubLoader::failing("last"))).await;

    assert!(result.is_err());
}
