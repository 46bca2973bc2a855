use crate::error::AppError;
use crate::predict::{self, PredictOutcome, UploadForm};
use crate::state::AppState;
use crate::views::{render_index, render_result};
use axum::body::Body;
use axum::extract::{Multipart, Path, Request, State};
use axum::http::{HeaderValue, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(
        &state.model_names(),
        state.registry.default_model(),
    ))
}

pub async fn predict(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = UploadForm::from_multipart(multipart).await?;

    match predict::run(&state, form).await? {
        PredictOutcome::NoFile => Ok(Redirect::to("/").into_response()),
        PredictOutcome::Rendered(view) => Ok(Html(render_result(&view)).into_response()),
    }
}

/// Serve a result artifact as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(artifact): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let path = state
        .artifacts
        .locate(&artifact)
        .await
        .ok_or(AppError::NotFound)?;

    let mut response = ServeFile::new(&path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {})
        .map(Body::new);

    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, content_disposition(&artifact));
    }

    Ok(response)
}

fn content_disposition(file_name: &str) -> HeaderValue {
    let quotable = file_name
        .chars()
        .all(|c| (c.is_ascii_graphic() && c != '"') || c == ' ');

    if quotable {
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\"")) {
            return value;
        }
    }
    HeaderValue::from_static("attachment")
}
