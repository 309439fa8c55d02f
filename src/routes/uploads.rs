use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads/{reference}", get(serve))
}

/// Serve a stored upload by reference. References are opaque file names;
/// anything that fails to resolve (including path escapes) is a 404.
async fn serve(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<Response> {
    let path = state
        .media
        .resolve(&reference)
        .ok_or_else(|| AppError::not_found("File"))?;

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read upload: {}", e)))?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    Ok((
        [(header::CONTENT_TYPE, mime.essence_str().to_string())],
        data,
    )
        .into_response())
}
