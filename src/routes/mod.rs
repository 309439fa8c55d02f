pub mod auth;
pub mod health;
pub mod meals;
pub mod posts;
pub mod progress;
pub mod uploads;
pub mod users;
pub mod workouts;

use axum::extract::multipart::Multipart;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::media::{MAX_FILES_PER_UPLOAD, MAX_UPLOAD_BYTES};
use crate::state::AppState;

/// Uniform response envelope: `{success, message?, data?}` on the happy
/// path; errors carry `{success: false, message, errors?}` (see
/// `AppError::into_response`).
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> axum::Json<Self> {
        axum::Json(Self {
            success: true,
            message: None,
            data: Some(data),
        })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> axum::Json<Self> {
        axum::Json(Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        })
    }
}

/// Shared pagination query convention: `page` (default 1), `limit`
/// (default 20, capped at 100).
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn resolve(&self) -> (u32, u32) {
        (
            self.page.unwrap_or(1).max(1),
            self.limit.unwrap_or(20).clamp(1, 100),
        )
    }
}

/// Drain a multipart request, keeping files under `field_name`. Enforces
/// the per-request file count; per-file size and MIME checks belong to
/// the media store.
pub async fn collect_files(
    multipart: &mut Multipart,
    field_name: &str,
) -> AppResult<Vec<(Bytes, String)>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid(field_name, format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let mime = field
            .content_type()
            .ok_or_else(|| AppError::invalid(field_name, "Missing content type"))?
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid(field_name, format!("Upload failed: {}", e)))?;
        files.push((data, mime));

        if files.len() > MAX_FILES_PER_UPLOAD {
            return Err(AppError::invalid(
                field_name,
                format!("At most {} files per upload", MAX_FILES_PER_UPLOAD),
            ));
        }
    }
    if files.is_empty() {
        return Err(AppError::invalid(field_name, "No file provided"));
    }
    Ok(files)
}

/// Full application router. `main` adds tracing/CORS layers and state.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(workouts::router())
        .merge(meals::router())
        .merge(progress::router())
        .merge(posts::router())
        .merge(uploads::router())
        // Multipart uploads: 5 files x 5 MiB plus encoding overhead.
        .layer(DefaultBodyLimit::max((MAX_FILES_PER_UPLOAD + 1) * MAX_UPLOAD_BYTES))
}
