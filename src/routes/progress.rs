use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::time::Duration;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::{collect_files, ApiResponse, PageQuery};
use crate::state::AppState;
use crate::stores::progress::{self, ProgressInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/progress", post(create).get(list))
        .route(
            "/progress/{id}",
            get(get_one).patch(update).delete(delete_one),
        )
        .route("/progress/{id}/photos", post(add_photos))
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ProgressInput>,
) -> AppResult<impl IntoResponse> {
    let entry = progress::create(&state.db, &state.cache, &user.id, input)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(entry)))
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, limit) = query.resolve();
    let ttl = Duration::from_secs(state.config.cache.list_ttl_secs);
    let value = progress::list(&state.db, &state.cache, ttl, &user.id, page, limit)?;
    Ok(ApiResponse::ok(value))
}

async fn get_one(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let entry = progress::get(&conn, &id)?;
    Ok(ApiResponse::ok(entry))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<ProgressInput>,
) -> AppResult<impl IntoResponse> {
    let entry = progress::update(&state.db, &state.cache, &id, &user.id, input)?;
    Ok(ApiResponse::with_message("Progress entry updated", entry))
}

async fn delete_one(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    progress::delete(&state.db, &state.cache, &state.media, &id, &user.id)?;
    Ok(ApiResponse::with_message("Progress entry deleted", ()))
}

async fn add_photos(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let files = collect_files(&mut multipart, "photos").await?;
    let entry = progress::add_photos(&state.db, &state.cache, &state.media, &id, &user.id, files)?;
    Ok(ApiResponse::with_message("Photos added", entry))
}
