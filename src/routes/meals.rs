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
use crate::stores::meals::{self, MealInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create).get(list))
        .route("/meals/{id}", get(get_one).patch(update).delete(delete_one))
        .route("/meals/{id}/photos", post(add_photos))
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<MealInput>,
) -> AppResult<impl IntoResponse> {
    let meal = meals::create(&state.db, &state.cache, &user.id, input)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(meal)))
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, limit) = query.resolve();
    let ttl = Duration::from_secs(state.config.cache.list_ttl_secs);
    let value = meals::list(&state.db, &state.cache, ttl, &user.id, page, limit)?;
    Ok(ApiResponse::ok(value))
}

async fn get_one(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let meal = meals::get(&conn, &id)?;
    Ok(ApiResponse::ok(meal))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<MealInput>,
) -> AppResult<impl IntoResponse> {
    let meal = meals::update(&state.db, &state.cache, &id, &user.id, input)?;
    Ok(ApiResponse::with_message("Meal updated", meal))
}

async fn delete_one(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    meals::delete(&state.db, &state.cache, &state.media, &id, &user.id)?;
    Ok(ApiResponse::with_message("Meal deleted", ()))
}

async fn add_photos(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let files = collect_files(&mut multipart, "photos").await?;
    let meal = meals::add_photos(&state.db, &state.cache, &state.media, &id, &user.id, files)?;
    Ok(ApiResponse::with_message("Photos added", meal))
}
