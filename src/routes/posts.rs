use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::time::Duration;

use crate::db::models::PostType;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::feed::{self, CommentInput, EditPost, FeedFilter, NewPost};
use crate::routes::ApiResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create).get(list))
        .route("/posts/{id}", get(get_one).patch(edit).delete(delete_one))
        .route("/posts/{id}/like", post(like))
        .route("/posts/{id}/comment", post(comment))
        .route("/comments/{id}/reply", post(reply))
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<NewPost>,
) -> AppResult<impl IntoResponse> {
    let view = feed::create_post(&state.db, &state.cache, &user.id, input)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(view)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub post_type: Option<PostType>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<impl IntoResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let filter = FeedFilter {
        user_id: query.user_id,
        post_type: query.post_type,
    };
    let ttl = Duration::from_secs(state.config.cache.feed_ttl_secs);
    let value = feed::list_posts(&state.db, &state.cache, ttl, &filter, page, limit)?;
    Ok(ApiResponse::ok(value))
}

async fn get_one(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let view = feed::get_post(&state.db, &id)?;
    Ok(ApiResponse::ok(view))
}

async fn like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let result = feed::toggle_like(&state.db, &state.cache, &id, &user.id)?;
    Ok(ApiResponse::ok(result))
}

async fn comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<CommentInput>,
) -> AppResult<impl IntoResponse> {
    let comment = feed::add_comment(&state.db, &state.cache, &id, &user.id, input)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(comment)))
}

async fn reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<CommentInput>,
) -> AppResult<impl IntoResponse> {
    let reply = feed::add_reply(&state.db, &state.cache, &id, &user.id, input)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(reply)))
}

async fn edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<EditPost>,
) -> AppResult<impl IntoResponse> {
    let view = feed::edit_post(&state.db, &state.cache, &id, &user.id, input)?;
    Ok(ApiResponse::with_message("Post updated", view))
}

async fn delete_one(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    feed::delete_post(&state.db, &state.cache, &id, &user.id)?;
    Ok(ApiResponse::with_message("Post deleted", ()))
}
