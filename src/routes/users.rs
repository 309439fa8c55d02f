use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::db::models::User;
use crate::error::{AppError, AppResult, FieldError};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::{collect_files, ApiResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me).patch(update_profile))
        .route("/users/me/goal", patch(update_goal))
        .route("/users/me/picture", post(upload_picture))
        .route("/users/{id}", get(public_profile))
}

pub(crate) fn fetch_user(conn: &Connection, id: &str) -> AppResult<User> {
    conn.query_row(
        "SELECT id, email, name, age, height, weight, goal_weight, profile_picture, created_at
         FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
                age: row.get(3)?,
                height: row.get(4)?,
                weight: row.get(5)?,
                goal_weight: row.get(6)?,
                profile_picture: row.get(7)?,
                created_at: row.get(8)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("User"))
}

/// Read of a single user's public profile, anonymous allowed. The email
/// is only included when the viewer is the account holder.
async fn public_profile(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let mut user = fetch_user(&conn, &id)?;
    if viewer.0.as_ref().map(|v| v.id.as_str()) != Some(user.id.as_str()) {
        user.email = None;
    }
    Ok(ApiResponse::ok(user))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let user = fetch_user(&conn, &user.id)?;
    Ok(ApiResponse::ok(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ProfileUpdate>,
) -> AppResult<impl IntoResponse> {
    let mut errors = Vec::new();
    if matches!(input.name.as_deref(), Some(n) if n.trim().is_empty()) {
        errors.push(FieldError::new("name", "Name must not be empty"));
    }
    if matches!(input.age, Some(a) if !(1..=150).contains(&a)) {
        errors.push(FieldError::new("age", "Age must be between 1 and 150"));
    }
    for (field, value) in [("height", input.height), ("weight", input.weight)] {
        if matches!(value, Some(v) if !v.is_finite() || v <= 0.0) {
            errors.push(FieldError::new(field, "Must be a positive number"));
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let conn = state.db.get()?;
    conn.execute(
        "UPDATE users SET
            name = COALESCE(?1, name),
            age = COALESCE(?2, age),
            height = COALESCE(?3, height),
            weight = COALESCE(?4, weight)
         WHERE id = ?5",
        params![
            input.name.as_deref().map(str::trim),
            input.age,
            input.height,
            input.weight,
            user.id
        ],
    )?;

    let updated = fetch_user(&conn, &user.id)?;
    Ok(ApiResponse::with_message("Profile updated", updated))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalUpdate {
    pub goal_weight: f64,
}

async fn update_goal(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<GoalUpdate>,
) -> AppResult<impl IntoResponse> {
    if !input.goal_weight.is_finite() || input.goal_weight <= 0.0 {
        return Err(AppError::invalid("goalWeight", "Must be a positive number"));
    }

    let conn = state.db.get()?;
    conn.execute(
        "UPDATE users SET goal_weight = ?1 WHERE id = ?2",
        params![input.goal_weight, user.id],
    )?;

    let updated = fetch_user(&conn, &user.id)?;
    Ok(ApiResponse::with_message("Goal updated", updated))
}

/// Replace the profile picture; the previous one is released best-effort.
async fn upload_picture(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut files = collect_files(&mut multipart, "profilePicture").await?;
    let (data, mime) = files.remove(0);
    let reference = state.media.store(data, &mime, &user.id)?;

    let conn = state.db.get()?;
    let previous: Option<String> = conn.query_row(
        "SELECT profile_picture FROM users WHERE id = ?1",
        params![user.id],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE users SET profile_picture = ?1 WHERE id = ?2",
        params![reference, user.id],
    )?;
    if let Some(previous) = previous {
        state.media.release(&previous);
    }

    let updated = fetch_user(&conn, &user.id)?;
    Ok(ApiResponse::with_message("Profile picture updated", updated))
}
