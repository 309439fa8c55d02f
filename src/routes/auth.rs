use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;
use serde_json::json;

use crate::auth::password;
use crate::error::{AppError, AppResult, FieldError};
use crate::routes::{users, ApiResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

fn validate_register(input: &RegisterInput) -> AppResult<()> {
    let mut errors = Vec::new();
    if !input.email.contains('@') || input.email.trim().len() < 3 {
        errors.push(FieldError::new("email", "A valid email is required"));
    }
    if input.password.chars().count() < 8 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if input.name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<impl IntoResponse> {
    validate_register(&input)?;

    let conn = state.db.get()?;
    let id = uuid::Uuid::now_v7().to_string();
    let email = input.email.trim().to_lowercase();
    let hashed = password::hash(&input.password)?;

    let result = conn.execute(
        "INSERT INTO users (id, email, password_hash, name) VALUES (?1, ?2, ?3, ?4)",
        params![id, email, hashed, input.name.trim()],
    );
    match result {
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(AppError::Conflict("Email already registered".into()))
        }
        other => {
            other?;
        }
    }

    let user = users::fetch_user(&conn, &id)?;
    let token = state.jwt.issue(&id, &email)?;
    tracing::info!("Registered user {}", id);

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Registered", json!({ "token": token, "user": user })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let row = conn
        .query_row(
            "SELECT id, email, password_hash FROM users WHERE email = ?1",
            params![input.email.trim()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    // One failure path for unknown email and wrong password.
    let (id, email, hashed) = row.ok_or(AppError::InvalidCredentials)?;
    if !password::verify(&input.password, &hashed) {
        return Err(AppError::InvalidCredentials);
    }

    let user = users::fetch_user(&conn, &id)?;
    let token = state.jwt.issue(&id, &email)?;

    Ok(ApiResponse::ok(json!({ "token": token, "user": user })))
}
