use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::time::Duration;

use crate::cache::Cache;
use crate::db::models::{assert_owner, Exercise, PostType, Workout};
use crate::error::{AppError, AppResult, FieldError};
use crate::media::MediaStore;
use crate::state::DbPool;
use crate::stores::{self, Page};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutInput {
    pub name: String,
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn validate(input: &WorkoutInput) -> AppResult<()> {
    let mut errors = Vec::new();
    if input.name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    }
    if input.exercises.is_empty() {
        errors.push(FieldError::new("exercises", "At least one exercise is required"));
    }
    for (i, exercise) in input.exercises.iter().enumerate() {
        if exercise.name.trim().is_empty() {
            errors.push(FieldError::new(
                &format!("exercises[{}].name", i),
                "Exercise name is required",
            ));
        }
        if exercise.sets < 1 || exercise.reps < 1 {
            errors.push(FieldError::new(
                &format!("exercises[{}]", i),
                "Sets and reps must be at least 1",
            ));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

const SELECT: &str = "SELECT id, user_id, name, exercises_json, notes, created_at FROM workouts";

pub fn create(
    pool: &DbPool,
    cache: &Cache,
    owner_id: &str,
    input: WorkoutInput,
) -> AppResult<Workout> {
    validate(&input)?;

    let conn = pool.get()?;
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO workouts (id, user_id, name, exercises_json, notes) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            owner_id,
            input.name.trim(),
            serde_json::to_string(&input.exercises)?,
            input.notes
        ],
    )?;

    cache.invalidate_prefix(&stores::list_prefix(PostType::Workout, owner_id));
    get(&conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> AppResult<Workout> {
    let workout = conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT),
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Workout"))?;

    let (id, user_id, name, exercises_json, notes, created_at) = workout;
    Ok(Workout {
        photos: stores::load_photos(&conn, PostType::Workout, &id)?,
        id,
        user_id,
        name,
        exercises: serde_json::from_str(&exercises_json)?,
        notes,
        created_at,
    })
}

/// Paginated, newest-first list of one owner's workouts, cached per page.
pub fn list(
    pool: &DbPool,
    cache: &Cache,
    ttl: Duration,
    owner_id: &str,
    page: u32,
    limit: u32,
) -> AppResult<serde_json::Value> {
    let key = stores::list_key(PostType::Workout, owner_id, page, limit);
    if let Some(cached) = cache.get(&key) {
        return Ok(cached);
    }

    let conn = pool.get()?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM workouts WHERE user_id = ?1",
        params![owner_id],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{} WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        SELECT
    ))?;
    let rows = stmt.query_map(
        params![owner_id, limit, stores::offset(page, limit)],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    )?;

    let mut items = Vec::new();
    for row in rows {
        let (id, user_id, name, exercises_json, notes, created_at) = row?;
        items.push(Workout {
            photos: stores::load_photos(&conn, PostType::Workout, &id)?,
            id,
            user_id,
            name,
            exercises: serde_json::from_str(&exercises_json)?,
            notes,
            created_at,
        });
    }

    let pagination = stores::paginate(total, page, limit, items.len());
    let value = serde_json::to_value(Page { items, pagination })?;
    cache.put(&key, value.clone(), ttl);
    Ok(value)
}

pub fn update(
    pool: &DbPool,
    cache: &Cache,
    id: &str,
    actor_id: &str,
    input: WorkoutInput,
) -> AppResult<Workout> {
    validate(&input)?;

    let conn = pool.get()?;
    let existing = get(&conn, id)?;
    assert_owner(&existing, actor_id)?;

    conn.execute(
        "UPDATE workouts SET name = ?1, exercises_json = ?2, notes = ?3 WHERE id = ?4",
        params![
            input.name.trim(),
            serde_json::to_string(&input.exercises)?,
            input.notes,
            id
        ],
    )?;

    cache.invalidate_prefix(&stores::list_prefix(PostType::Workout, actor_id));
    get(&conn, id)
}

pub fn delete(
    pool: &DbPool,
    cache: &Cache,
    media: &MediaStore,
    id: &str,
    actor_id: &str,
) -> AppResult<()> {
    let conn = pool.get()?;
    let existing = get(&conn, id)?;
    assert_owner(&existing, actor_id)?;

    stores::release_photos(&conn, media, PostType::Workout, id)?;
    conn.execute("DELETE FROM workouts WHERE id = ?1", params![id])?;

    cache.invalidate_prefix(&stores::list_prefix(PostType::Workout, actor_id));
    Ok(())
}

/// Validate, store, and attach uploaded photos. Owner-only.
pub fn add_photos(
    pool: &DbPool,
    cache: &Cache,
    media: &MediaStore,
    id: &str,
    actor_id: &str,
    files: Vec<(Bytes, String)>,
) -> AppResult<Workout> {
    let conn = pool.get()?;
    let existing = get(&conn, id)?;
    assert_owner(&existing, actor_id)?;

    for (data, mime) in files {
        let reference = media.store(data, &mime, actor_id)?;
        stores::insert_photo(&conn, PostType::Workout, id, actor_id, &reference)?;
    }

    cache.invalidate_prefix(&stores::list_prefix(PostType::Workout, actor_id));
    get(&conn, id)
}
