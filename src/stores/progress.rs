use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::time::Duration;

use crate::cache::Cache;
use crate::db::models::{assert_owner, PostType, ProgressEntry, ProgressKind};
use crate::error::{AppError, AppResult};
use crate::media::MediaStore;
use crate::state::DbPool;
use crate::stores::{self, Page};

/// The discriminated payload arrives as a tagged union, so shape
/// validation happens at deserialization (a `weight` entry without a
/// weight never constructs).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInput {
    #[serde(flatten)]
    pub entry: ProgressKind,
    #[serde(default)]
    pub notes: Option<String>,
}

const SELECT: &str = "SELECT id, user_id, entry_json, notes, created_at FROM progress";

pub fn create(
    pool: &DbPool,
    cache: &Cache,
    owner_id: &str,
    input: ProgressInput,
) -> AppResult<ProgressEntry> {
    let conn = pool.get()?;
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO progress (id, user_id, entry_json, notes) VALUES (?1, ?2, ?3, ?4)",
        params![
            id,
            owner_id,
            serde_json::to_string(&input.entry)?,
            input.notes
        ],
    )?;

    cache.invalidate_prefix(&stores::list_prefix(PostType::Progress, owner_id));
    get(&conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> AppResult<ProgressEntry> {
    let row = conn
        .query_row(&format!("{} WHERE id = ?1", SELECT), params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .optional()?
        .ok_or_else(|| AppError::not_found("Progress entry"))?;

    let (id, user_id, entry_json, notes, created_at) = row;
    Ok(ProgressEntry {
        photos: stores::load_photos(&conn, PostType::Progress, &id)?,
        id,
        user_id,
        entry: serde_json::from_str(&entry_json)?,
        notes,
        created_at,
    })
}

/// Paginated, newest-first list of one owner's progress entries, cached
/// per page.
pub fn list(
    pool: &DbPool,
    cache: &Cache,
    ttl: Duration,
    owner_id: &str,
    page: u32,
    limit: u32,
) -> AppResult<serde_json::Value> {
    let key = stores::list_key(PostType::Progress, owner_id, page, limit);
    if let Some(cached) = cache.get(&key) {
        return Ok(cached);
    }

    let conn = pool.get()?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM progress WHERE user_id = ?1",
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
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    )?;

    let mut items = Vec::new();
    for row in rows {
        let (id, user_id, entry_json, notes, created_at) = row?;
        items.push(ProgressEntry {
            photos: stores::load_photos(&conn, PostType::Progress, &id)?,
            id,
            user_id,
            entry: serde_json::from_str(&entry_json)?,
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
    input: ProgressInput,
) -> AppResult<ProgressEntry> {
    let conn = pool.get()?;
    let existing = get(&conn, id)?;
    assert_owner(&existing, actor_id)?;

    conn.execute(
        "UPDATE progress SET entry_json = ?1, notes = ?2 WHERE id = ?3",
        params![serde_json::to_string(&input.entry)?, input.notes, id],
    )?;

    cache.invalidate_prefix(&stores::list_prefix(PostType::Progress, actor_id));
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

    stores::release_photos(&conn, media, PostType::Progress, id)?;
    conn.execute("DELETE FROM progress WHERE id = ?1", params![id])?;

    cache.invalidate_prefix(&stores::list_prefix(PostType::Progress, actor_id));
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
) -> AppResult<ProgressEntry> {
    let conn = pool.get()?;
    let existing = get(&conn, id)?;
    assert_owner(&existing, actor_id)?;

    for (data, mime) in files {
        let reference = media.store(data, &mime, actor_id)?;
        stores::insert_photo(&conn, PostType::Progress, id, actor_id, &reference)?;
    }

    cache.invalidate_prefix(&stores::list_prefix(PostType::Progress, actor_id));
    get(&conn, id)
}
