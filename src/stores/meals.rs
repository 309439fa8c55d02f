use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::time::Duration;

use crate::cache::Cache;
use crate::db::models::{assert_owner, Meal, Nutrition, PostType};
use crate::error::{AppError, AppResult, FieldError};
use crate::media::MediaStore;
use crate::state::DbPool;
use crate::stores::{self, Page};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealInput {
    pub name: String,
    pub nutrition: Nutrition,
    #[serde(default)]
    pub notes: Option<String>,
}

fn validate(input: &MealInput) -> AppResult<()> {
    let mut errors = Vec::new();
    if input.name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    }
    let n = &input.nutrition;
    for (field, value) in [
        ("nutrition.calories", n.calories),
        ("nutrition.protein", n.protein),
        ("nutrition.carbs", n.carbs),
        ("nutrition.fat", n.fat),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(FieldError::new(field, "Must be a non-negative number"));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

const SELECT: &str = "SELECT id, user_id, name, nutrition_json, notes, created_at FROM meals";

pub fn create(pool: &DbPool, cache: &Cache, owner_id: &str, input: MealInput) -> AppResult<Meal> {
    validate(&input)?;

    let conn = pool.get()?;
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO meals (id, user_id, name, nutrition_json, notes) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            owner_id,
            input.name.trim(),
            serde_json::to_string(&input.nutrition)?,
            input.notes
        ],
    )?;

    cache.invalidate_prefix(&stores::list_prefix(PostType::Meal, owner_id));
    get(&conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> AppResult<Meal> {
    let row = conn
        .query_row(&format!("{} WHERE id = ?1", SELECT), params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .optional()?
        .ok_or_else(|| AppError::not_found("Meal"))?;

    let (id, user_id, name, nutrition_json, notes, created_at) = row;
    Ok(Meal {
        photos: stores::load_photos(&conn, PostType::Meal, &id)?,
        id,
        user_id,
        name,
        nutrition: serde_json::from_str(&nutrition_json)?,
        notes,
        created_at,
    })
}

/// Paginated, newest-first list of one owner's meals, cached per page.
pub fn list(
    pool: &DbPool,
    cache: &Cache,
    ttl: Duration,
    owner_id: &str,
    page: u32,
    limit: u32,
) -> AppResult<serde_json::Value> {
    let key = stores::list_key(PostType::Meal, owner_id, page, limit);
    if let Some(cached) = cache.get(&key) {
        return Ok(cached);
    }

    let conn = pool.get()?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM meals WHERE user_id = ?1",
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
        let (id, user_id, name, nutrition_json, notes, created_at) = row?;
        items.push(Meal {
            photos: stores::load_photos(&conn, PostType::Meal, &id)?,
            id,
            user_id,
            name,
            nutrition: serde_json::from_str(&nutrition_json)?,
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
    input: MealInput,
) -> AppResult<Meal> {
    validate(&input)?;

    let conn = pool.get()?;
    let existing = get(&conn, id)?;
    assert_owner(&existing, actor_id)?;

    conn.execute(
        "UPDATE meals SET name = ?1, nutrition_json = ?2, notes = ?3 WHERE id = ?4",
        params![
            input.name.trim(),
            serde_json::to_string(&input.nutrition)?,
            input.notes,
            id
        ],
    )?;

    cache.invalidate_prefix(&stores::list_prefix(PostType::Meal, actor_id));
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

    stores::release_photos(&conn, media, PostType::Meal, id)?;
    conn.execute("DELETE FROM meals WHERE id = ?1", params![id])?;

    cache.invalidate_prefix(&stores::list_prefix(PostType::Meal, actor_id));
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
) -> AppResult<Meal> {
    let conn = pool.get()?;
    let existing = get(&conn, id)?;
    assert_owner(&existing, actor_id)?;

    for (data, mime) in files {
        let reference = media.store(data, &mime, actor_id)?;
        stores::insert_photo(&conn, PostType::Meal, id, actor_id, &reference)?;
    }

    cache.invalidate_prefix(&stores::list_prefix(PostType::Meal, actor_id));
    get(&conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_user, test_pool};

    fn sample_input() -> MealInput {
        MealInput {
            name: "Chicken and rice".into(),
            nutrition: Nutrition {
                calories: 650.0,
                protein: 45.0,
                carbs: 70.0,
                fat: 15.0,
            },
            notes: None,
        }
    }

    #[test]
    fn create_and_get_roundtrip() {
        let pool = test_pool();
        seed_user(&pool, "u1");
        let cache = Cache::new();

        let meal = create(&pool, &cache, "u1", sample_input()).unwrap();
        assert_eq!(meal.user_id, "u1");
        let fetched = get(&pool.get().unwrap(), &meal.id).unwrap();
        assert_eq!(fetched.nutrition.calories, 650.0);
    }

    #[test]
    fn create_rejects_negative_macros() {
        let pool = test_pool();
        seed_user(&pool, "u1");
        let cache = Cache::new();

        let mut input = sample_input();
        input.nutrition.protein = -1.0;
        let err = create(&pool, &cache, "u1", input);
        assert!(matches!(err, Err(AppError::Validation(_))));
    }

    #[test]
    fn delete_by_non_owner_is_forbidden() {
        let pool = test_pool();
        seed_user(&pool, "u1");
        seed_user(&pool, "u2");
        let cache = Cache::new();
        let tmp = tempfile::tempdir().unwrap();
        let media = MediaStore::new(tmp.path().to_path_buf()).unwrap();

        let meal = create(&pool, &cache, "u1", sample_input()).unwrap();
        let err = delete(&pool, &cache, &media, &meal.id, "u2");
        assert!(matches!(err, Err(AppError::Forbidden)));
        assert!(get(&pool.get().unwrap(), &meal.id).is_ok());
    }

    #[test]
    fn list_pages_sum_to_total() {
        let pool = test_pool();
        seed_user(&pool, "u1");
        let cache = Cache::new();

        for _ in 0..5 {
            create(&pool, &cache, "u1", sample_input()).unwrap();
        }

        let mut seen = 0;
        for page in 1..=3 {
            let value = list(&pool, &cache, Duration::from_secs(60), "u1", page, 2).unwrap();
            seen += value["items"].as_array().unwrap().len();
            let has_more = value["pagination"]["hasMore"].as_bool().unwrap();
            assert_eq!(has_more, page < 3);
        }
        assert_eq!(seen, 5);
    }
}
