//! Owner-scoped activity record stores (workouts, meals, progress).
//!
//! The three stores share the same contract: create validates the
//! type-specific payload and stamps the owner, list is paginated and
//! newest-first, update/delete re-check ownership against the acting
//! session, and delete releases attached photos best-effort. Every write
//! invalidates that owner's cached list pages.

pub mod meals;
pub mod progress;
pub mod workouts;

use rusqlite::params;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::models::PostType;
use crate::error::AppResult;
use crate::media::MediaStore;

/// Pagination metadata shared by every list endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_more: bool,
}

/// One page of results plus its metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// `totalPages = ceil(total / limit)`; `hasMore` is true while pages
/// remain beyond the returned slice.
pub fn paginate(total: i64, page: u32, limit: u32, returned: usize) -> Pagination {
    let total = total.max(0) as u64;
    let limit = limit.max(1) as u64;
    let skip = (page.max(1) as u64 - 1) * limit;
    Pagination {
        current_page: page.max(1),
        total_pages: total.div_ceil(limit) as u32,
        has_more: skip + (returned as u64) < total,
    }
}

/// Offset for a 1-based page.
pub fn offset(page: u32, limit: u32) -> i64 {
    (page.max(1) as i64 - 1) * limit as i64
}

/// Cache key for an owner-scoped list page.
pub fn list_key(kind: PostType, owner_id: &str, page: u32, limit: u32) -> String {
    format!(
        "{}s:{}:page={}:limit={}",
        kind.as_str(),
        owner_id,
        page,
        limit
    )
}

/// Prefix covering every cached page of one owner's list.
pub fn list_prefix(kind: PostType, owner_id: &str) -> String {
    format!("{}s:{}:", kind.as_str(), owner_id)
}

/// Load the stored photo references of one resource, insertion order.
pub fn load_photos(conn: &Connection, kind: PostType, resource_id: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT file_path FROM photos
         WHERE resource_kind = ?1 AND resource_id = ?2
         ORDER BY created_at, id",
    )?;
    let photos = stmt
        .query_map(params![kind.as_str(), resource_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(photos)
}

/// Record one stored reference against a resource.
pub fn insert_photo(
    conn: &Connection,
    kind: PostType,
    resource_id: &str,
    owner_id: &str,
    reference: &str,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO photos (id, user_id, resource_kind, resource_id, file_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            uuid::Uuid::now_v7().to_string(),
            owner_id,
            kind.as_str(),
            resource_id,
            reference
        ],
    )?;
    Ok(())
}

/// Release every stored reference of a resource and drop the rows.
/// File deletion is best-effort; a failure is logged by the media store
/// and never blocks the record's deletion.
pub fn release_photos(
    conn: &Connection,
    media: &MediaStore,
    kind: PostType,
    resource_id: &str,
) -> AppResult<()> {
    for reference in load_photos(conn, kind, resource_id)? {
        media.release(&reference);
    }
    conn.execute(
        "DELETE FROM photos WHERE resource_kind = ?1 AND resource_id = ?2",
        params![kind.as_str(), resource_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_middle_page() {
        // 5 items, limit 2: pages of 2/2/1
        let meta = paginate(5, 1, 2, 2);
        assert_eq!(
            meta,
            Pagination {
                current_page: 1,
                total_pages: 3,
                has_more: true
            }
        );
    }

    #[test]
    fn paginate_last_page_has_no_more() {
        let meta = paginate(5, 3, 2, 1);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_more);
    }

    #[test]
    fn paginate_empty_result() {
        let meta = paginate(0, 1, 20, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_more);
    }

    #[test]
    fn paginate_exact_multiple() {
        let meta = paginate(40, 2, 20, 20);
        assert_eq!(meta.total_pages, 2);
        assert!(!meta.has_more);
    }

    #[test]
    fn offset_is_one_based() {
        assert_eq!(offset(1, 20), 0);
        assert_eq!(offset(3, 10), 20);
        assert_eq!(offset(0, 10), 0); // clamped
    }

    #[test]
    fn list_keys_scope_by_owner_and_page() {
        assert_eq!(
            list_key(PostType::Workout, "u1", 2, 20),
            "workouts:u1:page=2:limit=20"
        );
        assert!(list_key(PostType::Meal, "u1", 1, 20).starts_with(&list_prefix(PostType::Meal, "u1")));
    }
}
