use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::jwt::JwtKeys;
use crate::cache::Cache;
use crate::config::Config;
use crate::media::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub cache: Cache,
    pub media: MediaStore,
    pub jwt: Arc<JwtKeys>,
}
