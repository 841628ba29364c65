use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
pub type DbPool = Pool<SqliteConnectionManager>;

/// Listing page size used when the config does not override it.
pub const DEFAULT_POSTS_PER_PAGE: u32 = 10;

pub struct AppState {
    pub posts_per_page: u32,
}

impl Default for AppState {
    fn default() -> Self {
        AppState { posts_per_page: DEFAULT_POSTS_PER_PAGE }
    }
}

/// Every pooled connection enforces foreign keys; SQLite leaves them off
/// per connection by default.
pub fn with_foreign_keys(manager: SqliteConnectionManager) -> SqliteConnectionManager {
    manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"))
}

pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
