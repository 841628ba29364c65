#![allow(dead_code)]

use blog_backend::models::db_operations::{
    comments_db_operations, posts_db_operations, taxonomy_db_operations, users_db_operations,
};
use blog_backend::models::{PostDraft, SessionUser};
use blog_backend::setup::db_setup::setup_blog_db;
use blog_backend::{with_foreign_keys, DbPool};
use chrono::{DateTime, Duration, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub const PASSWORD: &str = "s3cret-pass";

/// One shared in-memory database: a single pooled connection, schema applied.
pub fn memory_pool() -> DbPool {
    let pool = Pool::builder()
        .max_size(1)
        .build(with_foreign_keys(SqliteConnectionManager::memory()))
        .expect("in-memory pool");
    {
        let mut conn = pool.get().expect("connection");
        setup_blog_db(&mut conn).expect("schema");
    }
    pool
}

pub fn add_user(pool: &DbPool, username: &str) -> SessionUser {
    let conn = pool.get().expect("connection");
    let id = users_db_operations::create_user(&conn, username, PASSWORD, "").expect("user");
    SessionUser { id, username: username.to_string() }
}

pub fn add_category(pool: &DbPool, slug: &str, is_published: bool) -> i64 {
    let conn = pool.get().expect("connection");
    taxonomy_db_operations::create_category(&conn, slug, "", slug, is_published).expect("category")
}

pub fn draft(title: &str, pub_date: DateTime<Utc>, is_published: bool) -> PostDraft {
    PostDraft {
        title: title.to_string(),
        text: format!("Body of {}", title),
        pub_date,
        category_id: None,
        location_id: None,
        is_published,
    }
}

/// Inserts a row as-is, without the creation rule.
pub fn add_post(pool: &DbPool, author: &SessionUser, draft: &PostDraft) -> i64 {
    let conn = pool.get().expect("connection");
    posts_db_operations::insert_post(&conn, author.id, draft).expect("post")
}

pub fn an_hour_ago() -> DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

pub fn tomorrow() -> DateTime<Utc> {
    Utc::now() + Duration::days(1)
}

/// Adds a comment directly, bypassing visibility checks.
pub fn add_comment(pool: &DbPool, author: &SessionUser, post_id: i64, text: &str) -> i64 {
    let conn = pool.get().expect("connection");
    comments_db_operations::insert_comment(&conn, post_id, author.id, text).expect("comment")
}

pub fn comment_count(pool: &DbPool, post_id: i64) -> usize {
    let conn = pool.get().expect("connection");
    comments_db_operations::read_comments_for_post(&conn, post_id).expect("comments").len()
}

pub fn post_title(pool: &DbPool, post_id: i64) -> String {
    let conn = pool.get().expect("connection");
    posts_db_operations::read_post(&conn, post_id).expect("query").expect("post").title
}
