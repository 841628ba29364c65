use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public profile of a registered user. The password hash never leaves
/// `users_db_operations`.
#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
}

/// Identity stored in the session cookie.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Tag {
    pub id: i64,
    pub tag: String,
}

/// A post row as stored.
#[derive(Debug, Serialize, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// Validated, author-independent post fields. The author is set once at
/// insert time and is never part of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    pub is_published: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct AuthorRef {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct CategoryRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct LocationRef {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
}

/// A post joined with everything a listing or detail page shows, loaded in
/// one query.
#[derive(Debug, Serialize, Clone)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub author: AuthorRef,
    pub category: Option<CategoryRef>,
    pub location: Option<LocationRef>,
    pub comment_count: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author: AuthorRef,
    pub created_at: DateTime<Utc>,
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub message: String,
    pub r#type: String, // 'success' or 'error'
}

/// Result of a mutation that is gated on authorship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    Forbidden,
}

pub mod db_operations;
