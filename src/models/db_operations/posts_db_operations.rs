use crate::models::db_operations::{timestamp_column, to_db_timestamp};
use crate::models::{AuthorRef, CategoryRef, LocationRef, Post, PostDraft, PostView};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Error as RusqliteError, OptionalExtension, Row};

/// Which posts a listing may show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    /// Published, not scheduled in the future, category (if any) published.
    Public,
    /// `Public`, restricted to one category.
    PublicInCategory(i64),
    /// Posts of one author; hidden ones only when the author is looking.
    ByAuthor { author_id: i64, include_hidden: bool },
}

const PUBLIC_CONDITION: &str =
    "p.is_published = 1 AND p.pub_date <= ? AND (p.category_id IS NULL OR c.is_published = 1)";

impl PostFilter {
    fn where_clause(&self, now: &DateTime<Utc>) -> (String, Vec<Value>) {
        let now = Value::Text(to_db_timestamp(now));
        match *self {
            PostFilter::Public => (PUBLIC_CONDITION.to_string(), vec![now]),
            PostFilter::PublicInCategory(category_id) => (
                format!("{} AND p.category_id = ?", PUBLIC_CONDITION),
                vec![now, Value::Integer(category_id)],
            ),
            PostFilter::ByAuthor { author_id, include_hidden: true } => {
                ("p.author_id = ?".to_string(), vec![Value::Integer(author_id)])
            }
            PostFilter::ByAuthor { author_id, include_hidden: false } => (
                format!("{} AND p.author_id = ?", PUBLIC_CONDITION),
                vec![now, Value::Integer(author_id)],
            ),
        }
    }
}

// Author, category and location are joined in so a page never issues
// per-row lookups.
const POST_VIEW_SELECT: &str = "
    SELECT p.id, p.title, p.text, p.pub_date, p.is_published, p.created_at,
           u.id, u.username,
           c.id, c.title, c.slug, c.is_published,
           l.id, l.name, l.is_published,
           (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id";

fn post_view_from_row(row: &Row) -> Result<PostView, RusqliteError> {
    let category = match row.get::<_, Option<i64>>(8)? {
        Some(id) => Some(CategoryRef {
            id,
            title: row.get(9)?,
            slug: row.get(10)?,
            is_published: row.get(11)?,
        }),
        None => None,
    };
    let location = match row.get::<_, Option<i64>>(12)? {
        Some(id) => Some(LocationRef {
            id,
            name: row.get(13)?,
            is_published: row.get(14)?,
        }),
        None => None,
    };
    Ok(PostView {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        pub_date: timestamp_column(row, 3)?,
        is_published: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
        author: AuthorRef { id: row.get(6)?, username: row.get(7)? },
        category,
        location,
        comment_count: row.get(15)?,
    })
}

fn post_from_row(row: &Row) -> Result<Post, RusqliteError> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        pub_date: timestamp_column(row, 3)?,
        author_id: row.get(4)?,
        category_id: row.get(5)?,
        location_id: row.get(6)?,
        is_published: row.get(7)?,
        created_at: timestamp_column(row, 8)?,
    })
}

pub fn insert_post(conn: &Connection, author_id: i64, draft: &PostDraft) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO posts (title, text, pub_date, author_id, category_id, location_id, is_published, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            draft.title,
            draft.text,
            to_db_timestamp(&draft.pub_date),
            author_id,
            draft.category_id,
            draft.location_id,
            draft.is_published,
            to_db_timestamp(&Utc::now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_post(conn: &Connection, post_id: i64) -> Result<Option<Post>, RusqliteError> {
    conn.query_row(
        "SELECT id, title, text, pub_date, author_id, category_id, location_id, is_published, created_at
         FROM posts WHERE id = ?1",
        [post_id],
        post_from_row,
    ).optional()
}

pub fn read_post_view(conn: &Connection, post_id: i64) -> Result<Option<PostView>, RusqliteError> {
    conn.query_row(
        &format!("{} WHERE p.id = ?1", POST_VIEW_SELECT),
        [post_id],
        post_view_from_row,
    ).optional()
}

/// Rewrites the editable fields. The author never changes.
pub fn update_post(conn: &Connection, post_id: i64, draft: &PostDraft) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE posts SET title = ?1, text = ?2, pub_date = ?3, category_id = ?4, location_id = ?5, is_published = ?6
         WHERE id = ?7",
        params![
            draft.title,
            draft.text,
            to_db_timestamp(&draft.pub_date),
            draft.category_id,
            draft.location_id,
            draft.is_published,
            post_id,
        ],
    )
}

/// Comments and tag links go with the post (ON DELETE CASCADE).
pub fn delete_post(conn: &Connection, post_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])
}

pub fn count_posts(conn: &Connection, filter: PostFilter, now: &DateTime<Utc>) -> Result<u64, RusqliteError> {
    let (condition, values) = filter.where_clause(now);
    let sql = format!(
        "SELECT COUNT(*) FROM posts p LEFT JOIN categories c ON c.id = p.category_id WHERE {}",
        condition
    );
    let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Newest first by publish date; ties broken by id so pages are stable.
pub fn read_post_views(
    conn: &Connection,
    filter: PostFilter,
    now: &DateTime<Utc>,
    limit: u32,
    offset: u32,
) -> Result<Vec<PostView>, RusqliteError> {
    let (condition, mut values) = filter.where_clause(now);
    let sql = format!(
        "{} WHERE {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
        POST_VIEW_SELECT, condition
    );
    values.push(Value::Integer(i64::from(limit)));
    values.push(Value::Integer(i64::from(offset)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), post_view_from_row)?;
    rows.collect()
}
