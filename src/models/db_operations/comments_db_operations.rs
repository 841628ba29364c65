use crate::models::db_operations::{timestamp_column, to_db_timestamp};
use crate::models::{AuthorRef, Comment};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

const COMMENT_SELECT: &str = "
    SELECT cm.id, cm.text, cm.post_id, u.id, u.username, cm.created_at
    FROM comments cm
    JOIN users u ON u.id = cm.author_id";

fn comment_from_row(row: &Row) -> Result<Comment, RusqliteError> {
    Ok(Comment {
        id: row.get(0)?,
        text: row.get(1)?,
        post_id: row.get(2)?,
        author: AuthorRef { id: row.get(3)?, username: row.get(4)? },
        created_at: timestamp_column(row, 5)?,
    })
}

pub fn insert_comment(conn: &Connection, post_id: i64, author_id: i64, text: &str) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO comments (text, post_id, author_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![text, post_id, author_id, to_db_timestamp(&Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Looks a comment up under its post; a comment id paired with the wrong
/// post id is treated as missing.
pub fn read_comment(conn: &Connection, post_id: i64, comment_id: i64) -> Result<Option<Comment>, RusqliteError> {
    conn.query_row(
        &format!("{} WHERE cm.id = ?1 AND cm.post_id = ?2", COMMENT_SELECT),
        params![comment_id, post_id],
        comment_from_row,
    ).optional()
}

/// Oldest first, so a thread reads top to bottom.
pub fn read_comments_for_post(conn: &Connection, post_id: i64) -> Result<Vec<Comment>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE cm.post_id = ?1 ORDER BY cm.created_at, cm.id",
        COMMENT_SELECT
    ))?;
    let rows = stmt.query_map([post_id], comment_from_row)?;
    rows.collect()
}

pub fn update_comment_text(conn: &Connection, comment_id: i64, text: &str) -> Result<usize, RusqliteError> {
    conn.execute("UPDATE comments SET text = ?1 WHERE id = ?2", params![text, comment_id])
}

pub fn delete_comment(conn: &Connection, comment_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])
}
