//! Categories, locations and tags: the reference data posts point at.

use crate::models::db_operations::{timestamp_column, to_db_timestamp};
use crate::models::{Category, Location, Tag};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";
const LOCATION_COLUMNS: &str = "id, name, is_published, created_at";

fn category_from_row(row: &Row) -> Result<Category, RusqliteError> {
    Ok(Category {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        slug: row.get(3)?,
        is_published: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

fn location_from_row(row: &Row) -> Result<Location, RusqliteError> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        is_published: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
    })
}

// --- Categories ---

pub fn create_category(
    conn: &Connection,
    title: &str,
    description: &str,
    slug: &str,
    is_published: bool,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO categories (title, description, slug, is_published, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, description, slug, is_published, to_db_timestamp(&Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_categories(conn: &Connection) -> Result<Vec<Category>, RusqliteError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM categories ORDER BY title", CATEGORY_COLUMNS))?;
    let rows = stmt.query_map([], category_from_row)?;
    rows.collect()
}

pub fn read_published_categories(conn: &Connection) -> Result<Vec<Category>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM categories WHERE is_published = 1 ORDER BY title", CATEGORY_COLUMNS
    ))?;
    let rows = stmt.query_map([], category_from_row)?;
    rows.collect()
}

pub fn read_published_category_by_slug(conn: &Connection, slug: &str) -> Result<Option<Category>, RusqliteError> {
    conn.query_row(
        &format!("SELECT {} FROM categories WHERE slug = ?1 AND is_published = 1", CATEGORY_COLUMNS),
        [slug],
        category_from_row,
    ).optional()
}

/// Returns the number of rows changed; 0 means no such slug.
pub fn set_category_published(conn: &Connection, slug: &str, is_published: bool) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE categories SET is_published = ?1 WHERE slug = ?2",
        params![is_published, slug],
    )
}

// --- Locations ---

pub fn create_location(conn: &Connection, name: &str, is_published: bool) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO locations (name, is_published, created_at) VALUES (?1, ?2, ?3)",
        params![name, is_published, to_db_timestamp(&Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_locations(conn: &Connection) -> Result<Vec<Location>, RusqliteError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM locations ORDER BY name", LOCATION_COLUMNS))?;
    let rows = stmt.query_map([], location_from_row)?;
    rows.collect()
}

pub fn read_published_locations(conn: &Connection) -> Result<Vec<Location>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM locations WHERE is_published = 1 ORDER BY name", LOCATION_COLUMNS
    ))?;
    let rows = stmt.query_map([], location_from_row)?;
    rows.collect()
}

pub fn set_location_published(conn: &Connection, location_id: i64, is_published: bool) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE locations SET is_published = ?1 WHERE id = ?2",
        params![is_published, location_id],
    )
}

// --- Tags ---

pub fn create_tag(conn: &Connection, tag: &str) -> Result<i64, RusqliteError> {
    conn.execute("INSERT INTO tags (tag) VALUES (?1)", [tag])?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_tags(conn: &Connection) -> Result<Vec<Tag>, RusqliteError> {
    let mut stmt = conn.prepare("SELECT id, tag FROM tags ORDER BY tag")?;
    let rows = stmt.query_map([], |row| Ok(Tag { id: row.get(0)?, tag: row.get(1)? }))?;
    rows.collect()
}

/// Links a post to a tag by label. Attaching twice is a no-op.
pub fn attach_tag_to_post(conn: &Connection, post_id: i64, tag: &str) -> Result<usize, RusqliteError> {
    conn.execute(
        "INSERT OR IGNORE INTO post_tags (post_id, tag_id) SELECT ?1, id FROM tags WHERE tag = ?2",
        params![post_id, tag],
    )
}

pub fn read_tags_for_post(conn: &Connection, post_id: i64) -> Result<Vec<Tag>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.tag FROM tags t JOIN post_tags pt ON pt.tag_id = t.id WHERE pt.post_id = ?1 ORDER BY t.tag",
    )?;
    let rows = stmt.query_map([post_id], |row| Ok(Tag { id: row.get(0)?, tag: row.get(1)? }))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup::setup_blog_db;

    fn blog_db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_blog_db(&mut conn).unwrap();
        conn
    }

    #[test]
    fn published_listings_skip_hidden_rows() {
        let conn = blog_db();
        create_category(&conn, "Travel", "", "travel", true).unwrap();
        create_category(&conn, "Drafts", "", "drafts", false).unwrap();
        create_location(&conn, "Oslo", true).unwrap();
        let hidden = create_location(&conn, "Nowhere", false).unwrap();

        let slugs: Vec<_> = read_published_categories(&conn).unwrap().into_iter().map(|c| c.slug).collect();
        assert_eq!(slugs, vec!["travel"]);
        assert_eq!(read_all_categories(&conn).unwrap().len(), 2);

        let names: Vec<_> = read_published_locations(&conn).unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Oslo"]);

        set_location_published(&conn, hidden, true).unwrap();
        assert_eq!(read_published_locations(&conn).unwrap().len(), 2);
    }

    #[test]
    fn unpublishing_a_category_hides_it_by_slug() {
        let conn = blog_db();
        create_category(&conn, "Travel", "", "travel", true).unwrap();
        assert!(read_published_category_by_slug(&conn, "travel").unwrap().is_some());

        assert_eq!(set_category_published(&conn, "travel", false).unwrap(), 1);
        assert!(read_published_category_by_slug(&conn, "travel").unwrap().is_none());
        assert_eq!(set_category_published(&conn, "missing", false).unwrap(), 0);
    }
}
