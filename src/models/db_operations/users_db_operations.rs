use crate::models::db_operations::{timestamp_column, to_db_timestamp};
use crate::models::{SessionUser, User};
use bcrypt::{hash, verify, BcryptError};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, date_joined";

fn user_from_row(row: &Row) -> Result<User, RusqliteError> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        date_joined: timestamp_column(row, 5)?,
    })
}

/// Inserts a new user and returns its id. The password is hashed here and
/// nowhere else.
pub fn create_user(
    conn: &Connection,
    username: &str,
    password: &str,
    email: &str,
) -> Result<i64, RusqliteError> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (username, password_hash, email, date_joined) VALUES (?1, ?2, ?3, ?4)",
        params![username, hashed_password, email, to_db_timestamp(&Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_users(conn: &Connection) -> Result<Vec<User>, RusqliteError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.collect()
}

pub fn read_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>, RusqliteError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [user_id],
        user_from_row,
    ).optional()
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, RusqliteError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        [username],
        user_from_row,
    ).optional()
}

/// True when `username` belongs to a user other than `except_user_id`.
pub fn is_username_taken(
    conn: &Connection,
    username: &str,
    except_user_id: Option<i64>,
) -> Result<bool, RusqliteError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id != ?2)",
        params![username, except_user_id.unwrap_or(-1)],
        |row| row.get(0),
    )
}

pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    username: &str,
    first_name: &str,
    last_name: &str,
    email: &str,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE users SET username = ?1, first_name = ?2, last_name = ?3, email = ?4 WHERE id = ?5",
        params![username, first_name, last_name, email, user_id],
    )
}

pub fn verify_credentials(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Option<SessionUser> {
    let res: rusqlite::Result<(i64, String, bool)> = conn.query_row(
        "SELECT id, password_hash, is_active FROM users WHERE username = ?1",
        [username],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    );

    if let Ok((id, hash, is_active)) = res {
        if is_active && verify(password, &hash).unwrap_or(false) {
            return Some(SessionUser { id, username: username.to_string() });
        }
    }
    None
}

pub fn update_last_login_time(conn: &Connection, user_id: i64) -> Result<(), RusqliteError> {
    conn.execute(
        "UPDATE users SET last_login = ?1 WHERE id = ?2",
        params![to_db_timestamp(&Utc::now()), user_id],
    )?;
    Ok(())
}
