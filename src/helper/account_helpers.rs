use crate::helper::form_helpers::{CleanProfile, CleanRegistration, FormErrors};
use crate::models::db_operations::users_db_operations;
use crate::models::{SessionUser, User};
use crate::DbPool;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountHelperError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("User not found")]
    NotFound,
    /// Field errors that only the database can detect (e.g. a taken username).
    #[error("Invalid form")]
    Invalid(FormErrors),
}

const USERNAME_TAKEN: &str = "A user with that username already exists.";

pub fn register_user(pool: &DbPool, form: &CleanRegistration) -> Result<i64, AccountHelperError> {
    let conn = pool.get()?;
    if users_db_operations::is_username_taken(&conn, &form.username, None)? {
        let mut errors = FormErrors::default();
        errors.add("username", USERNAME_TAKEN);
        return Err(AccountHelperError::Invalid(errors));
    }
    let user_id = users_db_operations::create_user(&conn, &form.username, &form.password, &form.email)?;
    log::info!("Registered user '{}' with id {}", form.username, user_id);
    Ok(user_id)
}

/// Checks credentials and records the login time on success.
pub fn authenticate(pool: &DbPool, username: &str, password: &str) -> Option<SessionUser> {
    let conn = pool.get().ok()?;
    let user = users_db_operations::verify_credentials(&conn, username.trim(), password)?;
    if let Err(e) = users_db_operations::update_last_login_time(&conn, user.id) {
        log::warn!("Could not record login time for '{}': {}", user.username, e);
    }
    Some(user)
}

pub fn get_user(pool: &DbPool, user_id: i64) -> Result<User, AccountHelperError> {
    let conn = pool.get()?;
    users_db_operations::read_user_by_id(&conn, user_id)?.ok_or(AccountHelperError::NotFound)
}

/// Saves the profile of `user_id` and returns the identity to keep in the
/// session (the username may have changed).
pub fn update_profile(
    pool: &DbPool,
    user_id: i64,
    form: &CleanProfile,
) -> Result<SessionUser, AccountHelperError> {
    let conn = pool.get()?;
    if users_db_operations::is_username_taken(&conn, &form.username, Some(user_id))? {
        let mut errors = FormErrors::default();
        errors.add("username", USERNAME_TAKEN);
        return Err(AccountHelperError::Invalid(errors));
    }
    let changed = users_db_operations::update_profile(
        &conn, user_id, &form.username, &form.first_name, &form.last_name, &form.email,
    )?;
    if changed == 0 {
        return Err(AccountHelperError::NotFound);
    }
    Ok(SessionUser { id: user_id, username: form.username.clone() })
}
