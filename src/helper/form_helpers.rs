use crate::models::{Post, PostDraft, User};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TITLE_MAX_LEN: usize = 256;
pub const NAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PASSWORD_MIN_LEN: usize = 8;

const REQUIRED: &str = "This field is required.";

/// Accepted layouts for the publish date; the first is what a
/// `datetime-local` input submits.
const PUB_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Field name to messages, in a stable order for templates.
#[derive(Debug, Default, Serialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[cfg(test)]
    fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn check_length(errors: &mut FormErrors, field: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        errors.add(field, format!(
            "Ensure this value has at most {} characters (it has {}).", max, len
        ));
    }
}

// --- Post form ---

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct PostFormInput {
    pub title: String,
    pub text: String,
    pub pub_date: String,
    pub category: Option<String>,
    pub location: Option<String>,
    /// Checkbox: present ("on") when ticked.
    pub is_published: Option<String>,
}

impl PostFormInput {
    /// A blank form pre-filled with the current time and the publish box ticked.
    pub fn blank(now: &DateTime<Utc>) -> Self {
        PostFormInput {
            pub_date: format_pub_date(now),
            is_published: Some("on".to_string()),
            ..Default::default()
        }
    }

    pub fn from_post(post: &Post) -> Self {
        PostFormInput {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: format_pub_date(&post.pub_date),
            category: post.category_id.map(|id| id.to_string()),
            location: post.location_id.map(|id| id.to_string()),
            is_published: post.is_published.then(|| "on".to_string()),
        }
    }
}

pub fn format_pub_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M").to_string()
}

pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    PUB_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn clean_choice(
    errors: &mut FormErrors,
    field: &str,
    raw: Option<&str>,
    allowed_ids: &[i64],
) -> Option<i64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse::<i64>() {
        Ok(id) if allowed_ids.contains(&id) => Some(id),
        _ => {
            errors.add(field, "Select a valid choice. That choice is not one of the available choices.");
            None
        }
    }
}

/// Validates a submitted post. `category_ids` and `location_ids` are the
/// choices the form offered.
pub fn clean_post_form(
    input: &PostFormInput,
    category_ids: &[i64],
    location_ids: &[i64],
) -> Result<PostDraft, FormErrors> {
    let mut errors = FormErrors::default();

    let title = input.title.trim();
    if title.is_empty() {
        errors.add("title", REQUIRED);
    }
    check_length(&mut errors, "title", title, TITLE_MAX_LEN);

    let text = input.text.trim();
    if text.is_empty() {
        errors.add("text", REQUIRED);
    }

    let pub_date = if input.pub_date.trim().is_empty() {
        errors.add("pub_date", REQUIRED);
        None
    } else {
        let parsed = parse_pub_date(&input.pub_date);
        if parsed.is_none() {
            errors.add("pub_date", "Enter a valid date/time.");
        }
        parsed
    };

    let category_id = clean_choice(&mut errors, "category", input.category.as_deref(), category_ids);
    let location_id = clean_choice(&mut errors, "location", input.location.as_deref(), location_ids);

    match pub_date {
        Some(pub_date) if errors.is_empty() => Ok(PostDraft {
            title: title.to_string(),
            text: text.to_string(),
            pub_date,
            category_id,
            location_id,
            is_published: input.is_published.is_some(),
        }),
        _ => Err(errors),
    }
}

// --- Comment form ---

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct CommentFormInput {
    pub text: String,
}

pub fn clean_comment_form(input: &CommentFormInput) -> Result<String, FormErrors> {
    let text = input.text.trim();
    if text.is_empty() {
        let mut errors = FormErrors::default();
        errors.add("text", REQUIRED);
        return Err(errors);
    }
    Ok(text.to_string())
}

// --- Profile form ---

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ProfileFormInput {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl ProfileFormInput {
    pub fn from_user(user: &User) -> Self {
        ProfileFormInput {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanProfile {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

fn check_username(errors: &mut FormErrors, username: &str) {
    if username.is_empty() {
        errors.add("username", REQUIRED);
        return;
    }
    check_length(errors, "username", username, NAME_MAX_LEN);
    if !username.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
}

/// Loose shape check: one `@`, something before it, a dot in the domain.
fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn check_email(errors: &mut FormErrors, email: &str) {
    if email.is_empty() {
        return;
    }
    check_length(errors, "email", email, EMAIL_MAX_LEN);
    if !looks_like_email(email) {
        errors.add("email", "Enter a valid email address.");
    }
}

/// Shape checks only; uniqueness needs the database and is checked by
/// `account_helpers`.
pub fn clean_profile_form(input: &ProfileFormInput) -> Result<CleanProfile, FormErrors> {
    let mut errors = FormErrors::default();
    let username = input.username.trim();
    let first_name = input.first_name.trim();
    let last_name = input.last_name.trim();
    let email = input.email.trim();

    check_username(&mut errors, username);
    check_length(&mut errors, "first_name", first_name, NAME_MAX_LEN);
    check_length(&mut errors, "last_name", last_name, NAME_MAX_LEN);
    check_email(&mut errors, email);

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(CleanProfile {
        username: username.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
    })
}

// --- Registration form ---

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct RegistrationFormInput {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(skip_serializing)]
    pub password2: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn clean_registration_form(input: &RegistrationFormInput) -> Result<CleanRegistration, FormErrors> {
    let mut errors = FormErrors::default();
    let username = input.username.trim();
    let email = input.email.trim();

    check_username(&mut errors, username);
    check_email(&mut errors, email);

    if input.password1.is_empty() {
        errors.add("password1", REQUIRED);
    } else {
        if input.password1.chars().count() < PASSWORD_MIN_LEN {
            errors.add("password1", format!(
                "This password is too short. It must contain at least {} characters.", PASSWORD_MIN_LEN
            ));
        }
        if input.password1.chars().all(|c| c.is_ascii_digit()) {
            errors.add("password1", "This password is entirely numeric.");
        }
    }
    if input.password2.is_empty() {
        errors.add("password2", REQUIRED);
    } else if input.password1 != input.password2 {
        errors.add("password2", "The two password fields didn't match.");
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(CleanRegistration {
        username: username.to_string(),
        email: email.to_string(),
        password: input.password1.clone(),
    })
}
