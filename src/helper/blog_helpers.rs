use crate::helper::pagination_helpers::{Page, Paginator};
use crate::models::db_operations::posts_db_operations::{self, PostFilter};
use crate::models::db_operations::{comments_db_operations, taxonomy_db_operations, users_db_operations};
use crate::models::{
    Category, Comment, Location, MutationOutcome, Post, PostDraft, PostView, SessionUser, Tag, User,
};
use crate::DbPool;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlogHelperError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Not found")]
    NotFound,
}

type PooledConn = r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>;

fn get_conn(pool: &DbPool) -> Result<PooledConn, BlogHelperError> {
    pool.get().map_err(BlogHelperError::Pool)
}

// --- Visibility and authorship ---

/// The author-only predicate every edit and delete goes through.
pub fn is_author(requester: &SessionUser, owner_id: i64) -> bool {
    requester.id == owner_id
}

pub fn is_publicly_visible(post: &PostView, now: &DateTime<Utc>) -> bool {
    post.is_published
        && post.pub_date <= *now
        && post.category.as_ref().map_or(true, |c| c.is_published)
}

/// Authors always see their own posts, published or not.
pub fn visible_to(post: &PostView, viewer: Option<&SessionUser>, now: &DateTime<Utc>) -> bool {
    is_publicly_visible(post, now) || viewer.is_some_and(|v| is_author(v, post.author.id))
}

/// Posts created with a publish date that is not in the future go live
/// immediately.
pub fn apply_creation_rule(mut draft: PostDraft, now: &DateTime<Utc>) -> PostDraft {
    if draft.pub_date <= *now {
        draft.is_published = true;
    }
    draft
}

// --- Listings ---

fn page_of(
    conn: &Connection,
    filter: PostFilter,
    requested_page: u32,
    per_page: u32,
    now: &DateTime<Utc>,
) -> Result<Page<PostView>, BlogHelperError> {
    let total = posts_db_operations::count_posts(conn, filter, now)?;
    let window = Paginator::new(total, per_page).window(requested_page);
    let items = posts_db_operations::read_post_views(conn, filter, now, window.limit, window.offset)?;
    Ok(Page::new(items, window, total))
}

pub fn index_page(
    pool: &DbPool,
    requested_page: u32,
    per_page: u32,
    now: &DateTime<Utc>,
) -> Result<Page<PostView>, BlogHelperError> {
    let conn = get_conn(pool)?;
    page_of(&conn, PostFilter::Public, requested_page, per_page, now)
}

/// Unknown and unpublished categories are both `NotFound`.
pub fn category_page(
    pool: &DbPool,
    slug: &str,
    requested_page: u32,
    per_page: u32,
    now: &DateTime<Utc>,
) -> Result<(Category, Page<PostView>), BlogHelperError> {
    let conn = get_conn(pool)?;
    let category = taxonomy_db_operations::read_published_category_by_slug(&conn, slug)?
        .ok_or(BlogHelperError::NotFound)?;
    let page = page_of(&conn, PostFilter::PublicInCategory(category.id), requested_page, per_page, now)?;
    Ok((category, page))
}

/// The owner sees every post they wrote; everyone else sees public ones.
pub fn profile_page(
    pool: &DbPool,
    username: &str,
    viewer: Option<&SessionUser>,
    requested_page: u32,
    per_page: u32,
    now: &DateTime<Utc>,
) -> Result<(User, Page<PostView>), BlogHelperError> {
    let conn = get_conn(pool)?;
    let profile = users_db_operations::read_user_by_username(&conn, username)?
        .ok_or(BlogHelperError::NotFound)?;
    let include_hidden = viewer.is_some_and(|v| is_author(v, profile.id));
    let filter = PostFilter::ByAuthor { author_id: profile.id, include_hidden };
    let page = page_of(&conn, filter, requested_page, per_page, now)?;
    Ok((profile, page))
}

// --- Single post ---

pub struct PostDetail {
    pub post: PostView,
    pub comments: Vec<Comment>,
    pub tags: Vec<Tag>,
}

pub fn post_detail(
    pool: &DbPool,
    post_id: i64,
    viewer: Option<&SessionUser>,
    now: &DateTime<Utc>,
) -> Result<PostDetail, BlogHelperError> {
    let conn = get_conn(pool)?;
    let post = posts_db_operations::read_post_view(&conn, post_id)?
        .filter(|post| visible_to(post, viewer, now))
        .ok_or(BlogHelperError::NotFound)?;
    let comments = comments_db_operations::read_comments_for_post(&conn, post_id)?;
    let tags = taxonomy_db_operations::read_tags_for_post(&conn, post_id)?;
    Ok(PostDetail { post, comments, tags })
}

pub fn read_post(pool: &DbPool, post_id: i64) -> Result<Post, BlogHelperError> {
    let conn = get_conn(pool)?;
    posts_db_operations::read_post(&conn, post_id)?.ok_or(BlogHelperError::NotFound)
}

/// Options a post form offers.
pub struct PostFormChoices {
    pub categories: Vec<Category>,
    pub locations: Vec<Location>,
}

impl PostFormChoices {
    pub fn category_ids(&self) -> Vec<i64> {
        self.categories.iter().map(|c| c.id).collect()
    }

    pub fn location_ids(&self) -> Vec<i64> {
        self.locations.iter().map(|l| l.id).collect()
    }
}

pub fn post_form_choices(pool: &DbPool) -> Result<PostFormChoices, BlogHelperError> {
    let conn = get_conn(pool)?;
    Ok(PostFormChoices {
        categories: taxonomy_db_operations::read_all_categories(&conn)?,
        locations: taxonomy_db_operations::read_all_locations(&conn)?,
    })
}

// --- Post mutations ---

pub fn create_post(
    pool: &DbPool,
    author: &SessionUser,
    draft: PostDraft,
    now: &DateTime<Utc>,
) -> Result<i64, BlogHelperError> {
    let conn = get_conn(pool)?;
    let draft = apply_creation_rule(draft, now);
    let post_id = posts_db_operations::insert_post(&conn, author.id, &draft)?;
    log::info!("User '{}' created post {}", author.username, post_id);
    Ok(post_id)
}

/// Ownership is checked inside the same transaction as the write.
pub fn update_post_as(
    pool: &DbPool,
    requester: &SessionUser,
    post_id: i64,
    draft: &PostDraft,
) -> Result<MutationOutcome, BlogHelperError> {
    let mut conn = get_conn(pool)?;
    let tx = conn.transaction()?;
    let post = posts_db_operations::read_post(&tx, post_id)?.ok_or(BlogHelperError::NotFound)?;
    if !is_author(requester, post.author_id) {
        log::warn!("User '{}' tried to edit post {} they do not own", requester.username, post_id);
        return Ok(MutationOutcome::Forbidden);
    }
    posts_db_operations::update_post(&tx, post_id, draft)?;
    tx.commit()?;
    Ok(MutationOutcome::Applied)
}

pub fn delete_post_as(
    pool: &DbPool,
    requester: &SessionUser,
    post_id: i64,
) -> Result<MutationOutcome, BlogHelperError> {
    let mut conn = get_conn(pool)?;
    let tx = conn.transaction()?;
    let post = posts_db_operations::read_post(&tx, post_id)?.ok_or(BlogHelperError::NotFound)?;
    if !is_author(requester, post.author_id) {
        log::warn!("User '{}' tried to delete post {} they do not own", requester.username, post_id);
        return Ok(MutationOutcome::Forbidden);
    }
    posts_db_operations::delete_post(&tx, post_id)?;
    tx.commit()?;
    log::info!("User '{}' deleted post {}", requester.username, post_id);
    Ok(MutationOutcome::Applied)
}

// --- Comments ---

/// Comments can only be left on posts the author can see.
pub fn add_comment(
    pool: &DbPool,
    author: &SessionUser,
    post_id: i64,
    text: &str,
    now: &DateTime<Utc>,
) -> Result<i64, BlogHelperError> {
    let conn = get_conn(pool)?;
    let visible = posts_db_operations::read_post_view(&conn, post_id)?
        .is_some_and(|post| visible_to(&post, Some(author), now));
    if !visible {
        return Err(BlogHelperError::NotFound);
    }
    Ok(comments_db_operations::insert_comment(&conn, post_id, author.id, text)?)
}

pub fn read_comment(pool: &DbPool, post_id: i64, comment_id: i64) -> Result<Comment, BlogHelperError> {
    let conn = get_conn(pool)?;
    comments_db_operations::read_comment(&conn, post_id, comment_id)?.ok_or(BlogHelperError::NotFound)
}

pub fn update_comment_as(
    pool: &DbPool,
    requester: &SessionUser,
    post_id: i64,
    comment_id: i64,
    text: &str,
) -> Result<MutationOutcome, BlogHelperError> {
    let mut conn = get_conn(pool)?;
    let tx = conn.transaction()?;
    let comment = comments_db_operations::read_comment(&tx, post_id, comment_id)?
        .ok_or(BlogHelperError::NotFound)?;
    if !is_author(requester, comment.author.id) {
        log::warn!("User '{}' tried to edit comment {} they do not own", requester.username, comment_id);
        return Ok(MutationOutcome::Forbidden);
    }
    comments_db_operations::update_comment_text(&tx, comment_id, text)?;
    tx.commit()?;
    Ok(MutationOutcome::Applied)
}

pub fn delete_comment_as(
    pool: &DbPool,
    requester: &SessionUser,
    post_id: i64,
    comment_id: i64,
) -> Result<MutationOutcome, BlogHelperError> {
    let mut conn = get_conn(pool)?;
    let tx = conn.transaction()?;
    let comment = comments_db_operations::read_comment(&tx, post_id, comment_id)?
        .ok_or(BlogHelperError::NotFound)?;
    if !is_author(requester, comment.author.id) {
        log::warn!("User '{}' tried to delete comment {} they do not own", requester.username, comment_id);
        return Ok(MutationOutcome::Forbidden);
    }
    comments_db_operations::delete_comment(&tx, comment_id)?;
    tx.commit()?;
    Ok(MutationOutcome::Applied)
}
