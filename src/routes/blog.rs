use crate::helper::account_helpers::{self, AccountHelperError};
use crate::helper::blog_helpers::{self, BlogHelperError, PostFormChoices};
use crate::helper::form_helpers::{
    self, CommentFormInput, FormErrors, PostFormInput, ProfileFormInput,
};
use crate::helper::pagination_helpers::parse_page_param;
use crate::helper::render_helpers::{
    base_context, not_found_page, redirect, render, server_error, set_notification,
};
use crate::middleware::{self, AuthenticatedUser, MaybeUser, LOGIN_URL};
use crate::models::{MutationOutcome, SessionUser};
use crate::{AppState, DbPool};
use actix_csrf::extractor::{Csrf, CsrfGuarded, CsrfToken};
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use tera::{Context, Tera};

// --- Structs for forms and query params ---

#[derive(Deserialize)]
struct PageQuery {
    page: Option<String>,
}

#[derive(Deserialize)]
struct PostForm {
    csrf_token: CsrfToken,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    pub_date: String,
    category: Option<String>,
    location: Option<String>,
    is_published: Option<String>,
}

impl CsrfGuarded for PostForm {
    fn csrf_token(&self) -> &CsrfToken { &self.csrf_token }
}

impl PostForm {
    fn input(&self) -> PostFormInput {
        PostFormInput {
            title: self.title.clone(),
            text: self.text.clone(),
            pub_date: self.pub_date.clone(),
            category: self.category.clone(),
            location: self.location.clone(),
            is_published: self.is_published.clone(),
        }
    }
}

#[derive(Deserialize)]
struct CommentForm {
    csrf_token: CsrfToken,
    #[serde(default)]
    text: String,
}

impl CsrfGuarded for CommentForm {
    fn csrf_token(&self) -> &CsrfToken { &self.csrf_token }
}

#[derive(Deserialize)]
struct ProfileForm {
    csrf_token: CsrfToken,
    #[serde(default)]
    username: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
}

impl CsrfGuarded for ProfileForm {
    fn csrf_token(&self) -> &CsrfToken { &self.csrf_token }
}

#[derive(Deserialize)]
struct ConfirmForm {
    csrf_token: CsrfToken,
}

impl CsrfGuarded for ConfirmForm {
    fn csrf_token(&self) -> &CsrfToken { &self.csrf_token }
}

// --- Route Configuration ---
pub fn config_blog(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/profile/{username}/", web::get().to(profile))
        .route("/edit_profile/", web::get().to(show_edit_profile))
        .route("/edit_profile/", web::post().to(edit_profile_action))
        .route("/posts/create/", web::get().to(show_create_post))
        .route("/posts/create/", web::post().to(create_post_action))
        .route("/posts/{post_id}/edit/", web::get().to(show_edit_post))
        .route("/posts/{post_id}/edit/", web::post().to(edit_post_action))
        .route("/posts/{post_id}/delete/", web::get().to(show_delete_post))
        .route("/posts/{post_id}/delete/", web::post().to(delete_post_action))
        .route("/posts/{post_id}/", web::get().to(post_detail))
        .route("/category/{category_slug}/", web::get().to(category_posts))
        .route("/{post_id}/comment/", web::post().to(add_comment_action))
        .route("/posts/{post_id}/{comment_id}/edit_comment/", web::get().to(show_edit_comment))
        .route("/posts/{post_id}/{comment_id}/edit_comment/", web::post().to(edit_comment_action))
        .route("/posts/{post_id}/{comment_id}/delete_comment/", web::get().to(show_delete_comment))
        .route("/posts/{post_id}/{comment_id}/delete_comment/", web::post().to(delete_comment_action))
        .route("/login_only/", web::get().to(login_only));
}

fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

fn profile_url(username: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(username.as_bytes()).collect();
    format!("/profile/{}/", encoded)
}

/// 404 page for `NotFound`, logged 500 for everything else.
fn helper_failure(err: BlogHelperError, tera: &Tera, user: Option<&SessionUser>, action: &str) -> HttpResponse {
    match err {
        BlogHelperError::NotFound => not_found_page(tera, user),
        other => {
            log::error!("Failed to {}: {}", action, other);
            server_error()
        }
    }
}

// --- Listings ---

async fn index(
    user: MaybeUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> impl Responder {
    let page_number = parse_page_param(query.page.as_deref());
    match blog_helpers::index_page(&pool, page_number, state.posts_per_page, &Utc::now()) {
        Ok(page) => {
            let mut ctx = base_context(user.user(), Some(&session));
            ctx.insert("page_obj", &page);
            render(&tera, "blog/index.html", &ctx)
        }
        Err(e) => helper_failure(e, &tera, user.user(), "load the post index"),
    }
}

async fn profile(
    user: MaybeUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> impl Responder {
    let page_number = parse_page_param(query.page.as_deref());
    match blog_helpers::profile_page(&pool, &username, user.user(), page_number, state.posts_per_page, &Utc::now()) {
        Ok((profile, page)) => {
            let mut ctx = base_context(user.user(), Some(&session));
            ctx.insert("profile", &profile);
            ctx.insert("page_obj", &page);
            render(&tera, "blog/profile.html", &ctx)
        }
        Err(e) => helper_failure(e, &tera, user.user(), "load a profile"),
    }
}

async fn category_posts(
    user: MaybeUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> impl Responder {
    let page_number = parse_page_param(query.page.as_deref());
    match blog_helpers::category_page(&pool, &slug, page_number, state.posts_per_page, &Utc::now()) {
        Ok((category, page)) => {
            let mut ctx = base_context(user.user(), Some(&session));
            ctx.insert("category", &category);
            ctx.insert("page_obj", &page);
            render(&tera, "blog/category.html", &ctx)
        }
        Err(e) => helper_failure(e, &tera, user.user(), "load a category"),
    }
}

// --- Post detail ---

async fn post_detail(
    user: MaybeUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    post_id: web::Path<i64>,
    token: Option<CsrfToken>,
) -> impl Responder {
    let post_id = post_id.into_inner();
    match blog_helpers::post_detail(&pool, post_id, user.user(), &Utc::now()) {
        Ok(detail) => {
            let mut ctx = base_context(user.user(), Some(&session));
            ctx.insert("post", &detail.post);
            ctx.insert("comments", &detail.comments);
            ctx.insert("tags", &detail.tags);
            ctx.insert("form", &CommentFormInput::default());
            if let Some(token) = token {
                ctx.insert("csrf_token", token.get());
            }
            render(&tera, "blog/detail.html", &ctx)
        }
        Err(e) => helper_failure(e, &tera, user.user(), "load a post"),
    }
}

// --- Post create / edit / delete ---

fn post_form_context(
    user: &SessionUser,
    session: &Session,
    choices: &PostFormChoices,
    form: &PostFormInput,
    errors: &FormErrors,
    csrf_token: &str,
) -> Context {
    let mut ctx = base_context(Some(user), Some(session));
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("categories", &choices.categories);
    ctx.insert("locations", &choices.locations);
    ctx.insert("csrf_token", csrf_token);
    ctx
}

async fn show_create_post(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> impl Responder {
    let user = auth_user.0;
    let choices = match blog_helpers::post_form_choices(&pool) {
        Ok(c) => c,
        Err(e) => return helper_failure(e, &tera, Some(&user), "load post form choices"),
    };
    let form = PostFormInput::blank(&Utc::now());
    let ctx = post_form_context(&user, &session, &choices, &form, &FormErrors::default(), token.get());
    render(&tera, "blog/create.html", &ctx)
}

async fn create_post_action(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    form: Csrf<web::Form<PostForm>>,
) -> impl Responder {
    let user = auth_user.0;
    let submitted = form.into_inner().into_inner();
    let choices = match blog_helpers::post_form_choices(&pool) {
        Ok(c) => c,
        Err(e) => return helper_failure(e, &tera, Some(&user), "load post form choices"),
    };
    let input = submitted.input();
    let draft = match form_helpers::clean_post_form(&input, &choices.category_ids(), &choices.location_ids()) {
        Ok(d) => d,
        Err(errors) => {
            let ctx = post_form_context(&user, &session, &choices, &input, &errors, submitted.csrf_token.get());
            return render(&tera, "blog/create.html", &ctx);
        }
    };
    match blog_helpers::create_post(&pool, &user, draft, &Utc::now()) {
        Ok(_) => {
            set_notification(&session, "Post published.", "success");
            redirect(&profile_url(&user.username))
        }
        Err(e) => helper_failure(e, &tera, Some(&user), "create a post"),
    }
}

async fn show_edit_post(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    post_id: web::Path<i64>,
    token: CsrfToken,
) -> impl Responder {
    let user = auth_user.0;
    let post_id = post_id.into_inner();
    let post = match blog_helpers::read_post(&pool, post_id) {
        Ok(p) => p,
        Err(e) => return helper_failure(e, &tera, Some(&user), "load a post for editing"),
    };
    if !blog_helpers::is_author(&user, post.author_id) {
        return redirect(&post_url(post_id));
    }
    let choices = match blog_helpers::post_form_choices(&pool) {
        Ok(c) => c,
        Err(e) => return helper_failure(e, &tera, Some(&user), "load post form choices"),
    };
    let form = PostFormInput::from_post(&post);
    let mut ctx = post_form_context(&user, &session, &choices, &form, &FormErrors::default(), token.get());
    ctx.insert("post_id", &post_id);
    render(&tera, "blog/create.html", &ctx)
}

async fn edit_post_action(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    post_id: web::Path<i64>,
    form: Csrf<web::Form<PostForm>>,
) -> impl Responder {
    let user = auth_user.0;
    let post_id = post_id.into_inner();
    let submitted = form.into_inner().into_inner();

    // Ownership first: a non-author never reaches validation.
    let post = match blog_helpers::read_post(&pool, post_id) {
        Ok(p) => p,
        Err(e) => return helper_failure(e, &tera, Some(&user), "load a post for editing"),
    };
    if !blog_helpers::is_author(&user, post.author_id) {
        return redirect(&post_url(post_id));
    }

    let choices = match blog_helpers::post_form_choices(&pool) {
        Ok(c) => c,
        Err(e) => return helper_failure(e, &tera, Some(&user), "load post form choices"),
    };
    let input = submitted.input();
    let draft = match form_helpers::clean_post_form(&input, &choices.category_ids(), &choices.location_ids()) {
        Ok(d) => d,
        Err(errors) => {
            let mut ctx = post_form_context(&user, &session, &choices, &input, &errors, submitted.csrf_token.get());
            ctx.insert("post_id", &post_id);
            return render(&tera, "blog/create.html", &ctx);
        }
    };
    match blog_helpers::update_post_as(&pool, &user, post_id, &draft) {
        Ok(MutationOutcome::Applied) => {
            set_notification(&session, "Post updated.", "success");
            redirect(&post_url(post_id))
        }
        Ok(MutationOutcome::Forbidden) => redirect(&post_url(post_id)),
        Err(e) => helper_failure(e, &tera, Some(&user), "update a post"),
    }
}

async fn show_delete_post(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    post_id: web::Path<i64>,
    token: CsrfToken,
) -> impl Responder {
    let user = auth_user.0;
    let post_id = post_id.into_inner();
    let post = match blog_helpers::read_post(&pool, post_id) {
        Ok(p) => p,
        Err(e) => return helper_failure(e, &tera, Some(&user), "load a post for deletion"),
    };
    if !blog_helpers::is_author(&user, post.author_id) {
        return redirect(&post_url(post_id));
    }
    let mut ctx = base_context(Some(&user), Some(&session));
    ctx.insert("post", &post);
    ctx.insert("csrf_token", token.get());
    render(&tera, "blog/delete_post.html", &ctx)
}

async fn delete_post_action(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    post_id: web::Path<i64>,
    _form: Csrf<web::Form<ConfirmForm>>,
) -> impl Responder {
    let user = auth_user.0;
    let post_id = post_id.into_inner();
    match blog_helpers::delete_post_as(&pool, &user, post_id) {
        Ok(MutationOutcome::Applied) => {
            set_notification(&session, "Post deleted.", "success");
            redirect("/")
        }
        Ok(MutationOutcome::Forbidden) => redirect(&post_url(post_id)),
        Err(e) => helper_failure(e, &tera, Some(&user), "delete a post"),
    }
}

// --- Comments ---

async fn add_comment_action(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    post_id: web::Path<i64>,
    form: Csrf<web::Form<CommentForm>>,
) -> impl Responder {
    let user = auth_user.0;
    let post_id = post_id.into_inner();
    let submitted = form.into_inner().into_inner();
    let input = CommentFormInput { text: submitted.text.clone() };

    let text = match form_helpers::clean_comment_form(&input) {
        Ok(t) => t,
        Err(errors) => {
            let detail = match blog_helpers::post_detail(&pool, post_id, Some(&user), &Utc::now()) {
                Ok(d) => d,
                Err(e) => return helper_failure(e, &tera, Some(&user), "load a post"),
            };
            let mut ctx = base_context(Some(&user), Some(&session));
            ctx.insert("post", &detail.post);
            ctx.insert("form", &input);
            ctx.insert("errors", &errors);
            ctx.insert("csrf_token", submitted.csrf_token.get());
            return render(&tera, "blog/comment.html", &ctx);
        }
    };
    match blog_helpers::add_comment(&pool, &user, post_id, &text, &Utc::now()) {
        Ok(_) => redirect(&post_url(post_id)),
        Err(e) => helper_failure(e, &tera, Some(&user), "add a comment"),
    }
}

async fn show_edit_comment(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    path: web::Path<(i64, i64)>,
    token: CsrfToken,
) -> impl Responder {
    let user = auth_user.0;
    let (post_id, comment_id) = path.into_inner();
    let comment = match blog_helpers::read_comment(&pool, post_id, comment_id) {
        Ok(c) => c,
        Err(e) => return helper_failure(e, &tera, Some(&user), "load a comment"),
    };
    if !blog_helpers::is_author(&user, comment.author.id) {
        return redirect(&post_url(post_id));
    }
    let mut ctx = base_context(Some(&user), Some(&session));
    ctx.insert("comment", &comment);
    ctx.insert("form", &CommentFormInput { text: comment.text.clone() });
    ctx.insert("errors", &FormErrors::default());
    ctx.insert("csrf_token", token.get());
    render(&tera, "blog/comment.html", &ctx)
}

async fn edit_comment_action(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    path: web::Path<(i64, i64)>,
    form: Csrf<web::Form<CommentForm>>,
) -> impl Responder {
    let user = auth_user.0;
    let (post_id, comment_id) = path.into_inner();
    let submitted = form.into_inner().into_inner();
    let input = CommentFormInput { text: submitted.text.clone() };

    let text = match form_helpers::clean_comment_form(&input) {
        Ok(t) => t,
        Err(errors) => {
            let comment = match blog_helpers::read_comment(&pool, post_id, comment_id) {
                Ok(c) => c,
                Err(e) => return helper_failure(e, &tera, Some(&user), "load a comment"),
            };
            if !blog_helpers::is_author(&user, comment.author.id) {
                return redirect(&post_url(post_id));
            }
            let mut ctx = base_context(Some(&user), Some(&session));
            ctx.insert("comment", &comment);
            ctx.insert("form", &input);
            ctx.insert("errors", &errors);
            ctx.insert("csrf_token", submitted.csrf_token.get());
            return render(&tera, "blog/comment.html", &ctx);
        }
    };
    match blog_helpers::update_comment_as(&pool, &user, post_id, comment_id, &text) {
        Ok(_) => redirect(&post_url(post_id)),
        Err(e) => helper_failure(e, &tera, Some(&user), "edit a comment"),
    }
}

async fn show_delete_comment(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    path: web::Path<(i64, i64)>,
    token: CsrfToken,
) -> impl Responder {
    let user = auth_user.0;
    let (post_id, comment_id) = path.into_inner();
    let comment = match blog_helpers::read_comment(&pool, post_id, comment_id) {
        Ok(c) => c,
        Err(e) => return helper_failure(e, &tera, Some(&user), "load a comment"),
    };
    if !blog_helpers::is_author(&user, comment.author.id) {
        return redirect(&post_url(post_id));
    }
    // No "form" in the context: the template renders a delete confirmation.
    let mut ctx = base_context(Some(&user), Some(&session));
    ctx.insert("comment", &comment);
    ctx.insert("csrf_token", token.get());
    render(&tera, "blog/comment.html", &ctx)
}

async fn delete_comment_action(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    path: web::Path<(i64, i64)>,
    _form: Csrf<web::Form<ConfirmForm>>,
) -> impl Responder {
    let user = auth_user.0;
    let (post_id, comment_id) = path.into_inner();
    match blog_helpers::delete_comment_as(&pool, &user, post_id, comment_id) {
        Ok(MutationOutcome::Applied) => {
            set_notification(&session, "Comment deleted.", "success");
            redirect(&post_url(post_id))
        }
        Ok(MutationOutcome::Forbidden) => redirect(&post_url(post_id)),
        Err(e) => helper_failure(e, &tera, Some(&user), "delete a comment"),
    }
}

// --- Profile ---

fn profile_form_context(
    user: &SessionUser,
    session: &Session,
    form: &ProfileFormInput,
    errors: &FormErrors,
    csrf_token: &str,
) -> Context {
    let mut ctx = base_context(Some(user), Some(session));
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("csrf_token", csrf_token);
    ctx
}

async fn show_edit_profile(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> impl Responder {
    let user = auth_user.0;
    let details = match account_helpers::get_user(&pool, user.id) {
        Ok(u) => u,
        Err(AccountHelperError::NotFound) => {
            // The session outlived the account.
            middleware::sign_out(&session);
            return redirect(LOGIN_URL);
        }
        Err(e) => {
            log::error!("Failed to load profile of '{}': {}", user.username, e);
            return server_error();
        }
    };
    let form = ProfileFormInput::from_user(&details);
    let ctx = profile_form_context(&user, &session, &form, &FormErrors::default(), token.get());
    render(&tera, "blog/user.html", &ctx)
}

async fn edit_profile_action(
    auth_user: AuthenticatedUser,
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    form: Csrf<web::Form<ProfileForm>>,
) -> impl Responder {
    let user = auth_user.0;
    let submitted = form.into_inner().into_inner();
    let input = ProfileFormInput {
        username: submitted.username.clone(),
        first_name: submitted.first_name.clone(),
        last_name: submitted.last_name.clone(),
        email: submitted.email.clone(),
    };
    let cleaned = match form_helpers::clean_profile_form(&input) {
        Ok(c) => c,
        Err(errors) => {
            let ctx = profile_form_context(&user, &session, &input, &errors, submitted.csrf_token.get());
            return render(&tera, "blog/user.html", &ctx);
        }
    };
    match account_helpers::update_profile(&pool, user.id, &cleaned) {
        Ok(updated) => {
            if let Err(e) = middleware::sign_in(&session, &updated) {
                log::warn!("Could not refresh session for '{}': {}", updated.username, e);
            }
            set_notification(&session, "Profile saved.", "success");
            redirect(&profile_url(&updated.username))
        }
        Err(AccountHelperError::Invalid(errors)) => {
            let ctx = profile_form_context(&user, &session, &input, &errors, submitted.csrf_token.get());
            render(&tera, "blog/user.html", &ctx)
        }
        Err(AccountHelperError::NotFound) => {
            middleware::sign_out(&session);
            redirect(LOGIN_URL)
        }
        Err(e) => {
            log::error!("Failed to update profile of '{}': {}", user.username, e);
            server_error()
        }
    }
}

async fn login_only(_auth_user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("This page is for signed-in users only!")
}
