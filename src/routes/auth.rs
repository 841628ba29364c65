use crate::helper::account_helpers::{self, AccountHelperError};
use crate::helper::form_helpers::{self, FormErrors, RegistrationFormInput};
use crate::helper::render_helpers::{base_context, not_found_page, redirect, render, server_error, set_notification};
use crate::middleware::{self, safe_next, MaybeUser, LOGIN_URL};
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfGuarded, CsrfToken};
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tera::Tera;

#[derive(Deserialize)]
struct LoginForm {
    csrf_token: CsrfToken,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    next: Option<String>,
}

impl CsrfGuarded for LoginForm {
    fn csrf_token(&self) -> &CsrfToken { &self.csrf_token }
}

#[derive(Deserialize)]
struct RegistrationForm {
    csrf_token: CsrfToken,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password1: String,
    #[serde(default)]
    password2: String,
}

impl CsrfGuarded for RegistrationForm {
    fn csrf_token(&self) -> &CsrfToken { &self.csrf_token }
}

#[derive(Deserialize)]
struct NextQuery {
    next: Option<String>,
}

// --- Route Configuration ---
pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login/", web::get().to(show_login_form))
            .route("/login/", web::post().to(handle_login))
            .route("/logout/", web::post().to(handle_logout))
            .route("/registration/", web::get().to(show_registration_form))
            .route("/registration/", web::post().to(handle_registration)),
    );
}

/// Default service: anything unrouted gets the 404 page.
pub async fn not_found(user: MaybeUser, tera: web::Data<Tera>) -> impl Responder {
    not_found_page(&tera, user.user())
}

async fn show_login_form(
    user: MaybeUser,
    session: Session,
    tera: web::Data<Tera>,
    token: CsrfToken,
    query: web::Query<NextQuery>,
) -> impl Responder {
    let next = safe_next(query.next.as_deref());
    if user.user().is_some() {
        return redirect(next);
    }
    let mut ctx = base_context(None, Some(&session));
    ctx.insert("csrf_token", token.get());
    ctx.insert("next", next);
    if let Ok(Some(error)) = session.get::<String>("error") {
        ctx.insert("error", &error);
        session.remove("error");
    }
    render(&tera, "registration/login.html", &ctx)
}

async fn handle_login(
    session: Session,
    pool: web::Data<DbPool>,
    form: Csrf<web::Form<LoginForm>>,
) -> impl Responder {
    let login_data = form.into_inner().into_inner();
    let next = safe_next(login_data.next.as_deref()).to_string();

    match account_helpers::authenticate(&pool, &login_data.username, &login_data.password) {
        Some(user) => {
            if let Err(e) = middleware::sign_in(&session, &user) {
                log::error!("Failed to start session for '{}': {}", user.username, e);
                return server_error();
            }
            log::info!("User '{}' signed in", user.username);
            redirect(&next)
        }
        None => {
            if let Err(e) = session.insert("error", "Please enter a correct username and password.") {
                log::warn!("Could not store login error in session: {}", e);
            }
            let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
            redirect(&format!("{}?next={}", LOGIN_URL, encoded))
        }
    }
}

async fn handle_logout(session: Session) -> impl Responder {
    middleware::sign_out(&session);
    redirect("/")
}

fn registration_context(
    session: &Session,
    form: &RegistrationFormInput,
    errors: &FormErrors,
    csrf_token: &str,
) -> tera::Context {
    let mut ctx = base_context(None, Some(session));
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("csrf_token", csrf_token);
    ctx
}

async fn show_registration_form(
    user: MaybeUser,
    session: Session,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> impl Responder {
    if user.user().is_some() {
        return redirect("/");
    }
    let ctx = registration_context(&session, &RegistrationFormInput::default(), &FormErrors::default(), token.get());
    render(&tera, "registration/registration_form.html", &ctx)
}

async fn handle_registration(
    session: Session,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    form: Csrf<web::Form<RegistrationForm>>,
) -> HttpResponse {
    let submitted = form.into_inner().into_inner();
    let input = RegistrationFormInput {
        username: submitted.username.clone(),
        email: submitted.email.clone(),
        password1: submitted.password1.clone(),
        password2: submitted.password2.clone(),
    };
    let cleaned = match form_helpers::clean_registration_form(&input) {
        Ok(c) => c,
        Err(errors) => {
            let ctx = registration_context(&session, &input, &errors, submitted.csrf_token.get());
            return render(&tera, "registration/registration_form.html", &ctx);
        }
    };
    match account_helpers::register_user(&pool, &cleaned) {
        Ok(_) => {
            set_notification(&session, "Account created. You can sign in now.", "success");
            redirect(LOGIN_URL)
        }
        Err(AccountHelperError::Invalid(errors)) => {
            let ctx = registration_context(&session, &input, &errors, submitted.csrf_token.get());
            render(&tera, "registration/registration_form.html", &ctx)
        }
        Err(e) => {
            log::error!("Failed to register '{}': {}", cleaned.username, e);
            server_error()
        }
    }
}
