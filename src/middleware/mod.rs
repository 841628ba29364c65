use crate::models::SessionUser;
use actix_csrf::CsrfMiddleware;
use actix_session::{Session, SessionExt, SessionInsertError};
use actix_web::{
    dev, error::InternalError, http::header, http::Method, FromRequest, HttpRequest, HttpResponse,
};
use rand::rngs::StdRng;
use std::future::{ready, Ready};

const SESSION_USER_KEY: &str = "user";
pub const LOGIN_URL: &str = "/auth/login/";

/// GET routes that render a form and therefore hand out a CSRF cookie.
const FORM_PAGES: &[&str] = &[
    "/auth/login/",
    "/auth/registration/",
    "/edit_profile/",
    "/posts/create/",
    "/posts/{post_id}/",
    "/posts/{post_id}/edit/",
    "/posts/{post_id}/delete/",
    "/posts/{post_id}/{comment_id}/edit_comment/",
    "/posts/{post_id}/{comment_id}/delete_comment/",
];

pub fn csrf_middleware() -> CsrfMiddleware<StdRng> {
    FORM_PAGES
        .iter()
        .fold(CsrfMiddleware::<StdRng>::new(), |csrf, page| csrf.set_cookie(Method::GET, *page))
}

pub fn session_user(session: &Session) -> Option<SessionUser> {
    session.get::<SessionUser>(SESSION_USER_KEY).unwrap_or(None)
}

/// Starts a fresh session for `user`.
pub fn sign_in(session: &Session, user: &SessionUser) -> Result<(), SessionInsertError> {
    session.renew();
    session.insert(SESSION_USER_KEY, user)
}

pub fn sign_out(session: &Session) {
    session.purge();
}

/// `/auth/login/?next=<path>` for the request being turned away.
pub fn login_redirect_url(req: &HttpRequest) -> String {
    let next = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", LOGIN_URL, encoded)
}

/// A relative, same-site path; anything else falls back to `/`.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}

/// The signed-in user. Extraction fails with a redirect to the login page,
/// so handlers taking it are login-only.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionUser);

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        match session_user(&req.get_session()) {
            Some(user) => ready(Ok(AuthenticatedUser(user))),
            None => {
                let response = HttpResponse::Found()
                    .append_header((header::LOCATION, login_redirect_url(req)))
                    .finish();
                ready(Err(InternalError::from_response("Login required.", response).into()))
            }
        }
    }
}

/// The signed-in user if there is one. Never fails.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<SessionUser>);

impl MaybeUser {
    pub fn user(&self) -> Option<&SessionUser> {
        self.0.as_ref()
    }
}

impl FromRequest for MaybeUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(Ok(MaybeUser(session_user(&req.get_session()))))
    }
}
