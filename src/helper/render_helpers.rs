use crate::models::{Notification, SessionUser};
use actix_session::Session;
use actix_web::http::{header, StatusCode};
use actix_web::HttpResponse;
use tera::{Context, Tera};

pub fn render(tera: &Tera, template: &str, ctx: &Context) -> HttpResponse {
    render_with_status(tera, template, ctx, StatusCode::OK)
}

pub fn render_with_status(tera: &Tera, template: &str, ctx: &Context, status: StatusCode) -> HttpResponse {
    match tera.render(template, ctx) {
        Ok(rendered) => HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(rendered),
        Err(err) => {
            log::error!("Template rendering error for '{}': {:?}", template, err);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

/// 302 to `location`.
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, location))
        .finish()
}

/// Context every page starts from: the signed-in user (if any) and a
/// pending one-shot notification.
pub fn base_context(user: Option<&SessionUser>, session: Option<&Session>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &user);
    if let Some(session) = session {
        if let Ok(Some(notification)) = session.get::<Notification>("notification") {
            ctx.insert("notification", &notification);
            session.remove("notification");
        }
    }
    ctx
}

pub fn set_notification(session: &Session, message: &str, r#type: &str) {
    let notification = Notification { message: message.to_string(), r#type: r#type.to_string() };
    if let Err(e) = session.insert("notification", &notification) {
        log::warn!("Could not store notification in session: {}", e);
    }
}

pub fn not_found_page(tera: &Tera, user: Option<&SessionUser>) -> HttpResponse {
    let ctx = base_context(user, None);
    render_with_status(tera, "pages/404.html", &ctx, StatusCode::NOT_FOUND)
}

pub fn server_error() -> HttpResponse {
    HttpResponse::InternalServerError().body("Internal server error")
}
