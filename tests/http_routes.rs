mod common;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use blog_backend::{middleware::csrf_middleware, routes, AppState, DbPool};
use common::*;
use tera::Tera;

const CSRF_COOKIE: &str = "__Host-Csrf-Token";

fn templates() -> Tera {
    Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*.html")).expect("templates")
}

macro_rules! blog_app {
    ($pool:expr) => {
        test::init_service(
            App::new()
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(templates()))
                .app_data(web::Data::new(AppState::default()))
                .service(
                    web::scope("")
                        .wrap(csrf_middleware())
                        .configure(routes::auth::config_auth)
                        .configure(routes::blog::config_blog),
                )
                .default_service(web::to(routes::auth::not_found)),
        )
        .await
    };
}

/// Fetches a CSRF cookie from the login page and signs `$username` in with it.
/// Yields the form token and every cookie the next requests need.
macro_rules! sign_in {
    ($app:expr, $username:expr) => {{
        let resp = test::call_service(&$app, test::TestRequest::get().uri("/auth/login/").to_request()).await;
        let csrf = resp
            .response()
            .cookies()
            .find(|c| c.name() == CSRF_COOKIE)
            .map(|c| c.into_owned())
            .expect("csrf cookie on the login page");
        let token = csrf.value().to_string();

        let form: &[(&str, &str)] = &[
            ("csrf_token", token.as_str()),
            ("username", $username),
            ("password", PASSWORD),
            ("next", "/"),
        ];
        let req = test::TestRequest::post()
            .uri("/auth/login/")
            .cookie(csrf.clone())
            .set_form(form)
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp).as_deref(), Some("/"));

        let mut cookies: Vec<Cookie<'static>> = resp.response().cookies().map(|c| c.into_owned()).collect();
        cookies.push(csrf);
        (token, cookies)
    }};
}

fn with_cookies(mut req: test::TestRequest, cookies: &[Cookie<'static>]) -> test::TestRequest {
    for cookie in cookies {
        req = req.cookie(cookie.clone());
    }
    req
}

fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> Option<String> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn seeded() -> (DbPool, i64, i64) {
    let pool = memory_pool();
    let ann = add_user(&pool, "ann");
    add_category(&pool, "hidden", false);
    let public_id = add_post(&pool, &ann, &draft("Hello world", an_hour_ago(), true));
    let hidden_id = add_post(&pool, &ann, &draft("Secret draft", an_hour_ago(), false));
    (pool, public_id, hidden_id)
}

async fn body_of(resp: actix_web::dev::ServiceResponse) -> String {
    String::from_utf8(test::read_body(resp).await.to_vec()).expect("utf-8 body")
}

#[actix_web::test]
async fn index_shows_public_posts_only() {
    let (pool, _, _) = seeded();
    let app = blog_app!(pool);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_of(resp).await;
    assert!(body.contains("Hello world"));
    assert!(!body.contains("Secret draft"));
}

#[actix_web::test]
async fn bad_page_numbers_still_render() {
    let (pool, _, _) = seeded();
    let app = blog_app!(pool);

    for uri in ["/?page=abc", "/?page=0", "/?page=999"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
        assert!(body_of(resp).await.contains("Hello world"), "{}", uri);
    }
}

#[actix_web::test]
async fn post_detail_hides_unpublished_posts_from_visitors() {
    let (pool, public_id, hidden_id) = seeded();
    let app = blog_app!(pool);

    let req = test::TestRequest::get().uri(&format!("/posts/{}/", public_id)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_of(resp).await.contains("Hello world"));

    let req = test::TestRequest::get().uri(&format!("/posts/{}/", hidden_id)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/posts/9999/").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_profiles_categories_and_paths_are_404() {
    let (pool, _, _) = seeded();
    let app = blog_app!(pool);

    for uri in ["/profile/nobody/", "/category/hidden/", "/category/missing/", "/no/such/page/"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }

    let resp = test::call_service(&app, test::TestRequest::get().uri("/profile/ann/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn login_only_pages_redirect_anonymous_visitors() {
    let (pool, public_id, _) = seeded();
    let app = blog_app!(pool);

    let cases = [
        ("/login_only/".to_string(), "/auth/login/?next=%2Flogin_only%2F".to_string()),
        ("/posts/create/".to_string(), "/auth/login/?next=%2Fposts%2Fcreate%2F".to_string()),
        (
            format!("/posts/{}/edit/", public_id),
            format!("/auth/login/?next=%2Fposts%2F{}%2Fedit%2F", public_id),
        ),
        ("/edit_profile/".to_string(), "/auth/login/?next=%2Fedit_profile%2F".to_string()),
    ];
    for (uri, expected) in cases {
        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "{}", uri);
        assert_eq!(
            location(&resp),
            Some(expected),
            "{}",
            uri
        );
    }
}

#[actix_web::test]
async fn auth_forms_render() {
    let (pool, _, _) = seeded();
    let app = blog_app!(pool);

    for uri in ["/auth/login/?next=/posts/create/", "/auth/registration/"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
        assert!(body_of(resp).await.contains("csrf_token"), "{}", uri);
    }
}

#[actix_web::test]
async fn blank_comment_rerenders_the_form_and_stores_nothing() {
    let (pool, public_id, _) = seeded();
    add_user(&pool, "bob");
    let app = blog_app!(pool);
    let (token, cookies) = sign_in!(app, "bob");
    let uri = format!("/{}/comment/", public_id);

    let form: &[(&str, &str)] = &[("csrf_token", token.as_str()), ("text", "   ")];
    let req = with_cookies(test::TestRequest::post().uri(&uri), &cookies).set_form(form).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_of(resp).await.contains("This field is required."));
    assert_eq!(comment_count(&pool, public_id), 0);

    let form: &[(&str, &str)] = &[("csrf_token", token.as_str()), ("text", "Nice post")];
    let req = with_cookies(test::TestRequest::post().uri(&uri), &cookies).set_form(form).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), Some(format!("/posts/{}/", public_id)));
    assert_eq!(comment_count(&pool, public_id), 1);
}

#[actix_web::test]
async fn non_author_edit_is_sent_back_to_the_post() {
    let (pool, public_id, _) = seeded();
    add_user(&pool, "bob");
    let app = blog_app!(pool);
    let (token, cookies) = sign_in!(app, "bob");

    let form: &[(&str, &str)] = &[
        ("csrf_token", token.as_str()),
        ("title", "Hijacked"),
        ("text", "Not yours"),
        ("pub_date", "2024-01-01T10:00"),
        ("is_published", "on"),
    ];
    let req = with_cookies(test::TestRequest::post().uri(&format!("/posts/{}/edit/", public_id)), &cookies)
        .set_form(form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), Some(format!("/posts/{}/", public_id)));
    assert_eq!(post_title(&pool, public_id), "Hello world");

    let form: &[(&str, &str)] = &[("csrf_token", token.as_str())];
    let req = with_cookies(test::TestRequest::post().uri(&format!("/posts/{}/delete/", public_id)), &cookies)
        .set_form(form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), Some(format!("/posts/{}/", public_id)));
    assert_eq!(post_title(&pool, public_id), "Hello world");
}

#[actix_web::test]
async fn non_author_cannot_delete_a_comment() {
    let (pool, public_id, _) = seeded();
    let carol = add_user(&pool, "carol");
    add_user(&pool, "bob");
    let comment_id = add_comment(&pool, &carol, public_id, "Mine");
    let app = blog_app!(pool);
    let (token, cookies) = sign_in!(app, "bob");

    let form: &[(&str, &str)] = &[("csrf_token", token.as_str())];
    let uri = format!("/posts/{}/{}/delete_comment/", public_id, comment_id);
    let req = with_cookies(test::TestRequest::post().uri(&uri), &cookies).set_form(form).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), Some(format!("/posts/{}/", public_id)));
    assert_eq!(comment_count(&pool, public_id), 1);
}

#[actix_web::test]
async fn forged_csrf_token_is_rejected() {
    let (pool, public_id, _) = seeded();
    add_user(&pool, "bob");
    let app = blog_app!(pool);
    let (_, cookies) = sign_in!(app, "bob");

    let form: &[(&str, &str)] = &[("csrf_token", "forged"), ("text", "spam")];
    let req = with_cookies(test::TestRequest::post().uri(&format!("/{}/comment/", public_id)), &cookies)
        .set_form(form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
    assert_eq!(comment_count(&pool, public_id), 0);
}
