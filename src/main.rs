use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, http::header, middleware::{DefaultHeaders, Logger}, web, App, HttpServer};
use blog_backend::{config::Config, middleware::csrf_middleware, routes, with_foreign_keys, AppState, DbPool};
use clap::Parser;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::convert::TryFrom;
use std::io;
use std::path::PathBuf;
use tera::Tera;

#[derive(Parser, Debug)]
#[command(name = "blog_server", author, version, about = "Starts the blog web server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

fn fatal(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::Other, message)
}

fn build_cors(allowed_origins: &str) -> Cors {
    let cors = if allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .map_err(|e| fatal(format!("Failed to load or parse configuration: {}", e)))?;

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let tera = Tera::new("templates/**/*.html")
        .map_err(|e| fatal(format!("Tera initialization failed: {}", e)))?;

    let db_path = config.blog_db_path();
    if !db_path.exists() {
        return Err(fatal(format!(
            "FATAL: blog.db not found at '{}'. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'",
            db_path.display()
        )));
    }
    let pool: DbPool = Pool::builder()
        .build(with_foreign_keys(SqliteConnectionManager::file(&db_path)))
        .map_err(|e| fatal(format!("FATAL: Failed to create SQLite connection pool: {}", e)))?;

    let session_key_bytes = hex::decode(&config.session_secret_key)
        .map_err(|_| fatal("FATAL: SESSION_SECRET_KEY in .env is not a valid hex string.".to_string()))?;
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .map_err(|_| fatal("FATAL: The decoded SESSION_SECRET_KEY is shorter than 64 bytes.".to_string()))?;

    let app_state = web::Data::new(AppState { posts_per_page: config.posts_per_page });
    let pool_data = web::Data::new(pool);
    let tera_data = web::Data::new(tera);

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        App::new()
            .wrap(build_cors(&config.allowed_origins))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block"))
            )
            .wrap(session_mw)
            .app_data(pool_data.clone())
            .app_data(tera_data.clone())
            .app_data(app_state.clone())
            .service(actix_files::Files::new("/static", "./static"))
            .service(
                web::scope("")
                    .wrap(csrf_middleware())
                    .configure(routes::auth::config_auth)
                    .configure(routes::blog::config_blog)
            )
            .default_service(web::to(routes::auth::not_found))
    })
    .bind(server_address)?
    .run()
    .await
}
