use blog_backend::config::Config;
use blog_backend::models::db_operations::{taxonomy_db_operations, users_db_operations};
use blog_backend::setup::db_setup;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "Database setup and content administration for the blog.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    Location {
        #[command(subcommand)]
        action: LocationAction,
    },
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Create the category hidden.
        #[arg(long)]
        unpublished: bool,
    },
    List {
        /// Only categories visitors can see.
        #[arg(long)]
        published: bool,
    },
    Publish {
        #[arg(long)]
        slug: String,
    },
    Unpublish {
        #[arg(long)]
        slug: String,
    },
}

#[derive(Subcommand, Debug)]
enum LocationAction {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        unpublished: bool,
    },
    List {
        #[arg(long)]
        published: bool,
    },
    Publish {
        #[arg(long)]
        id: i64,
    },
    Unpublish {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum TagAction {
    Create {
        #[arg(long)]
        tag: String,
    },
    List,
    /// Attach an existing tag to a post.
    Attach {
        #[arg(long)]
        post_id: i64,
        #[arg(long)]
        tag: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match Config::from_env(&cli.env_file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Db { action: DbAction::Setup } => setup_blog_database(&config),
        Commands::User { action } => open_existing(&config).and_then(|conn| run_user(&conn, action)),
        Commands::Category { action } => open_existing(&config).and_then(|conn| run_category(&conn, action)),
        Commands::Location { action } => open_existing(&config).and_then(|conn| run_location(&conn, action)),
        Commands::Tag { action } => open_existing(&config).and_then(|conn| run_tag(&conn, action)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("❌ {}", message);
            ExitCode::FAILURE
        }
    }
}

fn setup_blog_database(config: &Config) -> Result<(), String> {
    let db_path = config.blog_db_path();
    if db_path.exists() {
        println!("ℹ️ Blog database already exists at '{}'. Skipping creation.", db_path.display());
        return Ok(());
    }
    println!("\nSetting up blog database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).map_err(|e| format!("Could not create database directory: {}", e))?;
    }
    let mut conn = Connection::open(&db_path).map_err(|e| format!("Could not create blog database file: {}", e))?;
    db_setup::setup_blog_db(&mut conn).map_err(|e| format!("Error setting up blog database: {}", e))?;
    println!("✅ Blog database setup completed successfully.");
    Ok(())
}

fn open_existing(config: &Config) -> Result<Connection, String> {
    let db_path = config.blog_db_path();
    if !db_path.exists() {
        return Err(format!(
            "Blog database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        ));
    }
    let conn = Connection::open(&db_path).map_err(|e| format!("Could not open blog database: {}", e))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(|e| e.to_string())?;
    Ok(conn)
}

fn run_user(conn: &Connection, action: UserAction) -> Result<(), String> {
    match action {
        UserAction::Create { username, password, email } => {
            let id = users_db_operations::create_user(conn, &username, &password, &email)
                .map_err(|e| format!("Error creating user: {}. The username might already exist.", e))?;
            println!("✅ User '{}' created with id {}.", username, id);
        }
        UserAction::List => {
            let users = users_db_operations::read_all_users(conn).map_err(|e| e.to_string())?;
            println!("Listing users:");
            for user in users {
                println!("- [{}] {} <{}>", user.id, user.username, user.email);
            }
        }
    }
    Ok(())
}

fn published_label(is_published: bool) -> &'static str {
    if is_published { "published" } else { "hidden" }
}

fn run_category(conn: &Connection, action: CategoryAction) -> Result<(), String> {
    match action {
        CategoryAction::Create { title, slug, description, unpublished } => {
            let id = taxonomy_db_operations::create_category(conn, &title, &description, &slug, !unpublished)
                .map_err(|e| format!("Error creating category: {}. The slug might already be taken.", e))?;
            println!("✅ Category '{}' created with id {}.", slug, id);
        }
        CategoryAction::List { published } => {
            let categories = if published {
                taxonomy_db_operations::read_published_categories(conn)
            } else {
                taxonomy_db_operations::read_all_categories(conn)
            };
            for c in categories.map_err(|e| e.to_string())? {
                println!("- [{}] {} ({}) {}", c.id, c.title, c.slug, published_label(c.is_published));
            }
        }
        CategoryAction::Publish { slug } => set_category(conn, &slug, true)?,
        CategoryAction::Unpublish { slug } => set_category(conn, &slug, false)?,
    }
    Ok(())
}

fn set_category(conn: &Connection, slug: &str, is_published: bool) -> Result<(), String> {
    match taxonomy_db_operations::set_category_published(conn, slug, is_published) {
        Ok(0) => Err(format!("No category with slug '{}' found.", slug)),
        Ok(_) => {
            println!("✅ Category '{}' is now {}.", slug, published_label(is_published));
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}

fn run_location(conn: &Connection, action: LocationAction) -> Result<(), String> {
    match action {
        LocationAction::Create { name, unpublished } => {
            let id = taxonomy_db_operations::create_location(conn, &name, !unpublished)
                .map_err(|e| format!("Error creating location: {}", e))?;
            println!("✅ Location '{}' created with id {}.", name, id);
        }
        LocationAction::List { published } => {
            let locations = if published {
                taxonomy_db_operations::read_published_locations(conn)
            } else {
                taxonomy_db_operations::read_all_locations(conn)
            };
            for l in locations.map_err(|e| e.to_string())? {
                println!("- [{}] {} {}", l.id, l.name, published_label(l.is_published));
            }
        }
        LocationAction::Publish { id } => set_location(conn, id, true)?,
        LocationAction::Unpublish { id } => set_location(conn, id, false)?,
    }
    Ok(())
}

fn set_location(conn: &Connection, id: i64, is_published: bool) -> Result<(), String> {
    match taxonomy_db_operations::set_location_published(conn, id, is_published) {
        Ok(0) => Err(format!("No location with id {} found.", id)),
        Ok(_) => {
            println!("✅ Location {} is now {}.", id, published_label(is_published));
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}

fn run_tag(conn: &Connection, action: TagAction) -> Result<(), String> {
    match action {
        TagAction::Create { tag } => {
            let id = taxonomy_db_operations::create_tag(conn, &tag)
                .map_err(|e| format!("Error creating tag: {}. It might already exist.", e))?;
            println!("✅ Tag '{}' created with id {}.", tag, id);
        }
        TagAction::List => {
            for t in taxonomy_db_operations::read_all_tags(conn).map_err(|e| e.to_string())? {
                println!("- [{}] {}", t.id, t.tag);
            }
        }
        TagAction::Attach { post_id, tag } => {
            match taxonomy_db_operations::attach_tag_to_post(conn, post_id, &tag) {
                Ok(0) => println!("ℹ️ Nothing attached: tag '{}' is unknown or already on post {}.", tag, post_id),
                Ok(_) => println!("✅ Tag '{}' attached to post {}.", tag, post_id),
                Err(e) => return Err(format!("Error attaching tag: {}", e)),
            }
        }
    }
    Ok(())
}
