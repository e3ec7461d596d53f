use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

use taskboard_api::config::ApiConfig;
use taskboard_api::database::seed;
use taskboard_api::helpers::session::SessionKeys;
use taskboard_api::helpers::uploads::UploadStore;
use taskboard_api::{configure_api, helpers};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    log_file_path: Option<String>,

    /// Path to api.toml (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drop and recreate the schema before starting
    #[arg(long)]
    reset: bool,

    /// Insert demo users and tasks when the database has no users
    #[arg(long)]
    seed: bool,
}

fn init_tracing(log_file_path: Option<&str>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(log_path) = log_file_path {
        let log_path = std::path::Path::new(log_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or(std::path::Path::new(".")),
            log_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("taskboard-api.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter.clone())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file_path.as_deref());

    let (config, config_path) =
        ApiConfig::load(args.config.as_deref()).context("Failed to load config")?;
    tracing::info!("Loaded configuration from {}", config_path.display());

    let db = helpers::database::initialize_database(config.database.path.as_deref())
        .context("Failed to initialize database")?;

    if args.reset {
        db.reset().await?;
    }
    if args.seed {
        seed::seed_demo_data(&db).await?;
    }

    let session_keys = SessionKeys::new(&config.auth.jwt_secret, config.auth.token_ttl_hours);
    let uploads = UploadStore::new(
        &config.uploads.dir,
        &config.uploads.public_path,
        config.uploads.max_file_size_bytes,
    );
    std::fs::create_dir_all(uploads.dir()).with_context(|| {
        format!("Failed to create uploads directory {}", uploads.dir().display())
    })?;

    let host = config.server.host.clone();
    let port = config.server.port;
    let allowed_origins = config.cors.allowed_origins.clone();

    tracing::info!("Starting server on {}:{}", host, port);

    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }
        let cors = cors
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Accept", "Content-Type"])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(session_keys.clone()))
            .app_data(web::Data::new(uploads.clone()))
            .configure(configure_api)
            .service(actix_files::Files::new(uploads.public_path(), uploads.dir()))
    })
    .bind((host.as_str(), port))?
    .run();

    server.await?;
    Ok(())
}
