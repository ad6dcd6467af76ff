//! # ccweb-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for content-addressed uploads.
//! Every flag can also be supplied through its environment variable.

use std::path::PathBuf;

use ccweb_api::state::{AppConfig, AppState, Profile, DEFAULT_MAX_UPLOAD_BYTES};
use clap::Parser;

/// ccweb upload service.
#[derive(Parser)]
#[command(name = "ccweb-api", version, about)]
struct Cli {
    /// Port to bind the HTTP server to.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Directory for permanent content-addressed blobs.
    #[arg(long, env = "STORAGE_DIR", default_value = "files")]
    storage_dir: PathBuf,

    /// Directory for in-flight uploads [default: <storage-dir>/tmp].
    #[arg(long, env = "SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Largest accepted upload body in bytes.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Deployment profile.
    #[arg(long, env = "CCWEB_PROFILE", value_enum, default_value_t = Profile::Development)]
    profile: Profile,

    /// Shared bearer secret. Required under the production profile.
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,
}

impl From<Cli> for AppConfig {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            storage_dir: cli.storage_dir,
            scratch_dir: cli.scratch_dir,
            max_upload_bytes: cli.max_upload_bytes,
            profile: cli.profile,
            auth_token: cli.auth_token,
        }
    }
}

fn init_tracing(profile: Profile) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if profile.json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from(Cli::parse());
    init_tracing(config.profile);
    tracing::debug!(?config, "configuration loaded");

    if config.profile.requires_auth() && config.auth_token.is_none() {
        tracing::error!("AUTH_TOKEN must be set under the production profile");
        return Err("AUTH_TOKEN must be set under the production profile".into());
    }
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set; bearer secrets are not checked");
    }

    // No DATABASE_URL means the in-memory catalog.
    let db_pool = ccweb_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let port = config.port;
    let state = AppState::with_pool(config, db_pool);
    state.files.blobs().ensure_dirs().map_err(|e| {
        tracing::error!("Storage directory initialization failed: {e}");
        e
    })?;

    let app = ccweb_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("ccweb API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
