// src/main.rs
// termgate - browser terminal to SSH bridge

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use termgate::api::build_router;
use termgate::auth::JwtKeys;
use termgate::config::AppConfig;
use termgate::db;
use termgate::rbac::verify_permission_registry;
use termgate::state::AppState;

#[derive(Parser)]
#[command(name = "termgate")]
#[command(about = "Browser terminal to SSH bridge with RBAC and audit trail")]
#[command(version)]
struct Cli {
    /// SQLite database URL (overrides config)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/WebSocket server (default)
    Serve {
        /// Listen address, e.g. 0.0.0.0:8080 (overrides TERMGATE_HOST/TERMGATE_PORT)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Apply migrations and seed default roles, then exit
    Migrate,

    /// Mint a bearer token for an existing user
    IssueToken {
        #[arg(long)]
        user_id: i64,

        #[arg(long)]
        org_id: i64,

        #[arg(long)]
        email: String,
    },
}

/// Graceful shutdown signal handler for SIGTERM and Ctrl+C
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if config.auth.uses_dev_secret() {
        warn!("JWT_SECRET is not set; using the built-in development secret");
    }

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => serve(config, bind).await,
        Commands::Migrate => {
            let pool = db::connect(&config.database).await?;
            db::migrate(&pool).await?;
            let seeded = db::seed_defaults(&pool).await?;
            info!(
                "Schema version {}, default org {}",
                db::schema_version(&pool).await?,
                seeded.org_id
            );
            Ok(())
        }
        Commands::IssueToken {
            user_id,
            org_id,
            email,
        } => {
            let keys = JwtKeys::from_secret(&config.auth.jwt_secret);
            let ttl = chrono::Duration::hours(config.auth.token_ttl_hours);
            let token = keys.create_token(user_id, org_id, &email, ttl)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, bind: Option<String>) -> Result<()> {
    info!("Starting termgate");

    let pool = db::connect(&config.database).await?;
    db::migrate(&pool).await?;
    db::seed_defaults(&pool).await?;
    verify_permission_registry(&pool)
        .await
        .context("Permission registry check failed")?;

    let app_state = Arc::new(AppState::build(pool, &config)?);
    let app = build_router(app_state);

    let bind_address = bind.unwrap_or_else(|| config.server.bind_address());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    info!("Terminal endpoint: ws://{}/api/v1/ws/ssh", bind_address);
    info!("Health endpoints: /health, /live");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutdown complete");
    Ok(())
}
