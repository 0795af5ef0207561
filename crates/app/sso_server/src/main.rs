//! SSO authorization server binary.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use sso_core::credentials::postgres::PgCredentialStore;
use tracing::{info, warn};

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "sso_server", about = "SSO authorization server", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/sso"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    /// Redis URL for codes, refresh records and the blacklist.
    ///
    /// Without it an in-process store is used, which does not survive a
    /// restart and is not shared between instances.
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Skip running embedded migrations at startup.
    #[arg(long, default_value_t = false)]
    skip_migrations: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,sso_api=debug,sso_core=debug")),
        )
        .init();

    let args = Args::parse();
    info!(port = args.port, version = sso_core::version(), "starting sso_server");

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    if args.skip_migrations {
        info!("skipping database migrations");
    } else {
        info!("running database migrations");
        sso_api::migrate(&pool).await?;
    }

    let store = sso_core::store::connect(args.redis_url.as_deref()).await?;
    let auth_config = sso_core::config::AuthConfig::from_env();
    info!(?auth_config, "token lifecycle configured");

    let config = sso_api::config::ApiConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        ..sso_api::config::ApiConfig::from_env()
    };

    let state = sso_api::AppState::new(
        Arc::new(PgCredentialStore::new(pool)),
        store,
        auth_config,
        config.clone(),
    );
    let app = sso_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}
