//! Murmur API server binary.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use murmur_api::config::ApiConfig;
use murmur_api::services::auth::{AuthServices, build_provider};
use murmur_api::AppState;
use murmur_core::auth::revocation::MemoryRevocationStore;
use murmur_core::auth::users::MemoryUserStore;
use murmur_core::content::{MemoryContentStore, PgContentStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "murmur_api_server", about = "Murmur API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8000")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/murmur"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep users, revocations and posts in process memory instead of
    /// PostgreSQL. Intended for local runs with `IDENTITY_PROVIDER=test`.
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Seconds between sweeps of expired revocations and cached verifications.
    #[arg(long, default_value_t = 300)]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,murmur_api=debug,murmur_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.bind_addr = args.bind;
    config.pg_connection_url = args.database_url;

    info!(
        bind = %config.bind_addr,
        provider = ?config.identity_provider,
        in_memory = args.in_memory,
        "starting murmur_api_server"
    );

    let state = if args.in_memory {
        warn!("in-memory mode: all state is lost on exit");
        let auth = AuthServices::new(
            build_provider(&config)?,
            Arc::new(MemoryRevocationStore::new()),
            Arc::new(MemoryUserStore::new()),
            config.token_cache,
        );
        AppState::new(config.clone(), auth, Arc::new(MemoryContentStore::new()))
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        murmur_api::migrate(&pool).await?;

        let auth = AuthServices::postgres(&config, pool.clone())?;
        AppState::new(config.clone(), auth, Arc::new(PgContentStore::new(pool)))
    };

    let sweep_every = Duration::from_secs(args.sweep_interval_secs.max(1));
    let purge_task = state.auth.revocations.spawn_purge_task(sweep_every);
    let cleanup_task = state.auth.verifier.spawn_cleanup_task(sweep_every);

    let app = murmur_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    purge_task.abort();
    cleanup_task.abort();
    info!("server stopped");

    result?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
