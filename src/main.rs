//! Notes demo server
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Transaction  │───▶│    Notes     │───▶│ Postgres │
//! │  (YAML)  │    │  Middleware  │    │   Handlers   │    │  (sqlx)  │
//! └──────────┘    └──────────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! DELETE requests run inside one database transaction each; a failing
//! handler response rolls the whole request back.

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use transaction_middleware::config::AppConfig;
use transaction_middleware::db::Database;
use transaction_middleware::logging::init_logging;
use transaction_middleware::notes;
use transaction_middleware::{PipelineGroups, RequestInterceptor, install};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config);

    info!(env = %env, git = env!("GIT_HASH"), "Starting notes server");

    let db_config = config
        .database
        .as_ref()
        .context("database.url must be configured")?;
    let db = Arc::new(Database::connect(db_config).await?);
    notes::ensure_schema(db.pool()).await?;

    let interceptor = Arc::new(RequestInterceptor::new(
        db.pool().clone(),
        config.transaction.predicate()?,
    ));

    let target = config.transaction.target_group();
    let groups = match target {
        Some(_) => PipelineGroups {
            web: notes::web_routes(),
            api: notes::api_routes(),
        },
        None => {
            // No auto-apply group: attach to the notes routes by hand.
            PipelineGroups {
                web: interceptor.layer_onto(notes::web_routes()),
                api: interceptor.layer_onto(notes::api_routes()),
            }
        }
    };
    let app = install(&interceptor, target, groups).with_state(db);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
