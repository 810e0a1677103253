use anyhow::Context;
use dotenvy::dotenv;
use log::{info, warn};
use std::sync::Arc;

use socialserver::core::config::AppConfig;
use socialserver::core::shared::state::AppState;
use socialserver::core::shared::utils::{create_conn, run_migrations};
use socialserver::main_module::run_axum_server;
use socialserver::social::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    info!(
        "Starting socialserver {} on {}",
        env!("CARGO_PKG_VERSION"),
        config.server.base_url
    );

    let pool = create_conn(&config.database).context("Failed to create database pool")?;
    if config.database.run_migrations {
        run_migrations(&pool).map_err(|e| anyhow::anyhow!("{e}"))?;
    } else {
        warn!("RUN_MIGRATIONS disabled, assuming schema is current");
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let app_state = Arc::new(AppState::new(Some(config), PgStore::new(pool)));

    run_axum_server(app_state, &host, port).await?;
    info!("Server stopped");
    Ok(())
}
