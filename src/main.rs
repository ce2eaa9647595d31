use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crmserver::core::config::AppConfig;
use crmserver::core::shared::error::set_expose_error_details;
use crmserver::core::shared::state::AppState;
use crmserver::core::shared::utils::{create_conn, run_migrations};
use crmserver::main_module::run_axum_server;
use crmserver::tasks::spawn_overdue_sweeper;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    config.validate().map_err(anyhow::Error::msg)?;
    set_expose_error_details(!config.is_production());
    if config.uses_default_secret() {
        warn!("auth.jwt_secret is the built-in default, set CRM_AUTH__JWT_SECRET");
    }

    let pool = create_conn(&config.database).context("failed to create database pool")?;
    run_migrations(&pool)
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to run migrations")?;
    info!("Database migrations applied");

    let sweep_secs = config.tasks.overdue_sweep_secs;
    if sweep_secs > 0 {
        spawn_overdue_sweeper(pool.clone(), sweep_secs);
    }

    let app_state = Arc::new(AppState::new(pool, config));
    run_axum_server(app_state).await.context("HTTP server failed")
}
