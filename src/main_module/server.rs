//! HTTP server initialization and routing

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::activities::configure_activity_routes;
use crate::core::middleware::auth_middleware;
use crate::core::shared::state::AppState;
use crate::custom_fields::configure_custom_field_routes;
use crate::sales::configure_sales_routes;
use crate::tasks::configure_task_routes;

use super::{health_check, shutdown_signal};

/// Every `/api/v1` route sits behind bearer authentication; `/health` does not.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(configure_activity_routes())
        .merge(configure_sales_routes())
        .merge(configure_task_routes())
        .merge(configure_custom_field_routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&app_state),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_addr();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {} - is another instance running?", addr, e);
            return Err(e);
        }
    };

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
