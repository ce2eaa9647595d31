pub mod handlers;
pub mod resolver;
pub mod storage;
pub mod types;

use axum::{
    routing::{get, patch},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use resolver::{resolve_ancestors, Ancestors, AncestorSource};
pub use types::{ActivityDraft, ActivityFilter, ActivityType, CreationPolicy, Reference, ReferenceType};

pub fn configure_activity_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/activities",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .route("/api/v1/activities/:id", patch(handlers::update_activity))
        .route("/api/v1/activities/:id/pin", patch(handlers::toggle_pin))
}
