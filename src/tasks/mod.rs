pub mod handlers;
pub mod lifecycle;
pub mod meetings;
pub mod types;

use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use handlers::{promote_overdue, spawn_overdue_sweeper};
pub use lifecycle::{derive_status, reopened_status, TaskPriority, TaskStatus};

pub fn configure_task_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/api/v1/tasks/:id",
            put(handlers::update_task).delete(handlers::delete_task),
        )
        .route("/api/v1/tasks/:id/complete", put(handlers::complete_task))
        .route("/api/v1/tasks/:id/reopen", put(handlers::reopen_task))
        .route(
            "/api/v1/meetings",
            get(meetings::list_meetings).post(meetings::create_meeting),
        )
        .route(
            "/api/v1/meetings/:id",
            put(meetings::update_meeting).delete(meetings::delete_meeting),
        )
}
