pub mod handlers;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use types::{field_name_from_label, CustomFieldDetail, CustomFieldRequest};

pub fn configure_custom_field_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/custom-fields",
            get(handlers::list_custom_fields).post(handlers::create_custom_field),
        )
        .route(
            "/api/v1/custom-fields/:id",
            get(handlers::get_custom_field)
                .put(handlers::update_custom_field)
                .delete(handlers::delete_custom_field),
        )
}
