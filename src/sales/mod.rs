pub mod deal_contacts;
pub mod deal_timeline;
pub mod deals;
pub mod items;
pub mod numbering;
pub mod offers;
pub mod totals;
pub mod types;

use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{delete, get, put},
    Router,
};
use std::sync::Arc;

use crate::core::middleware::require_permission;
use crate::core::shared::state::AppState;

pub use numbering::{generate_number, insert_with_number, NumberRegistry, NumberedTable};
pub use totals::{calculate_totals, normalize_deal_status, normalize_unit, DealStatus, DiscountType, Totals, Unit};

pub const SALES_PERMISSION: &str = "proposals";

pub fn configure_sales_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/deals", get(deals::list_deals).post(deals::create_deal))
        .route(
            "/api/v1/deals/:id",
            get(deals::get_deal)
                .put(deals::update_deal)
                .delete(deals::delete_deal),
        )
        .route("/api/v1/deals/:id/status", put(deals::update_deal_status))
        .route("/api/v1/deals/:id/stage", put(deals::update_deal_stage))
        .route(
            "/api/v1/deals/:id/contacts",
            get(deal_contacts::list_deal_contacts).post(deal_contacts::add_deal_contact),
        )
        .route(
            "/api/v1/deals/:id/contacts/:contact_id",
            delete(deal_contacts::remove_deal_contact),
        )
        .route(
            "/api/v1/deals/:id/activities",
            get(deal_timeline::list_deal_activities).post(deal_timeline::add_deal_activity),
        )
        .route("/api/v1/offers", get(offers::list_offers).post(offers::create_offer))
        .route(
            "/api/v1/offers/:id",
            get(offers::get_offer)
                .put(offers::update_offer)
                .delete(offers::delete_offer),
        )
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_permission(SALES_PERMISSION, req, next)
        }))
}
