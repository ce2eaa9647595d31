use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::storage::{self, DbActivity};
use super::types::{ActivityFilter, ActivityListQuery, CreateActivityRequest, CreationPolicy, UpdateActivityRequest};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::{ApiResponse, CrmError};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;

#[derive(Debug, Default, Deserialize)]
pub struct CreateActivityParams {
    #[serde(default)]
    pub policy: CreationPolicy,
}

pub async fn list_activities(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<ActivityListQuery>,
) -> Result<Json<ApiResponse<Vec<DbActivity>>>, CrmError> {
    let filter = ActivityFilter::try_from(query)?;
    let tenant = user.company_id;

    let rows = with_conn(&state.conn, move |conn| {
        storage::list_activities(conn, tenant, filter, None)
    })
    .await?;

    Ok(Json(ApiResponse::ok(rows)))
}

pub async fn create_activity(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(params): Query<CreateActivityParams>,
    Json(req): Json<CreateActivityRequest>,
) -> Result<Json<ApiResponse<DbActivity>>, CrmError> {
    let draft = params.policy.prepare(req)?;

    let activity = with_conn(&state.conn, move |conn| {
        storage::insert_activity(conn, user.company_id, user.id, draft)
    })
    .await?;

    Ok(Json(ApiResponse::ok(activity).with_message("Activity created")))
}

pub async fn update_activity(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateActivityRequest>,
) -> Result<Json<ApiResponse<DbActivity>>, CrmError> {
    let activity = with_conn(&state.conn, move |conn| {
        storage::update_activity(conn, user.company_id, id, req)
    })
    .await?;

    Ok(Json(ApiResponse::ok(activity).with_message("Activity updated")))
}

pub async fn toggle_pin(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DbActivity>>, CrmError> {
    let activity = with_conn(&state.conn, move |conn| {
        storage::toggle_pin(conn, user.company_id, id)
    })
    .await?;

    Ok(Json(ApiResponse::ok(activity)))
}
