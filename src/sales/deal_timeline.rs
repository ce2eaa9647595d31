use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::deals::find_deal;
use super::types::DealActivityQuery;
use crate::activities::storage::{insert_activity, list_activities, DbActivity};
use crate::activities::types::{ActivityFilter, ActivityType, CreateActivityRequest, CreationPolicy, ReferenceType};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::{ApiResponse, CrmError};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;

pub async fn list_deal_activities(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(deal_id): Path<Uuid>,
    Query(query): Query<DealActivityQuery>,
) -> Result<Json<ApiResponse<Vec<DbActivity>>>, CrmError> {
    let activity_type = query
        .activity_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(str::parse::<ActivityType>)
        .transpose()?;

    let rows = with_conn(&state.conn, move |conn| {
        find_deal(conn, user.company_id, deal_id)?;
        list_activities(conn, user.company_id, ActivityFilter::Deal(deal_id), activity_type)
    })
    .await?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// Adds an activity to the deal's timeline. The reference is always the
/// deal; type and description are mandatory.
pub async fn add_deal_activity(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(deal_id): Path<Uuid>,
    Json(req): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DbActivity>>), CrmError> {
    if req.description.as_deref().map_or(true, |d| d.trim().is_empty()) {
        return Err(CrmError::validation("type and description are required"));
    }

    let draft = CreationPolicy::Strict.prepare(CreateActivityRequest {
        reference_type: Some(ReferenceType::Deal.as_str().to_string()),
        reference_id: Some(deal_id),
        ..req
    })?;

    let activity = with_conn(&state.conn, move |conn| {
        find_deal(conn, user.company_id, deal_id)?;
        insert_activity(conn, user.company_id, user.id, draft)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(activity).with_message("Activity added successfully")),
    ))
}
