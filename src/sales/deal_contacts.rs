use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use super::deals::{find_deal, linked_contacts, tenant_contacts};
use super::types::{DbDealContact, LinkContactRequest, LinkedContact};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::{ApiResponse, CrmError};
use crate::core::shared::schema::{contacts, deal_contacts};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;

pub async fn list_deal_contacts(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<LinkedContact>>>, CrmError> {
    let rows = with_conn(&state.conn, move |conn| {
        find_deal(conn, user.company_id, deal_id)?;
        Ok(linked_contacts(conn, user.company_id, deal_id)?)
    })
    .await?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// Links an existing contact; re-linking updates the primary flag and role.
pub async fn add_deal_contact(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(deal_id): Path<Uuid>,
    Json(req): Json<LinkContactRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LinkedContact>>), CrmError> {
    let contact_id = req
        .contact_id
        .ok_or_else(|| CrmError::validation("contact_id is required"))?;

    let linked = with_conn(&state.conn, move |conn| {
        find_deal(conn, user.company_id, deal_id)?;

        let exists: i64 = tenant_contacts(user.company_id)
            .filter(contacts::id.eq(contact_id))
            .count()
            .get_result(conn)?;
        if exists == 0 {
            return Err(CrmError::not_found("Contact"));
        }

        conn.transaction::<_, CrmError, _>(|conn| {
            if req.is_primary {
                diesel::update(deal_contacts::table.filter(deal_contacts::deal_id.eq(deal_id)))
                    .set(deal_contacts::is_primary.eq(false))
                    .execute(conn)?;
            }

            let link = DbDealContact {
                id: Uuid::new_v4(),
                deal_id,
                contact_id,
                is_primary: req.is_primary,
                role: req.role.clone(),
                created_at: Utc::now(),
            };
            diesel::insert_into(deal_contacts::table)
                .values(&link)
                .on_conflict((deal_contacts::deal_id, deal_contacts::contact_id))
                .do_update()
                .set((
                    deal_contacts::is_primary.eq(req.is_primary),
                    deal_contacts::role.eq(req.role.clone()),
                ))
                .execute(conn)?;
            Ok(())
        })?;

        linked_contacts(conn, user.company_id, deal_id)?
            .into_iter()
            .find(|c| c.contact_id == contact_id)
            .ok_or_else(|| CrmError::not_found("Contact"))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(linked))))
}

/// Removes the link only; the contact record stays.
pub async fn remove_deal_contact(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((deal_id, contact_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<serde_json::Value>>, CrmError> {
    with_conn(&state.conn, move |conn| {
        find_deal(conn, user.company_id, deal_id)?;

        let removed = diesel::delete(
            deal_contacts::table
                .filter(deal_contacts::deal_id.eq(deal_id))
                .filter(deal_contacts::contact_id.eq(contact_id)),
        )
        .execute(conn)?;

        if removed == 0 {
            return Err(CrmError::not_found("Link"));
        }
        Ok(())
    })
    .await?;

    Ok(Json(ApiResponse::ok(serde_json::json!({ "unlinked": true }))))
}
