use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::lifecycle::{assignee_scope, ensure_can_modify, validate_meeting_window};
use super::types::{CreateMeetingRequest, DbMeeting, MeetingChanges, MeetingListQuery, UpdateMeetingRequest};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::{ApiResponse, CrmError};
use crate::core::shared::schema::meetings;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;

fn find_modifiable(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
    id: Uuid,
) -> Result<DbMeeting, CrmError> {
    let meeting = meetings::table
        .filter(meetings::id.eq(id))
        .filter(meetings::company_id.eq(user.company_id))
        .filter(meetings::is_deleted.eq(false))
        .select(DbMeeting::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::not_found("Meeting"))?;

    ensure_can_modify(user, meeting.assigned_to, meeting.created_by, "meetings")?;
    Ok(meeting)
}

/// The window a meeting would have after `changes` are applied.
fn check_merged_window(stored: &DbMeeting, changes: &MeetingChanges) -> Result<(), CrmError> {
    validate_meeting_window(
        changes.start_time.unwrap_or(stored.start_time),
        changes.end_time.unwrap_or(stored.end_time),
    )
}

pub async fn list_meetings(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<MeetingListQuery>,
) -> Result<Json<ApiResponse<Vec<DbMeeting>>>, CrmError> {
    let (date_from, date_to) = query.dates()?;
    let assignee = assignee_scope(&user, query.assigned_to);
    let tenant = user.company_id;

    let rows = with_conn(&state.conn, move |conn| {
        let mut q = meetings::table
            .filter(meetings::company_id.eq(tenant))
            .filter(meetings::is_deleted.eq(false))
            .into_boxed();

        if let Some(assignee) = assignee {
            q = q.filter(meetings::assigned_to.eq(assignee));
        }
        if let Some(from) = date_from {
            q = q.filter(meetings::meeting_date.ge(from));
        }
        if let Some(to) = date_to {
            q = q.filter(meetings::meeting_date.le(to));
        }
        if let (Some(kind), Some(related)) = (query.related_to_type, query.related_to_id) {
            q = q
                .filter(meetings::related_to_type.eq(kind))
                .filter(meetings::related_to_id.eq(related));
        }

        Ok(q
            .order((meetings::meeting_date.asc(), meetings::start_time.asc()))
            .select(DbMeeting::as_select())
            .load(conn)?)
    })
    .await?;

    Ok(Json(ApiResponse::ok(rows)))
}

pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateMeetingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DbMeeting>>), CrmError> {
    let new_meeting = req.validate()?;
    let now = Utc::now();

    let row = DbMeeting {
        id: Uuid::new_v4(),
        company_id: user.company_id,
        title: new_meeting.title,
        description: new_meeting.description,
        meeting_date: new_meeting.meeting_date,
        start_time: new_meeting.start_time,
        end_time: new_meeting.end_time,
        location: new_meeting.location,
        assigned_to: new_meeting.assigned_to,
        created_by: user.id,
        related_to_type: new_meeting.related_to_type,
        related_to_id: new_meeting.related_to_id,
        reminder_datetime: new_meeting.reminder_datetime,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    let meeting = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(meetings::table)
            .values(&row)
            .returning(DbMeeting::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created meeting {} on {}", meeting.id, meeting.meeting_date);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(meeting).with_message("Meeting created successfully")),
    ))
}

pub async fn update_meeting(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMeetingRequest>,
) -> Result<Json<ApiResponse<DbMeeting>>, CrmError> {
    let changes = req.into_changes()?;

    let meeting = with_conn(&state.conn, move |conn| {
        let stored = find_modifiable(conn, &user, id)?;
        check_merged_window(&stored, &changes)?;

        Ok(diesel::update(meetings::table.filter(meetings::id.eq(id)))
            .set((&changes, meetings::updated_at.eq(Utc::now())))
            .returning(DbMeeting::as_returning())
            .get_result(conn)?)
    })
    .await?;

    Ok(Json(
        ApiResponse::ok(meeting).with_message("Meeting updated successfully"),
    ))
}

pub async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, CrmError> {
    with_conn(&state.conn, move |conn| {
        find_modifiable(conn, &user, id)?;
        diesel::update(meetings::table.filter(meetings::id.eq(id)))
            .set((meetings::is_deleted.eq(true), meetings::updated_at.eq(Utc::now())))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    info!("Deleted meeting {}", id);
    Ok(Json(ApiResponse::message("Meeting deleted successfully")))
}
