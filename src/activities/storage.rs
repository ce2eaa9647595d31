use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::resolver::{resolve_ancestors, Ancestors};
use super::types::{ActivityDraft, ActivityFilter, ActivityType, UpdateActivityRequest};
use crate::core::shared::error::CrmError;
use crate::core::shared::schema::activities;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = activities)]
pub struct DbActivity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: Option<String>,
    pub reference_type: String,
    pub reference_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub is_pinned: bool,
    pub follow_up_at: Option<DateTime<Utc>>,
    pub meeting_link: Option<String>,
}

impl DbActivity {
    fn from_draft(tenant_id: Uuid, created_by: Uuid, draft: ActivityDraft, a: Ancestors) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            activity_type: draft.activity_type.as_str().to_string(),
            description: draft.description,
            reference_type: draft.reference.kind.as_str().to_string(),
            reference_id: draft.reference.id,
            lead_id: a.lead_id,
            company_id: a.company_id,
            contact_id: a.contact_id,
            deal_id: a.deal_id,
            created_by: Some(created_by),
            created_at: Utc::now(),
            is_deleted: false,
            is_pinned: draft.is_pinned,
            follow_up_at: draft.follow_up_at,
            meeting_link: draft.meeting_link,
        }
    }
}

/// Non-deleted activities of one tenant, newest first.
pub fn list_activities(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    filter: ActivityFilter,
    activity_type: Option<ActivityType>,
) -> Result<Vec<DbActivity>, CrmError> {
    let mut q = activities::table
        .filter(activities::tenant_id.eq(tenant_id))
        .filter(activities::is_deleted.eq(false))
        .into_boxed();

    q = match filter {
        ActivityFilter::Company(id) => q.filter(activities::company_id.eq(id)),
        ActivityFilter::Contact(id) => q.filter(activities::contact_id.eq(id)),
        ActivityFilter::Deal(id) => q.filter(activities::deal_id.eq(id)),
        ActivityFilter::Lead(id) => q.filter(activities::lead_id.eq(id)),
        ActivityFilter::Reference(r) => q
            .filter(activities::reference_type.eq(r.kind.as_str()))
            .filter(activities::reference_id.eq(r.id)),
        ActivityFilter::All => q,
    };

    if let Some(t) = activity_type {
        q = q.filter(activities::activity_type.eq(t.as_str()));
    }

    Ok(q
        .order(activities::created_at.desc())
        .select(DbActivity::as_select())
        .load(conn)?)
}

/// Resolves ancestors for the draft's reference and inserts exactly one row.
pub fn insert_activity(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    created_by: Uuid,
    draft: ActivityDraft,
) -> Result<DbActivity, CrmError> {
    let ancestors = resolve_ancestors(conn, tenant_id, draft.reference)?;
    let activity = DbActivity::from_draft(tenant_id, created_by, draft, ancestors);

    diesel::insert_into(activities::table)
        .values(&activity)
        .execute(conn)?;

    info!(
        "Activity {} ({}) attached to {} {}",
        activity.id, activity.activity_type, activity.reference_type, activity.reference_id
    );
    Ok(activity)
}

fn find_live(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<DbActivity, CrmError> {
    activities::table
        .filter(activities::id.eq(id))
        .filter(activities::tenant_id.eq(tenant_id))
        .filter(activities::is_deleted.eq(false))
        .select(DbActivity::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::not_found("Activity"))
}

#[derive(Debug, PartialEq, AsChangeset)]
#[diesel(table_name = activities)]
struct ActivityChanges {
    description: Option<String>,
    follow_up_at: Option<DateTime<Utc>>,
    meeting_link: Option<String>,
}

impl ActivityChanges {
    /// `None` when the request carries nothing to write.
    fn from_request(req: UpdateActivityRequest) -> Option<Self> {
        let changes = Self {
            description: req.description,
            follow_up_at: req.follow_up_at,
            meeting_link: req.meeting_link,
        };
        let touched = changes.description.is_some()
            || changes.follow_up_at.is_some()
            || changes.meeting_link.is_some();
        touched.then_some(changes)
    }
}

/// Partial update; absent fields keep their stored value.
pub fn update_activity(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    req: UpdateActivityRequest,
) -> Result<DbActivity, CrmError> {
    find_live(conn, tenant_id, id)?;

    if let Some(changes) = ActivityChanges::from_request(req) {
        diesel::update(activities::table.filter(activities::id.eq(id)))
            .set(&changes)
            .execute(conn)?;
    }

    find_live(conn, tenant_id, id)
}

pub fn toggle_pin(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<DbActivity, CrmError> {
    let toggled = flip_pin(find_live(conn, tenant_id, id)?);

    diesel::update(activities::table.filter(activities::id.eq(id)))
        .set(activities::is_pinned.eq(toggled.is_pinned))
        .execute(conn)?;

    Ok(toggled)
}

fn flip_pin(current: DbActivity) -> DbActivity {
    DbActivity {
        is_pinned: !current.is_pinned,
        ..current
    }
}
