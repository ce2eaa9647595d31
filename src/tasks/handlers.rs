use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use super::lifecycle::{
    assignee_scope, derive_status, ensure_can_modify, page_bounds, reopened_status, TaskStatus,
};
use super::types::{CreateTaskRequest, DbTask, TaskFilter, TaskListQuery, UpdateTaskRequest};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::{ApiResponse, CrmError, Pagination};
use crate::core::shared::schema::tasks;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{with_conn, DbPool};

/// Persists `Pending -> Overdue` for past-due tasks, for one tenant or all.
pub fn promote_overdue(conn: &mut PgConnection, tenant: Option<Uuid>) -> QueryResult<usize> {
    let now = Utc::now();
    let pending_past_due = tasks::table
        .filter(tasks::status.eq(TaskStatus::Pending.as_str()))
        .filter(tasks::due_date.lt(now))
        .filter(tasks::is_deleted.eq(false));

    let changes = (
        tasks::status.eq(TaskStatus::Overdue.as_str()),
        tasks::updated_at.eq(now),
    );

    match tenant {
        Some(tenant) => diesel::update(pending_past_due.filter(tasks::company_id.eq(tenant)))
            .set(changes)
            .execute(conn),
        None => diesel::update(pending_past_due).set(changes).execute(conn),
    }
}

/// Spawns the periodic overdue sweep over every tenant.
pub fn spawn_overdue_sweeper(pool: DbPool, interval_secs: u64) -> JoinHandle<()> {
    info!("Starting overdue task sweep every {}s", interval_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;

            match with_conn(&pool, |conn| Ok(promote_overdue(conn, None)?)).await {
                Ok(0) => {}
                Ok(n) => info!("Marked {} task(s) overdue", n),
                Err(e) => error!("Overdue sweep failed: {}", e),
            }
        }
    })
}

fn day_start(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn filtered_tasks<'a>(tenant: Uuid, filter: &TaskFilter) -> tasks::BoxedQuery<'a, Pg> {
    let mut query = tasks::table
        .filter(tasks::company_id.eq(tenant))
        .filter(tasks::is_deleted.eq(false))
        .into_boxed();

    if let Some(assignee) = filter.assigned_to {
        query = query.filter(tasks::assigned_to.eq(assignee));
    }
    if let Some(status) = filter.status {
        query = query.filter(tasks::status.eq(status.as_str()));
    }
    if let Some(priority) = filter.priority {
        query = query.filter(tasks::priority.eq(priority.as_str()));
    }
    if let Some(kind) = filter.related_to_type.clone() {
        query = query.filter(tasks::related_to_type.eq(kind));
    }
    if let Some(related) = filter.related_to_id {
        query = query.filter(tasks::related_to_id.eq(related));
    }
    if let Some(from) = filter.date_from.and_then(day_start) {
        query = query.filter(tasks::due_date.ge(from));
    }
    if let Some(to) = filter
        .date_to
        .and_then(|d| d.checked_add_signed(Duration::days(1)))
        .and_then(day_start)
    {
        query = query.filter(tasks::due_date.lt(to));
    }
    query
}

fn with_derived_status(mut task: DbTask, now: DateTime<Utc>) -> DbTask {
    if let Ok(stored) = TaskStatus::parse(&task.status) {
        task.status = derive_status(stored, task.due_date, now).as_str().to_string();
    }
    task
}

fn find_task(conn: &mut PgConnection, tenant: Uuid, id: Uuid) -> Result<DbTask, CrmError> {
    tasks::table
        .filter(tasks::id.eq(id))
        .filter(tasks::company_id.eq(tenant))
        .filter(tasks::is_deleted.eq(false))
        .select(DbTask::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::not_found("Task"))
}

/// Loads a task the caller may modify.
fn find_modifiable(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
    id: Uuid,
) -> Result<DbTask, CrmError> {
    let task = find_task(conn, user.company_id, id)?;
    ensure_can_modify(user, task.assigned_to, task.created_by, "tasks")?;
    Ok(task)
}

fn set_status(conn: &mut PgConnection, id: Uuid, status: TaskStatus) -> Result<DbTask, CrmError> {
    let task = diesel::update(tasks::table.filter(tasks::id.eq(id)))
        .set((
            tasks::status.eq(status.as_str()),
            tasks::updated_at.eq(Utc::now()),
        ))
        .returning(DbTask::as_returning())
        .get_result(conn)?;
    Ok(task)
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<ApiResponse<Vec<DbTask>>>, CrmError> {
    let filter = query.filter(assignee_scope(&user, query.assigned_to))?;
    let (page, limit) = page_bounds(query.page, query.limit);
    let tenant = user.company_id;

    let (rows, total) = with_conn(&state.conn, move |conn| {
        promote_overdue(conn, Some(tenant))?;

        let total = filtered_tasks(tenant, &filter).count().get_result::<i64>(conn)?;
        let rows = filtered_tasks(tenant, &filter)
            .order((tasks::due_date.asc(), tasks::created_at.asc()))
            .offset((page - 1) * limit)
            .limit(limit)
            .select(DbTask::as_select())
            .load(conn)?;
        Ok((rows, total))
    })
    .await?;

    let now = Utc::now();
    let rows = rows.into_iter().map(|t| with_derived_status(t, now)).collect();
    Ok(Json(
        ApiResponse::ok(rows).with_pagination(Pagination { total, page, limit }),
    ))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DbTask>>), CrmError> {
    let new_task = req.validate()?;
    let now = Utc::now();

    let row = DbTask {
        id: Uuid::new_v4(),
        company_id: user.company_id,
        title: new_task.title,
        description: new_task.description,
        due_date: new_task.due_date,
        priority: new_task.priority.as_str().to_string(),
        status: derive_status(TaskStatus::Pending, new_task.due_date, now)
            .as_str()
            .to_string(),
        assigned_to: new_task.assigned_to,
        created_by: user.id,
        related_to_type: new_task.related_to_type,
        related_to_id: new_task.related_to_id,
        reminder_datetime: new_task.reminder_datetime,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    let task = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(tasks::table)
            .values(&row)
            .returning(DbTask::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created task {} for {}", task.id, task.assigned_to);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(task).with_message("Task created successfully")),
    ))
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<ApiResponse<DbTask>>, CrmError> {
    let changes = req.into_changes()?;

    let task = with_conn(&state.conn, move |conn| {
        find_modifiable(conn, &user, id)?;
        Ok(diesel::update(tasks::table.filter(tasks::id.eq(id)))
            .set((&changes, tasks::updated_at.eq(Utc::now())))
            .returning(DbTask::as_returning())
            .get_result(conn)?)
    })
    .await?;

    Ok(Json(
        ApiResponse::ok(with_derived_status(task, Utc::now()))
            .with_message("Task updated successfully"),
    ))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, CrmError> {
    with_conn(&state.conn, move |conn| {
        find_modifiable(conn, &user, id)?;
        diesel::update(tasks::table.filter(tasks::id.eq(id)))
            .set((tasks::is_deleted.eq(true), tasks::updated_at.eq(Utc::now())))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    info!("Deleted task {}", id);
    Ok(Json(ApiResponse::message("Task deleted successfully")))
}

pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DbTask>>, CrmError> {
    let task = with_conn(&state.conn, move |conn| {
        find_modifiable(conn, &user, id)?;
        set_status(conn, id, TaskStatus::Completed)
    })
    .await?;

    Ok(Json(ApiResponse::ok(task).with_message("Task marked as completed")))
}

pub async fn reopen_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DbTask>>, CrmError> {
    let task = with_conn(&state.conn, move |conn| {
        let task = find_modifiable(conn, &user, id)?;
        set_status(conn, id, reopened_status(task.due_date, Utc::now()))
    })
    .await?;

    Ok(Json(ApiResponse::ok(task).with_message("Task reopened")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: &str, due: DateTime<Utc>) -> DbTask {
        let now = Utc::now();
        DbTask {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            title: "Follow up".into(),
            description: None,
            due_date: due,
            priority: "Medium".into(),
            status: status.into(),
            assigned_to: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            related_to_type: None,
            related_to_id: None,
            reminder_datetime: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_task_listing_reads_the_tasks_table_for_one_tenant() {
        let tenant = Uuid::new_v4();
        let filter = TaskFilter {
            status: Some(TaskStatus::Pending),
            ..Default::default()
        };
        let query = filtered_tasks(tenant, &filter);
        let sql = diesel::debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("FROM \"tasks\""), "{sql}");
        assert!(sql.contains("\"tasks\".\"company_id\" = $1"), "{sql}");
        assert!(sql.contains(&tenant.to_string()), "{sql}");
    }

    #[test]
    fn test_listed_pending_past_due_reads_overdue() {
        let now = Utc::now();
        let listed = with_derived_status(task("Pending", now - Duration::hours(1)), now);
        assert_eq!(listed.status, "Overdue");

        let listed = with_derived_status(task("Completed", now - Duration::hours(1)), now);
        assert_eq!(listed.status, "Completed");

        let listed = with_derived_status(task("Pending", now + Duration::hours(1)), now);
        assert_eq!(listed.status, "Pending");
    }

    #[test]
    fn test_day_start_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let start = day_start(date).unwrap();
        assert_eq!(start.to_rfc3339(), "2026-03-09T00:00:00+00:00");
    }
}
