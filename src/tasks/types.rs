use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::{parse_date, parse_datetime, parse_time, validate_meeting_window, TaskPriority, TaskStatus};
use crate::core::shared::error::CrmError;
use crate::core::shared::schema::{meetings, tasks};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = tasks)]
pub struct DbTask {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: String,
    pub status: String,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
    pub reminder_datetime: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = meetings)]
pub struct DbMeeting {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub meeting_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: Option<String>,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
    pub reminder_datetime: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn required_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn optional_datetime(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, CrmError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => parse_datetime(r)
            .map(Some)
            .ok_or_else(|| CrmError::validation(format!("Invalid {field}: {r}"))),
    }
}

fn optional_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, CrmError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => parse_date(r)
            .map(Some)
            .ok_or_else(|| CrmError::validation(format!("Invalid {field}: {r}"))),
    }
}

fn optional_time(raw: Option<&str>, field: &str) -> Result<Option<NaiveTime>, CrmError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => parse_time(r)
            .map(Some)
            .ok_or_else(|| CrmError::validation(format!("Invalid {field}: {r}"))),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub reminder_datetime: Option<String>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
}

/// Create input after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: TaskPriority,
    pub assigned_to: Uuid,
    pub reminder_datetime: Option<DateTime<Utc>>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
}

impl CreateTaskRequest {
    pub fn validate(self) -> Result<NewTask, CrmError> {
        let (Some(title), Some(due_raw), Some(assigned_to)) =
            (required_text(self.title), required_text(self.due_date), self.assigned_to)
        else {
            return Err(CrmError::validation(
                "Title, Due Date, and Assigned User are required",
            ));
        };

        let due_date = optional_datetime(Some(&due_raw), "due_date")?
            .ok_or_else(|| CrmError::validation("Invalid due_date"))?;
        let priority = match self.priority.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => TaskPriority::parse(p)?,
            None => TaskPriority::default(),
        };

        Ok(NewTask {
            title,
            description: self.description,
            due_date,
            priority,
            assigned_to,
            reminder_datetime: optional_datetime(self.reminder_datetime.as_deref(), "reminder_datetime")?,
            related_to_type: self.related_to_type,
            related_to_id: self.related_to_id,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub reminder_datetime: Option<String>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub reminder_datetime: Option<DateTime<Utc>>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
}

impl UpdateTaskRequest {
    pub fn into_changes(self) -> Result<TaskChanges, CrmError> {
        let changes = TaskChanges {
            title: self.title,
            description: self.description,
            due_date: optional_datetime(self.due_date.as_deref(), "due_date")?,
            priority: self
                .priority
                .as_deref()
                .map(TaskPriority::parse)
                .transpose()?
                .map(|p| p.as_str().to_string()),
            status: self
                .status
                .as_deref()
                .map(TaskStatus::parse)
                .transpose()?
                .map(|s| s.as_str().to_string()),
            assigned_to: self.assigned_to,
            reminder_datetime: optional_datetime(self.reminder_datetime.as_deref(), "reminder_datetime")?,
            related_to_type: self.related_to_type,
            related_to_id: self.related_to_id,
        };

        if changes == TaskChanges::default() {
            return Err(CrmError::validation("No valid fields to update"));
        }
        Ok(changes)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskListQuery {
    pub assigned_to: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Parsed list filters; dates are inclusive calendar days.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub assigned_to: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl TaskListQuery {
    pub fn filter(&self, assigned_to: Option<Uuid>) -> Result<TaskFilter, CrmError> {
        let nonblank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(TaskFilter {
            assigned_to,
            status: nonblank(&self.status).as_deref().map(TaskStatus::parse).transpose()?,
            priority: nonblank(&self.priority)
                .as_deref()
                .map(TaskPriority::parse)
                .transpose()?,
            related_to_type: nonblank(&self.related_to_type),
            related_to_id: self.related_to_id,
            date_from: optional_date(self.date_from.as_deref(), "date_from")?,
            date_to: optional_date(self.date_to.as_deref(), "date_to")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMeetingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub meeting_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub reminder_datetime: Option<String>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeeting {
    pub title: String,
    pub description: Option<String>,
    pub meeting_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: Option<String>,
    pub assigned_to: Uuid,
    pub reminder_datetime: Option<DateTime<Utc>>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
}

impl CreateMeetingRequest {
    pub fn validate(self) -> Result<NewMeeting, CrmError> {
        let missing = || {
            CrmError::validation("Title, Date, Start Time, End Time, and Assigned User are required")
        };

        let title = required_text(self.title).ok_or_else(missing)?;
        let meeting_date = optional_date(self.meeting_date.as_deref(), "meeting_date")?.ok_or_else(missing)?;
        let start_time = optional_time(self.start_time.as_deref(), "start_time")?.ok_or_else(missing)?;
        let end_time = optional_time(self.end_time.as_deref(), "end_time")?.ok_or_else(missing)?;
        let assigned_to = self.assigned_to.ok_or_else(missing)?;

        validate_meeting_window(start_time, end_time)?;

        Ok(NewMeeting {
            title,
            description: self.description,
            meeting_date,
            start_time,
            end_time,
            location: self.location,
            assigned_to,
            reminder_datetime: optional_datetime(self.reminder_datetime.as_deref(), "reminder_datetime")?,
            related_to_type: self.related_to_type,
            related_to_id: self.related_to_id,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMeetingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub meeting_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub reminder_datetime: Option<String>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = meetings)]
pub struct MeetingChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub meeting_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub reminder_datetime: Option<DateTime<Utc>>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
}

impl UpdateMeetingRequest {
    /// Parses the update and rejects an inverted window when both ends
    /// are supplied together.
    pub fn into_changes(self) -> Result<MeetingChanges, CrmError> {
        let changes = MeetingChanges {
            title: self.title,
            description: self.description,
            meeting_date: optional_date(self.meeting_date.as_deref(), "meeting_date")?,
            start_time: optional_time(self.start_time.as_deref(), "start_time")?,
            end_time: optional_time(self.end_time.as_deref(), "end_time")?,
            location: self.location,
            assigned_to: self.assigned_to,
            reminder_datetime: optional_datetime(self.reminder_datetime.as_deref(), "reminder_datetime")?,
            related_to_type: self.related_to_type,
            related_to_id: self.related_to_id,
        };

        if let (Some(start), Some(end)) = (changes.start_time, changes.end_time) {
            validate_meeting_window(start, end)?;
        }
        if changes == MeetingChanges::default() {
            return Err(CrmError::validation("No valid fields to update"));
        }
        Ok(changes)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingListQuery {
    pub assigned_to: Option<Uuid>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub related_to_type: Option<String>,
    pub related_to_id: Option<Uuid>,
}

impl MeetingListQuery {
    pub fn dates(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>), CrmError> {
        Ok((
            optional_date(self.date_from.as_deref(), "date_from")?,
            optional_date(self.date_to.as_deref(), "date_to")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_create_requires_title_due_and_assignee() {
        let err = CreateTaskRequest {
            title: Some("Call supplier".into()),
            due_date: Some("2026-05-01".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));

        let err = CreateTaskRequest {
            title: Some("  ".into()),
            due_date: Some("2026-05-01".into()),
            assigned_to: Some(Uuid::new_v4()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn test_task_priority_defaults_to_medium() {
        let task = CreateTaskRequest {
            title: Some("Call supplier".into()),
            due_date: Some("2026-05-01 10:00".into()),
            assigned_to: Some(Uuid::new_v4()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(task.priority, TaskPriority::Medium);
    }

    #[test]
    fn test_task_update_needs_a_field() {
        assert!(UpdateTaskRequest::default().into_changes().is_err());
        let changes = UpdateTaskRequest {
            status: Some("completed".into()),
            ..Default::default()
        }
        .into_changes()
        .unwrap();
        assert_eq!(changes.status.as_deref(), Some("Completed"));
        assert!(UpdateTaskRequest {
            priority: Some("urgent".into()),
            ..Default::default()
        }
        .into_changes()
        .is_err());
    }

    #[test]
    fn test_meeting_create_validation() {
        let valid = CreateMeetingRequest {
            title: Some("Kickoff".into()),
            meeting_date: Some("2026-05-01".into()),
            start_time: Some("09:00".into()),
            end_time: Some("10:00".into()),
            assigned_to: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(valid.clone().validate().is_ok());

        let inverted = CreateMeetingRequest {
            start_time: Some("11:00".into()),
            ..valid.clone()
        };
        assert!(matches!(inverted.validate(), Err(CrmError::Validation(_))));

        let missing = CreateMeetingRequest {
            end_time: None,
            ..valid
        };
        assert!(matches!(missing.validate(), Err(CrmError::Validation(_))));
    }

    #[test]
    fn test_meeting_update_window_checked_only_when_both_supplied() {
        let err = UpdateMeetingRequest {
            start_time: Some("10:00".into()),
            end_time: Some("10:00".into()),
            ..Default::default()
        }
        .into_changes()
        .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));

        let only_start = UpdateMeetingRequest {
            start_time: Some("23:00".into()),
            ..Default::default()
        }
        .into_changes()
        .unwrap();
        assert_eq!(only_start.start_time, NaiveTime::from_hms_opt(23, 0, 0));
    }

    #[test]
    fn test_task_filter_parses_dates_and_enums() {
        let q = TaskListQuery {
            status: Some("pending".into()),
            priority: Some("".into()),
            date_from: Some("2026-01-01".into()),
            ..Default::default()
        };
        let filter = q.filter(None).unwrap();
        assert_eq!(filter.status, Some(TaskStatus::Pending));
        assert_eq!(filter.priority, None);
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2026, 1, 1));

        let bad = TaskListQuery {
            date_to: Some("01/02/2026".into()),
            ..Default::default()
        };
        assert!(bad.filter(None).is_err());
    }
}
