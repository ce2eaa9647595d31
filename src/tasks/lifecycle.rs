//! Task status machine, visibility and meeting window rules.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::CrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Overdue,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::Pending, Self::Overdue, Self::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Overdue => "Overdue",
            Self::Completed => "Completed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CrmError> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| CrmError::validation(format!("Invalid task status: {raw}")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CrmError> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| CrmError::validation(format!("Invalid task priority: {raw}")))
    }
}

/// Status a task should be observed with at `now`. Only `Pending` moves.
pub fn derive_status(stored: TaskStatus, due: DateTime<Utc>, now: DateTime<Utc>) -> TaskStatus {
    match stored {
        TaskStatus::Pending if due < now => TaskStatus::Overdue,
        other => other,
    }
}

pub fn reopened_status(due: DateTime<Utc>, now: DateTime<Utc>) -> TaskStatus {
    derive_status(TaskStatus::Pending, due, now)
}

/// Assignee a listing is restricted to. Non-privileged callers only ever
/// see their own rows; privileged callers may narrow to anyone.
pub fn assignee_scope(user: &AuthenticatedUser, requested: Option<Uuid>) -> Option<Uuid> {
    if user.is_privileged() {
        requested
    } else {
        Some(user.id)
    }
}

pub fn ensure_can_modify(
    user: &AuthenticatedUser,
    assigned_to: Uuid,
    created_by: Uuid,
    what: &str,
) -> Result<(), CrmError> {
    if user.is_privileged() || user.id == assigned_to || user.id == created_by {
        Ok(())
    } else {
        Err(CrmError::permission(format!(
            "Permission denied. You can only modify your own {what}."
        )))
    }
}

pub fn validate_meeting_window(start: NaiveTime, end: NaiveTime) -> Result<(), CrmError> {
    if start >= end {
        return Err(CrmError::validation("End time must be after start time"));
    }
    Ok(())
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (UTC) or a bare date (midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    parse_date(raw)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// 1-based page and clamped page size.
pub fn page_bounds(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.filter(|p| *p > 0).unwrap_or(1);
    let limit = limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    (page, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(role: &str) -> AuthenticatedUser {
        AuthenticatedUser::new(Uuid::new_v4(), role, Uuid::new_v4())
    }

    #[test]
    fn test_past_due_pending_is_overdue() {
        let now = Utc::now();
        let due = now - Duration::hours(1);
        assert_eq!(derive_status(TaskStatus::Pending, due, now), TaskStatus::Overdue);
        assert_eq!(
            derive_status(TaskStatus::Pending, now + Duration::hours(1), now),
            TaskStatus::Pending
        );
    }

    #[test]
    fn test_completed_is_never_promoted() {
        let now = Utc::now();
        let due = now - Duration::days(3);
        assert_eq!(derive_status(TaskStatus::Completed, due, now), TaskStatus::Completed);
        assert_eq!(derive_status(TaskStatus::Overdue, due, now), TaskStatus::Overdue);
    }

    #[test]
    fn test_reopen_uses_due_date() {
        let now = Utc::now();
        assert_eq!(reopened_status(now - Duration::minutes(1), now), TaskStatus::Overdue);
        assert_eq!(reopened_status(now + Duration::days(1), now), TaskStatus::Pending);
    }

    #[test]
    fn test_non_privileged_scope_is_forced_to_self() {
        let employee = user("EMPLOYEE");
        let other = Uuid::new_v4();
        assert_eq!(assignee_scope(&employee, Some(other)), Some(employee.id));
        assert_eq!(assignee_scope(&employee, None), Some(employee.id));

        let admin = user("SUPERADMIN");
        assert_eq!(assignee_scope(&admin, Some(other)), Some(other));
        assert_eq!(assignee_scope(&admin, None), None);
    }

    #[test]
    fn test_modify_rule() {
        let employee = user("EMPLOYEE");
        let someone = Uuid::new_v4();
        assert!(ensure_can_modify(&employee, employee.id, someone, "tasks").is_ok());
        assert!(ensure_can_modify(&employee, someone, employee.id, "tasks").is_ok());
        assert!(matches!(
            ensure_can_modify(&employee, someone, someone, "tasks"),
            Err(CrmError::Permission(_))
        ));
        assert!(ensure_can_modify(&user("ADMIN"), someone, someone, "tasks").is_ok());
    }

    #[test]
    fn test_meeting_window() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert!(validate_meeting_window(nine, ten).is_ok());
        assert!(validate_meeting_window(ten, nine).is_err());
        assert!(validate_meeting_window(nine, nine).is_err());
    }

    #[test]
    fn test_parsers() {
        assert_eq!(parse_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_time("09:30:15"), NaiveTime::from_hms_opt(9, 30, 15));
        assert_eq!(parse_time("9am"), None);

        let midnight = parse_datetime("2026-03-01").unwrap();
        assert_eq!(midnight.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        let spaced = parse_datetime("2026-03-01 14:00:00").unwrap();
        assert_eq!(spaced.to_rfc3339(), "2026-03-01T14:00:00+00:00");
        let zoned = parse_datetime("2026-03-01T14:00:00+02:00").unwrap();
        assert_eq!(zoned.to_rfc3339(), "2026-03-01T12:00:00+00:00");
        assert!(parse_datetime("tomorrow").is_none());
    }

    #[test]
    fn test_status_and_priority_parse() {
        assert_eq!(TaskStatus::parse("overdue").unwrap(), TaskStatus::Overdue);
        assert!(TaskStatus::parse("done").is_err());
        assert_eq!(TaskPriority::parse("HIGH").unwrap(), TaskPriority::High);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None), (1, 50));
        assert_eq!(page_bounds(Some(0), Some(-5)), (1, 50));
        assert_eq!(page_bounds(Some(3), Some(10_000)), (3, 500));
    }
}
