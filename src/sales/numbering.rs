//! Human-readable document numbers (`DEAL#001`, `OFFER#001`).
//!
//! Numbers are allocated by probing, not locking. `insert_with_number`
//! re-probes when a concurrent writer wins the unique index, so callers
//! never see a duplicate-number failure.

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::warn;

use crate::core::shared::error::CrmError;
use crate::core::shared::schema::{deals, offers};

pub const MAX_PROBES: usize = 100;
pub const MAX_INSERT_ATTEMPTS: usize = 10;

diesel::define_sql_function!(fn length(x: diesel::sql_types::Text) -> diesel::sql_types::Integer);

/// Lookups over the set of numbers already issued.
pub trait NumberRegistry {
    /// Number with the given prefix whose suffix sorts highest
    /// (longest first, then lexicographically).
    fn highest_number(&mut self, prefix: &str) -> Result<Option<String>, CrmError>;
    fn is_taken(&mut self, number: &str) -> Result<bool, CrmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberedTable {
    Deals,
    Offers,
}

impl NumberedTable {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Deals => "DEAL",
            Self::Offers => "OFFER",
        }
    }
}

/// Registry backed by the number column of a document table.
pub struct TableNumbers<'a> {
    pub conn: &'a mut PgConnection,
    pub table: NumberedTable,
}

impl<'a> TableNumbers<'a> {
    pub fn new(conn: &'a mut PgConnection, table: NumberedTable) -> Self {
        Self { conn, table }
    }
}

impl NumberRegistry for TableNumbers<'_> {
    fn highest_number(&mut self, prefix: &str) -> Result<Option<String>, CrmError> {
        let pattern = format!("{prefix}#%");
        let found = match self.table {
            NumberedTable::Deals => deals::table
                .filter(deals::deal_number.like(pattern))
                .select(deals::deal_number)
                .order((length(deals::deal_number).desc(), deals::deal_number.desc()))
                .first::<String>(&mut *self.conn)
                .optional()?,
            NumberedTable::Offers => offers::table
                .filter(offers::offer_number.like(pattern))
                .select(offers::offer_number)
                .order((length(offers::offer_number).desc(), offers::offer_number.desc()))
                .first::<String>(&mut *self.conn)
                .optional()?,
        };
        Ok(found)
    }

    fn is_taken(&mut self, number: &str) -> Result<bool, CrmError> {
        let count: i64 = match self.table {
            NumberedTable::Deals => deals::table
                .filter(deals::deal_number.eq(number))
                .count()
                .get_result(&mut *self.conn)?,
            NumberedTable::Offers => offers::table
                .filter(offers::offer_number.eq(number))
                .count()
                .get_result(&mut *self.conn)?,
        };
        Ok(count > 0)
    }
}

pub fn format_number(prefix: &str, n: u64) -> String {
    format!("{prefix}#{n:03}")
}

/// Leading digits after `PREFIX#`, if any.
pub fn parse_suffix(prefix: &str, number: &str) -> Option<u64> {
    let rest = number.strip_prefix(prefix)?.strip_prefix('#')?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn timestamp_number(prefix: &str) -> String {
    format!("{prefix}#{:06}", Utc::now().timestamp_millis().rem_euclid(1_000_000))
}

/// Next free number after the highest issued one. Falls back to a
/// timestamp suffix once `MAX_PROBES` candidates are all taken.
pub fn generate_number<R>(registry: &mut R, prefix: &str) -> Result<String, CrmError>
where
    R: NumberRegistry + ?Sized,
{
    let mut next = registry
        .highest_number(prefix)?
        .and_then(|n| parse_suffix(prefix, &n))
        .map_or(1, |n| n + 1);

    for _ in 0..MAX_PROBES {
        let candidate = format_number(prefix, next);
        if !registry.is_taken(&candidate)? {
            return Ok(candidate);
        }
        next += 1;
    }

    let fallback = timestamp_number(prefix);
    warn!("Number space for {prefix} exhausted after {MAX_PROBES} probes, using {fallback}");
    Ok(fallback)
}

pub fn is_unique_violation(e: &DieselError) -> bool {
    matches!(e, DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
}

/// Generates a number and runs `insert` with it, regenerating whenever the
/// insert loses a race on the unique index.
pub fn insert_with_number<R, T, F>(registry: &mut R, prefix: &str, mut insert: F) -> Result<T, CrmError>
where
    R: NumberRegistry + ?Sized,
    F: FnMut(&mut R, &str) -> Result<T, DieselError>,
{
    for attempt in 1..=MAX_INSERT_ATTEMPTS {
        let number = generate_number(registry, prefix)?;
        match insert(registry, &number) {
            Ok(value) => return Ok(value),
            Err(e) if is_unique_violation(&e) => {
                warn!("{number} was taken concurrently (attempt {attempt}), retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(CrmError::Storage(format!(
        "Could not allocate a unique {prefix} number after {MAX_INSERT_ATTEMPTS} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Barrier, Mutex};

    #[derive(Clone, Default)]
    struct MemoryRegistry {
        issued: Arc<Mutex<BTreeSet<String>>>,
        stale_highest: Option<String>,
    }

    impl MemoryRegistry {
        fn with(numbers: &[&str]) -> Self {
            let registry = Self::default();
            registry
                .issued
                .lock()
                .unwrap()
                .extend(numbers.iter().map(|n| n.to_string()));
            registry
        }

        fn claim(&mut self, number: &str) -> Result<String, DieselError> {
            let mut issued = self.issued.lock().unwrap();
            if !issued.insert(number.to_string()) {
                return Err(DieselError::DatabaseError(
                    DatabaseErrorKind::UniqueViolation,
                    Box::new(format!("duplicate key value {number}")),
                ));
            }
            Ok(number.to_string())
        }
    }

    impl NumberRegistry for MemoryRegistry {
        fn highest_number(&mut self, prefix: &str) -> Result<Option<String>, CrmError> {
            if let Some(stale) = &self.stale_highest {
                return Ok(Some(stale.clone()));
            }
            let issued = self.issued.lock().unwrap();
            let head = format!("{prefix}#");
            Ok(issued
                .iter()
                .filter(|n| n.starts_with(&head))
                .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
                .cloned())
        }

        fn is_taken(&mut self, number: &str) -> Result<bool, CrmError> {
            Ok(self.issued.lock().unwrap().contains(number))
        }
    }

    #[test]
    fn test_first_number() {
        let mut registry = MemoryRegistry::default();
        assert_eq!(generate_number(&mut registry, "DEAL").unwrap(), "DEAL#001");
    }

    #[test]
    fn test_increments_by_numeric_suffix_not_string_order() {
        let mut registry = MemoryRegistry::with(&["DEAL#999", "DEAL#1000", "DEAL#002", "OFFER#5000"]);
        assert_eq!(generate_number(&mut registry, "DEAL").unwrap(), "DEAL#1001");
        assert_eq!(generate_number(&mut registry, "OFFER").unwrap(), "OFFER#5001");
    }

    #[test]
    fn test_probe_skips_taken_numbers() {
        let mut registry = MemoryRegistry::with(&["DEAL#004", "DEAL#005", "DEAL#006"]);
        registry.stale_highest = Some("DEAL#003".into());
        assert_eq!(generate_number(&mut registry, "DEAL").unwrap(), "DEAL#007");
    }

    #[test]
    fn test_exhausted_probes_fall_back_to_timestamp() {
        let taken: Vec<String> = (2..=101).map(|n| format_number("DEAL", n)).collect();
        let refs: Vec<&str> = taken.iter().map(String::as_str).collect();
        let mut registry = MemoryRegistry::with(&refs);
        registry.stale_highest = Some("DEAL#001".into());

        let number = generate_number(&mut registry, "DEAL").unwrap();
        assert!(number.starts_with("DEAL#"));
        assert_eq!(number.len(), "DEAL#".len() + 6);
    }

    #[test]
    fn test_parse_suffix() {
        assert_eq!(parse_suffix("DEAL", "DEAL#042"), Some(42));
        assert_eq!(parse_suffix("DEAL", "DEAL#12-b"), Some(12));
        assert_eq!(parse_suffix("DEAL", "DEAL#abc"), None);
        assert_eq!(parse_suffix("DEAL", "OFFER#001"), None);
    }

    #[test]
    fn test_lost_race_retries_to_next_number() {
        let mut registry = MemoryRegistry::with(&["DEAL#001"]);
        let mut raced = false;
        let number = insert_with_number(&mut registry, "DEAL", |r, n| {
            if !raced {
                raced = true;
                r.issued.lock().unwrap().insert(n.to_string());
            }
            r.claim(n)
        })
        .unwrap();
        assert_eq!(number, "DEAL#003");
    }

    #[test]
    fn test_non_unique_errors_are_not_retried() {
        let mut registry = MemoryRegistry::default();
        let mut calls = 0;
        let result: Result<(), CrmError> = insert_with_number(&mut registry, "DEAL", |_, _| {
            calls += 1;
            Err(DieselError::RollbackTransaction)
        });
        assert!(matches!(result, Err(CrmError::Storage(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_concurrent_creators_get_distinct_numbers() {
        const WRITERS: usize = 8;
        let shared = MemoryRegistry::default();
        let barrier = Arc::new(Barrier::new(WRITERS));

        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let mut registry = shared.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    insert_with_number(&mut registry, "OFFER", |r, n| r.claim(n))
                })
            })
            .collect();

        let mut numbers: Vec<String> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        numbers.sort();

        let expected: Vec<String> = (1..=WRITERS as u64).map(|n| format_number("OFFER", n)).collect();
        assert_eq!(numbers, expected);
    }
}
