use bigdecimal::{BigDecimal, RoundingMode};
use diesel::{
    r2d2::{ConnectionManager, Pool},
    PgConnection,
};
use std::str::FromStr;

use crate::core::config::DatabaseConfig;
use crate::core::shared::error::CrmError;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(config: &DatabaseConfig) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(&config.url);
    Pool::builder()
        .max_size(config.max_connections)
        .build(manager)
}

/// Run database migrations
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS).map_err(
        |e| -> Box<dyn std::error::Error + Send + Sync> {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Migration error: {}", e),
            ))
        },
    )?;
    Ok(())
}

/// Runs `f` on a pooled connection inside the blocking thread pool.
pub async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, CrmError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, CrmError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e: tokio::task::JoinError| CrmError::Internal(e.to_string()))?
}

pub fn bd(val: f64) -> BigDecimal {
    BigDecimal::from_str(&val.to_string()).unwrap_or_else(|_| BigDecimal::from(0))
}

pub fn bd_to_f64(val: &BigDecimal) -> f64 {
    val.to_string().parse::<f64>().unwrap_or(0.0)
}

/// Rounds to cents, half away from zero, on the decimal representation.
pub fn round_money(val: f64) -> f64 {
    bd_to_f64(&bd(val).with_scale_round(2, RoundingMode::HalfUp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bd_round_trips_money_values() {
        assert_eq!(bd(18.5), BigDecimal::from_str("18.5").unwrap());
        assert_eq!(bd_to_f64(&bd(105.0)), 105.0);
    }

    #[test]
    fn test_round_money_is_half_up_on_decimal_digits() {
        assert_eq!(round_money(0.605), 0.61);
        assert_eq!(round_money(1.2075), 1.21);
        assert_eq!(round_money(2.004), 2.0);
        assert_eq!(round_money(-0.125), -0.13);
    }

    #[test]
    fn test_bd_non_finite_falls_back_to_zero() {
        assert_eq!(bd(f64::NAN), BigDecimal::from(0));
    }
}
