use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::SqlitePool;

const ACQUIRE_ATTEMPTS: usize = 3;

/// Fixed-width UTC, so stored timestamps compare correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct LeaseRepository {
    pool: SqlitePool,
}

/// A lease currently held on an operation.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LeaseRow {
    pub name: String,
    pub holder: String,
    pub acquired_at: String,
    pub expires_at: String,
}

impl LeaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Takes the lease on `name` for `ttl`, replacing an expired one.
    /// Returns the current holder when the lease is still live.
    ///
    /// The take-over is one conditional upsert, so two concurrent callers
    /// cannot both win.
    pub async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Result<(), LeaseRow>, sqlx::Error> {
        let acquired_at = timestamp(now);
        let expires_at = timestamp(now + ttl);

        for _ in 0..ACQUIRE_ATTEMPTS {
            let result = sqlx::query(
                r#"
                INSERT INTO sync_locks (name, holder, acquired_at, expires_at) VALUES (?, ?, ?, ?)
                ON CONFLICT (name) DO UPDATE SET
                    holder = excluded.holder,
                    acquired_at = excluded.acquired_at,
                    expires_at = excluded.expires_at
                WHERE sync_locks.expires_at <= excluded.acquired_at
                "#,
            )
            .bind(name)
            .bind(holder)
            .bind(&acquired_at)
            .bind(&expires_at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                tracing::debug!(lease = name, holder, expires_at = %expires_at, "lease acquired");
                return Ok(Ok(()));
            }

            let current: Option<LeaseRow> = sqlx::query_as(
                "SELECT name, holder, acquired_at, expires_at FROM sync_locks WHERE name = ?",
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
            // released between the two statements
            if let Some(current) = current {
                return Ok(Err(current));
            }
        }

        Err(sqlx::Error::RowNotFound)
    }

    /// Releases the lease if `holder` still owns it.
    pub async fn release(&self, name: &str, holder: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sync_locks WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_db;

    #[tokio::test]
    async fn test_live_lease_blocks_second_holder() {
        let db = setup_db().await;
        let repo = LeaseRepository::new(db.pool.clone());
        let now = Utc::now();

        assert!(repo
            .try_acquire("import:products", "a", Duration::minutes(5), now)
            .await
            .unwrap()
            .is_ok());

        let held = repo
            .try_acquire("import:products", "b", Duration::minutes(5), now)
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(held.holder, "a");

        // Other operations are independent
        assert!(repo
            .try_acquire("import:orders", "b", Duration::minutes(5), now)
            .await
            .unwrap()
            .is_ok());
    }

    #[tokio::test]
    async fn test_expired_lease_is_taken_over() {
        let db = setup_db().await;
        let repo = LeaseRepository::new(db.pool.clone());
        let then = Utc::now() - Duration::hours(2);

        repo.try_acquire("sync:categories", "a", Duration::hours(1), then)
            .await
            .unwrap()
            .unwrap();

        assert!(repo
            .try_acquire("sync:categories", "b", Duration::hours(1), Utc::now())
            .await
            .unwrap()
            .is_ok());
        assert!(!repo.release("sync:categories", "a").await.unwrap());
        assert!(repo.release("sync:categories", "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_acquire_has_one_winner() {
        let db = setup_db().await;
        let first = LeaseRepository::new(db.pool.clone());
        let second = LeaseRepository::new(db.pool.clone());
        let now = Utc::now();

        let (a, b) = tokio::join!(
            first.try_acquire("import:orders", "a", Duration::minutes(5), now),
            second.try_acquire("import:orders", "b", Duration::minutes(5), now),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let held = a.err().or(b.err()).unwrap();
        let (holder,): (String,) = sqlx::query_as("SELECT holder FROM sync_locks WHERE name = ?")
            .bind("import:orders")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(held.holder, holder);
    }

    #[tokio::test]
    async fn test_lease_expires_exactly_at_ttl() {
        let db = setup_db().await;
        let repo = LeaseRepository::new(db.pool.clone());
        let now = Utc::now();

        repo.try_acquire("sync:stock", "a", Duration::seconds(10), now)
            .await
            .unwrap()
            .unwrap();

        let later = now + Duration::seconds(9);
        assert!(repo
            .try_acquire("sync:stock", "b", Duration::seconds(10), later)
            .await
            .unwrap()
            .is_err());
        let expired = now + Duration::seconds(10);
        assert!(repo
            .try_acquire("sync:stock", "b", Duration::seconds(10), expired)
            .await
            .unwrap()
            .is_ok());
    }
}
