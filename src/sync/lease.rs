//! Per-operation run leases.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::LeaseRepository;

#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    #[error("{name} is already running (holder {holder}, expires {expires_at})")]
    Held {
        name: String,
        holder: String,
        expires_at: String,
    },

    #[error("lease database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Exclusive right to run one named operation until released or expired.
pub struct RunLease {
    repo: LeaseRepository,
    name: String,
    holder: String,
}

impl RunLease {
    pub async fn acquire(
        pool: &SqlitePool,
        name: &str,
        ttl: Duration,
    ) -> Result<Self, LeaseError> {
        let repo = LeaseRepository::new(pool.clone());
        let holder = Uuid::new_v4().to_string();

        if let Err(current) = repo.try_acquire(name, &holder, ttl, Utc::now()).await? {
            return Err(LeaseError::Held {
                name: name.to_string(),
                holder: current.holder,
                expires_at: current.expires_at,
            });
        }

        tracing::debug!(lease = name, %holder, "lease acquired");
        Ok(Self {
            repo,
            name: name.to_string(),
            holder,
        })
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub async fn release(self) -> Result<(), LeaseError> {
        if !self.repo.release(&self.name, &self.holder).await? {
            tracing::warn!(lease = %self.name, holder = %self.holder, "lease was taken over before release");
        }
        Ok(())
    }
}
