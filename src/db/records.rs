//! Operator maintenance of individual records: soft delete and disable.

use chrono::Utc;
use clap::ValueEnum;
use sqlx::SqlitePool;

use crate::models::SyncStatus;

/// Entities addressable by their natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Entity {
    Categories,
    Products,
    Customers,
    Orders,
}

impl Entity {
    fn table(&self) -> &'static str {
        match self {
            Entity::Categories => "categories",
            Entity::Products => "products",
            Entity::Customers => "customers",
            Entity::Orders => "orders",
        }
    }

    fn key_column(&self) -> &'static str {
        match self {
            Entity::Categories | Entity::Products => "ten_id",
            Entity::Customers | Entity::Orders => "woo_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordAction {
    /// Exclude from sync regardless of status
    Disable,
    /// Requeue a disabled record as pending
    Enable,
    /// Soft delete
    Delete,
    /// Undo a soft delete
    Restore,
}

impl RecordAction {
    /// Applies the action; returns whether a record matched.
    pub async fn apply(
        &self,
        pool: &SqlitePool,
        entity: Entity,
        key: i64,
    ) -> Result<bool, sqlx::Error> {
        let (table, column) = (entity.table(), entity.key_column());
        let now = Utc::now().to_rfc3339();

        // Leading bind (if any), then updated_at, then the key.
        let (sql, leading) = match self {
            RecordAction::Disable => (
                format!("UPDATE {table} SET sync_status = ?, updated_at = ? WHERE {column} = ?"),
                Some(SyncStatus::Disabled.as_str().to_string()),
            ),
            RecordAction::Enable => (
                format!(
                    "UPDATE {table} SET sync_status = ?, last_error = NULL, updated_at = ? WHERE {column} = ? AND sync_status = 'disabled'"
                ),
                Some(SyncStatus::Pending.as_str().to_string()),
            ),
            RecordAction::Delete => (
                format!("UPDATE {table} SET deleted_at = ?, updated_at = ? WHERE {column} = ?"),
                Some(now.clone()),
            ),
            RecordAction::Restore => (
                format!(
                    "UPDATE {table} SET deleted_at = NULL, updated_at = ? WHERE {column} = ? AND deleted_at IS NOT NULL"
                ),
                None,
            ),
        };

        let mut query = sqlx::query(&sql);
        if let Some(value) = leading {
            query = query.bind(value);
        }
        let result = query.bind(now).bind(key).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::category_repo::tests::insert_category;
    use crate::db::test_support::setup_db;
    use crate::db::CategoryRepository;
    use crate::models::StatusFilter;

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let db = setup_db().await;
        let repo = CategoryRepository::new(db.pool.clone());
        insert_category(&db.pool, 7, "Bombas", 0, None, SyncStatus::Pending).await;

        assert!(RecordAction::Delete
            .apply(&db.pool, Entity::Categories, 7)
            .await
            .unwrap());
        assert!(repo.get(7).await.unwrap().is_none());
        assert!(repo
            .select_for_sync(StatusFilter::All, None)
            .await
            .unwrap()
            .is_empty());

        assert!(RecordAction::Restore
            .apply(&db.pool, Entity::Categories, 7)
            .await
            .unwrap());
        assert!(repo.get(7).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_disable_and_enable() {
        let db = setup_db().await;
        let repo = CategoryRepository::new(db.pool.clone());
        insert_category(&db.pool, 7, "Bombas", 0, None, SyncStatus::Error).await;

        RecordAction::Disable
            .apply(&db.pool, Entity::Categories, 7)
            .await
            .unwrap();
        assert!(repo
            .select_for_sync(StatusFilter::All, None)
            .await
            .unwrap()
            .is_empty());

        RecordAction::Enable
            .apply(&db.pool, Entity::Categories, 7)
            .await
            .unwrap();
        let category = repo.get(7).await.unwrap().unwrap();
        assert_eq!(category.sync_status, SyncStatus::Pending);

        assert!(!RecordAction::Enable
            .apply(&db.pool, Entity::Products, 99)
            .await
            .unwrap());
    }
}
