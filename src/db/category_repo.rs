use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;

use super::{parse_status, push_status_filter};
use crate::models::{Category, StatusFilter, SyncStatus};

pub struct CategoryRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    ten_id: i64,
    ten_code: Option<String>,
    woo_id: Option<i64>,
    woo_parent_id: Option<i64>,
    name: Option<String>,
    web_name: Option<String>,
    parent_ten_id: Option<i64>,
    blocked: bool,
    sync_status: String,
    last_error: Option<String>,
}

impl CategoryRow {
    fn into_category(self) -> Result<Category, sqlx::Error> {
        Ok(Category {
            ten_id: self.ten_id,
            ten_code: self.ten_code,
            woo_id: self.woo_id.filter(|id| *id > 0),
            woo_parent_id: self.woo_parent_id,
            name: self.name,
            web_name: self.web_name,
            parent_ten_id: self.parent_ten_id,
            blocked: self.blocked,
            sync_status: parse_status(&self.sync_status)?,
            last_error: self.last_error,
        })
    }
}

const COLUMNS: &str = "ten_id, ten_code, woo_id, woo_parent_id, name, web_name, parent_ten_id, blocked, sync_status, last_error";

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Unblocked, live categories whose status the filter selects.
    pub async fn select_for_sync(
        &self,
        filter: StatusFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Category>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM categories WHERE deleted_at IS NULL AND blocked = 0 AND "
        ));
        push_status_filter(&mut qb, filter);
        qb.push(" ORDER BY id");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<CategoryRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(CategoryRow::into_category).collect()
    }

    pub async fn get(&self, ten_id: i64) -> Result<Option<Category>, sqlx::Error> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM categories WHERE ten_id = ? AND deleted_at IS NULL"
        ))
        .bind(ten_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CategoryRow::into_category).transpose()
    }

    /// Storefront ids of every category already linked.
    pub async fn linked_ids(&self) -> Result<HashMap<i64, i64>, sqlx::Error> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT ten_id, woo_id FROM categories WHERE woo_id IS NOT NULL AND woo_id > 0 AND deleted_at IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Records the storefront link. Disabled categories are left as they are.
    pub async fn mark_synced(
        &self,
        ten_id: i64,
        woo_id: i64,
        woo_parent_id: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE categories
            SET woo_id = ?, woo_parent_id = ?, sync_status = ?, last_error = NULL, updated_at = ?
            WHERE ten_id = ? AND sync_status != 'disabled'
            "#,
        )
        .bind(woo_id)
        .bind(woo_parent_id.filter(|id| *id > 0))
        .bind(SyncStatus::Synced.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(ten_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_error(&self, ten_id: i64, message: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE categories SET sync_status = ?, last_error = ?, updated_at = ? WHERE ten_id = ?",
        )
        .bind(SyncStatus::Error.as_str())
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .bind(ten_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
