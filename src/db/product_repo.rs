use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;

use super::{parse_status, push_status_filter};
use crate::models::{Product, StatusFilter, SyncStatus};

pub struct ProductRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    ten_id: i64,
    ten_code: Option<String>,
    woo_id: Option<i64>,
    web_name: Option<String>,
    short_description: Option<String>,
    long_description: Option<String>,
    stock_control: bool,
    price: Option<String>,
    weight: Option<String>,
    stock: Option<i64>,
    stock_pushed: Option<i64>,
    sync_status: String,
}

impl ProductRow {
    fn into_product(self) -> Result<Product, sqlx::Error> {
        Ok(Product {
            ten_id: self.ten_id,
            ten_code: self.ten_code,
            woo_id: self.woo_id.filter(|id| *id > 0),
            web_name: self.web_name,
            short_description: self.short_description,
            long_description: self.long_description,
            stock_control: self.stock_control,
            price: self.price,
            weight: self.weight,
            stock: self.stock,
            stock_pushed: self.stock_pushed,
            sync_status: parse_status(&self.sync_status)?,
        })
    }
}

const COLUMNS: &str = "ten_id, ten_code, woo_id, web_name, short_description, long_description, stock_control, price, weight, stock, stock_pushed, sync_status";

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Unblocked, live products whose status the filter selects, most
    /// recently fetched first.
    pub async fn select_for_sync(
        &self,
        filter: StatusFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Product>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM products WHERE deleted_at IS NULL AND blocked = 0 AND "
        ));
        push_status_filter(&mut qb, filter);
        qb.push(" ORDER BY fetched_at DESC, id");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    /// Linked products whose stock differs from the last pushed value.
    pub async fn stock_changes(&self, limit: Option<usize>) -> Result<Vec<Product>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            r#"SELECT {COLUMNS} FROM products
            WHERE deleted_at IS NULL AND blocked = 0 AND sync_status != 'disabled'
              AND woo_id IS NOT NULL AND woo_id > 0
              AND stock IS NOT NULL AND (stock_pushed IS NULL OR stock_pushed != stock)
            ORDER BY id"#
        ));
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    pub async fn get(&self, ten_id: i64) -> Result<Option<Product>, sqlx::Error> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM products WHERE ten_id = ? AND deleted_at IS NULL"
        ))
        .bind(ten_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProductRow::into_product).transpose()
    }

    pub async fn mark_synced(&self, ten_id: i64, woo_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE products SET woo_id = ?, sync_status = ?, last_error = NULL, updated_at = ? WHERE ten_id = ?",
        )
        .bind(woo_id)
        .bind(SyncStatus::Synced.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(ten_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_error(&self, ten_id: i64, message: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE products SET sync_status = ?, last_error = ?, updated_at = ? WHERE ten_id = ?",
        )
        .bind(SyncStatus::Error.as_str())
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .bind(ten_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records a stock push failure without touching the sync status.
    pub async fn record_error(&self, ten_id: i64, message: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE products SET last_error = ?, updated_at = ? WHERE ten_id = ?")
            .bind(message)
            .bind(Utc::now().to_rfc3339())
            .bind(ten_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_stock_pushed(&self, ten_id: i64, quantity: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE products SET stock_pushed = ?, last_error = NULL, updated_at = ? WHERE ten_id = ?",
        )
        .bind(quantity)
        .bind(Utc::now().to_rfc3339())
        .bind(ten_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current stock of every live product.
    pub async fn stock_levels(&self) -> Result<HashMap<i64, Option<i64>>, sqlx::Error> {
        let rows: Vec<(i64, Option<i64>)> =
            sqlx::query_as("SELECT ten_id, stock FROM products WHERE deleted_at IS NULL")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// Writes new stock levels in one transaction.
    pub async fn apply_stock(&self, levels: &[(i64, i64)]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for (ten_id, quantity) in levels {
            sqlx::query("UPDATE products SET stock = ?, updated_at = ? WHERE ten_id = ?")
                .bind(quantity)
                .bind(&now)
                .bind(ten_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
