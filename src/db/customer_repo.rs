use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;

use super::{ids_by_key, push_status_filter};
use crate::models::{Address, AddressKind, Customer, StatusFilter, SyncStatus};

pub struct CustomerRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    woo_id: i64,
    ten_id: Option<String>,
    ten_shipping_address_id: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            woo_id: row.woo_id,
            ten_id: row.ten_id.filter(|id| !id.trim().is_empty()),
            ten_shipping_address_id: row.ten_shipping_address_id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: i64,
    customer_id: i64,
    kind: String,
    ten_id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    company: Option<String>,
    address_1: Option<String>,
    address_2: Option<String>,
    city: Option<String>,
    postcode: Option<String>,
    state: Option<String>,
    country: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

impl AddressRow {
    fn into_address(self) -> Result<Address, sqlx::Error> {
        Ok(Address {
            id: self.id,
            customer_id: self.customer_id,
            kind: AddressKind::from_str(&self.kind).map_err(|e| sqlx::Error::Decode(e.into()))?,
            ten_id: self.ten_id,
            first_name: self.first_name,
            last_name: self.last_name,
            company: self.company,
            address_1: self.address_1,
            address_2: self.address_2,
            city: self.city,
            postcode: self.postcode,
            state: self.state,
            country: self.country,
            email: self.email,
            phone: self.phone,
        })
    }
}

const COLUMNS: &str =
    "id, woo_id, ten_id, ten_shipping_address_id, email, first_name, last_name, phone";

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Internal ids of the stored customers among `woo_ids`.
    pub async fn ids_by_woo_id(&self, woo_ids: &[i64]) -> Result<HashMap<i64, i64>, sqlx::Error> {
        ids_by_key(&self.pool, "customers", "woo_id", woo_ids).await
    }

    /// Live customers not yet linked to the ERP.
    pub async fn unlinked(&self) -> Result<Vec<Customer>, sqlx::Error> {
        let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
            r#"SELECT {COLUMNS} FROM customers
            WHERE deleted_at IS NULL AND sync_status != 'disabled'
              AND (ten_id IS NULL OR TRIM(ten_id) = '')
              AND email IS NOT NULL AND TRIM(email) != ''
            ORDER BY id"#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    /// Customers due for export, optionally narrowed to one email.
    pub async fn select_for_export(
        &self,
        filter: StatusFilter,
        limit: Option<usize>,
        email: Option<&str>,
    ) -> Result<Vec<Customer>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM customers WHERE deleted_at IS NULL AND "
        ));
        push_status_filter(&mut qb, filter);
        if let Some(email) = email {
            qb.push(" AND LOWER(TRIM(email)) = ")
                .push_bind(email.trim().to_lowercase());
        }
        qb.push(" ORDER BY id");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<CustomerRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    pub async fn addresses(&self, customer_id: i64) -> Result<Vec<Address>, sqlx::Error> {
        let rows: Vec<AddressRow> = sqlx::query_as(
            r#"SELECT id, customer_id, kind, ten_id, first_name, last_name, company, address_1,
                   address_2, city, postcode, state, country, email, phone
            FROM customer_addresses
            WHERE customer_id = ? AND deleted_at IS NULL
            ORDER BY kind"#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AddressRow::into_address).collect()
    }

    /// Links a customer to an ERP customer that already exists.
    pub async fn link(
        &self,
        customer_id: i64,
        ten_id: &str,
        shipping_address_id: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE customers
            SET ten_id = ?, ten_shipping_address_id = COALESCE(?, ten_shipping_address_id),
                sync_status = ?, last_error = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(ten_id)
        .bind(shipping_address_id)
        .bind(SyncStatus::Synced.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(customer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Marks a customer and its addresses as failed.
    pub async fn mark_error(&self, customer_id: i64, message: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE customers SET sync_status = ?, last_error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(SyncStatus::Error.as_str())
        .bind(message)
        .bind(&now)
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE customer_addresses SET sync_status = ?, last_error = ?, updated_at = ? WHERE customer_id = ? AND deleted_at IS NULL",
        )
        .bind(SyncStatus::Error.as_str())
        .bind(message)
        .bind(&now)
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Persists a successful export: the customer's ERP id and the ERP id
    /// of each address, keyed by internal address id.
    pub async fn mark_exported(
        &self,
        customer_id: i64,
        ten_id: &str,
        shipping_address_id: Option<&str>,
        address_ids: &[(i64, String)],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            UPDATE customers
            SET ten_id = ?, ten_shipping_address_id = COALESCE(?, ten_shipping_address_id),
                sync_status = ?, last_error = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(ten_id)
        .bind(shipping_address_id)
        .bind(SyncStatus::Synced.as_str())
        .bind(&now)
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

        for (address_id, address_ten_id) in address_ids {
            sqlx::query(
                r#"
                UPDATE customer_addresses
                SET ten_id = ?, sync_status = ?, last_error = NULL, updated_at = ?
                WHERE id = ? AND customer_id = ?
                "#,
            )
            .bind(address_ten_id)
            .bind(SyncStatus::Synced.as_str())
            .bind(&now)
            .bind(address_id)
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::test_support::setup_db;

    pub async fn insert_customer(
        pool: &SqlitePool,
        woo_id: i64,
        email: &str,
        status: SyncStatus,
    ) -> i64 {
        let result = sqlx::query(
            r#"
            INSERT INTO customers (woo_id, email, first_name, last_name, sync_status, content_hash, created_at, updated_at)
            VALUES (?, ?, 'Ana', 'García', ?, 'hash', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')
            "#,
        )
        .bind(woo_id)
        .bind(email)
        .bind(status.as_str())
        .execute(pool)
        .await
        .unwrap();
        result.last_insert_rowid()
    }

    pub async fn insert_address(pool: &SqlitePool, customer_id: i64, woo_id: i64, kind: &str) -> i64 {
        let result = sqlx::query(
            r#"
            INSERT INTO customer_addresses (customer_id, woo_customer_id, kind, city, created_at, updated_at)
            VALUES (?, ?, ?, 'Valencia', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')
            "#,
        )
        .bind(customer_id)
        .bind(woo_id)
        .bind(kind)
        .execute(pool)
        .await
        .unwrap();
        result.last_insert_rowid()
    }

    #[tokio::test]
    async fn test_select_for_export_by_email() {
        let db = setup_db().await;
        let repo = CustomerRepository::new(db.pool.clone());
        insert_customer(&db.pool, 1, "Ana@Example.com", SyncStatus::Pending).await;
        insert_customer(&db.pool, 2, "bob@example.com", SyncStatus::Pending).await;
        insert_customer(&db.pool, 3, "eve@example.com", SyncStatus::Synced).await;

        let all = repo
            .select_for_export(StatusFilter::Pending, None, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let one = repo
            .select_for_export(StatusFilter::Pending, None, Some(" ana@example.com"))
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].woo_id, 1);
        assert_eq!(one[0].match_email().as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn test_mark_exported_links_addresses() {
        let db = setup_db().await;
        let repo = CustomerRepository::new(db.pool.clone());
        let customer_id = insert_customer(&db.pool, 1, "ana@example.com", SyncStatus::Pending).await;
        let billing = insert_address(&db.pool, customer_id, 1, "billing").await;
        let shipping = insert_address(&db.pool, customer_id, 1, "shipping").await;

        repo.mark_exported(
            customer_id,
            "93141",
            Some("501"),
            &[(billing, "500".to_string()), (shipping, "501".to_string())],
        )
        .await
        .unwrap();

        assert!(repo.unlinked().await.unwrap().is_empty());
        let addresses = repo.addresses(customer_id).await.unwrap();
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].kind, AddressKind::Billing);
        assert_eq!(addresses[0].ten_id.as_deref(), Some("500"));
        assert_eq!(addresses[1].ten_id.as_deref(), Some("501"));
    }

    #[tokio::test]
    async fn test_mark_error_covers_addresses() {
        let db = setup_db().await;
        let repo = CustomerRepository::new(db.pool.clone());
        let customer_id = insert_customer(&db.pool, 1, "ana@example.com", SyncStatus::Pending).await;
        insert_address(&db.pool, customer_id, 1, "billing").await;

        repo.mark_error(customer_id, "rejected").await.unwrap();

        let errored: Vec<(String,)> =
            sqlx::query_as("SELECT sync_status FROM customer_addresses WHERE customer_id = ?")
                .bind(customer_id)
                .fetch_all(&db.pool)
                .await
                .unwrap();
        assert_eq!(errored, vec![("error".to_string(),)]);

        let retry = repo
            .select_for_export(StatusFilter::Error, None, None)
            .await
            .unwrap();
        assert_eq!(retry.len(), 1);
    }
}
