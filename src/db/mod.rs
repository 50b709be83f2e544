pub(crate) mod category_repo;
pub(crate) mod customer_repo;
mod lease_repo;
pub(crate) mod product_repo;
mod records;

pub use category_repo::CategoryRepository;
pub use customer_repo::CustomerRepository;
pub use lease_repo::{LeaseRepository, LeaseRow};
pub use product_repo::ProductRepository;
pub use records::{Entity, RecordAction};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::{Attributes, ExistingState, ImportRow, StatusFilter, SyncStatus};

/// Keys per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: PathBuf) -> Result<SqlitePool, sqlx::Error> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Stored hash and status for every natural key present in `rows`.
pub async fn load_states<A: Attributes>(
    pool: &SqlitePool,
    rows: &[ImportRow<A>],
) -> Result<HashMap<A::Key, ExistingState>, sqlx::Error> {
    let mut ids: Vec<i64> = rows.iter().map(|r| r.attrs.lookup_id()).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut states = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {}, content_hash, sync_status FROM {} WHERE {} IN (",
            A::KEY_COLUMNS.join(", "),
            A::TABLE,
            A::KEY_COLUMNS[0]
        ));
        let mut separated = qb.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        for row in qb.build().fetch_all(pool).await? {
            let status: String = row.try_get("sync_status")?;
            states.insert(
                A::key_from_row(&row)?,
                ExistingState {
                    hash: row.try_get("content_hash")?,
                    status: parse_status(&status)?,
                },
            );
        }
    }
    Ok(states)
}

/// Internal row ids keyed by an integer natural-key column.
pub(crate) async fn ids_by_key(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    keys: &[i64],
) -> Result<HashMap<i64, i64>, sqlx::Error> {
    let mut keys = keys.to_vec();
    keys.sort_unstable();
    keys.dedup();

    let mut ids = HashMap::with_capacity(keys.len());
    for chunk in keys.chunks(LOOKUP_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT id, {column} AS natural_key FROM {table} WHERE deleted_at IS NULL AND {column} IN ("
        ));
        let mut separated = qb.separated(", ");
        for key in chunk {
            separated.push_bind(*key);
        }
        separated.push_unseparated(")");

        for row in qb.build().fetch_all(pool).await? {
            ids.insert(row.try_get("natural_key")?, row.try_get("id")?);
        }
    }
    Ok(ids)
}

/// Appends `sync_status IN (...)` for the statuses a filter selects.
pub(crate) fn push_status_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: StatusFilter) {
    qb.push("sync_status IN (");
    let mut separated = qb.separated(", ");
    for status in filter.statuses() {
        separated.push_bind(status.as_str());
    }
    separated.push_unseparated(")");
}

pub(crate) fn parse_status(raw: &str) -> Result<SyncStatus, sqlx::Error> {
    SyncStatus::from_str(raw).map_err(|e| sqlx::Error::Decode(e.into()))
}


#[cfg(test)]
mod tests {
    use super::test_support::setup_db;
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    use crate::models::CategoryAttrs;

    #[tokio::test]
    async fn test_init_db_creates_tables() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let pool = init_db(db_path).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        for table in [
            "categories",
            "customer_addresses",
            "customers",
            "order_lines",
            "orders",
            "products",
            "sync_locks",
        ] {
            assert!(table_names.contains(&table), "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_load_states_only_returns_known_keys() {
        let db = setup_db().await;
        sqlx::query(
            "INSERT INTO categories (ten_id, content_hash, sync_status, created_at, updated_at) VALUES (1, 'abc', 'synced', 'now', 'now')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let attrs = |ten_id| CategoryAttrs {
            ten_id,
            ten_code: None,
            name: None,
            web_name: None,
            parent_ten_id: None,
            last_user: None,
            last_changed_at: None,
            created_user: None,
            created_on: None,
            web_sync: false,
            blocked: false,
            weight: None,
        };
        let rows = vec![
            ImportRow::new(attrs(1), "h1".to_string(), Utc::now()),
            ImportRow::new(attrs(2), "h2".to_string(), Utc::now()),
        ];

        let states = load_states(&db.pool, &rows).await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(
            states[&1],
            ExistingState {
                hash: Some("abc".to_string()),
                status: SyncStatus::Synced
            }
        );
    }
}
