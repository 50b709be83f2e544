//! Chunked upsert writer.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::record::{Binder, TRACKING_COLUMNS};
use crate::models::{Attributes, ImportRow};

/// A row that can be written with `INSERT .. ON CONFLICT DO UPDATE`.
pub trait UpsertRow {
    fn table() -> &'static str;

    /// Conflict target columns.
    fn key_columns() -> &'static [&'static str];

    /// All written columns in bind order.
    fn columns() -> Vec<&'static str>;

    fn bind_row(&self, row: &mut Binder<'_, '_>, now: &str);
}

impl<A: Attributes> UpsertRow for ImportRow<A> {
    fn table() -> &'static str {
        A::TABLE
    }

    fn key_columns() -> &'static [&'static str] {
        A::KEY_COLUMNS
    }

    fn columns() -> Vec<&'static str> {
        A::COLUMNS
            .iter()
            .chain(TRACKING_COLUMNS.iter())
            .copied()
            .collect()
    }

    fn bind_row(&self, row: &mut Binder<'_, '_>, now: &str) {
        self.attrs.bind_columns(row);
        row.push_bind(self.hash.clone())
            .push_bind(self.status.as_str())
            .push_bind(None::<String>)
            .push_bind(self.fetched_at.to_rfc3339())
            .push_bind(now.to_string())
            .push_bind(now.to_string());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("failed to write chunk {index}/{total} ({size} rows) into {table}: {source}")]
    Chunk {
        table: &'static str,
        /// 1-based
        index: usize,
        total: usize,
        size: usize,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Operator override of the rows per statement.
    pub chunk: Option<usize>,
    pub max_placeholders: usize,
}

/// Rows per statement for a table with `columns` columns.
pub fn batch_size(columns: usize, options: WriteOptions) -> usize {
    let bound = (options.max_placeholders / columns.max(1)).max(1);
    match options.chunk {
        Some(requested) if requested > bound => {
            tracing::warn!(
                requested,
                bound,
                columns,
                "chunk size exceeds the placeholder limit, clamping"
            );
            bound
        }
        Some(requested) if requested > 0 => requested,
        _ => bound,
    }
}

/// Upserts `rows` chunk by chunk, each chunk in its own transaction.
/// Stops at the first failing chunk; chunks before it stay committed.
pub async fn write_rows<R: UpsertRow>(
    pool: &SqlitePool,
    rows: &[R],
    options: WriteOptions,
) -> Result<usize, WriteError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let columns = R::columns();
    let keys = R::key_columns();
    let update_set: Vec<String> = columns
        .iter()
        .filter(|column| !keys.contains(column) && **column != "created_at")
        .map(|column| format!("{column} = excluded.{column}"))
        .collect();
    let head = format!("INSERT INTO {} ({}) ", R::table(), columns.join(", "));
    let tail = format!(
        " ON CONFLICT ({}) DO UPDATE SET {}",
        keys.join(", "),
        update_set.join(", ")
    );

    let size = batch_size(columns.len(), options);
    let total = rows.len().div_ceil(size);
    let now = Utc::now().to_rfc3339();
    let mut written = 0;

    for (index, chunk) in rows.chunks(size).enumerate() {
        let fail = |source| WriteError::Chunk {
            table: R::table(),
            index: index + 1,
            total,
            size: chunk.len(),
            source,
        };

        let mut tx = pool.begin().await.map_err(fail)?;
        let mut qb = QueryBuilder::<Sqlite>::new(&head);
        qb.push_values(chunk.iter(), |mut row, record| record.bind_row(&mut row, &now));
        qb.push(&tail);

        qb.build().execute(&mut *tx).await.map_err(fail)?;
        tx.commit().await.map_err(fail)?;

        written += chunk.len();
        tracing::debug!(
            table = R::table(),
            chunk = index + 1,
            total,
            rows = chunk.len(),
            "chunk written"
        );
    }

    Ok(written)
}
