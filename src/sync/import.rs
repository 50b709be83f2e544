//! ERP import steps and the shared upsert pipeline.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use super::diff::{classify, dedup_last};
use super::writer::write_rows;
use super::{RunOptions, SyncError, SyncReport};
use crate::clients::{ErpApi, ProductQuery};
use crate::db::{load_states, ProductRepository};
use crate::mapping::ten::{map_category, map_product, map_stock};
use crate::mapping::Mapped;
use crate::models::{Attributes, ImportRow};

/// Upper bound on category rows read per import.
const CATEGORY_LIMIT: usize = 10_000;

/// Maps raw records, counting fetched and dropped ones.
pub(crate) fn map_records<A, F>(
    records: &[Value],
    map: F,
    fetched_at: DateTime<Utc>,
    report: &mut SyncReport,
) -> Vec<ImportRow<A>>
where
    A: Attributes,
    F: Fn(&Value) -> Option<Mapped<A>>,
{
    report.fetched += records.len();
    let rows: Vec<ImportRow<A>> = records
        .iter()
        .filter(|record| record.is_object())
        .filter_map(|record| map(record))
        .map(|mapped| mapped.into_row(fetched_at))
        .collect();
    report.dropped += records.len() - rows.len();
    rows
}

/// Dedup, classify against the store and write what changed.
/// Returns the natural keys of the deduplicated batch.
pub(crate) async fn upsert_batch<A: Attributes>(
    pool: &SqlitePool,
    rows: Vec<ImportRow<A>>,
    options: &RunOptions,
    report: &mut SyncReport,
) -> Result<Vec<A::Key>, SyncError> {
    let (rows, stats) = dedup_last(rows, |row| row.key());
    report.deduplicated += stats.removed();
    let keys = rows.iter().map(|row| row.key()).collect();

    let existing = load_states(pool, &rows).await?;
    let plan = classify(rows, &existing);
    report.inserted += plan.inserted;
    report.updated += plan.updated;
    report.skipped_unchanged += plan.skipped;
    report.requeued += plan.requeued;

    if options.dry_run {
        tracing::info!(
            table = A::TABLE,
            rows = plan.rows.len(),
            "dry run, skipping write"
        );
    } else {
        report.written += write_rows(pool, &plan.rows, options.write_options()).await?;
    }

    Ok(keys)
}

pub async fn import_categories(
    pool: &SqlitePool,
    erp: &dyn ErpApi,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let records = erp
        .categories(options.limit.unwrap_or(CATEGORY_LIMIT))
        .await?;

    let mut report = SyncReport::default();
    let rows = map_records(&records, map_category, Utc::now(), &mut report);
    upsert_batch(pool, rows, options, &mut report).await?;

    tracing::info!(%report, "categories imported");
    Ok(report)
}

pub async fn import_products(
    pool: &SqlitePool,
    erp: &dyn ErpApi,
    query: &ProductQuery,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let mut records = erp.products(query).await?;
    if let Some(limit) = options.limit {
        records.truncate(limit);
    }

    let mut report = SyncReport::default();
    let rows = map_records(&records, map_product, Utc::now(), &mut report);
    upsert_batch(pool, rows, options, &mut report).await?;

    tracing::info!(%report, modified_after = %query.modified_after, "products imported");
    Ok(report)
}

/// Copies ERP stock onto known products.
///
/// `updated` counts changed levels, `skipped_unchanged` equal ones,
/// `skipped_orphans` unknown products and `dropped` invalid rows.
pub async fn import_stock(
    pool: &SqlitePool,
    erp: &dyn ErpApi,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let records = erp.stocks().await?;
    let repo = ProductRepository::new(pool.clone());

    let mut report = SyncReport {
        fetched: records.len(),
        ..Default::default()
    };
    let levels: Vec<_> = records.iter().filter_map(map_stock).collect();
    report.dropped = records.len() - levels.len();

    let (levels, stats) = dedup_last(levels, |level| level.ten_id);
    report.deduplicated = stats.removed();

    let current = repo.stock_levels().await?;
    let mut changes = Vec::new();
    for level in levels {
        match current.get(&level.ten_id) {
            None => report.skipped_orphans += 1,
            Some(Some(stock)) if *stock == level.quantity => report.skipped_unchanged += 1,
            Some(_) => changes.push((level.ten_id, level.quantity)),
        }
    }
    report.updated = changes.len();

    if options.dry_run {
        tracing::info!(changes = changes.len(), "dry run, skipping stock write");
    } else if !changes.is_empty() {
        repo.apply_stock(&changes).await?;
        report.written = changes.len();
    }

    tracing::info!(%report, "stock imported");
    Ok(report)
}
