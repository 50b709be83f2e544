//! Product and stock push to the storefront.

use sqlx::SqlitePool;

use super::{RunOptions, SyncError, SyncReport};
use crate::clients::{ClientError, ProductPayload, StoreApi};
use crate::db::ProductRepository;
use crate::models::Product;

enum Target {
    Known(i64),
    Linked(i64),
    Create,
}

/// Storefront price string: half-up rounded to cents, trailing zeros
/// trimmed. Comma decimals are accepted.
pub fn format_price(raw: &str) -> Option<String> {
    let normalized = raw.trim().replace(',', ".");
    let (negative, digits) = match normalized.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, normalized.as_str()),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut decimals: Vec<u64> = fraction.bytes().map(|b| u64::from(b - b'0')).collect();
    decimals.resize(decimals.len().max(3), 0);

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut cents = whole.checked_mul(100)?.checked_add(decimals[0] * 10 + decimals[1])?;
    if decimals[2] >= 5 {
        cents = cents.checked_add(1)?;
    }

    let units = cents / 100;
    let rest = cents % 100;
    let mut price = match rest {
        0 => units.to_string(),
        r if r % 10 == 0 => format!("{}.{}", units, r / 10),
        r => format!("{}.{:02}", units, r),
    };
    if negative && cents > 0 {
        price.insert(0, '-');
    }
    Some(price)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn product_payload(product: &Product, sku: &str) -> ProductPayload {
    ProductPayload {
        name: Some(non_empty(&product.web_name).unwrap_or_else(|| sku.to_string())),
        kind: Some("simple".to_string()),
        status: Some("publish".to_string()),
        sku: Some(sku.to_string()),
        description: non_empty(&product.long_description),
        short_description: non_empty(&product.short_description),
        regular_price: product.price.as_deref().and_then(format_price),
        manage_stock: Some(product.stock_control),
        stock_quantity: None,
        weight: non_empty(&product.weight),
    }
}

/// Creates, links or updates the selected products in the storefront,
/// matched by SKU.
pub async fn sync_products(
    pool: &SqlitePool,
    store: &dyn StoreApi,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let repo = ProductRepository::new(pool.clone());
    let products = repo.select_for_sync(options.filter, options.limit).await?;
    let mut report = SyncReport {
        fetched: products.len(),
        ..Default::default()
    };

    for product in &products {
        let Some(sku) = product.sku() else {
            tracing::warn!(ten_id = product.ten_id, "product has no SKU");
            report.errored += 1;
            if !options.dry_run {
                repo.mark_error(product.ten_id, "product has no SKU (ERP code)")
                    .await?;
            }
            continue;
        };

        match push_product(&repo, store, product, sku, options, &mut report).await {
            Ok(()) => {}
            Err(SyncError::Client(e)) => {
                tracing::error!(ten_id = product.ten_id, sku, error = %e, "product sync failed");
                report.errored += 1;
                if !options.dry_run {
                    repo.mark_error(product.ten_id, &e.to_string()).await?;
                }
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(%report, "products synced");
    Ok(report)
}

async fn push_product(
    repo: &ProductRepository,
    store: &dyn StoreApi,
    product: &Product,
    sku: &str,
    options: &RunOptions,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    let mut payload = product_payload(product, sku);

    let (target, remote_description) = match product.woo_id {
        Some(id) => (Target::Known(id), store.product(id).await?.description),
        None => {
            let found = store.products_by_sku(sku).await?;
            match found.into_iter().find(|p| p.id > 0) {
                Some(remote) => (Target::Linked(remote.id), remote.description),
                None => (Target::Create, String::new()),
            }
        }
    };
    // descriptions edited in the storefront win
    if !remote_description.trim().is_empty() {
        payload.description = None;
    }

    match target {
        Target::Known(id) | Target::Linked(id) => {
            if !options.dry_run {
                store.update_product(id, &payload).await?;
                repo.mark_synced(product.ten_id, id).await?;
            }
            if matches!(target, Target::Known(_)) {
                report.updated += 1;
            } else {
                tracing::info!(ten_id = product.ten_id, sku, woo_id = id, "product linked by SKU");
                report.linked += 1;
            }
        }
        Target::Create => {
            if !options.dry_run {
                let created = store.create_product(&payload).await?;
                if created.id <= 0 {
                    return Err(ClientError::shape("products", "created product has no id").into());
                }
                repo.mark_synced(product.ten_id, created.id).await?;
                tracing::info!(ten_id = product.ten_id, sku, woo_id = created.id, "product created");
            }
            report.created += 1;
        }
    }
    Ok(())
}

/// Pushes stock levels that changed since the last push.
pub async fn push_stock(
    pool: &SqlitePool,
    store: &dyn StoreApi,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let repo = ProductRepository::new(pool.clone());
    let products = repo.stock_changes(options.limit).await?;
    let mut report = SyncReport {
        fetched: products.len(),
        ..Default::default()
    };

    for product in &products {
        let (Some(woo_id), Some(quantity)) = (product.woo_id, product.stock) else {
            continue;
        };
        if options.dry_run {
            report.updated += 1;
            continue;
        }

        let payload = ProductPayload {
            manage_stock: Some(true),
            stock_quantity: Some(quantity),
            ..Default::default()
        };
        match store.update_product(woo_id, &payload).await {
            Ok(_) => {
                repo.mark_stock_pushed(product.ten_id, quantity).await?;
                report.updated += 1;
            }
            Err(e) => {
                tracing::error!(ten_id = product.ten_id, woo_id, quantity, error = %e, "stock update failed");
                repo.record_error(product.ten_id, &e.to_string()).await?;
                report.errored += 1;
            }
        }
    }

    tracing::info!(%report, "stock pushed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::RemoteProduct;
    use crate::db::product_repo::tests::insert_product;
    use crate::db::test_support::setup_db;
    use crate::models::SyncStatus;
    use crate::sync::fakes::FakeStore;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("10.5000").as_deref(), Some("10.5"));
        assert_eq!(format_price("12").as_deref(), Some("12"));
        assert_eq!(format_price("3,999").as_deref(), Some("4"));
        assert_eq!(format_price("0.005").as_deref(), Some("0.01"));
        assert_eq!(format_price("19.95").as_deref(), Some("19.95"));
        assert_eq!(format_price(".5").as_deref(), Some("0.5"));
        assert_eq!(format_price("-2.50").as_deref(), Some("-2.5"));
        assert_eq!(format_price("-0.001").as_deref(), Some("0"));
        assert_eq!(format_price("abc"), None);
        assert_eq!(format_price(""), None);
    }

    fn remote(id: i64, sku: &str, description: &str) -> RemoteProduct {
        RemoteProduct {
            id,
            sku: sku.to_string(),
            description: description.to_string(),
        }
    }

    async fn status(pool: &SqlitePool, ten_id: i64) -> (String, Option<i64>, Option<String>) {
        sqlx::query_as("SELECT sync_status, woo_id, last_error FROM products WHERE ten_id = ?")
            .bind(ten_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sync_products_create_link_update() {
        let db = setup_db().await;
        insert_product(&db.pool, 1, Some("NEW"), None, SyncStatus::Pending).await;
        insert_product(&db.pool, 2, Some("OLD"), None, SyncStatus::Pending).await;
        insert_product(&db.pool, 3, Some("KNOWN"), Some(30), SyncStatus::Pending).await;
        insert_product(&db.pool, 4, None, None, SyncStatus::Pending).await;
        let store = FakeStore::with_products(vec![
            remote(20, "OLD", "<p>edited in shop</p>"),
            remote(30, "KNOWN", ""),
        ]);

        let report = sync_products(&db.pool, &store, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.linked, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.errored, 1);

        assert_eq!(status(&db.pool, 2).await, ("synced".to_string(), Some(20), None));
        assert_eq!(status(&db.pool, 3).await.0, "synced");
        assert_eq!(status(&db.pool, 4).await.0, "error");
        assert!(status(&db.pool, 1).await.1.unwrap() > 0);

        let state = store.state.lock().unwrap();
        let (_, linked) = state.product_updates.iter().find(|(id, _)| *id == 20).unwrap();
        assert_eq!(linked.description, None);
        assert_eq!(linked.regular_price.as_deref(), Some("10.5"));
        assert_eq!(linked.kind.as_deref(), Some("simple"));
    }

    #[tokio::test]
    async fn test_sync_products_dry_run_writes_nothing() {
        let db = setup_db().await;
        insert_product(&db.pool, 1, Some("NEW"), None, SyncStatus::Pending).await;
        let store = FakeStore::default();
        let options = RunOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = sync_products(&db.pool, &store, &options).await.unwrap();

        assert_eq!(report.created, 1);
        assert!(store.writes().is_empty());
        assert_eq!(status(&db.pool, 1).await.0, "pending");
    }

    #[tokio::test]
    async fn test_push_stock_only_sends_drifted_levels() {
        let db = setup_db().await;
        insert_product(&db.pool, 1, Some("A"), Some(11), SyncStatus::Synced).await;
        insert_product(&db.pool, 2, Some("B"), Some(22), SyncStatus::Synced).await;
        insert_product(&db.pool, 3, Some("C"), Some(99), SyncStatus::Synced).await;
        let repo = ProductRepository::new(db.pool.clone());
        repo.apply_stock(&[(1, 5), (2, 8), (3, 1)]).await.unwrap();
        repo.mark_stock_pushed(2, 8).await.unwrap();
        let store = FakeStore::with_products(vec![remote(11, "A", ""), remote(22, "B", "")]);

        let report = push_stock(&db.pool, &store, &RunOptions::default())
            .await
            .unwrap();

        // product 3 is unknown to the storefront
        assert_eq!(report.updated, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(store.writes(), vec!["PUT products/11", "PUT products/99"]);

        let state = store.state.lock().unwrap();
        assert_eq!(state.product_updates[0].1.stock_quantity, Some(5));
        assert_eq!(state.product_updates[0].1.manage_stock, Some(true));
        drop(state);

        let again = push_stock(&db.pool, &store, &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(again.fetched, 1);
    }
}
