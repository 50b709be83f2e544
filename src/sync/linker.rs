//! Cross-references between customers, addresses and orders, and the
//! customer export to the ERP.

use chrono::{NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

use super::import::{map_records, upsert_batch};
use super::{RunOptions, SyncError, SyncReport};
use crate::clients::{CustomerQuery, ErpApi, OrderQuery, StoreApi};
use crate::db::{ids_by_key, CustomerRepository};
use crate::mapping::ten::{customer_payload, map_erp_customer, CustomerResult, ErpCustomer};
use crate::mapping::woo::{map_addresses, map_customer, map_order, map_order_lines};
use crate::models::{Customer, ImportRow};

fn woo_id(record: &Value) -> Option<i64> {
    record.get("id").and_then(Value::as_i64).filter(|id| *id > 0)
}

/// Stores storefront customers.
pub async fn upsert_customers(
    pool: &SqlitePool,
    records: &[Value],
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();
    let rows = map_records(records, map_customer, Utc::now(), &mut report);
    upsert_batch(pool, rows, options, &mut report).await?;
    Ok(report)
}

/// Stores the billing and shipping addresses of customers already in the
/// store; addresses of unknown customers are skipped.
pub async fn upsert_addresses(
    pool: &SqlitePool,
    records: &[Value],
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport {
        fetched: records.len(),
        dropped: records.iter().filter(|r| woo_id(r).is_none()).count(),
        ..Default::default()
    };

    let woo_ids: Vec<i64> = records.iter().filter_map(woo_id).collect();
    let customers = CustomerRepository::new(pool.clone())
        .ids_by_woo_id(&woo_ids)
        .await?;

    stage_addresses(pool, records, &customers, options, &mut report).await?;
    Ok(report)
}

async fn stage_addresses(
    pool: &SqlitePool,
    records: &[Value],
    customers: &HashMap<i64, i64>,
    options: &RunOptions,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    let fetched_at = Utc::now();
    let mut rows = Vec::new();
    for record in records {
        let Some(woo_id) = woo_id(record) else {
            continue;
        };
        let Some(&customer_id) = customers.get(&woo_id) else {
            tracing::debug!(woo_id, "customer not in store, skipping its addresses");
            report.skipped_orphans += 1;
            continue;
        };
        rows.extend(map_addresses(record).into_iter().map(|mapped| {
            let mut row = mapped.into_row(fetched_at);
            row.attrs.customer_id = customer_id;
            row
        }));
    }

    upsert_batch(pool, rows, options, report).await?;
    Ok(())
}

/// Internal ids of `keys` in `table`. In a dry run, keys staged by this
/// step that are not stored yet get negative placeholders, so the phases
/// that depend on them classify as a live run would.
async fn resolve_ids(
    pool: &SqlitePool,
    table: &str,
    keys: &[i64],
    dry_run: bool,
) -> Result<HashMap<i64, i64>, sqlx::Error> {
    let mut ids = ids_by_key(pool, table, "woo_id", keys).await?;
    if dry_run {
        let mut next = -1;
        for key in keys {
            ids.entry(*key).or_insert_with(|| {
                let id = next;
                next -= 1;
                id
            });
        }
    }
    Ok(ids)
}

/// Customers and their addresses from one storefront read.
pub async fn import_customers(
    pool: &SqlitePool,
    store: &dyn StoreApi,
    query: &CustomerQuery,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let records = store.customers(query).await?;
    let mut report = SyncReport {
        fetched: records.len(),
        ..Default::default()
    };

    let rows = map_records(&records, map_customer, Utc::now(), &mut report);
    let keys = upsert_batch(pool, rows, options, &mut report).await?;
    let customers = resolve_ids(pool, "customers", &keys, options.dry_run).await?;
    stage_addresses(pool, &records, &customers, options, &mut report).await?;

    tracing::info!(%report, "customers imported");
    Ok(report)
}

pub async fn import_addresses(
    pool: &SqlitePool,
    store: &dyn StoreApi,
    query: &CustomerQuery,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let records = store.customers(query).await?;
    let report = upsert_addresses(pool, &records, options).await?;
    tracing::info!(%report, "addresses imported");
    Ok(report)
}

/// Imports orders in two phases: headers first, then the lines of every
/// header that resolved to an internal id. Orders of customers that are
/// not in the store are skipped with all their lines.
pub async fn import_orders(
    pool: &SqlitePool,
    store: &dyn StoreApi,
    query: &OrderQuery,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let records = store.orders(query).await?;
    let fetched_at = Utc::now();
    let mut report = SyncReport {
        fetched: records.len(),
        ..Default::default()
    };

    let customer_ids: Vec<i64> = records
        .iter()
        .filter_map(|r| r.get("customer_id").and_then(Value::as_i64))
        .filter(|id| *id > 0)
        .collect();
    let customers = CustomerRepository::new(pool.clone())
        .ids_by_woo_id(&customer_ids)
        .await?;

    let mut headers = Vec::new();
    let mut lines = Vec::new();
    for record in &records {
        let Some(mut order) = map_order(record) else {
            report.dropped += 1;
            continue;
        };
        let Some(&customer_id) = customers.get(&order.attrs.woo_customer_id) else {
            tracing::info!(
                woo_id = order.attrs.woo_id,
                woo_customer_id = order.attrs.woo_customer_id,
                "order customer not in store, skipping order"
            );
            report.skipped_orphans += 1;
            continue;
        };
        order.attrs.customer_id = customer_id;
        headers.push(order.into_row(fetched_at));

        let (order_lines, dropped) = map_order_lines(record);
        report.dropped += dropped;
        lines.extend(order_lines.into_iter().map(|line| line.into_row(fetched_at)));
    }

    // phase (a): headers
    let order_keys = upsert_batch(pool, headers, options, &mut report).await?;

    // phase (b): lines of resolved headers only
    let order_ids = resolve_ids(pool, "orders", &order_keys, options.dry_run).await?;
    let mut unresolved = 0;
    let lines: Vec<ImportRow<_>> = lines
        .into_iter()
        .filter_map(|mut line| match order_ids.get(&line.attrs.woo_order_id) {
            Some(&order_id) => {
                line.attrs.order_id = Some(order_id);
                Some(line)
            }
            None => {
                unresolved += 1;
                None
            }
        })
        .collect();
    if unresolved > 0 {
        tracing::warn!(lines = unresolved, "order lines without a stored order, dropped");
        report.skipped_orphans += unresolved;
    }
    upsert_batch(pool, lines, options, &mut report).await?;

    tracing::info!(%report, "orders imported");
    Ok(report)
}

/// Links store customers to existing ERP customers by email and creates
/// the selected ones the ERP does not know yet.
pub async fn export_customers(
    pool: &SqlitePool,
    erp: &dyn ErpApi,
    modified_after: NaiveDateTime,
    email: Option<&str>,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let repo = CustomerRepository::new(pool.clone());
    let records = erp.customers(modified_after).await?;

    let mut report = SyncReport {
        fetched: records.len(),
        ..Default::default()
    };
    let mut index: HashMap<String, ErpCustomer> = HashMap::new();
    for record in &records {
        match map_erp_customer(record) {
            Some(customer) => {
                index.insert(customer.email.clone(), customer);
            }
            None => report.dropped += 1,
        }
    }
    tracing::info!(
        erp_customers = records.len(),
        indexed = index.len(),
        %modified_after,
        "ERP customers indexed by email"
    );

    let mut linked: HashSet<i64> = HashSet::new();
    for customer in repo.unlinked().await? {
        if let Some(erp_customer) = lookup(&index, &customer) {
            link(&repo, &customer, erp_customer, options).await?;
            linked.insert(customer.id);
            report.linked += 1;
        }
    }

    let selected = repo
        .select_for_export(options.filter, options.limit, email)
        .await?;
    for customer in selected {
        if linked.contains(&customer.id) {
            continue;
        }
        if let Some(erp_customer) = lookup(&index, &customer) {
            link(&repo, &customer, erp_customer, options).await?;
            report.linked += 1;
            continue;
        }

        let addresses = repo.addresses(customer.id).await?;
        let payload = customer_payload(&customer, &addresses);
        if options.dry_run {
            tracing::info!(customer_id = customer.id, woo_id = customer.woo_id, "dry run, would create ERP customer");
            report.created += 1;
            continue;
        }

        let outcome = match erp.create_customer(&payload).await {
            Ok(raw) => accepted(CustomerResult::parse(&raw)),
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(result) => {
                let ten_id = result.valid_ten_id().unwrap_or_default();
                repo.mark_exported(
                    customer.id,
                    ten_id,
                    result.first_address_id(),
                    &result.address_ids(),
                )
                .await?;
                tracing::info!(customer_id = customer.id, ten_id, "ERP customer created");
                report.created += 1;
            }
            Err(message) => {
                tracing::error!(
                    customer_id = customer.id,
                    woo_id = customer.woo_id,
                    error = %message,
                    payload = %payload,
                    "ERP customer export failed"
                );
                repo.mark_error(customer.id, &message).await?;
                report.errored += 1;
            }
        }
    }

    tracing::info!(%report, "customers exported");
    Ok(report)
}

fn lookup<'a>(index: &'a HashMap<String, ErpCustomer>, customer: &Customer) -> Option<&'a ErpCustomer> {
    customer.match_email().and_then(|email| index.get(&email))
}

async fn link(
    repo: &CustomerRepository,
    customer: &Customer,
    erp_customer: &ErpCustomer,
    options: &RunOptions,
) -> Result<(), SyncError> {
    tracing::info!(
        customer_id = customer.id,
        ten_id = %erp_customer.ten_id,
        "customer linked to ERP by email"
    );
    if !options.dry_run {
        repo.link(
            customer.id,
            &erp_customer.ten_id,
            erp_customer.shipping_address_id.as_deref(),
        )
        .await?;
    }
    Ok(())
}

/// A create counts only with no exceptions and a real customer id.
fn accepted(result: CustomerResult) -> Result<CustomerResult, String> {
    if !result.exceptions.is_empty() {
        return Err(result.exceptions.join("; "));
    }
    match result.valid_ten_id() {
        Some(_) => Ok(result),
        None => Err(format!(
            "ERP returned no customer id ({})",
            result.ten_id.as_deref().unwrap_or("empty")
        )),
    }
}
