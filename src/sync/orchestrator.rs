//! Ordered step plans and the engine that runs them.

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::SqlitePool;
use std::fmt;

use super::catalog::{push_stock, sync_products};
use super::hierarchy::sync_categories;
use super::import::{import_categories, import_products, import_stock};
use super::lease::RunLease;
use super::linker::{export_customers, import_addresses, import_customers, import_orders};
use super::{RunOptions, SyncError, SyncReport};
use crate::clients::{CustomerQuery, ErpApi, OrderQuery, ProductQuery, StoreApi};

const PRODUCT_FEED_ITEMS: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Import everything, then push everything
    Full,
    /// Pull from the ERP and the storefront into the local store
    Import,
    /// Push pending local records to the storefront
    Sync,
}

impl Mode {
    pub fn plan(self) -> Vec<Step> {
        const IMPORT: [Step; 5] = [
            Step::ImportCategories,
            Step::ImportProducts,
            Step::ImportStock,
            Step::ImportCustomers,
            Step::ImportOrders,
        ];
        const SYNC: [Step; 3] = [Step::SyncCategories, Step::SyncProducts, Step::PushStock];

        match self {
            Mode::Import => IMPORT.to_vec(),
            Mode::Sync => SYNC.to_vec(),
            Mode::Full => IMPORT.iter().chain(SYNC.iter()).copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ImportCategories,
    ImportProducts,
    ImportStock,
    /// Customers and their addresses from one storefront read.
    ImportCustomers,
    ImportAddresses,
    ImportOrders,
    SyncCategories,
    SyncProducts,
    PushStock,
    ExportCustomers,
}

impl Step {
    /// Operation name, also used as the lease key.
    pub fn name(self) -> &'static str {
        match self {
            Step::ImportCategories => "import:categories",
            Step::ImportProducts => "import:products",
            Step::ImportStock => "import:stock",
            Step::ImportCustomers => "import:customers",
            Step::ImportAddresses => "import:addresses",
            Step::ImportOrders => "import:orders",
            Step::SyncCategories => "sync:categories",
            Step::SyncProducts => "sync:products",
            Step::PushStock => "sync:stock",
            Step::ExportCustomers => "sync:customers",
        }
    }

    /// True for steps that talk to the ERP; every other step talks to the storefront.
    pub fn needs_erp(self) -> bool {
        matches!(
            self,
            Step::ImportCategories | Step::ImportProducts | Step::ImportStock | Step::ExportCustomers
        )
    }

    pub fn needs_store(self) -> bool {
        !self.needs_erp()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Completed(SyncReport),
    Failed(String),
    Skipped(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run_step(&self, step: Step) -> StepOutcome;
}

/// Runs `steps` in order. After the first failure the remaining steps are
/// not run and come back as `Skipped`, one outcome per step.
pub async fn run_pipeline(runner: &dyn StepRunner, steps: &[Step]) -> Vec<(Step, StepOutcome)> {
    let mut outcomes = Vec::with_capacity(steps.len());
    let mut failed = false;
    for &step in steps {
        if failed {
            outcomes.push((step, StepOutcome::Skipped("previous step failed".to_string())));
            continue;
        }
        let outcome = runner.run_step(step).await;
        if outcome.is_failure() {
            tracing::error!(step = step.name(), "step failed, stopping");
            failed = true;
        }
        outcomes.push((step, outcome));
    }
    outcomes
}

/// Step-specific query windows.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInputs {
    pub customers: CustomerQuery,
    pub orders: OrderQuery,
    /// Defaults to the configured look-back window.
    pub products_modified_after: Option<NaiveDateTime>,
    pub product_page: u32,
    pub product_items: u32,
    pub export_email: Option<String>,
    pub erp_modified_after: Option<NaiveDateTime>,
}

impl Default for StepInputs {
    fn default() -> Self {
        Self {
            customers: CustomerQuery::default(),
            orders: OrderQuery::default(),
            products_modified_after: None,
            product_page: 0,
            product_items: PRODUCT_FEED_ITEMS,
            export_email: None,
            erp_modified_after: None,
        }
    }
}

/// Runs steps against the local store and the clients it was given.
/// A step whose client is missing fails before it takes its lease.
pub struct Engine<'a> {
    pool: SqlitePool,
    erp: Option<&'a dyn ErpApi>,
    store: Option<&'a dyn StoreApi>,
    options: RunOptions,
    inputs: StepInputs,
    lock_ttl: Duration,
}

impl<'a> Engine<'a> {
    pub fn new(pool: SqlitePool, options: RunOptions, inputs: StepInputs, lock_ttl: Duration) -> Self {
        Self {
            pool,
            erp: None,
            store: None,
            options,
            inputs,
            lock_ttl,
        }
    }

    pub fn with_erp(mut self, erp: &'a dyn ErpApi) -> Self {
        self.erp = Some(erp);
        self
    }

    pub fn with_store(mut self, store: &'a dyn StoreApi) -> Self {
        self.store = Some(store);
        self
    }

    fn since(&self, explicit: Option<NaiveDateTime>) -> NaiveDateTime {
        explicit.unwrap_or_else(|| {
            Utc::now().naive_utc() - Duration::days(self.options.lookback_days)
        })
    }

    async fn execute(&self, step: Step) -> Result<SyncReport, SyncError> {
        let pool = &self.pool;
        let options = &self.options;

        match (step, self.erp, self.store) {
            (Step::ImportCategories, Some(erp), _) => import_categories(pool, erp, options).await,
            (Step::ImportProducts, Some(erp), _) => {
                let query = ProductQuery {
                    modified_after: self.since(self.inputs.products_modified_after),
                    items: self.inputs.product_items,
                    page: self.inputs.product_page,
                };
                import_products(pool, erp, &query, options).await
            }
            (Step::ImportStock, Some(erp), _) => import_stock(pool, erp, options).await,
            (Step::ImportCustomers, _, Some(store)) => {
                import_customers(pool, store, &self.inputs.customers, options).await
            }
            (Step::ImportAddresses, _, Some(store)) => {
                import_addresses(pool, store, &self.inputs.customers, options).await
            }
            (Step::ImportOrders, _, Some(store)) => {
                import_orders(pool, store, &self.inputs.orders, options).await
            }
            (Step::SyncCategories, _, Some(store)) => sync_categories(pool, store, options).await,
            (Step::SyncProducts, _, Some(store)) => sync_products(pool, store, options).await,
            (Step::PushStock, _, Some(store)) => push_stock(pool, store, options).await,
            (Step::ExportCustomers, Some(erp), _) => {
                let since = self.since(self.inputs.erp_modified_after);
                let email = self.inputs.export_email.as_deref();
                export_customers(pool, erp, since, email, options).await
            }
            (step, _, _) => Err(crate::clients::ClientError::Config(format!(
                "no client configured for {}",
                step
            ))
            .into()),
        }
    }
}

#[async_trait]
impl<'a> StepRunner for Engine<'a> {
    async fn run_step(&self, step: Step) -> StepOutcome {
        let missing = if step.needs_erp() && self.erp.is_none() {
            Some("ERP client not configured")
        } else if step.needs_store() && self.store.is_none() {
            Some("storefront client not configured")
        } else {
            None
        };
        if let Some(reason) = missing {
            tracing::error!(step = step.name(), reason, "step cannot run");
            return StepOutcome::Failed(reason.to_string());
        }

        let lease = if self.options.dry_run {
            None
        } else {
            match RunLease::acquire(&self.pool, step.name(), self.lock_ttl).await {
                Ok(lease) => Some(lease),
                Err(e) => return StepOutcome::Failed(e.to_string()),
            }
        };

        tracing::info!(step = step.name(), dry_run = self.options.dry_run, "step started");
        let result = self.execute(step).await;

        if let Some(lease) = lease {
            if let Err(e) = lease.release().await {
                tracing::warn!(step = step.name(), error = %e, "failed to release lease");
            }
        }

        match result {
            Ok(report) if report.succeeded() => StepOutcome::Completed(report),
            Ok(report) => StepOutcome::Failed(format!(
                "{} record(s) failed ({})",
                report.errored, report
            )),
            Err(e) => {
                tracing::error!(step = step.name(), error = %e, "step aborted");
                StepOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::db::test_support::setup_db;
    use crate::sync::fakes::{FakeErp, FakeStore};

    struct ScriptedRunner {
        failing: Option<Step>,
        skipped: Option<Step>,
        seen: Mutex<Vec<Step>>,
    }

    #[async_trait]
    impl StepRunner for ScriptedRunner {
        async fn run_step(&self, step: Step) -> StepOutcome {
            self.seen.lock().unwrap().push(step);
            if Some(step) == self.failing {
                StepOutcome::Failed("boom".to_string())
            } else if Some(step) == self.skipped {
                StepOutcome::Skipped("not configured".to_string())
            } else {
                StepOutcome::Completed(SyncReport::default())
            }
        }
    }

    #[test]
    fn test_plans() {
        assert_eq!(
            Mode::Sync.plan(),
            vec![Step::SyncCategories, Step::SyncProducts, Step::PushStock]
        );
        let full = Mode::Full.plan();
        assert_eq!(full.len(), 8);
        assert_eq!(full[0], Step::ImportCategories);
        assert_eq!(full[4], Step::ImportOrders);
        assert_eq!(full[5], Step::SyncCategories);
        assert_eq!(Step::PushStock.name(), "sync:stock");
    }

    #[tokio::test]
    async fn test_pipeline_stops_at_first_failure() {
        let runner = ScriptedRunner {
            failing: Some(Step::ImportStock),
            skipped: Some(Step::ImportProducts),
            seen: Mutex::new(Vec::new()),
        };

        let outcomes = run_pipeline(&runner, &Mode::Full.plan()).await;

        assert_eq!(outcomes.len(), 8);
        assert!(matches!(outcomes[1].1, StepOutcome::Skipped(_)));
        assert_eq!(outcomes[2], (Step::ImportStock, StepOutcome::Failed("boom".to_string())));
        assert!(outcomes[3..]
            .iter()
            .all(|(_, outcome)| *outcome == StepOutcome::Skipped("previous step failed".to_string())));
        assert_eq!(runner.seen.lock().unwrap().len(), 3);
    }

    fn erp() -> FakeErp {
        FakeErp {
            categories: vec![
                json!({"IdNumero": 1, "Codigo": "C1", "Nombre": "Frutas", "CategoriaPadre": 0}),
                json!({"IdNumero": 2, "Codigo": "C2", "Nombre": "Citricos", "CategoriaPadre": 1}),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_engine_dry_run_writes_nothing() {
        let db = setup_db().await;
        let erp = erp();
        let store = FakeStore::default();
        let options = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let engine = Engine::new(db.pool.clone(), options, StepInputs::default(), Duration::hours(1))
            .with_erp(&erp)
            .with_store(&store);

        let outcomes = run_pipeline(&engine, &Mode::Full.plan()).await;

        assert_eq!(outcomes.len(), 8);
        assert!(outcomes
            .iter()
            .all(|(_, outcome)| matches!(outcome, StepOutcome::Completed(_))));
        assert!(store.writes().is_empty());
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_engine_import_then_sync() {
        let db = setup_db().await;
        let erp = erp();
        let store = FakeStore::default();
        let engine = Engine::new(
            db.pool.clone(),
            RunOptions::default(),
            StepInputs::default(),
            Duration::hours(1),
        )
        .with_erp(&erp)
        .with_store(&store);

        let imported = engine.run_step(Step::ImportCategories).await;
        assert!(matches!(imported, StepOutcome::Completed(ref r) if r.inserted == 2));

        let synced = engine.run_step(Step::SyncCategories).await;
        assert!(matches!(synced, StepOutcome::Completed(ref r) if r.created == 2));
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_client_fails_step() {
        let db = setup_db().await;
        let erp = erp();
        let engine = Engine::new(
            db.pool.clone(),
            RunOptions::default(),
            StepInputs::default(),
            Duration::hours(1),
        )
        .with_erp(&erp);

        let outcomes = run_pipeline(&engine, &Mode::Sync.plan()).await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes[0].1,
            StepOutcome::Failed("storefront client not configured".to_string())
        );
        assert!(outcomes[1..]
            .iter()
            .all(|(_, outcome)| matches!(outcome, StepOutcome::Skipped(_))));

        // no lease was left behind
        let (locks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_locks")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(locks, 0);
    }

    #[tokio::test]
    async fn test_full_plan_without_storefront_stops_before_writing() {
        let db = setup_db().await;
        let erp = erp();
        let engine = Engine::new(
            db.pool.clone(),
            RunOptions::default(),
            StepInputs::default(),
            Duration::hours(1),
        )
        .with_erp(&erp);

        let outcomes = run_pipeline(&engine, &Mode::Full.plan()).await;

        assert_eq!(outcomes.len(), 8);
        assert!(outcomes.iter().any(|(_, outcome)| outcome.is_failure()));
        assert!(matches!(outcomes[3].1, StepOutcome::Failed(_)));
        assert!(outcomes[4..]
            .iter()
            .all(|(_, outcome)| matches!(outcome, StepOutcome::Skipped(_))));
    }

    #[tokio::test]
    async fn test_held_lease_fails_step() {
        let db = setup_db().await;
        let erp = erp();
        let held = RunLease::acquire(&db.pool, "import:categories", Duration::hours(1))
            .await
            .unwrap();
        let engine = Engine::new(
            db.pool.clone(),
            RunOptions::default(),
            StepInputs::default(),
            Duration::hours(1),
        )
        .with_erp(&erp);

        let outcome = engine.run_step(Step::ImportCategories).await;
        assert!(matches!(outcome, StepOutcome::Failed(ref reason) if reason.contains("already running")));
        held.release().await.unwrap();
    }
}
