//! Reconciliation engine.
//!
//! Imports pull records from the ERP and the storefront into the local
//! store; syncs push pending store records out. Every step works on one
//! bounded window and reports what it did in a [`SyncReport`].

mod catalog;
mod diff;
mod hierarchy;
mod import;
mod lease;
mod linker;
mod orchestrator;
mod report;
mod writer;

#[cfg(test)]
pub(crate) mod fakes;

pub use catalog::{format_price, push_stock, sync_products};
pub use diff::{classify, dedup_last, DedupStats, DiffPlan};
pub use hierarchy::{sync_categories, HierarchyResolver};
pub use import::{import_categories, import_products, import_stock};
pub use lease::{LeaseError, RunLease};
pub use linker::{
    export_customers, import_addresses, import_customers, import_orders, upsert_addresses,
    upsert_customers,
};
pub use orchestrator::{run_pipeline, Engine, Mode, Step, StepInputs, StepOutcome, StepRunner};
pub use report::SyncReport;
pub use writer::{batch_size, write_rows, UpsertRow, WriteError, WriteOptions};

use crate::clients::ClientError;
use crate::config::SyncConfig;
use crate::models::StatusFilter;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Lease(#[from] LeaseError),
}

/// Operator switches shared by every step.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Read and classify, but write nothing anywhere.
    pub dry_run: bool,
    pub filter: StatusFilter,
    pub limit: Option<usize>,
    pub chunk: Option<usize>,
    pub max_placeholders: usize,
    pub max_passes: usize,
    pub lookback_days: i64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl RunOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            dry_run: false,
            filter: StatusFilter::default(),
            limit: None,
            chunk: None,
            max_placeholders: config.max_placeholders,
            max_passes: config.max_passes.max(1),
            lookback_days: config.lookback_days,
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            chunk: self.chunk,
            max_placeholders: self.max_placeholders,
        }
    }
}
