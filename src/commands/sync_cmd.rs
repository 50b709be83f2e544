use chrono::NaiveDateTime;
use clap::{Args, Subcommand};
use sqlx::SqlitePool;

use super::common::{parse_since, run_steps, Clients, CommandError, RunArgs};
use crate::config::Config;
use crate::sync::{Step, StepInputs};

/// Push pending local records out
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    target: SyncTarget,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Subcommand)]
enum SyncTarget {
    /// Categories to the storefront, parents before children
    Categories,

    /// Products to the storefront, matched by SKU
    Products,

    /// Changed stock levels to the storefront
    Stock,

    /// Storefront customers to the ERP, linked by email
    Customers {
        /// Export only this customer
        #[arg(long)]
        email: Option<String>,

        /// ERP customers modified after this date are used for linking
        #[arg(long, value_parser = parse_since)]
        modified_after: Option<NaiveDateTime>,
    },
}

impl SyncCommand {
    pub async fn run(&self, pool: SqlitePool, config: &Config) -> Result<(), CommandError> {
        let mut inputs = StepInputs::default();
        let step = match &self.target {
            SyncTarget::Categories => Step::SyncCategories,
            SyncTarget::Products => Step::SyncProducts,
            SyncTarget::Stock => Step::PushStock,
            SyncTarget::Customers {
                email,
                modified_after,
            } => {
                inputs.export_email = email.clone();
                inputs.erp_modified_after = *modified_after;
                Step::ExportCustomers
            }
        };

        let clients = Clients::for_steps(config, &[step])?;
        let engine = clients.engine(pool, config, self.run.options(config), inputs);
        run_steps(&engine, &[step], self.run.dry_run).await
    }
}
