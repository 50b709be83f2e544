use chrono::NaiveDateTime;
use clap::Args;
use sqlx::SqlitePool;

use super::common::{parse_since, run_steps, Clients, CommandError, RunArgs};
use crate::config::Config;
use crate::sync::{Mode, StepInputs};

/// Run a whole plan of steps, stopping at the first failure
#[derive(Debug, Args)]
pub struct RunCommand {
    #[arg(long, value_enum, default_value = "full")]
    mode: Mode,

    /// Product feed lower bound (default: look-back window)
    #[arg(long, value_parser = parse_since)]
    modified_after: Option<NaiveDateTime>,

    #[command(flatten)]
    run: RunArgs,
}

impl RunCommand {
    pub async fn run(&self, pool: SqlitePool, config: &Config) -> Result<(), CommandError> {
        let plan = self.mode.plan();
        let clients = Clients::for_steps(config, &plan)?;
        let inputs = StepInputs {
            products_modified_after: self.modified_after,
            ..Default::default()
        };

        tracing::info!(mode = ?self.mode, steps = plan.len(), "run started");
        let engine = clients.engine(pool, config, self.run.options(config), inputs);
        run_steps(&engine, &plan, self.run.dry_run).await
    }
}
