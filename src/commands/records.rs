use clap::Args;
use sqlx::SqlitePool;

use super::common::CommandError;
use crate::db::{Entity, RecordAction};

/// Disable, enable, delete or restore one record
#[derive(Debug, Args)]
pub struct RecordsCommand {
    #[arg(value_enum)]
    entity: Entity,

    /// ERP id for categories and products, storefront id otherwise
    key: i64,

    #[arg(value_enum)]
    action: RecordAction,
}

impl RecordsCommand {
    pub async fn run(&self, pool: &SqlitePool) -> Result<(), CommandError> {
        if !self.action.apply(pool, self.entity, self.key).await? {
            return Err(CommandError::NotFound(format!(
                "{:?} {} (or nothing to change)",
                self.entity, self.key
            )));
        }
        println!("✓ {:?} {}: {:?}", self.entity, self.key, self.action);
        Ok(())
    }
}
