//! Flags, client setup and outcome printing shared by the step commands.

use chrono::{NaiveDate, NaiveDateTime};
use clap::Args;
use sqlx::SqlitePool;

use crate::clients::{ClientError, TenClient, WooClient};
use crate::config::{Config, ConfigError};
use crate::models::StatusFilter;
use crate::sync::{run_pipeline, Engine, RunOptions, Step, StepInputs, StepOutcome};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Read and classify, but write nothing locally or remotely
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Maximum records handled per step
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    /// Rows per upsert statement
    #[arg(long, global = true)]
    pub chunk: Option<usize>,

    /// Records to (re)select for sync: pending, error or all
    #[arg(long, global = true, default_value = "pending")]
    pub only: StatusFilter,
}

impl RunArgs {
    pub fn options(&self, config: &Config) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            filter: self.only,
            limit: self.limit,
            chunk: self.chunk,
            ..RunOptions::from_config(&config.sync)
        }
    }
}

/// Accepts `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_since(s: &str) -> Result<NaiveDateTime, String> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("Invalid date '{}'. Use YYYY-MM-DD or 'YYYY-MM-DD HH:MM:SS'", s))
}

/// Clients for one invocation; a side is absent only when no step needs it.
#[derive(Default)]
pub struct Clients {
    pub erp: Option<TenClient>,
    pub store: Option<WooClient>,
}

impl Clients {
    /// Builds every client `steps` need. A missing or invalid setting for
    /// any of them fails here, before a single step runs.
    pub fn for_steps(config: &Config, steps: &[Step]) -> Result<Self, CommandError> {
        let erp = if steps.iter().any(|s| s.needs_erp()) {
            let settings = if steps.contains(&Step::ImportCategories) {
                config.ten_settings_with_company()?
            } else {
                config.ten_settings()?
            };
            Some(TenClient::new(&settings)?)
        } else {
            None
        };
        let store = if steps.iter().any(|s| s.needs_store()) {
            Some(WooClient::new(&config.woo_settings()?)?)
        } else {
            None
        };
        Ok(Self { erp, store })
    }

    pub fn engine(
        &self,
        pool: SqlitePool,
        config: &Config,
        options: RunOptions,
        inputs: StepInputs,
    ) -> Engine<'_> {
        let ttl = chrono::Duration::seconds(config.sync.lock_ttl_secs as i64);
        let mut engine = Engine::new(pool, options, inputs, ttl);
        if let Some(erp) = &self.erp {
            engine = engine.with_erp(erp);
        }
        if let Some(store) = &self.store {
            engine = engine.with_store(store);
        }
        engine
    }
}

/// Runs `steps`, printing one line per step.
pub async fn run_steps(engine: &Engine<'_>, steps: &[Step], dry_run: bool) -> Result<(), CommandError> {
    if dry_run {
        println!("Dry run: nothing will be written.");
    }

    let outcomes = run_pipeline(engine, steps).await;
    let mut failed = 0;
    for (step, outcome) in &outcomes {
        match outcome {
            StepOutcome::Completed(report) => println!("✓ {}: {}", step, report),
            StepOutcome::Skipped(reason) => println!("- {}: skipped ({})", step, reason),
            StepOutcome::Failed(reason) => {
                failed += 1;
                println!("✗ {}: {}", step, reason);
            }
        }
    }

    if failed > 0 {
        return Err(CommandError::StepsFailed(failed));
    }
    Ok(())
}

/// Errors from the operator commands
#[derive(Debug)]
pub enum CommandError {
    Config(ConfigError),
    Client(ClientError),
    Database(sqlx::Error),
    StepsFailed(usize),
    NotFound(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Config(e) => write!(f, "{}", e),
            CommandError::Client(e) => write!(f, "{}", e),
            CommandError::Database(e) => write!(f, "Database error: {}", e),
            CommandError::StepsFailed(n) => write!(f, "{} step(s) failed", n),
            CommandError::NotFound(what) => write!(f, "{} not found", what),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Config(e) => Some(e),
            CommandError::Client(e) => Some(e),
            CommandError::Database(e) => Some(e),
            CommandError::StepsFailed(_) | CommandError::NotFound(_) => None,
        }
    }
}

impl From<ConfigError> for CommandError {
    fn from(e: ConfigError) -> Self {
        CommandError::Config(e)
    }
}

impl From<ClientError> for CommandError {
    fn from(e: ClientError) -> Self {
        CommandError::Client(e)
    }
}

impl From<sqlx::Error> for CommandError {
    fn from(e: sqlx::Error) -> Self {
        CommandError::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Mode;

    #[test]
    fn test_parse_since() {
        assert_eq!(
            parse_since("2024-03-01").unwrap().to_string(),
            "2024-03-01 00:00:00"
        );
        assert_eq!(
            parse_since("2024-03-01 08:30:00").unwrap().to_string(),
            "2024-03-01 08:30:00"
        );
        assert!(parse_since("yesterday").is_err());
    }

    fn bare_config() -> Config {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::load(Some(temp_dir.path().join("none.yaml"))).unwrap();
        config.ten.base_url = Some("http://erp.local:2223".to_string());
        config.ten.company_id = Some(4);
        config.woo.base_url = None;
        config.woo.consumer_key = None;
        config.woo.consumer_secret = None;
        config
    }

    #[test]
    fn test_plan_needs_every_client_up_front() {
        let mut config = bare_config();

        let err = Clients::for_steps(&config, &Mode::Full.plan()).err().unwrap();
        assert!(matches!(err, CommandError::Config(ConfigError::Missing("woo.base_url"))));

        config.woo.base_url = Some("https://shop.test/wp-json/wc/v3".to_string());
        config.woo.consumer_key = Some("ck_1".to_string());
        config.woo.consumer_secret = Some("cs_1".to_string());
        let clients = Clients::for_steps(&config, &Mode::Full.plan()).unwrap();
        assert!(clients.erp.is_some());
        assert!(clients.store.is_some());
    }

    #[test]
    fn test_single_step_builds_only_its_client() {
        let mut config = bare_config();

        let clients = Clients::for_steps(&config, &[Step::ImportStock]).unwrap();
        assert!(clients.erp.is_some());
        assert!(clients.store.is_none());

        config.ten.company_id = None;
        assert!(Clients::for_steps(&config, &[Step::ImportStock]).is_ok());
        let err = Clients::for_steps(&config, &[Step::ImportCategories]).err().unwrap();
        assert!(err.to_string().contains("ten.company_id"));
    }
}
