mod common;
mod config_cmd;
mod import;
mod records;
mod run;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use import::ImportCommand;
pub use records::RecordsCommand;
pub use run::RunCommand;
pub use sync_cmd::SyncCommand;
