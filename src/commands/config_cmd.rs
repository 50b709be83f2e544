use clap::{Args, Subcommand, ValueEnum};

use crate::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn or_unset<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

/// First four characters of a credential.
fn masked(value: &Option<String>) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => format!("{}...", v.chars().take(4).collect::<String>()),
        _ => "(not set)".to_string(),
    }
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!(
                            "database_path: {}",
                            config.database_path.value.display()
                        );
                        println!("  source: {}", config.database_path.source);
                        println!();

                        println!("ten.base_url: {}", or_unset(&config.ten.base_url));
                        println!("ten.company_id: {}", or_unset(&config.ten.company_id));
                        println!();

                        println!("woo.base_url: {}", or_unset(&config.woo.base_url));
                        println!("woo.consumer_key: {}", masked(&config.woo.consumer_key));
                        println!(
                            "woo.consumer_secret: {}",
                            if config.woo.consumer_secret.is_some() {
                                "(set)"
                            } else {
                                "(not set)"
                            }
                        );
                        println!();

                        println!("sync.max_passes: {}", config.sync.max_passes);
                        println!("sync.max_placeholders: {}", config.sync.max_placeholders);
                        println!("sync.lock_ttl_secs: {}", config.sync.lock_ttl_secs);
                        println!("sync.lookback_days: {}", config.sync.lookback_days);
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_are_masked() {
        assert_eq!(masked(&Some("ck_1234567890".to_string())), "ck_1...");
        assert_eq!(masked(&None), "(not set)");
        assert_eq!(or_unset(&Some(4)), "4");
    }
}
