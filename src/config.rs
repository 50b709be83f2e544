use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::clients::{HttpSettings, TenSettings, WooSettings};

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Transport tuning shared by both endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Total attempts per request
    pub attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 10,
            attempts: 3,
            retry_delay_ms: 250,
        }
    }
}

impl HttpConfig {
    fn settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            attempts: self.attempts.max(1),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// ERP endpoint configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenConfig {
    /// e.g. "http://erp.local:2223"
    pub base_url: Option<String>,
    /// Company whose web categories are imported
    pub company_id: Option<i64>,
    pub http: HttpConfig,
}

/// Storefront endpoint configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WooConfig {
    /// REST root, e.g. "https://shop.example.com/wp-json/wc/v3"
    pub base_url: Option<String>,
    pub consumer_key: Option<String>,
    #[serde(skip_serializing)]
    pub consumer_secret: Option<String>,
    pub http: HttpConfig,
}

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on hierarchy resolution passes
    pub max_passes: usize,
    /// Bind-parameter ceiling per upsert statement
    pub max_placeholders: usize,
    /// Lifetime of a run lease before another run may take it over
    pub lock_ttl_secs: u64,
    /// Default look-back window for ERP feeds filtered by modification date
    pub lookback_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_passes: 10,
            max_placeholders: 32_000,
            lock_ttl_secs: 3600,
            lookback_days: 14,
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub ten: TenConfig,
    pub woo: WooConfig,
    pub sync: SyncConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    ten: Option<TenConfig>,
    woo: Option<WooConfig>,
    sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("tenwoo.db");

        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut config_file = None;
        let mut ten = TenConfig::default();
        let mut woo = WooConfig::default();
        let mut sync = SyncConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            ten = file_config.ten.unwrap_or_default();
            woo = file_config.woo.unwrap_or_default();
            sync = file_config.sync.unwrap_or_default();
        }

        if let Ok(db_path) = std::env::var("TENWOO_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("TENWOO_TEN_BASE_URL") {
            ten.base_url = Some(url);
        }
        if let Ok(id) = std::env::var("TENWOO_TEN_COMPANY_ID") {
            let id = id
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("TENWOO_TEN_COMPANY_ID", id.clone()))?;
            ten.company_id = Some(id);
        }
        if let Ok(url) = std::env::var("TENWOO_WOO_BASE_URL") {
            woo.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("TENWOO_WOO_CONSUMER_KEY") {
            woo.consumer_key = Some(key);
        }
        if let Ok(secret) = std::env::var("TENWOO_WOO_CONSUMER_SECRET") {
            woo.consumer_secret = Some(secret);
        }

        Ok(Self {
            database_path,
            config_file,
            ten,
            woo,
            sync,
        })
    }

    /// ERP settings; fails if the endpoint is not configured.
    pub fn ten_settings(&self) -> Result<TenSettings, ConfigError> {
        Ok(TenSettings {
            base_url: required(&self.ten.base_url, "ten.base_url")?,
            company_id: self.ten.company_id,
            http: self.ten.http.settings(),
        })
    }

    /// ERP settings for category import, which also needs the company.
    pub fn ten_settings_with_company(&self) -> Result<TenSettings, ConfigError> {
        let settings = self.ten_settings()?;
        match settings.company_id {
            Some(id) if id > 0 => Ok(settings),
            _ => Err(ConfigError::Missing("ten.company_id")),
        }
    }

    /// Storefront settings; fails unless endpoint and both credentials are set.
    pub fn woo_settings(&self) -> Result<WooSettings, ConfigError> {
        Ok(WooSettings {
            base_url: required(&self.woo.base_url, "woo.base_url")?,
            consumer_key: required(&self.woo.consumer_key, "woo.consumer_key")?,
            consumer_secret: required(&self.woo.consumer_secret, "woo.consumer_secret")?,
            http: self.woo.http.settings(),
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/tenwoo/
    /// - macOS: ~/Library/Application Support/tenwoo/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tenwoo")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/tenwoo/
    /// - macOS: ~/Library/Application Support/tenwoo/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tenwoo")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or(ConfigError::Missing(name))
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Missing(name) => write!(f, "Missing required setting '{}'", name),
            ConfigError::Invalid(name, value) => {
                write!(f, "Invalid value '{}' for '{}'", value, name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config
            .database_path
            .value
            .to_string_lossy()
            .contains("tenwoo.db"));
        assert_eq!(config.database_path.source, ConfigSource::Default);
        assert_eq!(config.sync.max_passes, 10);
        assert_eq!(config.ten.http.attempts, 3);
        assert_eq!(config.ten.http.retry_delay_ms, 250);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: data/sync.db").unwrap();
        writeln!(file, "ten:").unwrap();
        writeln!(file, "  base_url: http://erp.local:2223").unwrap();
        writeln!(file, "  company_id: 4").unwrap();
        writeln!(file, "woo:").unwrap();
        writeln!(file, "  base_url: https://shop.test/wp-json/wc/v3").unwrap();
        writeln!(file, "  consumer_key: ck_1").unwrap();
        writeln!(file, "  consumer_secret: cs_1").unwrap();
        writeln!(file, "  http:").unwrap();
        writeln!(file, "    attempts: 5").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  max_passes: 4").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(
            config.database_path.value,
            temp_dir.path().join("data/sync.db")
        );
        assert_eq!(config.database_path.source, ConfigSource::File);
        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(config.sync.max_passes, 4);
        assert_eq!(config.sync.lock_ttl_secs, 3600);

        let ten = config.ten_settings_with_company().unwrap();
        assert_eq!(ten.base_url, "http://erp.local:2223");
        assert_eq!(ten.company_id, Some(4));

        let woo = config.woo_settings().unwrap();
        assert_eq!(woo.http.attempts, 5);
        assert_eq!(woo.http.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_endpoint_settings() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "ten:").unwrap();
        writeln!(file, "  base_url: http://erp.local:2223").unwrap();
        writeln!(file, "woo:").unwrap();
        writeln!(file, "  base_url: https://shop.test/wp-json/wc/v3").unwrap();
        writeln!(file, "  consumer_key: \"  \"").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config.ten_settings().is_ok());

        let err = config.ten_settings_with_company().unwrap_err();
        assert!(err.to_string().contains("ten.company_id"));

        let err = config.woo_settings().unwrap_err();
        assert!(err.to_string().contains("woo.consumer_key"));
    }

    #[test]
    fn test_secret_is_not_serialized() {
        let woo = WooConfig {
            consumer_secret: Some("cs_secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&woo).unwrap();
        assert!(!json.contains("cs_secret"));
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /from/file.db").unwrap();

        std::env::set_var("TENWOO_DATABASE_PATH", "/from/env.db");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.database_path.value, PathBuf::from("/from/env.db"));
        assert_eq!(config.database_path.source, ConfigSource::Environment);

        std::env::remove_var("TENWOO_DATABASE_PATH");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
