use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a record with respect to the downstream system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Error,
    Disabled,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
            SyncStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "error" => Ok(SyncStatus::Error),
            "disabled" => Ok(SyncStatus::Disabled),
            _ => Err(format!(
                "Invalid sync status '{}'. Valid options: pending, synced, error, disabled",
                s
            )),
        }
    }
}

/// Operator filter over the statuses eligible for (re)processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    Pending,
    Error,
    All,
}

impl StatusFilter {
    pub fn statuses(&self) -> &'static [SyncStatus] {
        match self {
            StatusFilter::Pending => &[SyncStatus::Pending],
            StatusFilter::Error => &[SyncStatus::Error],
            StatusFilter::All => &[SyncStatus::Pending, SyncStatus::Error],
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::Pending => write!(f, "pending"),
            StatusFilter::Error => write!(f, "error"),
            StatusFilter::All => write!(f, "all"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StatusFilter::Pending),
            "error" => Ok(StatusFilter::Error),
            "all" => Ok(StatusFilter::All),
            _ => Err(format!(
                "Invalid filter '{}'. Valid options: pending, error, all",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_display() {
        assert_eq!(format!("{}", SyncStatus::Pending), "pending");
        assert_eq!(format!("{}", SyncStatus::Synced), "synced");
        assert_eq!(format!("{}", SyncStatus::Error), "error");
        assert_eq!(format!("{}", SyncStatus::Disabled), "disabled");
    }

    #[test]
    fn test_sync_status_from_str() {
        assert_eq!(SyncStatus::from_str("SYNCED").unwrap(), SyncStatus::Synced);
        assert_eq!(SyncStatus::from_str("error").unwrap(), SyncStatus::Error);
        assert!(SyncStatus::from_str("done").is_err());
    }

    #[test]
    fn test_filter_never_selects_synced_or_disabled() {
        for filter in [StatusFilter::Pending, StatusFilter::Error, StatusFilter::All] {
            assert!(!filter.statuses().contains(&SyncStatus::Synced));
            assert!(!filter.statuses().contains(&SyncStatus::Disabled));
        }
        assert_eq!(StatusFilter::All.statuses().len(), 2);
    }

    #[test]
    fn test_filter_from_str() {
        assert_eq!(StatusFilter::from_str("All").unwrap(), StatusFilter::All);
        assert!(StatusFilter::from_str("synced").is_err());
    }
}
