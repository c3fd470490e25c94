//! Memory manager configuration, read from `manager.toml`.
//!
//! ```toml
//! [chrome_memory_manager]
//! rss_limit = 2097152          # KB, total across renderers
//! idle_time_limit = 600        # seconds a background tab may stay idle
//! memory_change_rate = 0.05    # relative RSS drift below which a tab is idle
//! refresh_time = 3             # seconds between cycles
//! strategy = "idle_time_limit" # or "rss_limit", "memory_change_rate"
//! ```
//!
//! The older key spellings `idel_time_limit` and `reflush_time` are accepted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabrelay_core::{Error, Result};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "manager.toml";

/// Which rule picks the renderers to kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Kill background tabs idle for longer than `idle_time_limit`.
    #[serde(alias = "idel_time_limit")]
    IdleTimeLimit,
    /// When total RSS exceeds `rss_limit`, kill the largest background tab.
    RssLimit,
    /// Kill tabs whose RSS barely moves across a sampling window.
    MemoryChangeRate,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::IdleTimeLimit => "idle_time_limit",
            Self::RssLimit => "rss_limit",
            Self::MemoryChangeRate => "memory_change_rate",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn default_rss_limit() -> u64 {
    2 * 1024 * 1024
}

fn default_idle_time_limit() -> u64 {
    600
}

fn default_change_rate() -> f64 {
    0.05
}

fn default_refresh_time() -> u64 {
    3
}

fn default_strategy() -> Strategy {
    Strategy::IdleTimeLimit
}

fn default_startup_delay() -> u64 {
    15
}

fn default_process_name() -> String {
    "chrome".into()
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("log.json")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("output.json")
}

/// `[chrome_memory_manager]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Total renderer RSS limit in KB.
    #[serde(default = "default_rss_limit")]
    pub rss_limit: u64,
    /// Seconds a background tab may stay idle.
    #[serde(default = "default_idle_time_limit", alias = "idel_time_limit")]
    pub idle_time_limit: u64,
    #[serde(default = "default_change_rate")]
    pub memory_change_rate: f64,
    /// Seconds between cycles.
    #[serde(default = "default_refresh_time", alias = "reflush_time")]
    pub refresh_time: u64,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    /// Seconds to wait for the first tab snapshot before the first cycle.
    #[serde(default = "default_startup_delay")]
    pub startup_delay: u64,
    /// Executable name of the browser's renderer processes.
    #[serde(default = "default_process_name")]
    pub process_name: String,
    /// Collector snapshot to read tabs from.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// Per-tab usage report written every cycle.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

#[derive(Deserialize)]
struct ConfigFile {
    chrome_memory_manager: ManagerConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            rss_limit: default_rss_limit(),
            idle_time_limit: default_idle_time_limit(),
            memory_change_rate: default_change_rate(),
            refresh_time: default_refresh_time(),
            strategy: default_strategy(),
            startup_delay: default_startup_delay(),
            process_name: default_process_name(),
            snapshot_path: default_snapshot_path(),
            output_path: default_output_path(),
        }
    }
}

impl ManagerConfig {
    /// Load and validate the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse manager config: {}", e)))?;
        let config = file.chrome_memory_manager;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_time == 0 {
            return Err(Error::Config("refresh_time must be at least 1 second".into()));
        }
        if !(self.memory_change_rate.is_finite() && self.memory_change_rate >= 0.0) {
            return Err(Error::Config(format!(
                "memory_change_rate must be a non-negative number, got {}",
                self.memory_change_rate
            )));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_table() {
        let config = ManagerConfig::parse(
            r#"
            [chrome_memory_manager]
            rss_limit = 1048576
            idle_time_limit = 120
            memory_change_rate = 0.1
            refresh_time = 5
            strategy = "rss_limit"
            output_path = "/tmp/usage.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.rss_limit, 1_048_576);
        assert_eq!(config.idle_time_limit, 120);
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.strategy, Strategy::RssLimit);
        assert_eq!(config.output_path, PathBuf::from("/tmp/usage.json"));
        assert_eq!(config.snapshot_path, PathBuf::from("log.json"));
    }

    #[test]
    fn test_legacy_spellings_accepted() {
        let config = ManagerConfig::parse(
            r#"
            [chrome_memory_manager]
            rss_limit = 1000
            idel_time_limit = 30
            memory_change_rate = 0.01
            reflush_time = 2
            strategy = "idel_time_limit"
            "#,
        )
        .unwrap();
        assert_eq!(config.idle_time_limit, 30);
        assert_eq!(config.refresh_time, 2);
        assert_eq!(config.strategy, Strategy::IdleTimeLimit);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err = ManagerConfig::parse(
            r#"
            [chrome_memory_manager]
            strategy = "random"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_refresh_rejected() {
        let result = ManagerConfig::parse(
            r#"
            [chrome_memory_manager]
            refresh_time = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManagerConfig::load(&dir.path().join("manager.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_table_rejected() {
        assert!(ManagerConfig::parse("rss_limit = 5").is_err());
    }
}
