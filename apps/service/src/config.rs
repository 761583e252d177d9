use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::checker::DEFAULT_DEGRADED_THRESHOLD_MS;
use crate::monitoring::history::DEFAULT_WINDOW_DAYS;
use crate::monitoring::scheduler::DEFAULT_INTERVAL_SECONDS;
use crate::validation::{validate_interval, validate_timeout};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("Failed to write config file: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("No config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub probe: ProbeConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: path::PathBuf,
    pub max_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_seconds: u64,
    /// Sites probed in parallel within one cycle
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_seconds: u64,
    pub degraded_threshold_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub window_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "quickstatus.db".into(), max_connections: 16 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_seconds: DEFAULT_INTERVAL_SECONDS, max_concurrency: 16 }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_seconds: 10, degraded_threshold_ms: DEFAULT_DEGRADED_THRESHOLD_MS }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { window_days: DEFAULT_WINDOW_DAYS }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/quickstatus/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("quickstatus/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;
        write_1(f, "Max Connections", &self.database.max_connections)?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Interval (s)", &self.scheduler.interval_seconds)?;
        write_1(f, "Max Concurrency", &self.scheduler.max_concurrency)?;
        write_title_1(f, "Probe")?;
        write_1(f, "Timeout (s)", &self.probe.timeout_seconds)?;
        write_1(f, "Degraded Threshold (ms)", &self.probe.degraded_threshold_ms)?;
        write_title_1(f, "History")?;
        write_1(f, "Window (days)", &self.history.window_days)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/quickstatus/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::ReadFailed)?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            tracing::info!(path = %config_path.display(), "Wrote default configuration");
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(ConfigError::WriteFailed)
    }

    /// Reject values the scheduler and prober cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |e: anyhow::Error| ConfigError::Invalid(e.to_string());

        validate_interval(self.scheduler.interval_seconds).to_result().map_err(invalid)?;
        validate_timeout(self.probe.timeout_seconds).to_result().map_err(invalid)?;

        if self.scheduler.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be at least 1".into()));
        }
        if self.history.window_days == 0 {
            return Err(ConfigError::Invalid("window_days must be at least 1".into()));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config");

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config, Config::default());
        assert!(dir.path().join("nested/config.toml").exists());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler]\ninterval_seconds = 60\n\n[history]\nwindow_days = 30\n").unwrap();

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config.scheduler.interval_seconds, 60);
        assert_eq!(config.scheduler.max_concurrency, 16);
        assert_eq!(config.history.window_days, 30);
        assert_eq!(config.probe.degraded_threshold_ms, 1000);
        assert_eq!(config.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[probe]\ntimeout_seconds = 0\n").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unparseable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler\n").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn test_display_lists_sections() {
        let rendered = Config::default().to_string();
        assert!(rendered.contains("Scheduler"));
        assert!(rendered.contains("Interval (s): 30"));
        assert!(rendered.contains("Window (days): 90"));
    }
}
