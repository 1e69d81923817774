use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::validation::ValidationLimits;
use crate::notifications::TwilioConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },

    #[error("Failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("No config path given and neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schedule: Schedule,
    pub checks: ChecksConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub check_interval_seconds: u64,
    pub rotation_interval_seconds: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self { check_interval_seconds: 60, rotation_interval_seconds: 24 * 3600 }
    }
}

impl Schedule {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    pub id_length: usize,
    /// `0` accepts owner ids of any length
    pub owner_id_length: usize,
    pub min_timeout_seconds: u64,
    pub max_timeout_seconds: u64,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        let limits = ValidationLimits::default();
        Self {
            id_length: limits.id_length,
            owner_id_length: limits.owner_id_length.unwrap_or(0),
            min_timeout_seconds: limits.min_timeout_seconds,
            max_timeout_seconds: limits.max_timeout_seconds,
        }
    }
}

impl From<&ChecksConfig> for ValidationLimits {
    fn from(checks: &ChecksConfig) -> Self {
        Self {
            id_length: checks.id_length,
            owner_id_length: (checks.owner_id_length > 0).then_some(checks.owner_id_length),
            min_timeout_seconds: checks.min_timeout_seconds,
            max_timeout_seconds: checks.max_timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: path::PathBuf,
    pub logs_dir: path::PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: ".data".into(), logs_dir: ".logs".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `compact` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationProvider {
    #[default]
    Log,
    Twilio,
}

impl fmt::Display for NotificationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationProvider::Log => write!(f, "log"),
            NotificationProvider::Twilio => write!(f, "twilio"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub provider: NotificationProvider,
    pub twilio: TwilioConfig,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/checkup/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Some(config_home) = env::var_os("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::var_os("HOME") {
        path::PathBuf::from(home_dir).join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("checkup/config.toml"))
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

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Schedule")?;
        write_1(f, "Check Interval (s)", &self.schedule.check_interval_seconds)?;
        write_1(f, "Rotation Interval (s)", &self.schedule.rotation_interval_seconds)?;
        write_title_1(f, "Checks")?;
        write_1(f, "Id Length", &self.checks.id_length)?;
        write_1(f, "Owner Id Length", &self.checks.owner_id_length)?;
        write_1(
            f,
            "Timeout Range (s)",
            &format!("{}..={}", self.checks.min_timeout_seconds, self.checks.max_timeout_seconds),
        )?;
        write_title_1(f, "Storage")?;
        write_1(f, "Data Directory", &self.storage.data_dir.display())?;
        write_1(f, "Logs Directory", &self.storage.logs_dir.display())?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;
        write_title_1(f, "Notifications")?;
        write_1(f, "Provider", &self.notifications.provider)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/checkup/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
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
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Reject settings the worker cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.check_interval_seconds == 0 || self.schedule.rotation_interval_seconds == 0 {
            return Err(ConfigError::Invalid("schedule intervals must be positive".into()));
        }

        if self.checks.id_length == 0 {
            return Err(ConfigError::Invalid("checks.id_length must be positive".into()));
        }

        if self.checks.min_timeout_seconds == 0
            || self.checks.min_timeout_seconds > self.checks.max_timeout_seconds
        {
            return Err(ConfigError::Invalid(format!(
                "timeout range {}..={} is empty or starts at zero",
                self.checks.min_timeout_seconds, self.checks.max_timeout_seconds
            )));
        }

        if self.notifications.provider == NotificationProvider::Twilio {
            let twilio = &self.notifications.twilio;
            if twilio.account_sid.is_empty() || twilio.auth_token.is_empty() || twilio.from_phone.is_empty()
            {
                return Err(ConfigError::Invalid(
                    "twilio provider needs account_sid, auth_token and from_phone".into(),
                ));
            }
        }

        Ok(())
    }
}
