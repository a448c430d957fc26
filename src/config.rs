use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub signup: SignupConfig,
    pub logging: LoggingConfig,
}

/// Signup wizard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupConfig {
    /// Seconds before a verification code may be resent.
    pub resend_cooldown_secs: u32,
    /// Minimum password length on the account step.
    pub password_min_length: usize,
    /// Maximum length of any free-text field.
    pub max_field_length: usize,
    /// Period of the cooldown clock in milliseconds.
    pub tick_interval_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
    /// Override the default log directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            resend_cooldown_secs: 60,
            password_min_length: 8,
            max_field_length: 256,
            tick_interval_ms: 1000,
        }
    }
}

impl SignupConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    /// Resolved log directory (override or XDG data default).
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("portal-signup").join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs"))
        })
    }
}

impl AppConfig {
    /// Load configuration from `~/.config/portal-signup/config.toml`.
    /// Returns `Default` if the file is missing or unparseable.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        match std::fs::read_to_string(config_path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    log::warn!(
                        "Failed to parse config at {}: {e}, using defaults",
                        config_path.display()
                    );
                    Self::default()
                }
            },
            Err(_) => {
                log::debug!(
                    "No config file at {}, using defaults",
                    config_path.display()
                );
                Self::default()
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("portal-signup").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}
