//! Gatekeeper configuration
//!
//! Loaded once at startup from a YAML file. Every field has a default so a
//! partial file (or none at all) is accepted; `validate` rejects values the
//! bot can't work with.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "GATEKEEPER_CONFIG";
/// Config file used when `GATEKEEPER_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config/gatekeeper.yaml";
/// Environment variable overriding `database_url`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Errors raised while loading or validating the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings of the guarded group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Guild the bot guards
    pub group_id: u64,
    /// Channel where shared results are posted
    pub announce_channel_id: u64,
    /// Role that keeps a member from chatting until they pass
    pub restricted_role_id: u64,
    pub questions_file: String,
    pub database_url: String,
    pub command_prefix: String,
    pub questions_per_quiz: usize,
    pub correct_answers_required: usize,
    /// Seconds a new member has to start the quiz before being kicked
    pub kick_inactive_after_secs: u64,
    /// Hours after a failed pass's last answer before a retry is allowed
    pub wait_hours_on_fail: u64,
    pub delete_join_messages: bool,
    pub delete_leave_messages: bool,
    pub timer_check_interval_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            group_id: 0,
            announce_channel_id: 0,
            restricted_role_id: 0,
            questions_file: "questions.yaml".to_string(),
            database_url: "sqlite://gatekeeper.db?mode=rwc".to_string(),
            command_prefix: "!".to_string(),
            questions_per_quiz: 20,
            correct_answers_required: 15,
            kick_inactive_after_secs: 900,
            wait_hours_on_fail: 24,
            delete_join_messages: true,
            delete_leave_messages: true,
            timer_check_interval_secs: 5,
        }
    }
}

impl GateConfig {
    /// Parse a configuration from YAML source
    ///
    /// # Errors
    /// Returns `Parse` if the source is not a valid configuration
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Load the configuration from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but can't be read or parsed
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(source) => {
                info!(path = %path.display(), "Loaded configuration");
                Self::from_yaml_str(&source)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Load from `$GATEKEEPER_CONFIG` (or the default path) and apply
    /// environment overrides
    ///
    /// # Errors
    /// Returns an error if the file can't be read or parsed
    pub async fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(path).await?;
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.database_url = url;
        }
        Ok(config)
    }

    /// Check the settings against each other and against the question bank size
    ///
    /// # Errors
    /// Returns `Invalid` describing the first problem found
    pub fn validate(&self, bank_size: usize) -> Result<(), ConfigError> {
        if self.questions_per_quiz == 0 {
            return Err(ConfigError::Invalid(
                "questions_per_quiz must be at least 1".to_string(),
            ));
        }
        if self.correct_answers_required > self.questions_per_quiz {
            return Err(ConfigError::Invalid(format!(
                "correct_answers_required ({}) exceeds questions_per_quiz ({})",
                self.correct_answers_required, self.questions_per_quiz
            )));
        }
        if self.questions_per_quiz > bank_size {
            return Err(ConfigError::Invalid(format!(
                "questions_per_quiz ({}) exceeds the {bank_size} questions in the bank",
                self.questions_per_quiz
            )));
        }
        if self.timer_check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "timer_check_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn kick_delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.kick_inactive_after_secs).unwrap_or(i64::MAX))
    }

    #[must_use]
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::try_from(self.wait_hours_on_fail).unwrap_or(i64::MAX))
    }
}
