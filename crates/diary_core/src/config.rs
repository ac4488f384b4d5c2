//! Application configuration.
//!
//! # Responsibility
//! - Describe every runtime option in one serde-backed struct.
//! - Load defaults, then an optional TOML file, then environment overrides.
//!
//! # Invariants
//! - A missing provider key disables that provider tier; it is never an error.
//! - API keys are never logged.

use crate::ai::{GatewayConfig, SearchConfig};
use crate::model::user::ExternalId;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "school_bot.db";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for `{key}`: {reason}")]
    InvalidEnv { key: &'static str, reason: String },
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// External id of the single trusted administrator.
    pub admin_external_id: Option<ExternalId>,
    /// Absolute directory for rolling log files; stderr when unset.
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub ai: GatewayConfig,
    pub search: SearchConfig,
    pub intake: IntakeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            admin_external_id: None,
            log_dir: None,
            log_level: None,
            ai: GatewayConfig::default(),
            search: SearchConfig::default(),
            intake: IntakeConfig::default(),
        }
    }
}

/// Guided intake tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Sessions untouched for longer than this are discarded.
    pub session_idle_ttl_secs: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            session_idle_ttl_secs: 30 * 60,
        }
    }
}

impl IntakeConfig {
    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }
}

impl AppConfig {
    /// Loads configuration from `path` (when given) and the process
    /// environment.
    ///
    /// # Errors
    /// - `Read`/`Parse` when the file cannot be read or is not valid TOML.
    /// - `InvalidEnv` when an override cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        info!(
            "event=config_load module=config status=ok file={} admin_configured={} primary={} secondary={}",
            path.is_some(),
            config.admin_external_id.is_some(),
            config.ai.primary_provider_key.is_some(),
            config.ai.secondary_provider_key.is_some()
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Recognized keys: `DIARY_DB_PATH`, `ADMIN_ID`, `GEMINI_API_KEY`
    /// (or `GOOGLE_API_KEY`), `OPENAI_API_KEY`, `DIARY_MODEL`,
    /// `DIARY_LOG_DIR`, `DIARY_LOG_LEVEL`. Empty values are ignored.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = get("DIARY_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(raw) = get("ADMIN_ID") {
            let id = raw
                .trim()
                .parse::<ExternalId>()
                .map_err(|err| ConfigError::InvalidEnv {
                    key: "ADMIN_ID",
                    reason: err.to_string(),
                })?;
            self.admin_external_id = Some(id);
        }
        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.ai.primary_provider_key = Some(key);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.ai.secondary_provider_key = Some(key);
        }
        if let Some(model) = get("DIARY_MODEL") {
            self.ai.model_name = model;
        }
        if let Some(dir) = get("DIARY_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = get("DIARY_LOG_LEVEL") {
            self.log_level = Some(level);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn toml_sections_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            database_path = "/tmp/diary.db"
            admin_external_id = 42

            [ai]
            model_name = "gemini-2.0-flash"

            [search]
            max_results = 3

            [intake]
            session_idle_ttl_secs = 60
            "#,
        )
        .expect("valid toml");
        assert_eq!(config.database_path, PathBuf::from("/tmp/diary.db"));
        assert_eq!(config.admin_external_id, Some(42));
        assert_eq!(config.ai.model_name, "gemini-2.0-flash");
        assert_eq!(config.ai.secondary_model_name, "gpt-4.1-mini");
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.search.sub_query_results, 2);
        assert_eq!(config.intake.session_idle_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("ADMIN_ID", " 7 "),
                ("GOOGLE_API_KEY", "g-key"),
                ("OPENAI_API_KEY", ""),
                ("DIARY_DB_PATH", "/data/bot.db"),
            ]))
            .expect("overrides apply");
        assert_eq!(config.admin_external_id, Some(7));
        assert_eq!(config.ai.primary_provider_key.as_deref(), Some("g-key"));
        assert_eq!(config.ai.secondary_provider_key, None);
        assert_eq!(config.database_path, PathBuf::from("/data/bot.db"));
    }

    #[test]
    fn gemini_key_wins_over_google_key() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[("GEMINI_API_KEY", "a"), ("GOOGLE_API_KEY", "b")]))
            .expect("overrides apply");
        assert_eq!(config.ai.primary_provider_key.as_deref(), Some("a"));
    }

    #[test]
    fn malformed_admin_id_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(env(&[("ADMIN_ID", "admin")]))
            .expect_err("non-numeric id");
        assert!(matches!(err, ConfigError::InvalidEnv { key: "ADMIN_ID", .. }));
    }
}
