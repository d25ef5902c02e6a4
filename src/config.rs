//! Configuration types.

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::session::ActivityLevel;

/// Default OpenAI-compatible endpoint (xAI).
pub const DEFAULT_API_BASE: &str = "https://api.x.ai/v1";

/// Runtime configuration for the coach.
#[derive(Debug, Clone)]
pub struct CoachConfig {
    /// Path of the libSQL database file.
    pub db_path: String,
    /// Port for the JSON HTTP surface.
    pub http_port: u16,
    /// Chat model used for phrasing replies.
    pub model: String,
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    /// API key. Without one, replies are sent un-styled.
    pub api_key: Option<SecretString>,
    /// Name the assistant speaks as.
    pub persona_name: String,
    /// How the assistant addresses the user.
    pub user_name: String,
    /// Activity level used for the baseline calorie calculation.
    pub activity_level: ActivityLevel,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/fit-coach.db".to_string(),
            http_port: 8080,
            model: "grok-2-latest".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            persona_name: "Coach".to_string(),
            user_name: "friend".to_string(),
            activity_level: ActivityLevel::default(),
        }
    }
}

impl CoachConfig {
    /// Build the configuration from `FIT_COACH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let http_port = match std::env::var("FIT_COACH_HTTP_PORT") {
            Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "FIT_COACH_HTTP_PORT".to_string(),
                message: format!("{e}"),
            })?,
            Err(_) => defaults.http_port,
        };

        let activity_level = match std::env::var("FIT_COACH_ACTIVITY_LEVEL") {
            Ok(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
                key: "FIT_COACH_ACTIVITY_LEVEL".to_string(),
                message,
            })?,
            Err(_) => defaults.activity_level,
        };

        Ok(Self {
            db_path: std::env::var("FIT_COACH_DB_PATH").unwrap_or(defaults.db_path),
            http_port,
            model: std::env::var("FIT_COACH_MODEL").unwrap_or(defaults.model),
            api_base: std::env::var("FIT_COACH_API_BASE").unwrap_or(defaults.api_base),
            api_key: std::env::var("XAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            persona_name: std::env::var("FIT_COACH_PERSONA").unwrap_or(defaults.persona_name),
            user_name: std::env::var("FIT_COACH_USER_NAME").unwrap_or(defaults.user_name),
            activity_level,
        })
    }

    /// The API key, or `MissingEnvVar` when none was configured.
    pub fn require_api_key(&self) -> Result<SecretString, ConfigError> {
        self.api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("XAI_API_KEY".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = CoachConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.activity_level, ActivityLevel::SomewhatActive);
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let cfg = CoachConfig::default();
        let err = cfg.require_api_key().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "XAI_API_KEY"));
    }
}
