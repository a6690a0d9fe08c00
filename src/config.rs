//! Environment-sourced settings.
//!
//! Every value comes from a single flat key/value source (the process
//! environment in production). Required values must be present and
//! well-formed or the process refuses to start.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use teloxide::types::UserId;
use thiserror::Error;

use crate::crypto::Cipher;

/// Largest session lifetime Redis `EXPIRE` and the in-memory clock both accept.
const MAX_SESSION_TTL_SECS: u64 = i32::MAX as u64;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    #[error("missing required setting {0}")]
    Missing(&'static str),
    /// A variable is present but cannot be parsed.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub struct Config {
    pub telegram_token: String,
    pub openai_api_key: String,
    /// The single user allowed to run `/update_knowledge`.
    pub admin_id: UserId,
    /// Expected value of the `X-Telegram-Bot-Api-Secret-Token` header.
    pub webhook_secret: String,
    pub cipher: Cipher,
    pub redis_url: String,
    /// Messages allowed per user per minute.
    pub rate_limit: u32,
    pub session_ttl: Duration,
    pub max_tokens: u32,
    pub api_timeout: Duration,
    pub web_port: u16,
    pub debug: bool,
    pub content_moderation: bool,
    pub sanitize_output: bool,
    /// Public base URL. When set the webhook is registered at startup.
    pub webhook_url: Option<String>,
    pub knowledge_path: PathBuf,
    pub log_dir: PathBuf,
    pub openai_base_url: String,
    pub openai_model: String,
}

impl Config {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let vars = Vars(vars);

        let telegram_token = vars.required("TELEGRAM_TOKEN")?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Invalid {
                name: "TELEGRAM_TOKEN",
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let admin_id = vars.required("ADMIN_ID")?;
        let admin_id = admin_id.parse::<u64>().map(UserId).map_err(|e| ConfigError::Invalid {
            name: "ADMIN_ID",
            reason: e.to_string(),
        })?;

        let encrypt_key = vars.required("ENCRYPT_KEY")?;
        let cipher = Cipher::from_base64_key(&encrypt_key).map_err(|e| ConfigError::Invalid {
            name: "ENCRYPT_KEY",
            reason: e.to_string(),
        })?;

        let rate_limit: u32 = vars.parsed("RATE_LIMIT", 5)?;
        if rate_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT",
                reason: "must be at least 1".into(),
            });
        }

        let session_ttl: u64 = vars.parsed("SESSION_TTL", 3600)?;
        if !(1..=MAX_SESSION_TTL_SECS).contains(&session_ttl) {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL",
                reason: format!("must be between 1 and {MAX_SESSION_TTL_SECS} seconds"),
            });
        }

        let webhook_url = vars
            .optional("WEBHOOK_URL")
            .map(|url| url.trim_end_matches('/').to_string());

        Ok(Self {
            telegram_token,
            openai_api_key: vars.required("OPENAI_API_KEY")?,
            admin_id,
            webhook_secret: vars.required("WEBHOOK_SECRET")?,
            cipher,
            redis_url: vars
                .optional("REDIS_URL")
                .unwrap_or_else(|| "redis://localhost:6379".to_string()),
            rate_limit,
            session_ttl: Duration::from_secs(session_ttl),
            max_tokens: vars.parsed("MAX_TOKENS", 300)?,
            api_timeout: Duration::from_secs(vars.parsed("API_TIMEOUT", 30)?),
            web_port: vars.parsed("WEB_PORT", 8080)?,
            debug: vars.flag("DEBUG", false)?,
            content_moderation: vars.flag("CONTENT_MODERATION", true)?,
            sanitize_output: vars.flag("SANITIZE_INPUT", true)?,
            webhook_url,
            knowledge_path: vars
                .optional("KNOWLEDGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("knowledge/base.yaml")),
            log_dir: vars
                .optional("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            openai_base_url: vars
                .optional("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            openai_model: vars
                .optional("OPENAI_MODEL")
                .unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
        })
    }

    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

struct Vars(HashMap<String, String>);

impl Vars {
    fn optional(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        let Some(raw) = self.optional(name) else {
            return Ok(default);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                reason: format!("expected a boolean, got '{raw}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "8J3bvA2HqS0Hk3sVYl0yS1qRk7ZxN4mD2cP6wT9eF1g=";

    fn base_vars() -> HashMap<String, String> {
        [
            ("TELEGRAM_TOKEN", "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"),
            ("OPENAI_API_KEY", "sk-test"),
            ("ADMIN_ID", "42"),
            ("WEBHOOK_SECRET", "hunter2"),
            ("ENCRYPT_KEY", KEY),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn with(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars = base_vars();
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        vars
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(base_vars()).expect("should load valid config");
        assert_eq!(config.admin_id, UserId(42));
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_tokens, 300);
        assert_eq!(config.api_timeout, Duration::from_secs(30));
        assert_eq!(config.web_port, 8080);
        assert!(!config.debug);
        assert!(config.content_moderation);
        assert!(config.sanitize_output);
        assert!(config.webhook_url.is_none());
        assert_eq!(config.knowledge_path, PathBuf::from("knowledge/base.yaml"));
        assert_eq!(config.openai_model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(with(&[
            ("RATE_LIMIT", "10"),
            ("SESSION_TTL", "60"),
            ("WEB_PORT", "9000"),
            ("DEBUG", "TRUE"),
            ("CONTENT_MODERATION", "off"),
            ("WEBHOOK_URL", "https://bot.example.org/"),
        ]))
        .unwrap();
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.session_ttl, Duration::from_secs(60));
        assert_eq!(config.web_port, 9000);
        assert!(config.debug);
        assert!(!config.content_moderation);
        assert_eq!(config.webhook_url.as_deref(), Some("https://bot.example.org"));
    }

    #[test]
    fn test_missing_required() {
        for name in ["TELEGRAM_TOKEN", "OPENAI_API_KEY", "ADMIN_ID", "WEBHOOK_SECRET", "ENCRYPT_KEY"] {
            let mut vars = base_vars();
            vars.remove(name);
            let err = assert_err(Config::from_vars(vars));
            assert!(matches!(err, ConfigError::Missing(n) if n == name));
            assert!(err.to_string().contains(name));
        }
    }

    #[test]
    fn test_blank_required_counts_as_missing() {
        let err = assert_err(Config::from_vars(with(&[("WEBHOOK_SECRET", "   ")])));
        assert!(matches!(err, ConfigError::Missing("WEBHOOK_SECRET")));
    }

    #[test]
    fn test_invalid_token_format() {
        for token in ["invalid_token_no_colon", "notanumber:ABCdef", "123456789:"] {
            let err = assert_err(Config::from_vars(with(&[("TELEGRAM_TOKEN", token)])));
            assert!(matches!(err, ConfigError::Invalid { name: "TELEGRAM_TOKEN", .. }));
        }
    }

    #[test]
    fn test_invalid_admin_id() {
        let err = assert_err(Config::from_vars(with(&[("ADMIN_ID", "admin")])));
        assert!(matches!(err, ConfigError::Invalid { name: "ADMIN_ID", .. }));
    }

    #[test]
    fn test_invalid_encryption_key() {
        let err = assert_err(Config::from_vars(with(&[("ENCRYPT_KEY", "c2hvcnQ=")])));
        assert!(matches!(err, ConfigError::Invalid { name: "ENCRYPT_KEY", .. }));
    }

    #[test]
    fn test_malformed_numbers_and_flags() {
        let err = assert_err(Config::from_vars(with(&[("RATE_LIMIT", "five")])));
        assert!(matches!(err, ConfigError::Invalid { name: "RATE_LIMIT", .. }));

        let err = assert_err(Config::from_vars(with(&[("RATE_LIMIT", "0")])));
        assert!(matches!(err, ConfigError::Invalid { name: "RATE_LIMIT", .. }));

        let err = assert_err(Config::from_vars(with(&[("WEB_PORT", "70000")])));
        assert!(matches!(err, ConfigError::Invalid { name: "WEB_PORT", .. }));

        let err = assert_err(Config::from_vars(with(&[("DEBUG", "maybe")])));
        assert!(matches!(err, ConfigError::Invalid { name: "DEBUG", .. }));
    }

    #[test]
    fn test_session_ttl_bounds() {
        for raw in ["0", "2147483648", "18446744073709551615"] {
            let err = assert_err(Config::from_vars(with(&[("SESSION_TTL", raw)])));
            assert!(matches!(err, ConfigError::Invalid { name: "SESSION_TTL", .. }), "{raw}");
        }

        let config = Config::from_vars(with(&[("SESSION_TTL", "2147483647")])).unwrap();
        assert_eq!(config.session_ttl, Duration::from_secs(2_147_483_647));
    }
}
