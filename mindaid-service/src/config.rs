use std::env;

use tracing::warn;

use crate::error::AppError;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_COUNSEL_MODEL: &str = "meta-llama/llama-3.1-70b-instruct";
pub const DEFAULT_RETRIEVER_TOP_K: usize = 4;
pub const DEFAULT_MAX_CHAT_MESSAGES: usize = 50;

/// Minimum `SECRET_KEY` length accepted for cookie signing
pub const MIN_SECRET_LEN: usize = 64;

/// Service configuration, read once from the environment at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub secret_key: Option<String>,
    pub bcrypt_cost: u32,
    pub classifier_url: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub counsel_model: String,
    pub retriever_url: Option<String>,
    pub retriever_top_k: usize,
    pub max_chat_messages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            secret_key: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            classifier_url: None,
            openrouter_api_key: None,
            counsel_model: DEFAULT_COUNSEL_MODEL.to_string(),
            retriever_url: None,
            retriever_top_k: DEFAULT_RETRIEVER_TOP_K,
            max_chat_messages: DEFAULT_MAX_CHAT_MESSAGES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret_key = non_empty("SECRET_KEY");
        if let Some(secret) = &secret_key {
            if secret.len() < MIN_SECRET_LEN {
                return Err(AppError::Config(format!(
                    "SECRET_KEY must be at least {MIN_SECRET_LEN} bytes; run generate-secret"
                )));
            }
        }

        let config = Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: non_empty("DATABASE_URL"),
            secret_key,
            bcrypt_cost: parse_or("BCRYPT_COST", non_empty("BCRYPT_COST"), defaults.bcrypt_cost)?,
            classifier_url: non_empty("CLASSIFIER_URL"),
            openrouter_api_key: non_empty("OPENROUTER_API_KEY"),
            counsel_model: non_empty("COUNSEL_MODEL").unwrap_or(defaults.counsel_model),
            retriever_url: non_empty("RETRIEVER_URL"),
            retriever_top_k: parse_or(
                "RETRIEVER_TOP_K",
                non_empty("RETRIEVER_TOP_K"),
                defaults.retriever_top_k,
            )?,
            max_chat_messages: parse_or(
                "MAX_CHAT_MESSAGES",
                non_empty("MAX_CHAT_MESSAGES"),
                defaults.max_chat_messages,
            )?,
        };

        config.warn_missing();
        Ok(config)
    }

    fn warn_missing(&self) {
        if self.secret_key.is_none() {
            warn!("SECRET_KEY not set, generating a temporary key; sessions will not survive a restart");
        }
        if self.database_url.is_none() {
            warn!("DATABASE_URL not set, users and sessions are kept in memory");
        }
        if self.classifier_url.is_none() {
            warn!("CLASSIFIER_URL not set, diagnosis classification will fail");
        }
        if self.openrouter_api_key.is_none() {
            warn!("OPENROUTER_API_KEY not set, counseling replies will fail");
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, AppError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.retriever_top_k, DEFAULT_RETRIEVER_TOP_K);
        assert!(config.database_url.is_none());
        assert!(config.secret_key.is_none());
    }

    #[test]
    fn values_are_read_and_parsed() {
        let secret = "a".repeat(64);
        let config = Config::from_lookup(lookup(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("SECRET_KEY", secret.as_str()),
            ("RETRIEVER_TOP_K", "8"),
            ("CLASSIFIER_URL", "http://classifier/predict"),
            ("DATABASE_URL", "  "),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.retriever_top_k, 8);
        assert_eq!(config.classifier_url.as_deref(), Some("http://classifier/predict"));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = Config::from_lookup(lookup(&[("SECRET_KEY", "too-short")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[("MAX_CHAT_MESSAGES", "lots")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
