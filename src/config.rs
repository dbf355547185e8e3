use std::time::Duration;

use chrono::Weekday;
use thiserror::Error;

pub const API_KEY_VAR: &str = "BREVO_API_KEY";
pub const DEFAULT_API_URL: &str = "https://api.brevo.com/v3/contacts";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

/// List-membership identifiers with pipeline meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListIds {
    pub platform: i64,
    pub webinar: i64,
}

impl Default for ListIds {
    fn default() -> Self {
        Self {
            platform: 6,
            webinar: 69,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub daily_days: i64,
    pub weekly_days: i64,
    pub weekly_day: Weekday,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily_days: 30,
            weekly_days: 84,
            weekly_day: Weekday::Wed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrmSettings {
    pub api_key: String,
    pub base_url: String,
    pub page_size: usize,
    pub timeout: Duration,
    pub page_delay: Duration,
}

impl CrmSettings {
    pub fn new(
        api_key: String,
        base_url: String,
        page_size: usize,
        timeout: Duration,
        page_delay: Duration,
    ) -> Result<Self, ConfigError> {
        if page_size == 0 {
            return Err(ConfigError::Zero { name: "page size" });
        }
        if timeout.is_zero() {
            return Err(ConfigError::Zero { name: "request timeout" });
        }
        Ok(Self {
            api_key,
            base_url,
            page_size,
            timeout,
            page_delay,
        })
    }
}

/// Credential lookup, done before any network call.
pub fn api_key_from(value: Option<String>) -> Result<String, ConfigError> {
    value
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or(ConfigError::Missing(API_KEY_VAR))
}

pub fn api_key_from_env() -> Result<String, ConfigError> {
    api_key_from(std::env::var(API_KEY_VAR).ok())
}
