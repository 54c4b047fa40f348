use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::authz::DEFAULT_LOOKUP_TIMEOUT;
use crate::errors::AppError;
use crate::github::RetryPolicy;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub webhook_secret: Arc<Vec<u8>>,
    pub github: GitHubConfig,
    pub lookup_timeout: Duration,
    pub pending_retry: RetryPolicy,
    /// Honour the `X-Mock-Enabled` header (parse but skip dispatch).
    pub allow_mock: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| AppError::configuration("DATABASE_URL not set"))?;
        let secret = std::env::var("GITHUB_WEBHOOK_SECRET")
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::configuration("GITHUB_WEBHOOK_SECRET not set"))?;
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::configuration("GITHUB_TOKEN not set"))?;

        let api_url = std::env::var("GITHUB_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());

        let defaults = RetryPolicy::default();
        let pending_retry = RetryPolicy::new(
            env_or("PENDING_FETCH_MAX_ATTEMPTS", defaults.max_attempts)?,
            Duration::from_millis(env_or(
                "PENDING_FETCH_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )?),
            Duration::from_millis(env_or(
                "PENDING_FETCH_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )?),
        );
        let allow_mock = std::env::var("WEBHOOK_ALLOW_MOCK")
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let config = Self {
            port: env_or("APP_PORT", DEFAULT_PORT)?,
            database_url,
            webhook_secret: Arc::new(secret.into_bytes()),
            github: GitHubConfig {
                api_url,
                token,
                user_agent: format!("deploy-gate/{}", env!("CARGO_PKG_VERSION")),
            },
            lookup_timeout: Duration::from_millis(env_or(
                "STORE_LOOKUP_TIMEOUT_MS",
                DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64,
            )?),
            pending_retry,
            allow_mock,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make every event fail.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.pending_retry.max_attempts == 0 {
            return Err(AppError::configuration(
                "PENDING_FETCH_MAX_ATTEMPTS must be at least 1",
            ));
        }
        if self.lookup_timeout.is_zero() {
            return Err(AppError::configuration(
                "STORE_LOOKUP_TIMEOUT_MS must be at least 1",
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{key} must be a valid integer"))),
        _ => Ok(default),
    }
}
