use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub numbering: NumberingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

/// Account lockout and token lifetime policy.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Failed logins before the account is locked.
    pub max_login_attempts: i32,
    pub lockout_minutes: i64,
    pub session_ttl_hours: i64,
    pub remember_token_days: i64,
    pub reset_token_ttl_minutes: i64,
}

/// Windowed attempt limits, separate from per-account lockout.
/// The reset policy is deliberately stricter: reset is an
/// account-takeover vector.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub login_max_attempts: i64,
    pub login_window_minutes: i64,
    pub client_login_max_attempts: i64,
    pub client_login_window_minutes: i64,
    pub reset_max_attempts: i64,
    pub reset_window_minutes: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NumberingConfig {
    /// Zero-padding width of the sequential suffix.
    pub pad_width: usize,
    /// Retries on a number collision before taking the fallback path.
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/quickbill_db".to_string(),
            max_connections: 16,
            min_connections: 4,
            acquire_timeout: 5,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            lockout_minutes: 30,
            session_ttl_hours: 12,
            remember_token_days: 30,
            reset_token_ttl_minutes: 60,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_max_attempts: 10,
            login_window_minutes: 15,
            client_login_max_attempts: 20,
            client_login_window_minutes: 15,
            reset_max_attempts: 3,
            reset_window_minutes: 60,
        }
    }
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            pad_width: 4,
            max_retries: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Quickbill.toml (base configuration file)
    /// 2. Environment variables (prefixed with QUICKBILL_)
    /// 3. DATABASE_URL environment variable (for backwards compatibility)
    pub fn load() -> Result<Self, figment::Error> {
        let figment = Figment::new()
            .merge(Toml::string(&toml::to_string(&Config::default()).unwrap()).nested())
            .merge(Toml::file("Quickbill.toml").nested())
            .merge(Env::prefixed("QUICKBILL_").split("_"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()));

        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_lockout_policy() {
        let config = Config::default();
        assert_eq!(config.security.max_login_attempts, 5);
        assert_eq!(config.security.lockout_minutes, 30);
        assert_eq!(config.security.remember_token_days, 30);
        assert_eq!(config.security.reset_token_ttl_minutes, 60);
    }

    #[test]
    fn reset_policy_is_stricter_than_login() {
        let config = RateLimitConfig::default();
        assert!(config.reset_max_attempts < config.login_max_attempts);
    }
}
