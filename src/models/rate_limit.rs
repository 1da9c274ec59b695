use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action names for rate-limit buckets. The same primitive serves
/// per-IP flood protection and per-email brute-force tracking; only
/// the identifier varies.
pub mod actions {
    pub const ADMIN_LOGIN: &str = "admin_login";
    pub const CLIENT_LOGIN: &str = "client_login";
    pub const RESET_REQUEST: &str = "reset_request";
    pub const RESET_COMPLETE: &str = "reset_complete";

    /// Portal-wide identifier for the shared client-login bucket, used
    /// alongside per-email buckets.
    pub const GLOBAL_CLIENT_IDENTIFIER: &str = "client_login";
}

/// One counter row per (action, identifier) pair.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RateLimitBucket {
    pub action: String,
    pub identifier: String,
    pub window_start: DateTime<Utc>,
    pub attempt_count: i64,
    pub succeeded: bool,
}

impl RateLimitBucket {
    /// Attempts outside the trailing window never count; stale rows are
    /// ignored by readers rather than eagerly deleted.
    pub fn is_stale(&self, window_minutes: i64) -> bool {
        self.window_start < Utc::now() - chrono::Duration::minutes(window_minutes)
    }

    /// Whether this bucket alone refuses further attempts: a live
    /// window of failures that has reached the limit. Cleared and stale
    /// buckets never limit.
    pub fn is_limiting(&self, max_attempts: i64, window_minutes: i64) -> bool {
        !self.succeeded && !self.is_stale(window_minutes) && self.attempt_count >= max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bucket(minutes_ago: i64, attempt_count: i64, succeeded: bool) -> RateLimitBucket {
        RateLimitBucket {
            action: actions::ADMIN_LOGIN.to_string(),
            identifier: "10.0.0.1".to_string(),
            window_start: Utc::now() - Duration::minutes(minutes_ago),
            attempt_count,
            succeeded,
        }
    }

    #[test]
    fn bucket_outside_window_is_stale() {
        let bucket = bucket(20, 4, false);
        assert!(bucket.is_stale(15));
        assert!(!bucket.is_stale(30));
    }

    #[test]
    fn full_fresh_bucket_limits() {
        assert!(bucket(5, 10, false).is_limiting(10, 15));
        assert!(!bucket(5, 9, false).is_limiting(10, 15));
    }

    #[test]
    fn stale_or_cleared_buckets_never_limit() {
        assert!(!bucket(20, 10, false).is_limiting(10, 15));
        assert!(!bucket(5, 10, true).is_limiting(10, 15));
    }
}
