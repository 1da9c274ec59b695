use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::rate_limit::RateLimitBucket;
use chrono::{Duration, Utc};

impl PostgresRepository {
    /// Refuse the action when failed attempts for `(action, identifier)`
    /// within the trailing window have reached `max_attempts`.
    ///
    /// Fails closed before any account lookup; callers must return a
    /// generic throttling message, never anything that reveals whether
    /// the account exists. Buckets whose window has lapsed are ignored
    /// here rather than deleted, so concurrent readers never see a
    /// half-cleared row.
    pub async fn check_rate_limit(
        &self,
        action: &str,
        identifier: &str,
        max_attempts: i64,
        window_minutes: i64,
    ) -> Result<(), AppError> {
        let bucket = sqlx::query_as::<_, RateLimitBucket>(
            "SELECT action, identifier, window_start, attempt_count, succeeded
             FROM rate_limits
             WHERE action = $1 AND identifier = $2",
        )
        .bind(action)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        if bucket.is_some_and(|bucket| bucket.is_limiting(max_attempts, window_minutes)) {
            return Err(AppError::RateLimitExceeded);
        }

        Ok(())
    }

    /// Record one failed attempt as a single atomic upsert.
    ///
    /// The increment happens inside the statement, never as a
    /// read-modify-write, so concurrent failures from distinct requests
    /// cannot under-count. A bucket whose window has lapsed (or that
    /// recorded a success) restarts at 1 with a fresh window.
    pub async fn record_failed_attempt(&self, action: &str, identifier: &str, window_minutes: i64) -> Result<(), AppError> {
        let now = Utc::now();
        let cutoff = now - Duration::minutes(window_minutes);

        sqlx::query(
            "INSERT INTO rate_limits (action, identifier, window_start, attempt_count, succeeded)
             VALUES ($1, $2, $3, 1, false)
             ON CONFLICT (action, identifier)
             DO UPDATE SET
                attempt_count = CASE
                    WHEN rate_limits.window_start < $4 OR rate_limits.succeeded THEN 1
                    ELSE rate_limits.attempt_count + 1
                END,
                window_start = CASE
                    WHEN rate_limits.window_start < $4 OR rate_limits.succeeded THEN $3
                    ELSE rate_limits.window_start
                END,
                succeeded = false",
        )
        .bind(action)
        .bind(identifier)
        .bind(now)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// A recorded success clears the bucket for that key.
    pub async fn record_successful_attempt(&self, action: &str, identifier: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE rate_limits
             SET succeeded = true, attempt_count = 0
             WHERE action = $1 AND identifier = $2",
        )
        .bind(action)
        .bind(identifier)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Maintenance sweep for cron use. Correctness never depends on it;
    /// readers already ignore stale buckets.
    pub async fn cleanup_stale_buckets(&self, older_than_minutes: i64) -> Result<u64, AppError> {
        let cutoff = Utc::now() - Duration::minutes(older_than_minutes);

        let result = sqlx::query("DELETE FROM rate_limits WHERE window_start < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn check_rate_limit_allows_first_attempt() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn concurrent_failed_attempts_do_not_undercount() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn successful_attempt_clears_bucket() {
        // Requires a running PostgreSQL at DATABASE_URL
    }
}
