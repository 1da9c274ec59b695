use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::principal::{Principal, PrincipalKind};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Outcome of the atomic failed-login update: the counter after the
/// increment and the lock it may have set.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct FailedLoginResult {
    pub login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl PostgresRepository {
    pub async fn get_principal_by_email(&self, kind: PrincipalKind, email: &str) -> Result<Option<Principal>, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT id, kind, email, secret_hash, login_attempts, locked_until, is_active,
                   remember_token_hash, remember_expires, reset_token_hash, reset_expires, last_login
            FROM principals
            WHERE kind = $1 AND email = $2
            "#,
        )
        .bind(kind)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(principal)
    }

    pub async fn get_principal_by_id(&self, id: &Uuid) -> Result<Option<Principal>, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT id, kind, email, secret_hash, login_attempts, locked_until, is_active,
                   remember_token_hash, remember_expires, reset_token_hash, reset_expires, last_login
            FROM principals
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(principal)
    }

    pub async fn create_principal(&self, kind: PrincipalKind, email: &str, secret_hash: &str) -> Result<Principal, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            INSERT INTO principals (kind, email, secret_hash)
            VALUES ($1, $2, $3)
            RETURNING id, kind, email, secret_hash, login_attempts, locked_until, is_active,
                      remember_token_hash, remember_expires, reset_token_hash, reset_expires, last_login
            "#,
        )
        .bind(kind)
        .bind(email)
        .bind(secret_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(principal)
    }

    /// Increment the attempt counter and, when the resulting count
    /// reaches the threshold, set the lock in the same statement.
    ///
    /// The counter read and the lock decision both happen inside the
    /// UPDATE, so concurrent failed logins against the same row cannot
    /// race a stale count into a bypassed lockout.
    pub async fn record_failed_login(
        &self,
        principal_id: &Uuid,
        max_attempts: i32,
        lockout_minutes: i64,
    ) -> Result<FailedLoginResult, AppError> {
        let locked_until = Utc::now() + Duration::minutes(lockout_minutes);

        let result = sqlx::query_as::<_, FailedLoginResult>(
            r#"
            UPDATE principals
            SET login_attempts = login_attempts + 1,
                locked_until = CASE
                    WHEN login_attempts + 1 >= $2 THEN $3
                    ELSE locked_until
                END
            WHERE id = $1
            RETURNING login_attempts, locked_until
            "#,
        )
        .bind(principal_id)
        .bind(max_attempts)
        .bind(locked_until)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    /// Reset counters and stamp the login. Runs only after the secret
    /// has been verified.
    pub async fn record_successful_login(&self, principal_id: &Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE principals
            SET login_attempts = 0, locked_until = NULL, last_login = now()
            WHERE id = $1
            "#,
        )
        .bind(principal_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn record_failed_login_locks_at_threshold() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn record_successful_login_resets_counter_and_lock() {
        // Requires a running PostgreSQL at DATABASE_URL
    }
}
