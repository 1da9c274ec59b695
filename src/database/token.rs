use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::principal::Principal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

impl PostgresRepository {
    /// Store a remember token hash. The slot is single-occupancy:
    /// writing a new hash invalidates whatever token was there before.
    pub async fn store_remember_token(
        &self,
        principal_id: &Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE principals
            SET remember_token_hash = $2, remember_expires = $3
            WHERE id = $1
            "#,
        )
        .bind(principal_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up the owner of an unexpired remember token. The query
    /// filters on expiry and `is_active`, so a revoked or lapsed token
    /// behaves exactly like an unknown one.
    pub async fn get_principal_by_remember_token(&self, token_hash: &str) -> Result<Option<Principal>, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT id, kind, email, secret_hash, login_attempts, locked_until, is_active,
                   remember_token_hash, remember_expires, reset_token_hash, reset_expires, last_login
            FROM principals
            WHERE remember_token_hash = $1
              AND remember_expires > now()
              AND is_active = true
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(principal)
    }

    pub async fn clear_remember_token(&self, principal_id: &Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE principals
            SET remember_token_hash = NULL, remember_expires = NULL
            WHERE id = $1
            "#,
        )
        .bind(principal_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store a reset token hash, replacing any outstanding one.
    pub async fn store_reset_token(
        &self,
        principal_id: &Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE principals
            SET reset_token_hash = $2, reset_expires = $3
            WHERE id = $1 AND is_active = true
            "#,
        )
        .bind(principal_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Consume a reset token and install the new secret in one
    /// statement. The WHERE clause matches only an unexpired,
    /// still-present token and the SET clears it, so a second call with
    /// the same token affects zero rows; replay is impossible.
    ///
    /// A successful reset also resets the attempt counter, clears any
    /// lockout, and revokes the remember slot.
    pub async fn consume_reset_token(&self, token_hash: &str, new_secret_hash: &str) -> Result<Option<Uuid>, AppError> {
        let principal_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE principals
            SET secret_hash = $2,
                reset_token_hash = NULL,
                reset_expires = NULL,
                login_attempts = 0,
                locked_until = NULL,
                remember_token_hash = NULL,
                remember_expires = NULL
            WHERE reset_token_hash = $1
              AND reset_expires > now()
              AND is_active = true
            RETURNING id
            "#,
        )
        .bind(token_hash)
        .bind(new_secret_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(principal_id)
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn consume_reset_token_rejects_replay() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn new_remember_token_invalidates_previous_slot() {
        // Requires a running PostgreSQL at DATABASE_URL
    }
}
