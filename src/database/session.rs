use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::session::Session;
use chrono::{DateTime, Utc};
use uuid::Uuid;

impl PostgresRepository {
    /// Issue a fresh session, discarding `previous` if one was
    /// presented. The new identifier is generated by the insert, so a
    /// fixated pre-login session id can never carry over into an
    /// authenticated session.
    pub async fn regenerate_session(
        &self,
        previous: Option<&Uuid>,
        principal_id: &Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AppError> {
        if let Some(session_id) = previous {
            self.delete_session(session_id).await?;
        }
        self.delete_expired_sessions_for_principal(principal_id).await?;

        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (principal_id, expires_at)
            VALUES ($1, $2)
            RETURNING id, principal_id, created_at, expires_at
            "#,
        )
        .bind(principal_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get_active_session(&self, session_id: &Uuid) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, principal_id, created_at, expires_at
            FROM sessions
            WHERE id = $1 AND expires_at > now()
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn delete_session(&self, session_id: &Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_expired_sessions_for_principal(&self, principal_id: &Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE principal_id = $1 AND expires_at <= now()")
            .bind(principal_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Used after a completed reset so stolen sessions die with the old
    /// secret.
    pub async fn invalidate_all_sessions(&self, principal_id: &Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE principal_id = $1")
            .bind(principal_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
