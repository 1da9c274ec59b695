use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use uuid::Uuid;

impl PostgresRepository {
    /// Append an activity record. Callers treat this as
    /// fire-and-forget (`let _ = repo.record_activity(..)`); a failed
    /// audit write must never abort the operation being audited.
    pub async fn record_activity(&self, principal_id: Option<&Uuid>, action: &str, description: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO activity_log (principal_id, action, description)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(principal_id)
        .bind(action)
        .bind(description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
