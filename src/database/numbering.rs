use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::service::numbering::DocumentKind;

impl PostgresRepository {
    /// Highest numeric suffix among existing document numbers with the
    /// given period prefix, or 0 when none match.
    ///
    /// This is the only place that reasons about number layout in
    /// storage; the retry-on-collision logic in the numbering service
    /// is the only consumer. Numbers that do not end in digits (the
    /// degraded fallback pattern) are skipped.
    pub async fn max_existing_suffix(&self, kind: DocumentKind, period_prefix: &str) -> Result<i64, AppError> {
        let table = match kind {
            DocumentKind::Invoice => "invoices",
            DocumentKind::Estimate => "estimates",
        };

        let numbers = sqlx::query_scalar::<_, String>(&format!("SELECT number FROM {table} WHERE number LIKE $1"))
            .bind(format!("{period_prefix}%"))
            .fetch_all(&self.pool)
            .await?;

        let max = numbers
            .iter()
            .filter_map(|number| number.rsplit('-').next())
            .filter_map(|suffix| suffix.parse::<i64>().ok())
            .max()
            .unwrap_or(0);

        Ok(max)
    }
}
