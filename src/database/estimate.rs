use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::estimate::{Estimate, EstimateStatus, NewEstimate};
use crate::models::invoice::{DocumentTotals, Invoice, NewInvoice};
use chrono::NaiveDate;
use uuid::Uuid;

impl PostgresRepository {
    pub async fn insert_estimate(&self, new: &NewEstimate, number: &str, unique_id: &str) -> Result<Estimate, AppError> {
        let totals = DocumentTotals::from_subtotal(new.subtotal, new.tax_rate);

        let estimate = sqlx::query_as::<_, Estimate>(
            r#"
            INSERT INTO estimates
                (unique_id, number, date, expires_date, subtotal, tax_rate, tax_amount, total,
                 status, allow_online_approval, customer_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'draft', $9, $10)
            RETURNING id, unique_id, number, date, expires_date, subtotal, tax_rate, tax_amount, total,
                      status, allow_online_approval, converted_invoice_id, customer_id, created_at
            "#,
        )
        .bind(unique_id)
        .bind(number)
        .bind(new.date)
        .bind(new.expires_date)
        .bind(totals.subtotal)
        .bind(totals.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(new.allow_online_approval)
        .bind(new.customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(estimate)
    }

    pub async fn get_estimate_by_id(&self, id: &Uuid) -> Result<Option<Estimate>, AppError> {
        let estimate = sqlx::query_as::<_, Estimate>(
            r#"
            SELECT id, unique_id, number, date, expires_date, subtotal, tax_rate, tax_amount, total,
                   status, allow_online_approval, converted_invoice_id, customer_id, created_at
            FROM estimates
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(estimate)
    }

    pub async fn get_estimate_by_unique_id(&self, unique_id: &str) -> Result<Option<Estimate>, AppError> {
        let estimate = sqlx::query_as::<_, Estimate>(
            r#"
            SELECT id, unique_id, number, date, expires_date, subtotal, tax_rate, tax_amount, total,
                   status, allow_online_approval, converted_invoice_id, customer_id, created_at
            FROM estimates
            WHERE unique_id = $1
            "#,
        )
        .bind(unique_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(estimate)
    }

    /// Compare-and-set status change. Returns false when the row was no
    /// longer in `from`, which callers surface as an invalid
    /// transition rather than silently ignoring; two racing approvals
    /// can never both succeed.
    pub async fn update_estimate_status(&self, id: &Uuid, from: EstimateStatus, to: EstimateStatus) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE estimates SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// One-way conversion: insert the invoice and claim
    /// `converted_invoice_id` in a single transaction. The claim
    /// succeeds only while the estimate is approved and not yet
    /// converted, so it is set exactly once; a lost race rolls the
    /// freshly inserted invoice back and returns `Ok(None)` instead of
    /// stranding it. A unique violation on the invoice number
    /// propagates as the usual numbering retry signal.
    pub async fn convert_estimate_to_invoice(
        &self,
        estimate_id: &Uuid,
        new: &NewInvoice,
        number: &str,
        unique_id: &str,
    ) -> Result<Option<Invoice>, AppError> {
        let totals = DocumentTotals::from_subtotal(new.subtotal, new.tax_rate);
        let mut tx = self.pool.begin().await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (unique_id, number, date, due_date, subtotal, tax_rate, tax_amount, total, customer_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, unique_id, number, date, due_date, subtotal, tax_rate, tax_amount, total, customer_id, created_at
            "#,
        )
        .bind(unique_id)
        .bind(number)
        .bind(new.date)
        .bind(new.due_date)
        .bind(totals.subtotal)
        .bind(totals.tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(new.customer_id)
        .fetch_one(&mut *tx)
        .await?;

        let claimed = sqlx::query(
            r#"
            UPDATE estimates
            SET converted_invoice_id = $2
            WHERE id = $1
              AND status = 'approved'
              AND converted_invoice_id IS NULL
            "#,
        )
        .bind(estimate_id)
        .bind(invoice.id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(invoice))
    }

    /// Time-triggered expiry. The WHERE clause only matches rows still
    /// in draft or sent, so re-running the sweep is a no-op.
    pub async fn expire_overdue_estimates(&self, today: NaiveDate) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE estimates
            SET status = 'expired'
            WHERE status IN ('draft', 'sent')
              AND expires_date < $1
            "#,
        )
        .bind(today)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn expiry_sweep_is_idempotent() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn converted_invoice_id_set_exactly_once() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn losing_conversion_race_rolls_back_the_invoice() {
        // Requires a running PostgreSQL at DATABASE_URL
    }
}
