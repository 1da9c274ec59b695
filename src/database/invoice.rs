use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::invoice::{DocumentTotals, Invoice, NewInvoice, NewPayment, Payment};
use rust_decimal::Decimal;
use uuid::Uuid;

impl PostgresRepository {
    /// Insert an invoice under the given number. A unique violation on
    /// the number column propagates to the caller, which treats it as a
    /// numbering-collision retry signal.
    pub async fn insert_invoice(&self, new: &NewInvoice, number: &str, unique_id: &str) -> Result<Invoice, AppError> {
        let totals = DocumentTotals::from_subtotal(new.subtotal, new.tax_rate);

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
        .fetch_one(&self.pool)
        .await?;

        Ok(invoice)
    }

    pub async fn get_invoice_by_id(&self, id: &Uuid) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, unique_id, number, date, due_date, subtotal, tax_rate, tax_amount, total, customer_id, created_at
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    pub async fn get_invoice_by_unique_id(&self, unique_id: &str) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, unique_id, number, date, due_date, subtotal, tax_rate, tax_amount, total, customer_id, created_at
            FROM invoices
            WHERE unique_id = $1
            "#,
        )
        .bind(unique_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Payments in insertion order. The status engine recomputes from
    /// this set on every read; nothing derived is cached.
    pub async fn payments_for_invoice(&self, invoice_id: &Uuid) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, invoice_id, amount, payment_date, method, notes
            FROM payments
            WHERE invoice_id = $1
            ORDER BY payment_date, id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    pub async fn create_payment(&self, new: &NewPayment) -> Result<Payment, AppError> {
        if new.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest("Payment amount must be positive".to_string()));
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (invoice_id, amount, payment_date, method, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, invoice_id, amount, payment_date, method, notes
            "#,
        )
        .bind(new.invoice_id)
        .bind(new.amount)
        .bind(new.payment_date)
        .bind(&new.method)
        .bind(&new.notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }
}
