use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derived payment status of an invoice. Computed from the payment sum
/// on every read, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    /// Opaque public identifier, 128-bit random hex. Safe to embed in
    /// links; never reused.
    pub unique_id: String,
    /// Sequential human-facing number, e.g. `INV-202608-0042`.
    pub number: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub customer_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A payment recorded against an invoice. Immutable once created.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub customer_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: String,
    pub notes: Option<String>,
}

/// Tax and total derived from a subtotal and a percentage rate.
/// Invariant: `total = subtotal + tax_amount` with the tax rounded to
/// two decimal places (banker-free, half-up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl DocumentTotals {
    pub fn from_subtotal(subtotal: Decimal, tax_rate: Decimal) -> Self {
        let tax_amount = (subtotal * tax_rate / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
        Self {
            subtotal,
            tax_rate,
            tax_amount,
            total: subtotal + tax_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_round_tax_to_two_places() {
        let totals = DocumentTotals::from_subtotal(dec!(100.00), dec!(19.00));
        assert_eq!(totals.tax_amount, dec!(19.00));
        assert_eq!(totals.total, dec!(119.00));

        // 333.33 * 7.7% = 25.666... rounds to 25.67
        let totals = DocumentTotals::from_subtotal(dec!(333.33), dec!(7.7));
        assert_eq!(totals.tax_amount, dec!(25.67));
        assert_eq!(totals.total, dec!(359.00));
    }

    #[test]
    fn zero_rate_means_total_equals_subtotal() {
        let totals = DocumentTotals::from_subtotal(dec!(42.50), Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total, dec!(42.50));
    }
}
