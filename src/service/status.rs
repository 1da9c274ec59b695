use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::audit::activity_events;
use crate::models::estimate::{Estimate, EstimateAction, EstimateStatus};
use crate::models::invoice::{Invoice, NewInvoice, Payment, PaymentStatus};
use crate::service::numbering::NumberingService;
use crate::service::token;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Derived payment state of an invoice. Recomputed from the payment
/// set on every query; nothing here is ever cached or persisted, since
/// payments can arrive out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSummary {
    pub status: PaymentStatus,
    pub total_paid: Decimal,
    /// `total - total_paid`. Deliberately not clamped: an overpaid
    /// invoice carries a negative balance that callers must surface,
    /// not hide. Flooring at zero is a presentation concern.
    pub balance: Decimal,
}

impl PaymentSummary {
    pub fn is_overpaid(&self) -> bool {
        self.balance < Decimal::ZERO
    }
}

/// Pure status derivation over the invoice total and its payments.
pub fn payment_summary(total: Decimal, payments: &[Payment]) -> PaymentSummary {
    let total_paid: Decimal = payments.iter().map(|payment| payment.amount).sum();

    let status = if total_paid >= total {
        PaymentStatus::Paid
    } else if total_paid > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    };

    PaymentSummary {
        status,
        total_paid,
        balance: total - total_paid,
    }
}

impl EstimateStatus {
    /// The estimate lifecycle table. Anything not listed is an invalid
    /// transition, reported rather than silently ignored. The only
    /// permitted self-loop is re-expiring an expired estimate, which
    /// keeps the time-triggered sweep idempotent.
    pub fn transition(self, action: EstimateAction) -> Result<EstimateStatus, AppError> {
        use EstimateAction::*;
        use EstimateStatus::*;

        match (self, action) {
            (Draft, Send) => Ok(Sent),
            (Sent, Approve) => Ok(Approved),
            (Sent, Reject) => Ok(Rejected),
            (Draft | Sent | Expired, Expire) => Ok(Expired),
            (from, action) => Err(AppError::InvalidTransition { from, action }),
        }
    }
}

impl Estimate {
    pub fn can_edit(&self) -> bool {
        self.status == EstimateStatus::Draft
    }

    pub fn can_convert(&self) -> bool {
        self.status == EstimateStatus::Approved && self.converted_invoice_id.is_none()
    }
}

/// Guarded estimate lifecycle operations over storage. All status
/// writes go through compare-and-set updates, so two racing requests
/// can never both win the same transition.
pub struct EstimateLifecycle<'a> {
    pub repo: &'a PostgresRepository,
}

impl EstimateLifecycle<'_> {
    pub async fn transition(&self, estimate_id: &Uuid, action: EstimateAction, actor: Option<&Uuid>) -> Result<EstimateStatus, AppError> {
        let estimate = self
            .repo
            .get_estimate_by_id(estimate_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Estimate not found".to_string()))?;

        let next = estimate.status.transition(action)?;
        if next == estimate.status {
            return Ok(next);
        }

        if !self.repo.update_estimate_status(estimate_id, estimate.status, next).await? {
            // Lost a race; report the state the row is actually in.
            let from = self
                .repo
                .get_estimate_by_id(estimate_id)
                .await?
                .map(|estimate| estimate.status)
                .unwrap_or(estimate.status);
            return Err(AppError::InvalidTransition { from, action });
        }

        let event = match action {
            EstimateAction::Send => Some(activity_events::ESTIMATE_SENT),
            EstimateAction::Approve => Some(activity_events::ESTIMATE_APPROVED),
            EstimateAction::Reject => Some(activity_events::ESTIMATE_REJECTED),
            // Expiry is swept in bulk and logged there; Convert never
            // reaches this path.
            EstimateAction::Expire | EstimateAction::Convert => None,
        };
        if let Some(event) = event {
            let _ = self
                .repo
                .record_activity(actor, event, &format!("estimate {} -> {next}", estimate.number))
                .await;
        }

        Ok(next)
    }

    /// Approval or rejection through the public link. Permitted only
    /// when the estimate opted into online approval; everything else,
    /// including a malformed or unknown identifier, collapses into the
    /// same "not found" so the link leaks nothing.
    pub async fn respond_online(&self, unique_id: &str, action: EstimateAction) -> Result<EstimateStatus, AppError> {
        if !matches!(action, EstimateAction::Approve | EstimateAction::Reject) {
            return Err(AppError::BadRequest("Only approve and reject are available online".to_string()));
        }

        // Strict format check before any storage lookup.
        if !token::is_well_formed_unique_id(unique_id) {
            return Err(AppError::NotFound("Estimate not found".to_string()));
        }

        let estimate = self
            .repo
            .get_estimate_by_unique_id(unique_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Estimate not found".to_string()))?;

        if !estimate.allow_online_approval {
            return Err(AppError::NotFound("Estimate not found".to_string()));
        }

        self.transition(&estimate.id, action, None).await
    }

    /// One-way conversion of an approved estimate into an invoice. The
    /// invoice insert and the `converted_invoice_id` claim share one
    /// transaction, so the claim is made exactly once and a lost race
    /// leaves no invoice behind.
    pub async fn convert_to_invoice(
        &self,
        estimate_id: &Uuid,
        numbering: &NumberingService<'_>,
        new_invoice: NewInvoice,
        actor: Option<&Uuid>,
    ) -> Result<Invoice, AppError> {
        let estimate = self
            .repo
            .get_estimate_by_id(estimate_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Estimate not found".to_string()))?;

        if !estimate.can_convert() {
            return Err(AppError::InvalidTransition {
                from: estimate.status,
                action: EstimateAction::Convert,
            });
        }

        let Some((invoice, number)) = numbering.create_converted_invoice(estimate_id, &new_invoice).await? else {
            // Another request converted first; the losing transaction
            // rolled back, so no invoice was written.
            return Err(AppError::InvalidTransition {
                from: EstimateStatus::Approved,
                action: EstimateAction::Convert,
            });
        };

        let _ = self
            .repo
            .record_activity(
                actor,
                activity_events::ESTIMATE_CONVERTED,
                &format!("estimate {} converted to invoice {}", estimate.number, number.value),
            )
            .await;

        Ok(invoice)
    }

    /// Time-triggered expiry of draft and sent estimates whose
    /// `expires_date` has passed. Safe to re-run at any cadence.
    pub async fn run_expiry_sweep(&self) -> Result<u64, AppError> {
        let expired = self.repo.expire_overdue_estimates(Utc::now().date_naive()).await?;
        if expired > 0 {
            info!(expired, "expired overdue estimates");
        }

        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn payment(amount: Decimal) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            amount,
            payment_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            method: "bank_transfer".to_string(),
            notes: None,
        }
    }

    #[test]
    fn no_payments_is_unpaid_with_full_balance() {
        let summary = payment_summary(dec!(100.00), &[]);
        assert_eq!(summary.status, PaymentStatus::Unpaid);
        assert_eq!(summary.total_paid, Decimal::ZERO);
        assert_eq!(summary.balance, dec!(100.00));
    }

    #[test]
    fn partial_payment_leaves_balance() {
        let summary = payment_summary(dec!(100.00), &[payment(dec!(40.00))]);
        assert_eq!(summary.status, PaymentStatus::Partial);
        assert_eq!(summary.balance, dec!(60.00));
    }

    #[test]
    fn payments_summing_to_total_are_paid() {
        let summary = payment_summary(dec!(100.00), &[payment(dec!(40.00)), payment(dec!(60.00))]);
        assert_eq!(summary.status, PaymentStatus::Paid);
        assert_eq!(summary.balance, Decimal::ZERO);
        assert!(!summary.is_overpaid());
    }

    #[test]
    fn overpayment_is_surfaced_not_clamped() {
        let summary = payment_summary(dec!(100.00), &[payment(dec!(150.00))]);
        assert_eq!(summary.status, PaymentStatus::Paid);
        assert_eq!(summary.balance, dec!(-50.00));
        assert!(summary.is_overpaid());
    }

    #[test]
    fn lifecycle_happy_paths() {
        use EstimateAction::*;
        use EstimateStatus::*;

        assert_eq!(Draft.transition(Send).unwrap(), Sent);
        assert_eq!(Sent.transition(Approve).unwrap(), Approved);
        assert_eq!(Sent.transition(Reject).unwrap(), Rejected);
        assert_eq!(Draft.transition(Expire).unwrap(), Expired);
        assert_eq!(Sent.transition(Expire).unwrap(), Expired);
        // Re-expiring is a no-op, keeping the sweep idempotent
        assert_eq!(Expired.transition(Expire).unwrap(), Expired);
    }

    #[test]
    fn approved_estimate_rejects_second_decision() {
        use EstimateAction::*;
        use EstimateStatus::*;

        let approved = Sent.transition(Approve).unwrap();
        assert!(matches!(
            approved.transition(Approve),
            Err(AppError::InvalidTransition { from: Approved, action: Approve })
        ));
        assert!(matches!(
            approved.transition(Reject),
            Err(AppError::InvalidTransition { from: Approved, action: Reject })
        ));
    }

    #[test]
    fn terminal_states_refuse_everything_but_reexpiry() {
        use EstimateAction::*;
        use EstimateStatus::*;

        for terminal in [Approved, Rejected, Expired] {
            assert!(terminal.transition(Send).is_err());
            assert!(terminal.transition(Convert).is_err());
        }
        assert!(Approved.transition(Expire).is_err());
        assert!(Rejected.transition(Expire).is_err());
    }

    fn money() -> impl Strategy<Value = Decimal> {
        // Two-decimal amounts up to 1,000,000.00
        (0i64..=100_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #[test]
        fn status_partitions_on_paid_sum(total in money(), amounts in prop::collection::vec(money(), 0..8)) {
            let payments: Vec<Payment> = amounts.iter().map(|amount| payment(*amount)).collect();
            let summary = payment_summary(total, &payments);

            let paid_sum: Decimal = amounts.iter().copied().sum();
            prop_assert_eq!(summary.total_paid, paid_sum);
            prop_assert_eq!(summary.balance, total - paid_sum);

            match summary.status {
                PaymentStatus::Paid => prop_assert!(paid_sum >= total),
                PaymentStatus::Partial => prop_assert!(paid_sum > Decimal::ZERO && paid_sum < total),
                PaymentStatus::Unpaid => prop_assert!(paid_sum <= Decimal::ZERO),
            }
        }

        #[test]
        fn balance_is_never_hidden(total in money(), amount in money()) {
            let summary = payment_summary(total, &[payment(amount)]);
            prop_assert_eq!(summary.balance + summary.total_paid, total);
            prop_assert_eq!(summary.is_overpaid(), amount > total);
        }
    }
}
