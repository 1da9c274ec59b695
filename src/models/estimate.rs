use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Persisted estimate lifecycle status, changed only through the
/// guarded transitions in `service::status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EstimateStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
}

impl fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EstimateStatus::Draft => "draft",
            EstimateStatus::Sent => "sent",
            EstimateStatus::Approved => "approved",
            EstimateStatus::Rejected => "rejected",
            EstimateStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// Requested lifecycle change. Expiry is time-triggered by the sweep,
/// the rest are explicit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateAction {
    Send,
    Approve,
    Reject,
    Expire,
    Convert,
}

impl fmt::Display for EstimateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EstimateAction::Send => "send",
            EstimateAction::Approve => "approve",
            EstimateAction::Reject => "reject",
            EstimateAction::Expire => "expire",
            EstimateAction::Convert => "convert",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Estimate {
    pub id: Uuid,
    /// Opaque public identifier used by the online-approval link.
    pub unique_id: String,
    pub number: String,
    pub date: NaiveDate,
    pub expires_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub status: EstimateStatus,
    pub allow_online_approval: bool,
    /// Set exactly once when an approved estimate converts.
    pub converted_invoice_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEstimate {
    pub date: NaiveDate,
    pub expires_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub allow_online_approval: bool,
    pub customer_id: Uuid,
}
