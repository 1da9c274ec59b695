use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Event types for the activity log
pub mod activity_events {
    // Authentication events
    pub const LOGIN_SUCCESS: &str = "login_success";
    pub const LOGIN_FAILED: &str = "login_failed";
    pub const LOGOUT: &str = "logout";
    pub const ACCOUNT_LOCKED: &str = "account_locked";
    pub const REMEMBER_LOGIN: &str = "remember_login";

    // Reset events
    pub const RESET_REQUESTED: &str = "reset_requested";
    pub const RESET_COMPLETED: &str = "reset_completed";
    pub const RESET_FAILED: &str = "reset_failed";

    // Document events
    pub const ESTIMATE_SENT: &str = "estimate_sent";
    pub const ESTIMATE_APPROVED: &str = "estimate_approved";
    pub const ESTIMATE_REJECTED: &str = "estimate_rejected";
    pub const ESTIMATE_CONVERTED: &str = "estimate_converted";
    pub const NUMBERING_FALLBACK: &str = "numbering_fallback";
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityLog {
    pub id: Uuid,
    pub principal_id: Option<Uuid>,
    pub action: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
