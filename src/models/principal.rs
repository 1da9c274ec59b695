use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Who is authenticating: staff with full access, or a customer
/// logging into the client portal with a PIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Admin,
    Client,
}

/// An authenticable identity. One row per admin or portal client.
///
/// Never hard-deleted; deactivation flips `is_active`. Token columns
/// hold SHA-256 hashes of the plain tokens, never the tokens
/// themselves.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Principal {
    pub id: Uuid,
    pub kind: PrincipalKind,
    pub email: String,
    pub secret_hash: String,
    pub login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub remember_token_hash: Option<String>,
    pub remember_expires: Option<DateTime<Utc>>,
    pub reset_token_hash: Option<String>,
    pub reset_expires: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Principal {
    /// A future `locked_until` refuses login regardless of secret
    /// correctness.
    pub fn is_locked(&self) -> bool {
        self.locked_until.is_some_and(|until| until > Utc::now())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub secret: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteResetRequest {
    #[validate(length(equal = 64))]
    pub token: String,
    pub new_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn principal(locked_until: Option<DateTime<Utc>>) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            kind: PrincipalKind::Admin,
            email: "admin@example.com".to_string(),
            secret_hash: String::new(),
            login_attempts: 0,
            locked_until,
            is_active: true,
            remember_token_hash: None,
            remember_expires: None,
            reset_token_hash: None,
            reset_expires: None,
            last_login: None,
        }
    }

    #[test]
    fn lock_in_future_is_locked() {
        assert!(principal(Some(Utc::now() + Duration::minutes(5))).is_locked());
    }

    #[test]
    fn expired_lock_is_not_locked() {
        assert!(!principal(Some(Utc::now() - Duration::minutes(5))).is_locked());
        assert!(!principal(None).is_locked());
    }
}
