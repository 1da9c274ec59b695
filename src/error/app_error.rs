use thiserror::Error;
use validator::ValidationErrors;

use crate::models::estimate::{EstimateAction, EstimateStatus};
use crate::service::secret::SecretRuleViolation;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error")]
    Db {
        message: String,
        #[source]
        source: sqlx::error::Error,
    },
    #[error("Too many requests, try again later")]
    RateLimitExceeded,
    #[error("Invalid email or password")]
    InvalidCredentials { attempts_remaining: Option<i32> },
    #[error("Account is disabled")]
    AccountDisabled,
    #[error("Account is temporarily locked, try again later")]
    AccountLocked,
    #[error("Too many failed attempts, account locked")]
    TooManyAttempts,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Secret does not meet strength requirements")]
    WeakSecret(Vec<SecretRuleViolation>),
    #[error("Cannot {action} an estimate in status {from}")]
    InvalidTransition { from: EstimateStatus, action: EstimateAction },
    #[error("Could not allocate a document number")]
    NumberingFailed,
    #[error("Internal server error")]
    PasswordHash { message: String },
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),
    #[error("Internal server error")]
    ConfigurationError {
        message: String,
        #[source]
        source: figment::Error,
    },
}

impl AppError {
    pub fn db(message: impl Into<String>, source: sqlx::error::Error) -> Self {
        Self::Db {
            message: message.into(),
            source,
        }
    }

    pub fn password_hash(message: impl Into<String>, source: password_hash::Error) -> Self {
        Self::PasswordHash {
            message: format!("{}: {}", message.into(), source),
        }
    }

    /// True when the underlying database error is a unique-constraint
    /// violation. Document numbering treats this as a retry signal.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Db {
                source: sqlx::Error::Database(db_err),
                ..
            } => db_err.is_unique_violation(),
            _ => false,
        }
    }

    /// The message safe to show an unauthenticated caller.
    ///
    /// Every authentication failure collapses to one of two generic
    /// strings so that responses never reveal whether an account exists
    /// or why exactly it was refused. Only `WeakSecret` and
    /// `InvalidTransition` carry their detail through, since neither
    /// depends on account existence.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidCredentials { .. } | AppError::InvalidToken => "Invalid email or password".to_string(),
            AppError::RateLimitExceeded | AppError::AccountDisabled | AppError::AccountLocked | AppError::TooManyAttempts => {
                "Try again later".to_string()
            }
            AppError::WeakSecret(violations) => {
                let rules: Vec<&str> = violations.iter().map(SecretRuleViolation::describe).collect();
                format!("Secret does not meet strength requirements: {}", rules.join(", "))
            }
            AppError::InvalidTransition { .. } | AppError::BadRequest(_) | AppError::NotFound(_) | AppError::ValidationError(_) => {
                self.to_string()
            }
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<password_hash::Error> for AppError {
    fn from(e: password_hash::Error) -> Self {
        AppError::password_hash("Password hashing failed", e)
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::ConfigurationError {
            message: "Failed to read configuration".to_string(),
            source: e,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::db("Database error", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_collapse_to_generic_messages() {
        let kinds = [
            AppError::InvalidCredentials { attempts_remaining: Some(2) },
            AppError::InvalidToken,
        ];
        for kind in kinds {
            assert_eq!(kind.user_message(), "Invalid email or password");
        }

        let throttled = [
            AppError::RateLimitExceeded,
            AppError::AccountDisabled,
            AppError::AccountLocked,
            AppError::TooManyAttempts,
        ];
        for kind in throttled {
            assert_eq!(kind.user_message(), "Try again later");
        }
    }

    #[test]
    fn weak_secret_lists_every_violation() {
        let err = AppError::WeakSecret(vec![SecretRuleViolation::TooShort, SecretRuleViolation::SequentialDigits]);
        let message = err.user_message();
        assert!(message.contains("too short"));
        assert!(message.contains("sequential"));
    }

    #[test]
    fn invalid_transition_surfaces_verbatim() {
        let err = AppError::InvalidTransition {
            from: EstimateStatus::Approved,
            action: EstimateAction::Approve,
        };
        assert_eq!(err.user_message(), err.to_string());
        assert!(err.user_message().contains("approved"));
    }
}
