use crate::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::audit::activity_events;
use crate::models::principal::{CompleteResetRequest, LoginRequest, Principal, PrincipalKind, ResetRequest};
use crate::models::rate_limit::actions;
use crate::models::session::Session;
use crate::service::secret::{self, SecretHasher};
use crate::service::token;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

/// Request-scoped authenticated identity, handed to page handlers
/// after a successful login or session lookup. Replaces any ambient
/// "current user" global.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal {
    pub id: Uuid,
    pub kind: PrincipalKind,
    pub email: String,
}

/// Everything a successful login produces. The plain remember token is
/// present only when the caller asked for one, and only this once.
#[derive(Debug)]
pub struct LoginOutcome {
    pub session: Session,
    pub principal: CurrentPrincipal,
    pub remember_token: Option<String>,
}

/// A freshly issued reset token plus the link path the mail sender
/// should embed. Email delivery itself is the caller's concern.
#[derive(Debug)]
pub struct ResetIssued {
    pub token: String,
    pub link_path: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthService<'a> {
    pub repo: &'a PostgresRepository,
    pub config: &'a Config,
    pub hasher: &'a dyn SecretHasher,
}

impl AuthService<'_> {
    /// Authenticate a login attempt. Terminal outcomes are evaluated in
    /// a fixed order: rate limit, account lookup, disabled, locked,
    /// secret verification. The rate limit fails closed before any
    /// account lookup happens.
    pub async fn login(
        &self,
        kind: PrincipalKind,
        request: &LoginRequest,
        client_ip: &str,
        current_session: Option<&Uuid>,
    ) -> Result<LoginOutcome, AppError> {
        request.validate()?;

        let (action, max_attempts, window_minutes) = self.login_limits(kind);
        for identifier in Self::login_identifiers(kind, client_ip, &request.email) {
            self.repo.check_rate_limit(action, &identifier, max_attempts, window_minutes).await?;
        }

        let Some(principal) = self.repo.get_principal_by_email(kind, &request.email).await? else {
            // Burn the same hashing time as a real verification so the
            // response latency does not reveal account existence.
            self.hasher.dummy_verify(&request.secret);
            self.note_login_failure(kind, client_ip, &request.email).await;
            let _ = self
                .repo
                .record_activity(None, activity_events::LOGIN_FAILED, &format!("unknown {kind:?} email"))
                .await;
            return Err(AppError::InvalidCredentials { attempts_remaining: None });
        };

        if !principal.is_active {
            let _ = self
                .repo
                .record_activity(Some(&principal.id), activity_events::LOGIN_FAILED, "login on disabled account")
                .await;
            return Err(AppError::AccountDisabled);
        }

        // A live lock refuses the attempt without touching the secret.
        if principal.is_locked() {
            let _ = self
                .repo
                .record_activity(Some(&principal.id), activity_events::LOGIN_FAILED, "login on locked account")
                .await;
            return Err(AppError::AccountLocked);
        }

        if !self.hasher.verify(&request.secret, &principal.secret_hash)? {
            self.note_login_failure(kind, client_ip, &request.email).await;

            let security = &self.config.security;
            let result = self
                .repo
                .record_failed_login(&principal.id, security.max_login_attempts, security.lockout_minutes)
                .await?;

            if result.login_attempts >= security.max_login_attempts {
                warn!(principal_id = %principal.id, attempts = result.login_attempts, "account locked after repeated failures");
                let _ = self
                    .repo
                    .record_activity(
                        Some(&principal.id),
                        activity_events::ACCOUNT_LOCKED,
                        &format!("locked for {} minutes after {} failed attempts", security.lockout_minutes, result.login_attempts),
                    )
                    .await;
                return Err(AppError::TooManyAttempts);
            }

            let _ = self
                .repo
                .record_activity(Some(&principal.id), activity_events::LOGIN_FAILED, "wrong secret")
                .await;
            // The remaining-attempts count goes only to the caller who
            // just failed this verification, never to any other flow.
            return Err(AppError::InvalidCredentials {
                attempts_remaining: Some((security.max_login_attempts - result.login_attempts).max(0)),
            });
        }

        self.establish(principal, kind, client_ip, request.remember, current_session, activity_events::LOGIN_SUCCESS)
            .await
    }

    /// Implicit login from a remember token: the full success-path
    /// side-effect set, including session regeneration, without a
    /// secret entry. Malformed tokens are refused before any lookup.
    pub async fn login_with_remember_token(&self, plain_token: &str, current_session: Option<&Uuid>) -> Result<LoginOutcome, AppError> {
        if !token::is_well_formed_token(plain_token) {
            return Err(AppError::InvalidToken);
        }

        let token_hash = token::hash_token(plain_token);
        let Some(principal) = self.repo.get_principal_by_remember_token(&token_hash).await? else {
            return Err(AppError::InvalidToken);
        };

        if principal.is_locked() {
            return Err(AppError::AccountLocked);
        }

        let kind = principal.kind;
        self.establish(principal, kind, "", false, current_session, activity_events::REMEMBER_LOGIN)
            .await
    }

    pub async fn logout(&self, session_id: &Uuid, principal: Option<&CurrentPrincipal>) -> Result<(), AppError> {
        self.repo.delete_session(session_id).await?;
        let _ = self
            .repo
            .record_activity(principal.map(|p| &p.id), activity_events::LOGOUT, "logged out")
            .await;

        Ok(())
    }

    /// Issue a reset token for the account, if it exists. Returns
    /// `Ok(None)` for unknown emails; the caller must present the same
    /// response either way so the flow cannot be used for enumeration.
    /// Rate-limited under the stricter reset policy: this flow is an
    /// account-takeover vector.
    pub async fn request_reset(&self, kind: PrincipalKind, request: &ResetRequest, client_ip: &str) -> Result<Option<ResetIssued>, AppError> {
        request.validate()?;

        let limits = &self.config.rate_limit;
        for identifier in [client_ip, request.email.as_str()] {
            self.repo
                .check_rate_limit(actions::RESET_REQUEST, identifier, limits.reset_max_attempts, limits.reset_window_minutes)
                .await?;
            // Every request counts against the window, successful or not.
            self.repo
                .record_failed_attempt(actions::RESET_REQUEST, identifier, limits.reset_window_minutes)
                .await?;
        }

        let Some(principal) = self.repo.get_principal_by_email(kind, &request.email).await? else {
            self.hasher.dummy_verify("decoy-secret");
            let _ = self
                .repo
                .record_activity(None, activity_events::RESET_FAILED, "reset requested for unknown email")
                .await;
            return Ok(None);
        };

        if !principal.is_active {
            let _ = self
                .repo
                .record_activity(Some(&principal.id), activity_events::RESET_FAILED, "reset requested for disabled account")
                .await;
            return Ok(None);
        }

        let (plain_token, token_hash) = token::generate_token();
        let expires_at = Utc::now() + Duration::minutes(self.config.security.reset_token_ttl_minutes);
        self.repo.store_reset_token(&principal.id, &token_hash, expires_at).await?;

        let _ = self
            .repo
            .record_activity(Some(&principal.id), activity_events::RESET_REQUESTED, "reset token issued")
            .await;

        Ok(Some(ResetIssued {
            link_path: format!("/reset/{plain_token}"),
            token: plain_token,
            expires_at,
        }))
    }

    /// Consume a reset token and install a new secret. Strength
    /// validation runs before the token is touched, so a weak secret
    /// never costs the caller their single-use token.
    pub async fn complete_reset(&self, request: &CompleteResetRequest, client_ip: &str) -> Result<Uuid, AppError> {
        let limits = &self.config.rate_limit;
        self.repo
            .check_rate_limit(actions::RESET_COMPLETE, client_ip, limits.reset_max_attempts, limits.reset_window_minutes)
            .await?;

        let violations = secret::validate_secret_strength(&request.new_secret);
        if !violations.is_empty() {
            return Err(AppError::WeakSecret(violations));
        }

        if !token::is_well_formed_token(&request.token) {
            self.repo
                .record_failed_attempt(actions::RESET_COMPLETE, client_ip, limits.reset_window_minutes)
                .await?;
            return Err(AppError::InvalidToken);
        }

        let token_hash = token::hash_token(&request.token);
        let new_secret_hash = self.hasher.hash(&request.new_secret)?;

        // Single-statement consume: expired, already-used, and unknown
        // tokens all land in the same None branch.
        let Some(principal_id) = self.repo.consume_reset_token(&token_hash, &new_secret_hash).await? else {
            self.repo
                .record_failed_attempt(actions::RESET_COMPLETE, client_ip, limits.reset_window_minutes)
                .await?;
            let _ = self
                .repo
                .record_activity(None, activity_events::RESET_FAILED, "invalid or expired reset token")
                .await;
            return Err(AppError::InvalidToken);
        };

        // Sessions opened under the old secret die with it.
        let invalidated = self.repo.invalidate_all_sessions(&principal_id).await?;
        self.repo.record_successful_attempt(actions::RESET_COMPLETE, client_ip).await?;
        let _ = self
            .repo
            .record_activity(
                Some(&principal_id),
                activity_events::RESET_COMPLETED,
                &format!("secret replaced, {invalidated} sessions invalidated"),
            )
            .await;
        info!(principal_id = %principal_id, "reset completed");

        Ok(principal_id)
    }

    /// Success path shared by credential and remember-token login.
    /// Session regeneration happens strictly before any other session
    /// state is written.
    async fn establish(
        &self,
        principal: Principal,
        kind: PrincipalKind,
        client_ip: &str,
        remember: bool,
        current_session: Option<&Uuid>,
        event: &'static str,
    ) -> Result<LoginOutcome, AppError> {
        let expires_at = Utc::now() + Duration::hours(self.config.security.session_ttl_hours);
        let session = self.repo.regenerate_session(current_session, &principal.id, expires_at).await?;

        self.repo.record_successful_login(&principal.id).await?;

        let (action, _, _) = self.login_limits(kind);
        for identifier in Self::login_identifiers(kind, client_ip, &principal.email) {
            if !identifier.is_empty() {
                self.repo.record_successful_attempt(action, &identifier).await?;
            }
        }

        let _ = self.repo.record_activity(Some(&principal.id), event, "login").await;

        let remember_token = if remember {
            let (plain_token, token_hash) = token::generate_token();
            let remember_expires = Utc::now() + Duration::days(self.config.security.remember_token_days);
            self.repo.store_remember_token(&principal.id, &token_hash, remember_expires).await?;
            Some(plain_token)
        } else {
            None
        };

        Ok(LoginOutcome {
            session,
            principal: CurrentPrincipal {
                id: principal.id,
                kind: principal.kind,
                email: principal.email,
            },
            remember_token,
        })
    }

    fn login_limits(&self, kind: PrincipalKind) -> (&'static str, i64, i64) {
        let limits = &self.config.rate_limit;
        match kind {
            PrincipalKind::Admin => (actions::ADMIN_LOGIN, limits.login_max_attempts, limits.login_window_minutes),
            PrincipalKind::Client => (
                actions::CLIENT_LOGIN,
                limits.client_login_max_attempts,
                limits.client_login_window_minutes,
            ),
        }
    }

    /// Buckets consulted for a login: per-IP, per-email, and for the
    /// client portal also the shared portal-wide bucket.
    fn login_identifiers(kind: PrincipalKind, client_ip: &str, email: &str) -> Vec<String> {
        let mut identifiers = vec![client_ip.to_string(), email.to_string()];
        if kind == PrincipalKind::Client {
            identifiers.push(actions::GLOBAL_CLIENT_IDENTIFIER.to_string());
        }
        identifiers.retain(|identifier| !identifier.is_empty());
        identifiers
    }

    async fn note_login_failure(&self, kind: PrincipalKind, client_ip: &str, email: &str) {
        let (action, _, window_minutes) = self.login_limits(kind);
        for identifier in Self::login_identifiers(kind, client_ip, email) {
            if let Err(err) = self.repo.record_failed_attempt(action, &identifier, window_minutes).await {
                warn!(action, identifier = %identifier, error = ?err, "failed to record rate-limit attempt");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn fifth_failed_login_locks_for_thirty_minutes() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn sixth_attempt_during_lockout_skips_secret_check() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn successful_login_resets_counter_and_regenerates_session() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reset_token_cannot_be_consumed_twice() {
        // Requires a running PostgreSQL at DATABASE_URL
    }
}
