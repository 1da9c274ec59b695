use crate::error::app_error::AppError;
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, Salt, SaltString};
use serde::Serialize;
use std::sync::LazyLock;

/// Minimum secret length. Client PINs are four digits; anything
/// shorter is refused for admins too.
const MIN_SECRET_LENGTH: usize = 4;

/// Values seen so often in credential dumps that they are refused
/// outright, regardless of the other rules.
const COMMON_SECRETS: &[&str] = &[
    "password", "passw0rd", "qwerty", "letmein", "admin", "welcome", "abc123", "iloveyou", "invoice",
];

/// A real Argon2 hash generated once at startup, used as a timing decoy
/// so that login requests for non-existent principals take the same
/// time as requests for existing ones.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"dummy-never-matches", Salt::from(&salt))
        .expect("failed to generate dummy hash")
        .to_string()
});

/// Named strength-rule violations, returned as a full list so the
/// caller can present every problem at once instead of one per
/// round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretRuleViolation {
    TooShort,
    RepeatingDigits,
    SequentialDigits,
    CommonValue,
}

impl SecretRuleViolation {
    pub fn describe(&self) -> &'static str {
        match self {
            SecretRuleViolation::TooShort => "too short",
            SecretRuleViolation::RepeatingDigits => "repeating digits",
            SecretRuleViolation::SequentialDigits => "sequential digits",
            SecretRuleViolation::CommonValue => "common value",
        }
    }
}

/// Check a candidate PIN or password against every rule and collect
/// all violations.
pub fn validate_secret_strength(secret: &str) -> Vec<SecretRuleViolation> {
    let mut violations = Vec::new();

    if secret.chars().count() < MIN_SECRET_LENGTH {
        violations.push(SecretRuleViolation::TooShort);
    }
    if is_repeating(secret) {
        violations.push(SecretRuleViolation::RepeatingDigits);
    }
    if is_sequential(secret) {
        violations.push(SecretRuleViolation::SequentialDigits);
    }
    if COMMON_SECRETS.contains(&secret.to_ascii_lowercase().as_str()) {
        violations.push(SecretRuleViolation::CommonValue);
    }

    violations
}

fn is_repeating(secret: &str) -> bool {
    let mut chars = secret.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => false,
    }
}

fn is_sequential(secret: &str) -> bool {
    let digits: Vec<u32> = secret.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != secret.chars().count() || digits.len() < 2 {
        return false;
    }

    let ascending = digits.windows(2).all(|pair| pair[1] == pair[0] + 1);
    let descending = digits.windows(2).all(|pair| pair[0] == pair[1] + 1);
    ascending || descending
}

/// Capability for hashing and verifying secrets, so the concrete
/// algorithm is swappable without touching call sites.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, AppError>;
    fn verify(&self, secret: &str, stored_hash: &str) -> Result<bool, AppError>;
    /// Throwaway verification against a fixed hash, to equalize
    /// response timing when the target account does not exist.
    fn dummy_verify(&self, secret: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, AppError> {
        let salt_string = SaltString::generate(&mut OsRng);
        let salt = Salt::from(&salt_string);
        let hash = PasswordHash::generate(Argon2::default(), secret.as_bytes(), salt)
            .map_err(|e| AppError::password_hash("Failed to hash secret", e))?;

        Ok(hash.to_string())
    }

    fn verify(&self, secret: &str, stored_hash: &str) -> Result<bool, AppError> {
        let parsed = PasswordHash::new(stored_hash).map_err(|e| AppError::password_hash("Failed to parse stored secret hash", e))?;

        match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::password_hash("Secret verification failed", e)),
        }
    }

    fn dummy_verify(&self, secret: &str) {
        if let Ok(hash) = PasswordHash::new(&DUMMY_HASH) {
            let _ = Argon2::default().verify_password(secret.as_bytes(), &hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_pin_is_rejected() {
        assert_eq!(validate_secret_strength("1234"), vec![SecretRuleViolation::SequentialDigits]);
        assert_eq!(validate_secret_strength("9876"), vec![SecretRuleViolation::SequentialDigits]);
    }

    #[test]
    fn repeating_pin_is_rejected() {
        assert_eq!(validate_secret_strength("0000"), vec![SecretRuleViolation::RepeatingDigits]);
    }

    #[test]
    fn compliant_pin_passes() {
        assert!(validate_secret_strength("2719").is_empty());
    }

    #[test]
    fn all_violations_reported_at_once() {
        let violations = validate_secret_strength("123");
        assert!(violations.contains(&SecretRuleViolation::TooShort));
        assert!(violations.contains(&SecretRuleViolation::SequentialDigits));
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn common_values_are_rejected() {
        assert!(validate_secret_strength("Password").contains(&SecretRuleViolation::CommonValue));
        assert!(validate_secret_strength("qwerty").contains(&SecretRuleViolation::CommonValue));
    }

    #[test]
    fn mixed_characters_are_not_sequential() {
        assert!(validate_secret_strength("12a4").is_empty());
    }

    #[test]
    fn hash_then_verify_roundtrip() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("s3cret-pin").expect("hash");
        assert!(hasher.verify("s3cret-pin", &hash).expect("verify"));
        assert!(!hasher.verify("wrong", &hash).expect("verify"));
    }
}
