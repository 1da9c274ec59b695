use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Remember and reset tokens: 32 random bytes, hex-encoded.
static TOKEN_FORMAT: LazyLock<Regex> = LazyLock::new(|| Regex::new("^[0-9a-f]{64}$").expect("valid token regex"));

/// Public document identifiers: 16 random bytes, hex-encoded.
static UNIQUE_ID_FORMAT: LazyLock<Regex> = LazyLock::new(|| Regex::new("^[0-9a-f]{32}$").expect("valid unique id regex"));

/// Generate a cryptographically secure token.
/// Returns: (plain_token, token_hash). Only the hash is ever stored;
/// the plain token goes to the caller once and cannot be recovered.
pub fn generate_token() -> (String, String) {
    let mut token_bytes = [0u8; 32];
    rand::thread_rng().fill(&mut token_bytes);
    let token = hex::encode(token_bytes);
    let token_hash = hash_token(&token);

    (token, token_hash)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token);
    hex::encode(hasher.finalize())
}

/// Opaque public identifier for invoices and estimates. 128 bits of
/// randomness; unguessable, never reused.
pub fn generate_unique_id() -> String {
    let mut id_bytes = [0u8; 16];
    rand::thread_rng().fill(&mut id_bytes);
    hex::encode(id_bytes)
}

/// Strict format check applied before any storage lookup, so malformed
/// input is rejected without a wasted query and gets the same uniform
/// "not found" treatment as an unknown token.
pub fn is_well_formed_token(token: &str) -> bool {
    TOKEN_FORMAT.is_match(token)
}

pub fn is_well_formed_unique_id(unique_id: &str) -> bool {
    UNIQUE_ID_FORMAT.is_match(unique_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_is_well_formed() {
        let (token, token_hash) = generate_token();

        assert_eq!(token.len(), 64);
        assert!(is_well_formed_token(&token));

        // Hash is SHA-256 of the hex string, also 64 hex chars
        assert_eq!(token_hash.len(), 64);
        assert_ne!(token, token_hash);
        assert_eq!(token_hash, hash_token(&token));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let (token1, hash1) = generate_token();
        let (token2, hash2) = generate_token();

        assert_ne!(token1, token2);
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn unique_id_is_well_formed() {
        let unique_id = generate_unique_id();
        assert_eq!(unique_id.len(), 32);
        assert!(is_well_formed_unique_id(&unique_id));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(!is_well_formed_token(""));
        assert!(!is_well_formed_token("short"));
        assert!(!is_well_formed_token(&"A".repeat(64))); // uppercase
        assert!(!is_well_formed_token(&"g".repeat(64))); // non-hex
        assert!(!is_well_formed_unique_id(&"f".repeat(64))); // wrong length
    }
}
