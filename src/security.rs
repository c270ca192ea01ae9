//! Password hashing and email policy helpers.
//! Argon2id with a fresh random salt per entry, PHC-string encoded. Emails
//! are NFKC-normalized and lowercased before any comparison so the
//! credential store stays unique per mailbox, not per spelling.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use unicode_normalization::UnicodeNormalization;

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

/// Argon2 re-derives and compares the full hash, so the comparison cost does
/// not depend on where the candidate diverges.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Canonical form used as the credential/mapping key: NFKC, trimmed, lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}

/// True when the (normalized) email belongs to the approved organizational
/// domain. `domain` is stored without the leading '@'.
pub fn domain_matches(email: &str, domain: &str) -> bool {
    let email = normalize_email(email);
    let suffix = format!("@{}", domain.to_lowercase());
    email.ends_with(&suffix) && email.len() > suffix.len()
}
