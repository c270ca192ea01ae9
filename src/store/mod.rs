//!
//! teamlens credential store
//! -------------------------
//! Repository abstraction over the flat credential file. The backing store
//! is one JSON object mapping normalized email -> Argon2 PHC hash string
//! (`users.json`), created empty on first open. Writes go through the
//! in-process map and are persisted whole-file; there is no cross-process
//! locking, so concurrent registration from two instances is last-writer-wins
//! (known gap, inherited from the original deployment).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::error::AppError;
use crate::security::{domain_matches, hash_password, normalize_email, verify_password};

/// Data-access interface for user credentials, so the flat-file backing can
/// be swapped for an embedded database without touching callers.
pub trait CredentialStore: Send + Sync {
    /// Create a credential entry. Fails with `Domain` when the email is
    /// outside the approved domain and `DuplicateUser` when it already
    /// exists; on success the entry is durably written before returning.
    fn register(&self, email: &str, password: &str) -> Result<(), AppError>;
    /// Check a password against the stored hash. Unknown email and wrong
    /// password are indistinguishable: both are `Ok(false)`.
    fn verify(&self, email: &str, password: &str) -> Result<bool, AppError>;
    /// All registered emails, normalized, in stable order.
    fn emails(&self) -> Vec<String>;
}

/// Flat-file credential store over `users.json`.
pub struct JsonCredentialStore {
    path: PathBuf,
    email_domain: String,
    users: Mutex<BTreeMap<String, String>>,
}

impl JsonCredentialStore {
    /// Open the store, creating an empty credential file if absent.
    pub fn open<P: AsRef<Path>>(path: P, email_domain: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() { fs::create_dir_all(dir).ok(); }
        if !path.exists() {
            fs::write(&path, "{}").with_context(|| format!("creating credential file {}", path.display()))?;
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading credential file {}", path.display()))?;
        let users: BTreeMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing credential file {}", path.display()))?;
        Ok(Self { path, email_domain: email_domain.to_string(), users: Mutex::new(users) })
    }

    fn persist(&self, users: &BTreeMap<String, String>) -> Result<(), AppError> {
        let body = serde_json::to_string(users)
            .map_err(|e| AppError::io("E9004".to_string(), format!("serializing credential store: {e}")))?;
        fs::write(&self.path, body)
            .map_err(|e| AppError::io("E9004".to_string(), format!("writing {}: {e}", self.path.display())))
    }
}

impl CredentialStore for JsonCredentialStore {
    fn register(&self, email: &str, password: &str) -> Result<(), AppError> {
        if !domain_matches(email, &self.email_domain) {
            return Err(AppError::domain("E1002".to_string(), format!("Invalid {} email.", self.email_domain)));
        }
        let key = normalize_email(email);
        let mut users = self.users.lock();
        if users.contains_key(&key) {
            return Err(AppError::duplicate("E1004", "User exists."));
        }
        let phc = hash_password(password)
            .map_err(|e| AppError::internal("E9999".to_string(), format!("password hashing failed: {e}")))?;
        users.insert(key, phc);
        self.persist(&users)
    }

    fn verify(&self, email: &str, password: &str) -> Result<bool, AppError> {
        let key = normalize_email(email);
        let users = self.users.lock();
        match users.get(&key) {
            Some(phc) => Ok(verify_password(phc, password)),
            None => Ok(false),
        }
    }

    fn emails(&self) -> Vec<String> {
        self.users.lock().keys().cloned().collect()
    }
}
