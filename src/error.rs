//! Unified application error model.
//! One enum shared by the store, identity, upstream clients and HTTP surface,
//! carrying an audit code (the `E....` space the error log records) and a
//! plain message suitable for showing to the user.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Correctable user input (password mismatch, empty selection, no data).
    #[error("{code}: {message}")]
    UserInput { code: String, message: String },
    /// Email outside the approved organizational domain.
    #[error("{code}: {message}")]
    Domain { code: String, message: String },
    /// Registration conflict: email already present.
    #[error("{code}: {message}")]
    DuplicateUser { code: String, message: String },
    /// Login failure. The message never distinguishes an unknown email
    /// from a wrong password.
    #[error("{code}: {message}")]
    InvalidCredentials { code: String, message: String },
    /// Email has no agents mapped and is not on the admin list.
    #[error("{code}: {message}")]
    Unmapped { code: String, message: String },
    /// Authenticated but not allowed: bad CSRF, out-of-scope agents, non-admin log access.
    #[error("{code}: {message}")]
    Forbidden { code: String, message: String },
    /// Tableau or OpenAI failure. Transient; never retried automatically.
    #[error("{code}: {message}")]
    Upstream { code: String, message: String },
    /// Missing or unusable configuration. Fatal at startup.
    #[error("{code}: {message}")]
    Config { code: String, message: String },
    /// Credential or log file IO failure.
    #[error("{code}: {message}")]
    Io { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Domain { code, .. }
            | AppError::DuplicateUser { code, .. }
            | AppError::InvalidCredentials { code, .. }
            | AppError::Unmapped { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Config { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Domain { message, .. }
            | AppError::DuplicateUser { message, .. }
            | AppError::InvalidCredentials { message, .. }
            | AppError::Unmapped { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Config { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn domain<S: Into<String>>(code: S, msg: S) -> Self { AppError::Domain { code: code.into(), message: msg.into() } }
    pub fn duplicate<S: Into<String>>(code: S, msg: S) -> Self { AppError::DuplicateUser { code: code.into(), message: msg.into() } }
    pub fn invalid_credentials<S: Into<String>>(code: S, msg: S) -> Self { AppError::InvalidCredentials { code: code.into(), message: msg.into() } }
    pub fn unmapped<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unmapped { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Domain { .. } => 400,
            AppError::DuplicateUser { .. } => 409,
            AppError::InvalidCredentials { .. } => 401,
            AppError::Unmapped { .. } => 400,
            AppError::Forbidden { .. } => 403,
            AppError::Upstream { .. } => 503,
            AppError::Config { .. } => 500,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        AppError::Internal { code: "E9999".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("E1003", "passwords do not match").http_status(), 400);
        assert_eq!(AppError::domain("E1002", "invalid email").http_status(), 400);
        assert_eq!(AppError::duplicate("E1004", "user exists").http_status(), 409);
        assert_eq!(AppError::invalid_credentials("E1001", "invalid credentials").http_status(), 401);
        assert_eq!(AppError::unmapped("E2001", "no agents mapped").http_status(), 400);
        assert_eq!(AppError::forbidden("E2003", "agent not visible").http_status(), 403);
        assert_eq!(AppError::upstream("E9101", "tableau sign-in failed").http_status(), 503);
        assert_eq!(AppError::config("E9003", "missing secret").http_status(), 500);
        assert_eq!(AppError::io("E9004", "io").http_status(), 503);
        assert_eq!(AppError::internal("E9999", "panic").http_status(), 500);
    }

    #[test]
    fn display_carries_code_and_message() {
        let e = AppError::invalid_credentials("E1001", "Invalid credentials.");
        assert_eq!(e.to_string(), "E1001: Invalid credentials.");
        assert_eq!(e.code_str(), "E1001");
        assert_eq!(e.message(), "Invalid credentials.");
    }

    #[test]
    fn anyhow_maps_to_internal() {
        let e: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(e.code_str(), "E9999");
        assert_eq!(e.http_status(), 500);
    }
}
