// Keep provider request/response plain Rust structs to avoid serde requirements on Session

use std::sync::Arc;

use crate::access::AccessMap;
use crate::error::AppError;
use crate::security::{domain_matches, normalize_email};
use crate::store::CredentialStore;
use crate::tprintln;

use super::principal::{Principal, Role};
use super::session::{Session, SessionManager};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AppError>;
}

/// Authenticator backed by the local credential store and access mapping.
/// Role resolution: admin iff the email is on the static admin list,
/// supervisor otherwise.
pub struct LocalAuthProvider {
    email_domain: String,
    store: Arc<dyn CredentialStore>,
    access: Arc<AccessMap>,
    sessions: Arc<SessionManager>,
}

impl LocalAuthProvider {
    pub fn new(
        email_domain: String,
        store: Arc<dyn CredentialStore>,
        access: Arc<AccessMap>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self { email_domain, store, access, sessions }
    }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AppError> {
        if !domain_matches(&req.email, &self.email_domain) {
            return Err(AppError::domain("E1002".to_string(), format!("Invalid {} email.", self.email_domain)));
        }
        // One uniform rejection for unknown email and wrong password.
        if !self.store.verify(&req.email, &req.password)? {
            return Err(AppError::invalid_credentials("E1001", "Invalid credentials."));
        }
        let email = normalize_email(&req.email);
        let role = if self.access.is_admin(&email) { Role::Admin } else { Role::Supervisor };
        let session = self.sessions.issue(Principal { email: email.clone(), role });
        tprintln!("auth.login user={} sid={}", email, session.session_id);
        Ok(LoginResponse { session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AuthState;
    use crate::store::JsonCredentialStore;
    use std::collections::BTreeMap;

    const DOMAIN: &str = "org.com";

    fn fixture(tmp: &tempfile::TempDir) -> (LocalAuthProvider, Arc<SessionManager>) {
        let store = JsonCredentialStore::open(tmp.path().join("users.json"), DOMAIN).unwrap();
        store.register("a@org.com", "pw-a").unwrap();
        store.register("root@org.com", "pw-root").unwrap();
        let mut m = BTreeMap::new();
        m.insert("a@org.com".to_string(), vec!["Agent1".to_string(), "Agent2".to_string()]);
        m.insert("root@org.com".to_string(), Vec::new());
        let access = AccessMap::from_map(m, &["root@org.com".to_string()]);
        let sessions = Arc::new(SessionManager::default());
        let provider = LocalAuthProvider::new(
            DOMAIN.to_string(),
            Arc::new(store),
            Arc::new(access),
            sessions.clone(),
        );
        (provider, sessions)
    }

    #[test]
    fn login_assigns_roles_from_admin_list() {
        let tmp = tempfile::tempdir().unwrap();
        let (provider, _sm) = fixture(&tmp);
        let sup = provider.login(&LoginRequest { email: "a@org.com".into(), password: "pw-a".into() }).unwrap();
        assert_eq!(sup.session.principal.role, Role::Supervisor);
        let adm = provider.login(&LoginRequest { email: "root@org.com".into(), password: "pw-root".into() }).unwrap();
        assert_eq!(adm.session.principal.role, Role::Admin);
    }

    #[test]
    fn wrong_password_and_unknown_user_are_indistinguishable() {
        let tmp = tempfile::tempdir().unwrap();
        let (provider, _sm) = fixture(&tmp);
        let e1 = provider.login(&LoginRequest { email: "a@org.com".into(), password: "nope".into() }).unwrap_err();
        let e2 = provider.login(&LoginRequest { email: "ghost@org.com".into(), password: "nope".into() }).unwrap_err();
        assert_eq!(e1.to_string(), e2.to_string());
        assert_eq!(e1.code_str(), "E1001");
    }

    #[test]
    fn off_domain_login_rejected_before_store_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let (provider, _sm) = fixture(&tmp);
        let err = provider.login(&LoginRequest { email: "a@other.com".into(), password: "pw-a".into() }).unwrap_err();
        assert_eq!(err.code_str(), "E1002");
    }

    #[test]
    fn login_then_logout_always_ends_anonymous() {
        let tmp = tempfile::tempdir().unwrap();
        let (provider, sm) = fixture(&tmp);
        for (email, pw) in [("a@org.com", "pw-a"), ("root@org.com", "pw-root")] {
            let mut state = AuthState::Anonymous;
            state.login(&provider, email, pw).unwrap();
            assert!(state.is_authenticated());
            state.logout(&sm);
            assert!(matches!(state, AuthState::Anonymous));
        }
    }

    #[test]
    fn failed_login_falls_back_to_anonymous() {
        let tmp = tempfile::tempdir().unwrap();
        let (provider, _sm) = fixture(&tmp);
        let mut state = AuthState::Anonymous;
        let err = state.login(&provider, "a@org.com", "wrong").unwrap_err();
        assert_eq!(err.code_str(), "E1001");
        assert!(matches!(state, AuthState::Anonymous));
    }
}
