use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use crate::error::AppError;
use crate::tprintln;

use super::principal::Principal;
use super::provider::{AuthProvider, LoginRequest};

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_id() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Token-indexed session table. The manager owns its maps: session state is
/// an explicit object handed through the call chain, never ambient process
/// state.
pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
    revoked: RwLock<HashSet<String>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()), revoked: RwLock::new(HashSet::new()) }
    }

    pub fn issue(&self, principal: Principal) -> Session {
        let now = Instant::now();
        let sid = gen_id();
        let token = gen_id();
        let sess = Session {
            session_id: sid.clone(),
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(token, sess.clone());
        tprintln!("session.issue user={} sid={} ttl_secs={}", principal.email, sid, self.ttl.as_secs());
        sess
    }

    pub fn validate(&self, token: &str) -> Option<Principal> {
        if self.revoked.read().contains(token) { return None; }
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.sessions.read();
            if let Some(sess) = map.get(token) {
                if sess.expires_at > now {
                    Some(sess.principal.clone())
                } else {
                    drop_key = Some(token.to_string());
                    None
                }
            } else { None }
        };
        if let Some(k) = drop_key {
            self.sessions.write().remove(&k);
        }
        out
    }

    pub fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token).is_some();
        if removed {
            self.revoked.write().insert(token.to_string());
        }
        removed
    }
}

/// The per-interaction authentication state machine:
/// `Anonymous -> PendingLogin -> Authenticated{role}`, back to `Anonymous`
/// on any failure or logout. Data operations are gated on `Authenticated`.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    PendingLogin { email: String },
    Authenticated { session: Session },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthState::Authenticated { session } => Some(&session.principal),
            _ => None,
        }
    }

    /// Drive a login attempt through the provider. On failure the state
    /// falls back to `Anonymous` and the provider error is returned.
    pub fn login(&mut self, provider: &dyn AuthProvider, email: &str, password: &str) -> Result<Session, AppError> {
        *self = AuthState::PendingLogin { email: crate::security::normalize_email(email) };
        let req = LoginRequest { email: email.to_string(), password: password.to_string() };
        match provider.login(&req) {
            Ok(resp) => {
                let session = resp.session;
                *self = AuthState::Authenticated { session: session.clone() };
                Ok(session)
            }
            Err(e) => {
                *self = AuthState::Anonymous;
                Err(e)
            }
        }
    }

    /// Unconditional transition to `Anonymous`, revoking the session token.
    pub fn logout(&mut self, sm: &SessionManager) {
        if let AuthState::Authenticated { session } = &*self {
            sm.logout(&session.token);
        }
        *self = AuthState::Anonymous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    fn principal(email: &str, role: Role) -> Principal {
        Principal { email: email.to_string(), role }
    }

    #[test]
    fn issue_validate_logout() {
        let sm = SessionManager::default();
        let sess = sm.issue(principal("a@org.com", Role::Supervisor));
        let p = sm.validate(&sess.token).expect("fresh token validates");
        assert_eq!(p.email, "a@org.com");
        assert!(sm.logout(&sess.token));
        assert!(sm.validate(&sess.token).is_none(), "revoked token must not validate");
        assert!(!sm.logout(&sess.token), "second logout is a no-op");
    }

    #[test]
    fn expired_session_does_not_validate() {
        let sm = SessionManager::new(Duration::from_secs(0));
        let sess = sm.issue(principal("a@org.com", Role::Admin));
        assert!(sm.validate(&sess.token).is_none());
    }

    #[test]
    fn tokens_are_unique_and_opaque() {
        let sm = SessionManager::default();
        let a = sm.issue(principal("a@org.com", Role::Supervisor));
        let b = sm.issue(principal("a@org.com", Role::Supervisor));
        assert_ne!(a.token, b.token);
        assert_ne!(a.session_id, b.session_id);
        assert!(!a.token.contains("a@org.com"));
    }
}
