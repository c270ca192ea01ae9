//! Auth integration tests: registration, credential verification, the login
//! state machine and role assignment. These exercise positive and negative
//! paths across the credential store, access mapping and auth provider.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use teamlens::access::AccessMap;
use teamlens::identity::{AuthState, LocalAuthProvider, LoginRequest, AuthProvider, Role, SessionManager};
use teamlens::store::{CredentialStore, JsonCredentialStore};

const DOMAIN: &str = "org.com";

fn mapping() -> AccessMap {
    let mut m = BTreeMap::new();
    m.insert("a@org.com".to_string(), vec!["Agent1".to_string(), "Agent2".to_string()]);
    AccessMap::from_map(m, &["admin@org.com".to_string()])
}

fn provider_over(
    store: Arc<dyn CredentialStore>,
    access: AccessMap,
    ttl: Duration,
) -> (LocalAuthProvider, Arc<SessionManager>) {
    let sessions = Arc::new(SessionManager::new(ttl));
    let provider = LocalAuthProvider::new(DOMAIN.to_string(), store, Arc::new(access), sessions.clone());
    (provider, sessions)
}

#[test]
fn register_login_logout_end_to_end() {
    let tmp = tempdir().unwrap();
    let store = Arc::new(JsonCredentialStore::open(tmp.path().join("users.json"), DOMAIN).unwrap());
    store.register("a@org.com", "pw").unwrap();
    let (provider, sm) = provider_over(store.clone(), mapping(), Duration::from_secs(3600));

    let mut state = AuthState::Anonymous;
    let session = state.login(&provider, "a@org.com", "pw").unwrap();
    assert!(state.is_authenticated());
    assert_eq!(session.principal.role, Role::Supervisor);
    assert!(sm.validate(&session.token).is_some());

    state.logout(&sm);
    assert!(matches!(state, AuthState::Anonymous));
    assert!(sm.validate(&session.token).is_none(), "logout revokes the token");
}

#[test]
fn off_domain_registration_leaves_store_unchanged() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("users.json");
    let store = JsonCredentialStore::open(&path, DOMAIN).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let err = store.register("bad@other.com", "pw").unwrap_err();
    assert_eq!(err.code_str(), "E1002");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    assert!(!store.verify("bad@other.com", "pw").unwrap());
}

#[test]
fn registered_password_verifies_and_others_do_not() {
    let tmp = tempdir().unwrap();
    let store = JsonCredentialStore::open(tmp.path().join("users.json"), DOMAIN).unwrap();
    store.register("a@org.com", "right-horse-battery").unwrap();
    assert!(store.verify("a@org.com", "right-horse-battery").unwrap());
    for wrong in ["", "right-horse", "RIGHT-HORSE-BATTERY", "right-horse-battery "] {
        assert!(!store.verify("a@org.com", wrong).unwrap(), "'{wrong}' must not verify");
    }
}

#[test]
fn mapped_and_unmapped_visibility_scenario() {
    // mapping {"a@org.com": ["Agent1","Agent2"]}: a sees exactly those two,
    // b (unmapped) sees nothing, and neither is an error.
    let access = mapping();
    let a = access.agents_for("a@org.com");
    assert_eq!(a.len(), 2);
    assert!(a.contains("Agent1") && a.contains("Agent2"));
    assert!(access.agents_for("b@org.com").is_empty());
}

#[test]
fn admin_role_comes_from_the_allow_list() {
    let tmp = tempdir().unwrap();
    let store = Arc::new(JsonCredentialStore::open(tmp.path().join("users.json"), DOMAIN).unwrap());
    store.register("admin@org.com", "pw").unwrap();
    store.register("a@org.com", "pw").unwrap();
    let (provider, _sm) = provider_over(store.clone(), mapping(), Duration::from_secs(3600));

    let adm = provider.login(&LoginRequest { email: "admin@org.com".into(), password: "pw".into() }).unwrap();
    assert_eq!(adm.session.principal.role, Role::Admin);
    let sup = provider.login(&LoginRequest { email: "a@org.com".into(), password: "pw".into() }).unwrap();
    assert_eq!(sup.session.principal.role, Role::Supervisor);
}

#[test]
fn login_logout_ends_anonymous_regardless_of_role() {
    let tmp = tempdir().unwrap();
    let store = Arc::new(JsonCredentialStore::open(tmp.path().join("users.json"), DOMAIN).unwrap());
    store.register("admin@org.com", "pw").unwrap();
    store.register("a@org.com", "pw").unwrap();
    let (provider, sm) = provider_over(store.clone(), mapping(), Duration::from_secs(3600));

    for email in ["a@org.com", "admin@org.com"] {
        let mut state = AuthState::Anonymous;
        state.login(&provider, email, "pw").unwrap();
        state.logout(&sm);
        assert!(matches!(state, AuthState::Anonymous));
    }
}

#[test]
fn failed_login_reports_uniform_invalid_credentials() {
    let tmp = tempdir().unwrap();
    let store = Arc::new(JsonCredentialStore::open(tmp.path().join("users.json"), DOMAIN).unwrap());
    store.register("a@org.com", "pw").unwrap();
    let (provider, _sm) = provider_over(store.clone(), mapping(), Duration::from_secs(3600));

    let wrong_pw = provider.login(&LoginRequest { email: "a@org.com".into(), password: "x".into() }).unwrap_err();
    let no_user = provider.login(&LoginRequest { email: "nobody@org.com".into(), password: "x".into() }).unwrap_err();
    assert_eq!(wrong_pw.to_string(), no_user.to_string());
    assert_eq!(wrong_pw.code_str(), "E1001");
}

#[test]
fn expired_sessions_stop_validating() {
    let tmp = tempdir().unwrap();
    let store = Arc::new(JsonCredentialStore::open(tmp.path().join("users.json"), DOMAIN).unwrap());
    store.register("a@org.com", "pw").unwrap();
    let (provider, sm) = provider_over(store.clone(), mapping(), Duration::from_secs(0));

    let resp = provider.login(&LoginRequest { email: "a@org.com".into(), password: "pw".into() }).unwrap();
    assert!(sm.validate(&resp.session.token).is_none(), "zero-ttl session must be expired");
}
