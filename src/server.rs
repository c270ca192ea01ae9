//!
//! teamlens HTTP server
//! --------------------
//! Axum-based JSON API for the supervisor reporting dashboard.
//!
//! Responsibilities:
//! - Session management with a simple cookie + CSRF token model.
//! - Registration/login/logout endpoints backed by the credential store and
//!   the `identity` auth provider.
//! - Filter, report and admin log endpoints, all gated on a valid session;
//!   the log endpoint additionally requires the admin role.
//! - Error responses carry the audit code + plain message; login and report
//!   failures are also appended to the error log.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::access::AccessMap;
use crate::config::Config;
use crate::error::AppError;
use crate::errorlog::{self, ErrorLog, LogFilter};
use crate::identity::{AuthState, LocalAuthProvider, Principal, SessionManager};
use crate::report::{self, ReportRequest};
use crate::security::{domain_matches, normalize_email};
use crate::store::{CredentialStore, JsonCredentialStore};
use crate::upstream::openai::ChatClient;
use crate::upstream::tableau::TableauClient;

const SESSION_COOKIE: &str = "teamlens_session";

/// Shared server state injected into all handlers.
///
/// Holds the read-only configuration and access mapping, the credential
/// store, the session manager (token -> principal) and the per-session CSRF
/// tokens, plus the two upstream clients and the audit log.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn CredentialStore>,
    pub access: Arc<AccessMap>,
    pub provider: Arc<LocalAuthProvider>,
    pub sessions: Arc<SessionManager>,
    /// Session token -> CSRF token mapping
    pub csrf_tokens: Arc<RwLock<HashMap<String, String>>>,
    pub errorlog: Arc<ErrorLog>,
    pub tableau: Arc<TableauClient>,
    pub chat: Arc<ChatClient>,
}

fn log_startup(config: &Config) {
    let cwd = std::env::current_dir().ok();
    let exe = std::env::current_exe().ok();
    let user = std::env::var("USER").or_else(|_| std::env::var("USERNAME")).ok();
    info!(
        target: "startup",
        "teamlens starting. cwd={:?}, exe={:?}, user={:?}, data_folder={:?}, http_port={}",
        cwd, exe, user, config.data_folder, config.http_port
    );
    info!(
        target: "startup",
        "Path existence: data_folder_exists={}, mapping_exists={}, credentials_exist={}",
        config.data_folder.exists(),
        config.mapping_path().exists(),
        config.credentials_path().exists()
    );
}

/// Build the shared state and start the HTTP server on the configured port.
pub async fn run(config: Config) -> anyhow::Result<()> {
    log_startup(&config);

    std::fs::create_dir_all(&config.data_folder)
        .map_err(|e| anyhow::anyhow!("Failed to create or access data folder {}: {e}", config.data_folder.display()))?;

    let errorlog = Arc::new(ErrorLog::new(config.log_path()));

    // Access mapping is required at startup; log the failure for audit, then
    // refuse to start.
    let access = match AccessMap::load(config.mapping_path(), &config.admin_emails) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            errorlog.error(e.code_str(), e.message());
            return Err(anyhow::anyhow!(e.to_string()));
        }
    };

    let store: Arc<dyn CredentialStore> =
        Arc::new(JsonCredentialStore::open(config.credentials_path(), &config.email_domain)?);
    let sessions = Arc::new(SessionManager::new(config.session_ttl));
    let provider = Arc::new(LocalAuthProvider::new(
        config.email_domain.clone(),
        store.clone(),
        access.clone(),
        sessions.clone(),
    ));
    let tableau = Arc::new(TableauClient::new(config.tableau.clone(), config.upstream_timeout)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?);
    let chat = Arc::new(ChatClient::new(config.openai.clone(), config.upstream_timeout)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?);

    let http_port = config.http_port;
    let app_state = AppState {
        config: Arc::new(config),
        store,
        access,
        provider,
        sessions,
        csrf_tokens: Arc::new(RwLock::new(HashMap::new())),
        errorlog,
        tableau,
        chat,
    };

    let app = router(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "teamlens ok" }))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/csrf", get(get_csrf))
        .route("/filters", get(filters))
        .route("/report", post(run_report))
        .route("/logs", get(logs))
        .with_state(state)
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn get_sid_from_headers(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
}

fn get_principal_from_headers(state: &AppState, headers: &HeaderMap) -> Option<Principal> {
    let sid = get_sid_from_headers(headers)?;
    state.sessions.validate(&sid)
}

async fn validate_csrf(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(sid) = get_sid_from_headers(headers) else { return false; };
    let Some(provided) = headers.get("x-csrf-token").and_then(|v| v.to_str().ok()).map(|s| s.to_string()) else { return false; };
    let cmap = state.csrf_tokens.read().await;
    match cmap.get(&sid) {
        Some(expected) => expected == &provided,
        None => false,
    }
}

fn set_session_cookie(sid: &str) -> HeaderValue {
    // Secure, HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, sid)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE)).unwrap()
}

fn gen_hex_token(len_bytes: usize) -> String {
    use std::fmt::Write as _;
    let mut bytes = vec![0u8; len_bytes];
    let _ = getrandom::getrandom(&mut bytes);
    let mut out = String::with_capacity(len_bytes * 2);
    for b in &bytes { let _ = write!(&mut out, "{:02x}", b); }
    out
}

fn app_error(e: &AppError) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({"status": "error", "code": e.code_str(), "message": e.message()})),
    )
}

fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"status": "unauthorized"})))
}

fn csrf_forbidden() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::FORBIDDEN, Json(json!({"status": "forbidden", "error": "invalid csrf"})))
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    email: String,
    password: String,
    confirm: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

/// Self-registration. Checks run in the original order: domain, password
/// confirmation, duplicate, mapped-or-admin; only then does the store
/// persist.
async fn register(State(state): State<AppState>, Json(payload): Json<RegisterPayload>) -> impl IntoResponse {
    if !domain_matches(&payload.email, &state.config.email_domain) {
        return app_error(&AppError::domain(
            "E1002".to_string(),
            format!("Invalid {} email.", state.config.email_domain),
        ));
    }
    if payload.password != payload.confirm {
        return app_error(&AppError::user("E1003", "Passwords do not match."));
    }
    let key = normalize_email(&payload.email);
    if state.store.emails().iter().any(|e| e == &key) {
        return app_error(&AppError::duplicate("E1004", "User exists."));
    }
    if !state.access.is_known(&payload.email) {
        return app_error(&AppError::unmapped("E2001", "No agents mapped to this email."));
    }
    match state.store.register(&payload.email, &payload.password) {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Err(e) => {
            error!("register error: {e}");
            app_error(&e)
        }
    }
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    let mut flow = AuthState::Anonymous;
    match flow.login(state.provider.as_ref(), &payload.email, &payload.password) {
        Ok(session) => {
            let csrf = gen_hex_token(32);
            {
                let mut cmap = state.csrf_tokens.write().await;
                cmap.insert(session.token.clone(), csrf);
            }
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&session.token));
            (
                StatusCode::OK,
                headers,
                Json(json!({"status": "ok", "role": session.principal.role})),
            )
        }
        Err(e) => {
            state.errorlog.error(e.code_str(), &format!("Login failed: {}", payload.email));
            let (status, body) = app_error(&e);
            (status, HeaderMap::new(), body)
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Require CSRF token
    if !validate_csrf(&state, &headers).await {
        let (status, body) = csrf_forbidden();
        return (status, HeaderMap::new(), body);
    }
    if let Some(sid) = get_sid_from_headers(&headers) {
        state.sessions.logout(&sid);
        let mut cmap = state.csrf_tokens.write().await;
        cmap.remove(&sid);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status": "ok"})))
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Must be logged in to fetch CSRF token
    let Some(_principal) = get_principal_from_headers(&state, &headers) else {
        return unauthorized();
    };
    let Some(sid) = get_sid_from_headers(&headers) else {
        return unauthorized();
    };
    let cmap = state.csrf_tokens.read().await;
    if let Some(token) = cmap.get(&sid) {
        return (StatusCode::OK, Json(json!({"status": "ok", "csrf": token})));
    }
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": "error", "error": "csrf not available"})))
}

#[derive(Debug, Deserialize)]
struct FiltersQuery {
    /// Comma-separated supervisor emails narrowing the agent list.
    supervisors: Option<String>,
}

/// Sidebar data: the supervisors the caller may select and the agents under
/// the current selection. A supervisor only ever sees their own entry; an
/// admin sees everyone.
async fn filters(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<FiltersQuery>,
) -> impl IntoResponse {
    let Some(principal) = get_principal_from_headers(&state, &headers) else {
        return unauthorized();
    };
    let visible = state.access.visible_agents(&principal.email);
    if visible.is_empty() {
        let e = AppError::unmapped("E2001", "No agents mapped to your account.");
        state.errorlog.error(e.code_str(), &format!("No agents mapped for {}", principal.email));
        return app_error(&e);
    }
    let allowed_supervisors: Vec<String> = if principal.is_admin() {
        state.access.supervisors()
    } else {
        state
            .access
            .supervisors()
            .into_iter()
            .filter(|s| s == &principal.email)
            .collect()
    };
    let selected: Vec<String> = match &q.supervisors {
        Some(raw) => {
            let wanted: Vec<String> = raw.split(',').map(normalize_email).filter(|s| !s.is_empty()).collect();
            allowed_supervisors.iter().filter(|s| wanted.contains(s)).cloned().collect()
        }
        None => allowed_supervisors.clone(),
    };
    let agents: Vec<String> = state
        .access
        .agents_of_supervisors(&selected)
        .into_iter()
        .filter(|a| visible.contains(a))
        .collect();
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "supervisors": allowed_supervisors, "agents": agents})),
    )
}

async fn run_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ReportRequest>,
) -> impl IntoResponse {
    let Some(principal) = get_principal_from_headers(&state, &headers) else {
        return unauthorized();
    };
    if !validate_csrf(&state, &headers).await {
        return csrf_forbidden();
    }
    match report::run_report(&state.tableau, &state.chat, &state.access, &principal, &payload).await {
        Ok(rep) => (StatusCode::OK, Json(json!({"status": "ok", "report": rep}))),
        Err(e) => {
            error!("report failed: {e}");
            state.errorlog.error(e.code_str(), &format!("Report error: {}", e.message()));
            app_error(&e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    error_code: Option<String>,
    agent: Option<String>,
    supervisor: Option<String>,
    user_email: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

async fn logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<LogsQuery>,
) -> impl IntoResponse {
    let Some(principal) = get_principal_from_headers(&state, &headers) else {
        return unauthorized();
    };
    if !principal.is_admin() {
        return app_error(&AppError::forbidden("E2003", "Admin access required."));
    }
    let filter = LogFilter {
        error_code: q.error_code,
        agent: q.agent,
        supervisor: q.supervisor,
        user_email: q.user_email,
    };
    let page = q.page.unwrap_or(0);
    let page_size = q.page_size.unwrap_or(errorlog::DEFAULT_PAGE_SIZE);
    let known_users = state.store.emails();
    match errorlog::view(&state.errorlog, &state.access, &known_users, &filter, page, page_size) {
        Ok(entries) => (
            StatusCode::OK,
            Json(json!({"status": "ok", "entries": entries, "page": page, "page_size": page_size})),
        ),
        Err(e) => {
            error!("log view failed: {e}");
            app_error(&AppError::io("E9004".to_string(), format!("Error log unreadable: {e}")))
        }
    }
}
