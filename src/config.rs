//! Process configuration, loaded once at startup from environment variables.
//! The three upstream secrets are required; a missing one is a fatal
//! `Config` error and the process refuses to start. Everything else has a
//! default. CLI flags in the binaries override environment values.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

pub const CREDENTIALS_FILE: &str = "users.json";
pub const EMAIL_TO_AGENTS_FILE: &str = "EMAIL_TO_AGENTS.json";
pub const LOG_FILE: &str = "error_agent_data.log";

#[derive(Debug, Clone)]
pub struct TableauConfig {
    pub server_url: String,
    pub api_version: String,
    pub pat_name: String,
    pub pat_secret: String,
    /// Site contentUrl; empty selects the default site.
    pub site: String,
    /// Substring the metrics view name must contain.
    pub view_pattern: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub data_folder: PathBuf,
    /// Approved organizational email domain, without the leading '@'.
    pub email_domain: String,
    pub admin_emails: Vec<String>,
    pub session_ttl: Duration,
    pub upstream_timeout: Duration,
    pub tableau: TableauConfig,
    pub openai: OpenAiConfig,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn require_env(name: &str) -> Result<String, AppError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::config(
            "E9003".to_string(),
            format!("Missing required environment variable {name}"),
        )),
    }
}

fn parse_port_env(name: &str, default: u16) -> u16 {
    std::env::var(name).ok().and_then(|v| v.parse::<u16>().ok()).unwrap_or(default)
}

fn parse_secs_env(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok()).unwrap_or(default);
    Duration::from_secs(secs)
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let openai = OpenAiConfig {
            api_key: require_env("OPENAI_API_KEY")?,
            model: env_or("OPENAI_MODEL", "gpt-4"),
            base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
        };
        let tableau = TableauConfig {
            server_url: env_or("TABLEAU_SERVER_URL", "https://tableau.fetchrewards.com"),
            api_version: env_or("TABLEAU_API_VERSION", "3.23"),
            pat_name: require_env("TABLEAU_PAT_NAME")?,
            pat_secret: require_env("TABLEAU_PAT_SECRET")?,
            site: env_or("TABLEAU_SITE", ""),
            view_pattern: env_or("TEAMLENS_METRICS_VIEW", "Team Metrics"),
        };
        let admin_emails = env_or("TEAMLENS_ADMIN_EMAILS", "")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(Config {
            http_port: parse_port_env("TEAMLENS_HTTP_PORT", 7878),
            data_folder: PathBuf::from(env_or("TEAMLENS_DATA_FOLDER", "data")),
            email_domain: env_or("TEAMLENS_EMAIL_DOMAIN", "fetchrewards.com"),
            admin_emails,
            session_ttl: parse_secs_env("TEAMLENS_SESSION_TTL_SECS", 3600),
            upstream_timeout: parse_secs_env("TEAMLENS_UPSTREAM_TIMEOUT_SECS", 30),
            tableau,
            openai,
        })
    }

    pub fn credentials_path(&self) -> PathBuf { self.data_folder.join(CREDENTIALS_FILE) }
    pub fn mapping_path(&self) -> PathBuf { self.data_folder.join(EMAIL_TO_AGENTS_FILE) }
    pub fn log_path(&self) -> PathBuf { self.data_folder.join(LOG_FILE) }
}
