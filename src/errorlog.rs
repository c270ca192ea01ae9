//!
//! teamlens error log
//! ------------------
//! Append-only line log used for admin audit. Line format matches the
//! original deployment so existing files keep parsing:
//!
//!   2026-08-07 09:15:02,113 [ERROR] [E1001] Login failed: a@org.com
//!
//! The viewer re-parses the whole file, attributes each line to an agent,
//! supervisor and user by substring match against the access mapping and the
//! registered emails, applies equality filters, and slices 0-based pages of
//! at most `page_size` entries in append order.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::access::AccessMap;

pub const DEFAULT_PAGE_SIZE: usize = 20;

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:,\d+)?)\s+\[(\w+)\]\s+(.*)$").unwrap()
});

pub struct ErrorLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ErrorLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Append one line, creating the file on first use.
    pub fn append(&self, level: &str, code: &str, msg: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        if let Some(dir) = self.path.parent() { std::fs::create_dir_all(dir).ok(); }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening error log {}", self.path.display()))?;
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        writeln!(f, "{} [{}] [{}] {}", ts, level, code, msg)
            .with_context(|| format!("appending to error log {}", self.path.display()))?;
        Ok(())
    }

    /// Convenience for the common ERROR level; a failing audit write must not
    /// take down the request that triggered it.
    pub fn error(&self, code: &str, msg: &str) {
        if let Err(e) = self.append("ERROR", code, msg) {
            tracing::warn!(target: "errorlog", "failed to persist [{code}] {msg}: {e}");
        }
    }

    /// Raw lines in append order; a missing file reads as empty.
    pub fn read_lines(&self) -> Result<Vec<String>> {
        if !self.path.exists() { return Ok(Vec::new()); }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading error log {}", self.path.display()))?;
        Ok(raw.lines().map(|l| l.to_string()).collect())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub code: String,
    pub agent: String,
    pub supervisor: String,
    pub user: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    pub error_code: Option<String>,
    pub agent: Option<String>,
    pub supervisor: Option<String>,
    pub user_email: Option<String>,
}

impl LogFilter {
    fn matches(&self, e: &LogEntry) -> bool {
        fn eq(filter: &Option<String>, field: &str) -> bool {
            match filter {
                Some(want) => want == field,
                None => true,
            }
        }
        eq(&self.error_code, &e.code)
            && eq(&self.agent, &e.agent)
            && eq(&self.supervisor, &e.supervisor)
            && eq(&self.user_email, &e.user)
    }
}

/// Split a raw line into (timestamp, level, rest); None for lines that do not
/// look like log records.
pub fn parse_line(line: &str) -> Option<(String, String, String)> {
    let caps = LINE_RE.captures(line)?;
    Some((caps[1].to_string(), caps[2].to_string(), caps[3].to_string()))
}

/// Pull the `[E....]` audit code off the front of the message; lines without
/// one keep their full text and the code UNKNOWN.
fn split_code(rest: &str) -> (String, String) {
    if let Some(stripped) = rest.strip_prefix('[') {
        if let Some(end) = stripped.find(']') {
            let code = stripped[..end].to_string();
            let msg = stripped[end + 1..].trim_start().to_string();
            return (code, msg);
        }
    }
    ("UNKNOWN".to_string(), rest.to_string())
}

/// Attribute a parsed line: first mapped agent name found in the message,
/// that agent's supervisor (else Unknown), first registered email found in
/// the message.
pub fn enrich(
    timestamp: String,
    level: String,
    rest: &str,
    access: &AccessMap,
    known_users: &[String],
) -> LogEntry {
    let (code, message) = split_code(rest);
    let agent = access
        .agent_names()
        .find(|a| message.contains(*a))
        .unwrap_or("")
        .to_string();
    let supervisor = if agent.is_empty() {
        "Unknown".to_string()
    } else {
        access.supervisor_of_agent(&agent).unwrap_or("Unknown").to_string()
    };
    let user = known_users
        .iter()
        .find(|u| message.contains(*u))
        .cloned()
        .unwrap_or_default();
    LogEntry { timestamp, level, code, agent, supervisor, user, message }
}

/// Filter, then return the 0-based `page`-th slice of at most `page_size`
/// entries, in append order. A page past the end is an empty list.
pub fn page(entries: &[LogEntry], filter: &LogFilter, page: usize, page_size: usize) -> Vec<LogEntry> {
    let filtered: Vec<&LogEntry> = entries.iter().filter(|e| filter.matches(e)).collect();
    let start = page.saturating_mul(page_size);
    if start >= filtered.len() { return Vec::new(); }
    let end = (start + page_size).min(filtered.len());
    filtered[start..end].iter().map(|e| (*e).clone()).collect()
}

/// One-call viewer used by the admin endpoint: read, parse, enrich, page.
pub fn view(
    log: &ErrorLog,
    access: &AccessMap,
    known_users: &[String],
    filter: &LogFilter,
    page_number: usize,
    page_size: usize,
) -> Result<Vec<LogEntry>> {
    let entries: Vec<LogEntry> = log
        .read_lines()?
        .iter()
        .filter_map(|l| parse_line(l))
        .map(|(ts, level, rest)| enrich(ts, level, &rest, access, known_users))
        .collect();
    Ok(page(&entries, filter, page_number, page_size))
}
