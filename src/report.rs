//! Report engine: pivots the metrics view rows into per-agent stat blocks,
//! formats them, and drives the summarizer. The view is long-format, one row
//! per (agent, measure); the pivot keeps the first value seen per pair.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::access::AccessMap;
use crate::error::AppError;
use crate::identity::Principal;
use crate::upstream::openai::ChatClient;
use crate::upstream::tableau::TableauClient;

pub const AGENT_COL: &str = "FETCH_NAME";
pub const MEASURE_NAME_COL: &str = "Measure Names";
pub const MEASURE_VALUE_COL: &str = "Measure Values";

#[derive(Debug, Clone, PartialEq)]
pub struct AgentStats {
    pub name: String,
    /// Measure name -> raw value text, ordered by measure name.
    pub measures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub agents: Vec<String>,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub name: String,
    pub stat_block: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Present only when the selection covered the whole visible agent set.
    pub team_summary: Option<String>,
    pub agents: Vec<AgentReport>,
}

fn cell_to_string(av: &AnyValue) -> Option<String> {
    match av {
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        AnyValue::Float64(f) => Some(f.to_string()),
        AnyValue::Int64(i) => Some(i.to_string()),
        AnyValue::Null => None,
        other => Some(other.to_string()),
    }
}

/// Fold long-format rows into per-agent measure maps, keeping only selected
/// agents. First value wins per (agent, measure); agents come back sorted.
pub fn pivot_measures(df: &DataFrame, selected: &BTreeSet<String>) -> Result<Vec<AgentStats>, AppError> {
    let missing = |col: &str| AppError::upstream("E9103".to_string(), format!("Metrics view is missing column '{col}'"));
    let agents = df.column(AGENT_COL).map_err(|_| missing(AGENT_COL))?;
    let names = df.column(MEASURE_NAME_COL).map_err(|_| missing(MEASURE_NAME_COL))?;
    let values = df.column(MEASURE_VALUE_COL).map_err(|_| missing(MEASURE_VALUE_COL))?;

    let mut folded: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for i in 0..df.height() {
        let agent = match agents.get(i).ok().as_ref().and_then(cell_to_string) {
            Some(a) => a,
            None => continue,
        };
        if !selected.contains(&agent) { continue; }
        let measure = match names.get(i).ok().as_ref().and_then(cell_to_string) {
            Some(m) => m,
            None => continue,
        };
        let value = match values.get(i).ok().as_ref().and_then(cell_to_string) {
            Some(v) => v,
            None => continue,
        };
        folded.entry(agent).or_default().entry(measure).or_insert(value);
    }
    Ok(folded
        .into_iter()
        .map(|(name, measures)| AgentStats { name, measures })
        .collect())
}

/// Numeric values render with two decimals; measures whose name mentions a
/// rate or utilization get a '%' suffix; anything non-numeric passes through.
fn format_value(measure: &str, raw: &str) -> String {
    let suffix = if measure.contains("Rate") || measure.contains("Utilization") { "%" } else { "" };
    match raw.parse::<f64>() {
        Ok(v) => format!("{:.2}{}", v, suffix),
        Err(_) => raw.to_string(),
    }
}

pub fn format_stats(stats: &AgentStats) -> String {
    stats
        .measures
        .iter()
        .map(|(measure, raw)| format!("- {}: {}", measure, format_value(measure, raw)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn agent_prompt(name: &str, stat_block: &str) -> String {
    format!(
        "You are writing a performance summary for support agent {name}.\n\n\
         Here are their stats:\n{stat_block}\n\n\
         Write a bullet-point summary of this performance."
    )
}

pub fn team_prompt(supervisor: &str, stats: &str) -> String {
    format!(
        "You are a team lead reviewing metrics for Supervisor {supervisor}'s team.\n\n\
         Here are the team's performance stats:\n{stats}\n\n\
         Write 3-5 bullet points summarizing overall performance."
    )
}

/// Run a full report for an authenticated principal: clamp the selection to
/// the visible agent set, fetch and pivot the metrics, then summarize. The
/// team summary is produced only when the selection covers everything the
/// caller may see, sampling the first three stat blocks.
pub async fn run_report(
    tableau: &TableauClient,
    chat: &ChatClient,
    access: &AccessMap,
    principal: &Principal,
    req: &ReportRequest,
) -> Result<Report, AppError> {
    let visible = access.visible_agents(&principal.email);
    if visible.is_empty() {
        return Err(AppError::unmapped("E2001", "No agents mapped to your account."));
    }
    if req.agents.is_empty() {
        return Err(AppError::user("E2002", "Select at least one agent."));
    }
    let selected: BTreeSet<String> = req.agents.iter().cloned().collect();
    if let Some(out) = selected.iter().find(|a| !visible.contains(*a)) {
        return Err(AppError::forbidden("E2003".to_string(), format!("Agent '{out}' is not in your visible set.")));
    }

    let range = match (req.start, req.end) {
        (Some(start), Some(end)) => Some((start, end)),
        _ => None,
    };
    let df = tableau.fetch_team_metrics(range).await?;
    let stats = pivot_measures(&df, &selected)?;
    if stats.is_empty() {
        return Err(AppError::user("E9002", "No data found for selected agents."));
    }
    let blocks: Vec<String> = stats.iter().map(format_stats).collect();

    let team_summary = if selected == visible {
        let sample = blocks.iter().take(3).cloned().collect::<Vec<_>>().join("\n\n");
        Some(chat.complete(&team_prompt(&principal.email, &sample)).await?)
    } else {
        None
    };

    let mut agents = Vec::with_capacity(stats.len());
    for (stat, block) in stats.iter().zip(blocks.iter()) {
        let summary = chat.complete(&agent_prompt(&stat.name, block)).await?;
        agents.push(AgentReport { name: stat.name.clone(), stat_block: block.clone(), summary });
    }
    Ok(Report { team_summary, agents })
}
