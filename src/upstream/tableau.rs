//! Tableau REST client: PAT sign-in, metrics-view discovery by name pattern,
//! view-data CSV download, best-effort sign-out. The CSV body is parsed with
//! polars; downstream code expects the pre-aggregated view columns
//! `FETCH_NAME` / `Measure Names` / `Measure Values`.

use std::io::Cursor;
use std::time::Duration;

use chrono::NaiveDate;
use polars::prelude::*;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::TableauConfig;
use crate::error::AppError;

pub struct TableauClient {
    cfg: TableauConfig,
    client: reqwest::Client,
}

impl TableauClient {
    pub fn new(cfg: TableauConfig, timeout: Duration) -> Result<Self, AppError> {
        let client = super::http_client(timeout)?;
        Ok(Self { cfg, client })
    }

    /// Full fetch cycle: sign in, locate the metrics view, download its data,
    /// sign out. The date range is forwarded as view filter parameters; a
    /// pre-aggregated view without those fields ignores them.
    pub async fn fetch_team_metrics(&self, range: Option<(NaiveDate, NaiveDate)>) -> Result<DataFrame, AppError> {
        let (token, site_id) = self.sign_in().await?;
        let result = async {
            let view_id = self.find_view(&token, &site_id).await?;
            let csv = self.view_data(&token, &site_id, &view_id, range).await?;
            parse_view_csv(&csv)
        }
        .await;
        self.sign_out(&token).await;
        result
    }

    async fn sign_in(&self) -> Result<(String, String), AppError> {
        let url = format!("{}/api/{}/auth/signin", self.cfg.server_url, self.cfg.api_version);
        let body = json!({
            "credentials": {
                "personalAccessTokenName": self.cfg.pat_name,
                "personalAccessTokenSecret": self.cfg.pat_secret,
                "site": { "contentUrl": self.cfg.site }
            }
        });
        let resp = self.client
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::upstream("E9101".to_string(), format!("Tableau sign-in failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::upstream("E9101".to_string(), format!("Tableau sign-in failed: HTTP {}", resp.status())));
        }
        let v: Value = resp.json().await
            .map_err(|e| AppError::upstream("E9101".to_string(), format!("Tableau sign-in response unreadable: {e}")))?;
        extract_credentials(&v)
            .ok_or_else(|| AppError::upstream("E9101", "Tableau sign-in response missing credentials"))
    }

    async fn find_view(&self, token: &str, site_id: &str) -> Result<String, AppError> {
        let url = format!(
            "{}/api/{}/sites/{}/views?filter=name:contains:{}",
            self.cfg.server_url,
            self.cfg.api_version,
            site_id,
            urlencoding::encode(&self.cfg.view_pattern)
        );
        let resp = self.client
            .get(&url)
            .header("X-Tableau-Auth", token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AppError::upstream("E9102".to_string(), format!("Tableau view listing failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::upstream("E9102".to_string(), format!("Tableau view listing failed: HTTP {}", resp.status())));
        }
        let v: Value = resp.json().await
            .map_err(|e| AppError::upstream("E9102".to_string(), format!("Tableau view listing unreadable: {e}")))?;
        pick_view(&v, &self.cfg.view_pattern)
            .ok_or_else(|| AppError::upstream("E9102".to_string(), format!("No view matching '{}'", self.cfg.view_pattern)))
    }

    async fn view_data(
        &self,
        token: &str,
        site_id: &str,
        view_id: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<String, AppError> {
        let mut url = format!(
            "{}/api/{}/sites/{}/views/{}/data",
            self.cfg.server_url, self.cfg.api_version, site_id, view_id
        );
        if let Some((start, end)) = range {
            url.push_str(&format!(
                "?{}={}&{}={}",
                urlencoding::encode("vf_Start Date"),
                start,
                urlencoding::encode("vf_End Date"),
                end
            ));
        }
        let resp = self.client
            .get(&url)
            .header("X-Tableau-Auth", token)
            .send()
            .await
            .map_err(|e| AppError::upstream("E9103".to_string(), format!("Tableau view data failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::upstream("E9103".to_string(), format!("Tableau view data failed: HTTP {}", resp.status())));
        }
        resp.text().await
            .map_err(|e| AppError::upstream("E9103".to_string(), format!("Tableau view data unreadable: {e}")))
    }

    async fn sign_out(&self, token: &str) {
        let url = format!("{}/api/{}/auth/signout", self.cfg.server_url, self.cfg.api_version);
        // Best-effort: an expiring token is not worth failing a report over.
        if let Err(e) = self.client.post(&url).header("X-Tableau-Auth", token).send().await {
            debug!(target: "upstream", "tableau sign-out failed: {e}");
        }
    }
}

fn extract_credentials(v: &Value) -> Option<(String, String)> {
    let creds = v.get("credentials")?;
    let token = creds.get("token")?.as_str()?.to_string();
    let site_id = creds.get("site")?.get("id")?.as_str()?.to_string();
    Some((token, site_id))
}

/// First view whose name contains the pattern, case-insensitive.
fn pick_view(v: &Value, pattern: &str) -> Option<String> {
    let needle = pattern.to_lowercase();
    let views = v.get("views")?.get("view")?.as_array()?;
    for view in views {
        let name = view.get("name").and_then(|n| n.as_str()).unwrap_or("");
        if name.to_lowercase().contains(&needle) {
            return view.get("id").and_then(|i| i.as_str()).map(|s| s.to_string());
        }
    }
    None
}

fn parse_view_csv(text: &str) -> Result<DataFrame, AppError> {
    CsvReader::new(Cursor::new(text.as_bytes()))
        .finish()
        .map_err(|e| AppError::upstream("E9103".to_string(), format!("Tableau CSV unreadable: {e}")))
}
