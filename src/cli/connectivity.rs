use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Url;
use serde_json::Value;

/// Authenticated HTTP session against a teamlens server: cookie-backed
/// session plus the CSRF token required on mutating routes.
#[derive(Clone)]
pub struct HttpSession {
    base: Url,
    client: reqwest::Client,
    csrf: String,
    pub email: String,
    pub role: String,
}

fn surface_error(val: &Value) -> String {
    let code = val.get("code").and_then(|c| c.as_str()).unwrap_or("");
    let msg = val
        .get("message")
        .or_else(|| val.get("error"))
        .and_then(|m| m.as_str())
        .unwrap_or("request failed");
    if code.is_empty() { msg.to_string() } else { format!("[{code}] {msg}") }
}

impl HttpSession {
    pub async fn connect(base: &str, email: &str, password: &str) -> Result<Self> {
        let base_url = Url::parse(base).context("invalid base URL")?;
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()?;
        // POST /login
        let login_url = base_url.join("/login")?;
        let resp = client
            .post(login_url)
            .json(&serde_json::json!({"email": email, "password": password}))
            .send()
            .await?;
        let status = resp.status();
        let v: Value = resp.json().await.unwrap_or(serde_json::json!({"status":"error"}));
        if !status.is_success() || v.get("status").and_then(|s| s.as_str()) != Some("ok") {
            return Err(anyhow!("login failed: {}", surface_error(&v)));
        }
        let role = v.get("role").and_then(|r| r.as_str()).unwrap_or("supervisor").to_string();
        // GET /csrf
        let csrf_url = base_url.join("/csrf")?;
        let resp2 = client.get(csrf_url).send().await?;
        if !resp2.status().is_success() {
            return Err(anyhow!("failed to obtain csrf: HTTP {}", resp2.status()));
        }
        let v2: Value = resp2.json().await.unwrap_or(serde_json::json!({}));
        let csrf = v2.get("csrf").and_then(|s| s.as_str()).unwrap_or("").to_string();
        if csrf.is_empty() { return Err(anyhow!("csrf token missing")); }
        Ok(Self { base: base_url, client, csrf, email: email.to_string(), role })
    }

    /// Self-registration needs no session; a plain client will do.
    pub async fn register(base: &str, email: &str, password: &str, confirm: &str) -> Result<()> {
        let base_url = Url::parse(base).context("invalid base URL")?;
        let client = reqwest::Client::new();
        let url = base_url.join("/register")?;
        let resp = client
            .post(url)
            .json(&serde_json::json!({"email": email, "password": password, "confirm": confirm}))
            .send()
            .await?;
        let status = resp.status();
        let v: Value = resp.json().await.unwrap_or(serde_json::json!({"status":"error"}));
        if !status.is_success() {
            return Err(anyhow!("registration failed: {}", surface_error(&v)));
        }
        Ok(())
    }

    fn csrf_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-csrf-token", HeaderValue::from_str(&self.csrf).unwrap());
        headers
    }

    pub fn ident(&self) -> String {
        format!("{} as {} ({})", self.base, self.email, self.role)
    }

    pub fn is_admin(&self) -> bool { self.role == "admin" }

    pub async fn filters(&self, supervisors: Option<&str>) -> Result<Value> {
        let mut url = self.base.join("/filters")?;
        if let Some(sel) = supervisors {
            url.set_query(Some(&format!("supervisors={}", urlencoding::encode(sel))));
        }
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let val: Value = resp.json().await.unwrap_or(serde_json::json!({"status":"error"}));
        if !status.is_success() {
            return Err(anyhow!("remote error: {}", surface_error(&val)));
        }
        Ok(val)
    }

    pub async fn run_report(
        &self,
        agents: &[String],
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Value> {
        let url = self.base.join("/report")?;
        let resp = self.client
            .post(url)
            .headers(self.csrf_headers())
            .json(&serde_json::json!({"agents": agents, "start": start, "end": end}))
            .send()
            .await?;
        let status = resp.status();
        let val: Value = resp.json().await.unwrap_or(serde_json::json!({"status":"error"}));
        if !status.is_success() {
            return Err(anyhow!("remote error: {}", surface_error(&val)));
        }
        Ok(val)
    }

    pub async fn logs(&self, filters: &[(String, String)], page: usize, page_size: usize) -> Result<Value> {
        let mut url = self.base.join("/logs")?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("page", &page.to_string());
            q.append_pair("page_size", &page_size.to_string());
            for (k, v) in filters {
                q.append_pair(k, v);
            }
        }
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let val: Value = resp.json().await.unwrap_or(serde_json::json!({"status":"error"}));
        if !status.is_success() {
            return Err(anyhow!("remote error: {}", surface_error(&val)));
        }
        Ok(val)
    }

    pub async fn logout(&self) -> Result<()> {
        let url = self.base.join("/logout")?;
        let resp = self.client.post(url).headers(self.csrf_headers()).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("logout failed: HTTP {}", resp.status()));
        }
        Ok(())
    }
}
