//! OpenAI chat-completions client. One prompt in, trimmed prose out.

use std::time::Duration;

use serde_json::{json, Value};

use crate::config::OpenAiConfig;
use crate::error::AppError;

pub struct ChatClient {
    cfg: OpenAiConfig,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(cfg: OpenAiConfig, timeout: Duration) -> Result<Self, AppError> {
        let client = super::http_client(timeout)?;
        Ok(Self { cfg, client })
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.cfg.base_url);
        let body = json!({
            "model": self.cfg.model,
            "messages": [{"role": "user", "content": prompt}]
        });
        let resp = self.client
            .post(&url)
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::upstream("E9201".to_string(), format!("Summary request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::upstream("E9201".to_string(), format!("Summary request failed: HTTP {}", resp.status())));
        }
        let v: Value = resp.json().await
            .map_err(|e| AppError::upstream("E9201".to_string(), format!("Summary response unreadable: {e}")))?;
        extract_content(&v)
            .ok_or_else(|| AppError::upstream("E9201", "Summary response missing content"))
    }
}

fn extract_content(v: &Value) -> Option<String> {
    let content = v
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?;
    Some(content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_content_is_extracted_and_trimmed() {
        let v = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  - solid week\n"}}]
        });
        assert_eq!(extract_content(&v), Some("- solid week".to_string()));
    }

    #[test]
    fn missing_choices_yield_none() {
        assert_eq!(extract_content(&serde_json::json!({"choices": []})), None);
        assert_eq!(extract_content(&serde_json::json!({})), None);
    }
}
