//! Thin clients for the two external collaborators: the Tableau REST API
//! (metrics) and the OpenAI chat API (summaries). Both are treated as black
//! boxes: every transport or shape failure maps to an `Upstream` error that
//! the caller surfaces as transient. Requests carry a bounded timeout and are
//! never retried automatically.

pub mod tableau;
pub mod openai;

use std::time::Duration;

use crate::error::AppError;

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::internal("E9999".to_string(), format!("building http client: {e}")))
}
