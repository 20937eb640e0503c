//! Practicum homework status client.
//!
//! One authenticated GET per call. Failures are classified so the poll loop
//! can decide what to do; nothing is retried here.

use async_trait::async_trait;
use hwbot_core::config::PracticumConfig;
use hwbot_core::error::{HwBotError, Result};
use hwbot_core::traits::StatusSource;
use hwbot_core::types::StatusPage;
use reqwest::header::AUTHORIZATION;
use std::time::Duration;

use crate::response::parse_response;

pub struct PracticumClient {
    endpoint: String,
    /// Full `Authorization` header value, e.g. `OAuth <token>`.
    auth_header: String,
    client: reqwest::Client,
}

impl PracticumClient {
    pub fn new(config: &PracticumConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HwBotError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            auth_header: format!("{} {}", config.auth_scheme, config.token),
            client,
        })
    }
}

#[async_trait]
impl StatusSource for PracticumClient {
    fn name(&self) -> &str {
        "practicum"
    }

    async fn fetch(&self, cursor: Option<i64>) -> Result<StatusPage> {
        let mut req = self
            .client
            .get(&self.endpoint)
            .header(AUTHORIZATION, &self.auth_header);
        if let Some(from_date) = cursor {
            req = req.query(&[("from_date", from_date)]);
        }

        let resp = req.send().await.map_err(classify_send_error)?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| HwBotError::Connectivity(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(HwBotError::transport(status.as_u16(), &body));
        }

        let page = parse_response(&body)?;
        tracing::debug!(
            "Fetched status page (from_date={:?}): {}",
            cursor,
            page.homework
                .as_ref()
                .map(|hw| format!("{} = {}", hw.name, hw.status))
                .unwrap_or_else(|| "no homework".into())
        );
        Ok(page)
    }
}

fn classify_send_error(e: reqwest::Error) -> HwBotError {
    let what = if e.is_timeout() {
        "request timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    // Strip the URL so the query string never ends up in logs.
    HwBotError::Connectivity(format!("{what}: {}", e.without_url()))
}
