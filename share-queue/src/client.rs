use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Everything one outbound share call needs.
#[derive(Debug, Clone, Copy)]
pub struct ShareCall<'a> {
    pub token: &'a str,
    pub link: &'a str,
    pub credential: &'a str,
    pub identity: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    /// The platform answered with the id of the created post.
    Shared(String),
    /// HTTP 429.
    RateLimited,
    Failed(String),
}

impl ShareOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ShareOutcome::Shared(_))
    }
}

#[async_trait]
pub trait ShareClient: Send + Sync {
    async fn share(&self, call: ShareCall<'_>) -> ShareOutcome;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShareClientSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ShareClientSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://platform.invalid/me/feed".to_string(),
            timeout_secs: 8,
        }
    }
}

/// POSTs `link` to the configured feed endpoint with the resolved token.
pub struct HttpShareClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpShareClient {
    pub fn new(settings: &ShareClientSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ShareClient for HttpShareClient {
    async fn share(&self, call: ShareCall<'_>) -> ShareOutcome {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("link", call.link),
                ("access_token", call.token),
                ("published", "0"),
            ])
            .header(USER_AGENT, call.identity)
            .header(COOKIE, call.credential)
            .header(ACCEPT, "application/json, text/plain, */*")
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return ShareOutcome::Failed(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ShareOutcome::RateLimited;
        }
        if !status.is_success() {
            return ShareOutcome::Failed(format!("HTTP {status}"));
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) => match body.get("id") {
                Some(serde_json::Value::String(id)) => ShareOutcome::Shared(id.clone()),
                Some(id) if !id.is_null() => ShareOutcome::Shared(id.to_string()),
                _ => ShareOutcome::Failed("response carried no id".to_string()),
            },
            Err(e) => ShareOutcome::Failed(e.to_string()),
        }
    }
}
