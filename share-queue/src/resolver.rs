//! Token resolution: fetch an authenticated page with the caller's
//! credential and pull a bearer token out of the body.
//!
//! Matching lives behind [`TokenExtractor`] so the pattern strategy can be
//! swapped or tested without any network.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const MAX_REDIRECTS: usize = 5;

pub trait TokenExtractor: Send + Sync {
    fn extract(&self, body: &str) -> Option<String>;
}

/// Ordered regex candidates; the first match longer than `min_len` wins.
///
/// Patterns with a capture group yield group 1, otherwise the whole match.
pub struct PatternExtractor {
    patterns: Vec<Regex>,
    min_len: usize,
}

impl PatternExtractor {
    pub fn new<S: AsRef<str>>(patterns: &[S], min_len: usize) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns, min_len })
    }
}

impl TokenExtractor for PatternExtractor {
    fn extract(&self, body: &str) -> Option<String> {
        self.patterns.iter().find_map(|pattern| {
            let captures = pattern.captures(body)?;
            let found = captures.get(1).or_else(|| captures.get(0))?.as_str();
            (found.len() > self.min_len).then(|| found.to_string())
        })
    }
}

#[async_trait]
pub trait TokenResolver: Send + Sync {
    /// Returns `None` when no attempt produced a token. Never errors.
    async fn resolve(&self, credential: &str, identity: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

impl Backoff {
    /// Wait before the retry following `attempt` (zero-based).
    pub fn delay(self, base: Duration, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed => base,
            Backoff::Exponential => base.saturating_mul(2u32.saturating_pow(attempt)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub page_url: String,
    pub referer: Option<String>,
    pub patterns: Vec<String>,
    pub min_token_len: usize,
    pub attempts: u32,
    pub backoff: Backoff,
    /// Base wait after a page that held no token.
    pub retry_delay_ms: u64,
    /// Base wait after a network or HTTP failure.
    pub error_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            page_url: "https://platform.invalid/session".to_string(),
            referer: None,
            patterns: vec![r#"access_token["']?\s*[:=]\s*["']?([A-Za-z0-9_\-.]+)"#.to_string()],
            min_token_len: 30,
            attempts: 3,
            backoff: Backoff::Fixed,
            retry_delay_ms: 1_000,
            error_delay_ms: 2_000,
            timeout_secs: 10,
        }
    }
}

pub struct HttpTokenResolver {
    client: reqwest::Client,
    settings: ResolverSettings,
    extractor: Arc<dyn TokenExtractor>,
}

impl HttpTokenResolver {
    pub fn new(
        settings: ResolverSettings,
        extractor: Arc<dyn TokenExtractor>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self {
            client,
            settings,
            extractor,
        })
    }

    async fn fetch_page(&self, credential: &str, identity: &str) -> Result<String, reqwest::Error> {
        let mut request = self
            .client
            .get(&self.settings.page_url)
            .header(USER_AGENT, identity)
            .header(COOKIE, credential)
            .header(ACCEPT, PAGE_ACCEPT)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5");
        if let Some(referer) = &self.settings.referer {
            request = request.header(reqwest::header::REFERER, referer);
        }

        request.send().await?.error_for_status()?.text().await
    }
}

#[async_trait]
impl TokenResolver for HttpTokenResolver {
    async fn resolve(&self, credential: &str, identity: &str) -> Option<String> {
        let attempts = self.settings.attempts.max(1);

        for attempt in 0..attempts {
            let base = match self.fetch_page(credential, identity).await {
                Ok(body) => {
                    if let Some(token) = self.extractor.extract(&body) {
                        info!(attempt = attempt + 1, "Resolved share token");
                        return Some(token);
                    }
                    debug!(attempt = attempt + 1, "No token found in page");
                    self.settings.retry_delay_ms
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Token page fetch failed");
                    self.settings.error_delay_ms
                }
            };

            if attempt + 1 < attempts {
                let wait = self
                    .settings
                    .backoff
                    .delay(Duration::from_millis(base), attempt);
                tokio::time::sleep(wait).await;
            }
        }

        warn!(attempts, "Giving up on token resolution");
        None
    }
}
