use std::{env, time::Duration};

use anyhow::{ensure, Context, Result};
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_GC_TIME_MS: u64 = 5 * 60 * 1000;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: Url,
    pub timeout: Duration,
    pub stale_time: Duration,
    /// How long an unobserved, idle cache entry is kept before eviction.
    pub gc_time: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default api url is valid"),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            stale_time: Duration::ZERO,
            gc_time: Duration::from_millis(DEFAULT_GC_TIME_MS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let raw_url = env::var("API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = parse_base_url(&raw_url)?;
        let timeout_ms: u64 = env::var("API_TIMEOUT_MS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT_MS.to_string())
            .parse()
            .context("API_TIMEOUT_MS must be an integer")?;
        ensure!(timeout_ms > 0, "API_TIMEOUT_MS must be greater than zero");
        let stale_time_ms: u64 = env::var("QUERY_STALE_TIME_MS")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .context("QUERY_STALE_TIME_MS must be an integer")?;
        let gc_time_ms: u64 = env::var("QUERY_GC_TIME_MS")
            .unwrap_or_else(|_| DEFAULT_GC_TIME_MS.to_string())
            .parse()
            .context("QUERY_GC_TIME_MS must be an integer")?;

        Ok(Self {
            api_url,
            timeout: Duration::from_millis(timeout_ms),
            stale_time: Duration::from_millis(stale_time_ms),
            gc_time: Duration::from_millis(gc_time_ms),
        })
    }

    pub fn with_api_url(mut self, raw: &str) -> Result<Self> {
        self.api_url = parse_base_url(raw)?;
        Ok(self)
    }

    pub fn redacted_api_url(&self) -> String {
        redact_url(&self.api_url)
    }
}

/// Endpoint paths are joined onto the base, so it must end with a slash or
/// `Url::join` would replace its last segment.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&normalized).with_context(|| format!("invalid API_URL {raw:?}"))?;
    ensure!(
        matches!(url.scheme(), "http" | "https"),
        "API_URL must use http or https, got {}",
        url.scheme()
    );
    Ok(url)
}

fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    if redacted.password().is_some() {
        let _ = redacted.set_password(Some("*****"));
    }
    redacted.to_string()
}
