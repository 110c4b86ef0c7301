use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Firecrawl API base URL.
pub const FIRECRAWL_API_BASE: &str = "https://api.firecrawl.dev";

/// Characters of page content kept per search hit.
pub const SEARCH_CONTENT_LIMIT: usize = 500;

/// Characters of scraped markdown kept.
pub const SCRAPE_CONTENT_LIMIT: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirecrawlConfig {
    /// Absent when no credential is configured; the tools then answer with an error string.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(with = "secs", default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

impl Default for FirecrawlConfig {
    fn default() -> Self {
        Self { api_key: None, base_url: None, timeout: default_timeout() }
    }
}

impl FirecrawlConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: Some(api_key.into()), ..Default::default() }
    }

    /// A config without credentials.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The API key, ignoring blank values.
    pub fn key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub(crate) fn base(&self) -> &str {
        self.base_url.as_deref().unwrap_or(FIRECRAWL_API_BASE).trim_end_matches('/')
    }
}
