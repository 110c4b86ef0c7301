use super::config::FirecrawlConfig;
use guide_core::{GuideError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SearchHit {
    /// Page markdown, falling back to the search snippet.
    pub fn content(&self) -> Option<&str> {
        self.markdown.as_deref().or(self.description.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Vec<SearchHit>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Thin client for the Firecrawl v1 REST API.
pub struct FirecrawlClient {
    client: Client,
    config: FirecrawlConfig,
}

impl FirecrawlClient {
    pub fn new(config: FirecrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GuideError::Tool(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FirecrawlConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .key()
            .ok_or_else(|| GuideError::tool_unavailable("firecrawl", "FIRECRAWL_API_KEY environment variable not set"))
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, endpoint: &str, body: serde_json::Value) -> Result<T> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1/{}", self.config.base(), endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GuideError::Tool(format!("Firecrawl request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GuideError::Tool(format!("Firecrawl API error ({}): {}", status, text)));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| GuideError::Tool(format!("Failed to parse Firecrawl response: {}", e)))
    }

    /// Web search returning up to `limit` hits with page markdown.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let body = json!({
            "query": query,
            "limit": limit,
            "scrapeOptions": {"formats": ["markdown"]}
        });
        let response: SearchResponse = self.post("search", body).await?;
        if !response.success && response.data.is_none() {
            return Err(GuideError::Tool(response.error.unwrap_or_else(|| "search failed".to_string())));
        }
        let mut hits = response.data.unwrap_or_default();
        hits.truncate(limit);
        Ok(hits)
    }

    /// Page content as markdown. `Ok(None)` when the page yielded nothing.
    pub async fn scrape(&self, url: &str) -> Result<Option<String>> {
        let body = json!({"url": url, "formats": ["markdown"]});
        let response: ScrapeResponse = self.post("scrape", body).await?;
        if !response.success && response.data.is_none() {
            return Err(GuideError::Tool(response.error.unwrap_or_else(|| "scrape failed".to_string())));
        }
        Ok(response.data.and_then(|d| d.markdown.or(d.content)))
    }
}
