use super::client::{FirecrawlClient, SearchHit};
use super::config::{FirecrawlConfig, SCRAPE_CONTENT_LIMIT, SEARCH_CONTENT_LIMIT};
use async_trait::async_trait;
use guide_core::{GuideError, Result, Tool, ToolContext};
use serde_json::{Value, json};
use std::sync::Arc;

pub const SEARCH_TOOL: &str = "firecrawl_search";
pub const SCRAPE_TOOL: &str = "firecrawl_scrape";
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

const MISSING_KEY: &str = "Error: FIRECRAWL_API_KEY environment variable not set";

/// First `limit` characters of `text`, or `None` when it already fits.
fn truncate_chars(text: &str, limit: usize) -> Option<String> {
    text.char_indices().nth(limit).map(|(cut, _)| text[..cut].to_string())
}

pub fn format_search_results(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for query: {query}");
    }
    hits.iter()
        .enumerate()
        .map(|(idx, hit)| {
            let content = hit.content().unwrap_or("No content available");
            let content = match truncate_chars(content, SEARCH_CONTENT_LIMIT) {
                Some(cut) => format!("{cut}..."),
                None => content.to_string(),
            };
            format!(
                "{}. {}\n   URL: {}\n   Content: {}\n",
                idx + 1,
                hit.title.as_deref().unwrap_or("No title"),
                hit.url.as_deref().unwrap_or("No URL"),
                content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_scrape(url: &str, markdown: &str) -> String {
    let content = match truncate_chars(markdown, SCRAPE_CONTENT_LIMIT) {
        Some(cut) => format!("{cut}...\n\n[Content truncated]"),
        None => markdown.to_string(),
    };
    format!("Content from {url}:\n\n{content}")
}

fn tool_output(text: String) -> Value {
    json!({ "content": text })
}

/// `firecrawl_search(query, limit=5)`.
///
/// Never fails: problems are reported to the model as text.
pub struct FirecrawlSearchTool {
    client: Arc<FirecrawlClient>,
}

impl FirecrawlSearchTool {
    pub fn new(client: Arc<FirecrawlClient>) -> Self {
        Self { client }
    }

    pub async fn search(&self, query: &str, limit: usize) -> String {
        if self.client.config().key().is_none() {
            return MISSING_KEY.to_string();
        }
        match self.client.search(query, limit).await {
            Ok(hits) => format_search_results(query, &hits),
            Err(e) => {
                tracing::warn!(query, error = %e, "firecrawl search failed");
                format!("Error performing search: {e}")
            }
        }
    }
}

#[async_trait]
impl Tool for FirecrawlSearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search the web using Firecrawl and return relevant content: titles, URLs and page text."
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query to find relevant educational content"},
                "limit": {"type": "integer", "description": "Maximum number of results to return (default: 5)"}
            },
            "required": ["query"]
        }))
    }

    async fn execute(&self, _ctx: Arc<dyn ToolContext>, args: Value) -> Result<Value> {
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            return Ok(tool_output("Error performing search: missing 'query' argument".to_string()));
        };
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l.clamp(1, 20) as usize)
            .unwrap_or(DEFAULT_SEARCH_LIMIT);
        Ok(tool_output(self.search(query, limit).await))
    }
}

/// `firecrawl_scrape(url)`.
pub struct FirecrawlScrapeTool {
    client: Arc<FirecrawlClient>,
}

impl FirecrawlScrapeTool {
    pub fn new(client: Arc<FirecrawlClient>) -> Self {
        Self { client }
    }

    pub async fn scrape(&self, url: &str) -> String {
        if self.client.config().key().is_none() {
            return MISSING_KEY.to_string();
        }
        match self.client.scrape(url).await {
            Ok(Some(markdown)) => format_scrape(url, &markdown),
            Ok(None) => format!("Failed to scrape URL: {url}"),
            Err(e) => {
                tracing::warn!(url, error = %e, "firecrawl scrape failed");
                format!("Error scraping URL: {e}")
            }
        }
    }
}

#[async_trait]
impl Tool for FirecrawlScrapeTool {
    fn name(&self) -> &str {
        SCRAPE_TOOL
    }

    fn description(&self) -> &str {
        "Scrape content from a specific URL using Firecrawl, returned as markdown."
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "The URL to scrape content from"}
            },
            "required": ["url"]
        }))
    }

    async fn execute(&self, _ctx: Arc<dyn ToolContext>, args: Value) -> Result<Value> {
        let Some(url) = args.get("url").and_then(Value::as_str) else {
            return Ok(tool_output("Error scraping URL: missing 'url' argument".to_string()));
        };
        Ok(tool_output(self.scrape(url).await))
    }
}

/// Both research tools sharing one client.
///
/// # Errors
///
/// [`GuideError::ToolUnavailable`] when no API key is configured.
pub fn research_tools(config: FirecrawlConfig) -> Result<Vec<Arc<dyn Tool>>> {
    if config.key().is_none() {
        return Err(GuideError::tool_unavailable("firecrawl", "FIRECRAWL_API_KEY is not set"));
    }
    let client = Arc::new(FirecrawlClient::new(config)?);
    Ok(vec![
        Arc::new(FirecrawlSearchTool::new(client.clone())) as Arc<dyn Tool>,
        Arc::new(FirecrawlScrapeTool::new(client)) as Arc<dyn Tool>,
    ])
}
