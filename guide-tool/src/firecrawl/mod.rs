//! Web research through the Firecrawl API.
//!
//! The tools degrade to explanatory text when the credential is missing or a
//! request fails, so a stage using them never aborts because of research.

mod client;
mod config;
mod tools;

pub use client::{FirecrawlClient, SearchHit};
pub use config::{FIRECRAWL_API_BASE, FirecrawlConfig, SCRAPE_CONTENT_LIMIT, SEARCH_CONTENT_LIMIT};
pub use tools::{
    DEFAULT_SEARCH_LIMIT, FirecrawlScrapeTool, FirecrawlSearchTool, SCRAPE_TOOL, SEARCH_TOOL,
    format_scrape, format_search_results, research_tools,
};
