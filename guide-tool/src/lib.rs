//! # guide-tool
//!
//! Tools the pipeline's models may call.
//!
//! - [`FunctionTool`] - wrap any async closure
//! - [`ExitLoopTool`] - the elaboration loop's termination signal
//! - [`firecrawl`] - web search and scrape for topic-only requests

pub mod builtin;
pub mod firecrawl;
pub mod function_tool;

pub use builtin::{DONE_STATUS, EXIT_LOOP_TOOL, ExitLoopTool, is_termination_signal};
pub use firecrawl::{FirecrawlConfig, FirecrawlScrapeTool, FirecrawlSearchTool, research_tools};
pub use function_tool::FunctionTool;
