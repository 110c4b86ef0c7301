//! Gemini provider over the public REST API.
//!
//! Supports plain and SSE-streamed generation, inline PDF input, function
//! calling and JSON-schema constrained output.
//!
//! # Example
//!
//! ```rust,ignore
//! use guide_model::gemini::{GeminiConfig, GeminiModel};
//!
//! let overview_model = GeminiModel::new(GeminiConfig::flash_lite(api_key.clone()))?;
//! let processor_model = GeminiModel::new(GeminiConfig::pro(api_key))?;
//! ```

mod client;
mod config;
pub(crate) mod convert;

pub use client::GeminiModel;
pub use config::{DEFAULT_FAST_MODEL, DEFAULT_PRO_MODEL, GEMINI_API_BASE, GeminiConfig};
