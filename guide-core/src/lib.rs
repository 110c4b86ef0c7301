//! # guide-core
//!
//! Core traits and types for the study guide pipeline.
//!
//! ## Overview
//!
//! - [`Agent`] - anything that runs against an [`InvocationContext`] and streams [`Event`]s
//! - [`Llm`] - the text completion service a stage calls
//! - [`Tool`] - callables a model may invoke mid-generation
//! - [`PipelineState`] - the per-run key/value store every stage shares
//! - [`inject_state`] - `{key}` placeholder substitution with a fixed [`MissingKeyPolicy`]
//! - [`GuideError`] / [`Result`] - unified error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use guide_core::{inject_state, keys, MissingKeyPolicy, PipelineState};
//! use serde_json::json;
//!
//! let state = PipelineState::new();
//! state.append(keys::SECTION_CONTENT, json!("## Photosynthesis"));
//! let prompt = inject_state(&state, "Sections so far:\n{section_content}", MissingKeyPolicy::Error)?;
//! assert!(prompt.ends_with("## Photosynthesis"));
//! # Ok::<(), guide_core::GuideError>(())
//! ```

pub mod agent;
pub mod context;
pub mod error;
pub mod event;
pub mod instruction_template;
pub mod keys;
pub mod model;
pub mod overview;
pub mod state;
pub mod tool;
pub mod types;

pub use agent::{Agent, EventStream};
pub use context::InvocationContext;
pub use error::{GuideError, Result};
pub use event::{Event, EventActions, LoopOutcome, LoopState};
pub use instruction_template::{MissingKeyPolicy, inject_state, referenced_keys, render_value};
pub use keys::COMPLETION_MARKER;
pub use model::{
    FinishReason, GenerateContentConfig, Llm, LlmRequest, LlmResponse, LlmResponseStream,
    UsageMetadata,
};
pub use overview::{Difficulty, Overview, json_payload, parse_json_output};
pub use state::PipelineState;
pub use tool::{Tool, ToolContext};
pub use types::{Content, MAX_INLINE_DATA_SIZE, Part};
