//! # guide-model
//!
//! Text completion services for the study guide pipeline.
//!
//! - [`gemini::GeminiModel`] - Google Gemini over REST, with SSE streaming
//! - [`MockLlm`] - scripted or handler-driven offline model
//! - [`retry`] - backoff for transient HTTP failures

pub mod gemini;
pub mod mock;
pub mod retry;

pub use gemini::{GeminiConfig, GeminiModel};
pub use mock::MockLlm;
pub use retry::{RetryConfig, execute_with_retry, is_retryable_model_error, is_retryable_status_code};
