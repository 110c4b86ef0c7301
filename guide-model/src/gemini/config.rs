//! Configuration types for the Gemini REST provider.

use serde::{Deserialize, Serialize};

/// Default Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Model used for the cheap, high-volume stages.
pub const DEFAULT_FAST_MODEL: &str = "gemini-2.5-flash-lite";

/// Model used where section quality matters most.
pub const DEFAULT_PRO_MODEL: &str = "gemini-2.5-pro";

/// Configuration for the Gemini API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Google AI Studio API key.
    pub api_key: String,
    /// Model name, e.g. `gemini-2.5-flash-lite`.
    pub model: String,
    /// Optional custom base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default sampling temperature, overridden per request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_FAST_MODEL.to_string(),
            base_url: None,
            temperature: None,
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), model: model.into(), ..Default::default() }
    }

    pub fn flash_lite(api_key: impl Into<String>) -> Self {
        Self::new(api_key, DEFAULT_FAST_MODEL)
    }

    pub fn pro(api_key: impl Into<String>) -> Self {
        Self::new(api_key, DEFAULT_PRO_MODEL)
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub(crate) fn base(&self) -> &str {
        self.base_url.as_deref().unwrap_or(GEMINI_API_BASE).trim_end_matches('/')
    }
}
