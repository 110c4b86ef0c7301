//! Startup configuration for the `study-guide` binary.
//!
//! Settings come from an optional TOML file, then from the environment
//! (including a `.env` file loaded by `main`). The resulting [`GuideConfig`]
//! is the only place the process environment is read; everything downstream
//! receives plain values.

use guide_agent::PipelineConfig;
use guide_core::MissingKeyPolicy;
use guide_telemetry::TelemetryConfig;
use guide_tool::FirecrawlConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "study-guide.toml";

pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

pub const SERVICE_NAME: &str = "study-guide";

/// Validation error with context and suggestions.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// The setting that failed validation
    pub field: String,
    pub message: String,
    /// Suggested fix or valid values
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into(), suggestion: None }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    /// Gemini API key (`GOOGLE_API_KEY` or `GEMINI_API_KEY`).
    pub google_api_key: Option<String>,
    /// Enables the research tools when present.
    pub firecrawl_api_key: Option<String>,
    pub output_dir: PathBuf,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub pipeline: PipelineConfig,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            firecrawl_api_key: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl GuideConfig {
    /// Reads `path`, or [`DEFAULT_CONFIG_FILE`] when it exists, then applies
    /// environment overrides. The result is not validated yet.
    pub fn load(path: Option<&Path>) -> Result<Self, ValidationError> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };
        let base = match file {
            Some(file) => {
                let text = std::fs::read_to_string(&file).map_err(|e| {
                    ValidationError::new("config", format!("cannot read {}: {}", file.display(), e))
                        .with_suggestion("Check the --config path")
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ValidationError> {
        toml::from_str(text).map_err(|e| {
            ValidationError::new("config", format!("invalid TOML: {}", e))
                .with_suggestion(format!("See `{} config` for the expected keys", SERVICE_NAME))
        })
    }

    /// Defaults plus the variables `lookup` yields.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Applies environment-style overrides. Blank values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = var("GOOGLE_API_KEY").or_else(|| var("GEMINI_API_KEY")) {
            self.google_api_key = Some(key);
        }
        if let Some(key) = var("FIRECRAWL_API_KEY") {
            self.firecrawl_api_key = Some(key);
        }
        if let Some(raw) = var("STUDY_GUIDE_MAX_ITERATIONS") {
            self.pipeline.max_iterations = raw.parse().map_err(|_| {
                ValidationError::new("STUDY_GUIDE_MAX_ITERATIONS", format!("'{}' is not a number", raw))
                    .with_suggestion("Use a positive integer such as 5")
            })?;
        }
        if let Some(raw) = var("STUDY_GUIDE_STRICT_SILENCE") {
            self.pipeline.strict_silence = parse_bool(&raw).ok_or_else(|| {
                ValidationError::new("STUDY_GUIDE_STRICT_SILENCE", format!("'{}' is not a boolean", raw))
                    .with_suggestion("Use true or false")
            })?;
        }
        if let Some(raw) = var("STUDY_GUIDE_MISSING_KEYS") {
            self.pipeline.missing_keys = raw.parse::<MissingKeyPolicy>().map_err(|e| {
                ValidationError::new("STUDY_GUIDE_MISSING_KEYS", e).with_suggestion("Use error or blank")
            })?;
        }
        if let Some(dir) = var("STUDY_GUIDE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(model) = var("STUDY_GUIDE_OVERVIEW_MODEL") {
            self.pipeline.overview_model = model;
        }
        if let Some(model) = var("STUDY_GUIDE_PROCESSOR_MODEL") {
            self.pipeline.processor_model = model;
        }
        if let Some(model) = var("STUDY_GUIDE_FAST_MODEL") {
            self.pipeline.fast_model = model;
        }
        if let Some(level) = var("STUDY_GUIDE_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(endpoint) = var("STUDY_GUIDE_OTLP_ENDPOINT") {
            self.otlp_endpoint = Some(endpoint);
        }
        Ok(self)
    }

    /// Checks everything a run needs, starting with the API key.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.api_key()?;
        self.pipeline.validate().map_err(|e| {
            ValidationError::new("pipeline", e.to_string())
                .with_suggestion("max_iterations must be at least 1 and model names must be set")
        })?;
        if self.log_level.trim().is_empty() {
            return Err(ValidationError::new("log_level", "log level cannot be empty")
                .with_suggestion("Use one of: error, warn, info, debug, trace"));
        }
        if let Some(endpoint) = &self.otlp_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ValidationError::new("otlp_endpoint", format!("'{}' is not a URL", endpoint))
                    .with_suggestion("Use a collector URL such as http://localhost:4317"));
            }
        }
        Ok(())
    }

    pub fn api_key(&self) -> Result<&str, ValidationError> {
        self.google_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()).ok_or_else(|| {
            ValidationError::new("GOOGLE_API_KEY", "no Gemini API key configured")
                .with_suggestion("Set GOOGLE_API_KEY or GEMINI_API_KEY in the environment or a .env file")
        })
    }

    pub fn research_config(&self) -> FirecrawlConfig {
        match &self.firecrawl_api_key {
            Some(key) => FirecrawlConfig::new(key.clone()),
            None => FirecrawlConfig::disabled(),
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        let config = TelemetryConfig::new(SERVICE_NAME).with_log_level(self.log_level.clone());
        match &self.otlp_endpoint {
            Some(endpoint) => config.with_otlp_endpoint(endpoint.clone()),
            None => config,
        }
    }

    /// The effective configuration as TOML, secrets masked.
    pub fn masked(&self) -> String {
        let mut shown = self.clone();
        shown.google_api_key = Some(mask_secret(self.google_api_key.as_deref()));
        shown.firecrawl_api_key = Some(mask_secret(self.firecrawl_api_key.as_deref()));
        toml::to_string_pretty(&shown).unwrap_or_else(|e| format!("# cannot render configuration: {}\n", e))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Keeps the first four characters of a secret.
pub fn mask_secret(secret: Option<&str>) -> String {
    match secret.map(str::trim).filter(|s| !s.is_empty()) {
        None => "(not set)".to_string(),
        Some(s) if s.chars().count() <= 8 => "****".to_string(),
        Some(s) => format!("{}****", s.chars().take(4).collect::<String>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(None), "(not set)");
        assert_eq!(mask_secret(Some("  ")), "(not set)");
        assert_eq!(mask_secret(Some("short")), "****");
        assert_eq!(mask_secret(Some("AIzaSyExample123")), "AIza****");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("field", "broken").with_suggestion("fix it");
        assert_eq!(err.to_string(), "field: broken. fix it");
    }
}
