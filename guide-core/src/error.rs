#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stage '{stage}' failed: {message}")]
    StageExecution { stage: String, message: String },

    #[error("Stage '{stage}' output failed schema validation: {message}")]
    SchemaValidation { stage: String, message: String },

    #[error("State variable '{0}' not found")]
    MissingStateKey(String),

    #[error("Tool '{tool}' unavailable: {message}")]
    ToolUnavailable { tool: String, message: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl GuideError {
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        GuideError::StageExecution { stage: stage.into(), message: message.into() }
    }

    pub fn schema(stage: impl Into<String>, message: impl Into<String>) -> Self {
        GuideError::SchemaValidation { stage: stage.into(), message: message.into() }
    }

    pub fn tool_unavailable(tool: impl Into<String>, message: impl Into<String>) -> Self {
        GuideError::ToolUnavailable { tool: tool.into(), message: message.into() }
    }

    /// Name of the stage that raised the error, when the error is stage-scoped.
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            GuideError::StageExecution { stage, .. } | GuideError::SchemaValidation { stage, .. } => {
                Some(stage)
            }
            _ => None,
        }
    }

    /// Errors that end a run. Tool unavailability is recovered locally.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GuideError::ToolUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, GuideError>;
