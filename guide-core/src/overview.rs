use crate::{GuideError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty level '{other}'")),
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

/// Structured summary produced by the first stage and read by every later one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub main_topic: String,
    pub key_sections: Vec<String>,
    pub learning_objectives: Vec<String>,
    pub difficulty_level: Difficulty,
}

impl Overview {
    /// JSON schema the overview stage output is validated against.
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "main_topic": {
                    "type": "string",
                    "description": "The primary subject or theme of the study material"
                },
                "key_sections": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "The major sections or topics identified in the material"
                },
                "learning_objectives": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "What a student should be able to do after studying"
                },
                "difficulty_level": {
                    "type": "string",
                    "enum": ["beginner", "intermediate", "advanced"]
                }
            },
            "required": ["main_topic", "key_sections", "learning_objectives", "difficulty_level"]
        })
    }

    /// Reads an overview out of a state value: either the structured record or
    /// the raw model text it was parsed from.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(serde_json::from_str(json_payload(text))?),
            other => Ok(serde_json::from_value(other.clone())?),
        }
    }

    pub fn objective_count(&self) -> usize {
        self.learning_objectives.len()
    }
}

/// The JSON document inside a model answer, without markdown code fences.
///
/// Models asked for structured output often wrap it in ```json fences; the
/// first fenced block wins, otherwise the trimmed text is returned as is.
pub fn json_payload(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parses model output as JSON, accepting fenced blocks.
pub fn parse_json_output(stage: &str, text: &str) -> Result<Value> {
    serde_json::from_str(json_payload(text))
        .map_err(|e| GuideError::schema(stage, format!("output is not valid JSON: {e}")))
}
