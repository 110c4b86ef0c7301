use crate::{GuideError, PipelineState, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Regex pattern to match template placeholders like {variable} or {variable?}
/// Matches {+[^{}]*}+ to handle nested braces
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"\{+[^{}]*\}+").expect("Invalid regex pattern"))
}

/// What to do when a template references a key the state does not hold.
///
/// Decided once per pipeline and handed to every stage; `{key?}` placeholders
/// are always optional regardless of the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKeyPolicy {
    /// Fail with [`GuideError::MissingStateKey`].
    #[default]
    Error,
    /// Substitute an empty string.
    Blank,
}

impl std::str::FromStr for MissingKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "strict" => Ok(MissingKeyPolicy::Error),
            "blank" | "lenient" | "empty" => Ok(MissingKeyPolicy::Blank),
            other => Err(format!("unknown missing-key policy '{other}' (expected 'error' or 'blank')")),
        }
    }
}

/// Checks if a string is a valid identifier
/// Must start with letter or underscore, followed by letters, digits, or underscores
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Renders a state value for inclusion in a prompt.
///
/// Strings are inserted verbatim, a list of strings (accumulated sections) is
/// joined by blank lines, everything else is pretty-printed JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n\n"),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn replace_match(state: &PipelineState, match_str: &str, policy: MissingKeyPolicy) -> Result<String> {
    // Trim curly braces: "{var_name}" -> "var_name"
    let var_name = match_str.trim_matches(|c| c == '{' || c == '}').trim();

    let (var_name, optional) = match var_name.strip_suffix('?') {
        Some(name) => (name, true),
        None => (var_name, false),
    };

    if !is_identifier(var_name) {
        // Not a variable (JSON example, literal braces); keep as written
        return Ok(match_str.to_string());
    }

    match state.get(var_name) {
        Some(value) => Ok(render_value(&value)),
        None if optional || policy == MissingKeyPolicy::Blank => Ok(String::new()),
        None => Err(GuideError::MissingStateKey(var_name.to_string())),
    }
}

/// Injects pipeline state values into an instruction template
///
/// Supports the following placeholder syntax:
/// - `{var_name}` - state variable, missing keys handled per `policy`
/// - `{var_name?}` - optional variable (empty string if missing)
///
/// # Examples
///
/// ```
/// use guide_core::{inject_state, MissingKeyPolicy, PipelineState};
/// use serde_json::json;
///
/// let state = PipelineState::new();
/// state.set("main_topic", json!("Photosynthesis"));
/// let text = inject_state(&state, "Topic: {main_topic}", MissingKeyPolicy::Error).unwrap();
/// assert_eq!(text, "Topic: Photosynthesis");
/// ```
///
/// # Errors
///
/// Returns [`GuideError::MissingStateKey`] if a required variable is absent and
/// the policy is [`MissingKeyPolicy::Error`].
pub fn inject_state(state: &PipelineState, template: &str, policy: MissingKeyPolicy) -> Result<String> {
    let regex = get_placeholder_regex();
    let mut result = String::with_capacity(template.len());
    let mut last_end = 0;

    for found in regex.find_iter(template) {
        let range = found.range();
        result.push_str(&template[last_end..range.start]);
        result.push_str(&replace_match(state, found.as_str(), policy)?);
        last_end = range.end;
    }

    result.push_str(&template[last_end..]);

    Ok(result)
}

/// The state keys a template references, in order of first appearance.
pub fn referenced_keys(template: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for found in get_placeholder_regex().find_iter(template) {
        let name = found.as_str().trim_matches(|c| c == '{' || c == '}').trim();
        let name = name.strip_suffix('?').unwrap_or(name);
        if is_identifier(name) && !keys.iter().any(|k| k == name) {
            keys.push(name.to_string());
        }
    }
    keys
}
