//! Type conversion between pipeline content and the Gemini REST wire format.

use base64::{Engine, engine::general_purpose::STANDARD};
use guide_core::{
    Content, FinishReason, GenerateContentConfig, LlmRequest, LlmResponse, Part, UsageMetadata,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

/// One Gemini part. Exactly one field is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<WireBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<WireFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<WireFunctionResponse>,
    /// Thought summaries are dropped on the way in.
    #[serde(default, skip_serializing)]
    pub thought: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBlob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTool {
    pub function_declarations: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<WireUsage>,
    #[serde(default)]
    pub prompt_feedback: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<WireContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_token_count: i32,
    #[serde(default)]
    pub candidates_token_count: i32,
    #[serde(default)]
    pub total_token_count: i32,
}

fn part_to_wire(part: &Part) -> WirePart {
    match part {
        Part::Text { text } => WirePart { text: Some(text.clone()), ..Default::default() },
        Part::InlineData { mime_type, data } => WirePart {
            inline_data: Some(WireBlob { mime_type: mime_type.clone(), data: STANDARD.encode(data) }),
            ..Default::default()
        },
        Part::FunctionCall { name, args } => WirePart {
            function_call: Some(WireFunctionCall { name: name.clone(), args: args.clone() }),
            ..Default::default()
        },
        Part::FunctionResponse { name, response } => WirePart {
            function_response: Some(WireFunctionResponse {
                name: name.clone(),
                response: wrap_response(response),
            }),
            ..Default::default()
        },
    }
}

/// Gemini requires a function response to be a JSON object.
fn wrap_response(response: &Value) -> Value {
    match response {
        Value::Object(_) => response.clone(),
        other => serde_json::json!({ "result": other }),
    }
}

fn part_from_wire(part: WirePart) -> Option<Part> {
    if part.thought.unwrap_or(false) {
        return None;
    }
    if let Some(text) = part.text {
        return Some(Part::Text { text });
    }
    if let Some(call) = part.function_call {
        let args = if call.args.is_null() { serde_json::json!({}) } else { call.args };
        return Some(Part::FunctionCall { name: call.name, args });
    }
    if let Some(resp) = part.function_response {
        return Some(Part::FunctionResponse { name: resp.name, response: resp.response });
    }
    if let Some(blob) = part.inline_data {
        return match STANDARD.decode(blob.data.as_bytes()) {
            Ok(data) => Some(Part::InlineData { mime_type: blob.mime_type, data }),
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable inline data from Gemini response");
                None
            }
        };
    }
    None
}

/// Maps a pipeline role to a Gemini role. Tool results travel as user turns.
pub fn wire_role(role: &str) -> &'static str {
    match role {
        "model" | "assistant" => "model",
        _ => "user",
    }
}

pub fn content_to_wire(content: &Content) -> WireContent {
    WireContent {
        role: Some(wire_role(&content.role).to_string()),
        parts: content.parts.iter().map(part_to_wire).collect(),
    }
}

fn generation_config(config: Option<&GenerateContentConfig>, default_temperature: Option<f32>) -> Option<GenerationConfig> {
    let mut out = GenerationConfig { temperature: default_temperature, ..Default::default() };
    if let Some(config) = config {
        out.temperature = config.temperature.or(default_temperature);
        out.top_p = config.top_p;
        out.top_k = config.top_k;
        out.max_output_tokens = config.max_output_tokens;
        if let Some(schema) = &config.response_schema {
            out.response_mime_type = Some("application/json".to_string());
            out.response_schema = Some(schema.clone());
        }
    }
    let empty = out.temperature.is_none()
        && out.top_p.is_none()
        && out.top_k.is_none()
        && out.max_output_tokens.is_none()
        && out.response_schema.is_none();
    if empty { None } else { Some(out) }
}

pub fn build_request(request: &LlmRequest, default_temperature: Option<f32>) -> GenerateContentRequest {
    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![WireTool { function_declarations: request.tools.values().cloned().collect() }]
    };

    GenerateContentRequest {
        contents: request.contents.iter().map(content_to_wire).collect(),
        system_instruction: request.system_instruction.as_ref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart { text: Some(text.clone()), ..Default::default() }],
        }),
        tools,
        generation_config: generation_config(request.config.as_ref(), default_temperature),
    }
}

pub fn finish_reason(raw: &str) -> FinishReason {
    match raw {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::MaxTokens,
        "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => FinishReason::Safety,
        "RECITATION" => FinishReason::Recitation,
        _ => FinishReason::Other,
    }
}

/// Parts of the first candidate, converted. Empty when the model produced nothing.
pub fn candidate_parts(response: &GenerateContentResponse) -> Vec<Part> {
    response
        .candidates
        .first()
        .and_then(|c| c.content.clone())
        .map(|c| c.parts.into_iter().filter_map(part_from_wire).collect())
        .unwrap_or_default()
}

pub fn usage(response: &GenerateContentResponse) -> Option<UsageMetadata> {
    response.usage_metadata.as_ref().map(|u| UsageMetadata {
        prompt_token_count: u.prompt_token_count,
        candidates_token_count: u.candidates_token_count,
        total_token_count: u.total_token_count,
    })
}

pub fn from_response(response: &GenerateContentResponse) -> LlmResponse {
    let parts = candidate_parts(response);
    let finish = response.candidates.first().and_then(|c| c.finish_reason.as_deref()).map(finish_reason);
    let (error_code, error_message) = match (&response.prompt_feedback, response.candidates.is_empty()) {
        (Some(feedback), true) => (
            feedback.get("blockReason").and_then(Value::as_str).map(str::to_string),
            Some(feedback.to_string()),
        ),
        _ => (None, None),
    };

    LlmResponse {
        content: if parts.is_empty() { None } else { Some(Content { role: "model".to_string(), parts }) },
        usage_metadata: usage(response),
        finish_reason: finish,
        partial: false,
        turn_complete: true,
        error_code,
        error_message,
    }
}
