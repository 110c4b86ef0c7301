//! Gemini REST client implementation.

use super::config::GeminiConfig;
use super::convert::{self, GenerateContentRequest, GenerateContentResponse};
use crate::retry::{
    RetryConfig, execute_with_retry, is_retryable_model_error, is_retryable_status_code,
};
use async_stream::try_stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use guide_core::{Content, GuideError, Llm, LlmRequest, LlmResponse, LlmResponseStream, Part};
use reqwest::Client;

/// Gemini client speaking the `generateContent` REST API directly.
///
/// # Example
///
/// ```rust,ignore
/// use guide_model::gemini::{GeminiConfig, GeminiModel};
///
/// let model = GeminiModel::new(GeminiConfig::flash_lite(api_key))?;
/// ```
pub struct GeminiModel {
    client: Client,
    config: GeminiConfig,
    retry_config: RetryConfig,
}

impl GeminiModel {
    pub fn new(config: GeminiConfig) -> Result<Self, GuideError> {
        let client = Client::builder()
            .build()
            .map_err(|e| GuideError::Model(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config, retry_config: RetryConfig::default() })
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn api_url(&self, model: &str, stream: bool) -> String {
        if stream {
            format!("{}/v1beta/models/{}:streamGenerateContent?alt=sse", self.config.base(), model)
        } else {
            format!("{}/v1beta/models/{}:generateContent", self.config.base(), model)
        }
    }
}

async fn send(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &GenerateContentRequest,
) -> Result<reqwest::Response, GuideError> {
    let response = client
        .post(url)
        .header("x-goog-api-key", api_key)
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| {
            let kind = if e.is_timeout() || e.is_connect() { "retryable" } else { "non-retryable" };
            GuideError::Model(format!("Gemini API request failed ({}): {}", kind, e))
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        let retryability =
            if is_retryable_status_code(status.as_u16()) { "retryable" } else { "non-retryable" };
        return Err(GuideError::Model(format!(
            "Gemini API error ({}, {}): {}",
            status, retryability, error_text
        )));
    }

    Ok(response)
}

/// Decodes a `text/event-stream` body into Gemini chunks.
///
/// Bytes are buffered across network chunks before UTF-8 decoding. Events
/// that do not parse as a response are logged and skipped.
pub(crate) fn sse_chunks<S, B, E>(
    bytes: S,
) -> impl Stream<Item = Result<GenerateContentResponse, GuideError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    bytes.eventsource().filter_map(|event| async move {
        match event {
            Err(e) => Some(Err(GuideError::Model(format!("Stream read error: {}", e)))),
            Ok(event) if event.data.trim().is_empty() => None,
            Ok(event) => match serde_json::from_str::<GenerateContentResponse>(&event.data) {
                Ok(parsed) => Some(Ok(parsed)),
                Err(e) => {
                    tracing::warn!("Failed to parse Gemini chunk: {} - {}", e, event.data);
                    None
                }
            },
        }
    })
}

#[async_trait]
impl Llm for GeminiModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate_content(
        &self,
        request: LlmRequest,
        stream: bool,
    ) -> Result<LlmResponseStream, GuideError> {
        let model =
            if request.model.is_empty() { self.config.model.clone() } else { request.model.clone() };
        tracing::debug!(model = %model, stream, contents = request.contents.len(), "Gemini request");
        let api_url = self.api_url(&model, stream);
        let api_key = self.config.api_key.clone();
        let body = convert::build_request(&request, self.config.temperature);
        let client = self.client.clone();
        let retry_config = self.retry_config.clone();

        let response_stream = try_stream! {
            let response = execute_with_retry(&retry_config, is_retryable_model_error, || {
                send(&client, &api_url, &api_key, &body)
            })
            .await?;

            if stream {
                let mut chunks = Box::pin(sse_chunks(response.bytes_stream()));
                let mut text = String::new();
                let mut calls: Vec<Part> = Vec::new();
                let mut finish_reason = None;
                let mut usage_metadata = None;

                while let Some(chunk_response) = chunks.next().await {
                    let chunk_response = chunk_response?;
                    if let Some(reason) = chunk_response.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
                        finish_reason = Some(convert::finish_reason(reason));
                    }
                    if let Some(usage) = convert::usage(&chunk_response) {
                        usage_metadata = Some(usage);
                    }

                    let mut delta = String::new();
                    for part in convert::candidate_parts(&chunk_response) {
                        match part {
                            Part::Text { text: piece } => delta.push_str(&piece),
                            other => calls.push(other),
                        }
                    }
                    if !delta.is_empty() {
                        text.push_str(&delta);
                        yield LlmResponse {
                            content: Some(Content::new("model").with_text(delta)),
                            partial: true,
                            turn_complete: false,
                            ..Default::default()
                        };
                    }
                }

                let mut parts = Vec::new();
                if !text.is_empty() {
                    parts.push(Part::Text { text });
                }
                parts.extend(calls);

                yield LlmResponse {
                    content: if parts.is_empty() { None } else { Some(Content { role: "model".to_string(), parts }) },
                    usage_metadata,
                    finish_reason,
                    partial: false,
                    turn_complete: true,
                    error_code: None,
                    error_message: None,
                };
            } else {
                let response_text = response.text().await
                    .map_err(|e| GuideError::Model(format!("Failed to read response: {}", e)))?;

                let parsed: GenerateContentResponse = serde_json::from_str(&response_text)
                    .map_err(|e| GuideError::Model(format!(
                        "Failed to parse response: {} - {}",
                        e, response_text
                    )))?;

                yield convert::from_response(&parsed);
            }
        };

        Ok(Box::pin(response_stream))
    }
}
