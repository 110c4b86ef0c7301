use futures::StreamExt;
use guide_core::{Content, FinishReason, GuideError, Llm, LlmRequest};
use guide_model::{GeminiConfig, GeminiModel, RetryConfig};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn model_for(server: &MockServer) -> GeminiModel {
    GeminiModel::new(GeminiConfig::flash_lite("test-key").with_base_url(server.uri()))
        .unwrap()
        .with_retry_config(
            RetryConfig::default()
                .with_max_retries(1)
                .with_initial_delay(Duration::ZERO)
                .with_max_delay(Duration::ZERO),
        )
}

fn request() -> LlmRequest {
    LlmRequest::new(
        "gemini-2.5-flash-lite",
        vec![Content::new("user").with_text("Please create a study guide")],
    )
    .with_system_instruction("You are an expert educational content analyzer.")
}

#[tokio::test]
async fn test_generate_content_non_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash-lite:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "You are an expert educational content analyzer."}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "# Overview"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 2, "totalTokenCount": 12}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = model_for(&server);
    let mut stream = model.generate_content(request(), false).await.unwrap();
    let response = stream.next().await.unwrap().unwrap();
    assert_eq!(response.content.unwrap().text(), "# Overview");
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    assert!(!response.partial);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_generate_content_streaming_aggregates_final_response() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"## Light\"}]}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\" reactions\"}]},\"finishReason\":\"STOP\"}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash-lite:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let model = model_for(&server);
    let responses: Vec<_> = model.generate_content(request(), true).await.unwrap().collect().await;
    assert_eq!(responses.len(), 3);
    let partials: Vec<_> = responses[..2].iter().map(|r| r.as_ref().unwrap()).collect();
    assert!(partials.iter().all(|r| r.partial));
    let last = responses[2].as_ref().unwrap();
    assert!(!last.partial);
    assert_eq!(last.content.as_ref().unwrap().text(), "## Light reactions");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let model = model_for(&server);
    let mut stream = model.generate_content(request(), false).await.unwrap();
    let err = stream.next().await.unwrap().unwrap_err();
    match err {
        GuideError::Model(message) => {
            assert!(message.contains("400"));
            assert!(message.contains("bad request"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .expect(2)
        .mount(&server)
        .await;

    let model = model_for(&server);
    let mut stream = model.generate_content(request(), false).await.unwrap();
    assert!(stream.next().await.unwrap().is_err());
}

#[tokio::test]
async fn test_function_call_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "firecrawl_search", "args": {"query": "photosynthesis", "limit": 3}}}
                ]},
                "finishReason": "STOP"
            }]
        })))
        .mount(&server)
        .await;

    let model = model_for(&server);
    let mut stream = model.generate_content(request(), false).await.unwrap();
    let content = stream.next().await.unwrap().unwrap().content.unwrap();
    let (name, args) = content.function_calls().next().unwrap();
    assert_eq!(name, "firecrawl_search");
    assert_eq!(args["limit"], 3);
}
