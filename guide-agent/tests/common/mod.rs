#![allow(dead_code)]

use futures::StreamExt;
use guide_core::{
    Content, Event, EventStream, GuideError, InvocationContext, LlmRequest, LlmResponse,
    PipelineState,
};
use guide_tool::EXIT_LOOP_TOOL;
use serde_json::json;
use tokio_util::sync::CancellationToken;

pub struct TestContext {
    content: Content,
    state: PipelineState,
    token: CancellationToken,
}

impl TestContext {
    pub fn new(message: &str) -> Self {
        Self {
            content: Content::new("user").with_text(message),
            state: PipelineState::new(),
            token: CancellationToken::new(),
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }
}

impl InvocationContext for TestContext {
    fn invocation_id(&self) -> &str {
        "test-invocation"
    }

    fn user_id(&self) -> &str {
        "test-user"
    }

    fn user_content(&self) -> &Content {
        &self.content
    }

    fn state(&self) -> &PipelineState {
        &self.state
    }

    fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Drains a stream, stopping at the first error.
pub async fn collect(mut stream: EventStream) -> (Vec<Event>, Option<GuideError>) {
    let mut events = Vec::new();
    while let Some(result) = stream.next().await {
        match result {
            Ok(event) => events.push(event),
            Err(e) => return (events, Some(e)),
        }
    }
    (events, None)
}

pub fn system_instruction(req: &LlmRequest) -> &str {
    req.system_instruction.as_deref().unwrap_or_default()
}

pub fn overview_json(objectives: usize) -> String {
    let objectives: Vec<String> = (1..=objectives).map(|i| format!("Objective {}", i)).collect();
    json!({
        "main_topic": "Photosynthesis",
        "key_sections": ["Light reactions", "Calvin cycle", "Limiting factors"],
        "learning_objectives": objectives,
        "difficulty_level": "Intermediate"
    })
    .to_string()
}

/// Number of sections visible in a resolved prompt.
pub fn sections_in(prompt: &str) -> usize {
    prompt.matches("## Section ").count()
}

/// A completion service that plays every study guide stage accurately,
/// telling the stages apart by their instruction.
pub fn study_guide_handler(objectives: usize) -> impl Fn(&LlmRequest) -> guide_core::Result<LlmResponse> + Send + Sync {
    move |req: &LlmRequest| {
        let prompt = system_instruction(req);
        if prompt.starts_with("You are an educational overview specialist") {
            Ok(LlmResponse::text(format!("```json\n{}\n```", overview_json(objectives))))
        } else if prompt.starts_with("You are a detailed educational content creator") {
            let done = sections_in(prompt);
            if done < objectives {
                Ok(LlmResponse::text(format!("## Section {}\n\nExplains objective {}.", done + 1, done + 1)))
            } else {
                Ok(LlmResponse::text(guide_agent::study_guide::prompts::PROCESSOR_IDLE_REPLY))
            }
        } else if prompt.starts_with("You are the loop controller") {
            if sections_in(prompt) == objectives {
                Ok(LlmResponse::function_call(EXIT_LOOP_TOOL, json!({})))
            } else {
                Ok(LlmResponse::text(""))
            }
        } else if prompt.starts_with("You are assembling") {
            Ok(LlmResponse::text(format!("# Photosynthesis Study Guide\n\n{}", prompt)))
        } else if prompt.starts_with("You are the final educational quality judge") {
            Ok(LlmResponse::text("Welcome, student!\n\n# Photosynthesis Study Guide\n\nStudy tips: review daily."))
        } else {
            Err(GuideError::Model(format!("unexpected prompt: {}", prompt)))
        }
    }
}
