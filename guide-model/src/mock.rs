use guide_core::{GuideError, Llm, LlmRequest, LlmResponse, LlmResponseStream, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

type Handler = Box<dyn Fn(&LlmRequest) -> Result<LlmResponse> + Send + Sync>;

enum Scripted {
    Reply(LlmResponse),
    Fail(String),
}

/// Offline completion service for tests and dry runs.
///
/// Replies come from a script consumed in order; once the script is empty the
/// handler, if any, answers. Every request is recorded.
pub struct MockLlm {
    name: String,
    script: Mutex<VecDeque<Scripted>>,
    handler: Option<Handler>,
    delay: Option<Duration>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            handler: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, response: LlmResponse) -> Self {
        self.push(Scripted::Reply(response));
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_response(LlmResponse::text(text))
    }

    pub fn with_function_call(self, name: impl Into<String>, args: serde_json::Value) -> Self {
        self.with_response(LlmResponse::function_call(name, args))
    }

    /// Queue a failure, surfaced as [`GuideError::Model`].
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Fail(message.into()));
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LlmRequest) -> Result<LlmResponse> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Sleep before answering, to exercise cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn push(&self, item: Scripted) {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(item);
    }

    fn answer(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let next = self.script.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match next {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(GuideError::Model(message)),
            None => match &self.handler {
                Some(handler) => handler(req),
                None => Err(GuideError::Model(format!("mock '{}' has no scripted response left", self.name))),
            },
        }
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_content(&self, req: LlmRequest, _stream: bool) -> Result<LlmResponseStream> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(req.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.answer(&req)?;
        let stream = async_stream::stream! {
            yield Ok(response);
        };
        Ok(Box::pin(stream))
    }
}
