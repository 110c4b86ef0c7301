use guide_core::{Content, InvocationContext as InvocationContextTrait, PipelineState};
use tokio_util::sync::CancellationToken;

/// Context for one pipeline run. Owns the run's [`PipelineState`].
pub struct InvocationContext {
    invocation_id: String,
    user_id: String,
    user_content: Content,
    state: PipelineState,
    cancellation: CancellationToken,
}

impl InvocationContext {
    pub fn new(invocation_id: String, user_id: String, user_content: Content) -> Self {
        Self {
            invocation_id,
            user_id,
            user_content,
            state: PipelineState::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

impl InvocationContextTrait for InvocationContext {
    fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn user_content(&self) -> &Content {
        &self.user_content
    }

    fn state(&self) -> &PipelineState {
        &self.state
    }

    fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}
