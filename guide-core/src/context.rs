use crate::{PipelineState, types::Content};
use tokio_util::sync::CancellationToken;

/// Everything a stage can see about the run it belongs to.
///
/// One context exists per external request; every stage and loop iteration of
/// that request shares its [`PipelineState`].
pub trait InvocationContext: Send + Sync {
    fn invocation_id(&self) -> &str;
    fn user_id(&self) -> &str;
    /// The caller's request: study material, a topic, or an attached document.
    fn user_content(&self) -> &Content;
    fn state(&self) -> &PipelineState;
    fn cancellation_token(&self) -> &CancellationToken;

    fn is_cancelled(&self) -> bool {
        self.cancellation_token().is_cancelled()
    }
}
