use async_trait::async_trait;
use guide_core::{Result, Tool, ToolContext};
use serde_json::{Value, json};
use std::sync::Arc;

pub const EXIT_LOOP_TOOL: &str = "exit_loop";

/// Value of `status` in the termination signal.
pub const DONE_STATUS: &str = "done";

const DEFAULT_MESSAGE: &str = "All learning objectives have been processed";

/// Emits the loop termination signal.
///
/// Calling it escalates out of the current stage and returns
/// `{"status": "done", "message": ...}`, which the elaboration loop records
/// as its status.
pub struct ExitLoopTool {
    message: String,
}

impl Default for ExitLoopTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitLoopTool {
    pub fn new() -> Self {
        Self { message: DEFAULT_MESSAGE.to_string() }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// The signal record this tool returns.
    pub fn signal(&self) -> Value {
        json!({ "status": DONE_STATUS, "message": self.message })
    }
}

/// Whether a tool response is the termination signal.
pub fn is_termination_signal(response: &Value) -> bool {
    response.get("status").and_then(Value::as_str) == Some(DONE_STATUS)
}

#[async_trait]
impl Tool for ExitLoopTool {
    fn name(&self) -> &str {
        EXIT_LOOP_TOOL
    }

    fn description(&self) -> &str {
        "Signal loop completion: all learning objectives have been processed.\n\
         Call this function only when the number of completed sections equals \
         the number of learning objectives."
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({"type": "object", "properties": {}}))
    }

    async fn execute(&self, ctx: Arc<dyn ToolContext>, _args: Value) -> Result<Value> {
        let mut actions = ctx.actions();
        actions.escalate = true;
        actions.skip_summarization = true;
        ctx.set_actions(actions);
        tracing::debug!(stage = ctx.stage_name(), "termination signal raised");
        Ok(self.signal())
    }
}
