use crate::{EventActions, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A named callable a model may invoke while a stage is running.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Option<Value> {
        None
    }
    async fn execute(&self, ctx: Arc<dyn ToolContext>, args: Value) -> Result<Value>;

    /// The function declaration advertised to the model.
    fn declaration(&self) -> Value {
        let mut decl = serde_json::json!({
            "name": self.name(),
            "description": self.description(),
        });
        if let Some(params) = self.parameters_schema() {
            decl["parameters"] = params;
        }
        decl
    }
}

/// Per-call context handed to [`Tool::execute`].
pub trait ToolContext: Send + Sync {
    fn function_call_id(&self) -> &str;
    /// Name of the stage whose model requested the call.
    fn stage_name(&self) -> &str;
    fn actions(&self) -> EventActions;
    fn set_actions(&self, actions: EventActions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its arguments"
        }

        fn parameters_schema(&self) -> Option<Value> {
            Some(json!({"type": "object", "properties": {"text": {"type": "string"}}}))
        }

        async fn execute(&self, ctx: Arc<dyn ToolContext>, args: Value) -> Result<Value> {
            let mut actions = ctx.actions();
            actions.skip_summarization = true;
            ctx.set_actions(actions);
            Ok(args)
        }
    }

    #[derive(Default)]
    struct TestContext {
        actions: Mutex<EventActions>,
    }

    impl ToolContext for TestContext {
        fn function_call_id(&self) -> &str {
            "call-123"
        }
        fn stage_name(&self) -> &str {
            "TestStage"
        }
        fn actions(&self) -> EventActions {
            self.actions.lock().unwrap().clone()
        }
        fn set_actions(&self, actions: EventActions) {
            *self.actions.lock().unwrap() = actions;
        }
    }

    #[test]
    fn test_declaration_includes_parameters() {
        let decl = EchoTool.declaration();
        assert_eq!(decl["name"], "echo");
        assert_eq!(decl["parameters"]["type"], "object");
    }

    #[tokio::test]
    async fn test_execute_updates_actions() {
        let ctx = Arc::new(TestContext::default());
        let out = EchoTool.execute(ctx.clone(), json!({"text": "hi"})).await.unwrap();
        assert_eq!(out["text"], "hi");
        assert!(ctx.actions().skip_summarization);
        assert_eq!(ctx.function_call_id(), "call-123");
    }
}
