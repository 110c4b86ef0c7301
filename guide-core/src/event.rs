use crate::model::LlmResponse;
use crate::types::Content;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Event represents a single step of a pipeline run: model output, a tool
/// result, a state change, or a loop outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub invocation_id: String,
    /// Name of the stage that produced the event.
    pub author: String,
    #[serde(flatten)]
    pub llm_response: LlmResponse,
    pub actions: EventActions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventActions {
    pub state_delta: HashMap<String, serde_json::Value>,
    pub skip_summarization: bool,
    pub escalate: bool,
    /// Set only on the terminal event of an elaboration loop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_outcome: Option<LoopOutcome>,
}

/// States of the elaboration loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Running,
    /// The controller emitted the termination signal.
    Completed,
    /// The iteration cap was reached without a signal.
    Exhausted,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, LoopState::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopOutcome {
    pub state: LoopState,
    pub iterations: u32,
    pub sections: usize,
}

impl Event {
    pub fn new(invocation_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            invocation_id: invocation_id.into(),
            author: String::new(),
            llm_response: LlmResponse::default(),
            actions: EventActions::default(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Convenience method to access content directly.
    pub fn content(&self) -> Option<&Content> {
        self.llm_response.content.as_ref()
    }

    /// Convenience method to set content directly.
    pub fn set_content(&mut self, content: Content) {
        self.llm_response.content = Some(content);
    }

    /// Concatenated text parts, empty when the event has no content.
    pub fn text(&self) -> String {
        self.content().map(Content::text).unwrap_or_default()
    }

    pub fn is_partial(&self) -> bool {
        self.llm_response.partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = Event::new("inv-123").with_author("OverviewAgent");
        assert_eq!(event.invocation_id, "inv-123");
        assert_eq!(event.author, "OverviewAgent");
        assert!(!event.id.is_empty());
        assert_eq!(event.text(), "");
    }

    #[test]
    fn test_event_actions_default() {
        let actions = EventActions::default();
        assert!(actions.state_delta.is_empty());
        assert!(!actions.escalate);
        assert!(actions.loop_outcome.is_none());
    }

    #[test]
    fn test_loop_state_terminal() {
        assert!(!LoopState::Running.is_terminal());
        assert!(LoopState::Completed.is_terminal());
        assert!(LoopState::Exhausted.is_terminal());
    }

    #[test]
    fn test_loop_outcome_serializes_lowercase_state() {
        let outcome = LoopOutcome { state: LoopState::Exhausted, iterations: 2, sections: 2 };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["state"], "exhausted");
    }
}
