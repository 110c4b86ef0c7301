use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use guide_core::{
    Agent, Event, EventStream, GuideError, InvocationContext, LoopOutcome, LoopState,
    PipelineState, Result, keys,
};
use guide_telemetry::Instrument;
use guide_tool::is_termination_signal;
use serde_json::{Value, json};
use std::sync::Arc;

/// Default cap on processor/controller passes.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Bounded processor/controller loop that grows `section_content` one
/// objective at a time.
///
/// Each pass runs the processor, then the controller. The loop ends as
/// [`LoopState::Completed`] when the controller emits the termination signal,
/// or as [`LoopState::Exhausted`] after `max_iterations` passes. Exhaustion is
/// not an error: whatever sections exist flow on to the next stage.
///
/// The loop owns `loop_status`. With `strict_silence` (the default) a pass
/// without the signal stores an empty status and any controller text is
/// logged and dropped; without it the controller's text is stored as the
/// acknowledgement.
pub struct ElaborationLoop {
    name: String,
    description: String,
    sub_agents: Vec<Arc<dyn Agent>>,
    max_iterations: u32,
    strict_silence: bool,
    section_key: String,
    status_key: String,
}

impl ElaborationLoop {
    pub fn new(
        name: impl Into<String>,
        processor: Arc<dyn Agent>,
        controller: Arc<dyn Agent>,
        max_iterations: u32,
    ) -> Result<Self> {
        let name = name.into();
        if max_iterations == 0 {
            return Err(GuideError::Config(format!(
                "ElaborationLoop '{}' needs max_iterations of at least 1",
                name
            )));
        }
        if processor.name() == controller.name() {
            return Err(GuideError::Config(format!(
                "ElaborationLoop '{}' processor and controller share the name '{}'",
                name,
                processor.name()
            )));
        }
        Ok(Self {
            name,
            description: String::new(),
            sub_agents: vec![processor, controller],
            max_iterations,
            strict_silence: true,
            section_key: keys::SECTION_CONTENT.to_string(),
            status_key: keys::LOOP_STATUS.to_string(),
        })
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_strict_silence(mut self, strict: bool) -> Self {
        self.strict_silence = strict;
        self
    }

    pub fn with_section_key(mut self, key: impl Into<String>) -> Self {
        self.section_key = key.into();
        self
    }

    pub fn with_status_key(mut self, key: impl Into<String>) -> Self {
        self.status_key = key.into();
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn strict_silence(&self) -> bool {
        self.strict_silence
    }
}

/// Restores sections a processor dropped. Returns true when state was repaired.
///
/// New sections the processor wrote are kept after the restored prefix.
pub(crate) fn enforce_monotonic(state: &PipelineState, key: &str, before: &[String]) -> bool {
    let after = state.sections(key);
    if after.len() >= before.len() && after[..before.len()] == *before {
        return false;
    }
    let mut repaired: Vec<Value> = before.iter().cloned().map(Value::String).collect();
    for section in after {
        if !before.contains(&section) {
            repaired.push(Value::String(section));
        }
    }
    state.set(key, Value::Array(repaired));
    true
}

/// What the controller said during one pass.
#[derive(Default)]
struct ControllerReport {
    signal: Option<Value>,
    escalated: bool,
    text: String,
}

impl ControllerReport {
    fn observe(&mut self, event: &Event) {
        if event.actions.escalate {
            self.escalated = true;
        }
        if let Some(content) = event.content() {
            for (_, response) in content.function_responses() {
                if is_termination_signal(response) {
                    self.signal = Some(response.clone());
                }
            }
            if !event.is_partial() && content.role != "function" {
                let text = content.text();
                if !text.trim().is_empty() {
                    self.text = text;
                }
            }
        }
    }

    fn signalled(&self) -> bool {
        self.signal.is_some() || self.escalated
    }
}

#[async_trait]
impl Agent for ElaborationLoop {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.sub_agents
    }

    async fn run(&self, ctx: Arc<dyn InvocationContext>) -> Result<EventStream> {
        let name = self.name.clone();
        let processor = self.sub_agents[0].clone();
        let controller = self.sub_agents[1].clone();
        let max_iterations = self.max_iterations;
        let strict_silence = self.strict_silence;
        let section_key = self.section_key.clone();
        let status_key = self.status_key.clone();

        let s = stream! {
            let mut state = LoopState::Running;
            let mut iteration = 0u32;
            let mut status = Value::String(String::new());

            while state == LoopState::Running {
                if ctx.is_cancelled() {
                    yield Err(GuideError::Cancelled);
                    return;
                }
                iteration += 1;
                let span = guide_telemetry::loop_iteration_span(&name, iteration, max_iterations);
                let before = ctx.state().sections(&section_key);

                let mut events = match processor.run(ctx.clone()).instrument(span.clone()).await {
                    Ok(events) => events,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                while let Some(result) = events.next().await {
                    match result {
                        Ok(event) => yield Ok(event),
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }

                if enforce_monotonic(ctx.state(), &section_key, &before) {
                    guide_telemetry::warn!(
                        loop_name = %name,
                        iteration,
                        "processor dropped earlier sections; restored them"
                    );
                }

                let mut report = ControllerReport::default();
                let mut events = match controller.run(ctx.clone()).instrument(span).await {
                    Ok(events) => events,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                while let Some(result) = events.next().await {
                    match result {
                        Ok(event) => {
                            report.observe(&event);
                            yield Ok(event);
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }

                if report.signalled() {
                    status = report.signal.take().unwrap_or_else(|| json!({ "status": guide_tool::DONE_STATUS }));
                    state = LoopState::Completed;
                } else {
                    status = if report.text.is_empty() {
                        Value::String(String::new())
                    } else if strict_silence {
                        guide_telemetry::warn!(
                            loop_name = %name,
                            iteration,
                            text = %report.text,
                            "controller produced text without signalling; ignoring it"
                        );
                        Value::String(String::new())
                    } else {
                        Value::String(report.text.clone())
                    };
                    if iteration >= max_iterations {
                        state = LoopState::Exhausted;
                    }
                }
                ctx.state().set(status_key.clone(), status.clone());

                guide_telemetry::debug!(
                    loop_name = %name,
                    iteration,
                    sections = ctx.state().sections(&section_key).len(),
                    "iteration finished"
                );
            }

            let sections = ctx.state().sections(&section_key).len();
            match state {
                LoopState::Exhausted => guide_telemetry::warn!(
                    loop_name = %name,
                    iterations = iteration,
                    sections,
                    "iteration cap reached without a termination signal; continuing with partial sections"
                ),
                _ => guide_telemetry::info!(
                    loop_name = %name,
                    iterations = iteration,
                    sections,
                    "loop completed"
                ),
            }

            let mut event = Event::new(ctx.invocation_id()).with_author(&name);
            event.actions.state_delta.insert(status_key.clone(), status);
            event.actions.loop_outcome = Some(LoopOutcome { state, iterations: iteration, sections });
            yield Ok(event);
        };

        Ok(Box::pin(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CustomAgent;

    fn noop(name: &str) -> Arc<dyn Agent> {
        Arc::new(
            CustomAgent::builder(name)
                .handler(|_ctx| async { Ok(Box::pin(futures::stream::empty()) as EventStream) })
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = ElaborationLoop::new("Loop", noop("p"), noop("c"), 0).err().unwrap();
        assert!(matches!(err, GuideError::Config(_)));
    }

    #[test]
    fn test_shared_names_rejected() {
        assert!(ElaborationLoop::new("Loop", noop("same"), noop("same"), 3).is_err());
    }

    #[test]
    fn test_defaults() {
        let lp = ElaborationLoop::new("Loop", noop("p"), noop("c"), 5).unwrap();
        assert!(lp.strict_silence());
        assert_eq!(lp.max_iterations(), 5);
        assert_eq!(lp.sub_agents().len(), 2);
    }

    #[test]
    fn test_enforce_monotonic_keeps_growth() {
        let state = PipelineState::new();
        state.set("s", json!(["a", "b"]));
        assert!(!enforce_monotonic(&state, "s", &["a".to_string()]));
        assert_eq!(state.sections("s"), vec!["a", "b"]);
    }

    #[test]
    fn test_enforce_monotonic_restores_dropped() {
        let state = PipelineState::new();
        state.set("s", json!("c"));
        let before = vec!["a".to_string(), "b".to_string()];
        assert!(enforce_monotonic(&state, "s", &before));
        assert_eq!(state.sections("s"), vec!["a", "b", "c"]);
    }
}
