use crate::{InvocationContext, StudyRequest};
use async_stream::stream;
use futures::StreamExt;
use guide_core::{
    Agent, COMPLETION_MARKER, Event, EventStream, GuideError, InvocationContext as _, LoopOutcome,
    Result, keys,
};
use guide_telemetry::Instrument;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct RunnerConfig {
    pub app_name: String,
    pub agent: Arc<dyn Agent>,
}

/// Drives one pipeline per request, each with fresh state.
pub struct Runner {
    app_name: String,
    root_agent: Arc<dyn Agent>,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub invocation_id: String,
    pub events: Vec<Event>,
    /// The final artifact, or the best partial document when the judge never sealed one.
    pub document: Option<String>,
    /// Whether `document` carries the completion marker.
    pub complete: bool,
    pub loop_outcome: Option<LoopOutcome>,
    pub state: HashMap<String, Value>,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Result<Self> {
        if config.app_name.trim().is_empty() {
            return Err(GuideError::Config("app_name must not be empty".to_string()));
        }
        Ok(Self { app_name: config.app_name, root_agent: config.agent })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Streams the events of one run. Cancelling `cancel` ends the stream
    /// with [`GuideError::Cancelled`] and abandons the remaining stages.
    pub async fn run(&self, request: StudyRequest, cancel: CancellationToken) -> Result<EventStream> {
        let (_, events) = self.start(request, cancel);
        Ok(events)
    }

    /// Runs to the end and collects the outcome. A failed stage fails the run;
    /// no partial document is returned in that case.
    pub async fn run_to_completion(&self, request: StudyRequest, cancel: CancellationToken) -> Result<RunOutcome> {
        self.run_observed(request, cancel, |_| {}).await
    }

    /// Like [`Runner::run_to_completion`], handing each event to `observe`
    /// as it arrives.
    pub async fn run_observed<F>(&self, request: StudyRequest, cancel: CancellationToken, mut observe: F) -> Result<RunOutcome>
    where
        F: FnMut(&Event),
    {
        let (ctx, mut stream) = self.start(request, cancel);
        let mut events = Vec::new();
        while let Some(result) = stream.next().await {
            let event = result?;
            observe(&event);
            events.push(event);
        }

        let state = ctx.state().snapshot();
        let loop_outcome = events.iter().rev().find_map(|e| e.actions.loop_outcome.clone());
        let (document, complete) = match final_document(&events) {
            Some(document) => (Some(document), true),
            None => (partial_document(&state), false),
        };
        if !complete {
            tracing::warn!(invocation_id = ctx.invocation_id(), "run finished without a sealed study guide");
        }

        Ok(RunOutcome {
            invocation_id: ctx.invocation_id().to_string(),
            events,
            document,
            complete,
            loop_outcome,
            state,
        })
    }

    fn start(&self, request: StudyRequest, cancel: CancellationToken) -> (Arc<InvocationContext>, EventStream) {
        let invocation_id = format!("inv-{}", uuid::Uuid::new_v4());
        let ctx = Arc::new(
            InvocationContext::new(invocation_id.clone(), request.user_id().to_string(), request.content().clone())
                .with_cancellation(cancel.clone()),
        );
        let root_agent = self.root_agent.clone();
        let app_name = self.app_name.clone();
        let run_ctx = ctx.clone();

        let s = stream! {
            let span = guide_telemetry::pipeline_run_span(&invocation_id, run_ctx.user_id());
            tracing::info!(app = %app_name, invocation_id = %invocation_id, source = ?request.source(), "run started");

            let mut agent_stream = match root_agent.run(run_ctx.clone()).instrument(span).await {
                Ok(s) => s,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Some(Err(GuideError::Cancelled)),
                    next = agent_stream.next() => next,
                };
                match next {
                    Some(Ok(event)) => yield Ok(event),
                    Some(Err(e)) => {
                        match &e {
                            GuideError::Cancelled => tracing::info!(invocation_id = %invocation_id, "run cancelled"),
                            other => tracing::error!(invocation_id = %invocation_id, error = %other, "run aborted"),
                        }
                        yield Err(e);
                        return;
                    }
                    None => break,
                }
            }
            tracing::info!(invocation_id = %invocation_id, "run finished");
        };

        (ctx, Box::pin(s))
    }
}

/// The final artifact among `events`, searched newest first.
///
/// An event qualifies when a text part carries [`COMPLETION_MARKER`] or a
/// function response carries a string `result`.
pub fn final_document(events: &[Event]) -> Option<String> {
    events.iter().rev().filter(|e| !e.is_partial()).find_map(|event| {
        let content = event.content()?;
        for (_, response) in content.function_responses() {
            if let Some(result) = response.get("result").and_then(Value::as_str) {
                return Some(result.to_string());
            }
        }
        let text = content.text();
        text.contains(COMPLETION_MARKER).then_some(text)
    })
}

fn partial_document(state: &HashMap<String, Value>) -> Option<String> {
    [keys::STUDY_GUIDE, keys::ELABORATED_GUIDE]
        .iter()
        .find_map(|key| state.get(*key).and_then(Value::as_str).filter(|text| !text.trim().is_empty()))
        .map(str::to_string)
}
