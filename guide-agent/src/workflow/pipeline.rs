use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use guide_core::{Agent, EventStream, GuideError, InvocationContext, Result};
use guide_telemetry::Instrument;
use std::sync::Arc;

/// Runs its stages once, in order, over one shared state.
///
/// The first error ends the run; later stages never start. Cancellation is
/// checked before each stage.
pub struct Pipeline {
    name: String,
    description: String,
    stages: Vec<Arc<dyn Agent>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, stages: Vec<Arc<dyn Agent>>) -> Result<Self> {
        let name = name.into();
        if stages.is_empty() {
            return Err(GuideError::Config(format!("Pipeline '{}' has no stages", name)));
        }
        let mut seen = std::collections::HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.name()) {
                return Err(GuideError::Config(format!(
                    "Pipeline '{}' has duplicate stage '{}'",
                    name,
                    stage.name()
                )));
            }
        }
        Ok(Self { name, description: String::new(), stages })
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl Agent for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.stages
    }

    async fn run(&self, ctx: Arc<dyn InvocationContext>) -> Result<EventStream> {
        let stages = self.stages.clone();
        let name = self.name.clone();

        let s = stream! {
            for stage in &stages {
                if ctx.is_cancelled() {
                    guide_telemetry::info!(pipeline = %name, next = stage.name(), "run cancelled");
                    yield Err(GuideError::Cancelled);
                    return;
                }

                let span = guide_telemetry::stage_run_span(stage.name(), ctx.invocation_id());
                let mut events = match stage.run(ctx.clone()).instrument(span).await {
                    Ok(events) => events,
                    Err(e) => {
                        guide_telemetry::error!(pipeline = %name, stage = stage.name(), error = %e, "stage failed to start");
                        yield Err(e);
                        return;
                    }
                };

                while let Some(result) = events.next().await {
                    match result {
                        Ok(event) => yield Ok(event),
                        Err(e) => {
                            guide_telemetry::error!(pipeline = %name, stage = stage.name(), error = %e, "stage failed");
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(s))
    }
}
