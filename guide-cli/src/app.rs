//! Wiring a validated [`GuideConfig`] into a ready [`Runner`].

use crate::config::GuideConfig;
use guide_agent::{StageModels, StudyGuidePipeline};
use guide_core::Llm;
use guide_model::{GeminiConfig, GeminiModel};
use guide_runner::{Runner, RunnerConfig};
use guide_tool::research_tools;
use std::sync::Arc;

/// Gemini-backed runner for `config`.
pub fn build_runner(config: &GuideConfig) -> anyhow::Result<Runner> {
    config.validate()?;
    let api_key = config.api_key()?.to_string();
    let temperature = config.pipeline.temperature;
    let models = StageModels::from_factory(&config.pipeline, |name| {
        let mut gemini = GeminiConfig::new(api_key.clone(), name);
        if let Some(t) = temperature {
            gemini = gemini.with_temperature(t);
        }
        let model: Arc<dyn Llm> = Arc::new(GeminiModel::new(gemini)?);
        Ok(model)
    })?;
    tracing::info!(
        overview = %config.pipeline.overview_model,
        processor = %config.pipeline.processor_model,
        fast = %config.pipeline.fast_model,
        "gemini models configured"
    );
    build_runner_with(config, models)
}

/// Runner over caller-supplied models. Research tools still follow `config`.
pub fn build_runner_with(config: &GuideConfig, models: StageModels) -> anyhow::Result<Runner> {
    let pipeline = StudyGuidePipeline::build(&config.pipeline, models, research_tools(config.research_config()))?;
    let runner = Runner::new(RunnerConfig { app_name: config.pipeline.name.clone(), agent: pipeline.agent() })?;
    Ok(runner)
}
