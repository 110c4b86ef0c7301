use crate::workflow::DEFAULT_MAX_ITERATIONS;
use guide_core::{GuideError, Llm, MissingKeyPolicy, Result};
use guide_model::gemini::{DEFAULT_FAST_MODEL, DEFAULT_PRO_MODEL};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_PIPELINE_NAME: &str = "study_guide_agent";

/// Immutable settings for one study guide pipeline.
///
/// Built once by the caller and handed to [`StudyGuidePipeline::build`];
/// nothing inside the pipeline reads the process environment.
///
/// [`StudyGuidePipeline::build`]: crate::StudyGuidePipeline::build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    /// Model for the overview stage.
    pub overview_model: String,
    /// Model for the section writer inside the elaboration loop.
    pub processor_model: String,
    /// Model for the loop controller, assembler and judge.
    pub fast_model: String,
    pub max_iterations: u32,
    pub strict_silence: bool,
    pub missing_keys: MissingKeyPolicy,
    pub streaming: bool,
    pub temperature: Option<f32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PIPELINE_NAME.to_string(),
            overview_model: DEFAULT_FAST_MODEL.to_string(),
            processor_model: DEFAULT_PRO_MODEL.to_string(),
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            strict_silence: true,
            missing_keys: MissingKeyPolicy::Error,
            streaming: false,
            temperature: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_strict_silence(mut self, strict: bool) -> Self {
        self.strict_silence = strict;
        self
    }

    pub fn with_missing_keys(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_keys = policy;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(GuideError::Config("max_iterations must be at least 1".to_string()));
        }
        for (field, value) in [
            ("overview_model", &self.overview_model),
            ("processor_model", &self.processor_model),
            ("fast_model", &self.fast_model),
        ] {
            if value.trim().is_empty() {
                return Err(GuideError::Config(format!("{} must not be empty", field)));
            }
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(GuideError::Config(format!("temperature {} is outside 0.0..=2.0", t)));
            }
        }
        Ok(())
    }
}

/// The completion service behind each stage.
#[derive(Clone)]
pub struct StageModels {
    pub overview: Arc<dyn Llm>,
    pub processor: Arc<dyn Llm>,
    pub controller: Arc<dyn Llm>,
    pub assembler: Arc<dyn Llm>,
    pub judge: Arc<dyn Llm>,
}

impl StageModels {
    /// Every stage uses the same model.
    pub fn uniform(model: Arc<dyn Llm>) -> Self {
        Self {
            overview: model.clone(),
            processor: model.clone(),
            controller: model.clone(),
            assembler: model.clone(),
            judge: model,
        }
    }

    /// Builds one model per distinct name in `config`, sharing instances
    /// between stages that use the same name.
    pub fn from_factory<F>(config: &PipelineConfig, mut factory: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Arc<dyn Llm>>,
    {
        let mut cache: Vec<(String, Arc<dyn Llm>)> = Vec::new();
        let mut get = |name: &str| -> Result<Arc<dyn Llm>> {
            if let Some((_, model)) = cache.iter().find(|(n, _)| n == name) {
                return Ok(model.clone());
            }
            let model = factory(name)?;
            cache.push((name.to_string(), model.clone()));
            Ok(model)
        };
        let overview = get(&config.overview_model)?;
        let processor = get(&config.processor_model)?;
        let fast = get(&config.fast_model)?;
        Ok(Self { overview, processor, controller: fast.clone(), assembler: fast.clone(), judge: fast })
    }
}

impl std::fmt::Debug for StageModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageModels")
            .field("overview", &self.overview.name())
            .field("processor", &self.processor.name())
            .field("controller", &self.controller.name())
            .field("assembler", &self.assembler.name())
            .field("judge", &self.judge.name())
            .finish()
    }
}
