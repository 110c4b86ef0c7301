//! The study guide pipeline: Overview, ElaborationLoop, Assembler, Judge.

mod config;
pub mod prompts;
pub mod toc;

pub use config::{DEFAULT_PIPELINE_NAME, PipelineConfig, StageModels};
pub use toc::{ensure_completion_marker, section_title, store_table_of_contents, table_of_contents};

use crate::stage::{IncludeContents, OutputMode, Stage, StageBuilder};
use crate::workflow::{ElaborationLoop, Pipeline};
use guide_core::{Agent, Overview, Result, Tool, json_payload, keys};
use guide_tool::ExitLoopTool;
use serde_json::Value;
use std::sync::Arc;

pub const OVERVIEW_STAGE: &str = "OverviewAgent";
pub const PROCESSOR_STAGE: &str = "ObjectiveProcessorAgent";
pub const CONTROLLER_STAGE: &str = "LoopControllerAgent";
pub const ELABORATION_LOOP: &str = "ElaborationLoop";
pub const ASSEMBLER_STAGE: &str = "AssemblerAgent";
pub const JUDGE_STAGE: &str = "JudgeAgent";

/// A fully wired study guide pipeline.
pub struct StudyGuidePipeline {
    pipeline: Arc<Pipeline>,
    research_enabled: bool,
}

impl StudyGuidePipeline {
    /// Assembles the four top-level stages.
    ///
    /// `research` is the outcome of creating the web research tools. When it
    /// failed with a recoverable error (usually a missing API key) the overview
    /// stage runs on the given material alone.
    pub fn build(
        config: &PipelineConfig,
        models: StageModels,
        research: Result<Vec<Arc<dyn Tool>>>,
    ) -> Result<Self> {
        config.validate()?;

        let research_tools = match research {
            Ok(tools) => tools,
            Err(e) if !e.is_fatal() => {
                guide_telemetry::warn!(error = %e, "web research unavailable; the overview will use the given material only");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let research_enabled = !research_tools.is_empty();

        let overview = base(OVERVIEW_STAGE, config)
            .description("Creates a high-level overview and structure for the study material")
            .model(models.overview)
            .instruction(prompts::overview_instruction(research_enabled))
            .tools(research_tools)
            .output_schema(Overview::json_schema())
            .output_transform(normalize_overview)
            .output_key(keys::OVERVIEW)
            .build()?;

        let processor = base(PROCESSOR_STAGE, config)
            .description("Writes the section for the next uncovered learning objective")
            .model(models.processor)
            .instruction(prompts::PROCESSOR_INSTRUCTION)
            .output_key(keys::SECTION_CONTENT)
            .output_mode(OutputMode::Append)
            .output_transform(|text| {
                if text.trim() == prompts::PROCESSOR_IDLE_REPLY { String::new() } else { text }
            })
            .build()?;

        let controller = base(CONTROLLER_STAGE, config)
            .description("Decides whether every learning objective has a section")
            .model(models.controller)
            .instruction(prompts::controller_instruction(config.strict_silence))
            .include_contents(IncludeContents::None)
            .tool(Arc::new(ExitLoopTool::new()))
            .build()?;

        let elaboration = ElaborationLoop::new(
            ELABORATION_LOOP,
            Arc::new(processor),
            Arc::new(controller),
            config.max_iterations,
        )?
        .with_description("Elaborates learning objectives one at a time")
        .with_strict_silence(config.strict_silence);

        let assembler = base(ASSEMBLER_STAGE, config)
            .description("Assembles the completed sections into a cohesive study guide")
            .model(models.assembler)
            .instruction(prompts::ASSEMBLER_INSTRUCTION)
            .include_contents(IncludeContents::None)
            .before_callback(store_table_of_contents)
            .output_key(keys::ELABORATED_GUIDE)
            .build()?;

        let judge = base(JUDGE_STAGE, config)
            .description("Makes the final quality pass and seals the guide")
            .model(models.judge)
            .instruction(prompts::JUDGE_INSTRUCTION)
            .include_contents(IncludeContents::None)
            .output_transform(ensure_completion_marker)
            .output_key(keys::STUDY_GUIDE)
            .build()?;

        let stages: Vec<Arc<dyn Agent>> =
            vec![Arc::new(overview), Arc::new(elaboration), Arc::new(assembler), Arc::new(judge)];
        let pipeline = Pipeline::new(config.name.clone(), stages)?
            .with_description("Turns study material into a polished markdown study guide");

        guide_telemetry::info!(
            pipeline = %config.name,
            max_iterations = config.max_iterations,
            strict_silence = config.strict_silence,
            research_enabled,
            "study guide pipeline ready"
        );

        Ok(Self { pipeline: Arc::new(pipeline), research_enabled })
    }

    pub fn agent(&self) -> Arc<dyn Agent> {
        self.pipeline.clone()
    }

    pub fn research_enabled(&self) -> bool {
        self.research_enabled
    }
}

fn base(name: &str, config: &PipelineConfig) -> StageBuilder {
    let builder = Stage::builder(name).missing_keys(config.missing_keys).streaming(config.streaming);
    match config.temperature {
        Some(t) => builder.temperature(t),
        None => builder,
    }
}

/// Lowercases `difficulty_level` so capitalised answers still match the schema.
/// Text that is not a JSON object is returned untouched for validation to report.
fn normalize_overview(text: String) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(json_payload(&text)) else {
        return text;
    };
    let Some(level) = value.get("difficulty_level").and_then(Value::as_str) else {
        return text;
    };
    let level = level.trim().to_lowercase();
    value["difficulty_level"] = Value::String(level);
    value.to_string()
}
