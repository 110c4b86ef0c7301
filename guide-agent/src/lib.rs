//! # guide-agent
//!
//! Execution layer of the study guide pipeline.
//!
//! - [`Stage`] - one instruction template, one completion call (plus tool rounds), one output key
//! - [`ElaborationLoop`] - bounded processor/controller loop with a termination signal
//! - [`Pipeline`] - fixed sequential composition, fail fast
//! - [`CustomAgent`] - closure-backed agent for deterministic steps
//! - [`StudyGuidePipeline`] - Overview → ElaborationLoop → Assembler → Judge
//!
//! ## Example
//!
//! ```rust,ignore
//! use guide_agent::{PipelineConfig, StageModels, StudyGuidePipeline};
//! use guide_tool::{FirecrawlConfig, research_tools};
//!
//! let config = PipelineConfig::default();
//! let models = StageModels::uniform(model);
//! let pipeline = StudyGuidePipeline::build(&config, models, research_tools(FirecrawlConfig::disabled()))?;
//! let events = pipeline.agent().run(ctx).await?;
//! ```

mod custom_agent;
mod stage;
pub mod study_guide;
mod workflow;

pub use custom_agent::{CustomAgent, CustomAgentBuilder};
pub use guide_core::Agent;
pub use stage::{
    IncludeContents, MAX_TOOL_ROUNDS, OutputMode, OutputTransform, Stage, StageBuilder,
    StateCallback,
};
pub use study_guide::{PipelineConfig, StageModels, StudyGuidePipeline};
pub use workflow::{DEFAULT_MAX_ITERATIONS, ElaborationLoop, Pipeline};
