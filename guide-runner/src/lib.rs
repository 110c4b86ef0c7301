//! # guide-runner
//!
//! Run lifecycle for the study guide pipeline.
//!
//! - [`StudyRequest`] - material, topic or PDF plus the requesting user
//! - [`Runner`] - fresh state and context per run, event streaming, cancellation
//! - [`final_document`] - picks the sealed study guide out of a run's events
//! - [`output_path`] / [`write_document`] - persisting the result
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use guide_runner::{Runner, RunnerConfig, StudyRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! let runner = Runner::new(RunnerConfig { app_name: "study_guide_agent".into(), agent })?;
//! let outcome = runner
//!     .run_to_completion(StudyRequest::from_text(&material), CancellationToken::new())
//!     .await?;
//! ```

mod context;
mod output;
mod request;
mod runner;

pub use context::InvocationContext;
pub use output::{DEFAULT_OUTPUT_FILE, output_path, write_document};
pub use request::{DEFAULT_USER_ID, MAX_MATERIAL_CHARS, StudyRequest, TRUNCATION_NOTICE, truncate_material};
pub use runner::{RunOutcome, Runner, RunnerConfig, final_document};
