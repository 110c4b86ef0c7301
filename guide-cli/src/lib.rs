//! # guide-cli
//!
//! Command-line front end for the study guide pipeline.
//!
//! - [`GuideConfig`] - settings from `study-guide.toml`, `.env` and the environment
//! - [`build_runner`] - Gemini models plus optional Firecrawl research, ready to run
//! - [`generate`] - one run with progress output, written to the output directory
//! - [`run_console`] - interactive mode
//!
//! ## CLI Usage
//!
//! ```bash
//! study-guide generate --file notes/chapter3.pdf
//! study-guide generate --topic "The French Revolution"
//! study-guide console
//! study-guide config
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod console;
pub mod generate;

pub use app::{build_runner, build_runner_with};
pub use cli::{Cli, Commands, GenerateArgs};
pub use config::{GuideConfig, ValidationError};
pub use console::{ConsoleInput, parse_console_input, run_console};
pub use generate::{GenerateReport, InterruptGuard, describe_event, generate};
