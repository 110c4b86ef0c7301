use clap::{Args, Parser, Subcommand};
use guide_runner::{DEFAULT_USER_ID, StudyRequest};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "study-guide")]
#[command(about = "Turn study material into a polished markdown study guide", long_about = None)]
pub struct Cli {
    /// TOML configuration file (defaults to ./study-guide.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate one study guide and write it to the output directory
    Generate(GenerateArgs),

    /// Interactive mode: one study guide per line of input
    Console {
        /// User ID attached to each run
        #[arg(short, long, default_value = DEFAULT_USER_ID)]
        user_id: String,

        /// Directory for generated guides (overrides the configuration)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the effective configuration with secrets masked
    Config,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Study material file (.txt, .md or .pdf)
    #[arg(short, long, conflicts_with = "topic")]
    pub file: Option<PathBuf>,

    /// A topic to research instead of given material
    #[arg(short, long)]
    pub topic: Option<String>,

    /// User ID attached to the run
    #[arg(short, long, default_value = DEFAULT_USER_ID)]
    pub user_id: String,

    /// Directory for the generated guide (overrides the configuration)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Study material given inline
    #[arg(trailing_var_arg = true, conflicts_with_all = ["file", "topic"])]
    pub text: Vec<String>,
}

impl GenerateArgs {
    /// The request these arguments describe.
    pub async fn request(&self) -> anyhow::Result<StudyRequest> {
        let request = if let Some(path) = &self.file {
            StudyRequest::from_file(path).await?
        } else if let Some(topic) = self.topic.as_deref().filter(|t| !t.trim().is_empty()) {
            StudyRequest::from_topic(topic).with_source(topic.trim())
        } else if !self.text.is_empty() {
            StudyRequest::from_text(&self.text.join(" "))
        } else {
            anyhow::bail!("nothing to study: pass --file, --topic or the material itself");
        };
        Ok(request.with_user_id(self.user_id.clone()))
    }
}
