use anyhow::Result;
use clap::Parser;
use guide_cli::{Cli, Commands, GuideConfig, InterruptGuard, build_runner, generate, run_console};

#[tokio::main]
async fn main() -> Result<()> {
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded environment from {}", path.display());
    }

    let cli = Cli::parse();
    let config = GuideConfig::load(cli.config.as_deref())?;

    if let Commands::Config = cli.command {
        print!("{}", config.masked());
        if let Err(e) = config.validate() {
            eprintln!("\nConfiguration Error: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    if let Err(e) = config.validate() {
        eprintln!("Configuration Error: {}", e);
        eprintln!();
        eprintln!("Create a .env file in the working directory with:");
        eprintln!("  GOOGLE_API_KEY=your-api-key");
        eprintln!("  # Optional: enables web research for the overview");
        eprintln!("  FIRECRAWL_API_KEY=your-firecrawl-key");
        std::process::exit(1);
    }

    guide_telemetry::init(&config.telemetry_config()).map_err(|e| anyhow::anyhow!("{}", e))?;
    let runner = build_runner(&config)?;

    let result = match cli.command {
        Commands::Generate(args) => {
            let request = args.request().await?;
            let output_dir = args.output_dir.unwrap_or_else(|| config.output_dir.clone());
            let guard = InterruptGuard::new();
            generate(&runner, request, &output_dir, guard.token()).await.map(|_| ())
        }
        Commands::Console { user_id, output_dir } => {
            let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
            run_console(&runner, &output_dir, &user_id).await
        }
        Commands::Config => Ok(()),
    };

    guide_telemetry::shutdown_telemetry();
    result
}
