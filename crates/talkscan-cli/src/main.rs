use std::path::PathBuf;

use clap::{Parser, Subcommand};
use talkscan_core::Platform;
use tracing_subscriber::EnvFilter;

mod harvest;
mod subjects;

#[derive(Debug, Parser)]
#[command(name = "talkscan")]
#[command(about = "Harvest social-media posts and comments about configured subjects")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Harvest every configured subject and write the result document
    Harvest {
        /// Only harvest this subject label
        #[arg(long)]
        subject: Option<String>,
        /// Only visit targets on this platform
        #[arg(long)]
        platform: Option<Platform>,
        /// Result document path (default: <output dir>/harvest-<timestamp>.json)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Append every accepted record to this NDJSON file as it is found
        #[arg(long)]
        journal: Option<PathBuf>,
        /// Print the plan without opening a browser
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect the subjects file
    Subjects {
        #[command(subcommand)]
        command: SubjectsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum SubjectsCommands {
    /// Load and validate the subjects file
    Validate,
    /// Print subjects with their windows and sources
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = talkscan_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Harvest {
            subject,
            platform,
            output,
            journal,
            dry_run,
        }) => {
            let args = harvest::HarvestArgs {
                subject,
                platform,
                output,
                journal,
                dry_run,
            };
            harvest::run_harvest(&config, &args).await?;
        }
        Some(Commands::Subjects { command }) => match command {
            SubjectsCommands::Validate => subjects::validate_subjects(&config)?,
            SubjectsCommands::List => subjects::list_subjects(&config)?,
        },
        None => println!("talkscan ready; run `talkscan --help` for commands"),
    }

    Ok(())
}
