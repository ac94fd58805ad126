use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fluency_engine::analyze_reading;
use fluency_service::{AssessmentService, FluencyConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fluency")]
#[command(about = "Reading fluency assessment for recorded reading attempts")]
#[command(version)]
struct Cli {
    /// Configuration file (default: platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a transcript against a reference text without touching the store
    Analyze {
        /// Passage the student was asked to read
        #[arg(short, long)]
        reference: String,

        /// What the student actually read
        #[arg(short, long, default_value = "")]
        transcript: String,

        /// Reading duration in seconds
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Assess stored attempts and record insights
    Assess {
        #[arg(required = true)]
        attempt_ids: Vec<String>,
    },

    /// Show the metrics view of one attempt
    Metrics { attempt_id: String },

    /// List the insight history of a student
    Insights { student_id: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<FluencyConfig> {
    let config = match path {
        Some(path) => FluencyConfig::load_from(path),
        None => FluencyConfig::load(),
    }
    .context("Failed to load configuration")?;

    info!("Configuration loaded from {}", config.config_path.display());
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            reference,
            transcript,
            duration,
        } => {
            let result = analyze_reading(&transcript, &reference, duration);
            print_json(&result)?;
        }

        Commands::Assess { attempt_ids } => {
            let config = load_config(cli.config)?;
            let service = AssessmentService::from_config(&config)?;

            let outcomes = service.assess_many(&attempt_ids).await;
            let mut failures = 0;
            for (attempt_id, outcome) in attempt_ids.iter().zip(outcomes) {
                match outcome {
                    Ok(outcome) => print_json(&outcome)?,
                    Err(e) => {
                        error!(attempt_id = %attempt_id, "Assessment failed: {}", e);
                        failures += 1;
                    }
                }
            }

            if failures > 0 {
                bail!("{} of {} attempts failed", failures, attempt_ids.len());
            }
        }

        Commands::Metrics { attempt_id } => {
            let config = load_config(cli.config)?;
            let service = AssessmentService::from_config(&config)?;
            print_json(&service.attempt_metrics(&attempt_id)?)?;
        }

        Commands::Insights { student_id } => {
            let config = load_config(cli.config)?;
            let service = AssessmentService::from_config(&config)?;
            print_json(&service.student_insights(&student_id)?)?;
        }
    }

    Ok(())
}
