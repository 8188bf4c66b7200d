use anyhow::Context;
use clap::{Parser, Subcommand};
use complaint_triage::{config::Config, ml::ComplaintClassifierService, telemetry};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "complaint-triage")]
#[command(about = "Classify citizen complaints by category and severity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new bundle from a complaints CSV
    Train {
        /// Dataset path (defaults to data.path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Embedder model id (defaults to embedder.model)
        #[arg(short, long)]
        embedder: Option<String>,

        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Held-out fraction
        #[arg(short, long)]
        test_size: Option<f64>,
    },

    /// Classify one complaint with the stored bundle
    Predict {
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Print the stored bundle's metadata
    Inspect,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    telemetry::init(&config.observability);

    match cli.command {
        Commands::Train {
            data,
            embedder,
            batch_size,
            test_size,
        } => {
            if let Some(data) = data {
                config.data.path = data;
            }
            if let Some(embedder) = embedder {
                config.embedder.model = embedder;
            }
            if let Some(batch_size) = batch_size {
                config.embedder.batch_size = batch_size;
            }
            if let Some(test_size) = test_size {
                config.training.test_size = test_size;
            }

            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                data = %config.data.path.display(),
                embedder = %config.embedder.model,
                "Starting training"
            );
            let data_path = config.data.path.clone();
            let service = ComplaintClassifierService::from_config(config)?;
            let report = service
                .train_from_csv(&data_path)
                .with_context(|| format!("Training on {} failed", data_path.display()))?;

            for degradation in &report.degradations {
                eprintln!("warning: {}", degradation);
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Predict { text } => {
            let service = ComplaintClassifierService::from_config(config)?;
            let prediction = service.predict(&text)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }

        Commands::Inspect => {
            let service = ComplaintClassifierService::from_config(config)?;
            let summary = service.summary()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
