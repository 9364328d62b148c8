//! ragline CLI
//!
//! Run with: cargo run -p ragline-cli -- process ./inbox

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ragline_pipeline::{
    HttpImageAnalyzer, JsonlVectorStore, MemoryVectorStore, Pipeline, PipelineConfig, VectorStore,
};

#[derive(Parser)]
#[command(name = "ragline", version, about = "Batch document processing pipeline for RAG ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every supported file in a directory
    Process {
        /// Directory containing the input files (non-recursive)
        input_dir: PathBuf,
        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the number of parallel workers
        #[arg(long)]
        batch_size: Option<usize>,
        /// Override the retry limit per file
        #[arg(long)]
        max_retries: Option<u32>,
        /// Append stored records to this JSONL file instead of keeping
        /// them in memory (dry run)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Print a per-file status line in the summary
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print the effective configuration as TOML
    ShowConfig {
        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("could not load config from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragline=info,ragline_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input_dir,
            config,
            batch_size,
            max_retries,
            store,
            verbose,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(batch_size) = batch_size {
                config.processing.batch_size = batch_size;
            }
            if let Some(max_retries) = max_retries {
                config.processing.max_retries = max_retries;
            }

            tracing::info!("Input directory: {}", input_dir.display());
            tracing::info!(
                "Workers: {}, retries: {}, chunk size: {}",
                config.processing.batch_size,
                config.processing.max_retries,
                config.chunking.chunk_size
            );

            let store: Arc<dyn VectorStore> = match store {
                Some(path) => {
                    tracing::info!("Appending records to {}", path.display());
                    Arc::new(JsonlVectorStore::new(path))
                }
                None => {
                    tracing::info!("No --store given; records are kept in memory");
                    Arc::new(MemoryVectorStore::new())
                }
            };
            let analyzer = Arc::new(HttpImageAnalyzer::new(&config.analyzer)?);

            let pipeline = Pipeline::new(&input_dir, config, store, analyzer)
                .await?
                .with_verbose(verbose);
            let stats = pipeline.run().await?;

            if stats.failed_files > 0 {
                println!(
                    "{}",
                    style(format!("{} file(s) failed", stats.failed_files)).red()
                );
                std::process::exit(1);
            }
            println!("{}", style("All files processed").green());
        }
        Commands::ShowConfig { config } => {
            let config = load_config(config.as_ref())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
