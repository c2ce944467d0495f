use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use municipal_ingest::{
    config::Config,
    embedding::get_embedding_client,
    extract::PdfTextExtractor,
    logging,
    processing::IngestionService,
    storage::build_object_store,
};

#[derive(Parser)]
#[command(
    name = "municipal-ingest",
    about = "Turn municipal PDFs into chunked, embedded bundles"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk every PDF under a prefix and save the chunk file.
    Process {
        /// Prefix to scan; defaults to SOURCE_PREFIX.
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Embed an existing chunk file and save the processed bundle.
    Embed {
        /// Path of the chunk file inside the store.
        #[arg(long)]
        chunks_file: String,
    },
    /// Process and embed in one pass.
    Run {
        /// Prefix to scan; defaults to SOURCE_PREFIX.
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Count source PDFs and generated artifacts.
    Stats,
}

#[derive(Serialize)]
struct EmbedOutput {
    embeddings_file: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing();

    if let Err(err) = run(cli).await {
        tracing::error!(error = %format!("{err:#}"), "Ingestion failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let store = build_object_store(&config).context("failed to configure object store")?;
    let client = get_embedding_client(&config).context("failed to configure embedding client")?;
    let service = IngestionService::new(&config, store, Arc::new(PdfTextExtractor), client)
        .context("failed to initialize ingestion service")?;

    match cli.command {
        Command::Process { prefix } => {
            let prefix = prefix.unwrap_or_else(|| service.source_prefix().to_string());
            let summary = service
                .process(&prefix)
                .await
                .with_context(|| format!("failed to process {prefix}"))?;
            print_json(&summary)
        }
        Command::Embed { chunks_file } => {
            let embeddings_file = service
                .embed(&chunks_file)
                .await
                .with_context(|| format!("failed to embed {chunks_file}"))?;
            print_json(&EmbedOutput { embeddings_file })
        }
        Command::Run { prefix } => {
            let prefix = prefix.unwrap_or_else(|| service.source_prefix().to_string());
            let summary = service
                .run(&prefix)
                .await
                .with_context(|| format!("ingestion run over {prefix} failed"))?;
            print_json(&summary)
        }
        Command::Stats => {
            let stats = service.stats().await.context("failed to collect storage stats")?;
            print_json(&stats)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
