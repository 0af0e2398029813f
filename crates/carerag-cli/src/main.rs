//! CareRAG CLI
//!
//! Offline corpus ingestion plus ad-hoc retrieval against the corpus and a
//! generated report. Results go to stdout; logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use carerag_core::retrieval::{
    AutoExtractor, CorpusIndexStore, CorpusIngestor, EmbeddingClient, RetrievalConfig,
    RetrievalError, ReportIndexStore,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "carerag")]
#[command(about = "CareRAG CLI - corpus ingestion and grounded retrieval", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and snapshot a reference document
    Ingest {
        /// Reference document (.txt or .md)
        #[arg(short, long)]
        source: PathBuf,
        /// Window size in characters
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Characters shared by consecutive windows
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Print corpus context for a query
    Retrieve {
        /// Query text
        query: String,
        /// Number of chunks (default: search.corpus_top_k)
        #[arg(short, long)]
        k: Option<usize>,
        /// Print ranked hits with distances as JSON
        #[arg(long)]
        json: bool,
    },
    /// Index a generated report and print context for a question about it
    Ask {
        /// Report document (.txt or .md)
        #[arg(short, long)]
        report: PathBuf,
        /// Question about the report
        question: String,
        /// Number of chunks (default: search.report_top_k)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Print the effective configuration (API key omitted)
    Config,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli.command).await {
        match e.downcast_ref::<RetrievalError>() {
            Some(err) => {
                if !err.is_expected() {
                    log::error!("[CLI] {} ({})", err, err.error_code());
                }
                eprintln!("error: {}", err.user_message());
            }
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let mut config = RetrievalConfig::load()?;

    match command {
        Commands::Ingest {
            source,
            chunk_size,
            overlap,
        } => {
            if let Some(size) = chunk_size {
                config.chunking.chunk_size = size;
            }
            if let Some(overlap) = overlap {
                config.chunking.chunk_overlap = overlap;
            }
            config.validate()?;

            let embedder = EmbeddingClient::new(config.embedding.clone())?;
            let extractor = AutoExtractor;
            let ingestor = CorpusIngestor::from_config(&extractor, &config)?;

            let stats = ingestor
                .ingest_with_progress(&source, &embedder, |p| {
                    log::info!(
                        "[Ingest] {} {}% {}",
                        p.phase,
                        p.percent,
                        p.message.unwrap_or_default()
                    );
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Commands::Retrieve { query, k, json } => {
            let embedder = EmbeddingClient::new(config.embedding.clone())?;
            let store = CorpusIndexStore::initialize(&config.paths.corpus_snapshot())?
                .with_query_timeout(Duration::from_secs(config.ingest.embed_timeout_secs));
            let k = k.unwrap_or(config.search.corpus_top_k);

            if json {
                let hits = store.search(&embedder, &query, k).await?;
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                println!("{}", store.retrieve(&embedder, &query, k).await?);
            }
        }

        Commands::Ask {
            report,
            question,
            k,
        } => {
            let embedder = EmbeddingClient::new(config.embedding.clone())?;
            let store = ReportIndexStore::from_config(&config)?;
            let stats = store
                .rebuild(&report, &embedder)
                .await
                .with_context(|| format!("indexing report {}", report.display()))?;
            log::info!(
                "[CLI] Report indexed: {} chunks in {}ms",
                stats.total_chunks,
                stats.elapsed_ms
            );

            let k = k.unwrap_or(config.search.report_top_k);
            println!("{}", store.query(&question, &embedder, k).await?);
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
